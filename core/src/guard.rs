use crate::store::{IndexStore, StoreError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GuardError {
    #[error("database is {size} bytes, at or above the {limit} byte budget")]
    OverBudget { size: u64, limit: u64 },
    #[error("could not determine database size: {0}")]
    SizeUnavailable(#[from] StoreError),
}

/// Refuse to run when the store has already reached `max_bytes`.
/// An unknown size counts as over budget.
pub fn check_size_budget<S: IndexStore + ?Sized>(store: &S, max_bytes: u64) -> Result<u64, GuardError> {
    let size = store.database_size()?;
    if size >= max_bytes {
        return Err(GuardError::OverBudget { size, limit: max_bytes });
    }
    tracing::debug!(size, limit = max_bytes, "database size within budget");
    Ok(size)
}
