//! Inventory ledger errors.

use thiserror::Error;

use crate::retry::RetriesExhausted;

/// Terminal business failures. Never retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StockRejection {
    #[error("unknown sku")]
    UnknownSku,

    #[error("sku is delisted")]
    Delisted,

    #[error("insufficient stock: requested {requested}, available {available}")]
    Insufficient { requested: i32, available: i32 },
}

#[derive(Debug, Error)]
pub enum InventoryError {
    #[error(transparent)]
    Rejected(#[from] StockRejection),

    #[error("quantity must be positive, got {0}")]
    InvalidQuantity(i32),

    #[error("stock update kept conflicting")]
    RetriesExhausted(#[from] RetriesExhausted),

    #[error("storage error")]
    Sql(#[from] sqlx::Error),
}

impl InventoryError {
    /// The business rejection, if this is one.
    #[must_use]
    pub fn rejection(&self) -> Option<StockRejection> {
        match self {
            InventoryError::Rejected(rejection) => Some(*rejection),
            _ => None,
        }
    }
}
