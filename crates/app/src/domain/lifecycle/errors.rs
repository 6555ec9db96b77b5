//! Lifecycle errors.

use sqlx::{
    Error,
    error::{DatabaseError, ErrorKind},
};
use thiserror::Error;

use crate::{
    domain::{inventory::InventoryError, orders::records::OrderStatus},
    messaging::BrokerError,
    retry::RetriesExhausted,
};

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("order already exists")]
    AlreadyExists,

    #[error("order not found")]
    NotFound,

    #[error("related resource not found")]
    InvalidReference,

    #[error("missing required data")]
    MissingRequiredData,

    #[error("invalid data")]
    InvalidData,

    #[error("order is {0:?} and cannot be paid")]
    NotPayable(OrderStatus),

    #[error("payment window has closed")]
    PastDue,

    #[error("order update kept conflicting")]
    RetriesExhausted(#[from] RetriesExhausted),

    #[error("stock reclaim failed")]
    Stock(#[source] InventoryError),

    #[error("failed to schedule timeout")]
    Broker(#[from] BrokerError),

    #[error("storage error")]
    Sql(#[source] Error),
}

impl From<Error> for LifecycleError {
    fn from(error: Error) -> Self {
        if matches!(error, Error::RowNotFound) {
            return Self::NotFound;
        }

        match error.as_database_error().map(DatabaseError::kind) {
            Some(ErrorKind::UniqueViolation) => Self::AlreadyExists,
            Some(ErrorKind::ForeignKeyViolation) => Self::InvalidReference,
            Some(ErrorKind::NotNullViolation) => Self::MissingRequiredData,
            Some(ErrorKind::CheckViolation) => Self::InvalidData,
            Some(ErrorKind::Other | _) | None => Self::Sql(error),
        }
    }
}

impl From<InventoryError> for LifecycleError {
    fn from(error: InventoryError) -> Self {
        match error {
            InventoryError::RetriesExhausted(exhausted) => Self::RetriesExhausted(exhausted),
            InventoryError::Sql(error) => error.into(),
            other => Self::Stock(other),
        }
    }
}
