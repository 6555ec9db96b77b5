//! Seckill errors.

use sqlx::{
    Error,
    error::{DatabaseError, ErrorKind},
};
use thiserror::Error;

use crate::{cache::CacheError, domain::inventory::InventoryError, messaging::BrokerError};

#[derive(Debug, Error)]
pub enum SeckillError {
    #[error("seckill record already exists")]
    AlreadyExists,

    #[error("seckill record not found")]
    NotFound,

    #[error("related resource not found")]
    InvalidReference,

    #[error("missing required data")]
    MissingRequiredData,

    #[error("invalid data")]
    InvalidData,

    #[error("user is cooling down")]
    CoolingDown,

    #[error("too many requests")]
    TooManyRequests,

    #[error("seckill finished")]
    Finished,

    #[error("unknown seckill item")]
    UnknownSku,

    #[error("stock update failed")]
    Stock(#[source] InventoryError),

    #[error("cache error")]
    Cache(#[from] CacheError),

    #[error("failed to queue request")]
    Broker(#[source] BrokerError),

    #[error("storage error")]
    Sql(#[source] Error),
}

impl From<Error> for SeckillError {
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

impl From<BrokerError> for SeckillError {
    fn from(error: BrokerError) -> Self {
        match error {
            BrokerError::QueueFull(_) => Self::Finished,
            other => Self::Broker(other),
        }
    }
}

impl From<InventoryError> for SeckillError {
    fn from(error: InventoryError) -> Self {
        match error {
            InventoryError::Sql(error) => error.into(),
            other => Self::Stock(other),
        }
    }
}
