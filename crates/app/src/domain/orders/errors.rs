//! Orders service errors.

use sqlx::{
    Error,
    error::{DatabaseError, ErrorKind},
};
use thiserror::Error;

use crate::{
    cache::CacheError,
    domain::{
        inventory::{InventoryError, StockRejection},
        products::{ProductsServiceError, records::SkuId},
    },
    messaging::BrokerError,
    retry::RetriesExhausted,
    snowflake::SnowflakeError,
};

#[derive(Debug, Error)]
pub enum OrdersServiceError {
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

    #[error("order has no lines")]
    EmptyOrder,

    #[error("invalid receiver {0}")]
    InvalidReceiver(&'static str),

    #[error("unknown sku")]
    UnknownSku,

    #[error("sku is delisted")]
    Delisted,

    #[error("specification is not offered for sku {0}")]
    InvalidSpecification(SkuId),

    #[error("invalid quantity {0}")]
    InvalidQuantity(i32),

    #[error("insufficient stock: requested {requested}, available {available}")]
    InsufficientStock { requested: i32, available: i32 },

    #[error("sku {0} has no default picture")]
    MissingPicture(SkuId),

    #[error("order number was already used")]
    DuplicateOrder,

    #[error("stock update kept conflicting")]
    RetriesExhausted(#[from] RetriesExhausted),

    #[error("failed to schedule the payment timeout")]
    TimeoutNotScheduled(#[source] BrokerError),

    #[error("failed to mint order number")]
    Snowflake(#[from] SnowflakeError),

    #[error("product lookup failed")]
    Products(#[source] ProductsServiceError),

    #[error("cache error")]
    Cache(#[from] CacheError),

    #[error("storage error")]
    Sql(#[source] Error),
}

impl From<Error> for OrdersServiceError {
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

impl From<StockRejection> for OrdersServiceError {
    fn from(rejection: StockRejection) -> Self {
        match rejection {
            StockRejection::UnknownSku => Self::UnknownSku,
            StockRejection::Delisted => Self::Delisted,
            StockRejection::Insufficient {
                requested,
                available,
            } => Self::InsufficientStock {
                requested,
                available,
            },
        }
    }
}

impl From<InventoryError> for OrdersServiceError {
    fn from(error: InventoryError) -> Self {
        match error {
            InventoryError::Rejected(rejection) => rejection.into(),
            InventoryError::InvalidQuantity(quantity) => Self::InvalidQuantity(quantity),
            InventoryError::RetriesExhausted(exhausted) => Self::RetriesExhausted(exhausted),
            InventoryError::Sql(error) => error.into(),
        }
    }
}

impl From<ProductsServiceError> for OrdersServiceError {
    fn from(error: ProductsServiceError) -> Self {
        match error {
            ProductsServiceError::NotFound => Self::UnknownSku,
            other => Self::Products(other),
        }
    }
}
