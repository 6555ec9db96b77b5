//! Carts service errors.

use sqlx::{
    Error,
    error::{DatabaseError, ErrorKind},
};
use thiserror::Error;

use crate::{cache::CacheError, domain::products::ProductsServiceError, retry::RetriesExhausted};

#[derive(Debug, Error)]
pub enum CartsServiceError {
    #[error("cart line already exists")]
    AlreadyExists,

    #[error("cart line not found")]
    NotFound,

    #[error("related resource not found")]
    InvalidReference,

    #[error("missing required data")]
    MissingRequiredData,

    #[error("invalid data")]
    InvalidData,

    #[error("unknown sku")]
    UnknownSku,

    #[error("sku is delisted")]
    Delisted,

    #[error("specification is not offered for this sku")]
    InvalidSpecification,

    #[error("invalid quantity {0}")]
    InvalidQuantity(i32),

    #[error("insufficient stock: requested {requested}, available {available}")]
    InsufficientStock { requested: i32, available: i32 },

    #[error("cart update kept conflicting")]
    RetriesExhausted(#[from] RetriesExhausted),

    #[error("product lookup failed")]
    Products(#[source] ProductsServiceError),

    #[error("cache error")]
    Cache(#[from] CacheError),

    #[error("failed to encode cart line")]
    Encode(#[source] serde_json::Error),

    #[error("storage error")]
    Sql(#[source] Error),
}

impl From<Error> for CartsServiceError {
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

impl From<ProductsServiceError> for CartsServiceError {
    fn from(error: ProductsServiceError) -> Self {
        match error {
            ProductsServiceError::NotFound => Self::UnknownSku,
            other => Self::Products(other),
        }
    }
}
