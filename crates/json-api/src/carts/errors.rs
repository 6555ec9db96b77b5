//! Errors

use tracing::error;

use stockroom_app::domain::carts::CartsServiceError;

use crate::response::{ApiError, ResponseCode};

pub(crate) fn into_api_error(error: CartsServiceError) -> ApiError {
    let code = match error {
        CartsServiceError::NotFound => ResponseCode::CartLineMissing,
        CartsServiceError::UnknownSku | CartsServiceError::InvalidReference => {
            ResponseCode::UnknownSku
        }
        CartsServiceError::Delisted => ResponseCode::Delisted,
        CartsServiceError::InvalidSpecification => ResponseCode::InvalidSpecification,
        CartsServiceError::InvalidQuantity(_) => ResponseCode::InvalidQuantity,
        CartsServiceError::InsufficientStock { .. } => ResponseCode::InsufficientStock,
        CartsServiceError::MissingRequiredData | CartsServiceError::InvalidData => {
            ResponseCode::InvalidParams
        }
        CartsServiceError::AlreadyExists
        | CartsServiceError::RetriesExhausted(_)
        | CartsServiceError::Products(_)
        | CartsServiceError::Cache(_)
        | CartsServiceError::Encode(_)
        | CartsServiceError::Sql(_) => {
            error!("cart operation failed: {error}");

            ResponseCode::ServiceBusy
        }
    };

    ApiError(code)
}
