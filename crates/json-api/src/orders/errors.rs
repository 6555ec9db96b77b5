//! Errors

use tracing::error;

use stockroom_app::domain::{lifecycle::LifecycleError, orders::OrdersServiceError};

use crate::response::{ApiError, ResponseCode};

pub(crate) fn into_api_error(error: OrdersServiceError) -> ApiError {
    let code = match error {
        OrdersServiceError::NotFound => ResponseCode::OrderMissing,
        OrdersServiceError::DuplicateOrder | OrdersServiceError::AlreadyExists => {
            ResponseCode::DuplicateOrder
        }
        OrdersServiceError::UnknownSku | OrdersServiceError::InvalidReference => {
            ResponseCode::UnknownSku
        }
        OrdersServiceError::Delisted => ResponseCode::Delisted,
        OrdersServiceError::InvalidSpecification(_) => ResponseCode::InvalidSpecification,
        OrdersServiceError::InvalidQuantity(_) => ResponseCode::InvalidQuantity,
        OrdersServiceError::InsufficientStock { .. } => ResponseCode::InsufficientStock,
        OrdersServiceError::EmptyOrder
        | OrdersServiceError::InvalidReceiver(_)
        | OrdersServiceError::MissingRequiredData
        | OrdersServiceError::InvalidData => ResponseCode::InvalidParams,
        OrdersServiceError::MissingPicture(_)
        | OrdersServiceError::RetriesExhausted(_)
        | OrdersServiceError::Snowflake(_)
        | OrdersServiceError::TimeoutNotScheduled(_)
        | OrdersServiceError::Products(_)
        | OrdersServiceError::Cache(_)
        | OrdersServiceError::Sql(_) => {
            error!("order operation failed: {error}");

            ResponseCode::ServiceBusy
        }
    };

    ApiError(code)
}

pub(crate) fn lifecycle_api_error(error: LifecycleError) -> ApiError {
    let code = match error {
        LifecycleError::NotFound => ResponseCode::OrderMissing,
        LifecycleError::NotPayable(_) | LifecycleError::PastDue => ResponseCode::OrderNotPayable,
        LifecycleError::InvalidReference
        | LifecycleError::MissingRequiredData
        | LifecycleError::InvalidData => ResponseCode::InvalidParams,
        LifecycleError::AlreadyExists
        | LifecycleError::RetriesExhausted(_)
        | LifecycleError::Stock(_)
        | LifecycleError::Broker(_)
        | LifecycleError::Sql(_) => {
            error!("order lifecycle operation failed: {error}");

            ResponseCode::ServiceBusy
        }
    };

    ApiError(code)
}

#[cfg(test)]
mod tests {
    use stockroom_app::domain::orders::records::OrderStatus;

    use super::*;

    #[test]
    fn invalid_receivers_are_invalid_params() {
        assert_eq!(
            into_api_error(OrdersServiceError::InvalidReceiver("phone")),
            ApiError(ResponseCode::InvalidParams)
        );
        assert_eq!(
            into_api_error(OrdersServiceError::EmptyOrder),
            ApiError(ResponseCode::InvalidParams)
        );
    }

    #[test]
    fn settled_and_past_due_orders_are_not_payable() {
        assert_eq!(
            lifecycle_api_error(LifecycleError::NotPayable(OrderStatus::Expired)),
            ApiError(ResponseCode::OrderNotPayable)
        );
        assert_eq!(
            lifecycle_api_error(LifecycleError::PastDue),
            ApiError(ResponseCode::OrderNotPayable)
        );
    }
}
