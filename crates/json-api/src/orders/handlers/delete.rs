//! Delete Order Handler

use std::sync::Arc;

use salvo::{oapi::extract::PathParam, prelude::*};

use stockroom_app::domain::orders::records::OrderNumber;

use crate::{
    extensions::*,
    orders::errors::lifecycle_api_error,
    response::{ApiError, parse_id},
    state::State,
};

/// Delete Order Handler
///
/// Deleting an order that still awaits payment returns its stock.
#[endpoint(
    tags("orders"),
    summary = "Delete Order",
    security(("bearer_auth" = [])),
    responses(
        (status_code = StatusCode::OK, description = "Order deleted"),
    ),
)]
pub(crate) async fn handler(
    order: PathParam<String>,
    depot: &mut Depot,
) -> Result<StatusCode, ApiError> {
    let state = depot.obtain_or_500::<Arc<State>>()?;
    let user = depot.user_id_or_401()?;
    let order: OrderNumber = parse_id(&order.into_inner())?;

    state
        .lifecycle
        .delete_order(user, order)
        .await
        .map_err(lifecycle_api_error)?;

    tracing::info!(order_number = %order, "deleted order");

    Ok(StatusCode::OK)
}

#[cfg(test)]
mod tests {
    use salvo::test::TestClient;
    use testresult::TestResult;

    use stockroom_app::domain::{
        lifecycle::{LifecycleError, MockLifecycleService},
        orders::MockOrdersService,
    };

    use crate::{
        orders::handlers::tests::ORDER,
        test_helpers::{TEST_USER, orders_service},
    };

    use super::*;

    fn make_service(lifecycle: MockLifecycleService) -> Service {
        orders_service(
            MockOrdersService::new(),
            lifecycle,
            Router::with_path("orders/{order}").delete(handler),
        )
    }

    #[tokio::test]
    async fn test_delete_order_success() -> TestResult {
        let mut lifecycle = MockLifecycleService::new();

        lifecycle
            .expect_delete_order()
            .once()
            .withf(|user, order| *user == TEST_USER && *order == ORDER)
            .return_once(|_, _| Ok(()));

        let res = TestClient::delete(format!("http://example.com/orders/{ORDER}"))
            .send(&make_service(lifecycle))
            .await;

        assert_eq!(res.status_code, Some(StatusCode::OK));

        Ok(())
    }

    #[tokio::test]
    async fn test_delete_unknown_order_returns_404() -> TestResult {
        let mut lifecycle = MockLifecycleService::new();

        lifecycle
            .expect_delete_order()
            .once()
            .return_once(|_, _| Err(LifecycleError::NotFound));

        let res = TestClient::delete(format!("http://example.com/orders/{ORDER}"))
            .send(&make_service(lifecycle))
            .await;

        assert_eq!(res.status_code, Some(StatusCode::NOT_FOUND));

        Ok(())
    }

    #[tokio::test]
    async fn test_delete_malformed_order_number_returns_400() -> TestResult {
        let mut lifecycle = MockLifecycleService::new();

        lifecycle.expect_delete_order().never();

        let res = TestClient::delete("http://example.com/orders/not-a-number")
            .send(&make_service(lifecycle))
            .await;

        assert_eq!(res.status_code, Some(StatusCode::BAD_REQUEST));

        Ok(())
    }
}
