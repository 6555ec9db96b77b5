//! Confirm Payment Handler

use std::sync::Arc;

use salvo::{oapi::extract::PathParam, prelude::*};
use tracing::field::{Empty, display};

use stockroom_app::domain::orders::records::OrderNumber;

use crate::{
    extensions::*,
    orders::{errors::lifecycle_api_error, handlers::OrderSummaryResponse},
    response::{ApiError, parse_id},
    state::State,
};

/// Confirm Payment Handler
///
/// Called once the payment gateway reports success for the order.
#[endpoint(
    tags("orders"),
    summary = "Confirm Payment",
    security(("bearer_auth" = [])),
    responses(
        (status_code = StatusCode::OK, description = "Order paid and awaiting shipment"),
    ),
)]
#[tracing::instrument(
    name = "orders.payment",
    skip(order, depot),
    fields(user_id = Empty, order_number = Empty),
    err
)]
pub(crate) async fn handler(
    order: PathParam<String>,
    depot: &mut Depot,
) -> Result<Json<OrderSummaryResponse>, ApiError> {
    let state = depot.obtain_or_500::<Arc<State>>()?;
    let user = depot.user_id_or_401()?;
    let order: OrderNumber = parse_id(&order.into_inner())?;

    let span = tracing::Span::current();

    span.record("user_id", display(user));
    span.record("order_number", display(order));

    let record = state
        .lifecycle
        .confirm_payment(user, order)
        .await
        .map_err(lifecycle_api_error)?;

    tracing::info!(order_number = %order, "payment confirmed");

    Ok(Json(record.into()))
}

#[cfg(test)]
mod tests {
    use salvo::test::{ResponseExt, TestClient};
    use testresult::TestResult;

    use stockroom_app::domain::{
        lifecycle::{LifecycleError, MockLifecycleService},
        orders::{
            MockOrdersService,
            records::{OrderStatus, PayStatus},
        },
    };

    use crate::{
        orders::handlers::tests::{ORDER, make_record},
        response::ErrorResponse,
        test_helpers::{TEST_USER, orders_service},
    };

    use super::*;

    fn make_service(lifecycle: MockLifecycleService) -> Service {
        let mut orders = MockOrdersService::new();

        orders.expect_get_order().never();
        orders.expect_create_submit_order().never();

        orders_service(
            orders,
            lifecycle,
            Router::with_path("orders/{order}/payment").post(handler),
        )
    }

    #[tokio::test]
    async fn test_confirm_payment_success() -> TestResult {
        let mut lifecycle = MockLifecycleService::new();

        lifecycle
            .expect_confirm_payment()
            .once()
            .withf(|user, order| *user == TEST_USER && *order == ORDER)
            .return_once(|_, _| Ok(make_record(OrderStatus::AwaitingShipment, PayStatus::Paid)));

        let mut res = TestClient::post(format!("http://example.com/orders/{ORDER}/payment"))
            .send(&make_service(lifecycle))
            .await;

        let body: OrderSummaryResponse = res.take_json().await?;

        assert_eq!(res.status_code, Some(StatusCode::OK));
        assert_eq!(body.order_status, "awaiting_shipment");
        assert_eq!(body.pay_status, "paid");

        Ok(())
    }

    #[tokio::test]
    async fn test_confirm_payment_on_expired_order_returns_1039() -> TestResult {
        let mut lifecycle = MockLifecycleService::new();

        lifecycle
            .expect_confirm_payment()
            .once()
            .return_once(|_, _| Err(LifecycleError::NotPayable(OrderStatus::Expired)));

        let mut res = TestClient::post(format!("http://example.com/orders/{ORDER}/payment"))
            .send(&make_service(lifecycle))
            .await;

        let body: ErrorResponse = res.take_json().await?;

        assert_eq!(res.status_code, Some(StatusCode::CONFLICT));
        assert_eq!(body.code, 1039);

        Ok(())
    }
}
