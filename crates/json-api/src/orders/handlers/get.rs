//! Get Order Handler

use std::sync::Arc;

use salvo::{oapi::extract::PathParam, prelude::*};

use stockroom_app::domain::orders::records::OrderNumber;

use crate::{
    extensions::*,
    orders::{errors::into_api_error, handlers::OrderResponse},
    response::{ApiError, parse_id},
    state::State,
};

/// Get Order Handler
#[endpoint(
    tags("orders"),
    summary = "Get Order",
    security(("bearer_auth" = [])),
    responses(
        (status_code = StatusCode::OK, description = "Order with its item snapshots"),
    ),
)]
pub(crate) async fn handler(
    order: PathParam<String>,
    depot: &mut Depot,
) -> Result<Json<OrderResponse>, ApiError> {
    let state = depot.obtain_or_500::<Arc<State>>()?;
    let user = depot.user_id_or_401()?;
    let order: OrderNumber = parse_id(&order.into_inner())?;

    let order = state
        .orders
        .get_order(user, order)
        .await
        .map_err(into_api_error)?;

    Ok(Json(order.into()))
}

#[cfg(test)]
mod tests {
    use salvo::test::{ResponseExt, TestClient};
    use testresult::TestResult;

    use stockroom_app::domain::orders::{MockOrdersService, OrdersServiceError};

    use crate::{
        orders::handlers::tests::{ORDER, make_order},
        response::ErrorResponse,
        test_helpers::{TEST_USER, orders_service, untouched_lifecycle},
    };

    use super::*;

    fn make_service(orders: MockOrdersService) -> Service {
        orders_service(
            orders,
            untouched_lifecycle(),
            Router::with_path("orders/{order}").get(handler),
        )
    }

    #[tokio::test]
    async fn test_get_order_success() -> TestResult {
        let mut orders = MockOrdersService::new();

        orders
            .expect_get_order()
            .once()
            .withf(|user, order| *user == TEST_USER && *order == ORDER)
            .return_once(|_, _| Ok(make_order()));

        let mut res = TestClient::get(format!("http://example.com/orders/{ORDER}"))
            .send(&make_service(orders))
            .await;

        let body: OrderResponse = res.take_json().await?;

        assert_eq!(res.status_code, Some(StatusCode::OK));
        assert_eq!(body.order.order_number, ORDER.to_string());
        assert_eq!(body.order.freight, "18");
        assert_eq!(
            body.items.first().map(|item| item.product_price.as_str()),
            Some("19.99")
        );

        Ok(())
    }

    #[tokio::test]
    async fn test_get_unknown_order_returns_1038() -> TestResult {
        let mut orders = MockOrdersService::new();

        orders
            .expect_get_order()
            .once()
            .return_once(|_, _| Err(OrdersServiceError::NotFound));

        let mut res = TestClient::get(format!("http://example.com/orders/{ORDER}"))
            .send(&make_service(orders))
            .await;

        let body: ErrorResponse = res.take_json().await?;

        assert_eq!(res.status_code, Some(StatusCode::NOT_FOUND));
        assert_eq!(body.code, 1038);

        Ok(())
    }
}
