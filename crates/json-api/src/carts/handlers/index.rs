//! List Cart Handler

use std::sync::Arc;

use salvo::{oapi::ToSchema, prelude::*};
use serde::{Deserialize, Serialize};

use stockroom_app::domain::carts::models::CartLine;

use crate::{carts::errors::into_api_error, extensions::*, response::ApiError, state::State};

/// Cart Line Response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub(crate) struct CartLineResponse {
    /// SKU id, as a decimal string
    pub sku_id: String,

    /// SKU title
    pub title: String,

    /// Current unit price, as a decimal string
    pub price: String,

    /// Product picture
    pub default_pic_url: String,

    /// Product publish status
    pub publish_status: i16,

    /// Chosen specification value
    pub specification: String,

    /// Units in the cart
    pub count: i32,

    /// Whether the line is selected for checkout
    pub selected: bool,

    /// When the line was first added
    pub created_at: String,
}

impl From<CartLine> for CartLineResponse {
    fn from(line: CartLine) -> Self {
        Self {
            sku_id: line.sku_id.to_string(),
            title: line.title,
            price: line.price.to_string(),
            default_pic_url: line.default_pic_url,
            publish_status: line.publish_status,
            specification: line.specification,
            count: line.count,
            selected: line.selected,
            created_at: line.created_at.to_string(),
        }
    }
}

/// List Cart Handler
#[endpoint(
    tags("cart"),
    summary = "List Cart Lines",
    security(("bearer_auth" = [])),
    responses(
        (status_code = StatusCode::OK, description = "Cart lines, newest first"),
    ),
)]
pub(crate) async fn handler(depot: &mut Depot) -> Result<Json<Vec<CartLineResponse>>, ApiError> {
    let state = depot.obtain_or_500::<Arc<State>>()?;
    let user = depot.user_id_or_401()?;

    let lines = state.carts.list(user).await.map_err(into_api_error)?;

    Ok(Json(lines.into_iter().map(CartLineResponse::from).collect()))
}

#[cfg(test)]
mod tests {
    use jiff::Timestamp;
    use rust_decimal::Decimal;
    use salvo::test::{ResponseExt, TestClient};
    use testresult::TestResult;

    use stockroom_app::{
        domain::carts::{CartsServiceError, MockCartsService},
        retry::RetriesExhausted,
    };

    use crate::{
        carts::handlers::tests::SKU,
        response::ErrorResponse,
        test_helpers::{TEST_USER, carts_service},
    };

    use super::*;

    fn make_service(repo: MockCartsService) -> Service {
        carts_service(repo, Router::with_path("cart").get(handler))
    }

    fn make_line() -> CartLine {
        CartLine {
            sku_id: SKU,
            title: "Linen Shirt".to_string(),
            price: Decimal::new(1_999, 2),
            default_pic_url: "https://img.example.test/shirt.png".to_string(),
            publish_status: 1,
            specification: "red".to_string(),
            count: 2,
            selected: false,
            created_at: Timestamp::UNIX_EPOCH,
        }
    }

    #[tokio::test]
    async fn test_list_cart_renders_ids_and_prices_as_strings() -> TestResult {
        let mut repo = MockCartsService::new();

        repo.expect_list()
            .once()
            .withf(|user| *user == TEST_USER)
            .return_once(|_| Ok(vec![make_line()]));

        let mut res = TestClient::get("http://example.com/cart")
            .send(&make_service(repo))
            .await;

        let body: serde_json::Value = res.take_json().await?;

        assert_eq!(res.status_code, Some(StatusCode::OK));
        assert_eq!(body[0]["sku_id"], "101");
        assert_eq!(body[0]["price"], "19.99");
        assert_eq!(body[0]["count"], 2);

        Ok(())
    }

    #[tokio::test]
    async fn test_list_cart_contention_is_service_busy() -> TestResult {
        let mut repo = MockCartsService::new();

        repo.expect_list().once().return_once(|_| {
            Err(CartsServiceError::RetriesExhausted(RetriesExhausted {
                attempts: 10,
            }))
        });

        let mut res = TestClient::get("http://example.com/cart")
            .send(&make_service(repo))
            .await;

        let body: ErrorResponse = res.take_json().await?;

        assert_eq!(res.status_code, Some(StatusCode::INTERNAL_SERVER_ERROR));
        assert_eq!(body.code, 500);

        Ok(())
    }
}
