//! Add To Cart Handler

use std::sync::Arc;

use salvo::{
    oapi::{ToSchema, extract::JsonBody},
    prelude::*,
};
use serde::{Deserialize, Serialize};
use tracing::field::{Empty, display};

use stockroom_app::domain::products::records::SkuId;

use crate::{
    carts::{errors::into_api_error, handlers::CartEntryResponse},
    extensions::*,
    response::{ApiError, ResponseCode, parse_id},
    state::State,
};

/// Add To Cart Request
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub(crate) struct UpsertCartRequest {
    /// SKU id, as a decimal string
    pub sku_id: String,

    /// Specification value offered by the product
    pub specification: String,

    /// Units to add; negative values take units away
    pub count: i32,
}

/// Add To Cart Response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub(crate) struct UpsertCartResponse {
    /// The merged line, or null when the merge emptied it
    pub entry: Option<CartEntryResponse>,
}

/// Add To Cart Handler
#[endpoint(
    tags("cart"),
    summary = "Add To Cart",
    security(("bearer_auth" = [])),
    responses(
        (status_code = StatusCode::OK, description = "Line merged into the cart"),
    ),
)]
#[tracing::instrument(
    name = "cart.upsert",
    skip(json, depot),
    fields(user_id = Empty, sku_id = Empty),
    err
)]
pub(crate) async fn handler(
    json: JsonBody<UpsertCartRequest>,
    depot: &mut Depot,
) -> Result<Json<UpsertCartResponse>, ApiError> {
    let state = depot.obtain_or_500::<Arc<State>>()?;
    let user = depot.user_id_or_401()?;
    let request = json.into_inner();

    let sku: SkuId = parse_id(&request.sku_id)?;

    if request.specification.trim().is_empty() {
        return Err(ApiError(ResponseCode::InvalidParams));
    }

    let span = tracing::Span::current();

    span.record("user_id", display(user));
    span.record("sku_id", display(sku));

    let entry = state
        .carts
        .add_or_update(user, sku, request.specification, request.count)
        .await
        .map_err(into_api_error)?;

    Ok(Json(UpsertCartResponse {
        entry: entry.map(CartEntryResponse::from),
    }))
}

#[cfg(test)]
mod tests {
    use salvo::test::{ResponseExt, TestClient};
    use serde_json::json;
    use testresult::TestResult;

    use stockroom_app::domain::carts::{CartsServiceError, MockCartsService};

    use crate::{
        carts::handlers::tests::{SKU, make_entry},
        response::ErrorResponse,
        test_helpers::{TEST_USER, carts_service},
    };

    use super::*;

    fn make_service(repo: MockCartsService) -> Service {
        carts_service(repo, Router::with_path("cart").post(handler))
    }

    #[tokio::test]
    async fn test_add_to_cart_returns_merged_line() -> TestResult {
        let mut repo = MockCartsService::new();

        repo.expect_add_or_update()
            .once()
            .withf(|user, sku, spec, delta| {
                *user == TEST_USER && *sku == SKU && spec == "red" && *delta == 2
            })
            .return_once(|_, _, _, _| Ok(Some(make_entry(5, false))));

        let mut res = TestClient::post("http://example.com/cart")
            .json(&json!({ "sku_id": "101", "specification": "red", "count": 2 }))
            .send(&make_service(repo))
            .await;

        let body: UpsertCartResponse = res.take_json().await?;
        let entry = body.entry.ok_or("expected a merged line")?;

        assert_eq!(res.status_code, Some(StatusCode::OK));
        assert_eq!(entry.sku_id, "101");
        assert_eq!(entry.count, 5);

        Ok(())
    }

    #[tokio::test]
    async fn test_add_to_cart_emptied_line_returns_null_entry() -> TestResult {
        let mut repo = MockCartsService::new();

        repo.expect_add_or_update()
            .once()
            .return_once(|_, _, _, _| Ok(None));

        let mut res = TestClient::post("http://example.com/cart")
            .json(&json!({ "sku_id": "101", "specification": "red", "count": -5 }))
            .send(&make_service(repo))
            .await;

        let body: UpsertCartResponse = res.take_json().await?;

        assert_eq!(res.status_code, Some(StatusCode::OK));
        assert!(body.entry.is_none(), "emptied line should not be returned");

        Ok(())
    }

    #[tokio::test]
    async fn test_add_to_cart_insufficient_stock_returns_1032() -> TestResult {
        let mut repo = MockCartsService::new();

        repo.expect_add_or_update().once().return_once(|_, _, _, _| {
            Err(CartsServiceError::InsufficientStock {
                requested: 9,
                available: 4,
            })
        });

        let mut res = TestClient::post("http://example.com/cart")
            .json(&json!({ "sku_id": "101", "specification": "red", "count": 9 }))
            .send(&make_service(repo))
            .await;

        let body: ErrorResponse = res.take_json().await?;

        assert_eq!(res.status_code, Some(StatusCode::CONFLICT));
        assert_eq!(body.code, 1032);

        Ok(())
    }

    #[tokio::test]
    async fn test_add_to_cart_malformed_sku_id_returns_1003() -> TestResult {
        let mut repo = MockCartsService::new();

        repo.expect_add_or_update().never();

        let mut res = TestClient::post("http://example.com/cart")
            .json(&json!({ "sku_id": "abc", "specification": "red", "count": 1 }))
            .send(&make_service(repo))
            .await;

        let body: ErrorResponse = res.take_json().await?;

        assert_eq!(res.status_code, Some(StatusCode::BAD_REQUEST));
        assert_eq!(body.code, 1003);

        Ok(())
    }
}
