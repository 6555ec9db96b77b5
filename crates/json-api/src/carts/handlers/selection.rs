//! Select Cart Line Handler

use std::sync::Arc;

use salvo::{
    oapi::{ToSchema, extract::JsonBody},
    prelude::*,
};
use serde::{Deserialize, Serialize};

use stockroom_app::domain::products::records::SkuId;

use crate::{
    carts::{errors::into_api_error, handlers::CartEntryResponse},
    extensions::*,
    response::{ApiError, parse_id},
    state::State,
};

/// Select Cart Line Request
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub(crate) struct SelectionRequest {
    /// SKU id, as a decimal string
    pub sku_id: String,

    /// Specification of the line
    pub specification: String,

    /// Whether the line takes part in checkout
    pub selected: bool,
}

/// Select Cart Line Handler
#[endpoint(
    tags("cart"),
    summary = "Select Cart Line",
    security(("bearer_auth" = [])),
    responses(
        (status_code = StatusCode::OK, description = "Selection updated"),
    ),
)]
pub(crate) async fn handler(
    json: JsonBody<SelectionRequest>,
    depot: &mut Depot,
) -> Result<Json<CartEntryResponse>, ApiError> {
    let state = depot.obtain_or_500::<Arc<State>>()?;
    let user = depot.user_id_or_401()?;
    let request = json.into_inner();

    let sku: SkuId = parse_id(&request.sku_id)?;

    let entry = state
        .carts
        .set_selected(user, sku, request.specification, request.selected)
        .await
        .map_err(into_api_error)?;

    Ok(Json(entry.into()))
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
        carts_service(repo, Router::with_path("cart/selection").put(handler))
    }

    #[tokio::test]
    async fn test_select_line() -> TestResult {
        let mut repo = MockCartsService::new();

        repo.expect_set_selected()
            .once()
            .withf(|user, sku, spec, selected| {
                *user == TEST_USER && *sku == SKU && spec == "red" && *selected
            })
            .return_once(|_, _, _, _| Ok(make_entry(1, true)));

        let mut res = TestClient::put("http://example.com/cart/selection")
            .json(&json!({ "sku_id": "101", "specification": "red", "selected": true }))
            .send(&make_service(repo))
            .await;

        let body: CartEntryResponse = res.take_json().await?;

        assert_eq!(res.status_code, Some(StatusCode::OK));
        assert!(body.selected, "line should be selected");

        Ok(())
    }

    #[tokio::test]
    async fn test_select_missing_line_returns_1035() -> TestResult {
        let mut repo = MockCartsService::new();

        repo.expect_set_selected()
            .once()
            .return_once(|_, _, _, _| Err(CartsServiceError::NotFound));

        let mut res = TestClient::put("http://example.com/cart/selection")
            .json(&json!({ "sku_id": "101", "specification": "blue", "selected": false }))
            .send(&make_service(repo))
            .await;

        let body: ErrorResponse = res.take_json().await?;

        assert_eq!(res.status_code, Some(StatusCode::NOT_FOUND));
        assert_eq!(body.code, 1035);

        Ok(())
    }
}
