//! Count Cart Handler

use std::sync::Arc;

use salvo::{oapi::ToSchema, prelude::*};
use serde::{Deserialize, Serialize};

use crate::{carts::errors::into_api_error, extensions::*, response::ApiError, state::State};

/// Cart Count Response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub(crate) struct CartCountResponse {
    /// Number of lines in the cart
    pub count: i64,
}

/// Count Cart Handler
#[endpoint(
    tags("cart"),
    summary = "Count Cart Lines",
    security(("bearer_auth" = [])),
    responses(
        (status_code = StatusCode::OK, description = "Number of cart lines"),
    ),
)]
pub(crate) async fn handler(depot: &mut Depot) -> Result<Json<CartCountResponse>, ApiError> {
    let state = depot.obtain_or_500::<Arc<State>>()?;
    let user = depot.user_id_or_401()?;

    let count = state.carts.count(user).await.map_err(into_api_error)?;

    Ok(Json(CartCountResponse { count }))
}

#[cfg(test)]
mod tests {
    use salvo::test::{ResponseExt, TestClient};
    use testresult::TestResult;

    use stockroom_app::domain::carts::MockCartsService;

    use crate::test_helpers::{TEST_USER, carts_service};

    use super::*;

    #[tokio::test]
    async fn test_count_cart_lines() -> TestResult {
        let mut repo = MockCartsService::new();

        repo.expect_count()
            .once()
            .withf(|user| *user == TEST_USER)
            .return_once(|_| Ok(3));

        let service = carts_service(
            repo,
            Router::with_path("cart/count").get(handler),
        );

        let mut res = TestClient::get("http://example.com/cart/count")
            .send(&service)
            .await;

        let body: CartCountResponse = res.take_json().await?;

        assert_eq!(res.status_code, Some(StatusCode::OK));
        assert_eq!(body.count, 3);

        Ok(())
    }
}
