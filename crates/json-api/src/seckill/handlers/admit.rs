//! Seckill Purchase Handler

use std::sync::Arc;

use salvo::{
    oapi::{ToSchema, extract::JsonBody},
    prelude::*,
};
use serde::{Deserialize, Serialize};
use tracing::field::{Empty, display};

use stockroom_app::domain::seckill::records::SeckillSkuId;

use crate::{
    extensions::*,
    observability::{SeckillAdmission, observe_seckill_admission},
    response::{ApiError, parse_id},
    seckill::errors::{admission_outcome, into_api_error},
    state::State,
};

/// Seckill Purchase Request
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub(crate) struct SeckillPurchaseRequest {
    /// Seckill item id, as a decimal string
    pub seckill_sku_id: String,
}

/// Seckill Purchase Response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub(crate) struct SeckillQueuedResponse {
    /// Always true; poll the purchase status for the result
    pub queued: bool,
}

/// Seckill Purchase Handler
///
/// Admission only queues the request. Whether a unit was won is read back
/// from the purchase status endpoint.
#[endpoint(
    tags("seckill"),
    summary = "Request Seckill Purchase",
    security(("bearer_auth" = [])),
    responses(
        (status_code = StatusCode::ACCEPTED, description = "Request queued"),
    ),
)]
#[tracing::instrument(
    name = "seckill.admit",
    skip(json, depot, res),
    fields(user_id = Empty, seckill_sku_id = Empty),
    err
)]
pub(crate) async fn handler(
    json: JsonBody<SeckillPurchaseRequest>,
    depot: &mut Depot,
    res: &mut Response,
) -> Result<Json<SeckillQueuedResponse>, ApiError> {
    let state = depot.obtain_or_500::<Arc<State>>()?;
    let user = depot.user_id_or_401()?;
    let sku: SeckillSkuId = parse_id(&json.into_inner().seckill_sku_id)?;

    let span = tracing::Span::current();

    span.record("user_id", display(user));
    span.record("seckill_sku_id", display(sku));

    if let Err(error) = state.seckill.admit(user, sku).await {
        let error = into_api_error(error);

        observe_seckill_admission(admission_outcome(&error));

        return Err(error);
    }

    observe_seckill_admission(SeckillAdmission::Queued);

    res.status_code(StatusCode::ACCEPTED);

    Ok(Json(SeckillQueuedResponse { queued: true }))
}

#[cfg(test)]
mod tests {
    use salvo::test::{ResponseExt, TestClient};
    use serde_json::json;
    use testresult::TestResult;

    use stockroom_app::domain::seckill::{MockSeckillService, SeckillError};

    use crate::{
        response::ErrorResponse,
        seckill::handlers::tests::SECKILL_SKU,
        test_helpers::{TEST_USER, seckill_service},
    };

    use super::*;

    fn make_service(seckill: MockSeckillService) -> Service {
        seckill_service(seckill, Router::with_path("seckill/purchases").post(handler))
    }

    async fn admit_with(error: Option<SeckillError>) -> (Option<StatusCode>, Option<u16>) {
        let mut seckill = MockSeckillService::new();

        seckill
            .expect_admit()
            .once()
            .withf(|user, sku| *user == TEST_USER && *sku == SECKILL_SKU)
            .return_once(move |_, _| error.map_or(Ok(()), Err));

        let mut res = TestClient::post("http://example.com/seckill/purchases")
            .json(&json!({ "seckill_sku_id": "501" }))
            .send(&make_service(seckill))
            .await;

        let code = res
            .take_json::<ErrorResponse>()
            .await
            .ok()
            .map(|body| body.code);

        (res.status_code, code)
    }

    #[tokio::test]
    async fn test_admitted_request_is_accepted() -> TestResult {
        let (status, code) = admit_with(None).await;

        assert_eq!(status, Some(StatusCode::ACCEPTED));
        assert_eq!(code, None);

        Ok(())
    }

    #[tokio::test]
    async fn test_cooling_down_returns_1042() -> TestResult {
        let (status, code) = admit_with(Some(SeckillError::CoolingDown)).await;

        assert_eq!(status, Some(StatusCode::TOO_MANY_REQUESTS));
        assert_eq!(code, Some(1042));

        Ok(())
    }

    #[tokio::test]
    async fn test_throttled_returns_1040() -> TestResult {
        let (status, code) = admit_with(Some(SeckillError::TooManyRequests)).await;

        assert_eq!(status, Some(StatusCode::TOO_MANY_REQUESTS));
        assert_eq!(code, Some(1040));

        Ok(())
    }

    #[tokio::test]
    async fn test_sold_out_returns_1041() -> TestResult {
        let (status, code) = admit_with(Some(SeckillError::Finished)).await;

        assert_eq!(status, Some(StatusCode::CONFLICT));
        assert_eq!(code, Some(1041));

        Ok(())
    }
}
