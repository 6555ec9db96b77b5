//! List Seckill Items Handler

use std::sync::Arc;

use salvo::{oapi::ToSchema, prelude::*};
use serde::{Deserialize, Serialize};

use stockroom_app::domain::seckill::records::SeckillSkuRecord;

use crate::{extensions::*, response::ApiError, seckill::errors::into_api_error, state::State};

/// Seckill Item Response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub(crate) struct SeckillSkuResponse {
    /// Seckill item id, as a decimal string
    pub id: String,

    /// Item title
    pub title: String,

    /// Flash-sale price
    pub price: String,

    /// Units left
    pub stock: i32,

    /// Units sold
    pub sale: i32,

    /// Specification on offer
    pub specification: String,

    /// Item picture
    pub pic_url: String,
}

impl From<SeckillSkuRecord> for SeckillSkuResponse {
    fn from(sku: SeckillSkuRecord) -> Self {
        Self {
            id: sku.id.to_string(),
            title: sku.title,
            price: sku.price.to_string(),
            stock: sku.stock,
            sale: sku.sale,
            specification: sku.specification,
            pic_url: sku.pic_url,
        }
    }
}

/// List Seckill Items Handler
#[endpoint(
    tags("seckill"),
    summary = "List Seckill Items",
    security(("bearer_auth" = [])),
    responses(
        (status_code = StatusCode::OK, description = "Items on flash sale"),
    ),
)]
pub(crate) async fn handler(depot: &mut Depot) -> Result<Json<Vec<SeckillSkuResponse>>, ApiError> {
    let state = depot.obtain_or_500::<Arc<State>>()?;

    let skus = state.seckill.list_skus().await.map_err(into_api_error)?;

    Ok(Json(skus.into_iter().map(SeckillSkuResponse::from).collect()))
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use salvo::test::{ResponseExt, TestClient};
    use testresult::TestResult;

    use stockroom_app::domain::seckill::MockSeckillService;

    use crate::{seckill::handlers::tests::SECKILL_SKU, test_helpers::seckill_service};

    use super::*;

    #[tokio::test]
    async fn test_list_seckill_items() -> TestResult {
        let mut seckill = MockSeckillService::new();

        seckill.expect_list_skus().once().return_once(|| {
            Ok(vec![SeckillSkuRecord {
                id: SECKILL_SKU,
                title: "Flash Kettle".to_string(),
                price: Decimal::new(990, 2),
                stock: 40,
                sale: 10,
                specification: "white".to_string(),
                pic_url: "https://img.example.test/kettle.png".to_string(),
                version: 3,
            }])
        });

        let service = seckill_service(seckill, Router::with_path("seckill/skus").get(handler));

        let mut res = TestClient::get("http://example.com/seckill/skus")
            .send(&service)
            .await;

        let body: Vec<SeckillSkuResponse> = res.take_json().await?;
        let item = body.first().ok_or("expected one item")?;

        assert_eq!(res.status_code, Some(StatusCode::OK));
        assert_eq!(item.id, "501");
        assert_eq!(item.price, "9.90");
        assert_eq!(item.stock, 40);

        Ok(())
    }
}
