//! Seckill Purchase Status Handler

use std::sync::Arc;

use salvo::{
    oapi::{ToSchema, extract::PathParam},
    prelude::*,
};
use serde::{Deserialize, Serialize};

use stockroom_app::domain::seckill::records::{SeckillPurchaseRecord, SeckillSkuId};

use crate::{
    extensions::*,
    response::{ApiError, parse_id},
    seckill::errors::into_api_error,
    state::State,
};

/// Seckill Purchase Status Response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub(crate) struct PurchaseStatusResponse {
    /// Whether the user won a unit
    pub purchased: bool,

    /// When the unit was taken
    pub purchased_at: Option<String>,
}

impl From<Option<SeckillPurchaseRecord>> for PurchaseStatusResponse {
    fn from(purchase: Option<SeckillPurchaseRecord>) -> Self {
        Self {
            purchased: purchase.is_some(),
            purchased_at: purchase.map(|purchase| purchase.created_at.to_string()),
        }
    }
}

/// Seckill Purchase Status Handler
#[endpoint(
    tags("seckill"),
    summary = "Get Seckill Purchase Status",
    security(("bearer_auth" = [])),
    responses(
        (status_code = StatusCode::OK, description = "Whether a queued request won a unit"),
    ),
)]
pub(crate) async fn handler(
    sku: PathParam<String>,
    depot: &mut Depot,
) -> Result<Json<PurchaseStatusResponse>, ApiError> {
    let state = depot.obtain_or_500::<Arc<State>>()?;
    let user = depot.user_id_or_401()?;
    let sku: SeckillSkuId = parse_id(&sku.into_inner())?;

    let purchase = state
        .seckill
        .purchase_status(user, sku)
        .await
        .map_err(into_api_error)?;

    Ok(Json(purchase.into()))
}
