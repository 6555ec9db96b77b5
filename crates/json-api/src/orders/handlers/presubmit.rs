//! Pre-submit Order Handler

use std::sync::Arc;

use salvo::{
    oapi::{ToSchema, extract::JsonBody},
    prelude::*,
};
use serde::{Deserialize, Serialize};

use stockroom_app::domain::orders::models::{PreSubmitLine, PreSubmitOrder};

use crate::{
    extensions::*,
    orders::{
        errors::into_api_error,
        handlers::{OrderLineRequest, into_lines},
    },
    response::ApiError,
    state::State,
};

/// Pre-submit Order Request
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub(crate) struct PreSubmitRequest {
    /// Lines the shopper is about to buy
    pub lines: Vec<OrderLineRequest>,
}

/// Pre-submit Line Response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub(crate) struct PreSubmitLineResponse {
    /// SKU id, as a decimal string
    pub sku_id: String,

    /// SKU title
    pub title: String,

    /// Current unit price
    pub price: String,

    /// Product picture
    pub default_pic_url: String,

    /// Chosen specification value
    pub specification: String,

    /// Units to buy
    pub count: i32,
}

impl From<PreSubmitLine> for PreSubmitLineResponse {
    fn from(line: PreSubmitLine) -> Self {
        Self {
            sku_id: line.sku_id.to_string(),
            title: line.title,
            price: line.price.to_string(),
            default_pic_url: line.default_pic_url,
            specification: line.specification,
            count: line.count,
        }
    }
}

/// Pre-submit Order Response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub(crate) struct PreSubmitResponse {
    /// Order number to submit under, as a decimal string
    pub order_number: String,

    /// Item subtotal
    pub total_money: String,

    /// Freight charge
    pub freight: String,

    /// Amount due
    pub pay_money: String,

    /// Priced lines
    pub lines: Vec<PreSubmitLineResponse>,
}

impl From<PreSubmitOrder> for PreSubmitResponse {
    fn from(order: PreSubmitOrder) -> Self {
        Self {
            order_number: order.order_number.to_string(),
            total_money: order.total_money.to_string(),
            freight: order.freight.to_string(),
            pay_money: order.pay_money.to_string(),
            lines: order
                .lines
                .into_iter()
                .map(PreSubmitLineResponse::from)
                .collect(),
        }
    }
}

/// Pre-submit Order Handler
#[endpoint(
    tags("orders"),
    summary = "Price Order",
    security(("bearer_auth" = [])),
    responses(
        (status_code = StatusCode::OK, description = "Priced order with a fresh order number"),
    ),
)]
pub(crate) async fn handler(
    json: JsonBody<PreSubmitRequest>,
    depot: &mut Depot,
) -> Result<Json<PreSubmitResponse>, ApiError> {
    let state = depot.obtain_or_500::<Arc<State>>()?;
    let user = depot.user_id_or_401()?;
    let lines = into_lines(json.into_inner().lines)?;

    let order = state
        .orders
        .create_pre_submit_order(user, lines)
        .await
        .map_err(into_api_error)?;

    Ok(Json(order.into()))
}
