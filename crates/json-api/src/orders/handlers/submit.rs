//! Submit Order Handler

use std::sync::Arc;

use salvo::{
    http::header::LOCATION,
    oapi::{ToSchema, extract::JsonBody},
    prelude::*,
};
use serde::{Deserialize, Serialize};
use tracing::field::{Empty, display};

use stockroom_app::domain::orders::{
    models::{NewOrder, Receiver},
    records::OrderNumber,
};

use crate::{
    extensions::*,
    orders::{
        errors::into_api_error,
        handlers::{OrderLineRequest, OrderResponse, into_lines},
    },
    response::{ApiError, ResponseCode, parse_id},
    state::State,
};

/// Receiver Request
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub(crate) struct ReceiverRequest {
    /// Receiver name
    pub name: String,

    /// Mainland mobile number
    pub phone: String,

    /// Delivery address
    pub address: String,
}

impl From<ReceiverRequest> for Receiver {
    fn from(receiver: ReceiverRequest) -> Self {
        Receiver {
            name: receiver.name,
            phone: receiver.phone,
            address: receiver.address,
        }
    }
}

/// Submit Order Request
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub(crate) struct SubmitOrderRequest {
    /// Order number from pre-submission, as a decimal string
    pub order_number: String,

    /// Lines to buy
    pub lines: Vec<OrderLineRequest>,

    /// Who receives the parcel
    pub receiver: ReceiverRequest,
}

/// Submit Order Handler
///
/// The order number must still be live from pre-submission; a number that
/// expired or was never issued is rejected before any stock is touched.
#[endpoint(
    tags("orders"),
    summary = "Submit Order",
    security(("bearer_auth" = [])),
    responses(
        (status_code = StatusCode::CREATED, description = "Order created"),
    ),
)]
#[tracing::instrument(
    name = "orders.submit",
    skip(json, depot, res),
    fields(user_id = Empty, order_number = Empty),
    err
)]
pub(crate) async fn handler(
    json: JsonBody<SubmitOrderRequest>,
    depot: &mut Depot,
    res: &mut Response,
) -> Result<Json<OrderResponse>, ApiError> {
    let state = depot.obtain_or_500::<Arc<State>>()?;
    let user = depot.user_id_or_401()?;
    let request = json.into_inner();

    let order_number: OrderNumber = parse_id(&request.order_number)?;
    let lines = into_lines(request.lines)?;

    let span = tracing::Span::current();

    span.record("user_id", display(user));
    span.record("order_number", display(order_number));

    let live = state
        .orders
        .is_order_number_live(order_number)
        .await
        .map_err(into_api_error)?;

    if !live {
        return Err(ApiError(ResponseCode::OrderNumberNotLive));
    }

    let order = state
        .orders
        .create_submit_order(
            user,
            NewOrder {
                order_number,
                lines,
                receiver: request.receiver.into(),
            },
        )
        .await
        .map_err(into_api_error)?;

    tracing::info!(order_number = %order_number, "submitted order");

    res.add_header(LOCATION, format!("/orders/{order_number}"), true)
        .or_500("failed to set location header")?
        .status_code(StatusCode::CREATED);

    Ok(Json(order.into()))
}
