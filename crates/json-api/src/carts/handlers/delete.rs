//! Remove Cart Line Handler

use std::sync::Arc;

use salvo::{
    oapi::extract::{PathParam, QueryParam},
    prelude::*,
};
use tracing::field::{Empty, display};

use stockroom_app::domain::products::records::SkuId;

use crate::{
    carts::errors::into_api_error,
    extensions::*,
    response::{ApiError, parse_id},
    state::State,
};

/// Remove Cart Line Handler
#[endpoint(
    tags("cart"),
    summary = "Remove Cart Line",
    security(("bearer_auth" = [])),
    responses(
        (status_code = StatusCode::OK, description = "Line removed"),
    ),
)]
#[tracing::instrument(
    name = "cart.remove",
    skip(sku, specification, depot),
    fields(user_id = Empty, sku_id = Empty),
    err
)]
pub(crate) async fn handler(
    sku: PathParam<String>,
    specification: QueryParam<String, true>,
    depot: &mut Depot,
) -> Result<StatusCode, ApiError> {
    let state = depot.obtain_or_500::<Arc<State>>()?;
    let user = depot.user_id_or_401()?;
    let sku: SkuId = parse_id(&sku.into_inner())?;

    let span = tracing::Span::current();

    span.record("user_id", display(user));
    span.record("sku_id", display(sku));

    state
        .carts
        .remove(user, sku, specification.into_inner())
        .await
        .map_err(into_api_error)?;

    tracing::info!(sku_id = %sku, "removed cart line");

    Ok(StatusCode::OK)
}
