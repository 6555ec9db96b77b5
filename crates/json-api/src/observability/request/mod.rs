//! Per-request span, access log and HTTP metrics.
//!
//! Every request runs inside an `http.request` span tagged with its storefront
//! area and, when the path names one, the order or SKU it targets. The caller
//! is recorded once authentication has run further down the chain.

mod propagation;
mod spans;

use std::time::Instant;

use salvo::{
    Request, handler,
    http::StatusCode,
    prelude::{Depot, FlowCtrl, Response},
};
use tracing::{Instrument as _, Span, error, field, info, warn};
use tracing_opentelemetry::OpenTelemetrySpanExt as _;

use self::spans::RequestRoute;
use super::{metrics, settings};
use crate::extensions::*;

#[handler]
pub(crate) async fn request_logging(
    req: &mut Request,
    depot: &mut Depot,
    res: &mut Response,
    ctrl: &mut FlowCtrl,
) {
    if req.uri().path() == "/metrics" {
        ctrl.call_next(req, depot, res).await;
        return;
    }

    let started = Instant::now();
    let request_id =
        propagation::request_id(req.header::<String>(propagation::REQUEST_ID_HEADER));

    propagation::echo_request_id(res, &request_id);

    let method = req.method().to_string();
    let path = req.uri().path().to_owned();
    let route = RequestRoute::classify(&path);
    let _in_flight = metrics::InFlightRequestGuard::track();

    let span = tracing::info_span!(
        parent: None,
        "http.request",
        otel.name = %route.span_name(&method),
        otel.kind = "server",
        request_id = %request_id,
        method = %method,
        path = %path,
        remote_addr = %req.remote_addr(),
        area = route.area.as_str(),
        order = field::Empty,
        sku = field::Empty,
        user_id = field::Empty,
        status = field::Empty,
        duration_ms = field::Empty,
    );

    if let Some(order) = &route.order {
        span.record("order", order.as_str());
    }
    if let Some(sku) = &route.sku {
        span.record("sku", sku.as_str());
    }

    if settings::otel_parent_propagation_enabled()
        && let Some(parent) = propagation::remote_parent(req.headers())
        && let Err(source) = span.set_parent(parent)
    {
        warn!("failed to attach remote trace parent: {source}");
    }

    ctrl.call_next(req, depot, res)
        .instrument(span.clone())
        .await;

    if let Ok(user) = depot.user_id_or_401() {
        span.record("user_id", field::display(user));
    }

    let elapsed = started.elapsed();
    let status = res.status_code.unwrap_or(StatusCode::OK);

    metrics::observe_request(&method, &route.template, status.as_u16(), elapsed.as_secs_f64());

    complete(&span, status, elapsed.as_millis());
}

fn complete(span: &Span, status: StatusCode, duration_ms: u128) {
    let threshold_ms = u128::from(settings::slow_request_threshold_ms());

    span.record("status", status.as_u16());
    span.record("duration_ms", duration_ms);

    span.in_scope(|| {
        if status.is_server_error() {
            error!(status = status.as_u16(), duration_ms, "request failed");
        } else if status.is_client_error() {
            warn!(status = status.as_u16(), duration_ms, "request rejected");
        } else {
            info!(status = status.as_u16(), duration_ms, "request completed");
        }

        if duration_ms > threshold_ms {
            warn!(duration_ms, threshold_ms, "slow request");
        }
    });
}
