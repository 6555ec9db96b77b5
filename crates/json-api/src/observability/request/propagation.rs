//! Correlation across process boundaries: the `x-request-id` header in both
//! directions and W3C trace parents on the way in.

use opentelemetry::{Context, global, propagation::Extractor, trace::TraceContextExt as _};
use salvo::{
    http::{HeaderMap, HeaderName, header::HeaderValue},
    prelude::Response,
};
use tracing::warn;
use uuid::Uuid;

pub(super) const REQUEST_ID_HEADER: &str = "x-request-id";

/// Longest caller-supplied request id that is echoed back.
const MAX_REQUEST_ID_LEN: usize = 128;

/// Reuse the caller's request id when it is usable, otherwise mint a v7 UUID.
pub(super) fn request_id(supplied: Option<String>) -> String {
    supplied
        .map(|value| value.trim().to_owned())
        .filter(|value| {
            !value.is_empty()
                && value.len() <= MAX_REQUEST_ID_LEN
                && value.bytes().all(|byte| byte.is_ascii_graphic())
        })
        .unwrap_or_else(|| Uuid::now_v7().to_string())
}

pub(super) fn echo_request_id(res: &mut Response, request_id: &str) {
    match HeaderValue::from_str(request_id) {
        Ok(value) => {
            res.headers_mut().insert(REQUEST_ID_HEADER, value);
        }
        Err(source) => warn!(request_id, "request id is not a valid header value: {source}"),
    }
}

/// The remote span context carried by `traceparent`, when there is a valid one.
pub(super) fn remote_parent(headers: &HeaderMap) -> Option<Context> {
    global::get_text_map_propagator(|propagator| {
        let context = propagator.extract_with_context(&Context::new(), &Carrier(headers));

        context.span().span_context().is_valid().then_some(context)
    })
}

#[derive(Debug)]
struct Carrier<'a>(&'a HeaderMap);

impl Extractor for Carrier<'_> {
    fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|value| value.to_str().ok())
    }

    fn keys(&self) -> Vec<&str> {
        self.0.keys().map(HeaderName::as_str).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caller_request_ids_are_reused() {
        assert_eq!(request_id(Some(" checkout-42 ".to_owned())), "checkout-42");
    }

    #[test]
    fn unusable_request_ids_are_replaced() {
        let blank = request_id(Some("   ".to_owned()));
        let spaced = request_id(Some("two words".to_owned()));
        let oversized = request_id(Some("x".repeat(MAX_REQUEST_ID_LEN + 1)));

        for minted in [blank, spaced, oversized] {
            assert!(Uuid::parse_str(&minted).is_ok(), "expected a uuid, got {minted}");
        }
    }

    #[test]
    fn missing_trace_headers_have_no_parent() {
        assert!(remote_parent(&HeaderMap::new()).is_none());
    }
}
