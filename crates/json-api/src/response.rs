//! Response codes and the error body every failing handler renders.

use std::{fmt, str::FromStr};

use salvo::{
    http::StatusCode,
    oapi::{self, Components, EndpointOutRegister, Operation, ToSchema},
    prelude::*,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Stable numeric codes clients switch on, independent of the HTTP status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ResponseCode {
    ServiceBusy,
    InvalidParams,
    Unauthorized,
    UnknownSku,
    Delisted,
    InsufficientStock,
    InvalidSpecification,
    InvalidQuantity,
    CartLineMissing,
    OrderNumberNotLive,
    DuplicateOrder,
    OrderMissing,
    OrderNotPayable,
    TooManyRequests,
    SeckillFinished,
    CoolingDown,
}

impl ResponseCode {
    pub(crate) const fn code(self) -> u16 {
        match self {
            Self::ServiceBusy => 500,
            Self::InvalidParams => 1003,
            Self::Unauthorized => 1010,
            Self::UnknownSku => 1030,
            Self::Delisted => 1031,
            Self::InsufficientStock => 1032,
            Self::InvalidSpecification => 1033,
            Self::InvalidQuantity => 1034,
            Self::CartLineMissing => 1035,
            Self::OrderNumberNotLive => 1036,
            Self::DuplicateOrder => 1037,
            Self::OrderMissing => 1038,
            Self::OrderNotPayable => 1039,
            Self::TooManyRequests => 1040,
            Self::SeckillFinished => 1041,
            Self::CoolingDown => 1042,
        }
    }

    pub(crate) const fn message(self) -> &'static str {
        match self {
            Self::ServiceBusy => "service busy, please try again later",
            Self::InvalidParams => "invalid parameters",
            Self::Unauthorized => "missing or invalid credentials",
            Self::UnknownSku => "product does not exist",
            Self::Delisted => "product is no longer on sale",
            Self::InsufficientStock => "insufficient stock",
            Self::InvalidSpecification => "specification is not offered for this product",
            Self::InvalidQuantity => "quantity must be positive",
            Self::CartLineMissing => "cart line not found",
            Self::OrderNumberNotLive => "order number expired or unknown, please resubmit",
            Self::DuplicateOrder => "order was already submitted",
            Self::OrderMissing => "order not found",
            Self::OrderNotPayable => "order can no longer be paid",
            Self::TooManyRequests => "too many requests, please try again later",
            Self::SeckillFinished => "flash sale has ended",
            Self::CoolingDown => "please wait before trying again",
        }
    }

    pub(crate) const fn status(self) -> StatusCode {
        match self {
            Self::ServiceBusy => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::UnknownSku | Self::CartLineMissing | Self::OrderMissing => StatusCode::NOT_FOUND,
            Self::OrderNumberNotLive
            | Self::DuplicateOrder
            | Self::OrderNotPayable
            | Self::InsufficientStock
            | Self::SeckillFinished => StatusCode::CONFLICT,
            Self::TooManyRequests | Self::CoolingDown => StatusCode::TOO_MANY_REQUESTS,
            Self::InvalidParams
            | Self::Delisted
            | Self::InvalidSpecification
            | Self::InvalidQuantity => StatusCode::BAD_REQUEST,
        }
    }
}

impl fmt::Display for ResponseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.code(), self.message())
    }
}

/// Error Response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub(crate) struct ErrorResponse {
    /// Stable numeric response code
    pub code: u16,

    /// Human-readable message
    pub msg: String,
}

/// A handler failure, rendered as an [`ErrorResponse`] with the code's HTTP status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("{0}")]
pub(crate) struct ApiError(pub(crate) ResponseCode);

impl ApiError {
    pub(crate) const fn code(self) -> ResponseCode {
        self.0
    }
}

impl From<ResponseCode> for ApiError {
    fn from(code: ResponseCode) -> Self {
        Self(code)
    }
}

impl Scribe for ApiError {
    fn render(self, res: &mut Response) {
        res.status_code(self.0.status());
        res.render(Json(ErrorResponse {
            code: self.0.code(),
            msg: self.0.message().to_string(),
        }));
    }
}

impl EndpointOutRegister for ApiError {
    fn register(components: &mut Components, operation: &mut Operation) {
        let schema = ErrorResponse::to_schema(components);

        operation.responses.insert(
            "default",
            oapi::Response::new("Error with a numeric response code")
                .add_content("application/json", oapi::Content::new(schema)),
        );
    }
}

/// Parse a decimal string id, as ids travel as strings in JSON.
pub(crate) fn parse_id<T>(value: &str) -> Result<T, ApiError>
where
    T: FromStr,
{
    value
        .trim()
        .parse()
        .map_err(|_invalid| ApiError(ResponseCode::InvalidParams))
}

#[cfg(test)]
mod tests {
    use salvo::test::{ResponseExt, TestClient};
    use testresult::TestResult;

    use super::*;

    #[handler]
    async fn fails() -> Result<&'static str, ApiError> {
        Err(ApiError(ResponseCode::InsufficientStock))
    }

    #[tokio::test]
    async fn error_renders_code_and_status() -> TestResult {
        let service = Service::new(Router::new().get(fails));

        let mut res = TestClient::get("http://example.com").send(&service).await;
        let body: ErrorResponse = res.take_json().await?;

        assert_eq!(res.status_code, Some(StatusCode::CONFLICT));
        assert_eq!(body.code, 1032);
        assert_eq!(body.msg, "insufficient stock");

        Ok(())
    }

    #[test]
    fn ids_parse_from_decimal_strings() {
        assert_eq!(parse_id::<i64>(" 42 "), Ok(42));
        assert_eq!(
            parse_id::<i64>("4x2"),
            Err(ApiError(ResponseCode::InvalidParams))
        );
    }
}
