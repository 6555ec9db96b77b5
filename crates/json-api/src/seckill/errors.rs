//! Errors

use tracing::error;

use stockroom_app::domain::seckill::SeckillError;

use crate::{
    observability::SeckillAdmission,
    response::{ApiError, ResponseCode},
};

pub(crate) fn into_api_error(error: SeckillError) -> ApiError {
    let code = match error {
        SeckillError::CoolingDown => ResponseCode::CoolingDown,
        SeckillError::TooManyRequests => ResponseCode::TooManyRequests,
        SeckillError::Finished => ResponseCode::SeckillFinished,
        SeckillError::UnknownSku | SeckillError::NotFound | SeckillError::InvalidReference => {
            ResponseCode::UnknownSku
        }
        SeckillError::MissingRequiredData | SeckillError::InvalidData => {
            ResponseCode::InvalidParams
        }
        SeckillError::AlreadyExists
        | SeckillError::Stock(_)
        | SeckillError::Cache(_)
        | SeckillError::Broker(_)
        | SeckillError::Sql(_) => {
            error!("seckill operation failed: {error}");

            ResponseCode::ServiceBusy
        }
    };

    ApiError(code)
}

/// Metric label for a rejected admission.
pub(crate) const fn admission_outcome(error: &ApiError) -> SeckillAdmission {
    match error.code() {
        ResponseCode::CoolingDown => SeckillAdmission::CoolingDown,
        ResponseCode::TooManyRequests => SeckillAdmission::Throttled,
        ResponseCode::SeckillFinished => SeckillAdmission::Finished,
        _ => SeckillAdmission::Failed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gate_rejections_map_to_their_codes() {
        assert_eq!(
            into_api_error(SeckillError::CoolingDown),
            ApiError(ResponseCode::CoolingDown)
        );
        assert_eq!(
            into_api_error(SeckillError::TooManyRequests),
            ApiError(ResponseCode::TooManyRequests)
        );
        assert_eq!(
            into_api_error(SeckillError::Finished),
            ApiError(ResponseCode::SeckillFinished)
        );
    }

    #[test]
    fn rejections_are_labelled_for_metrics() {
        assert_eq!(
            admission_outcome(&ApiError(ResponseCode::TooManyRequests)),
            SeckillAdmission::Throttled
        );
        assert_eq!(
            admission_outcome(&ApiError(ResponseCode::ServiceBusy)),
            SeckillAdmission::Failed
        );
    }
}
