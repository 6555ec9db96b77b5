//! Liveness endpoint for load balancers.

use salvo::{oapi::ToSchema, prelude::*};
use serde::{Deserialize, Serialize};

/// Liveness report identifying the running build.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    /// Always `ok` while the process can serve requests.
    pub status: String,

    /// Service name.
    pub service: String,

    /// Crate version of the running binary.
    pub version: String,
}

#[endpoint(tags("health"), summary = "Report that the storefront API is serving")]
pub(crate) async fn handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_owned(),
        service: env!("CARGO_PKG_NAME").to_owned(),
        version: env!("CARGO_PKG_VERSION").to_owned(),
    })
}
