//! Carts
//!
//! Per-user cart lines keyed by SKU and specification, stored in `PostgreSQL`
//! and mirrored into a per-user cache hash.

pub mod cleanup;
pub mod errors;
pub mod models;
pub mod records;
pub(crate) mod repository;
pub mod service;
pub mod sync;

pub use cleanup::CartCleanupHandler;
pub use errors::CartsServiceError;
pub use service::*;
pub use sync::CartCacheSyncHandler;
