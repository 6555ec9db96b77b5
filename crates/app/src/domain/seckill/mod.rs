//! Seckill
//!
//! Flash-sale admission and the queued purchase path behind it.

pub mod errors;
pub mod handler;
pub mod models;
pub mod records;
pub(crate) mod repository;
pub mod service;

pub use errors::SeckillError;
pub use handler::SeckillPurchaseHandler;
pub use service::*;
