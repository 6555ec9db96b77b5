//! Inventory
//!
//! The authoritative stock count per SKU and per seckill item, with
//! version-checked decrement and increment.

pub mod errors;
pub mod records;
pub(crate) mod repository;
pub mod service;

pub use errors::{InventoryError, StockRejection};
pub use service::*;
