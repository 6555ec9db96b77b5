//! Products
//!
//! Catalog read paths the consistency components depend on: SKU and SPU
//! attributes, default pictures and declared specifications.

pub mod errors;
pub mod records;
pub(crate) mod repository;
pub mod service;
pub mod specifications;

pub use errors::ProductsServiceError;
pub use service::*;
