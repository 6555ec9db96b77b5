//! Orders
//!
//! Order numbering, pre-submission pricing and atomic order assembly.

pub mod errors;
pub mod models;
pub mod records;
pub(crate) mod repository;
pub mod service;

pub use errors::OrdersServiceError;
pub use service::*;
