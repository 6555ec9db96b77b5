//! Order Lifecycle
//!
//! Payment-window timeouts and the transitions that follow from them.

pub mod errors;
pub mod handler;
pub mod models;
pub mod scheduler;
pub mod service;

pub use errors::LifecycleError;
pub use handler::OrderTimeoutHandler;
pub use scheduler::TimeoutScheduler;
pub use service::*;
