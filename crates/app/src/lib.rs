//! Order and inventory consistency services.

pub mod cache;
pub mod cdc;
pub mod context;
pub mod database;
pub mod domain;
pub mod ids;
pub mod messaging;
pub mod rate_limit;
pub mod retry;
pub mod settings;
pub mod snowflake;

#[cfg(test)]
mod test;
