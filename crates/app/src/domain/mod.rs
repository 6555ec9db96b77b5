//! Stockroom Domain Concerns

pub mod carts;
pub mod inventory;
pub mod lifecycle;
pub mod orders;
pub mod products;
pub mod seckill;
