//! Inventory Records

use std::fmt;

use crate::domain::{products::records::SkuId, seckill::records::SeckillSkuId};

/// A stock row the ledger can mutate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StockKey {
    /// A catalog SKU, mutated by order submission and timeout reclaim.
    Sku(SkuId),

    /// A seckill item. Decrements also count the unit as sold.
    Seckill(SeckillSkuId),
}

impl StockKey {
    pub(crate) fn id(self) -> i64 {
        match self {
            StockKey::Sku(id) => id.into_i64(),
            StockKey::Seckill(id) => id.into_i64(),
        }
    }
}

impl fmt::Display for StockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StockKey::Sku(id) => write!(f, "sku:{id}"),
            StockKey::Seckill(id) => write!(f, "seckill:{id}"),
        }
    }
}

/// Stock snapshot as read for one optimistic cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StockRecord {
    pub id: i64,
    pub stock: i32,
    pub listed: bool,
    pub version: i64,
}
