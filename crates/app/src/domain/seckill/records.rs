//! Seckill Records

use jiff::Timestamp;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::ids::{TypedId, UserId};

/// Seckill item Id
pub type SeckillSkuId = TypedId<SeckillSkuRecord>;

/// A flash-sale item with its own scarce stock, separate from the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeckillSkuRecord {
    pub id: SeckillSkuId,
    pub title: String,
    pub price: Decimal,
    pub stock: i32,
    pub sale: i32,
    pub specification: String,
    pub pic_url: String,
    pub version: i64,
}

/// One unit won by one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeckillPurchaseRecord {
    pub seckill_sku_id: SeckillSkuId,
    pub user_id: UserId,
    pub created_at: Timestamp,
}
