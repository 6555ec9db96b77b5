//! Cart Models

use jiff::Timestamp;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{domain::products::records::SkuId, ids::UserId};

/// A cart line as shown to the shopper, and as cached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartLine {
    pub sku_id: SkuId,
    pub title: String,
    pub price: Decimal,
    pub default_pic_url: String,
    pub publish_status: i16,
    pub specification: String,
    pub count: i32,
    pub selected: bool,
    pub created_at: Timestamp,
}

/// Identity of one cart line within a user's cart.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CartLineRef {
    pub sku_id: SkuId,
    pub specification: String,
}

/// Lines to drop from a cart once an order containing them was submitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartCleanup {
    pub user_id: UserId,
    pub lines: Vec<CartLineRef>,
}
