//! Product Records

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::ids::TypedId;

/// SKU Id
pub type SkuId = TypedId<SkuRecord>;

/// SPU Id
pub type SpuId = TypedId<SpuRecord>;

/// A purchasable variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkuRecord {
    pub id: SkuId,
    pub spu_id: SpuId,
    pub title: String,
    pub price: Decimal,
    pub stock: i32,
    pub sale: i32,
    pub listed: bool,
    pub version: i64,
}

/// The product a group of SKUs belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpuRecord {
    pub id: SpuId,
    pub name: String,
    pub default_pic_url: String,
    pub publish_status: i16,
}
