//! Cart Records

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

use crate::{domain::products::records::SkuId, ids::UserId};

/// One stored cart row, identified by user, SKU and specification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartEntryRecord {
    pub user_id: UserId,
    pub sku_id: SkuId,
    pub specification: String,
    pub count: i32,
    pub selected: bool,
    pub version: i64,
    pub created_at: Timestamp,
}
