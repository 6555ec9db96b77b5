//! Cart Handlers

use salvo::oapi::ToSchema;
use serde::{Deserialize, Serialize};

use stockroom_app::domain::carts::records::CartEntryRecord;

pub(crate) mod count;
pub(crate) mod delete;
pub(crate) mod index;
pub(crate) mod selection;
pub(crate) mod upsert;

/// Cart Entry Response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub(crate) struct CartEntryResponse {
    /// SKU id, as a decimal string
    pub sku_id: String,

    /// Chosen specification value
    pub specification: String,

    /// Units in the cart
    pub count: i32,

    /// Whether the line is selected for checkout
    pub selected: bool,

    /// When the line was first added
    pub created_at: String,
}

impl From<CartEntryRecord> for CartEntryResponse {
    fn from(entry: CartEntryRecord) -> Self {
        Self {
            sku_id: entry.sku_id.to_string(),
            specification: entry.specification,
            count: entry.count,
            selected: entry.selected,
            created_at: entry.created_at.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use jiff::Timestamp;

    use stockroom_app::domain::{carts::records::CartEntryRecord, products::records::SkuId};

    use crate::test_helpers::TEST_USER;

    pub(super) const SKU: SkuId = SkuId::from_i64(101);

    pub(super) fn make_entry(count: i32, selected: bool) -> CartEntryRecord {
        CartEntryRecord {
            user_id: TEST_USER,
            sku_id: SKU,
            specification: "red".to_string(),
            count,
            selected,
            version: 1,
            created_at: Timestamp::UNIX_EPOCH,
        }
    }
}
