//! Cache key layout.

use crate::{
    domain::{orders::records::OrderNumber, products::records::SkuId},
    ids::UserId,
};

/// Pre-issued order numbers awaiting submission.
pub fn order_number(order: OrderNumber) -> String {
    format!("order:num:{order}")
}

/// Hash of a user's cart display lines.
pub fn cart(user: UserId) -> String {
    format!("order:cart:{user}")
}

/// Field of one cart line inside [`cart`].
pub fn cart_field(sku: SkuId, specification: &str) -> String {
    format!("{sku}:{specification}")
}

/// Declared specification document of the product a SKU belongs to.
pub fn specification(sku: SkuId) -> String {
    format!("product:spu:specification:{sku}")
}

/// Per-user seckill cooldown marker.
pub fn seckill_user(user: UserId) -> String {
    format!("seckill:uid:{user}")
}
