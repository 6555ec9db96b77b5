//! Seckill Models

use serde::{Deserialize, Serialize};

use crate::{domain::seckill::records::SeckillSkuId, ids::UserId};

/// An admitted purchase request, as queued for the purchase consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeckillRequest {
    pub user_id: UserId,
    pub seckill_sku_id: SeckillSkuId,
}

/// Result of draining one request from the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PurchaseOutcome {
    Purchased { remaining: i32 },

    /// A redelivery of a request that already won its unit.
    AlreadyPurchased,

    SoldOut,

    /// Conflicts outlasted the retry policy.
    Contended,

    UnknownSku,
}
