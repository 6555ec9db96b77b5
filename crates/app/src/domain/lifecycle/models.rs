//! Lifecycle Models

use serde::Serialize;

use crate::domain::orders::records::OrderStatus;

/// What a timeout delivery did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TimeoutOutcome {
    /// The order no longer exists, typically because the user deleted it.
    UnknownOrder,

    /// An earlier delivery already expired the order.
    AlreadyExpired,

    /// The order left pending payment before its window closed.
    AlreadySettled { status: OrderStatus },

    /// The order was expired by this delivery.
    Expired {
        /// Lines whose stock went back to the catalog.
        reclaimed: usize,

        /// Lines skipped because their SKU is gone or delisted.
        skipped: usize,
    },
}
