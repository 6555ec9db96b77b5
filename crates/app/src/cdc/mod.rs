//! Change data capture for the cart table.
//!
//! Cart rows written outside the cart service (admin tools, other services)
//! reach the cart cache by way of the replication log: a tailer decodes row
//! changes from a logical slot and republishes them to the cart cache queues,
//! where [`crate::domain::carts::CartCacheSyncHandler`] applies them.

use thiserror::Error;

use crate::messaging::BrokerError;

pub mod decoding;
pub mod publisher;
pub mod source;

pub use decoding::{ChangeKind, RowChange};
pub use publisher::CdcPublisher;
pub use source::{ChangeSource, PgLogicalSlotSource, SlotChange};

#[derive(Debug, Error)]
pub enum CdcError {
    #[error("malformed change at byte {offset}: {reason}")]
    Malformed { offset: usize, reason: &'static str },

    #[error("column {0} missing from change")]
    MissingColumn(&'static str),

    #[error("column {column} has invalid value {value:?}")]
    InvalidColumn { column: &'static str, value: String },

    #[error("failed to publish change")]
    Broker(#[from] BrokerError),

    #[error("replication slot error")]
    Sql(#[from] sqlx::Error),
}
