//! Replication log sources.

use async_trait::async_trait;
use mockall::automock;
use sqlx::{FromRow, PgPool, Postgres, Row, postgres::PgRow, query, query_as, query_scalar};
use tracing::info;

use crate::cdc::CdcError;

const SLOT_EXISTS_SQL: &str = include_str!("sql/slot_exists.sql");
const CREATE_SLOT_SQL: &str = include_str!("sql/create_slot.sql");
const PEEK_CHANGES_SQL: &str = include_str!("sql/peek_changes.sql");
const ADVANCE_SLOT_SQL: &str = include_str!("sql/advance_slot.sql");
const DROP_SLOT_SQL: &str = include_str!("sql/drop_slot.sql");

/// One line of decoder output and the log position it was read at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotChange {
    pub lsn: String,
    pub data: String,
}

impl<'r> FromRow<'r, PgRow> for SlotChange {
    fn from_row(row: &'r PgRow) -> sqlx::Result<Self> {
        Ok(Self {
            lsn: row.try_get("lsn")?,
            data: row.try_get("data")?,
        })
    }
}

#[automock]
#[async_trait]
pub trait ChangeSource: Send + Sync {
    /// Read up to about `limit` unacknowledged changes, oldest first, without consuming them.
    ///
    /// Whole transactions are returned, so a batch may overshoot `limit`.
    async fn peek(&self, limit: i32) -> Result<Vec<SlotChange>, CdcError>;

    /// Consume every change up to and including `lsn`.
    async fn acknowledge(&self, lsn: &str) -> Result<(), CdcError>;
}

/// A `PostgreSQL` logical replication slot decoded with `test_decoding`.
///
/// Changes are peeked and only consumed once acknowledged, so a crash between
/// the two replays the batch.
#[derive(Debug, Clone)]
pub struct PgLogicalSlotSource {
    pool: PgPool,
    slot: String,
}

impl PgLogicalSlotSource {
    #[must_use]
    pub fn new(pool: PgPool, slot: impl Into<String>) -> Self {
        Self {
            pool,
            slot: slot.into(),
        }
    }

    /// Create the slot unless it exists. Returns whether it was created.
    ///
    /// # Errors
    ///
    /// Returns an error when the server refuses, e.g. because `wal_level` is not `logical`.
    pub async fn ensure_slot(&self) -> Result<bool, CdcError> {
        let exists = query_scalar::<Postgres, bool>(SLOT_EXISTS_SQL)
            .bind(&self.slot)
            .fetch_one(&self.pool)
            .await?;

        if exists {
            return Ok(false);
        }

        let lsn = query_scalar::<Postgres, String>(CREATE_SLOT_SQL)
            .bind(&self.slot)
            .fetch_one(&self.pool)
            .await?;

        info!(slot = %self.slot, lsn = %lsn, "created replication slot");

        Ok(true)
    }

    /// Drop the slot, releasing the WAL it retains.
    ///
    /// # Errors
    ///
    /// Returns an error when the slot does not exist or is in use.
    pub async fn drop_slot(&self) -> Result<(), CdcError> {
        query(DROP_SLOT_SQL)
            .bind(&self.slot)
            .execute(&self.pool)
            .await?;

        info!(slot = %self.slot, "dropped replication slot");

        Ok(())
    }
}

#[async_trait]
impl ChangeSource for PgLogicalSlotSource {
    async fn peek(&self, limit: i32) -> Result<Vec<SlotChange>, CdcError> {
        Ok(query_as::<Postgres, SlotChange>(PEEK_CHANGES_SQL)
            .bind(&self.slot)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn acknowledge(&self, lsn: &str) -> Result<(), CdcError> {
        query(ADVANCE_SLOT_SQL)
            .bind(&self.slot)
            .bind(lsn)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
