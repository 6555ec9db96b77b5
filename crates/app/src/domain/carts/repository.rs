//! Carts Repository

use jiff_sqlx::Timestamp as SqlxTimestamp;
use sqlx::{FromRow, Postgres, Row, Transaction, postgres::PgRow, query, query_as, query_scalar};

use crate::{
    domain::{carts::records::CartEntryRecord, products::records::SkuId},
    ids::UserId,
};

const GET_ENTRY_SQL: &str = include_str!("sql/get_entry.sql");
const INSERT_ENTRY_SQL: &str = include_str!("sql/insert_entry.sql");
const UPDATE_COUNT_SQL: &str = include_str!("sql/update_count.sql");
const SET_SELECTED_SQL: &str = include_str!("sql/set_selected.sql");
const DELETE_ENTRY_SQL: &str = include_str!("sql/delete_entry.sql");
const DELETE_VERSIONED_ENTRY_SQL: &str = include_str!("sql/delete_versioned_entry.sql");
const LIST_ENTRIES_SQL: &str = include_str!("sql/list_entries.sql");
const COUNT_ENTRIES_SQL: &str = include_str!("sql/count_entries.sql");

pub(crate) const SELECTED: i16 = 1;
pub(crate) const UNSELECTED: i16 = 2;

#[derive(Debug, Clone, Default)]
pub(crate) struct PgCartsRepository;

impl PgCartsRepository {
    #[must_use]
    pub(crate) fn new() -> Self {
        Self
    }

    pub(crate) async fn get_entry(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        user: UserId,
        sku: SkuId,
        specification: &str,
    ) -> Result<Option<CartEntryRecord>, sqlx::Error> {
        query_as::<Postgres, CartEntryRecord>(GET_ENTRY_SQL)
            .bind(user.into_i64())
            .bind(sku.into_i64())
            .bind(specification)
            .fetch_optional(&mut **tx)
            .await
    }

    pub(crate) async fn insert_entry(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        user: UserId,
        sku: SkuId,
        specification: &str,
        count: i32,
    ) -> Result<CartEntryRecord, sqlx::Error> {
        query_as::<Postgres, CartEntryRecord>(INSERT_ENTRY_SQL)
            .bind(user.into_i64())
            .bind(sku.into_i64())
            .bind(specification)
            .bind(count)
            .fetch_one(&mut **tx)
            .await
    }

    /// Returns `None` when the row moved past `version`.
    pub(crate) async fn update_count(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        entry: &CartEntryRecord,
        count: i32,
    ) -> Result<Option<CartEntryRecord>, sqlx::Error> {
        query_as::<Postgres, CartEntryRecord>(UPDATE_COUNT_SQL)
            .bind(entry.user_id.into_i64())
            .bind(entry.sku_id.into_i64())
            .bind(&entry.specification)
            .bind(count)
            .bind(entry.version)
            .fetch_optional(&mut **tx)
            .await
    }

    pub(crate) async fn set_selected(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        user: UserId,
        sku: SkuId,
        specification: &str,
        selected: bool,
    ) -> Result<CartEntryRecord, sqlx::Error> {
        query_as::<Postgres, CartEntryRecord>(SET_SELECTED_SQL)
            .bind(user.into_i64())
            .bind(sku.into_i64())
            .bind(specification)
            .bind(if selected { SELECTED } else { UNSELECTED })
            .fetch_one(&mut **tx)
            .await
    }

    pub(crate) async fn delete_entry(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        user: UserId,
        sku: SkuId,
        specification: &str,
    ) -> Result<u64, sqlx::Error> {
        let rows_affected = query(DELETE_ENTRY_SQL)
            .bind(user.into_i64())
            .bind(sku.into_i64())
            .bind(specification)
            .execute(&mut **tx)
            .await?
            .rows_affected();

        Ok(rows_affected)
    }

    /// Returns `false` when the row moved past `version`.
    pub(crate) async fn delete_versioned_entry(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        entry: &CartEntryRecord,
    ) -> Result<bool, sqlx::Error> {
        let rows_affected = query(DELETE_VERSIONED_ENTRY_SQL)
            .bind(entry.user_id.into_i64())
            .bind(entry.sku_id.into_i64())
            .bind(&entry.specification)
            .bind(entry.version)
            .execute(&mut **tx)
            .await?
            .rows_affected();

        Ok(rows_affected == 1)
    }

    pub(crate) async fn list_entries(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        user: UserId,
    ) -> Result<Vec<CartEntryRecord>, sqlx::Error> {
        query_as::<Postgres, CartEntryRecord>(LIST_ENTRIES_SQL)
            .bind(user.into_i64())
            .fetch_all(&mut **tx)
            .await
    }

    pub(crate) async fn count_entries(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        user: UserId,
    ) -> Result<i64, sqlx::Error> {
        query_scalar::<Postgres, i64>(COUNT_ENTRIES_SQL)
            .bind(user.into_i64())
            .fetch_one(&mut **tx)
            .await
    }
}

impl<'r> FromRow<'r, PgRow> for CartEntryRecord {
    fn from_row(row: &'r PgRow) -> sqlx::Result<Self> {
        Ok(Self {
            user_id: UserId::from_i64(row.try_get("user_id")?),
            sku_id: SkuId::from_i64(row.try_get("sku_id")?),
            specification: row.try_get("specification")?,
            count: row.try_get("count")?,
            selected: row.try_get::<i16, _>("selected")? == SELECTED,
            version: row.try_get("version")?,
            created_at: row.try_get::<SqlxTimestamp, _>("created_at")?.to_jiff(),
        })
    }
}
