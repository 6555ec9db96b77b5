//! Seckill Repository

use jiff_sqlx::Timestamp as SqlxTimestamp;
use sqlx::{FromRow, Postgres, Row, Transaction, postgres::PgRow, query_as, query_scalar};

use crate::{
    domain::seckill::records::{SeckillPurchaseRecord, SeckillSkuId, SeckillSkuRecord},
    ids::UserId,
};

const LIST_SECKILL_SKUS_SQL: &str = include_str!("sql/list_seckill_skus.sql");
const GET_SECKILL_SKU_SQL: &str = include_str!("sql/get_seckill_sku.sql");
const TOTAL_SECKILL_STOCK_SQL: &str = include_str!("sql/total_seckill_stock.sql");
const INSERT_PURCHASE_SQL: &str = include_str!("sql/insert_purchase.sql");
const GET_PURCHASE_SQL: &str = include_str!("sql/get_purchase.sql");

#[derive(Debug, Clone, Default)]
pub(crate) struct PgSeckillRepository;

impl PgSeckillRepository {
    #[must_use]
    pub(crate) fn new() -> Self {
        Self
    }

    pub(crate) async fn list_skus(
        &self,
        tx: &mut Transaction<'_, Postgres>,
    ) -> Result<Vec<SeckillSkuRecord>, sqlx::Error> {
        query_as::<Postgres, SeckillSkuRecord>(LIST_SECKILL_SKUS_SQL)
            .fetch_all(&mut **tx)
            .await
    }

    pub(crate) async fn get_sku(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        sku: SeckillSkuId,
    ) -> Result<SeckillSkuRecord, sqlx::Error> {
        query_as::<Postgres, SeckillSkuRecord>(GET_SECKILL_SKU_SQL)
            .bind(sku.into_i64())
            .fetch_one(&mut **tx)
            .await
    }

    pub(crate) async fn total_stock(
        &self,
        tx: &mut Transaction<'_, Postgres>,
    ) -> Result<i64, sqlx::Error> {
        query_scalar::<Postgres, i64>(TOTAL_SECKILL_STOCK_SQL)
            .fetch_one(&mut **tx)
            .await
    }

    /// Record that `user` won a unit of `sku`. `None` if they already had.
    pub(crate) async fn insert_purchase(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        sku: SeckillSkuId,
        user: UserId,
    ) -> Result<Option<SeckillPurchaseRecord>, sqlx::Error> {
        query_as::<Postgres, SeckillPurchaseRecord>(INSERT_PURCHASE_SQL)
            .bind(sku.into_i64())
            .bind(user.into_i64())
            .fetch_optional(&mut **tx)
            .await
    }

    pub(crate) async fn find_purchase(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        sku: SeckillSkuId,
        user: UserId,
    ) -> Result<Option<SeckillPurchaseRecord>, sqlx::Error> {
        query_as::<Postgres, SeckillPurchaseRecord>(GET_PURCHASE_SQL)
            .bind(sku.into_i64())
            .bind(user.into_i64())
            .fetch_optional(&mut **tx)
            .await
    }
}

impl<'r> FromRow<'r, PgRow> for SeckillSkuRecord {
    fn from_row(row: &'r PgRow) -> sqlx::Result<Self> {
        Ok(Self {
            id: SeckillSkuId::from_i64(row.try_get("id")?),
            title: row.try_get("title")?,
            price: row.try_get("price")?,
            stock: row.try_get("stock")?,
            sale: row.try_get("sale")?,
            specification: row.try_get("specification")?,
            pic_url: row.try_get("pic_url")?,
            version: row.try_get("version")?,
        })
    }
}

impl<'r> FromRow<'r, PgRow> for SeckillPurchaseRecord {
    fn from_row(row: &'r PgRow) -> sqlx::Result<Self> {
        Ok(Self {
            seckill_sku_id: SeckillSkuId::from_i64(row.try_get("seckill_sku_id")?),
            user_id: UserId::from_i64(row.try_get("user_id")?),
            created_at: row.try_get::<SqlxTimestamp, _>("created_at")?.to_jiff(),
        })
    }
}
