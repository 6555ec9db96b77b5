//! Products Repository

use sqlx::{FromRow, Postgres, Row, Transaction, postgres::PgRow, query_as, query_scalar};

use crate::domain::products::records::{SkuId, SkuRecord, SpuId, SpuRecord};

const GET_SKU_SQL: &str = include_str!("sql/get_sku.sql");
const GET_SPU_OF_SKU_SQL: &str = include_str!("sql/get_spu_of_sku.sql");
const GET_DEFAULT_PIC_SQL: &str = include_str!("sql/get_default_pic.sql");
const GET_SPECIFICATION_SQL: &str = include_str!("sql/get_specification.sql");

/// Listed SKUs carry `valid = 1`.
pub(crate) const LISTED: i16 = 1;

#[derive(Debug, Clone, Default)]
pub(crate) struct PgProductsRepository;

impl PgProductsRepository {
    #[must_use]
    pub(crate) fn new() -> Self {
        Self
    }

    pub(crate) async fn get_sku(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        sku: SkuId,
    ) -> Result<SkuRecord, sqlx::Error> {
        query_as::<Postgres, SkuRecord>(GET_SKU_SQL)
            .bind(sku.into_i64())
            .fetch_one(&mut **tx)
            .await
    }

    /// The product a SKU belongs to.
    pub(crate) async fn get_spu_of_sku(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        sku: SkuId,
    ) -> Result<SpuRecord, sqlx::Error> {
        query_as::<Postgres, SpuRecord>(GET_SPU_OF_SKU_SQL)
            .bind(sku.into_i64())
            .fetch_one(&mut **tx)
            .await
    }

    /// The SKU's default picture. Fails with `RowNotFound` when none is marked.
    pub(crate) async fn get_default_pic(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        sku: SkuId,
    ) -> Result<String, sqlx::Error> {
        query_scalar::<Postgres, String>(GET_DEFAULT_PIC_SQL)
            .bind(sku.into_i64())
            .fetch_one(&mut **tx)
            .await
    }

    pub(crate) async fn get_specification(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        sku: SkuId,
    ) -> Result<String, sqlx::Error> {
        query_scalar::<Postgres, String>(GET_SPECIFICATION_SQL)
            .bind(sku.into_i64())
            .fetch_one(&mut **tx)
            .await
    }
}

impl<'r> FromRow<'r, PgRow> for SkuRecord {
    fn from_row(row: &'r PgRow) -> sqlx::Result<Self> {
        Ok(Self {
            id: SkuId::from_i64(row.try_get("id")?),
            spu_id: SpuId::from_i64(row.try_get("spu_id")?),
            title: row.try_get("title")?,
            price: row.try_get("price")?,
            stock: row.try_get("stock")?,
            sale: row.try_get("sale")?,
            listed: row.try_get::<i16, _>("valid")? == LISTED,
            version: row.try_get("version")?,
        })
    }
}

impl<'r> FromRow<'r, PgRow> for SpuRecord {
    fn from_row(row: &'r PgRow) -> sqlx::Result<Self> {
        Ok(Self {
            id: SpuId::from_i64(row.try_get("id")?),
            name: row.try_get("name")?,
            default_pic_url: row.try_get("default_pic_url")?,
            publish_status: row.try_get("publish_status")?,
        })
    }
}
