//! Inventory Repository

use sqlx::{FromRow, Postgres, Row, Transaction, postgres::PgRow, query_as};

use crate::domain::inventory::records::{StockKey, StockRecord};

const GET_SKU_STOCK_SQL: &str = include_str!("sql/get_sku_stock.sql");
const GET_SECKILL_STOCK_SQL: &str = include_str!("sql/get_seckill_stock.sql");
const UPDATE_SKU_STOCK_SQL: &str = include_str!("sql/update_sku_stock.sql");
const UPDATE_SECKILL_STOCK_SQL: &str = include_str!("sql/update_seckill_stock.sql");

#[derive(Debug, Clone, Default)]
pub(crate) struct PgInventoryRepository;

impl PgInventoryRepository {
    #[must_use]
    pub(crate) fn new() -> Self {
        Self
    }

    pub(crate) async fn get_stock(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        key: StockKey,
    ) -> Result<Option<StockRecord>, sqlx::Error> {
        let sql = match key {
            StockKey::Sku(_) => GET_SKU_STOCK_SQL,
            StockKey::Seckill(_) => GET_SECKILL_STOCK_SQL,
        };

        query_as::<Postgres, StockRecord>(sql)
            .bind(key.id())
            .fetch_optional(&mut **tx)
            .await
    }

    /// Write `stock` only if the row still carries `read.version`.
    ///
    /// Returns `None` when another writer got there first. `sold` is added to
    /// the seckill sale counter and ignored for catalog SKUs.
    pub(crate) async fn compare_and_set(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        key: StockKey,
        read: &StockRecord,
        stock: i32,
        sold: i32,
    ) -> Result<Option<StockRecord>, sqlx::Error> {
        match key {
            StockKey::Sku(_) => {
                query_as::<Postgres, StockRecord>(UPDATE_SKU_STOCK_SQL)
                    .bind(key.id())
                    .bind(stock)
                    .bind(read.version)
                    .fetch_optional(&mut **tx)
                    .await
            }
            StockKey::Seckill(_) => {
                query_as::<Postgres, StockRecord>(UPDATE_SECKILL_STOCK_SQL)
                    .bind(key.id())
                    .bind(stock)
                    .bind(sold)
                    .bind(read.version)
                    .fetch_optional(&mut **tx)
                    .await
            }
        }
    }
}

impl<'r> FromRow<'r, PgRow> for StockRecord {
    fn from_row(row: &'r PgRow) -> sqlx::Result<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            stock: row.try_get("stock")?,
            listed: row.try_get("listed")?,
            version: row.try_get("version")?,
        })
    }
}
