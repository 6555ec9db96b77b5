//! Orders Repository

use std::time::Duration;

use jiff_sqlx::Timestamp as SqlxTimestamp;
use rust_decimal::Decimal;
use sqlx::{FromRow, Postgres, Row, Transaction, postgres::PgRow, query, query_as};

use crate::{
    domain::{
        orders::records::{
            OrderItemRecord, OrderNumber, OrderRecord, OrderStatus, PayStatus, UnknownStatusCode,
        },
        products::records::{SkuId, SpuId},
    },
    ids::UserId,
};

const INSERT_ORDER_SQL: &str = include_str!("sql/insert_order.sql");
const INSERT_ORDER_ITEM_SQL: &str = include_str!("sql/insert_order_item.sql");
const FIND_ORDER_SQL: &str = include_str!("sql/find_order.sql");
const GET_USER_ORDER_SQL: &str = include_str!("sql/get_user_order.sql");
const LIST_ORDER_ITEMS_SQL: &str = include_str!("sql/list_order_items.sql");
const TRANSITION_ORDER_SQL: &str = include_str!("sql/transition_order.sql");
const DELETE_ORDER_SQL: &str = include_str!("sql/delete_order.sql");

/// Columns of a new order row, before the database stamps timestamps.
#[derive(Debug, Clone)]
pub(crate) struct OrderRow<'a> {
    pub(crate) id: OrderNumber,
    pub(crate) user_id: UserId,
    pub(crate) total_money: Decimal,
    pub(crate) freight: Decimal,
    pub(crate) pay_money: Decimal,
    pub(crate) total_num: i32,
    pub(crate) receiver_name: &'a str,
    pub(crate) receiver_phone: &'a str,
    pub(crate) receiver_address: &'a str,
    pub(crate) payment_window: Duration,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct PgOrdersRepository;

impl PgOrdersRepository {
    #[must_use]
    pub(crate) fn new() -> Self {
        Self
    }

    /// Insert a pending, unpaid order expiring `payment_window` from now.
    pub(crate) async fn insert_order(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        row: &OrderRow<'_>,
    ) -> Result<OrderRecord, sqlx::Error> {
        query_as::<Postgres, OrderRecord>(INSERT_ORDER_SQL)
            .bind(row.id.into_i64())
            .bind(row.user_id.into_i64())
            .bind(row.total_money)
            .bind(row.freight)
            .bind(row.pay_money)
            .bind(row.total_num)
            .bind(OrderStatus::PendingPayment.code())
            .bind(PayStatus::Unpaid.code())
            .bind(row.receiver_name)
            .bind(row.receiver_phone)
            .bind(row.receiver_address)
            .bind(row.payment_window.as_secs_f64())
            .fetch_one(&mut **tx)
            .await
    }

    pub(crate) async fn insert_item(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        item: &OrderItemRecord,
    ) -> Result<OrderItemRecord, sqlx::Error> {
        query_as::<Postgres, OrderItemRecord>(INSERT_ORDER_ITEM_SQL)
            .bind(item.order_id.into_i64())
            .bind(item.sku_id.into_i64())
            .bind(item.spu_id.into_i64())
            .bind(&item.product_name)
            .bind(item.product_price)
            .bind(&item.product_pic)
            .bind(item.product_quantity)
            .bind(item.product_total_money)
            .fetch_one(&mut **tx)
            .await
    }

    pub(crate) async fn find_order(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        order: OrderNumber,
    ) -> Result<Option<OrderRecord>, sqlx::Error> {
        query_as::<Postgres, OrderRecord>(FIND_ORDER_SQL)
            .bind(order.into_i64())
            .fetch_optional(&mut **tx)
            .await
    }

    pub(crate) async fn get_user_order(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        user: UserId,
        order: OrderNumber,
    ) -> Result<OrderRecord, sqlx::Error> {
        query_as::<Postgres, OrderRecord>(GET_USER_ORDER_SQL)
            .bind(order.into_i64())
            .bind(user.into_i64())
            .fetch_one(&mut **tx)
            .await
    }

    pub(crate) async fn list_items(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        order: OrderNumber,
    ) -> Result<Vec<OrderItemRecord>, sqlx::Error> {
        query_as::<Postgres, OrderItemRecord>(LIST_ORDER_ITEMS_SQL)
            .bind(order.into_i64())
            .fetch_all(&mut **tx)
            .await
    }

    /// Move an order to a new status if it is still at the version read.
    ///
    /// Returns `None` when a concurrent writer moved it first.
    pub(crate) async fn transition(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        read: &OrderRecord,
        order_status: OrderStatus,
        pay_status: PayStatus,
    ) -> Result<Option<OrderRecord>, sqlx::Error> {
        query_as::<Postgres, OrderRecord>(TRANSITION_ORDER_SQL)
            .bind(read.id.into_i64())
            .bind(read.version)
            .bind(order_status.code())
            .bind(pay_status.code())
            .bind(pay_status == PayStatus::Paid && read.pay_status != PayStatus::Paid)
            .fetch_optional(&mut **tx)
            .await
    }

    /// Delete an order and, by cascade, its items. Returns `false` on a version mismatch.
    pub(crate) async fn delete_order(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        read: &OrderRecord,
    ) -> Result<bool, sqlx::Error> {
        let rows_affected = query(DELETE_ORDER_SQL)
            .bind(read.id.into_i64())
            .bind(read.version)
            .execute(&mut **tx)
            .await?
            .rows_affected();

        Ok(rows_affected == 1)
    }
}

fn try_get_status<T>(row: &PgRow, column: &str) -> sqlx::Result<T>
where
    T: TryFrom<i16, Error = UnknownStatusCode>,
{
    let code: i16 = row.try_get(column)?;

    T::try_from(code).map_err(|source| sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: Box::new(source),
    })
}

impl<'r> FromRow<'r, PgRow> for OrderRecord {
    fn from_row(row: &'r PgRow) -> sqlx::Result<Self> {
        Ok(Self {
            id: OrderNumber::from_i64(row.try_get("id")?),
            user_id: UserId::from_i64(row.try_get("user_id")?),
            total_money: row.try_get("total_money")?,
            freight: row.try_get("freight")?,
            pay_money: row.try_get("pay_money")?,
            total_num: row.try_get("total_num")?,
            order_status: try_get_status(row, "order_status")?,
            pay_status: try_get_status(row, "pay_status")?,
            receiver_name: row.try_get("receiver_name")?,
            receiver_phone: row.try_get("receiver_phone")?,
            receiver_address: row.try_get("receiver_address")?,
            pay_time: row
                .try_get::<Option<SqlxTimestamp>, _>("pay_time")?
                .map(SqlxTimestamp::to_jiff),
            expiration_time: row.try_get::<SqlxTimestamp, _>("expiration_time")?.to_jiff(),
            past_due: row.try_get("past_due")?,
            version: row.try_get("version")?,
            created_at: row.try_get::<SqlxTimestamp, _>("created_at")?.to_jiff(),
        })
    }
}

impl<'r> FromRow<'r, PgRow> for OrderItemRecord {
    fn from_row(row: &'r PgRow) -> sqlx::Result<Self> {
        Ok(Self {
            order_id: OrderNumber::from_i64(row.try_get("order_id")?),
            sku_id: SkuId::from_i64(row.try_get("sku_id")?),
            spu_id: SpuId::from_i64(row.try_get("spu_id")?),
            product_name: row.try_get("product_name")?,
            product_price: row.try_get("product_price")?,
            product_pic: row.try_get("product_pic")?,
            product_quantity: row.try_get("product_quantity")?,
            product_total_money: row.try_get("product_total_money")?,
        })
    }
}
