//! Test Helpers

use std::sync::atomic::{AtomicI64, Ordering};

use rust_decimal::Decimal;

use crate::{
    domain::{
        orders::{
            OrdersService, OrdersServiceError,
            models::{NewOrder, Order, OrderLine, Receiver},
            records::OrderNumber,
        },
        products::records::SkuId,
        seckill::records::SeckillSkuId,
    },
    ids::UserId,
    test::TestContext,
};

/// The one specification every seeded product declares.
pub(crate) const SPEC: &str = "red";

pub(crate) const SPU_PIC: &str = "https://img.example.test/spu.png";

pub(crate) const SKU_PIC: &str = "https://img.example.test/sku.png";

/// Ids only need to be unique within one database, but a process-wide counter
/// keeps them distinct across helpers too.
static NEXT_ID: AtomicI64 = AtomicI64::new(1_000);

fn next_id() -> i64 {
    NEXT_ID.fetch_add(1, Ordering::Relaxed)
}

pub(crate) fn price() -> Decimal {
    Decimal::new(1_999, 2)
}

async fn seed_spu(ctx: &TestContext) -> i64 {
    let id = next_id();

    sqlx::query(
        "INSERT INTO spus (id, name, default_pic_url, product_specification) VALUES ($1, $2, $3, $4)",
    )
    .bind(id)
    .bind(format!("product {id}"))
    .bind(SPU_PIC)
    .bind(format!(r#"{{"spec": ["{SPEC}"]}}"#))
    .execute(ctx.db.pool())
    .await
    .expect("Failed to seed spu");

    id
}

/// A listed SKU with `stock` units and no default picture.
pub(crate) async fn seed_sku_without_pic(ctx: &TestContext, stock: i32) -> SkuId {
    let spu = seed_spu(ctx).await;
    let id = next_id();

    sqlx::query("INSERT INTO skus (id, spu_id, title, price, stock) VALUES ($1, $2, $3, $4, $5)")
        .bind(id)
        .bind(spu)
        .bind(format!("sku {id}"))
        .bind(price())
        .bind(stock)
        .execute(ctx.db.pool())
        .await
        .expect("Failed to seed sku");

    SkuId::from_i64(id)
}

/// A listed SKU with `stock` units and a default picture.
pub(crate) async fn seed_sku(ctx: &TestContext, stock: i32) -> SkuId {
    let sku = seed_sku_without_pic(ctx, stock).await;

    sqlx::query("INSERT INTO sku_pics (sku_id, pic_url, is_default) VALUES ($1, $2, TRUE)")
        .bind(sku.into_i64())
        .bind(SKU_PIC)
        .execute(ctx.db.pool())
        .await
        .expect("Failed to seed sku picture");

    sku
}

pub(crate) async fn seed_seckill_sku(ctx: &TestContext, stock: i32) -> SeckillSkuId {
    let id = next_id();

    sqlx::query(
        "INSERT INTO seckill_skus (id, title, price, stock, specification, pic_url) \
         VALUES ($1, $2, $3, $4, $5, $6)",
    )
    .bind(id)
    .bind(format!("seckill {id}"))
    .bind(price())
    .bind(stock)
    .bind(SPEC)
    .bind(SKU_PIC)
    .execute(ctx.db.pool())
    .await
    .expect("Failed to seed seckill sku");

    SeckillSkuId::from_i64(id)
}

pub(crate) async fn delist(ctx: &TestContext, sku: SkuId) {
    sqlx::query("UPDATE skus SET valid = 0 WHERE id = $1")
        .bind(sku.into_i64())
        .execute(ctx.db.pool())
        .await
        .expect("Failed to delist sku");
}

pub(crate) async fn stock_of(ctx: &TestContext, sku: SkuId) -> i32 {
    sqlx::query_scalar("SELECT stock FROM skus WHERE id = $1")
        .bind(sku.into_i64())
        .fetch_one(ctx.db.pool())
        .await
        .expect("Failed to read sku stock")
}

pub(crate) async fn seckill_sale_of(ctx: &TestContext, sku: SeckillSkuId) -> i32 {
    sqlx::query_scalar("SELECT sale FROM seckill_skus WHERE id = $1")
        .bind(sku.into_i64())
        .fetch_one(ctx.db.pool())
        .await
        .expect("Failed to read seckill sale")
}

/// Move an order's payment deadline into the past.
pub(crate) async fn close_payment_window(ctx: &TestContext, order: OrderNumber) {
    sqlx::query("UPDATE orders SET expiration_time = now() - INTERVAL '1 second' WHERE id = $1")
        .bind(order.into_i64())
        .execute(ctx.db.pool())
        .await
        .expect("Failed to close payment window");
}

/// Write a cart row directly, bypassing the carts service.
pub(crate) async fn insert_cart_row(ctx: &TestContext, user: i64, sku: SkuId, count: i32) {
    sqlx::query(
        "INSERT INTO cart_entries (user_id, sku_id, specification, count) VALUES ($1, $2, $3, $4)",
    )
    .bind(user)
    .bind(sku.into_i64())
    .bind(SPEC)
    .bind(count)
    .execute(ctx.db.pool())
    .await
    .expect("Failed to insert cart row");
}

pub(crate) fn line(sku: SkuId, count: i32) -> OrderLine {
    OrderLine {
        sku_id: sku,
        specification: SPEC.to_string(),
        count,
    }
}

pub(crate) fn order_number(n: i64) -> OrderNumber {
    OrderNumber::from_i64(9_000_000 + n)
}

pub(crate) fn receiver() -> Receiver {
    Receiver {
        name: "Li Lei".to_string(),
        phone: "13812345678".to_string(),
        address: "1 Warehouse Road".to_string(),
    }
}

pub(crate) fn new_order(number: OrderNumber, lines: Vec<OrderLine>) -> NewOrder {
    NewOrder {
        order_number: number,
        lines,
        receiver: receiver(),
    }
}

pub(crate) async fn submit(
    ctx: &TestContext,
    user: UserId,
    number: OrderNumber,
    lines: Vec<OrderLine>,
) -> Result<Order, OrdersServiceError> {
    ctx.orders
        .create_submit_order(user, new_order(number, lines))
        .await
}
