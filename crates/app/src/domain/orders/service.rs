//! Orders service.
//!
//! Pre-submission prices a candidate order and issues its number. Submission
//! turns that number into an order row and its item snapshots inside one
//! transaction, taking stock for every line or for none.

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::try_join_all;
use mockall::automock;
use rust_decimal::Decimal;
use sqlx::error::{DatabaseError, ErrorKind};
use tracing::{error, info, warn};

use crate::{
    cache::{Cache, keys},
    database::Db,
    domain::{
        carts::models::{CartCleanup, CartLineRef},
        inventory::{InventoryLedger, PgInventoryLedger, records::StockKey},
        lifecycle::TimeoutScheduler,
        orders::{
            errors::OrdersServiceError,
            models::{NewOrder, Order, OrderLine, PreSubmitLine, PreSubmitOrder, Receiver},
            records::{OrderItemRecord, OrderNumber},
            repository::{OrderRow, PgOrdersRepository},
        },
        products::{ProductsService, ProductsServiceError, repository::PgProductsRepository},
    },
    ids::UserId,
    messaging::{MessageBroker, OutboundMessage, Queue},
    settings::OrderSettings,
    snowflake::Snowflake,
};

#[derive(Clone)]
pub struct PgOrdersService {
    db: Db,
    cache: Arc<dyn Cache>,
    broker: Arc<dyn MessageBroker>,
    products: Arc<dyn ProductsService>,
    ledger: PgInventoryLedger,
    timeouts: TimeoutScheduler,
    snowflake: Arc<Snowflake>,
    repository: PgOrdersRepository,
    skus: PgProductsRepository,
    settings: OrderSettings,
}

impl std::fmt::Debug for PgOrdersService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgOrdersService")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl PgOrdersService {
    #[must_use]
    pub fn new(
        db: Db,
        cache: Arc<dyn Cache>,
        broker: Arc<dyn MessageBroker>,
        products: Arc<dyn ProductsService>,
        ledger: PgInventoryLedger,
        snowflake: Arc<Snowflake>,
        settings: OrderSettings,
    ) -> Self {
        Self {
            db,
            timeouts: TimeoutScheduler::new(broker.clone(), settings.payment_window()),
            cache,
            broker,
            products,
            ledger,
            snowflake,
            repository: PgOrdersRepository::new(),
            skus: PgProductsRepository::new(),
            settings,
        }
    }

    async fn ensure_specification(&self, line: &OrderLine) -> Result<(), OrdersServiceError> {
        if line.count <= 0 {
            return Err(OrdersServiceError::InvalidQuantity(line.count));
        }

        if !self
            .products
            .specifications(line.sku_id)
            .await?
            .contains(&line.specification)
        {
            return Err(OrdersServiceError::InvalidSpecification(line.sku_id));
        }

        Ok(())
    }

    /// Validate one line against current stock and price it.
    async fn price_line(&self, line: &OrderLine) -> Result<PreSubmitLine, OrdersServiceError> {
        self.ensure_specification(line).await?;

        self.ledger
            .check(StockKey::Sku(line.sku_id), line.count)
            .await?;

        let (sku, spu) = tokio::try_join!(
            self.products.get_sku(line.sku_id),
            self.products.get_spu_of_sku(line.sku_id),
        )?;

        Ok(PreSubmitLine {
            sku_id: sku.id,
            title: sku.title,
            price: sku.price,
            default_pic_url: spu.default_pic_url,
            specification: line.specification.trim().to_string(),
            count: line.count,
        })
    }

    /// Take stock for one line inside `tx` and snapshot it.
    async fn take_line(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        order: OrderNumber,
        line: &OrderLine,
    ) -> Result<OrderItemRecord, OrdersServiceError> {
        self.ledger
            .decrement_in(tx, StockKey::Sku(line.sku_id), line.count)
            .await?;

        let sku = self
            .skus
            .get_sku(tx, line.sku_id)
            .await
            .map_err(ProductsServiceError::from)?;

        let pic = match self.skus.get_default_pic(tx, line.sku_id).await {
            Ok(pic) => pic,
            Err(sqlx::Error::RowNotFound) => {
                return Err(OrdersServiceError::MissingPicture(line.sku_id));
            }
            Err(error) => return Err(error.into()),
        };

        Ok(OrderItemRecord {
            order_id: order,
            sku_id: sku.id,
            spu_id: sku.spu_id,
            product_name: sku.title,
            product_price: sku.price,
            product_pic: pic,
            product_quantity: line.count,
            product_total_money: sku.price * Decimal::from(line.count),
        })
    }

    fn queue_cart_cleanup(&self, user: UserId, lines: &[OrderLine]) {
        let cleanup = CartCleanup {
            user_id: user,
            lines: lines
                .iter()
                .map(|line| CartLineRef {
                    sku_id: line.sku_id,
                    specification: line.specification.clone(),
                })
                .collect(),
        };

        let broker = Arc::clone(&self.broker);

        tokio::spawn(async move {
            let published = match OutboundMessage::json(Queue::CartCleanup, &cleanup) {
                Ok(message) => broker.publish(message).await,
                Err(source) => Err(source),
            };

            if let Err(source) = published {
                error!(user = %cleanup.user_id, error = %source, "failed to queue cart cleanup");
            }
        });
    }
}

fn validate_receiver(receiver: &Receiver) -> Result<(), OrdersServiceError> {
    if receiver.name.trim().is_empty() {
        return Err(OrdersServiceError::InvalidReceiver("name"));
    }

    if receiver.address.trim().is_empty() {
        return Err(OrdersServiceError::InvalidReceiver("address"));
    }

    if !is_mobile_number(receiver.phone.trim()) {
        return Err(OrdersServiceError::InvalidReceiver("phone"));
    }

    Ok(())
}

/// Mainland mobile numbers: `1[3-9]` followed by nine digits.
fn is_mobile_number(phone: &str) -> bool {
    let bytes = phone.as_bytes();

    bytes.len() == 11
        && bytes[0] == b'1'
        && (b'3'..=b'9').contains(&bytes[1])
        && bytes.iter().all(u8::is_ascii_digit)
}

fn is_unique_violation(error: &sqlx::Error) -> bool {
    error
        .as_database_error()
        .map(DatabaseError::kind)
        .is_some_and(|kind| matches!(kind, ErrorKind::UniqueViolation))
}

#[async_trait]
impl OrdersService for PgOrdersService {
    async fn create_pre_submit_order(
        &self,
        user: UserId,
        lines: Vec<OrderLine>,
    ) -> Result<PreSubmitOrder, OrdersServiceError> {
        if lines.is_empty() {
            return Err(OrdersServiceError::EmptyOrder);
        }

        let lines = try_join_all(lines.iter().map(|line| self.price_line(line))).await?;

        let total_money: Decimal = lines
            .iter()
            .map(|line| line.price * Decimal::from(line.count))
            .sum();

        let order_number = OrderNumber::from_i64(self.snowflake.next_id()?);

        self.cache
            .set(
                &keys::order_number(order_number),
                &user.to_string(),
                self.settings.presubmit_ttl(),
            )
            .await?;

        info!(user = %user, order = %order_number, total = %total_money, "order number issued");

        Ok(PreSubmitOrder {
            order_number,
            total_money,
            freight: self.settings.freight,
            pay_money: total_money + self.settings.freight,
            lines,
        })
    }

    async fn is_order_number_live(&self, order: OrderNumber) -> Result<bool, OrdersServiceError> {
        Ok(self.cache.exists(&keys::order_number(order)).await?)
    }

    async fn create_submit_order(
        &self,
        user: UserId,
        order: NewOrder,
    ) -> Result<Order, OrdersServiceError> {
        validate_receiver(&order.receiver)?;

        if order.lines.is_empty() {
            return Err(OrdersServiceError::EmptyOrder);
        }

        let mut lines = order.lines;

        for line in &mut lines {
            line.specification = line.specification.trim().to_string();
        }

        // Rows are always locked in the same order across concurrent orders.
        lines.sort_by(|a, b| {
            a.sku_id
                .cmp(&b.sku_id)
                .then_with(|| a.specification.cmp(&b.specification))
        });

        for line in &lines {
            self.ensure_specification(line).await?;
        }

        let mut tx = self.db.begin().await?;
        let mut items = Vec::with_capacity(lines.len());

        for line in &lines {
            items.push(self.take_line(&mut tx, order.order_number, line).await?);
        }

        let total_money: Decimal = items.iter().map(|item| item.product_total_money).sum();
        let total_num = lines
            .iter()
            .try_fold(0_i32, |sum, line| sum.checked_add(line.count))
            .ok_or(OrdersServiceError::InvalidData)?;

        let row = OrderRow {
            id: order.order_number,
            user_id: user,
            total_money,
            freight: self.settings.freight,
            pay_money: total_money + self.settings.freight,
            total_num,
            receiver_name: order.receiver.name.trim(),
            receiver_phone: order.receiver.phone.trim(),
            receiver_address: order.receiver.address.trim(),
            payment_window: self.settings.payment_window(),
        };

        let record = match self.repository.insert_order(&mut tx, &row).await {
            Ok(record) => record,
            Err(error) if is_unique_violation(&error) => {
                warn!(user = %user, order = %order.order_number, "duplicate order submission");
                return Err(OrdersServiceError::DuplicateOrder);
            }
            Err(error) => return Err(error.into()),
        };

        let mut stored = Vec::with_capacity(items.len());

        for item in &items {
            stored.push(self.repository.insert_item(&mut tx, item).await?);
        }

        // A timer for an order that never commits is acknowledged as unknown.
        if let Err(source) = self.timeouts.schedule(record.id).await {
            error!(order = %record.id, error = %source, "failed to schedule order timeout");

            return Err(OrdersServiceError::TimeoutNotScheduled(source));
        }

        tx.commit().await?;

        info!(
            user = %user,
            order = %record.id,
            pay_money = %record.pay_money,
            lines = stored.len(),
            "order submitted"
        );

        self.queue_cart_cleanup(user, &lines);

        Ok(Order {
            order: record,
            items: stored,
        })
    }

    async fn get_order(&self, user: UserId, order: OrderNumber) -> Result<Order, OrdersServiceError> {
        let mut tx = self.db.begin().await?;

        let record = self.repository.get_user_order(&mut tx, user, order).await?;
        let items = self.repository.list_items(&mut tx, order).await?;

        tx.commit().await?;

        Ok(Order {
            order: record,
            items,
        })
    }
}

#[automock]
#[async_trait]
pub trait OrdersService: Send + Sync {
    /// Price a candidate order against current stock and issue its order number.
    ///
    /// Nothing is reserved. The number stays live for the pre-submission TTL.
    async fn create_pre_submit_order(
        &self,
        user: UserId,
        lines: Vec<OrderLine>,
    ) -> Result<PreSubmitOrder, OrdersServiceError>;

    /// Whether a pre-issued order number is still within its TTL.
    async fn is_order_number_live(&self, order: OrderNumber) -> Result<bool, OrdersServiceError>;

    /// Create an order under a pre-issued number, all lines or none.
    ///
    /// Callers gate on [`OrdersService::is_order_number_live`] first. A number
    /// that was already used fails with [`OrdersServiceError::DuplicateOrder`].
    async fn create_submit_order(
        &self,
        user: UserId,
        order: NewOrder,
    ) -> Result<Order, OrdersServiceError>;

    async fn get_order(&self, user: UserId, order: OrderNumber) -> Result<Order, OrdersServiceError>;
}
