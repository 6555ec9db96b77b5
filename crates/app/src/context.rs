//! App Context

use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use crate::{
    cache::{Cache, CacheError, MemoryCache, RedisCache},
    database::{self, Db},
    domain::{
        carts::{CartCacheSyncHandler, CartCleanupHandler, CartsService, PgCartsService},
        inventory::{InventoryLedger, PgInventoryLedger},
        lifecycle::{LifecycleService, OrderTimeoutHandler, PgLifecycleService},
        orders::{OrdersService, PgOrdersService},
        products::{PgProductsService, ProductsService},
        seckill::{PgSeckillService, SeckillError, SeckillPurchaseHandler, SeckillService},
    },
    messaging::{AmqpBroker, BrokerError, Consumer, MemoryBroker, MessageBroker, MessageHandler},
    settings::Settings,
    snowflake::{Snowflake, SnowflakeError},
};

#[derive(Debug, Error)]
pub enum AppInitError {
    #[error("failed to connect to database")]
    Database(#[source] sqlx::Error),

    #[error("failed to apply migrations")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("failed to connect to cache")]
    Cache(#[from] CacheError),

    #[error("failed to connect to message broker")]
    Broker(#[from] BrokerError),

    #[error("failed to size the seckill queue")]
    Seckill(#[from] SeckillError),

    #[error("invalid order number generator settings")]
    Snowflake(#[from] SnowflakeError),
}

/// Where the context connects to. Cache and broker fall back to in-process
/// implementations when no URL is given.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub redis_url: Option<String>,
    pub amqp_url: Option<String>,
    pub run_migrations: bool,
    pub settings: Settings,
}

#[derive(Clone)]
pub struct AppContext {
    pub db: Db,
    pub settings: Settings,
    pub cache: Arc<dyn Cache>,
    pub broker: Arc<dyn MessageBroker>,
    pub products: Arc<dyn ProductsService>,
    pub inventory: Arc<dyn InventoryLedger>,
    pub carts: Arc<dyn CartsService>,
    pub orders: Arc<dyn OrdersService>,
    pub lifecycle: Arc<dyn LifecycleService>,
    pub seckill: Arc<dyn SeckillService>,
}

impl std::fmt::Debug for AppContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppContext")
            .field("db", &self.db)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl AppContext {
    /// Connect to every backing store and wire up the services.
    ///
    /// # Errors
    ///
    /// Returns an error when a backing store is unreachable, migrations fail,
    /// or the settings describe an unusable id generator.
    pub async fn open(config: AppConfig) -> Result<Self, AppInitError> {
        let AppConfig {
            database_url,
            max_connections,
            redis_url,
            amqp_url,
            run_migrations,
            settings,
        } = config;

        let pool = database::connect(&database_url, max_connections)
            .await
            .map_err(AppInitError::Database)?;

        if run_migrations {
            database::migrate(&pool).await?;
        }

        let db = Db::new(pool);

        let cache: Arc<dyn Cache> = match redis_url {
            Some(url) => Arc::new(RedisCache::connect(&url).await?),
            None => {
                info!("no redis url configured, using in-process cache");
                Arc::new(MemoryCache::new())
            }
        };

        let seckill_capacity = PgSeckillService::queue_capacity(&db, &settings.seckill).await?;

        let broker: Arc<dyn MessageBroker> = match amqp_url {
            Some(url) => Arc::new(AmqpBroker::connect(&url, seckill_capacity).await?),
            None => {
                info!("no amqp url configured, using in-process broker");
                Arc::new(MemoryBroker::new(seckill_capacity))
            }
        };

        let snowflake = Arc::new(Snowflake::new(
            settings.snowflake.machine_id,
            settings.snowflake.start_date,
        )?);

        let ledger = PgInventoryLedger::new(db.clone(), settings.retry);

        let products: Arc<dyn ProductsService> = Arc::new(PgProductsService::new(
            db.clone(),
            cache.clone(),
            settings.carts.specification_cache_ttl(),
        ));

        let carts = PgCartsService::new(
            db.clone(),
            cache.clone(),
            products.clone(),
            settings.retry,
            settings.carts.cache_ttl(),
        );

        let orders = PgOrdersService::new(
            db.clone(),
            cache.clone(),
            broker.clone(),
            products.clone(),
            ledger.clone(),
            snowflake,
            settings.orders.clone(),
        );

        let lifecycle = PgLifecycleService::new(
            db.clone(),
            broker.clone(),
            ledger.clone(),
            settings.retry,
            settings.orders.payment_window(),
        );

        let seckill = PgSeckillService::new(
            db.clone(),
            cache.clone(),
            broker.clone(),
            ledger.clone(),
            settings.seckill.clone(),
        );

        info!(seckill_capacity, "application context ready");

        Ok(Self {
            inventory: Arc::new(ledger),
            carts: Arc::new(carts),
            orders: Arc::new(orders),
            lifecycle: Arc::new(lifecycle),
            seckill: Arc::new(seckill),
            products,
            cache,
            broker,
            settings,
            db,
        })
    }

    /// One consumer per background queue.
    #[must_use]
    pub fn consumers(&self) -> Vec<Consumer> {
        let handlers: [Arc<dyn MessageHandler>; 5] = [
            Arc::new(CartCleanupHandler::new(self.carts.clone())),
            Arc::new(CartCacheSyncHandler::upserts(self.carts.clone())),
            Arc::new(CartCacheSyncHandler::deletes(self.carts.clone())),
            Arc::new(OrderTimeoutHandler::new(self.lifecycle.clone())),
            Arc::new(SeckillPurchaseHandler::new(self.seckill.clone())),
        ];

        handlers
            .into_iter()
            .map(|handler| Consumer::new(self.broker.clone(), handler, &self.settings.consumers))
            .collect()
    }

    /// Release pooled database connections.
    pub async fn close(&self) {
        self.db.pool().close().await;
    }
}
