//! Message broker abstraction.
//!
//! Durable at-least-once queues with consumer acknowledgement, a bounded queue
//! that refuses publishes once full, and delayed delivery for timers.

use std::{fmt, time::Duration};

use async_trait::async_trait;
use futures::stream::BoxStream;
use mockall::automock;
use serde::Serialize;
use thiserror::Error;

mod amqp;
pub mod consumer;
mod memory;

pub use amqp::AmqpBroker;
pub use consumer::{Consumer, MessageHandler, Outcome};
pub use memory::MemoryBroker;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Queue {
    /// Cart lines to remove after a successful order submission.
    CartCleanup,

    /// Order numbers whose payment window has elapsed.
    OrderTimeout,

    /// Admitted seckill purchase requests. Bounded.
    SeckillRequests,

    /// Cart rows inserted or updated outside the cart service.
    CartCacheUpsert,

    /// Cart rows deleted outside the cart service.
    CartCacheDelete,
}

impl Queue {
    pub const ALL: [Queue; 5] = [
        Queue::CartCleanup,
        Queue::OrderTimeout,
        Queue::SeckillRequests,
        Queue::CartCacheUpsert,
        Queue::CartCacheDelete,
    ];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Queue::CartCleanup => "cart.cleanup",
            Queue::OrderTimeout => "order.timeout",
            Queue::SeckillRequests => "seckill.requests",
            Queue::CartCacheUpsert => "cart.cache.upsert",
            Queue::CartCacheDelete => "cart.cache.delete",
        }
    }
}

impl fmt::Display for Queue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("queue {0} is full")]
    QueueFull(Queue),

    #[error("queue {0} does not support delayed delivery")]
    DelayUnsupported(Queue),

    #[error("queue {0} is closed")]
    Closed(Queue),

    #[error("failed to encode message payload")]
    Encode(#[from] serde_json::Error),

    #[error("failed to obtain broker connection")]
    Pool(#[from] deadpool_lapin::PoolError),

    #[error("failed to create broker pool")]
    PoolBuild(#[from] deadpool_lapin::BuildError),

    #[error("broker command failed")]
    Amqp(#[from] lapin::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub queue: Queue,
    pub payload: Vec<u8>,
    pub delay: Option<Duration>,
}

impl OutboundMessage {
    /// Encode `body` as JSON for `queue`.
    ///
    /// # Errors
    ///
    /// Returns an error when `body` cannot be serialized.
    pub fn json<T: Serialize>(queue: Queue, body: &T) -> Result<Self, BrokerError> {
        Ok(Self {
            queue,
            payload: serde_json::to_vec(body)?,
            delay: None,
        })
    }

    #[must_use]
    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

/// Settles one delivery with the broker.
#[async_trait]
pub trait Acknowledge: Send + Sync {
    async fn ack(&self) -> Result<(), BrokerError>;

    async fn reject(&self, requeue: bool) -> Result<(), BrokerError>;
}

pub struct Delivery {
    pub payload: Vec<u8>,
    pub redelivered: bool,
    acker: Box<dyn Acknowledge>,
}

impl fmt::Debug for Delivery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Delivery")
            .field("payload_len", &self.payload.len())
            .field("redelivered", &self.redelivered)
            .finish_non_exhaustive()
    }
}

impl Delivery {
    pub fn new(payload: Vec<u8>, redelivered: bool, acker: Box<dyn Acknowledge>) -> Self {
        Self {
            payload,
            redelivered,
            acker,
        }
    }

    /// # Errors
    ///
    /// Returns an error when the broker rejects the acknowledgement.
    pub async fn ack(self) -> Result<(), BrokerError> {
        self.acker.ack().await
    }

    /// # Errors
    ///
    /// Returns an error when the broker rejects the rejection.
    pub async fn reject(self, requeue: bool) -> Result<(), BrokerError> {
        self.acker.reject(requeue).await
    }
}

pub type Subscription = BoxStream<'static, Result<Delivery, BrokerError>>;

#[automock]
#[async_trait]
pub trait MessageBroker: Send + Sync {
    /// Publish a message. Bounded queues fail with [`BrokerError::QueueFull`].
    async fn publish(&self, message: OutboundMessage) -> Result<(), BrokerError>;

    /// Start consuming a queue. Competing subscribers share its deliveries.
    async fn subscribe(&self, queue: Queue) -> Result<Subscription, BrokerError>;
}
