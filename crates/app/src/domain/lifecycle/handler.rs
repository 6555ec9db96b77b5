//! Timeout queue consumer.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, warn};

use crate::{
    domain::{lifecycle::LifecycleService, orders::records::OrderNumber},
    messaging::{MessageHandler, Outcome, Queue},
};

pub struct OrderTimeoutHandler {
    lifecycle: Arc<dyn LifecycleService>,
}

impl std::fmt::Debug for OrderTimeoutHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderTimeoutHandler").finish_non_exhaustive()
    }
}

impl OrderTimeoutHandler {
    #[must_use]
    pub fn new(lifecycle: Arc<dyn LifecycleService>) -> Self {
        Self { lifecycle }
    }
}

#[async_trait]
impl MessageHandler for OrderTimeoutHandler {
    fn queue(&self) -> Queue {
        Queue::OrderTimeout
    }

    async fn handle(&self, payload: &[u8]) -> Outcome {
        let order: OrderNumber = match serde_json::from_slice(payload) {
            Ok(order) => order,
            Err(source) => {
                warn!(error = %source, "undecodable order timeout");
                return Outcome::Discard;
            }
        };

        match self.lifecycle.handle_timeout(order).await {
            Ok(_) => Outcome::Ack,
            Err(source) => {
                error!(order = %order, error = %source, "order timeout failed");
                Outcome::Retry
            }
        }
    }
}
