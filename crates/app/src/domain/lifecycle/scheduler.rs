//! Payment-window timers.
//!
//! A timer is a delayed message on the broker, so it survives restarts of
//! every process involved.

use std::{sync::Arc, time::Duration};

use tracing::info;

use crate::{
    domain::orders::records::OrderNumber,
    messaging::{BrokerError, MessageBroker, OutboundMessage, Queue},
};

#[derive(Clone)]
pub struct TimeoutScheduler {
    broker: Arc<dyn MessageBroker>,
    delay: Duration,
}

impl std::fmt::Debug for TimeoutScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimeoutScheduler")
            .field("delay", &self.delay)
            .finish_non_exhaustive()
    }
}

impl TimeoutScheduler {
    #[must_use]
    pub fn new(broker: Arc<dyn MessageBroker>, delay: Duration) -> Self {
        Self { broker, delay }
    }

    /// Arrange for `order` to be delivered on the timeout queue once its payment window closes.
    ///
    /// # Errors
    ///
    /// Returns an error when the broker refuses the message.
    pub async fn schedule(&self, order: OrderNumber) -> Result<(), BrokerError> {
        self.broker
            .publish(OutboundMessage::json(Queue::OrderTimeout, &order)?.delayed(self.delay))
            .await?;

        info!(order = %order, delay_secs = self.delay.as_secs(), "order timeout scheduled");

        Ok(())
    }
}
