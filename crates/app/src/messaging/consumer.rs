//! Queue consumer runtime.
//!
//! Handlers decide per message whether to acknowledge, retry or discard. A
//! retry re-runs the handler in place after an exponential backoff, without a
//! cap on attempts, so a transient outage delays a message but never drops it.

use std::{fmt, sync::Arc, time::Duration};

use async_trait::async_trait;
use backon::{BackoffBuilder, ExponentialBuilder};
use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, error, info, warn};

use crate::settings::ConsumerSettings;

use super::{Delivery, MessageBroker, Queue};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Done with this message, successfully or as a no-op.
    Ack,

    /// A transient failure; handle the same message again after a backoff.
    Retry,

    /// The message can never succeed, e.g. it does not decode.
    Discard,
}

#[async_trait]
pub trait MessageHandler: Send + Sync {
    fn queue(&self) -> Queue;

    async fn handle(&self, payload: &[u8]) -> Outcome;
}

/// Drives one handler against one queue until cancelled.
pub struct Consumer {
    broker: Arc<dyn MessageBroker>,
    handler: Arc<dyn MessageHandler>,
    backoff: ExponentialBuilder,
    max_backoff: Duration,
}

impl fmt::Debug for Consumer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Consumer")
            .field("queue", &self.handler.queue())
            .finish_non_exhaustive()
    }
}

impl Consumer {
    #[must_use]
    pub fn new(
        broker: Arc<dyn MessageBroker>,
        handler: Arc<dyn MessageHandler>,
        settings: &ConsumerSettings,
    ) -> Self {
        Self {
            broker,
            handler,
            backoff: ExponentialBuilder::default()
                .with_min_delay(settings.min_backoff())
                .with_max_delay(settings.max_backoff())
                .with_jitter(),
            max_backoff: settings.max_backoff(),
        }
    }

    /// Consume until `shutdown` fires, resubscribing whenever the stream fails.
    pub async fn run(self, shutdown: CancellationToken) {
        let queue = self.handler.queue();
        let mut reconnect = self.backoff.build();

        loop {
            let subscription = tokio::select! {
                () = shutdown.cancelled() => break,
                subscription = self.broker.subscribe(queue) => subscription,
            };

            match subscription {
                Ok(mut deliveries) => {
                    reconnect = self.backoff.build();

                    loop {
                        let next = tokio::select! {
                            () = shutdown.cancelled() => {
                                info!(queue = %queue, "consumer stopped");
                                return;
                            }
                            next = deliveries.next() => next,
                        };

                        match next {
                            Some(Ok(delivery)) => {
                                let span = tracing::info_span!(
                                    "queue.consume",
                                    queue = %queue,
                                    redelivered = delivery.redelivered
                                );

                                self.process(delivery, &shutdown).instrument(span).await;
                            }
                            Some(Err(source)) => {
                                error!(queue = %queue, error = %source, "delivery failed, resubscribing");
                                break;
                            }
                            None => {
                                info!(queue = %queue, "delivery stream ended, resubscribing");
                                break;
                            }
                        }
                    }
                }
                Err(source) => {
                    error!(queue = %queue, error = %source, "failed to subscribe");
                }
            }

            let delay = reconnect.next().unwrap_or(self.max_backoff);

            tokio::select! {
                () = shutdown.cancelled() => break,
                () = tokio::time::sleep(delay) => {}
            }
        }

        info!(queue = %queue, "consumer stopped");
    }

    async fn process(&self, delivery: Delivery, shutdown: &CancellationToken) {
        let mut delays = self.backoff.build();
        let mut attempt = 1_u32;

        loop {
            match self.handler.handle(&delivery.payload).await {
                Outcome::Ack => {
                    if let Err(source) = delivery.ack().await {
                        error!(error = %source, "failed to ack message");
                    }

                    return;
                }
                Outcome::Discard => {
                    warn!("discarding undeliverable message");

                    if let Err(source) = delivery.reject(false).await {
                        error!(error = %source, "failed to reject message");
                    }

                    return;
                }
                Outcome::Retry => {
                    let delay = delays.next().unwrap_or(self.max_backoff);

                    warn!(
                        attempt,
                        backoff_ms = delay.as_millis(),
                        "message handling failed, retrying"
                    );

                    tokio::select! {
                        () = shutdown.cancelled() => {
                            if let Err(source) = delivery.reject(true).await {
                                error!(error = %source, "failed to requeue message on shutdown");
                            }

                            return;
                        }
                        () = tokio::time::sleep(delay) => {}
                    }

                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use testresult::TestResult;

    use crate::messaging::{MemoryBroker, OutboundMessage};

    use super::*;

    struct FlakyHandler {
        failures_left: AtomicU32,
        handled: AtomicU32,
        done: CancellationToken,
    }

    #[async_trait]
    impl MessageHandler for FlakyHandler {
        fn queue(&self) -> Queue {
            Queue::CartCleanup
        }

        async fn handle(&self, _payload: &[u8]) -> Outcome {
            self.handled.fetch_add(1, Ordering::SeqCst);

            if self
                .failures_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
                .is_ok()
            {
                return Outcome::Retry;
            }

            self.done.cancel();

            Outcome::Ack
        }
    }

    #[tokio::test(start_paused = true)]
    async fn retries_until_handler_succeeds() -> TestResult {
        let broker = Arc::new(MemoryBroker::new(1));
        let shutdown = CancellationToken::new();

        let handler = Arc::new(FlakyHandler {
            failures_left: AtomicU32::new(3),
            handled: AtomicU32::new(0),
            done: shutdown.clone(),
        });

        broker
            .publish(OutboundMessage::json(Queue::CartCleanup, &1)?)
            .await?;

        let consumer = Consumer::new(
            broker.clone(),
            handler.clone(),
            &ConsumerSettings::default(),
        );

        tokio::time::timeout(Duration::from_secs(600), consumer.run(shutdown)).await?;

        assert_eq!(handler.handled.load(Ordering::SeqCst), 4);

        Ok(())
    }

    #[tokio::test]
    async fn stops_when_cancelled_while_idle() -> TestResult {
        let broker = Arc::new(MemoryBroker::new(1));
        let shutdown = CancellationToken::new();

        let handler = Arc::new(FlakyHandler {
            failures_left: AtomicU32::new(0),
            handled: AtomicU32::new(0),
            done: CancellationToken::new(),
        });

        let consumer = Consumer::new(broker, handler.clone(), &ConsumerSettings::default());
        let running = tokio::spawn(consumer.run(shutdown.clone()));

        shutdown.cancel();

        tokio::time::timeout(Duration::from_secs(5), running).await??;

        assert_eq!(handler.handled.load(Ordering::SeqCst), 0);

        Ok(())
    }
}
