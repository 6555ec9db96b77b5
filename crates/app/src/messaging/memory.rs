//! In-process broker backed by tokio channels.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use futures::{StreamExt, stream};
use tokio::sync::{Mutex, mpsc};
use tracing::warn;

use super::{
    Acknowledge, BrokerError, Delivery, MessageBroker, OutboundMessage, Queue, Subscription,
};

const DEFAULT_CAPACITY: usize = 1_024;

type Envelope = (Vec<u8>, bool);

#[derive(Debug)]
struct Channel {
    sender: mpsc::Sender<Envelope>,
    receiver: Arc<Mutex<mpsc::Receiver<Envelope>>>,
}

impl Channel {
    fn new(capacity: usize) -> Self {
        let (sender, receiver) = mpsc::channel(capacity.max(1));

        Self {
            sender,
            receiver: Arc::new(Mutex::new(receiver)),
        }
    }
}

/// Every queue is a bounded channel. The seckill queue rejects publishes once
/// full; other queues wait for room.
#[derive(Debug)]
pub struct MemoryBroker {
    channels: HashMap<Queue, Channel>,
}

impl MemoryBroker {
    #[must_use]
    pub fn new(seckill_capacity: u32) -> Self {
        let channels = Queue::ALL
            .into_iter()
            .map(|queue| {
                let capacity = if queue == Queue::SeckillRequests {
                    usize::try_from(seckill_capacity).unwrap_or(usize::MAX)
                } else {
                    DEFAULT_CAPACITY
                };

                (queue, Channel::new(capacity))
            })
            .collect();

        Self { channels }
    }

    fn channel(&self, queue: Queue) -> Result<&Channel, BrokerError> {
        self.channels.get(&queue).ok_or(BrokerError::Closed(queue))
    }
}

#[async_trait]
impl MessageBroker for MemoryBroker {
    async fn publish(&self, message: OutboundMessage) -> Result<(), BrokerError> {
        let queue = message.queue;
        let sender = self.channel(queue)?.sender.clone();

        if let Some(delay) = message.delay {
            if queue != Queue::OrderTimeout {
                return Err(BrokerError::DelayUnsupported(queue));
            }

            tokio::spawn(async move {
                tokio::time::sleep(delay).await;

                if sender.send((message.payload, false)).await.is_err() {
                    warn!(queue = %queue, "dropping delayed message for closed queue");
                }
            });

            return Ok(());
        }

        if queue == Queue::SeckillRequests {
            return sender
                .try_send((message.payload, false))
                .map_err(|error| match error {
                    mpsc::error::TrySendError::Full(_) => BrokerError::QueueFull(queue),
                    mpsc::error::TrySendError::Closed(_) => BrokerError::Closed(queue),
                });
        }

        sender
            .send((message.payload, false))
            .await
            .map_err(|_closed| BrokerError::Closed(queue))
    }

    async fn subscribe(&self, queue: Queue) -> Result<Subscription, BrokerError> {
        let channel = self.channel(queue)?;
        let receiver = Arc::clone(&channel.receiver);
        let sender = channel.sender.clone();

        let deliveries = stream::unfold((receiver, sender), move |(receiver, sender)| async move {
            let (payload, redelivered) = receiver.lock().await.recv().await?;

            let acker = MemoryAcker {
                queue,
                payload: payload.clone(),
                sender: sender.clone(),
            };

            Some((
                Ok(Delivery::new(payload, redelivered, Box::new(acker))),
                (receiver, sender),
            ))
        });

        Ok(deliveries.boxed())
    }
}

struct MemoryAcker {
    queue: Queue,
    payload: Vec<u8>,
    sender: mpsc::Sender<Envelope>,
}

#[async_trait]
impl Acknowledge for MemoryAcker {
    async fn ack(&self) -> Result<(), BrokerError> {
        Ok(())
    }

    async fn reject(&self, requeue: bool) -> Result<(), BrokerError> {
        if requeue {
            self.sender
                .try_send((self.payload.clone(), true))
                .map_err(|_full_or_closed| BrokerError::QueueFull(self.queue))?;
        }

        Ok(())
    }
}
