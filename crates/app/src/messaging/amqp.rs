//! RabbitMQ broker.
//!
//! All queues hang off one durable direct exchange, routed by queue name.
//! Delayed order timeouts wait in a holding queue with a per-message
//! expiration and dead-letter into the timeout queue. The seckill queue is
//! length-bounded with `reject-publish`, which surfaces as a negative publisher
//! confirm.

use std::time::Duration;

use async_trait::async_trait;
use backon::{BackoffBuilder, ExponentialBuilder};
use deadpool_lapin::{Manager, Pool};
use futures::{StreamExt, stream};
use lapin::{
    BasicProperties, Channel, ExchangeKind,
    options::{
        BasicAckOptions, BasicConsumeOptions, BasicPublishOptions, BasicQosOptions,
        BasicRejectOptions, ConfirmSelectOptions, ExchangeDeclareOptions, QueueBindOptions,
        QueueDeclareOptions,
    },
    types::{AMQPValue, FieldTable, LongString, ShortString},
};
use tracing::{debug, error, info};

use super::{
    Acknowledge, BrokerError, Delivery, MessageBroker, OutboundMessage, Queue, Subscription,
};

const EXCHANGE: &str = "stockroom.direct";
const TIMEOUT_HOLDING_QUEUE: &str = "order.timeout.delay";
const PUBLISH_MAX_RETRIES: usize = 5;
const PREFETCH: u16 = 16;

#[derive(Clone)]
pub struct AmqpBroker {
    pool: Pool,
    seckill_capacity: u32,
}

impl std::fmt::Debug for AmqpBroker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AmqpBroker")
            .field("seckill_capacity", &self.seckill_capacity)
            .finish_non_exhaustive()
    }
}

impl AmqpBroker {
    /// Connect and declare the exchange, queues and bindings.
    ///
    /// # Errors
    ///
    /// Returns an error when the broker is unreachable or a declaration fails.
    pub async fn connect(url: &str, seckill_capacity: u32) -> Result<Self, BrokerError> {
        let manager = Manager::new(url.to_string(), lapin::ConnectionProperties::default());
        let pool = Pool::builder(manager).max_size(10).build()?;

        let broker = Self {
            pool,
            seckill_capacity,
        };

        let channel = broker.channel().await?;
        broker.declare_topology(&channel).await?;

        info!(exchange = EXCHANGE, seckill_capacity, "connected to amqp");

        Ok(broker)
    }

    async fn channel(&self) -> Result<Channel, BrokerError> {
        let conn = self.pool.get().await?;

        Ok(conn.create_channel().await?)
    }

    async fn declare_topology(&self, channel: &Channel) -> Result<(), BrokerError> {
        channel
            .exchange_declare(
                EXCHANGE,
                ExchangeKind::Direct,
                ExchangeDeclareOptions {
                    durable: true,
                    ..ExchangeDeclareOptions::default()
                },
                FieldTable::default(),
            )
            .await?;

        for queue in Queue::ALL {
            self.declare_queue(channel, queue.name(), self.queue_arguments(queue))
                .await?;
        }

        let mut holding = FieldTable::default();
        holding.insert(
            ShortString::from("x-dead-letter-exchange"),
            AMQPValue::LongString(LongString::from(EXCHANGE)),
        );
        holding.insert(
            ShortString::from("x-dead-letter-routing-key"),
            AMQPValue::LongString(LongString::from(Queue::OrderTimeout.name())),
        );

        self.declare_queue(channel, TIMEOUT_HOLDING_QUEUE, holding)
            .await
    }

    async fn declare_queue(
        &self,
        channel: &Channel,
        name: &str,
        arguments: FieldTable,
    ) -> Result<(), BrokerError> {
        channel
            .queue_declare(
                name,
                QueueDeclareOptions {
                    durable: true,
                    ..QueueDeclareOptions::default()
                },
                arguments,
            )
            .await?;

        channel
            .queue_bind(
                name,
                EXCHANGE,
                name,
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await?;

        debug!(queue = name, "declared queue");

        Ok(())
    }

    fn queue_arguments(&self, queue: Queue) -> FieldTable {
        let mut arguments = FieldTable::default();

        if queue == Queue::SeckillRequests {
            arguments.insert(
                ShortString::from("x-max-length"),
                AMQPValue::LongUInt(self.seckill_capacity),
            );
            arguments.insert(
                ShortString::from("x-overflow"),
                AMQPValue::LongString(LongString::from("reject-publish")),
            );
        }

        arguments
    }

    fn route(message: &OutboundMessage) -> Result<(&'static str, BasicProperties), BrokerError> {
        let properties = BasicProperties::default()
            .with_content_type(ShortString::from("application/json"))
            .with_delivery_mode(2);

        match (message.queue, message.delay) {
            (queue, None) => Ok((queue.name(), properties)),
            (Queue::OrderTimeout, Some(delay)) => Ok((
                TIMEOUT_HOLDING_QUEUE,
                properties.with_expiration(ShortString::from(delay.as_millis().to_string())),
            )),
            (queue, Some(_)) => Err(BrokerError::DelayUnsupported(queue)),
        }
    }
}

#[async_trait]
impl MessageBroker for AmqpBroker {
    async fn publish(&self, message: OutboundMessage) -> Result<(), BrokerError> {
        let (routing_key, properties) = Self::route(&message)?;

        let backoff = ExponentialBuilder::default()
            .with_min_delay(Duration::from_millis(100))
            .with_max_delay(Duration::from_secs(5))
            .with_max_times(PUBLISH_MAX_RETRIES)
            .with_jitter()
            .build();

        let mut last_error = None;

        for (attempt, delay) in std::iter::once(Duration::ZERO).chain(backoff).enumerate() {
            if attempt > 0 {
                tokio::time::sleep(delay).await;
            }

            let channel = match self.channel().await {
                Ok(channel) => channel,
                Err(source) => {
                    error!(attempt = attempt + 1, error = %source, "failed to get channel");
                    last_error = Some(source);
                    continue;
                }
            };

            let confirm = async {
                channel
                    .confirm_select(ConfirmSelectOptions::default())
                    .await?;

                channel
                    .basic_publish(
                        EXCHANGE,
                        routing_key,
                        BasicPublishOptions::default(),
                        &message.payload,
                        properties.clone(),
                    )
                    .await?
                    .await
            };

            match confirm.await {
                Ok(confirmation) if confirmation.is_nack() => {
                    return Err(BrokerError::QueueFull(message.queue));
                }
                Ok(_) => {
                    debug!(routing_key, "published message");
                    return Ok(());
                }
                Err(source) => {
                    error!(attempt = attempt + 1, error = %source, routing_key, "publish failed");
                    last_error = Some(BrokerError::Amqp(source));
                }
            }
        }

        Err(last_error.unwrap_or(BrokerError::Closed(message.queue)))
    }

    async fn subscribe(&self, queue: Queue) -> Result<Subscription, BrokerError> {
        let channel = self.channel().await?;

        let prefetch = if queue == Queue::SeckillRequests {
            1
        } else {
            PREFETCH
        };

        channel
            .basic_qos(prefetch, BasicQosOptions::default())
            .await?;

        let consumer = channel
            .basic_consume(
                queue.name(),
                &format!("stockroom-{}", queue.name()),
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await?;

        info!(queue = %queue, "consuming");

        // The channel travels with the stream so it lives as long as the consumer.
        let deliveries = stream::unfold((consumer, channel), |(mut consumer, channel)| async {
            let next = consumer.next().await?;

            let item = next.map_err(BrokerError::from).map(|delivery| {
                Delivery::new(
                    delivery.data,
                    delivery.redelivered,
                    Box::new(AmqpAcker(delivery.acker)),
                )
            });

            Some((item, (consumer, channel)))
        });

        Ok(deliveries.boxed())
    }
}

struct AmqpAcker(lapin::acker::Acker);

#[async_trait]
impl Acknowledge for AmqpAcker {
    async fn ack(&self) -> Result<(), BrokerError> {
        self.0.ack(BasicAckOptions::default()).await?;

        Ok(())
    }

    async fn reject(&self, requeue: bool) -> Result<(), BrokerError> {
        self.0.reject(BasicRejectOptions { requeue }).await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use testcontainers::{ContainerAsync, runners::AsyncRunner};
    use testcontainers_modules::rabbitmq::RabbitMq;
    use testresult::TestResult;

    use super::*;

    async fn start(seckill_capacity: u32) -> TestResult<(ContainerAsync<RabbitMq>, AmqpBroker)> {
        let container = RabbitMq::default().start().await?;
        let host = container.get_host().await?;
        let port = container.get_host_port_ipv4(5672).await?;
        let broker = AmqpBroker::connect(&format!("amqp://{host}:{port}"), seckill_capacity).await?;

        Ok((container, broker))
    }

    #[tokio::test]
    async fn full_seckill_queue_rejects_publish() -> TestResult {
        let (_container, broker) = start(2).await?;

        for _ in 0..2 {
            broker
                .publish(OutboundMessage::json(Queue::SeckillRequests, &1)?)
                .await?;
        }

        let overflow = broker
            .publish(OutboundMessage::json(Queue::SeckillRequests, &1)?)
            .await;

        assert!(
            matches!(overflow, Err(BrokerError::QueueFull(Queue::SeckillRequests))),
            "expected QueueFull, got {overflow:?}"
        );

        Ok(())
    }

    #[tokio::test]
    async fn delayed_timeout_arrives_after_expiration() -> TestResult {
        let (_container, broker) = start(10).await?;
        let mut deliveries = broker.subscribe(Queue::OrderTimeout).await?;

        broker
            .publish(
                OutboundMessage::json(Queue::OrderTimeout, &42)?
                    .delayed(Duration::from_millis(500)),
            )
            .await?;

        let delivery = tokio::time::timeout(Duration::from_secs(10), deliveries.next())
            .await?
            .ok_or("stream ended")??;

        assert_eq!(delivery.payload, b"42");
        delivery.ack().await?;

        Ok(())
    }

    #[tokio::test]
    async fn delay_on_other_queues_is_refused() -> TestResult {
        let (_container, broker) = start(10).await?;

        let result = broker
            .publish(
                OutboundMessage::json(Queue::CartCleanup, &1)?.delayed(Duration::from_secs(1)),
            )
            .await;

        assert!(
            matches!(result, Err(BrokerError::DelayUnsupported(Queue::CartCleanup))),
            "expected DelayUnsupported, got {result:?}"
        );

        Ok(())
    }
}
