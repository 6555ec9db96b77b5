//! Forwards cart row changes from the replication log to the cache queues.

use std::{sync::Arc, time::Duration};

use backon::{BackoffBuilder, ExponentialBuilder};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    cdc::{ChangeKind, ChangeSource, CdcError, RowChange},
    messaging::{MessageBroker, OutboundMessage, Queue},
    settings::CdcSettings,
};

const MAX_BACKOFF: Duration = Duration::from_secs(30);

pub struct CdcPublisher {
    source: Arc<dyn ChangeSource>,
    broker: Arc<dyn MessageBroker>,
    settings: CdcSettings,
}

impl std::fmt::Debug for CdcPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CdcPublisher")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl CdcPublisher {
    #[must_use]
    pub fn new(
        source: Arc<dyn ChangeSource>,
        broker: Arc<dyn MessageBroker>,
        settings: CdcSettings,
    ) -> Self {
        Self {
            source,
            broker,
            settings,
        }
    }

    /// Forward one batch and acknowledge it. Returns the number of log entries read.
    ///
    /// Entries that do not decode are skipped with a warning; a publish failure
    /// leaves the whole batch unacknowledged so it is read again.
    ///
    /// # Errors
    ///
    /// Returns an error when the source or the broker fails.
    pub async fn forward_batch(&self) -> Result<usize, CdcError> {
        let changes = self.source.peek(self.settings.batch_size).await?;

        let Some(last) = changes.last() else {
            return Ok(0);
        };

        let mut published = 0_usize;

        for change in &changes {
            let row = match RowChange::parse(&change.data) {
                Ok(Some(row)) if row.is_for(&self.settings.schema, &self.settings.table) => row,
                Ok(_) => continue,
                Err(source) => {
                    warn!(lsn = %change.lsn, error = %source, "skipping undecodable change");
                    continue;
                }
            };

            let entry = match row.cart_entry() {
                Ok(entry) => entry,
                Err(source) => {
                    warn!(lsn = %change.lsn, error = %source, "skipping unreadable cart row");
                    continue;
                }
            };

            let queue = match row.kind {
                ChangeKind::Insert | ChangeKind::Update => Queue::CartCacheUpsert,
                ChangeKind::Delete => Queue::CartCacheDelete,
            };

            self.broker
                .publish(OutboundMessage::json(queue, &entry)?)
                .await?;

            published += 1;
        }

        self.source.acknowledge(&last.lsn).await?;

        debug!(read = changes.len(), published, lsn = %last.lsn, "forwarded change batch");

        Ok(changes.len())
    }

    /// Tail the source until `shutdown` fires.
    pub async fn run(self, shutdown: CancellationToken) {
        let backoff = ExponentialBuilder::default()
            .with_min_delay(self.settings.poll_interval())
            .with_max_delay(MAX_BACKOFF)
            .with_jitter();
        let mut delays = backoff.build();

        info!(schema = %self.settings.schema, table = %self.settings.table, "cdc publisher started");

        loop {
            let delay = match self.forward_batch().await {
                Ok(0) => self.settings.poll_interval(),
                Ok(_) => {
                    delays = backoff.build();
                    Duration::ZERO
                }
                Err(source) => {
                    let delay = delays.next().unwrap_or(MAX_BACKOFF);

                    error!(error = %source, backoff_ms = delay.as_millis(), "cdc batch failed");

                    delay
                }
            };

            tokio::select! {
                () = shutdown.cancelled() => break,
                () = tokio::time::sleep(delay) => {}
            }
        }

        info!("cdc publisher stopped");
    }
}

#[cfg(test)]
mod tests {
    use futures::StreamExt;
    use testresult::TestResult;

    use crate::{
        cdc::{SlotChange, source::MockChangeSource},
        domain::carts::records::CartEntryRecord,
        messaging::{BrokerError, MemoryBroker, MockMessageBroker},
    };

    use super::*;

    const ROW: &str = "user_id[bigint]:7 sku_id[bigint]:3 specification[text]:'red' \
        count[integer]:2 selected[smallint]:1 version[bigint]:4 \
        created_at[timestamp with time zone]:'2026-01-01 00:00:00+00'";

    fn change(lsn: &str, data: impl Into<String>) -> SlotChange {
        SlotChange {
            lsn: lsn.to_string(),
            data: data.into(),
        }
    }

    fn batch() -> Vec<SlotChange> {
        vec![
            change("0/1", "BEGIN 1"),
            change("0/2", format!("table public.cart_entries: INSERT: {ROW}")),
            change("0/3", "table public.orders: INSERT: id[bigint]:1"),
            change("0/4", format!("table public.cart_entries: DELETE: {ROW}")),
            change("0/5", "COMMIT 1"),
        ]
    }

    #[tokio::test]
    async fn routes_cart_changes_and_acknowledges_the_batch() -> TestResult {
        let mut source = MockChangeSource::new();
        source.expect_peek().once().return_once(|_| Ok(batch()));
        source
            .expect_acknowledge()
            .once()
            .withf(|lsn| lsn == "0/5")
            .return_once(|_| Ok(()));

        let broker = Arc::new(MemoryBroker::new(1));
        let mut upserts = broker.subscribe(Queue::CartCacheUpsert).await?;
        let mut deletes = broker.subscribe(Queue::CartCacheDelete).await?;

        let publisher = CdcPublisher::new(Arc::new(source), broker, CdcSettings::default());

        assert_eq!(publisher.forward_batch().await?, 5);

        let upsert = upserts.next().await.ok_or("stream ended")??;
        let delete = deletes.next().await.ok_or("stream ended")??;
        let upserted: CartEntryRecord = serde_json::from_slice(&upsert.payload)?;
        let deleted: CartEntryRecord = serde_json::from_slice(&delete.payload)?;

        assert_eq!(upserted.count, 2);
        assert!(upserted.selected);
        assert_eq!(deleted.specification, "red");

        Ok(())
    }

    #[tokio::test]
    async fn empty_batches_are_not_acknowledged() -> TestResult {
        let mut source = MockChangeSource::new();
        source.expect_peek().once().return_once(|_| Ok(Vec::new()));
        source.expect_acknowledge().never();

        let publisher = CdcPublisher::new(
            Arc::new(source),
            Arc::new(MockMessageBroker::new()),
            CdcSettings::default(),
        );

        assert_eq!(publisher.forward_batch().await?, 0);

        Ok(())
    }

    #[tokio::test]
    async fn publish_failure_leaves_the_batch_for_replay() {
        let mut source = MockChangeSource::new();
        source.expect_peek().once().return_once(|_| Ok(batch()));
        source.expect_acknowledge().never();

        let mut broker = MockMessageBroker::new();
        broker
            .expect_publish()
            .once()
            .return_once(|message| Err(BrokerError::Closed(message.queue)));

        let publisher = CdcPublisher::new(Arc::new(source), Arc::new(broker), CdcSettings::default());

        let result = publisher.forward_batch().await;

        assert!(
            matches!(result, Err(CdcError::Broker(BrokerError::Closed(Queue::CartCacheUpsert)))),
            "expected Broker, got {result:?}"
        );
    }
}
