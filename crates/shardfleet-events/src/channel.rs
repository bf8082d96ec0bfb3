//! Broker channel: bounded-retry connect, consumer task, publisher.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use rand::Rng;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{EventError, EventResult};
use crate::event::{ClusterEvent, ClusterEventKind, SUBJECTS};

/// Queue group shared by manager replicas so each event is delivered once.
const QUEUE_GROUP: &str = "shardfleet-manager";

/// Receiver for parsed cluster events.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn on_event(&self, event: ClusterEvent);
}

/// Bounded exponential backoff with jitter for the broker connect.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(15),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (0-based), jittered.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = self
            .base_delay
            .saturating_mul(2u32.saturating_pow(attempt))
            .min(self.max_delay);
        let jitter_ms = rand::thread_rng().gen_range(0..=250);
        exp + Duration::from_millis(jitter_ms)
    }
}

/// Connect to the broker, retrying per `policy`. Exhausting the budget
/// is fatal to process startup.
pub async fn connect_with_retry(url: &str, policy: &RetryPolicy) -> EventResult<EventChannel> {
    let mut attempt = 0u32;
    loop {
        match async_nats::connect(url).await {
            Ok(client) => {
                info!(%url, "broker connected");
                return Ok(EventChannel { client });
            }
            Err(e) => {
                attempt += 1;
                if attempt >= policy.max_attempts {
                    return Err(EventError::Connect { attempts: attempt, source: e });
                }
                let delay = policy.delay_for(attempt - 1);
                warn!(
                    %url,
                    attempt,
                    max_attempts = policy.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "broker connect failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}

/// True when a payload's declared type agrees with the subject it was
/// delivered on. Guards against misrouted publishes.
fn subject_matches(subject: &str, kind: ClusterEventKind) -> bool {
    ClusterEventKind::from_subject(subject) == Some(kind)
}

/// A connected broker channel: consumer side for the manager, producer
/// side for tests and the hosted clients.
pub struct EventChannel {
    client: async_nats::Client,
}

impl EventChannel {
    /// Subscribe to the cluster subjects and pump parsed events into
    /// `sink` until the shutdown signal fires.
    ///
    /// Malformed payloads are logged and skipped; consumption errors
    /// never take the manager down.
    pub async fn start_consumer(
        &self,
        sink: Arc<dyn EventSink>,
    ) -> EventResult<(JoinHandle<()>, watch::Sender<bool>)> {
        let mut subscribers = Vec::with_capacity(SUBJECTS.len());
        for subject in SUBJECTS {
            let sub = self
                .client
                .queue_subscribe(subject, QUEUE_GROUP.to_string())
                .await?;
            subscribers.push(sub);
        }
        let mut merged = futures_util::stream::select_all(subscribers);

        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    message = merged.next() => {
                        let Some(message) = message else {
                            warn!("broker subscription stream ended");
                            break;
                        };
                        match serde_json::from_slice::<ClusterEvent>(&message.payload) {
                            Ok(event) if !subject_matches(message.subject.as_str(), event.kind) => {
                                warn!(
                                    subject = message.subject.as_str(),
                                    kind = ?event.kind,
                                    cluster_id = event.cluster_id,
                                    "discarding event whose type contradicts its subject"
                                );
                            }
                            Ok(event) => {
                                debug!(
                                    subject = message.subject.as_str(),
                                    cluster_id = event.cluster_id,
                                    "cluster event received"
                                );
                                sink.on_event(event).await;
                            }
                            Err(e) => warn!(
                                subject = message.subject.as_str(),
                                error = %e,
                                "discarding malformed cluster event"
                            ),
                        }
                    }
                    _ = shutdown_rx.changed() => {
                        debug!("event consumer shutting down");
                        break;
                    }
                }
            }
        });

        info!(subjects = ?SUBJECTS, queue_group = QUEUE_GROUP, "event consumer started");
        Ok((handle, shutdown_tx))
    }

    /// Publish an event on its kind's subject.
    pub async fn publish(&self, event: &ClusterEvent) -> EventResult<()> {
        let payload = serde_json::to_vec(event)?;
        self.client.publish(event.kind.subject(), payload.into()).await?;
        Ok(())
    }

    /// Flush pending publishes and drop the connection.
    pub async fn close(self) {
        if let Err(e) = self.client.flush().await {
            warn!(error = %e, "broker flush on close failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subject_and_type_must_agree() {
        assert!(subject_matches("cluster.start", ClusterEventKind::Start));
        assert!(subject_matches("metrics.cluster", ClusterEventKind::Metrics));
        // A stop payload delivered on the start subject is misrouted.
        assert!(!subject_matches("cluster.start", ClusterEventKind::Stop));
        assert!(!subject_matches("cluster.unknown", ClusterEventKind::Start));
    }

    #[test]
    fn backoff_grows_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 8,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(2),
        };
        // Jitter adds at most 250ms on top of the exponential part.
        assert!(policy.delay_for(0) < Duration::from_millis(400));
        assert!(policy.delay_for(3) >= Duration::from_millis(800));
        for attempt in 0..32 {
            assert!(policy.delay_for(attempt) <= Duration::from_millis(2250));
        }
    }

    #[tokio::test]
    async fn connect_gives_up_after_budget() {
        let policy = RetryPolicy {
            max_attempts: 2,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
        };
        let result = connect_with_retry("nats://127.0.0.1:1", &policy).await;
        match result {
            Err(EventError::Connect { attempts, .. }) => assert_eq!(attempts, 2),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("expected connect error"),
        }
    }
}
