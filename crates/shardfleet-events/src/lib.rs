//! shardfleet-events — the out-of-band readiness signal path.
//!
//! Engine-level "the process is running" is not proof that the hosted
//! client finished its own startup, so every cluster reports back over
//! the broker: `cluster.start` once all its shards are identified,
//! `cluster.stop` on shutdown, and `metrics.cluster` with raw metrics
//! text for aggregation. This channel is fully decoupled from engine
//! polling; the lifecycle manager ANDs the two signals together.

pub mod channel;
pub mod error;
pub mod event;

pub use channel::{connect_with_retry, EventChannel, EventSink, RetryPolicy};
pub use error::{EventError, EventResult};
pub use event::{ClusterEvent, ClusterEventKind, SUBJECTS};
