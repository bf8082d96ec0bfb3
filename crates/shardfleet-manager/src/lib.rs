//! shardfleet-manager — the cluster lifecycle manager.
//!
//! Owns the cluster registry (the single source of truth for "this
//! cluster currently exists"), sequences startup, confirms readiness
//! from two independent signals, runs the health-check timer, and
//! reconciles the running fleet against a newly computed distribution
//! during scaling and rolling restarts.
//!
//! # Readiness
//!
//! A cluster is ready when BOTH signals agree:
//!
//! ```text
//! engine_running   (container engine inspection)
//! AND app_ready    (cluster.start over the event channel)
//! ```
//!
//! The two sources write independently into the registry; every status
//! mutation goes through a registry method that holds the lock for the
//! whole read-modify-write, so the writers never interleave.
//!
//! # Health loop
//!
//! The timer only detects and logs degradation. Restoring a degraded
//! cluster is an explicit operator action (`rolling_restart`).

pub mod config;
pub mod error;
pub mod manager;
pub mod metrics;
pub mod registry;
pub mod sink;

pub use config::ManagerConfig;
pub use error::{ManagerError, ManagerResult};
pub use manager::ClusterManager;
pub use metrics::{inject_cluster_label, MetricsCache};
pub use registry::{ClusterInstance, ClusterRegistry, ClusterSummary};
pub use sink::RegistryEventSink;
