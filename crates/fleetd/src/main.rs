//! fleetd — the shardfleet daemon.
//!
//! Single binary that assembles the orchestration subsystems:
//! - Gateway info provider (shard count + session limits)
//! - Container runtime (docker or swarm, probed at startup)
//! - Broker event channel (cluster lifecycle + metrics events)
//! - Cluster lifecycle manager
//! - REST API + Prometheus endpoint
//!
//! # Usage
//!
//! ```text
//! fleetd --port 7000 --bot-token $BOT_TOKEN --broker-url nats://nats:4222
//! ```

mod api;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};

use shardfleet_events::{RetryPolicy, connect_with_retry};
use shardfleet_gateway::{DEFAULT_TTL, GatewayInfoProvider};
use shardfleet_manager::{ClusterManager, ManagerConfig, RegistryEventSink};
use shardfleet_runtime::{RuntimeConfig, select_runtime};

#[derive(Parser)]
#[command(name = "fleetd", about = "Shardfleet daemon")]
struct Cli {
    /// Port the REST API listens on.
    #[arg(long, env = "FLEETD_PORT", default_value = "7000")]
    port: u16,

    /// Bot credential passed to the provider API and every cluster.
    #[arg(long, env = "BOT_TOKEN")]
    bot_token: String,

    /// Base URL of the messaging provider API.
    #[arg(long, env = "PROVIDER_API_BASE", default_value = "https://discord.com/api/v10")]
    provider_api_base: String,

    /// Image every cluster runs.
    #[arg(long, env = "CLUSTER_IMAGE", default_value = "shardfleet/bot:latest")]
    image: String,

    /// Network the cluster units attach to.
    #[arg(long, env = "CLUSTER_NETWORK")]
    network: Option<String>,

    /// Deployment environment name passed to the hosted clients.
    #[arg(long, env = "ENVIRONMENT", default_value = "production")]
    environment: String,

    /// Broker URL for the event channel.
    #[arg(long, env = "BROKER_URL", default_value = "nats://127.0.0.1:4222")]
    broker_url: String,

    /// Cache host for the hosted clients.
    #[arg(long, env = "REDIS_HOST", default_value = "127.0.0.1")]
    redis_host: String,

    /// Cache port for the hosted clients.
    #[arg(long, env = "REDIS_PORT", default_value = "6379")]
    redis_port: u16,

    /// REST backend base URL for the hosted clients.
    #[arg(long, env = "API_BASE_URL", default_value = "http://127.0.0.1:3000")]
    backend_url: String,

    /// Configured shard group size; clamped by the provider's limits.
    #[arg(long, env = "SHARDS_PER_CLUSTER", default_value = "16")]
    shards_per_cluster: u32,

    /// Deterministic unit name prefix.
    #[arg(long, env = "CLUSTER_NAME_PREFIX", default_value = "shardfleet-cluster")]
    name_prefix: String,

    /// How long a candidate cluster may take to confirm readiness.
    #[arg(long, env = "READY_TIMEOUT_SECS", default_value = "45")]
    ready_timeout_secs: u64,

    /// Health-check timer interval.
    #[arg(long, env = "HEALTH_INTERVAL_SECS", default_value = "5")]
    health_interval_secs: u64,

    /// Pause between sequential cluster creations.
    #[arg(long, env = "STARTUP_DELAY_SECS", default_value = "5")]
    startup_delay_secs: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,fleetd=debug,shardfleet=debug".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();
    info!("shardfleet daemon starting");

    // Container runtime. An unreachable engine is fatal here.
    let runtime_config = RuntimeConfig {
        image: cli.image,
        network: cli.network,
        name_prefix: cli.name_prefix,
        environment: cli.environment,
        bot_token: cli.bot_token.clone(),
        cache_host: cli.redis_host,
        cache_port: cli.redis_port,
        broker_url: cli.broker_url.clone(),
        backend_url: cli.backend_url,
        ..Default::default()
    };
    let runtime = select_runtime(runtime_config)
        .await
        .context("container engine unreachable")?;

    // Gateway info provider.
    let gateway = Arc::new(GatewayInfoProvider::new(
        cli.provider_api_base,
        cli.bot_token,
        DEFAULT_TTL,
    ));

    // Broker channel. Exhausting the retry budget is fatal.
    let events = connect_with_retry(&cli.broker_url, &RetryPolicy::default())
        .await
        .context("broker unreachable")?;

    // Lifecycle manager + event consumer feeding its registry.
    let manager_config = ManagerConfig {
        shards_per_cluster: cli.shards_per_cluster,
        ready_timeout: std::time::Duration::from_secs(cli.ready_timeout_secs),
        health_interval: std::time::Duration::from_secs(cli.health_interval_secs),
        startup_delay: std::time::Duration::from_secs(cli.startup_delay_secs),
        ..Default::default()
    };
    let manager = Arc::new(ClusterManager::new(manager_config, gateway, runtime));
    let sink = Arc::new(RegistryEventSink::new(
        manager.registry(),
        manager.metrics_cache(),
    ));
    let (consumer_handle, consumer_shutdown) = events.start_consumer(sink).await?;

    // Bring the fleet up before the API goes live.
    manager.start().await.context("fleet startup failed")?;

    // REST API with graceful shutdown.
    let router = api::build_router(manager.clone());
    let addr = SocketAddr::from(([0, 0, 0, 0], cli.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "API server starting");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Teardown order: fleet first, then the event channel.
    manager.stop().await;
    let _ = consumer_shutdown.send(true);
    if let Err(e) = consumer_handle.await {
        warn!(error = %e, "event consumer did not stop cleanly");
    }
    events.close().await;

    info!("shardfleet daemon stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install CTRL+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    info!("shutdown signal received");
}
