//! REST API for the fleet daemon.
//!
//! # API Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET | `/api/v1/clusters` | List all clusters |
//! | GET | `/api/v1/clusters/{id}` | Get one cluster |
//! | POST | `/api/v1/clusters/{id}/restart` | Rolling-restart one cluster |
//! | POST | `/api/v1/scale` | Reconcile against a fresh shard count |
//! | GET | `/metrics` | Prometheus exposition for the whole fleet |

use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::{get, post};

use shardfleet_manager::{ClusterManager, ManagerError};

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub manager: Arc<ClusterManager>,
}

/// Response wrapper for consistent API format.
#[derive(serde::Serialize)]
struct ApiResponse<T: serde::Serialize> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T: serde::Serialize> ApiResponse<T> {
    fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            error: None,
        })
    }
}

fn error_response(msg: &str, status: StatusCode) -> impl IntoResponse {
    (
        status,
        Json(ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(msg.to_string()),
        }),
    )
}

fn manager_error_response(err: &ManagerError) -> axum::response::Response {
    let status = match err {
        ManagerError::ClusterNotFound(_) => StatusCode::NOT_FOUND,
        ManagerError::ClusterExists(_) => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    error_response(&err.to_string(), status).into_response()
}

/// Build the daemon's router.
pub fn build_router(manager: Arc<ClusterManager>) -> Router {
    let state = ApiState { manager };

    let api_routes = Router::new()
        .route("/clusters", get(list_clusters))
        .route("/clusters/{id}", get(get_cluster))
        .route("/clusters/{id}/restart", post(restart_cluster))
        .route("/scale", post(scale))
        .with_state(state.clone());

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/metrics", get(prometheus_metrics).with_state(state))
}

/// GET /api/v1/clusters
async fn list_clusters(State(state): State<ApiState>) -> impl IntoResponse {
    let fleet = state.manager.registry().snapshot().await;
    ApiResponse::ok(fleet)
}

/// GET /api/v1/clusters/{id}
async fn get_cluster(
    State(state): State<ApiState>,
    Path(id): Path<u32>,
) -> impl IntoResponse {
    let fleet = state.manager.registry().snapshot().await;
    match fleet.into_iter().find(|c| c.id == id) {
        Some(cluster) => ApiResponse::ok(cluster).into_response(),
        None => error_response("cluster not found", StatusCode::NOT_FOUND).into_response(),
    }
}

/// POST /api/v1/clusters/{id}/restart
async fn restart_cluster(
    State(state): State<ApiState>,
    Path(id): Path<u32>,
) -> impl IntoResponse {
    match state.manager.rolling_restart(id).await {
        Ok(()) => ApiResponse::ok(serde_json::json!({
            "cluster": id,
            "status": "restarted"
        }))
        .into_response(),
        Err(e) => manager_error_response(&e),
    }
}

/// POST /api/v1/scale
async fn scale(State(state): State<ApiState>) -> impl IntoResponse {
    match state.manager.scale_clusters().await {
        Ok(()) => {
            let distribution = state.manager.current_distribution().await;
            ApiResponse::ok(serde_json::json!({
                "status": "reconciled",
                "distribution": distribution
            }))
            .into_response()
        }
        Err(e) => manager_error_response(&e),
    }
}

/// GET /metrics
async fn prometheus_metrics(State(state): State<ApiState>) -> impl IntoResponse {
    let body = state.manager.render_metrics().await;
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    use shardfleet_gateway::{GatewayInfo, GatewayInfoSource, GatewayResult, SessionStartLimit};
    use shardfleet_manager::{ClusterInstance, ManagerConfig};
    use shardfleet_runtime::{ClusterSpec, ClusterStatus, ContainerRuntime, RuntimeResult};

    struct FakeRuntime;

    #[async_trait]
    impl ContainerRuntime for FakeRuntime {
        async fn create(&self, spec: &ClusterSpec) -> RuntimeResult<String> {
            Ok(format!("unit-{}", spec.cluster_id))
        }

        async fn stop(&self, _handle: &str) -> RuntimeResult<()> {
            Ok(())
        }

        async fn status(&self, _cluster_id: u32, _handle: &str) -> RuntimeResult<ClusterStatus> {
            Ok(ClusterStatus::from_engine_running(true))
        }

        async fn sweep_orphans(&self) -> RuntimeResult<u32> {
            Ok(0)
        }
    }

    struct FakeGateway;

    #[async_trait]
    impl GatewayInfoSource for FakeGateway {
        async fn gateway_info(&self) -> GatewayResult<GatewayInfo> {
            self.refresh().await
        }

        async fn refresh(&self) -> GatewayResult<GatewayInfo> {
            Ok(GatewayInfo {
                shards: 4,
                session_start_limit: SessionStartLimit {
                    total: 1000,
                    remaining: 1000,
                    reset_after: 0,
                    max_concurrency: 16,
                },
                fetched_at: std::time::Instant::now(),
            })
        }
    }

    fn test_manager() -> Arc<ClusterManager> {
        let config = ManagerConfig {
            shards_per_cluster: 4,
            ready_timeout: Duration::from_millis(200),
            ready_poll_interval: Duration::from_millis(5),
            startup_delay: Duration::from_millis(1),
            grace_delay: Duration::from_millis(1),
            inter_stop_delay: Duration::from_millis(1),
            ..Default::default()
        };
        Arc::new(ClusterManager::new(
            config,
            Arc::new(FakeGateway),
            Arc::new(FakeRuntime),
        ))
    }

    #[tokio::test]
    async fn list_clusters_empty() {
        let router = build_router(test_manager());
        let req = Request::builder()
            .uri("/api/v1/clusters")
            .body(Body::empty())
            .unwrap();
        let resp = router.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn get_cluster_known_and_unknown() {
        let manager = test_manager();
        manager
            .registry()
            .insert(ClusterInstance::new(0, vec![0, 1], "unit-0".into()))
            .await;
        let router = build_router(manager);

        let req = Request::builder()
            .uri("/api/v1/clusters/0")
            .body(Body::empty())
            .unwrap();
        let resp = router.clone().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let req = Request::builder()
            .uri("/api/v1/clusters/9")
            .body(Body::empty())
            .unwrap();
        let resp = router.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn restart_unknown_cluster_is_not_found() {
        let router = build_router(test_manager());
        let req = Request::builder()
            .method("POST")
            .uri("/api/v1/clusters/3/restart")
            .body(Body::empty())
            .unwrap();
        let resp = router.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn restart_known_cluster_succeeds() {
        let manager = test_manager();
        manager
            .registry()
            .insert(ClusterInstance::new(1, vec![4, 5], "unit-1".into()))
            .await;

        // Play the event channel's part during the readiness wait.
        let registry = manager.registry();
        let confirm = tokio::spawn(async move {
            loop {
                for id in registry.ids().await {
                    registry.apply_start_event(id).await;
                }
                tokio::time::sleep(Duration::from_millis(2)).await;
            }
        });

        let router = build_router(manager.clone());
        let req = Request::builder()
            .method("POST")
            .uri("/api/v1/clusters/1/restart")
            .body(Body::empty())
            .unwrap();
        let resp = router.oneshot(req).await.unwrap();
        confirm.abort();

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(manager.registry().shards_of(1).await.unwrap(), vec![4, 5]);
    }

    #[tokio::test]
    async fn metrics_endpoint_serves_exposition() {
        let router = build_router(test_manager());
        let req = Request::builder()
            .uri("/metrics")
            .body(Body::empty())
            .unwrap();
        let resp = router.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers().get(header::CONTENT_TYPE).unwrap(),
            "text/plain; version=0.0.4"
        );
    }
}
