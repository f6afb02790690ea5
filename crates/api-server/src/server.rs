//! API server — HTTP router, Swagger UI, and the metrics exporter.

use crate::rest::{self, AppState};
use crate::swagger::ApiDoc;
use axum::routing::{get, post};
use axum::Router;
use bandit_core::config::AppConfig;
use bandit_engine::AllocationEngine;
use bandit_storage::InMemoryMetricStore;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Main API server for metric ingestion and allocation requests.
pub struct ApiServer {
    config: AppConfig,
    store: Arc<InMemoryMetricStore>,
    engine: Arc<AllocationEngine<InMemoryMetricStore>>,
}

impl ApiServer {
    pub fn new(
        config: AppConfig,
        store: Arc<InMemoryMetricStore>,
        engine: Arc<AllocationEngine<InMemoryMetricStore>>,
    ) -> Self {
        Self {
            config,
            store,
            engine,
        }
    }

    /// Start the HTTP REST server.
    pub async fn start_http(&self) -> anyhow::Result<()> {
        let state = AppState {
            store: self.store.clone(),
            engine: self.engine.clone(),
            node_id: self.config.node_id.clone(),
            start_time: Instant::now(),
        };

        let app = Router::new()
            // Experiment endpoints
            .route("/v1/metrics", post(rest::handle_ingest))
            .route(
                "/v1/experiments/:experiment_id/allocation",
                get(rest::handle_allocation),
            )
            .route(
                "/v1/experiments/:experiment_id/summary",
                get(rest::handle_summary),
            )
            // Operational endpoints
            .route("/health", get(rest::health_check))
            .route("/ready", get(rest::readiness))
            .route("/live", get(rest::liveness))
            // API docs
            .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
            // Middleware
            .layer(CompressionLayer::new())
            .layer(CorsLayer::permissive())
            .layer(TraceLayer::new_for_http())
            .with_state(state);

        let addr = SocketAddr::new(self.config.api.host.parse()?, self.config.api.http_port);

        info!(addr = %addr, "Starting HTTP server");

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app).await?;

        Ok(())
    }

    /// Start the Prometheus metrics exporter on a separate port.
    pub async fn start_metrics(&self) -> anyhow::Result<()> {
        let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
        let handle = builder
            .with_http_listener(SocketAddr::new(
                self.config.api.host.parse()?,
                self.config.metrics.port,
            ))
            .install_recorder()?;

        info!(port = self.config.metrics.port, "Metrics exporter started");

        // Keep the handle alive
        std::mem::forget(handle);
        Ok(())
    }
}
