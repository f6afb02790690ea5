//! REST API handlers for metric ingestion and allocation requests.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use bandit_core::{BanditError, MetricRecord, MetricSource, VariantSummary};
use bandit_engine::{aggregate, summarize, AllocationEngine};
use bandit_storage::InMemoryMetricStore;
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};
use utoipa::{IntoParams, ToSchema};

/// Maximum number of variants per ingest request.
const MAX_VARIANTS: usize = 100;

/// Maximum string field length (experiment ID, variant ID).
const MAX_FIELD_LEN: usize = 256;

/// Shared application state for REST handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<InMemoryMetricStore>,
    pub engine: Arc<AllocationEngine<InMemoryMetricStore>>,
    pub node_id: String,
    pub start_time: Instant,
}

/// One day of counts for one variant, as submitted by the caller.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct VariantData {
    pub variant_id: String,
    pub impressions: u64,
    pub clicks: u64,
}

/// POST /v1/metrics request body: one day of counts for an experiment.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct IngestRequest {
    pub experiment_id: String,
    pub date: NaiveDate,
    pub variants: Vec<VariantData>,
}

/// Validate an ingest request at the API boundary.
fn validate_ingest(request: &IngestRequest) -> Result<(), &'static str> {
    if request.experiment_id.is_empty() {
        return Err("'experiment_id' must not be empty");
    }
    if request.experiment_id.len() > MAX_FIELD_LEN {
        return Err("'experiment_id' exceeds maximum length");
    }
    if request.variants.is_empty() {
        return Err("request must contain at least one variant");
    }
    if request.variants.len() > MAX_VARIANTS {
        return Err("request exceeds maximum number of variants");
    }
    for variant in &request.variants {
        if variant.variant_id.is_empty() {
            return Err("'variant_id' must not be empty");
        }
        if variant.variant_id.len() > MAX_FIELD_LEN {
            return Err("'variant_id' exceeds maximum length");
        }
        if variant.clicks > variant.impressions {
            return Err("'clicks' must not exceed 'impressions'");
        }
    }
    Ok(())
}

/// POST /v1/metrics — Ingest daily experiment metrics.
#[utoipa::path(
    post,
    path = "/v1/metrics",
    tag = "Metrics",
    request_body = IngestRequest,
    responses(
        (status = 200, description = "Metrics stored", body = IngestResponse),
        (status = 400, description = "Validation failed, nothing stored", body = ErrorResponse),
    )
)]
pub async fn handle_ingest(
    State(state): State<AppState>,
    Json(request): Json<IngestRequest>,
) -> Result<Json<IngestResponse>, (StatusCode, Json<ErrorResponse>)> {
    // Validate input at API boundary
    if let Err(msg) = validate_ingest(&request) {
        warn!(experiment_id = %request.experiment_id, error = msg, "Ingest validation failed");
        metrics::counter!("api.validation_errors").increment(1);
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "invalid_metrics".to_string(),
                message: msg.to_string(),
            }),
        ));
    }

    let records: Vec<MetricRecord> = request
        .variants
        .iter()
        .map(|v| MetricRecord {
            experiment_id: request.experiment_id.clone(),
            variant_id: v.variant_id.clone(),
            date: request.date,
            impressions: v.impressions,
            clicks: v.clicks,
        })
        .collect();

    match state.store.store_day(records) {
        Ok(stored) => {
            metrics::counter!("api.metrics_stored").increment(stored as u64);
            info!(
                experiment_id = %request.experiment_id,
                date = %request.date,
                records = stored,
                "Metrics stored"
            );
            Ok(Json(IngestResponse {
                experiment_id: request.experiment_id,
                date: request.date,
                records_stored: stored,
            }))
        }
        Err(e) => Err(error_response(e)),
    }
}

/// Query parameters for the allocation endpoint.
#[derive(Debug, Deserialize, IntoParams)]
pub struct AllocationQuery {
    /// Last day of data to include; the allocation applies to the next day.
    /// Defaults to today (UTC).
    pub as_of: Option<NaiveDate>,
    /// Monte Carlo trial count override.
    pub trials: Option<u32>,
}

/// GET /v1/experiments/{experiment_id}/allocation — Recommended traffic
/// split for the day after `as_of`.
#[utoipa::path(
    get,
    path = "/v1/experiments/{experiment_id}/allocation",
    tag = "Allocation",
    params(
        ("experiment_id" = String, Path, description = "Experiment identifier"),
        AllocationQuery,
    ),
    responses(
        (status = 200, description = "Allocation computed", body = AllocationResponse),
        (status = 400, description = "Invalid trial count", body = ErrorResponse),
        (status = 404, description = "No data for experiment", body = ErrorResponse),
    )
)]
pub async fn handle_allocation(
    State(state): State<AppState>,
    Path(experiment_id): Path<String>,
    Query(query): Query<AllocationQuery>,
) -> Result<Json<AllocationResponse>, (StatusCode, Json<ErrorResponse>)> {
    let as_of = query.as_of.unwrap_or_else(|| Utc::now().date_naive());

    let result = match query.trials {
        Some(trials) => state
            .engine
            .compute_with(&experiment_id, as_of, trials, None),
        None => state.engine.compute(&experiment_id, as_of),
    };

    match result {
        Ok(result) => {
            metrics::counter!("api.allocations_computed").increment(1);
            Ok(Json(AllocationResponse {
                experiment_id: result.experiment_id,
                date: result.date,
                allocations: result
                    .allocations
                    .into_iter()
                    .map(|a| AllocationView {
                        variant_id: a.variant_id,
                        // Display precision only; the engine keeps full precision.
                        percentage: round_to(a.percentage, 1),
                    })
                    .collect(),
            }))
        }
        Err(e) => Err(error_response(e)),
    }
}

/// GET /v1/experiments/{experiment_id}/summary — Cumulative CTR and 95%
/// Wilson confidence interval per variant.
#[utoipa::path(
    get,
    path = "/v1/experiments/{experiment_id}/summary",
    tag = "Metrics",
    params(
        ("experiment_id" = String, Path, description = "Experiment identifier"),
    ),
    responses(
        (status = 200, description = "Per-variant summary", body = SummaryResponse),
        (status = 404, description = "No data for experiment", body = ErrorResponse),
    )
)]
pub async fn handle_summary(
    State(state): State<AppState>,
    Path(experiment_id): Path<String>,
) -> Result<Json<SummaryResponse>, (StatusCode, Json<ErrorResponse>)> {
    let as_of = Utc::now().date_naive();
    let records = state.store.fetch_records(&experiment_id, as_of);

    let stats = match aggregate(&experiment_id, &records) {
        Ok(stats) => stats,
        Err(e) => return Err(error_response(e)),
    };

    let variants = summarize(&stats)
        .into_iter()
        .map(|s| VariantSummary {
            ctr: round_to(s.ctr, 4),
            ci_lower: round_to(s.ci_lower, 4),
            ci_upper: round_to(s.ci_upper, 4),
            ..s
        })
        .collect();

    Ok(Json(SummaryResponse {
        experiment_id,
        date: as_of,
        variants,
    }))
}

/// GET /health — Health check endpoint.
#[utoipa::path(
    get,
    path = "/health",
    tag = "Operations",
    responses((status = 200, description = "Service healthy", body = HealthResponse))
)]
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        node_id: state.node_id.clone(),
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}

/// GET /ready — Readiness probe for Kubernetes.
#[utoipa::path(
    get,
    path = "/ready",
    tag = "Operations",
    responses((status = 200, description = "Ready to accept traffic"))
)]
pub async fn readiness(State(state): State<AppState>) -> StatusCode {
    if state.start_time.elapsed().as_secs() > 0 {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

/// GET /live — Liveness probe for Kubernetes.
#[utoipa::path(
    get,
    path = "/live",
    tag = "Operations",
    responses((status = 200, description = "Process alive"))
)]
pub async fn liveness() -> StatusCode {
    StatusCode::OK
}

fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}

/// Map an engine/storage error to a status code and wire body.
fn error_response(e: BanditError) -> (StatusCode, Json<ErrorResponse>) {
    let (status, error) = match &e {
        BanditError::Validation(_) => (StatusCode::BAD_REQUEST, "invalid_metrics"),
        BanditError::InsufficientData(_) => (StatusCode::NOT_FOUND, "no_experiment_data"),
        BanditError::InvalidParameter(_) => (StatusCode::BAD_REQUEST, "invalid_parameter"),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
    };
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        tracing::error!(error = %e, "Request failed");
    }
    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
            message: e.to_string(),
        }),
    )
}

#[derive(Serialize, ToSchema)]
pub struct IngestResponse {
    pub experiment_id: String,
    pub date: NaiveDate,
    pub records_stored: usize,
}

/// Allocation with display-rounded percentages.
#[derive(Serialize, ToSchema)]
pub struct AllocationView {
    pub variant_id: String,
    pub percentage: f64,
}

#[derive(Serialize, ToSchema)]
pub struct AllocationResponse {
    pub experiment_id: String,
    pub date: NaiveDate,
    pub allocations: Vec<AllocationView>,
}

#[derive(Serialize, ToSchema)]
pub struct SummaryResponse {
    pub experiment_id: String,
    pub date: NaiveDate,
    pub variants: Vec<VariantSummary>,
}

#[derive(Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub node_id: String,
    pub uptime_secs: u64,
}
