//! OpenAPI specification and Swagger UI configuration.

use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Bandit Allocator API",
        version = "0.1.0",
        description = "Daily traffic allocation for A/B/multi-variant experiments.\n\nIngests daily click-through metrics and recommends next-day traffic splits computed with Thompson Sampling over Beta posteriors.",
        license(name = "MIT"),
    ),
    tags(
        (name = "Metrics", description = "Daily metric ingestion and cumulative summaries"),
        (name = "Allocation", description = "Thompson Sampling traffic allocation"),
        (name = "Operations", description = "Health, readiness, and liveness probes"),
    ),
    paths(
        // Metrics
        crate::rest::handle_ingest,
        crate::rest::handle_summary,
        // Allocation
        crate::rest::handle_allocation,
        // Operations
        crate::rest::health_check,
        crate::rest::readiness,
        crate::rest::liveness,
    ),
    components(schemas(
        // Core types
        bandit_core::types::MetricRecord,
        bandit_core::types::Allocation,
        bandit_core::types::AllocationResult,
        bandit_core::types::VariantSummary,
        // Wire types
        crate::rest::VariantData,
        crate::rest::IngestRequest,
        crate::rest::IngestResponse,
        crate::rest::AllocationView,
        crate::rest::AllocationResponse,
        crate::rest::SummaryResponse,
        crate::rest::ErrorResponse,
        crate::rest::HealthResponse,
    ))
)]
pub struct ApiDoc;
