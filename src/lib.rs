pub mod config;
pub mod db;
pub mod discounts;
pub mod error;

use axum::{
    response::Json,
    routing::{get, post},
    Router,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use discounts::cache::{CacheInvalidator, DiscountCache, DEFAULT_CACHE_TTL};
use discounts::handlers;
use discounts::metrics::{DiscountMetrics, MetricsSummary};
use discounts::models::{
    AppUninstalledWebhook, CollectionUpdateWebhook, DiscountResponse, DiscountRule,
    PriceBreakdown, ProductUpdateWebhook, RuleDraft, RulePatch, Tier, TierInput,
};
use discounts::resolver::DiscountResolver;
use discounts::service::RuleService;
use discounts::store::{RuleStore, DEFAULT_STORE_TIMEOUT};
use discounts::types::{DiscountType, RuleScope};
use error::ErrorResponse;

/// OpenAPI documentation structure
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::create_rule,
        handlers::list_rules,
        handlers::get_rule,
        handlers::update_rule,
        handlers::delete_rule,
        handlers::get_discount,
        handlers::collection_updated,
        handlers::product_updated,
        handlers::app_uninstalled,
        handlers::get_metrics,
    ),
    components(
        schemas(
            DiscountRule, RuleDraft, RulePatch, Tier, TierInput, DiscountType, RuleScope,
            DiscountResponse, PriceBreakdown, CollectionUpdateWebhook, ProductUpdateWebhook,
            AppUninstalledWebhook, MetricsSummary, ErrorResponse
        )
    ),
    tags(
        (name = "rules", description = "Discount rule management"),
        (name = "discounts", description = "Discount lookups for storefronts"),
        (name = "webhooks", description = "Platform change notifications")
    ),
    info(
        title = "Quantity Discounts API",
        version = "1.0.0",
        description = "Tiered quantity discounts for storefront shops"
    )
)]
pub struct ApiDoc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub rules: RuleService,
    pub resolver: DiscountResolver,
    pub metrics: DiscountMetrics,
}

impl AppState {
    /// Wire the services around one store and one cache
    pub fn new(
        store: Arc<dyn RuleStore>,
        cache: Arc<dyn DiscountCache>,
        cache_ttl: Duration,
        store_timeout: Duration,
    ) -> Self {
        let metrics = DiscountMetrics::new();
        let invalidator = CacheInvalidator::new(cache.clone(), metrics.clone());

        Self {
            rules: RuleService::new(store.clone(), invalidator).with_store_timeout(store_timeout),
            resolver: DiscountResolver::new(store, cache, metrics.clone())
                .with_cache_ttl(cache_ttl)
                .with_store_timeout(store_timeout),
            metrics,
        }
    }

    pub fn with_defaults(store: Arc<dyn RuleStore>, cache: Arc<dyn DiscountCache>) -> Self {
        Self::new(store, cache, DEFAULT_CACHE_TTL, DEFAULT_STORE_TIMEOUT)
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

/// Creates and configures the application router
/// Maps all API endpoints to their handlers and adds CORS middleware
pub fn create_router(state: AppState) -> Router {
    // Configure CORS to allow all origins, methods, and headers
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Swagger UI
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/health", get(health))
        // Rule management
        .route("/api/rules", post(handlers::create_rule).get(handlers::list_rules))
        .route(
            "/api/rules/:id",
            get(handlers::get_rule)
                .put(handlers::update_rule)
                .delete(handlers::delete_rule),
        )
        // Storefront lookups
        .route("/api/discount", get(handlers::get_discount))
        .route("/api/metrics", get(handlers::get_metrics))
        // Platform notifications
        .route("/api/webhooks/collections-update", post(handlers::collection_updated))
        .route("/api/webhooks/products-update", post(handlers::product_updated))
        .route("/api/webhooks/app-uninstalled", post(handlers::app_uninstalled))
        .layer(cors)
        .with_state(state)
}

#[cfg(test)]
mod tests;
