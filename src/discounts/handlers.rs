// HTTP handlers for discount rules, discount lookups and platform webhooks

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    Json,
};
use uuid::Uuid;
use validator::Validate;

use crate::discounts::metrics::MetricsSummary;
use crate::discounts::models::{
    AppUninstalledWebhook, CollectionUpdateWebhook, DiscountQuery, DiscountResponse,
    DiscountRule, ListRulesQuery, ProductUpdateWebhook, RuleDraft, RulePatch, ShopScopeQuery,
};
use crate::discounts::pricing::price_breakdown;
use crate::error::{ApiError, ErrorResponse};
use crate::AppState;

/// Handler for POST /api/rules
/// Creates a discount rule
#[utoipa::path(
    post,
    path = "/api/rules",
    request_body = RuleDraft,
    responses(
        (status = 201, description = "Rule created", body = DiscountRule),
        (status = 400, description = "Rule violates one or more constraints", body = ErrorResponse),
        (status = 503, description = "Rule store or cache unavailable", body = ErrorResponse)
    ),
    tag = "rules"
)]
pub async fn create_rule(
    State(state): State<AppState>,
    payload: Result<Json<RuleDraft>, JsonRejection>,
) -> Result<(StatusCode, Json<DiscountRule>), ApiError> {
    let Json(draft) = payload?;
    tracing::debug!("Creating discount rule for shop {:?}", draft.shop_id);

    let rule = state.rules.create_rule(draft).await?;
    Ok((StatusCode::CREATED, Json(rule)))
}

/// Handler for GET /api/rules
/// Lists a shop's rules, newest first
#[utoipa::path(
    get,
    path = "/api/rules",
    params(ListRulesQuery),
    responses(
        (status = 200, description = "Rules of the shop", body = Vec<DiscountRule>),
        (status = 400, description = "Missing or malformed query parameters", body = ErrorResponse),
        (status = 503, description = "Rule store unavailable", body = ErrorResponse)
    ),
    tag = "rules"
)]
pub async fn list_rules(
    State(state): State<AppState>,
    query: Result<Query<ListRulesQuery>, QueryRejection>,
) -> Result<Json<Vec<DiscountRule>>, ApiError> {
    let Query(query) = query?;
    query.validate()?;
    tracing::debug!("Listing discount rules for shop {}", query.shop_id);

    let rules = state.rules.list_rules(&query.shop_id, query.filters()).await?;

    tracing::debug!("Retrieved {} rules", rules.len());
    Ok(Json(rules))
}

/// Handler for GET /api/rules/:id
#[utoipa::path(
    get,
    path = "/api/rules/{id}",
    params(
        ("id" = Uuid, Path, description = "Rule ID"),
        ShopScopeQuery
    ),
    responses(
        (status = 200, description = "Rule found", body = DiscountRule),
        (status = 400, description = "Missing shopId or malformed id", body = ErrorResponse),
        (status = 404, description = "Rule not found", body = ErrorResponse)
    ),
    tag = "rules"
)]
pub async fn get_rule(
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
    query: Result<Query<ShopScopeQuery>, QueryRejection>,
) -> Result<Json<DiscountRule>, ApiError> {
    let Path(id) = id?;
    let Query(scope) = query?;
    scope.validate()?;
    tracing::debug!("Fetching discount rule {}", id);

    let rule = state.rules.get_rule(id, &scope.shop_id).await?;
    Ok(Json(rule))
}

/// Handler for PUT /api/rules/:id
/// Applies a partial update; omitted fields keep their stored values
#[utoipa::path(
    put,
    path = "/api/rules/{id}",
    params(
        ("id" = Uuid, Path, description = "Rule ID"),
        ShopScopeQuery
    ),
    request_body = RulePatch,
    responses(
        (status = 200, description = "Rule updated", body = DiscountRule),
        (status = 400, description = "Merged rule violates one or more constraints, or shopId is missing", body = ErrorResponse),
        (status = 404, description = "Rule not found", body = ErrorResponse),
        (status = 503, description = "Rule store or cache unavailable", body = ErrorResponse)
    ),
    tag = "rules"
)]
pub async fn update_rule(
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
    query: Result<Query<ShopScopeQuery>, QueryRejection>,
    payload: Result<Json<RulePatch>, JsonRejection>,
) -> Result<Json<DiscountRule>, ApiError> {
    let Path(id) = id?;
    let Query(scope) = query?;
    scope.validate()?;
    let Json(patch) = payload?;
    tracing::debug!("Updating discount rule {}", id);

    let rule = state
        .rules
        .update_rule(id, &scope.shop_id, patch)
        .await?;
    Ok(Json(rule))
}

/// Handler for DELETE /api/rules/:id
#[utoipa::path(
    delete,
    path = "/api/rules/{id}",
    params(
        ("id" = Uuid, Path, description = "Rule ID"),
        ShopScopeQuery
    ),
    responses(
        (status = 204, description = "Rule deleted"),
        (status = 400, description = "Missing shopId or malformed id", body = ErrorResponse),
        (status = 404, description = "Rule not found", body = ErrorResponse),
        (status = 503, description = "Rule store or cache unavailable", body = ErrorResponse)
    ),
    tag = "rules"
)]
pub async fn delete_rule(
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
    query: Result<Query<ShopScopeQuery>, QueryRejection>,
) -> Result<StatusCode, ApiError> {
    let Path(id) = id?;
    let Query(scope) = query?;
    scope.validate()?;
    tracing::debug!("Deleting discount rule {}", id);

    state.rules.delete_rule(id, &scope.shop_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Handler for GET /api/discount
/// Best discount for a product at a quantity, with an optional price preview
#[utoipa::path(
    get,
    path = "/api/discount",
    params(DiscountQuery),
    responses(
        (status = 200, description = "Resolved discount (zero when no rule qualifies)", body = DiscountResponse),
        (status = 400, description = "Non-positive quantity or missing ids", body = ErrorResponse),
        (status = 503, description = "Rule store unavailable", body = ErrorResponse)
    ),
    tag = "discounts"
)]
pub async fn get_discount(
    State(state): State<AppState>,
    query: Result<Query<DiscountQuery>, QueryRejection>,
) -> Result<Json<DiscountResponse>, ApiError> {
    let Query(query) = query?;
    tracing::debug!(
        "Calculating discount for shop {} product {} x{}",
        query.shop_id,
        query.product_id,
        query.quantity
    );

    if let Some(price) = query.price {
        if price.is_sign_negative() {
            return Err(ApiError::InvalidArgument("price cannot be negative".to_string()));
        }
    }

    let calculation = state
        .resolver
        .calculate(
            &query.shop_id,
            &query.product_id,
            query.quantity,
            query.collection_ids(),
        )
        .await?;

    let resolution = calculation.resolution;
    let pricing = query
        .price
        .map(|price| price_breakdown(&resolution, price, query.quantity))
        .transpose()?;

    Ok(Json(DiscountResponse {
        discount: resolution.value,
        discount_type: resolution.discount_type,
        rule_id: resolution.rule_id,
        min_quantity: resolution.min_quantity,
        cached: calculation.cached,
        pricing,
    }))
}

/// Handler for POST /api/webhooks/collections-update
#[utoipa::path(
    post,
    path = "/api/webhooks/collections-update",
    request_body = CollectionUpdateWebhook,
    responses(
        (status = 204, description = "Memberships replaced and shop cache invalidated"),
        (status = 400, description = "Malformed notification", body = ErrorResponse),
        (status = 503, description = "Rule store or cache unavailable", body = ErrorResponse)
    ),
    tag = "webhooks"
)]
pub async fn collection_updated(
    State(state): State<AppState>,
    payload: Result<Json<CollectionUpdateWebhook>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    let Json(notification) = payload?;
    notification.validate()?;
    tracing::debug!(
        "Collection {} updated for shop {}",
        notification.collection_id,
        notification.shop_id
    );

    state
        .rules
        .collection_updated(
            &notification.shop_id,
            &notification.collection_id,
            &notification.product_ids,
        )
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Handler for POST /api/webhooks/products-update
#[utoipa::path(
    post,
    path = "/api/webhooks/products-update",
    request_body = ProductUpdateWebhook,
    responses(
        (status = 204, description = "Product processed and shop cache invalidated"),
        (status = 400, description = "Malformed notification", body = ErrorResponse),
        (status = 503, description = "Rule store or cache unavailable", body = ErrorResponse)
    ),
    tag = "webhooks"
)]
pub async fn product_updated(
    State(state): State<AppState>,
    payload: Result<Json<ProductUpdateWebhook>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    let Json(notification) = payload?;
    notification.validate()?;
    tracing::debug!(
        "Product {} updated for shop {}",
        notification.product_id,
        notification.shop_id
    );

    state
        .rules
        .product_updated(
            &notification.shop_id,
            &notification.product_id,
            notification.collection_ids.as_deref(),
        )
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Handler for POST /api/webhooks/app-uninstalled
#[utoipa::path(
    post,
    path = "/api/webhooks/app-uninstalled",
    request_body = AppUninstalledWebhook,
    responses(
        (status = 204, description = "Shop data purged"),
        (status = 400, description = "Malformed notification", body = ErrorResponse),
        (status = 503, description = "Rule store or cache unavailable", body = ErrorResponse)
    ),
    tag = "webhooks"
)]
pub async fn app_uninstalled(
    State(state): State<AppState>,
    payload: Result<Json<AppUninstalledWebhook>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    let Json(notification) = payload?;
    notification.validate()?;
    tracing::warn!("App uninstalled by shop {}", notification.shop_id);

    state.rules.app_uninstalled(&notification.shop_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Handler for GET /api/metrics
#[utoipa::path(
    get,
    path = "/api/metrics",
    responses(
        (status = 200, description = "Cache and calculation counters", body = MetricsSummary)
    ),
    tag = "discounts"
)]
pub async fn get_metrics(State(state): State<AppState>) -> Json<MetricsSummary> {
    Json(state.metrics.summary())
}
