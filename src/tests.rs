// Router tests for the Quantity Discounts API
// Exercise every endpoint through the full axum stack against the
// in-memory rule store and cache

use super::*;
use axum::http::StatusCode;
use axum_test::TestServer;
use serde_json::{json, Value};

use crate::discounts::cache::MemoryDiscountCache;
use crate::discounts::store::MemoryRuleStore;

const SHOP: &str = "shop-a.myshopify.com";
const OTHER_SHOP: &str = "shop-b.myshopify.com";

// ============================================================================
// Test Helpers
// ============================================================================

fn create_test_app() -> TestServer {
    let state = AppState::with_defaults(
        Arc::new(MemoryRuleStore::new()),
        Arc::new(MemoryDiscountCache::new()),
    );
    TestServer::new(create_router(state)).unwrap()
}

fn percentage_rule(shop: &str, tiers: Value) -> Value {
    json!({
        "shopId": shop,
        "type": "percentage",
        "tiers": tiers,
    })
}

async fn create_rule(server: &TestServer, payload: Value) -> Value {
    let response = server.post("/api/rules").json(&payload).await;
    assert_eq!(response.status_code(), StatusCode::CREATED);
    response.json::<Value>()
}

async fn discount(server: &TestServer, shop: &str, product: &str, quantity: &str) -> Value {
    let response = server
        .get("/api/discount")
        .add_query_param("shopId", shop)
        .add_query_param("productId", product)
        .add_query_param("quantity", quantity)
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    response.json::<Value>()
}

// ============================================================================
// Rule management (POST/GET/PUT/DELETE /api/rules)
// ============================================================================

#[tokio::test]
async fn test_create_rule_success() {
    let server = create_test_app();

    let rule = create_rule(
        &server,
        json!({
            "shopId": SHOP,
            "type": "fixed",
            "productId": "p1",
            "tiers": [{"quantity": 5, "discount": 2.5}, {"quantity": 2, "discount": 1}],
            "startDate": "2024-01-01",
        }),
    )
    .await;

    assert_eq!(rule["shopId"], SHOP);
    assert_eq!(rule["type"], "fixed");
    assert_eq!(rule["scope"], "product");
    assert_eq!(rule["productId"], "p1");
    assert_eq!(rule["active"], true);
    assert_eq!(rule["tiers"][0]["quantity"], 2);
    assert_eq!(rule["tiers"][1]["quantity"], 5);
    assert!(rule["id"].is_string());
    assert!(rule["createdAt"].is_string());
}

#[tokio::test]
async fn test_create_rule_reports_every_violation() {
    let server = create_test_app();

    let response = server
        .post("/api/rules")
        .json(&json!({
            "type": "percentage",
            "tiers": [
                {"quantity": 0, "discount": 10},
                {"quantity": 3, "discount": 150},
            ],
            "startDate": "not-a-date",
        }))
        .await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    let body = response.json::<Value>();
    assert_eq!(body["errorCode"], "VALIDATION_ERROR");
    assert_eq!(body["retryable"], false);
    let details: Vec<String> = serde_json::from_value(body["details"].clone()).unwrap();
    assert_eq!(
        details,
        vec![
            "Shop ID is required".to_string(),
            "Tier 1 quantity must be greater than 0".to_string(),
            "Tier 2 percentage discount cannot exceed 100%".to_string(),
            "Invalid start date format".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_create_rule_rejects_duplicate_tiers_and_inverted_window() {
    let server = create_test_app();

    let response = server
        .post("/api/rules")
        .json(&json!({
            "shopId": SHOP,
            "type": "percentage",
            "tiers": [{"quantity": 2, "discount": 5}, {"quantity": 2, "discount": 10}],
            "startDate": "2024-06-01",
            "endDate": "2024-01-01",
        }))
        .await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    let details = response.json::<Value>()["details"].clone();
    let details: Vec<String> = serde_json::from_value(details).unwrap();
    assert!(details.iter().any(|d| d.contains("must be unique")));
    assert!(details.contains(&"End date must be after start date".to_string()));
}

#[tokio::test]
async fn test_create_rule_malformed_json() {
    let server = create_test_app();

    let response = server
        .post("/api/rules")
        .json(&json!({"shopId": SHOP, "tiers": "lots"}))
        .await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(response.json::<Value>()["errorCode"], "INVALID_ARGUMENT");
}

#[tokio::test]
async fn test_list_rules_newest_first_and_filtered() {
    let server = create_test_app();
    let first = create_rule(&server, percentage_rule(SHOP, json!([{"quantity": 2, "discount": 5}]))).await;
    let mut inactive = percentage_rule(SHOP, json!([{"quantity": 2, "discount": 5}]));
    inactive["active"] = json!(false);
    let second = create_rule(&server, inactive).await;
    create_rule(&server, percentage_rule(OTHER_SHOP, json!([{"quantity": 2, "discount": 5}]))).await;

    let response = server.get("/api/rules").add_query_param("shopId", SHOP).await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let rules = response.json::<Vec<Value>>();
    assert_eq!(rules.len(), 2);
    assert_eq!(rules[0]["id"], second["id"]);
    assert_eq!(rules[1]["id"], first["id"]);

    let response = server
        .get("/api/rules")
        .add_query_param("shopId", SHOP)
        .add_query_param("active", "true")
        .await;
    let rules = response.json::<Vec<Value>>();
    assert_eq!(rules.len(), 1);
    assert_eq!(rules[0]["id"], first["id"]);
}

#[tokio::test]
async fn test_list_rules_requires_shop() {
    let server = create_test_app();

    let response = server.get("/api/rules").await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);

    let response = server.get("/api/rules").add_query_param("shopId", "").await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(response.json::<Value>()["message"], "shopId is required");
}

#[tokio::test]
async fn test_get_rule_scoped_to_shop() {
    let server = create_test_app();
    let rule = create_rule(&server, percentage_rule(SHOP, json!([{"quantity": 2, "discount": 5}]))).await;
    let id = rule["id"].as_str().unwrap();

    let response = server
        .get(&format!("/api/rules/{}", id))
        .add_query_param("shopId", SHOP)
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);

    let response = server
        .get(&format!("/api/rules/{}", id))
        .add_query_param("shopId", OTHER_SHOP)
        .await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
    assert_eq!(response.json::<Value>()["errorCode"], "NOT_FOUND");
}

#[tokio::test]
async fn test_get_rule_invalid_id() {
    let server = create_test_app();

    let response = server.get("/api/rules/not-a-uuid").await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_update_rule_partial_fields() {
    let server = create_test_app();
    let mut payload = percentage_rule(SHOP, json!([{"quantity": 3, "discount": 10}]));
    payload["productId"] = json!("p1");
    let rule = create_rule(&server, payload).await;
    let id = rule["id"].as_str().unwrap();

    let response = server
        .put(&format!("/api/rules/{}", id))
        .add_query_param("shopId", SHOP)
        .json(&json!({"tiers": [{"quantity": 3, "discount": 15}]}))
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let updated = response.json::<Value>();
    assert_eq!(updated["tiers"][0]["discount"], 15.0);
    assert_eq!(updated["productId"], "p1");
    assert_eq!(updated["scope"], "product");
    assert_eq!(updated["createdAt"], rule["createdAt"]);
}

#[tokio::test]
async fn test_update_rule_invalid_merge_keeps_stored_rule() {
    let server = create_test_app();
    let rule = create_rule(&server, percentage_rule(SHOP, json!([{"quantity": 3, "discount": 60}]))).await;
    let id = rule["id"].as_str().unwrap();

    let response = server
        .put(&format!("/api/rules/{}", id))
        .add_query_param("shopId", SHOP)
        .json(&json!({"tiers": [{"quantity": 3, "discount": 120}]}))
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);

    let stored = server
        .get(&format!("/api/rules/{}", id))
        .add_query_param("shopId", SHOP)
        .await
        .json::<Value>();
    assert_eq!(stored["tiers"][0]["discount"], 60.0);
}

#[tokio::test]
async fn test_update_rule_not_found() {
    let server = create_test_app();

    let response = server
        .put(&format!("/api/rules/{}", uuid::Uuid::new_v4()))
        .add_query_param("shopId", SHOP)
        .json(&json!({"active": false}))
        .await;

    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_rule_twice() {
    let server = create_test_app();
    let rule = create_rule(&server, percentage_rule(SHOP, json!([{"quantity": 2, "discount": 5}]))).await;
    let path = format!("/api/rules/{}", rule["id"].as_str().unwrap());

    let response = server.delete(&path).add_query_param("shopId", OTHER_SHOP).await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);

    let response = server.delete(&path).add_query_param("shopId", SHOP).await;
    assert_eq!(response.status_code(), StatusCode::NO_CONTENT);

    let response = server.delete(&path).add_query_param("shopId", SHOP).await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_single_rule_endpoints_require_shop() {
    let server = create_test_app();
    let rule = create_rule(&server, percentage_rule(SHOP, json!([{"quantity": 2, "discount": 5}]))).await;
    let path = format!("/api/rules/{}", rule["id"].as_str().unwrap());

    let response = server.get(&path).await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);

    let response = server.put(&path).json(&json!({"active": false})).await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);

    let response = server.delete(&path).add_query_param("shopId", "").await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(response.json::<Value>()["message"], "shopId is required");

    let stored = server.get(&path).add_query_param("shopId", SHOP).await.json::<Value>();
    assert_eq!(stored["active"], true);
}

// ============================================================================
// Discount lookups (GET /api/discount)
// ============================================================================

#[tokio::test]
async fn test_discount_tier_thresholds() {
    let server = create_test_app();
    let mut payload = percentage_rule(
        SHOP,
        json!([{"quantity": 3, "discount": 10}, {"quantity": 5, "discount": 20}]),
    );
    payload["productId"] = json!("p1");
    let rule = create_rule(&server, payload).await;

    let below = discount(&server, SHOP, "p1", "2").await;
    assert_eq!(below["discount"], 0.0);
    assert!(below["type"].is_null());
    assert!(below["ruleId"].is_null());

    let first_tier = discount(&server, SHOP, "p1", "3").await;
    assert_eq!(first_tier["discount"], 0.1);
    assert_eq!(first_tier["type"], "percentage");
    assert_eq!(first_tier["ruleId"], rule["id"]);
    assert_eq!(first_tier["minQuantity"], 3);

    let second_tier = discount(&server, SHOP, "p1", "5").await;
    assert_eq!(second_tier["discount"], 0.2);

    let other_product = discount(&server, SHOP, "p2", "5").await;
    assert_eq!(other_product["discount"], 0.0);
}

#[tokio::test]
async fn test_discount_newest_rule_wins_tie() {
    let server = create_test_app();
    create_rule(&server, percentage_rule(SHOP, json!([{"quantity": 2, "discount": 10}]))).await;
    let newer = create_rule(&server, percentage_rule(SHOP, json!([{"quantity": 2, "discount": 10}]))).await;

    let result = discount(&server, SHOP, "p1", "2").await;
    assert_eq!(result["ruleId"], newer["id"]);
}

#[tokio::test]
async fn test_discount_rejects_bad_arguments() {
    let server = create_test_app();

    for quantity in ["0", "-1", "abc"] {
        let response = server
            .get("/api/discount")
            .add_query_param("shopId", SHOP)
            .add_query_param("productId", "p1")
            .add_query_param("quantity", quantity)
            .await;
        assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(response.json::<Value>()["errorCode"], "INVALID_ARGUMENT");
    }

    let response = server
        .get("/api/discount")
        .add_query_param("productId", "p1")
        .add_query_param("quantity", "2")
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_discount_is_cached_until_rules_change() {
    let server = create_test_app();
    let rule = create_rule(&server, percentage_rule(SHOP, json!([{"quantity": 2, "discount": 10}]))).await;

    let first = discount(&server, SHOP, "p1", "2").await;
    let second = discount(&server, SHOP, "p1", "2").await;
    assert_eq!(first["cached"], false);
    assert_eq!(second["cached"], true);
    assert_eq!(second["discount"], 0.1);

    let response = server
        .put(&format!("/api/rules/{}", rule["id"].as_str().unwrap()))
        .add_query_param("shopId", SHOP)
        .json(&json!({"tiers": [{"quantity": 2, "discount": 25}]}))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);

    let after = discount(&server, SHOP, "p1", "2").await;
    assert_eq!(after["cached"], false);
    assert_eq!(after["discount"], 0.25);

    server
        .delete(&format!("/api/rules/{}", rule["id"].as_str().unwrap()))
        .add_query_param("shopId", SHOP)
        .await;
    let after_delete = discount(&server, SHOP, "p1", "2").await;
    assert_eq!(after_delete["discount"], 0.0);
}

#[tokio::test]
async fn test_mutation_in_one_shop_keeps_other_shop_cached() {
    let server = create_test_app();
    create_rule(&server, percentage_rule(SHOP, json!([{"quantity": 2, "discount": 10}]))).await;
    create_rule(&server, percentage_rule(OTHER_SHOP, json!([{"quantity": 2, "discount": 10}]))).await;
    discount(&server, OTHER_SHOP, "p1", "2").await;

    create_rule(&server, percentage_rule(SHOP, json!([{"quantity": 2, "discount": 30}]))).await;

    let other = discount(&server, OTHER_SHOP, "p1", "2").await;
    assert_eq!(other["cached"], true);
    assert_eq!(other["discount"], 0.1);
    let own = discount(&server, SHOP, "p1", "2").await;
    assert_eq!(own["discount"], 0.3);
}

#[tokio::test]
async fn test_discount_with_explicit_collections() {
    let server = create_test_app();
    let mut payload = percentage_rule(SHOP, json!([{"quantity": 1, "discount": 12}]));
    payload["collectionIds"] = json!(["summer", "sale"]);
    create_rule(&server, payload).await;

    let response = server
        .get("/api/discount")
        .add_query_param("shopId", SHOP)
        .add_query_param("productId", "p1")
        .add_query_param("quantity", "1")
        .add_query_param("collectionIds", "winter,sale")
        .await;
    assert_eq!(response.json::<Value>()["discount"], 0.12);

    let response = server
        .get("/api/discount")
        .add_query_param("shopId", SHOP)
        .add_query_param("productId", "p1")
        .add_query_param("quantity", "1")
        .add_query_param("collectionIds", "winter")
        .await;
    assert_eq!(response.json::<Value>()["discount"], 0.0);
}

#[tokio::test]
async fn test_discount_price_preview() {
    let server = create_test_app();
    let payload = json!({
        "shopId": SHOP,
        "type": "fixed",
        "tiers": [{"quantity": 2, "discount": 4}],
    });
    create_rule(&server, payload).await;

    let response = server
        .get("/api/discount")
        .add_query_param("shopId", SHOP)
        .add_query_param("productId", "p1")
        .add_query_param("quantity", "3")
        .add_query_param("price", "10")
        .await;

    let body = response.json::<Value>();
    assert_eq!(body["type"], "fixed");
    assert_eq!(body["pricing"]["originalTotal"], 30.0);
    assert_eq!(body["pricing"]["discountedTotal"], 18.0);
    assert_eq!(body["pricing"]["savings"], 12.0);

    let without_price = discount(&server, SHOP, "p1", "3").await;
    assert!(without_price.get("pricing").is_none());
}

#[tokio::test]
async fn test_discount_price_preview_out_of_range() {
    let server = create_test_app();
    create_rule(
        &server,
        json!({
            "shopId": SHOP,
            "type": "fixed",
            "tiers": [{"quantity": 1, "discount": 1}],
        }),
    )
    .await;

    let response = server
        .get("/api/discount")
        .add_query_param("shopId", SHOP)
        .add_query_param("productId", "p1")
        .add_query_param("quantity", "9223372036854775807")
        .add_query_param("price", "1000000000000")
        .await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(response.json::<Value>()["errorCode"], "INVALID_ARGUMENT");
}

// ============================================================================
// Webhooks
// ============================================================================

#[tokio::test]
async fn test_collection_webhook_drives_membership_matching() {
    let server = create_test_app();
    let mut payload = percentage_rule(SHOP, json!([{"quantity": 1, "discount": 15}]));
    payload["collectionId"] = json!("c1");
    create_rule(&server, payload).await;

    assert_eq!(discount(&server, SHOP, "p1", "1").await["discount"], 0.0);

    let response = server
        .post("/api/webhooks/collections-update")
        .json(&json!({"shopId": SHOP, "collectionId": "c1", "productIds": ["p1"]}))
        .await;
    assert_eq!(response.status_code(), StatusCode::NO_CONTENT);

    let after = discount(&server, SHOP, "p1", "1").await;
    assert_eq!(after["cached"], false);
    assert_eq!(after["discount"], 0.15);

    let response = server
        .post("/api/webhooks/products-update")
        .json(&json!({"shopId": SHOP, "productId": "p1", "collectionIds": []}))
        .await;
    assert_eq!(response.status_code(), StatusCode::NO_CONTENT);
    assert_eq!(discount(&server, SHOP, "p1", "1").await["discount"], 0.0);
}

#[tokio::test]
async fn test_webhook_requires_shop() {
    let server = create_test_app();

    let response = server
        .post("/api/webhooks/app-uninstalled")
        .json(&json!({"shopId": ""}))
        .await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(response.json::<Value>()["errorCode"], "INVALID_ARGUMENT");
}

#[tokio::test]
async fn test_app_uninstalled_purges_shop() {
    let server = create_test_app();
    create_rule(&server, percentage_rule(SHOP, json!([{"quantity": 1, "discount": 10}]))).await;
    create_rule(&server, percentage_rule(OTHER_SHOP, json!([{"quantity": 1, "discount": 10}]))).await;
    discount(&server, SHOP, "p1", "1").await;

    let response = server
        .post("/api/webhooks/app-uninstalled")
        .json(&json!({"shopId": SHOP}))
        .await;
    assert_eq!(response.status_code(), StatusCode::NO_CONTENT);

    let rules = server
        .get("/api/rules")
        .add_query_param("shopId", SHOP)
        .await
        .json::<Vec<Value>>();
    assert!(rules.is_empty());
    assert_eq!(discount(&server, SHOP, "p1", "1").await["discount"], 0.0);

    let other_rules = server
        .get("/api/rules")
        .add_query_param("shopId", OTHER_SHOP)
        .await
        .json::<Vec<Value>>();
    assert_eq!(other_rules.len(), 1);
}

// ============================================================================
// Operational endpoints
// ============================================================================

#[tokio::test]
async fn test_metrics_and_health() {
    let server = create_test_app();
    create_rule(&server, percentage_rule(SHOP, json!([{"quantity": 1, "discount": 10}]))).await;
    discount(&server, SHOP, "p1", "1").await;
    discount(&server, SHOP, "p1", "1").await;

    let metrics = server.get("/api/metrics").await.json::<Value>();
    assert_eq!(metrics["cacheHits"], 1);
    assert_eq!(metrics["cacheMisses"], 1);
    assert_eq!(metrics["calculations"], 2);
    assert_eq!(metrics["invalidations"], 1);

    let health = server.get("/health").await;
    assert_eq!(health.status_code(), StatusCode::OK);
    assert_eq!(health.json::<Value>()["status"], "ok");
}

#[tokio::test]
async fn test_openapi_document_is_served() {
    let server = create_test_app();

    let doc = server.get("/api-docs/openapi.json").await.json::<Value>();

    assert!(doc["paths"].get("/api/discount").is_some());
    assert!(doc["paths"].get("/api/rules/{id}").is_some());
}
