mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use tower::ServiceExt;

use yieldrouter::api::router::create_router;

use common::{build_context, build_state, scenario_a, HOLDER};

fn build_test_app(api_token: Option<&str>) -> axum::Router {
    let (reader, catalog) = scenario_a();
    create_router(build_state(build_context(reader, catalog), api_token))
}

async fn send(app: axum::Router, req: Request<Body>) -> (StatusCode, Value) {
    let resp = app.oneshot(req).await.unwrap();
    let status = resp.status();
    let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, json)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn decimal(value: &Value) -> Decimal {
    match value {
        Value::String(s) => s.parse().unwrap(),
        other => other.to_string().parse().unwrap(),
    }
}

#[tokio::test]
async fn test_health_check() {
    let (status, json) = send(build_test_app(None), get("/health")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["chains"], 7);
}

#[tokio::test]
async fn test_list_chains() {
    let (status, json) = send(build_test_app(None), get("/api/chains")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    assert_eq!(json["data"].as_array().unwrap().len(), 7);
}

#[tokio::test]
async fn test_positions_for_holder() {
    let uri = format!("/api/positions/{HOLDER}?refresh=true");
    let (status, json) = send(build_test_app(None), get(&uri)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["assets"].as_array().unwrap().len(), 1);
    assert_eq!(decimal(&json["data"]["total_value"]), Decimal::from(1_000));
    assert!(json["data"]["failed_chains"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_opportunities_filter_by_chain() {
    let (status, json) = send(build_test_app(None), get("/api/opportunities?chain=arbitrum")).await;
    assert_eq!(status, StatusCode::OK);
    let data = json["data"].as_array().unwrap();
    assert_eq!(data.len(), 1);
    assert_eq!(data[0]["id"], "arb-usdc");

    let (status, json) = send(build_test_app(None), get("/api/opportunities?chain=solana")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["success"], false);
}

#[tokio::test]
async fn test_opportunity_history() {
    let app = build_test_app(None);
    let (status, _) = send(app.clone(), get("/api/opportunities")).await;
    assert_eq!(status, StatusCode::OK);

    let (status, json) = send(app.clone(), get("/api/opportunities/eth-usdc/history")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"].as_array().unwrap().len(), 1);

    let (status, _) = send(app, get("/api/opportunities/missing/history")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_risk_assessment() {
    let app = build_test_app(None);

    let (status, json) = send(
        app.clone(),
        post_json("/api/risk/assess", json!({ "opportunity_id": "eth-usdc", "amount": 1000 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let score = json["data"]["overall_score"].as_f64().unwrap();
    assert!((0.0..=10.0).contains(&score));
    assert!(decimal(&json["data"]["value_at_risk"]) <= Decimal::from(1_000));

    let (status, json) = send(
        app.clone(),
        post_json("/api/risk/assess", json!({ "opportunity_id": "eth-usdc", "amount": 0 })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(json["success"], false);

    let (status, _) = send(
        app,
        post_json("/api/risk/assess", json!({ "opportunity_id": "missing", "amount": 10 })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_optimize() {
    let (status, json) = send(
        build_test_app(None),
        post_json("/api/optimize", json!({ "address": HOLDER, "criteria": { "risk_tolerance": "medium" } })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let recs = json["data"]["recommendations"].as_array().unwrap();
    assert_eq!(recs.len(), 2);
    assert_eq!(recs[0]["opportunity"]["id"], "eth-usdc");
}

#[tokio::test]
async fn test_optimize_rejects_invalid_criteria() {
    let (status, json) = send(
        build_test_app(None),
        post_json(
            "/api/optimize",
            json!({ "address": HOLDER, "criteria": { "risk_tolerance": "low", "min_liquidity": -1 } }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(json["error"].as_str().unwrap().contains("min_liquidity"));
}

#[tokio::test]
async fn test_rebalance_plan_and_estimate() {
    let app = build_test_app(None);

    let (status, json) = send(app.clone(), post_json("/api/rebalance/plan", json!({ "address": HOLDER }))).await;
    assert_eq!(status, StatusCode::OK);
    let actions = json["data"]["actions"].clone();
    assert_eq!(actions.as_array().unwrap().len(), 2);

    let (status, json) = send(app, post_json("/api/rebalance/estimate", json!({ "actions": actions }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["unroutable_actions"], 0);
    assert!(decimal(&json["data"]["total_usd"]) > Decimal::ZERO);
}

#[tokio::test]
async fn test_protected_routes_require_token() {
    let (status, _) = send(build_test_app(Some("secret")), get("/api/chains")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let req = Request::builder()
        .uri("/api/chains")
        .header("authorization", "Bearer wrong")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(build_test_app(Some("secret")), req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let req = Request::builder()
        .uri("/api/chains")
        .header("authorization", "Bearer secret")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(build_test_app(Some("secret")), req).await;
    assert_eq!(status, StatusCode::OK);

    // health stays public
    let (status, _) = send(build_test_app(Some("secret")), get("/health")).await;
    assert_eq!(status, StatusCode::OK);
}
