use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{header, HeaderValue, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use tower::ServiceBuilder;
use tower_http::cors::{AllowHeaders, AllowMethods, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use crate::domain::{Rule, RuleId};
use crate::observability::{MetricsRegistry, Operation};
use crate::storage::Storage;

use super::error::ApiError;
use super::request::RuleInput;
use super::response::{ErrorResponse, HealthResponse, MessageResponse, ReadyResponse};

/// Shared application state.
pub struct AppState {
    /// Storage backend for persistence
    pub storage: Arc<dyn Storage>,

    /// Operation counters
    pub metrics: MetricsRegistry,

    /// Application start time
    pub start_time: Instant,

    /// Application version
    pub version: String,
}

impl AppState {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        AppState {
            storage,
            metrics: MetricsRegistry::new(),
            start_time: Instant::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Build the CORS layer for the given origins.
///
/// Credentials are allowed, so methods and headers are mirrored from the
/// request rather than wildcarded.
pub fn cors_layer(origins: &[String]) -> anyhow::Result<CorsLayer> {
    let origins = origins
        .iter()
        .map(|o| HeaderValue::from_str(o.trim()))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(CorsLayer::new()
        .allow_origin(origins)
        .allow_credentials(true)
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .expose_headers([header::CONTENT_DISPOSITION]))
}

/// Create the application router.
pub fn create_router(state: Arc<AppState>, cors: CorsLayer) -> Router {
    Router::new()
        .route("/api/health", get(handle_health))
        .route("/api/ready", get(handle_ready))
        .route("/api/rules", get(list_rules).post(create_rule))
        .route(
            "/api/rules/:id",
            get(get_rule).put(update_rule).delete(delete_rule),
        )
        .route("/metrics", get(handle_metrics))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

/// List every rule.
async fn list_rules(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Rule>>, ApiError> {
    let result = state.storage.find_all().await.map_err(ApiError::from);
    let rules = state.metrics.track(Operation::List, result)?;

    debug!(count = rules.len(), "Listed rules");
    Ok(Json(rules))
}

/// Create a rule from a validated payload.
async fn create_rule(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<RuleInput>, JsonRejection>,
) -> Result<(StatusCode, Json<Rule>), ApiError> {
    let result = async {
        let Json(input) = payload?;
        let rule = Rule::new(input.validate()?, Utc::now());
        state.storage.create(&rule).await?;
        Ok::<_, ApiError>(rule)
    }
    .await;
    let rule = state.metrics.track(Operation::Create, result)?;

    info!(rule_id = %rule.id, name = %rule.name, "Rule created");
    Ok((StatusCode::CREATED, Json(rule)))
}

/// Fetch a single rule.
async fn get_rule(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Rule>, ApiError> {
    let id = RuleId::new(id);
    let result = match state.storage.find_one(&id).await {
        Ok(Some(rule)) => Ok(rule),
        Ok(None) => Err(ApiError::NotFound),
        Err(e) => Err(ApiError::Store(e)),
    };

    Ok(Json(state.metrics.track(Operation::Get, result)?))
}

/// Replace the mutable fields of a rule.
async fn update_rule(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    payload: Result<Json<RuleInput>, JsonRejection>,
) -> Result<Json<Rule>, ApiError> {
    let id = RuleId::new(id);
    let result = async {
        let Json(input) = payload?;
        let fields = input.validate()?;
        state
            .storage
            .update(&id, &fields, Utc::now())
            .await?
            .ok_or(ApiError::NotFound)
    }
    .await;
    let rule = state.metrics.track(Operation::Update, result)?;

    info!(rule_id = %rule.id, is_active = rule.is_active, "Rule updated");
    Ok(Json(rule))
}

/// Hard-delete a rule.
async fn delete_rule(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    let id = RuleId::new(id);
    let result = match state.storage.delete(&id).await {
        Ok(true) => Ok(()),
        Ok(false) => Err(ApiError::NotFound),
        Err(e) => Err(ApiError::Store(e)),
    };
    state.metrics.track(Operation::Delete, result)?;

    info!(rule_id = %id, "Rule deleted");
    Ok(Json(MessageResponse::new("Rule deleted successfully")))
}

/// Health check endpoint.
async fn handle_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: state.version.clone(),
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}

/// Readiness check endpoint.
async fn handle_ready(State(state): State<Arc<AppState>>) -> axum::response::Response {
    if let Err(e) = state.storage.ping().await {
        warn!(backend = state.storage.backend(), error = %e, "Storage not reachable");
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ErrorResponse::new("Storage not reachable", "NOT_READY")),
        )
            .into_response();
    }

    (
        StatusCode::OK,
        Json(ReadyResponse {
            ready: true,
            storage: state.storage.backend().to_string(),
        }),
    )
        .into_response()
}

/// Metrics endpoint (Prometheus format).
async fn handle_metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let metrics = state
        .metrics
        .to_prometheus(state.start_time.elapsed().as_secs());

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        metrics,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::RuleFields;
    use crate::observability::tracing::init_test_tracing;
    use crate::storage::MemoryStorage;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Method, Request};
    use axum::response::Response;
    use chrono::DateTime;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    /// Storage whose every call fails, for backend-error paths.
    struct FailingStorage;

    #[async_trait]
    impl Storage for FailingStorage {
        fn backend(&self) -> &'static str {
            "failing"
        }

        async fn create(&self, _rule: &Rule) -> anyhow::Result<()> {
            anyhow::bail!("connection refused")
        }

        async fn find_one(&self, _id: &RuleId) -> anyhow::Result<Option<Rule>> {
            anyhow::bail!("connection refused")
        }

        async fn find_all(&self) -> anyhow::Result<Vec<Rule>> {
            anyhow::bail!("connection refused")
        }

        async fn update(
            &self,
            _id: &RuleId,
            _fields: &RuleFields,
            _updated_at: DateTime<Utc>,
        ) -> anyhow::Result<Option<Rule>> {
            anyhow::bail!("connection refused")
        }

        async fn delete(&self, _id: &RuleId) -> anyhow::Result<bool> {
            anyhow::bail!("connection refused")
        }

        async fn ping(&self) -> anyhow::Result<()> {
            anyhow::bail!("connection refused")
        }

        async fn close(&self) {}
    }

    fn test_app_with(storage: Arc<dyn Storage>) -> (Router, Arc<AppState>) {
        init_test_tracing();
        let state = Arc::new(AppState::new(storage));
        let cors = cors_layer(&["http://localhost:5173".to_string()]).unwrap();
        (create_router(state.clone(), cors), state)
    }

    fn test_app() -> Router {
        test_app_with(Arc::new(MemoryStorage::new())).0
    }

    async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(value) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(value.to_string())
            }
            None => Body::empty(),
        };

        app.clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap()
    }

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn test_rule_body(name: &str) -> Value {
        json!({
            "name": name,
            "condition": "amount > 100",
            "action": "flag",
            "is_active": true
        })
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let app = test_app();

        let response = send(&app, Method::GET, "/api/health", None).await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn test_ready_endpoint() {
        let app = test_app();
        let response = send(&app, Method::GET, "/api/ready", None).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["storage"], "memory");

        let (app, _) = test_app_with(Arc::new(FailingStorage));
        let response = send(&app, Method::GET, "/api/ready", None).await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_list_empty() {
        let app = test_app();

        let response = send(&app, Method::GET, "/api/rules", None).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!([]));
    }

    #[tokio::test]
    async fn test_create_then_get() {
        let app = test_app();

        let response = send(
            &app,
            Method::POST,
            "/api/rules",
            Some(test_rule_body("Test Rule")),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);

        let created = body_json(response).await;
        let id = created["id"].as_str().unwrap();
        assert!(!id.is_empty());
        assert_eq!(created["name"], "Test Rule");
        assert_eq!(created["is_active"], true);
        assert_eq!(created["created_at"], created["updated_at"]);

        let response = send(&app, Method::GET, &format!("/api/rules/{id}"), None).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, created);
    }

    #[tokio::test]
    async fn test_list_after_creates() {
        let app = test_app();

        for i in 0..3 {
            let body = test_rule_body(&format!("rule {i}"));
            send(&app, Method::POST, "/api/rules", Some(body)).await;
        }

        let response = send(&app, Method::GET, "/api/rules", None).await;
        let rules = body_json(response).await;
        let rules = rules.as_array().unwrap();

        assert_eq!(rules.len(), 3);
        let mut ids: Vec<&str> = rules.iter().map(|r| r["id"].as_str().unwrap()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 3);
        assert_eq!(rules[0]["name"], "rule 0");
    }

    #[tokio::test]
    async fn test_create_validation_errors() {
        let (app, state) = test_app_with(Arc::new(MemoryStorage::new()));

        // Legacy list-shaped payload without the singular action field
        let legacy = json!({
            "name": "Test Rule",
            "condition": "amount > 100",
            "actions": ["flag", "require_approval"],
            "is_active": true
        });
        let response = send(&app, Method::POST, "/api/rules", Some(legacy)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["code"], "BAD_REQUEST");

        let blank = json!({"name": "", "condition": "a", "action": "b"});
        let response = send(&app, Method::POST, "/api/rules", Some(blank)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = send(&app, Method::GET, "/api/rules", None).await;
        assert_eq!(body_json(response).await, json!([]));
        assert_eq!(
            state
                .metrics
                .validation_errors
                .load(std::sync::atomic::Ordering::Relaxed),
            2
        );
    }

    #[tokio::test]
    async fn test_get_unknown_id() {
        let app = test_app();

        let response = send(&app, Method::GET, "/api/rules/nope", None).await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await["error"], "Rule not found");
    }

    #[tokio::test]
    async fn test_update_replaces_fields() {
        let app = test_app();

        let mut body = test_rule_body("Test Update Rule");
        body["description"] = json!("to be cleared");
        let created = body_json(send(&app, Method::POST, "/api/rules", Some(body)).await).await;
        let id = created["id"].as_str().unwrap();

        let update = json!({
            "name": "Updated",
            "condition": "amount > 500",
            "action": "reject",
            "is_active": false
        });
        let response = send(&app, Method::PUT, &format!("/api/rules/{id}"), Some(update)).await;
        assert_eq!(response.status(), StatusCode::OK);

        let updated = body_json(response).await;
        assert_eq!(updated["id"], created["id"]);
        assert_eq!(updated["name"], "Updated");
        assert_eq!(updated["action"], "reject");
        assert_eq!(updated["is_active"], false);
        assert!(updated["description"].is_null());
        assert_eq!(updated["created_at"], created["created_at"]);

        let before: DateTime<Utc> = created["updated_at"].as_str().unwrap().parse().unwrap();
        let after: DateTime<Utc> = updated["updated_at"].as_str().unwrap().parse().unwrap();
        assert!(after >= before);
    }

    #[tokio::test]
    async fn test_update_errors() {
        let app = test_app();

        let response = send(
            &app,
            Method::PUT,
            "/api/rules/missing",
            Some(test_rule_body("x")),
        )
        .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let created =
            body_json(send(&app, Method::POST, "/api/rules", Some(test_rule_body("r"))).await)
                .await;
        let id = created["id"].as_str().unwrap();

        // Partial payloads are rejected; update is a full replacement
        let partial = json!({"name": "Updated", "is_active": false});
        let response = send(&app, Method::PUT, &format!("/api/rules/{id}"), Some(partial)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_delete_lifecycle() {
        let app = test_app();

        let created =
            body_json(send(&app, Method::POST, "/api/rules", Some(test_rule_body("r"))).await)
                .await;
        let uri = format!("/api/rules/{}", created["id"].as_str().unwrap());

        let response = send(&app, Method::DELETE, &uri, None).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await["message"],
            "Rule deleted successfully"
        );

        let response = send(&app, Method::GET, &uri, None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = send(&app, Method::DELETE, &uri, None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_store_failures_are_server_errors() {
        let (app, state) = test_app_with(Arc::new(FailingStorage));

        let response = send(&app, Method::DELETE, "/api/rules/any", None).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_json(response).await["code"], "INTERNAL_ERROR");

        let response = send(&app, Method::GET, "/api/rules", None).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let response = send(&app, Method::GET, "/api/rules/any", None).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let response = send(
            &app,
            Method::POST,
            "/api/rules",
            Some(test_rule_body("valid")),
        )
        .await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_json(response).await["code"], "INTERNAL_ERROR");

        let response = send(
            &app,
            Method::PUT,
            "/api/rules/any",
            Some(test_rule_body("valid")),
        )
        .await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_json(response).await["code"], "INTERNAL_ERROR");

        let metrics = &state.metrics;
        assert_eq!(
            metrics.store_errors.load(std::sync::atomic::Ordering::Relaxed),
            5
        );
        assert_eq!(
            metrics
                .validation_errors
                .load(std::sync::atomic::Ordering::Relaxed),
            0
        );
        assert_eq!(
            metrics
                .not_found_errors
                .load(std::sync::atomic::Ordering::Relaxed),
            0
        );
    }

    #[tokio::test]
    async fn test_cors_preflight() {
        let app = test_app();

        let request = Request::builder()
            .method(Method::OPTIONS)
            .uri("/api/rules")
            .header(header::ORIGIN, "http://localhost:5173")
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "http://localhost:5173"
        );
        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_CREDENTIALS],
            "true"
        );
    }

    #[test]
    fn test_cors_layer_rejects_bad_origin() {
        assert!(cors_layer(&["bad\norigin".to_string()]).is_err());
    }

    #[tokio::test]
    async fn test_metrics_endpoint() {
        let app = test_app();
        send(&app, Method::GET, "/api/rules", None).await;

        let response = send(&app, Method::GET, "/metrics", None).await;
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let text = String::from_utf8_lossy(&bytes);
        assert!(text.contains("expense_rules_operations_total{op=\"list\"} 1"));
    }
}
