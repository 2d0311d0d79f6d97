//! REST API server for the wealth query router
//!
//! Exposes the query pipeline, client lookups, query history and dashboard
//! metrics over HTTP for the portfolio frontend.

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::dashboard;
use crate::error::QueryError;
use crate::history::HistoryStore;
use crate::models::{ClientRecord, GraphPoint, QueryResult, RiskAppetite, TableRow};
use crate::pipeline::QueryPipeline;
use crate::sources::{ClientRegistry, TransactionLedger};

/// =============================
/// Request / Response Models
/// =============================

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    #[serde(default)]
    pub question: String,
}

/// Wire shape of a `QueryResult` as the frontend consumes it
#[derive(Debug, Serialize, Deserialize)]
pub struct QueryResponse {
    pub response: String,
    pub graph_data: Vec<GraphPoint>,
    pub table_data: Vec<TableRow>,
}

impl From<QueryResult> for QueryResponse {
    fn from(result: QueryResult) -> Self {
        Self {
            response: result.text,
            graph_data: result.graph,
            table_data: result.table,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct DateRange {
    pub start: String,
    pub end: String,
}

/// =============================
/// API State
/// =============================

#[derive(Clone)]
pub struct ApiState {
    pub pipeline: Arc<QueryPipeline>,
    pub registry: Arc<dyn ClientRegistry>,
    pub ledger: Arc<dyn TransactionLedger>,
    pub history: Arc<HistoryStore>,
}

fn status_for(error: &QueryError) -> StatusCode {
    match error {
        QueryError::HistoryNotFound(_) => StatusCode::NOT_FOUND,
        QueryError::InvalidDateRange(_) => StatusCode::BAD_REQUEST,
        QueryError::SourceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(error: QueryError) -> Response {
    warn!("Request failed: {}", error);
    (status_for(&error), Json(json!({ "detail": error.to_string() }))).into_response()
}

fn clients_response(result: crate::Result<Vec<ClientRecord>>) -> Response {
    match result {
        Ok(clients) => Json(json!({ "clients": clients })).into_response(),
        Err(e) => error_response(e),
    }
}

/// =============================
/// Health Endpoints
/// =============================

async fn root() -> Json<serde_json::Value> {
    Json(json!({ "message": "Wealth portfolio query service is running" }))
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// =============================
/// Query Endpoint
/// =============================

async fn handle_query(State(state): State<ApiState>, Json(req): Json<QueryRequest>) -> Response {
    let question = req.question.trim();
    if question.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "No question provided" })),
        )
            .into_response();
    }

    info!("Received question: {}", question);

    let result = state.pipeline.run_query(question).await;

    if let Err(error) = state.history.record(question).await {
        warn!("Query history write failed, answer still returned: {}", error);
    }

    Json(QueryResponse::from(result)).into_response()
}

/// =============================
/// Client Endpoints
/// =============================

async fn list_clients(State(state): State<ApiState>) -> Response {
    clients_response(state.registry.fetch_clients().await)
}

async fn clients_by_risk(State(state): State<ApiState>, Path(level): Path<String>) -> Response {
    match RiskAppetite::parse(&level) {
        Some(risk) => clients_response(state.registry.clients_by_risk(risk).await),
        None => Json(json!({ "clients": [] })).into_response(),
    }
}

async fn clients_by_preference(
    State(state): State<ApiState>,
    Path(preference): Path<String>,
) -> Response {
    clients_response(state.registry.clients_by_preference(&preference).await)
}

/// =============================
/// History Endpoints
/// =============================

async fn recent_queries(State(state): State<ApiState>) -> Response {
    match state.history.list().await {
        Ok(queries) => Json(json!({ "queries": queries })).into_response(),
        Err(e) => error_response(e),
    }
}

async fn delete_recent_query(State(state): State<ApiState>, Path(index): Path<usize>) -> Response {
    match state.history.delete(index).await {
        Ok(deleted) => Json(json!({ "message": "Deleted", "deleted": deleted })).into_response(),
        Err(e) => error_response(e),
    }
}

async fn clear_recent_queries(State(state): State<ApiState>) -> Response {
    match state.history.clear().await {
        Ok(count) => Json(json!({ "message": format!("Deleted {} queries", count) })).into_response(),
        Err(e) => error_response(e),
    }
}

async fn export_recent_queries(State(state): State<ApiState>) -> Response {
    match state.history.export_csv().await {
        Ok(csv) => (
            [
                (header::CONTENT_TYPE, "text/csv"),
                (
                    header::CONTENT_DISPOSITION,
                    "attachment; filename=recent_queries.csv",
                ),
            ],
            csv,
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

async fn filter_recent_queries(
    State(state): State<ApiState>,
    Query(range): Query<DateRange>,
) -> Response {
    match state.history.filter(&range.start, &range.end).await {
        Ok(queries) => Json(json!({ "queries": queries })).into_response(),
        Err(e) => error_response(e),
    }
}

/// =============================
/// Dashboard Endpoint
/// =============================

async fn dashboard_metrics(State(state): State<ApiState>) -> Response {
    match dashboard::load_metrics(state.ledger.as_ref()).await {
        Ok(metrics) => Json(metrics).into_response(),
        Err(e) => error_response(e),
    }
}

/// =============================
/// Router
/// =============================

pub fn create_router(state: ApiState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/query", post(handle_query))
        .route("/clients", get(list_clients))
        .route("/clients/risk/:level", get(clients_by_risk))
        .route("/clients/preference/:preference", get(clients_by_preference))
        .route("/recent-queries", get(recent_queries))
        .route("/recent-queries/clear", delete(clear_recent_queries))
        .route("/recent-queries/export", get(export_recent_queries))
        .route("/recent-queries/filter", get(filter_recent_queries))
        .route("/recent-queries/:index", delete(delete_recent_query))
        .route("/dashboard-metrics", get(dashboard_metrics))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// =============================
/// Server Startup
/// =============================

pub async fn start_server(
    state: ApiState,
    port: u16,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!("API Server listening on http://0.0.0.0:{}", port);
    info!("Local: http://127.0.0.1:{}", port);

    axum::serve(listener, router).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fallback::FallbackAdapter;
    use crate::models::TransactionRecord;
    use crate::oracle::ScriptedOracle;
    use crate::sources::{demo_clients, InMemoryClientRegistry, InMemoryTransactionLedger};
    use axum::body::Body;
    use axum::http::Request;
    use std::time::Duration;
    use tower::ServiceExt;

    fn test_state() -> ApiState {
        let registry: Arc<dyn ClientRegistry> = Arc::new(InMemoryClientRegistry::new(demo_clients()));
        let ledger: Arc<dyn TransactionLedger> =
            Arc::new(InMemoryTransactionLedger::new(vec![TransactionRecord {
                client_name: "Virat Kohli".to_string(),
                stock_name: "Infosys".to_string(),
                value: json!(23000000),
                transaction_date: Some("2024-04-01".to_string()),
                relationship_manager: "Neha Shah".to_string(),
            }]));
        let fallback = FallbackAdapter::new(
            Arc::new(ScriptedOracle::replying("No structured answer.")),
            Duration::from_secs(5),
        );

        ApiState {
            pipeline: Arc::new(QueryPipeline::new(registry.clone(), ledger.clone(), fallback)),
            registry,
            ledger,
            history: Arc::new(HistoryStore::in_memory()),
        }
    }

    async fn send(router: Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
        let response = router.oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, body.to_vec())
    }

    fn post_question(question: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/query")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json!({ "question": question }).to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_query_returns_wire_shape() {
        let router = create_router(test_state());

        let (status, body) = send(router, post_question("top 5 portfolios")).await;
        assert_eq!(status, StatusCode::OK);

        let response: QueryResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(response.graph_data.len(), 5);
        assert_eq!(response.table_data[0].client, "Virat Kohli");
    }

    #[tokio::test]
    async fn test_empty_question_rejected() {
        let router = create_router(test_state());

        let (status, body) = send(router, post_question("   ")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["error"], "No question provided");
    }

    #[tokio::test]
    async fn test_generic_answer_has_empty_lists() {
        let router = create_router(test_state());

        let (_, body) = send(router, post_question("who is the most cautious client?")).await;
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["response"], "No structured answer.");
        assert_eq!(value["graph_data"], json!([]));
        assert_eq!(value["table_data"], json!([]));
    }

    #[tokio::test]
    async fn test_history_round_trip() {
        let state = test_state();
        let router = create_router(state.clone());

        send(router.clone(), post_question("top 5 portfolios")).await;
        send(router.clone(), post_question("total investments per client")).await;

        let (_, body) = send(router.clone(), get("/recent-queries")).await;
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["queries"][0]["text"], "total investments per client");

        let delete_first = Request::builder()
            .method("DELETE")
            .uri("/recent-queries/0")
            .body(Body::empty())
            .unwrap();
        let (status, _) = send(router.clone(), delete_first).await;
        assert_eq!(status, StatusCode::OK);

        let clear = Request::builder()
            .method("DELETE")
            .uri("/recent-queries/clear")
            .body(Body::empty())
            .unwrap();
        let (_, body) = send(router.clone(), clear).await;
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["message"], "Deleted 1 queries");
    }

    #[tokio::test]
    async fn test_delete_missing_entry_is_404() {
        let router = create_router(test_state());
        let request = Request::builder()
            .method("DELETE")
            .uri("/recent-queries/7")
            .body(Body::empty())
            .unwrap();

        let (status, _) = send(router, request).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_export_is_csv_attachment() {
        let router = create_router(test_state());
        send(router.clone(), post_question("top 5 portfolios")).await;

        let response = router.oneshot(get("/recent-queries/export")).await.unwrap();
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/csv");
        assert!(response.headers()[header::CONTENT_DISPOSITION]
            .to_str()
            .unwrap()
            .contains("recent_queries.csv"));
    }

    #[tokio::test]
    async fn test_filter_with_bad_dates() {
        let router = create_router(test_state());
        let (status, _) = send(router, get("/recent-queries/filter?start=yesterday&end=today")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_clients_by_risk() {
        let router = create_router(test_state());

        let (_, body) = send(router.clone(), get("/clients/risk/low")).await;
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["clients"].as_array().unwrap().len(), 2);

        let (_, body) = send(router, get("/clients/risk/reckless")).await;
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["clients"], json!([]));
    }

    #[tokio::test]
    async fn test_dashboard_metrics() {
        let router = create_router(test_state());

        let (status, body) = send(router, get("/dashboard-metrics")).await;
        assert_eq!(status, StatusCode::OK);
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["total_aum"], "₹23,000,000");
        assert_eq!(value["high_risk"], 1);
    }
}
