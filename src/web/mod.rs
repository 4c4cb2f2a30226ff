//! HTTP surface for ChatGuard.
//!
//! - `GET  /`                 — employee chat UI
//! - `POST /chat`             — inspect a message and reply or reject
//! - `GET  /admin`            — audit dashboard
//! - `GET  /api/summary`      — aggregated decision statistics
//! - `GET  /api/logs`         — audit records, newest first
//! - `GET  /api/logs/stream`  — real-time SSE decision stream

use std::convert::Infallible;
use std::sync::Arc;

use axum::Router;
use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{Html, IntoResponse, Json, Response};
use axum::routing::{get, post};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;

use crate::audit::{AuditLog, AuditRecord};
use crate::pipeline::{DecisionEvent, InspectionPipeline, Outcome};
use crate::stats;

/// Shared application state for all web handlers.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<InspectionPipeline>,
    /// Same log the pipeline writes to; read by the dashboard APIs.
    pub audit: Arc<AuditLog>,
    /// Sender the pipeline publishes decisions on; SSE clients subscribe here.
    pub event_tx: broadcast::Sender<DecisionEvent>,
}

impl AppState {
    /// Wire a pipeline's audit log and event channel into shared state.
    pub fn new(pipeline: InspectionPipeline, event_tx: broadcast::Sender<DecisionEvent>) -> Self {
        let pipeline = pipeline.with_events(event_tx.clone());
        Self {
            audit: pipeline.audit().clone(),
            pipeline: Arc::new(pipeline),
            event_tx,
        }
    }
}

/// Build the axum router with all endpoints.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/chat", post(post_chat))
        .route("/admin", get(admin_handler))
        .route("/api/summary", get(get_summary))
        .route("/api/logs", get(get_logs))
        .route("/api/logs/stream", get(get_logs_stream))
        .with_state(state)
}

const CHAT_HTML: &str = include_str!("../../assets/chat.html");
const DASHBOARD_HTML: &str = include_str!("../../assets/dashboard.html");

/// `GET /` — serve the embedded chat UI.
async fn index_handler() -> Html<&'static str> {
    Html(CHAT_HTML)
}

/// `GET /admin` — serve the embedded dashboard.
async fn admin_handler() -> Html<&'static str> {
    Html(DASHBOARD_HTML)
}

/// Start the web server on the given address.
pub async fn start(listen_addr: &str, state: Arc<AppState>) -> crate::error::Result<()> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(listen_addr).await?;
    tracing::info!("ChatGuard listening on {}", listen_addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutting down...");
        })
        .await
        .map_err(|e| crate::error::GatewayError::Server(e.to_string()))?;
    Ok(())
}

// ─── Request / Query Types ──────────────────────────────────────────────────

/// Body of `POST /chat`. A missing or null `message` reads as empty.
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: Option<String>,
}

/// Query parameters for `GET /api/logs`.
#[derive(Debug, Deserialize)]
pub struct LogsQuery {
    /// Maximum number of records to return (default: 100).
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    100
}

// ─── Response Types ─────────────────────────────────────────────────────────

/// A single audit record returned by the API.
#[derive(Debug, Serialize)]
pub struct LogEntryResponse {
    pub timestamp: String,
    pub decision: String,
    pub content: String,
    pub reason: Option<String>,
    pub reason_key: Option<String>,
}

impl From<AuditRecord> for LogEntryResponse {
    fn from(r: AuditRecord) -> Self {
        Self {
            timestamp: r.timestamp,
            decision: r.decision.as_str().to_string(),
            content: r.content,
            reason: r.reason,
            reason_key: r.reason_key,
        }
    }
}

/// Summary plus a presentation-ordered ranking.
#[derive(Debug, Serialize)]
pub struct SummaryResponse {
    pub total: usize,
    pub block_count: usize,
    pub allow_count: usize,
    pub ranking: Vec<RankingEntry>,
}

#[derive(Debug, Serialize)]
pub struct RankingEntry {
    pub reason: String,
    pub count: usize,
}

impl From<stats::Summary> for SummaryResponse {
    fn from(s: stats::Summary) -> Self {
        let ranking = s
            .ranked()
            .into_iter()
            .map(|(reason, count)| RankingEntry {
                reason: reason.to_string(),
                count,
            })
            .collect();
        Self {
            total: s.total,
            block_count: s.block_count,
            allow_count: s.allow_count,
            ranking,
        }
    }
}

fn error_json(status: StatusCode, message: String) -> Response {
    (status, Json(serde_json::json!({ "error": message }))).into_response()
}

// ─── Handlers ───────────────────────────────────────────────────────────────

/// `POST /chat` — inspect the message and reply with plain text.
///
/// The body is parsed as JSON regardless of `Content-Type`; the chat UI
/// posts without one. Only a body that is not valid JSON is a bad request.
async fn post_chat(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    let req: ChatRequest = match serde_json::from_slice(&body) {
        Ok(req) => req,
        Err(e) => {
            tracing::debug!("Malformed chat request: {}", e);
            return (StatusCode::BAD_REQUEST, "Bad Request").into_response();
        }
    };

    let message = req.message.unwrap_or_default();
    match state.pipeline.inspect(&message).await {
        Ok(Outcome::Allowed(reply)) => (StatusCode::OK, reply).into_response(),
        Ok(Outcome::Rejected {
            status, message, ..
        }) => {
            let status = StatusCode::from_u16(status).unwrap_or(StatusCode::FORBIDDEN);
            (status, message).into_response()
        }
        Err(e) => {
            tracing::error!("Chat backend failed: {}", e);
            (StatusCode::BAD_GATEWAY, "AI backend unavailable").into_response()
        }
    }
}

/// `GET /api/summary` — aggregated statistics, recomputed from the log.
async fn get_summary(State(state): State<Arc<AppState>>) -> Response {
    match state.audit.read_all() {
        Ok(records) => Json(SummaryResponse::from(stats::summarize(&records))).into_response(),
        Err(e) => error_json(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

/// `GET /api/logs` — recent audit records as JSON, newest first.
async fn get_logs(
    State(state): State<Arc<AppState>>,
    Query(params): Query<LogsQuery>,
) -> Response {
    match state.audit.read_recent(params.limit) {
        Ok(records) => {
            let entries: Vec<LogEntryResponse> =
                records.into_iter().map(LogEntryResponse::from).collect();
            Json(entries).into_response()
        }
        Err(e) => error_json(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

/// `GET /api/logs/stream` — SSE stream of decisions as they happen.
async fn get_logs_stream(
    State(state): State<Arc<AppState>>,
) -> Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>> {
    let rx = state.event_tx.subscribe();
    let stream = BroadcastStream::new(rx).filter_map(|result| match result {
        Ok(event) => {
            let data = serde_json::to_string(&event).unwrap_or_default();
            Some(Ok(Event::default().data(data)))
        }
        Err(_) => None, // lagged receiver, skip
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::responder::MockResponder;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt as _;

    fn test_state() -> (Arc<AppState>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let audit = Arc::new(AuditLog::new(dir.path().join("audit_log.txt")));
        let terms: Vec<String> = crate::config::DEFAULT_FORBIDDEN_TERMS
            .iter()
            .map(|t| t.to_string())
            .collect();
        let pipeline =
            InspectionPipeline::with_default_detectors(&terms, audit, Arc::new(MockResponder));
        let (tx, _rx) = broadcast::channel(16);
        (Arc::new(AppState::new(pipeline, tx)), dir)
    }

    async fn send(app: Router, req: Request<Body>) -> (StatusCode, String) {
        let resp = app.into_service().oneshot(req).await.unwrap();
        let status = resp.status();
        let body = axum::body::to_bytes(resp.into_body(), 1024 * 1024)
            .await
            .unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    fn chat_request(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/chat")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn chat_allows_clean_message() {
        let (state, _dir) = test_state();
        let (status, body) =
            send(router(state), chat_request(r#"{"message":"What is the weather today?"}"#)).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("What is the weather today?"));
    }

    #[tokio::test]
    async fn chat_rejects_forbidden_term() {
        let (state, _dir) = test_state();
        let (status, body) =
            send(router(state), chat_request(r#"{"message":"my password is 1234"}"#)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert!(body.contains("Reason: password"));
    }

    #[tokio::test]
    async fn chat_malformed_body_is_400() {
        let (state, _dir) = test_state();
        let (status, _) = send(router(state.clone()), chat_request("{not json")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, _) = send(router(state.clone()), chat_request("message=hi")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        // Malformed requests never reach the audit log
        assert!(state.audit.read_all().unwrap().is_empty());
    }

    #[tokio::test]
    async fn chat_without_message_is_empty_allow() {
        let (state, _dir) = test_state();
        for body in ["{}", r#"{"text":"hi"}"#, r#"{"message":null}"#] {
            let (status, _) = send(router(state.clone()), chat_request(body)).await;
            assert_eq!(status, StatusCode::OK, "body {body}");
        }

        let records = state.audit.read_all().unwrap();
        assert_eq!(records.len(), 3);
        for record in &records {
            assert_eq!(record.decision, crate::audit::Decision::Allow);
            assert_eq!(record.content, "");
        }
    }

    #[tokio::test]
    async fn chat_get_is_405() {
        let (state, _dir) = test_state();
        let (status, _) = send(router(state), get_request("/chat")).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn index_serves_chat_ui() {
        let (state, _dir) = test_state();
        let (status, body) = send(router(state), get_request("/")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("ChatGuard"));
        assert!(body.contains("/chat"));
    }

    #[tokio::test]
    async fn unknown_path_is_404() {
        let (state, _dir) = test_state();
        let (status, _) = send(router(state), get_request("/favicon.ico")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn admin_serves_dashboard() {
        let (state, _dir) = test_state();
        let (status, body) = send(router(state), get_request("/admin")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("ChatGuard Dashboard"));
        assert!(body.contains("/api/summary"));
        assert!(body.contains("type: 'doughnut'"));
    }

    #[tokio::test]
    async fn summary_reflects_chat_traffic() {
        let (state, _dir) = test_state();
        for msg in ["hello", "password please", "SECRET", "a@b.com"] {
            let body = serde_json::json!({ "message": msg }).to_string();
            send(router(state.clone()), chat_request(&body)).await;
        }

        let (status, body) = send(router(state), get_request("/api/summary")).await;
        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["total"], 4);
        assert_eq!(json["block_count"], 3);
        assert_eq!(json["allow_count"], 1);
        assert_eq!(json["ranking"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn summary_empty_log() {
        let (state, _dir) = test_state();
        let (_, body) = send(router(state), get_request("/api/summary")).await;
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["total"], 0);
        assert!(json["ranking"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn logs_are_newest_first_and_limited() {
        let (state, _dir) = test_state();
        for i in 0..5 {
            state
                .audit
                .append(crate::audit::Decision::Allow, &format!("msg {i}"), None);
        }

        let (_, body) = send(router(state), get_request("/api/logs?limit=2")).await;
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        let logs = json.as_array().unwrap();
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[0]["content"], "msg 4");
        assert_eq!(logs[0]["decision"], "ALLOW");
    }
}
