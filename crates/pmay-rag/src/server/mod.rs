//! HTTP server for the chat backend

pub mod routes;
pub mod state;

use axum::{extract::State, http::StatusCode, routing::get, Router};
use std::net::SocketAddr;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::config::RagConfig;
use crate::error::{Error, Result};
use state::AppState;

/// Chat HTTP server
pub struct RagServer {
    config: RagConfig,
    state: AppState,
}

impl RagServer {
    /// Create a new server, initializing all collaborators
    pub async fn new(config: RagConfig) -> Result<Self> {
        let state = AppState::new(config.clone()).await?;
        Ok(Self { config, state })
    }

    /// Create from an existing state
    pub fn with_state(state: AppState) -> Self {
        Self {
            config: state.config().clone(),
            state,
        }
    }

    /// Build the router with all routes
    pub fn router(&self) -> Router {
        build_router(self.state.clone())
    }

    /// Start the server
    pub async fn start(self) -> Result<()> {
        let addr: SocketAddr = self
            .address()
            .parse()
            .map_err(|e| Error::Config(format!("Invalid address: {}", e)))?;

        let router = self.router();

        tracing::info!("Starting chat server on http://{}", addr);

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| Error::Config(format!("Failed to bind: {}", e)))?;

        axum::serve(listener, router)
            .await
            .map_err(|e| Error::Internal(format!("Server error: {}", e)))?;

        Ok(())
    }

    /// Get the server address
    pub fn address(&self) -> String {
        format!("{}:{}", self.config.server.host, self.config.server.port)
    }
}

/// Router over `state`; SSE responses are left uncompressed so fragments flush immediately
pub fn build_router(state: AppState) -> Router {
    let enable_cors = state.config().server.enable_cors;
    let max_upload_size = state.config().server.max_upload_size;

    let router = Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness))
        .merge(routes::api_routes(max_upload_size))
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    if enable_cors {
        router.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
    } else {
        router
    }
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}

/// Readiness check endpoint
async fn readiness(State(state): State<AppState>) -> StatusCode {
    if state.is_ready() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingestion::parser::tests::sample_pdf;
    use crate::testing::{fixture_pipeline, ScriptedLlm};
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request};
    use tower::ServiceExt;

    const BOUNDARY: &str = "pmay-test-boundary";

    fn test_app(dir: &tempfile::TempDir, llm: ScriptedLlm) -> (Router, AppState) {
        let (pipeline, _) = fixture_pipeline(dir, llm);
        let state = AppState::from_parts(RagConfig::default(), pipeline);
        state.set_ready(true);
        (build_router(state.clone()), state)
    }

    fn chat_request(body: &str) -> Request<Body> {
        Request::post("/chat")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn upload_request(filename: &str, data: &[u8]) -> Request<Body> {
        let mut body = format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
        )
        .into_bytes();
        body.extend_from_slice(data);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

        Request::post("/upload")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    async fn body_text(response: axum::response::Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn sse_events(body: &str) -> Vec<serde_json::Value> {
        body.lines()
            .filter_map(|line| line.strip_prefix("data: "))
            .map(|data| serde_json::from_str(data).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_health_and_ready() {
        let dir = tempfile::tempdir().unwrap();
        let (app, state) = test_app(&dir, ScriptedLlm::fragments(&[]));

        let response = app
            .clone()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "OK");

        state.set_ready(false);
        let response = app
            .oneshot(Request::get("/ready").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_chat_rejects_malformed_bodies() {
        let dir = tempfile::tempdir().unwrap();
        let (app, _) = test_app(&dir, ScriptedLlm::fragments(&[]));

        let status = |body: &'static str| {
            let app = app.clone();
            async move { app.oneshot(chat_request(body)).await.unwrap().status() }
        };

        assert_eq!(status("{not json").await, StatusCode::BAD_REQUEST);
        assert_eq!(status(r#"{"question": "hi"}"#).await, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(status(r#"{"message": "   "}"#).await, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_chat_greeting_is_single_event() {
        let dir = tempfile::tempdir().unwrap();
        let (app, _) = test_app(&dir, ScriptedLlm::fragments(&["unused"]));

        let response = app.oneshot(chat_request(r#"{"message": "hi"}"#)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers()[header::CONTENT_TYPE]
            .to_str()
            .unwrap()
            .starts_with("text/event-stream"));

        let events = sse_events(&body_text(response).await);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0]["type"], "text");
        assert!(events[0]["content"].as_str().unwrap().contains("PMAY MoHUA chatbot"));
    }

    #[tokio::test]
    async fn test_upload_then_chat_with_sources() {
        let dir = tempfile::tempdir().unwrap();
        let (app, _) = test_app(&dir, ScriptedLlm::fragments(&["Apply ", "online."]));

        let pdf = sample_pdf(&["Apply online through the PMAY portal", "Keep Aadhaar ready"]);
        let response = app.clone().oneshot(upload_request("guide.pdf", &pdf)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let uploaded: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(uploaded["message"], "Successfully processed guide.pdf");
        assert!(uploaded["chunks_added"].as_u64().unwrap() >= 1);

        let response = app
            .oneshot(chat_request(r#"{"message": "How do I apply online?"}"#))
            .await
            .unwrap();
        let events = sse_events(&body_text(response).await);

        let (last, texts) = events.split_last().unwrap();
        assert!(texts.iter().all(|e| e["type"] == "text"));
        assert_eq!(last["type"], "sources");
        let sources = last["sources"].as_array().unwrap();
        assert!(!sources.is_empty() && sources.len() <= 3);
        let score = sources[0]["score"].as_f64().unwrap();
        assert!(score > 0.0 && score < 1.0);
        assert_eq!(sources[0]["metadata"]["source"], "guide.pdf");
    }

    #[tokio::test]
    async fn test_upload_rejects_non_pdf_and_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let (app, _) = test_app(&dir, ScriptedLlm::fragments(&[]));

        let response = app.clone().oneshot(upload_request("notes.txt", b"hello")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(body["error"]["message"], "Invalid or empty document");

        let empty = Request::post("/upload")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(format!("--{BOUNDARY}--\r\n")))
            .unwrap();
        let response = app.oneshot(empty).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
