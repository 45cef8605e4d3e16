//! HTTP chat server.
//!
//! Serves the chat engine to a browser or other UI. The UI owns session
//! history and sends it with every question.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version) |
//! | `GET`  | `/stats` | Index name and vector count |
//! | `POST` | `/chat` | Streamed answer as Server-Sent Events |
//!
//! # `/chat` events
//!
//! ```text
//! event: profile   data: {"code":"ur","display_name":"Urdu","rtl":true}
//! event: fragment  data: {"text":"..."}        (repeated)
//! event: done      data: {}
//! event: error     data: {"code":"stream_interrupted","message":"..."}
//! ```
//!
//! Exactly one of `done` or `error` ends the stream. Closing the connection
//! cancels the model call.
//!
//! # Error Contract
//!
//! Failures before streaming starts return a JSON body:
//!
//! ```json
//! { "error": { "code": "invalid_input", "message": "invalid input: question is empty" } }
//! ```
//!
//! Status codes: 400 for `invalid_input`, 502 for connection and service
//! failures, 504 for `timed_out`, 500 otherwise.

use std::convert::Infallible;
use std::sync::Arc;

use anyhow::Context;
use axum::{
    extract::State,
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};

use mishkat_core::models::ChatTurn;
use mishkat_core::RagError;

use crate::chat::{build_engine, ChatEngine};
use crate::config::Config;

#[derive(Clone)]
struct AppState {
    engine: Arc<ChatEngine>,
}

/// Bind to `[server].bind` and serve until the process exits.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let engine = Arc::new(build_engine(config).await?);
    let listener = tokio::net::TcpListener::bind(&config.server.bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.bind))?;

    tracing::info!(bind = %config.server.bind, index = engine.index().name(), "server listening");
    println!("Mishkat server listening on http://{}", config.server.bind);

    axum::serve(listener, router(engine)).await?;
    Ok(())
}

/// Build the router around an existing engine.
pub fn router(engine: Arc<ChatEngine>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/stats", get(handle_stats))
        .route("/chat", post(handle_chat))
        .layer(cors)
        .with_state(AppState { engine })
}

async fn handle_health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

#[derive(Serialize)]
struct StatsResponse {
    index: String,
    total_vector_count: u64,
    dimension: Option<usize>,
}

async fn handle_stats(State(state): State<AppState>) -> Result<Json<StatsResponse>, AppError> {
    let index = state.engine.index();
    let stats = index.stats().await?;
    Ok(Json(StatsResponse {
        index: index.name().to_string(),
        total_vector_count: stats.total_vector_count,
        dimension: stats.dimension,
    }))
}

#[derive(Deserialize)]
struct ChatRequest {
    question: String,
    #[serde(default)]
    history: Vec<ChatTurn>,
}

async fn handle_chat(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let mut response = state.engine.get_response(&req.question, &req.history).await?;
    let profile = response.profile();

    let events = async_stream::stream! {
        yield Ok(json_event("profile", &json!({
            "code": profile.code(),
            "display_name": profile.display_name(),
            "rtl": profile.is_rtl(),
        })));
        while let Some(item) = response.next().await {
            match item {
                Ok(text) => yield Ok(json_event("fragment", &json!({ "text": text }))),
                Err(e) => {
                    tracing::warn!(error = %e, "chat stream failed");
                    yield Ok(json_event("error", &error_body(&e)));
                    return;
                }
            }
        }
        yield Ok(json_event("done", &json!({})));
    };

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

fn json_event(name: &str, data: &Value) -> Event {
    Event::default().event(name).data(data.to_string())
}

fn error_body(e: &RagError) -> Value {
    json!({ "code": e.kind(), "message": e.to_string() })
}

/// A [`RagError`] rendered as an HTTP error response.
struct AppError(RagError);

impl From<RagError> for AppError {
    fn from(e: RagError) -> Self {
        AppError(e)
    }
}

fn status_for(e: &RagError) -> StatusCode {
    match e {
        RagError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        RagError::ConnectionFailed { .. }
        | RagError::Service { .. }
        | RagError::DimensionMismatch { .. } => StatusCode::BAD_GATEWAY,
        RagError::TimedOut { .. } => StatusCode::GATEWAY_TIMEOUT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        }
        (status, Json(json!({ "error": error_body(&self.0) }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn status_mapping() {
        assert_eq!(
            status_for(&RagError::InvalidInput("x".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(&RagError::connection("llm", "refused")),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            status_for(&RagError::service("llm", Some(500), "boom")),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            status_for(&RagError::TimedOut {
                service: "llm",
                after: Duration::from_secs(1)
            }),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            status_for(&RagError::StreamInterrupted("eof".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn error_body_uses_kind_code() {
        let body = error_body(&RagError::InvalidInput("question is empty".into()));
        assert_eq!(body["code"], "invalid_input");
        assert!(body["message"]
            .as_str()
            .unwrap()
            .contains("question is empty"));
    }
}
