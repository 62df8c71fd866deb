//! HTTP handlers

use std::convert::Infallible;

use axum::Json;
use axum::body::Body;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use futures_util::StreamExt;
use goplay::{
    ConfigError, ExecutionRequest, FormatError, Mode, Orchestrator, OrchestratorError,
    format_source,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tracing::{debug, warn};

pub const BAD_REQUEST_MESSAGE: &str = "bad request";
pub const BUILD_ERROR_MESSAGE: &str = "build failed";

/// Shared handler state
#[derive(Debug, Clone)]
pub struct AppState {
    pub orchestrator: Orchestrator,
}

impl AppState {
    pub fn new(orchestrator: Orchestrator) -> Self {
        Self { orchestrator }
    }
}

/// Errors returned as JSON `{error, message}`
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("unknown version '{0}'")]
    UnknownVersion(String),

    #[error("{0}")]
    Build(String),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) | ApiError::UnknownVersion(_) | ApiError::Build(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> &'static str {
        match self {
            ApiError::Build(_) => BUILD_ERROR_MESSAGE,
            ApiError::Internal(_) => "internal error",
            _ => BAD_REQUEST_MESSAGE,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({ "error": self.to_string(), "message": self.message() });
        (self.status(), Json(body)).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<ConfigError> for ApiError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::VariantNotFound(id) => ApiError::UnknownVersion(id),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<OrchestratorError> for ApiError {
    fn from(err: OrchestratorError) -> Self {
        match err {
            OrchestratorError::Config(e) => e.into(),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ExecuteBody {
    pub code: String,

    #[serde(default)]
    pub version: String,

    /// Overrides the mode guessed from the source
    #[serde(default)]
    pub mode: Option<Mode>,
}

#[derive(Debug, Deserialize)]
pub struct FormatBody {
    pub code: String,

    #[serde(default)]
    pub version: String,
}

#[derive(Debug, Serialize)]
pub struct FormatResponse {
    pub formatted: String,
}

/// POST /execute
///
/// Streams `text/event-stream` frames until the terminal event.
pub async fn execute(
    State(state): State<AppState>,
    payload: Result<Json<ExecuteBody>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(body) = payload?;

    let mut request = ExecutionRequest::new(body.code, body.version);
    if let Some(mode) = body.mode {
        request = request.with_mode(mode);
    }
    debug!(mode = %request.mode(), variant = request.variant(), "execute request");

    let events = state.orchestrator.execute(request)?;
    let frames = events.map(|event| Ok::<_, Infallible>(event.to_frame()));

    Ok((
        [
            (header::CONTENT_TYPE, "text/event-stream"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        Body::from_stream(frames),
    )
        .into_response())
}

/// POST /format
pub async fn format(
    State(state): State<AppState>,
    payload: Result<Json<FormatBody>, JsonRejection>,
) -> Result<Json<FormatResponse>, ApiError> {
    let Json(body) = payload?;

    let config = state.orchestrator.config();
    let id = config.resolve_variant(&body.version)?;
    let variant = config.get_variant(id)?;

    match format_source(variant, &body.code, config.limits.wall_time()).await {
        Ok(formatted) => Ok(Json(FormatResponse { formatted })),
        Err(FormatError::Syntax(message)) => Err(ApiError::Build(message)),
        Err(e) => {
            warn!(error = %e, "formatting failed");
            Err(ApiError::Internal(e.to_string()))
        }
    }
}

/// GET /status
pub async fn status() -> Json<serde_json::Value> {
    Json(json!({ "message": "pong" }))
}
