use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, error, info, info_span, warn};
use uuid::Uuid;

use super::message::{CreateMessageRequest, CreateMessageResponse, ErrorResponse, HealthResponse};
use crate::persistence::{Record, Statistics};
use crate::relay::{MessageService, SubmitError};
use crate::utils::{Error, ErrorKind};
use crate::validation::{MessageValidator, ValidationError};

/// Shared state for request handlers.
#[derive(Clone)]
pub struct AppState {
    pub service: MessageService,
    pub validator: MessageValidator,
}

/// An error response: status code plus `{"error": message}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    fn from_kind(kind: ErrorKind) -> Self {
        match kind {
            ErrorKind::InvalidInput => Self::new(StatusCode::BAD_REQUEST, "Invalid input"),
            ErrorKind::DuplicateEntry => Self::new(StatusCode::BAD_REQUEST, "Duplicate entry"),
            ErrorKind::NotFound => Self::new(StatusCode::NOT_FOUND, "Message not found"),
            ErrorKind::Unavailable => Self::new(
                StatusCode::SERVICE_UNAVAILABLE,
                "Service temporarily unavailable",
            ),
            ErrorKind::Cancelled | ErrorKind::Unknown => {
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        }
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        match err.kind() {
            ErrorKind::InvalidInput | ErrorKind::DuplicateEntry | ErrorKind::NotFound => {
                warn!(op = err.op(), error = %err, "Request failed");
            }
            _ => error!(op = err.op(), error = %err, "Request failed"),
        }
        Self::from_kind(err.kind())
    }
}

impl From<SubmitError> for ApiError {
    fn from(err: SubmitError) -> Self {
        match err {
            SubmitError::Rejected(err) => err.into(),
            SubmitError::NotQueued { id, source } => {
                error!(id, error = %source, "Message stored but not queued");
                Self::new(
                    StatusCode::SERVICE_UNAVAILABLE,
                    format!("Message {id} was stored but not queued for processing"),
                )
            }
        }
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        warn!(error = %err, "Validation failed");
        let message = match err {
            ValidationError::EmptyContent => "Message content cannot be empty".to_string(),
            ValidationError::ContentTooLong { max } => {
                format!("Message content too long (max {max} characters)")
            }
            ValidationError::InvalidCharacters => {
                "Message content contains invalid characters".to_string()
            }
            ValidationError::InvalidId => "Invalid message ID".to_string(),
        };
        Self::new(StatusCode::BAD_REQUEST, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorResponse {
                error: self.message,
            }),
        )
            .into_response()
    }
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/messages", post(create_message).get(list_messages))
        .route("/messages/{id}", get(get_message))
        .route("/messages/{id}/process", put(process_message))
        .route("/statistics", get(get_statistics))
        .route("/health", get(health))
        .layer(middleware::from_fn(request_span))
        .with_state(state)
}

/// Tag every log line of a request with a fresh `request_id`.
async fn request_span(req: Request, next: Next) -> Response {
    let span = info_span!(
        "request",
        request_id = %Uuid::new_v4(),
        method = %req.method(),
        path = %req.uri().path(),
    );
    next.run(req).instrument(span).await
}

fn parse_id(state: &AppState, raw: &str) -> Result<i64, ApiError> {
    let id = raw.parse::<i64>().map_err(|e| {
        warn!(id = raw, error = %e, "Invalid message ID format");
        ApiError::new(StatusCode::BAD_REQUEST, "Invalid message ID")
    })?;
    state.validator.validate_id(id)?;
    Ok(id)
}

/// POST /messages
async fn create_message(
    State(state): State<AppState>,
    body: Result<Json<CreateMessageRequest>, JsonRejection>,
) -> Result<Json<CreateMessageResponse>, ApiError> {
    let Json(body) = body.map_err(|e| {
        warn!(error = %e, "Invalid JSON in create message request");
        ApiError::new(StatusCode::BAD_REQUEST, "Invalid JSON")
    })?;

    state.validator.validate_content(&body.content)?;

    let id = state.service.submit(&body.content).await?;
    info!(id, "Successfully created message");
    Ok(Json(CreateMessageResponse { id }))
}

/// PUT /messages/{id}/process
async fn process_message(
    State(state): State<AppState>,
    Path(raw): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_id(&state, &raw)?;
    state.service.mark_processed(id).await?;
    Ok(StatusCode::OK)
}

/// GET /messages/{id}
async fn get_message(
    State(state): State<AppState>,
    Path(raw): Path<String>,
) -> Result<Json<Record>, ApiError> {
    let id = parse_id(&state, &raw)?;
    Ok(Json(state.service.get_message(id).await?))
}

/// GET /messages
async fn list_messages(State(state): State<AppState>) -> Result<Json<Vec<Record>>, ApiError> {
    Ok(Json(state.service.list_messages().await?))
}

/// GET /statistics
async fn get_statistics(State(state): State<AppState>) -> Result<Json<Statistics>, ApiError> {
    let stats = state.service.statistics().await?;
    info!(
        total = stats.total,
        processed = stats.processed,
        unprocessed = stats.unprocessed,
        "Fetched statistics"
    );
    Ok(Json(stats))
}

/// GET /health
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

/// Serve the API on `addr` until `shutdown` fires.
pub async fn start_http_server(
    addr: &str,
    state: AppState,
    shutdown: CancellationToken,
) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!("HTTP server listening on http://{}", listener.local_addr()?);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
}
