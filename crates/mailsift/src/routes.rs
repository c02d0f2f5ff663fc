//! HTTP surface under `/api/email`.

use std::convert::Infallible;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use mailsift_core::{
    Broadcaster, Category, Error, IngestionEngine, Notification, NotificationReport,
    ProcessedMessage, ReplyDraft, ReplyOrchestrator, SentSummary,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::{Stream, StreamExt};
use tracing::{info, warn};

/// Messages listed by `GET /pull` and `GET /sent` when no limit is given.
const DEFAULT_PULL_LIMIT: u32 = 5;

/// SSE event name for processed messages.
const NEW_EMAIL_EVENT: &str = "new_email";

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    engine: Arc<IngestionEngine>,
    replies: ReplyOrchestrator,
    broadcaster: Broadcaster,
}

impl AppState {
    pub const fn new(
        engine: Arc<IngestionEngine>,
        replies: ReplyOrchestrator,
        broadcaster: Broadcaster,
    ) -> Self {
        Self {
            engine,
            replies,
            broadcaster,
        }
    }
}

/// Builds the service router.
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/notifications", post(notifications))
        .route("/pull", get(pull))
        .route("/sent", get(sent))
        .route("/reply", post(reply))
        .route("/send_reply", post(send_reply))
        .route("/events", get(events))
        .route("/health", get(health));

    Router::new().nest("/api/email", api).with_state(state)
}

/// JSON error body with a status code.
#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        let status = match err {
            Error::MalformedNotification(_) | Error::NotRepliable(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

async fn notifications(State(state): State<AppState>, body: Bytes) -> ApiResult<NotificationReport> {
    let notification = Notification::decode(&body)
        .inspect_err(|e| warn!(error = %e, "Rejected push notification"))?;
    let report = state.engine.handle_notification(&notification).await?;
    Ok(Json(report))
}

#[derive(Debug, Deserialize)]
struct PullParams {
    limit: Option<u32>,
}

async fn pull(
    State(state): State<AppState>,
    Query(params): Query<PullParams>,
) -> ApiResult<Vec<ProcessedMessage>> {
    let limit = params.limit.unwrap_or(DEFAULT_PULL_LIMIT);
    let report = state.engine.pull(limit).await?;
    info!(
        limit,
        processed = report.processed.len(),
        skipped = report.skipped.len(),
        "Manual pull complete"
    );
    Ok(Json(report.processed))
}

async fn sent(
    State(state): State<AppState>,
    Query(params): Query<PullParams>,
) -> ApiResult<Vec<SentSummary>> {
    let limit = params.limit.unwrap_or(DEFAULT_PULL_LIMIT);
    let sent = state.engine.list_sent(limit).await?;
    Ok(Json(sent))
}

#[derive(Debug, Deserialize)]
struct ReplyRequest {
    email_text: String,
    label: String,
    confidence: f64,
}

async fn reply(
    State(state): State<AppState>,
    payload: Result<Json<ReplyRequest>, JsonRejection>,
) -> ApiResult<ReplyDraft> {
    let Json(request) = payload?;
    let label = Category::parse(&request.label);
    let draft = state
        .replies
        .draft(&request.email_text, label, request.confidence)
        .await?;
    Ok(Json(draft))
}

#[derive(Debug, Deserialize)]
struct SendReplyRequest {
    message_id: Option<String>,
    draft_text: Option<String>,
    subject: Option<String>,
}

#[derive(Debug, Serialize)]
struct SendReplyResponse {
    success: bool,
    message_id: String,
    status: &'static str,
}

async fn send_reply(
    State(state): State<AppState>,
    payload: Result<Json<SendReplyRequest>, JsonRejection>,
) -> ApiResult<SendReplyResponse> {
    let Json(request) = payload?;
    let (Some(message_id), Some(draft)) = (
        request.message_id.filter(|s| !s.trim().is_empty()),
        request.draft_text.filter(|s| !s.trim().is_empty()),
    ) else {
        return Err(ApiError::bad_request("message_id and draft_text are required"));
    };

    let sent = state
        .replies
        .send_draft(&message_id, &draft, request.subject.as_deref())
        .await?;
    Ok(Json(SendReplyResponse {
        success: true,
        message_id: sent.id,
        status: "Sent",
    }))
}

async fn events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let receiver = state.broadcaster.subscribe().into_inner();
    let stream = BroadcastStream::new(receiver).filter_map(|item| match item {
        Ok(message) => match Event::default().event(NEW_EMAIL_EVENT).json_data(&message) {
            Ok(event) => Some(Ok(event)),
            Err(e) => {
                warn!(message_id = %message.message_id, error = %e, "Failed to encode event");
                None
            }
        },
        Err(BroadcastStreamRecvError::Lagged(skipped)) => {
            warn!(skipped, "Event stream subscriber lagged; skipping missed events");
            None
        }
    });
    Sse::new(stream).keep_alive(KeepAlive::default())
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}
