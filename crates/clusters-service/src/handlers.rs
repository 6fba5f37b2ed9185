//! Route handlers.
//!
//! Handlers talk to the store directly; they never wait on a sweep.

use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::Json;
use clusters_scheduler::{JobRegistry, JobStatus, UpdateQueue};
use clusters_storage::{StoreStats, TopicStore};
use clusters_types::{Topic, TopicState, UpdateEvent};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{required, ServiceError};

/// Shared handles passed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<TopicStore>,
    pub queue: Arc<UpdateQueue>,
    pub registry: Arc<JobRegistry>,
}

impl AppState {
    pub fn new(store: Arc<TopicStore>, queue: Arc<UpdateQueue>, registry: Arc<JobRegistry>) -> Self {
        Self {
            store,
            queue,
            registry,
        }
    }
}

// `*_uid` aliases keep older clients working.

#[derive(Debug, Deserialize)]
pub struct SessionRequest {
    #[serde(default, alias = "session_uid")]
    pub session_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TopicRequest {
    #[serde(default, alias = "session_uid")]
    pub session_id: Option<String>,
    #[serde(default, alias = "topic_uid")]
    pub topic_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct InputRequest {
    #[serde(default, alias = "session_uid")]
    pub session_id: Option<String>,
    #[serde(default, alias = "topic_uid")]
    pub topic_id: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub message: String,
    pub session_id: String,
}

#[derive(Debug, Serialize)]
pub struct TopicResponse {
    pub message: String,
    pub session_id: String,
    pub topic_id: String,
}

#[derive(Debug, Serialize)]
pub struct InputResponse {
    pub message: String,
    pub total_inputs: usize,
}

/// Topic snapshot with its derived state.
#[derive(Debug, Serialize)]
pub struct TopicView {
    #[serde(flatten)]
    pub topic: Topic,
    pub state: TopicState,
}

#[derive(Debug, Serialize)]
pub struct UpdatesResponse {
    pub updates: Vec<UpdateEvent>,
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub store: StoreStats,
    pub queued_updates: usize,
    pub jobs: Vec<JobStatus>,
}

fn create_session(state: &AppState, request: &SessionRequest) -> Result<SessionResponse, ServiceError> {
    let session_id = required("session_id", &request.session_id)?;
    state.store.create_session(session_id)?;
    Ok(SessionResponse {
        message: format!("Session {} created successfully", session_id),
        session_id: session_id.to_string(),
    })
}

/// `GET /init?session_id=`
pub async fn init_session(
    State(state): State<AppState>,
    query: Result<Query<SessionRequest>, QueryRejection>,
) -> Result<Json<SessionResponse>, ServiceError> {
    let Query(request) = query?;
    Ok(Json(create_session(&state, &request)?))
}

/// `POST /sessions`
pub async fn post_session(
    State(state): State<AppState>,
    body: Result<Json<SessionRequest>, JsonRejection>,
) -> Result<Json<SessionResponse>, ServiceError> {
    let Json(request) = body?;
    Ok(Json(create_session(&state, &request)?))
}

/// `POST /topic`
pub async fn create_topic(
    State(state): State<AppState>,
    body: Result<Json<TopicRequest>, JsonRejection>,
) -> Result<Json<TopicResponse>, ServiceError> {
    let Json(request) = body?;
    let session_id = required("session_id", &request.session_id)?;
    let topic_id = required("topic_id", &request.topic_id)?;

    state.store.create(session_id, topic_id)?;

    Ok(Json(TopicResponse {
        message: format!("Topic {} created in session {}", topic_id, session_id),
        session_id: session_id.to_string(),
        topic_id: topic_id.to_string(),
    }))
}

/// `POST /input`
pub async fn append_input(
    State(state): State<AppState>,
    body: Result<Json<InputRequest>, JsonRejection>,
) -> Result<Json<InputResponse>, ServiceError> {
    let Json(request) = body?;
    let session_id = required("session_id", &request.session_id)?;
    let topic_id = required("topic_id", &request.topic_id)?;
    // Text is stored as sent; only blank text is rejected
    required("text", &request.text)?;
    let text = request.text.as_deref().unwrap_or_default();

    let total_inputs = state.store.append(session_id, topic_id, text)?;

    Ok(Json(InputResponse {
        message: format!("Text added to topic {} in session {}", topic_id, session_id),
        total_inputs,
    }))
}

/// `POST /end-topic`
pub async fn end_topic(
    State(state): State<AppState>,
    body: Result<Json<TopicRequest>, JsonRejection>,
) -> Result<Json<TopicResponse>, ServiceError> {
    let Json(request) = body?;
    let session_id = required("session_id", &request.session_id)?;
    let topic_id = required("topic_id", &request.topic_id)?;

    let topic = state.store.finish(session_id, topic_id)?;
    info!(session_id, topic_id, total_inputs = topic.input_count(), "Topic finished");

    Ok(Json(TopicResponse {
        message: format!("Topic {} marked as finished in session {}", topic_id, session_id),
        session_id: session_id.to_string(),
        topic_id: topic_id.to_string(),
    }))
}

/// `GET /topic/:session_id/:topic_id`
pub async fn read_topic(
    State(state): State<AppState>,
    Path((session_id, topic_id)): Path<(String, String)>,
) -> Result<Json<TopicView>, ServiceError> {
    let topic = state.store.read(&session_id, &topic_id)?;
    let topic_state = topic.state();
    Ok(Json(TopicView {
        topic,
        state: topic_state,
    }))
}

/// `GET /get-updates`: hands out every queued event exactly once.
pub async fn get_updates(State(state): State<AppState>) -> Json<UpdatesResponse> {
    let updates = state.queue.drain_all();
    Json(UpdatesResponse {
        count: updates.len(),
        updates,
    })
}

/// `GET /status`
pub async fn status(State(state): State<AppState>) -> Result<Json<StatusResponse>, ServiceError> {
    Ok(Json(StatusResponse {
        store: state.store.stats()?,
        queued_updates: state.queue.len(),
        jobs: state.registry.get_all_status(),
    }))
}

/// `GET /health`
pub async fn health() -> &'static str {
    "ok"
}
