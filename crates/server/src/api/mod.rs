use std::{collections::HashMap, sync::Arc};

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use shared::{
    domain::{ChatId, Me},
    error::{ApiError, ErrorCode},
    protocol::ChatEvent,
};
use storage::{load_timestamps, KeyValueStore};
use tower_http::limit::RequestBodyLimitLayer;
use tracing::{error, info, warn};

use crate::sessions::{RegistryError, SessionRegistry};

const MAX_EVENT_BYTES: usize = 4 * 1024 * 1024;

type ApiResult<T> = Result<T, (StatusCode, Json<ApiError>)>;

/// Shared state of the ingest API the chat-service integration talks to.
#[derive(Clone)]
pub struct AppState {
    pub registry: SessionRegistry,
    pub store: Arc<dyn KeyValueStore>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/sessions/:nick/identity", post(bind_identity))
        .route("/sessions/:nick/events", post(push_event))
        .route("/sessions/:nick/timestamps", get(list_timestamps))
        .layer(RequestBodyLimitLayer::new(MAX_EVENT_BYTES))
        .with_state(state)
}

async fn healthz(State(state): State<AppState>) -> ApiResult<&'static str> {
    state.store.health_check().await.map_err(|err| {
        warn!(error = %format!("{err:#}"), "api: store health check failed");
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ApiError::new(ErrorCode::Unavailable, err.to_string())),
        )
    })?;
    Ok("ok")
}

async fn bind_identity(
    State(state): State<AppState>,
    Path(nick): Path<String>,
    Json(me): Json<Me>,
) -> ApiResult<StatusCode> {
    if me.self_id.as_str().is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ApiError::new(
                ErrorCode::Validation,
                "self_id cannot be empty",
            )),
        ));
    }

    let timestamps = load_timestamps(state.store.as_ref(), me.self_id.as_str())
        .await
        .map_err(internal)?;
    let identity = me.self_id.clone();
    let resumed = timestamps.len();
    state
        .registry
        .bind(&nick, me, timestamps)
        .await
        .map_err(registry_error)?;

    info!(%nick, %identity, resumed, "api: identity bound");
    Ok(StatusCode::NO_CONTENT)
}

async fn push_event(
    State(state): State<AppState>,
    Path(nick): Path<String>,
    Json(event): Json<ChatEvent>,
) -> ApiResult<StatusCode> {
    state
        .registry
        .dispatch(&nick, event)
        .await
        .map_err(registry_error)?;
    Ok(StatusCode::ACCEPTED)
}

async fn list_timestamps(
    State(state): State<AppState>,
    Path(nick): Path<String>,
) -> ApiResult<Json<HashMap<ChatId, i64>>> {
    let identity = state.registry.identity(&nick).map_err(registry_error)?;
    let timestamps = load_timestamps(state.store.as_ref(), identity.as_str())
        .await
        .map_err(internal)?;
    Ok(Json(timestamps))
}

fn registry_error(error: RegistryError) -> (StatusCode, Json<ApiError>) {
    let (status, code) = match &error {
        RegistryError::NotFound(_) => (StatusCode::NOT_FOUND, ErrorCode::NotFound),
        RegistryError::NickInUse(_)
        | RegistryError::Unbound(_)
        | RegistryError::IdentityMismatch { .. } => {
            (StatusCode::CONFLICT, ErrorCode::Conflict)
        }
        RegistryError::Closed(_) => (StatusCode::SERVICE_UNAVAILABLE, ErrorCode::Unavailable),
    };
    (status, Json(ApiError::new(code, error.to_string())))
}

fn internal(err: anyhow::Error) -> (StatusCode, Json<ApiError>) {
    error!(error = %format!("{err:#}"), "api: request failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ApiError::internal(err.to_string())),
    )
}

#[cfg(test)]
#[path = "tests/mod_tests.rs"]
mod tests;
