use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, warn};

use groovio_core::{DispatcherStatus, JobError, JobRecord, JobStatus, SanitizedConfig};

use crate::metrics::{collect_dynamic_metrics, encode_metrics};
use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Build an error response with a JSON `{ "error": ... }` body.
pub fn error_response(status: StatusCode, message: impl Into<String>) -> (StatusCode, Json<ErrorResponse>) {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

pub async fn get_config(State(state): State<Arc<AppState>>) -> Json<SanitizedConfig> {
    Json(state.sanitized_config())
}

/// Dispatcher status, or 503 when this process runs without one.
pub async fn dispatcher_status(
    State(state): State<Arc<AppState>>,
) -> Result<Json<DispatcherStatus>, (StatusCode, Json<ErrorResponse>)> {
    match state.dispatcher() {
        Some(dispatcher) => dispatcher.status().map(Json).map_err(|e| {
            error!("Failed to read dispatcher status: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }),
        None => Err(error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            "Dispatcher is not enabled",
        )),
    }
}

/// Get the job record for an external track id.
pub async fn get_job(
    State(state): State<Arc<AppState>>,
    Path(track_id): Path<String>,
) -> Result<Json<JobRecord>, (StatusCode, Json<ErrorResponse>)> {
    match state.job_store().get_by_track_id(&track_id) {
        Ok(Some(job)) => Ok(Json(job)),
        Ok(None) => Err(error_response(
            StatusCode::NOT_FOUND,
            format!("No job for track {}", track_id),
        )),
        Err(e) => {
            error!(track_id = %track_id, "Failed to get job: {}", e);
            Err(error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
        }
    }
}

/// Delete a finished job so the track can be queued again.
///
/// Jobs still `queued` or `downloading` are owned by the dispatcher and
/// cannot be deleted.
pub async fn delete_job(
    State(state): State<Arc<AppState>>,
    Path(track_id): Path<String>,
) -> Result<Json<JobRecord>, (StatusCode, Json<ErrorResponse>)> {
    let store = state.job_store();

    let job = match store.get_by_track_id(&track_id) {
        Ok(Some(job)) => job,
        Ok(None) => {
            return Err(error_response(
                StatusCode::NOT_FOUND,
                format!("No job for track {}", track_id),
            ))
        }
        Err(e) => {
            error!(track_id = %track_id, "Failed to get job: {}", e);
            return Err(error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()));
        }
    };

    if !job.status.is_terminal() {
        return Err(error_response(
            StatusCode::CONFLICT,
            format!("Job for track {} is still {}", track_id, job.status),
        ));
    }

    match store.delete(&job.id) {
        Ok(deleted) => {
            info!(
                job_id = %deleted.id,
                track_id = %deleted.external_track_id,
                status = %deleted.status,
                "Job deleted"
            );
            if let Some(reference) = &deleted.artifact_reference {
                if let Err(e) = state.artifacts().remove(reference).await {
                    warn!(
                        job_id = %deleted.id,
                        artifact = %reference,
                        "Failed to remove artifact of deleted job: {}",
                        e
                    );
                }
            }
            Ok(Json(deleted))
        }
        Err(JobError::NotFound(_)) => Err(error_response(
            StatusCode::NOT_FOUND,
            format!("No job for track {}", track_id),
        )),
        Err(e) => {
            error!(job_id = %job.id, "Failed to delete job: {}", e);
            Err(error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
        }
    }
}

/// Prometheus text exposition.
pub async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    collect_dynamic_metrics(&state);
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        encode_metrics(),
    )
}

/// Status label reported for a track with no job.
pub const NOT_FOUND_STATUS: &str = "not_found";

/// Status label for check-tracks responses.
pub fn status_label(status: Option<JobStatus>) -> &'static str {
    status.map(|s| s.as_str()).unwrap_or(NOT_FOUND_STATUS)
}
