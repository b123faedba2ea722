//! Track queueing and status handlers.

use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{error, info};

use groovio_core::{metrics as core_metrics, JobError, JobStatus};

use super::handlers::{error_response, status_label, ErrorResponse};
use crate::state::AppState;

/// Maximum number of ids accepted by one check-tracks request.
const MAX_CHECK_IDS: usize = 1000;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for queueing a track.
///
/// Either field names the track; `spotify_track_id` wins when both are set.
#[derive(Debug, Default, Deserialize)]
pub struct QueueTrackBody {
    pub spotify_track_id: Option<String>,
    pub external_track_id: Option<String>,
}

impl QueueTrackBody {
    fn track_id(&self) -> Option<&str> {
        [&self.spotify_track_id, &self.external_track_id]
            .into_iter()
            .flatten()
            .map(|id| id.trim())
            .find(|id| !id.is_empty())
    }
}

/// Response for a queued track.
#[derive(Debug, Serialize)]
pub struct QueueTrackResponse {
    pub status: JobStatus,
    pub job_id: String,
    pub external_track_id: String,
}

/// Request body for checking track statuses.
#[derive(Debug, Deserialize)]
pub struct CheckTracksBody {
    pub track_ids: Vec<String>,
}

/// Query parameters for `GET /api/check-tracks`.
#[derive(Debug, Deserialize)]
pub struct CheckTracksParams {
    /// Comma-separated track ids.
    #[serde(default)]
    pub ids: String,
}

/// Track id to status label.
pub type CheckTracksResponse = BTreeMap<String, String>;

type ApiError = (StatusCode, Json<ErrorResponse>);

// ============================================================================
// Handlers
// ============================================================================

/// Queue a track for download.
///
/// Responds once the job is persisted; the download itself happens on a
/// later dispatcher tick.
pub async fn queue_track(
    State(state): State<Arc<AppState>>,
    body: Result<Json<QueueTrackBody>, JsonRejection>,
) -> Result<Json<QueueTrackResponse>, ApiError> {
    let Json(body) = body.map_err(|rejection| {
        error_response(
            StatusCode::BAD_REQUEST,
            format!("Invalid request body: {}", rejection.body_text()),
        )
    })?;

    let track_id = body.track_id().ok_or_else(|| {
        error_response(StatusCode::BAD_REQUEST, "Missing spotify_track_id")
    })?;

    match state.job_store().create_if_absent(track_id) {
        Ok(job) => {
            core_metrics::JOBS_QUEUED.inc();
            info!(
                job_id = %job.id,
                track_id = %job.external_track_id,
                "Track queued"
            );
            Ok(Json(QueueTrackResponse {
                status: job.status,
                job_id: job.id,
                external_track_id: job.external_track_id,
            }))
        }
        Err(JobError::Duplicate(id)) => Err(error_response(
            StatusCode::BAD_REQUEST,
            format!("Track {} is already queued", id),
        )),
        Err(e) => {
            error!(track_id = %track_id, "Failed to queue track: {}", e);
            Err(error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
        }
    }
}

/// Report the status of each requested track.
pub async fn check_tracks(
    State(state): State<Arc<AppState>>,
    body: Result<Json<CheckTracksBody>, JsonRejection>,
) -> Result<Json<CheckTracksResponse>, ApiError> {
    let Json(body) = body.map_err(|rejection| {
        error_response(
            StatusCode::BAD_REQUEST,
            format!("Invalid request body: {}", rejection.body_text()),
        )
    })?;

    lookup_statuses(&state, body.track_ids).map(Json)
}

/// Query-string form: `GET /api/check-tracks?ids=a,b,c`.
pub async fn check_tracks_query(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CheckTracksParams>,
) -> Result<Json<CheckTracksResponse>, ApiError> {
    let ids = params.ids.split(',').map(str::to_string).collect();
    lookup_statuses(&state, ids).map(Json)
}

fn lookup_statuses(state: &AppState, ids: Vec<String>) -> Result<CheckTracksResponse, ApiError> {
    let mut ids: Vec<String> = ids
        .into_iter()
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .collect();
    ids.sort();
    ids.dedup();

    if ids.len() > MAX_CHECK_IDS {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            format!("At most {} track ids per request", MAX_CHECK_IDS),
        ));
    }

    let statuses = state.job_store().statuses(&ids).map_err(|e| {
        error!("Failed to check track statuses: {}", e);
        error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    })?;

    Ok(ids
        .into_iter()
        .map(|id| {
            let label = status_label(statuses.get(&id).copied());
            (id, label.to_string())
        })
        .collect())
}
