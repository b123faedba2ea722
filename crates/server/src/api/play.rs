//! Audio streaming with byte-range support.

use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use futures::StreamExt;
use serde::Deserialize;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncSeekExt, BufReader, SeekFrom};
use tokio_util::io::ReaderStream;
use tracing::{debug, error, warn};

use groovio_core::media::AUDIO_CONTENT_TYPE;
use groovio_core::{resolve_range, ArtifactError, JobStatus, RangeError, ServedRange};

use super::handlers::error_response;
use crate::metrics::{BYTES_STREAMED, STREAMS_ABORTED};
use crate::state::AppState;

/// Read buffer and stream chunk size.
const STREAM_CHUNK_SIZE: usize = 4096 * 16;

#[derive(Debug, Default, Deserialize)]
pub struct PlayParams {
    /// Any value other than empty, `0` or `false` asks for an attachment.
    #[serde(default)]
    pub download: Option<String>,
}

impl PlayParams {
    fn wants_download(&self) -> bool {
        matches!(self.download.as_deref(), Some(v) if !v.is_empty() && v != "0" && v != "false")
    }
}

/// `GET /api/play-track/` with no id.
pub async fn play_track_missing_id() -> Response {
    error_response(StatusCode::BAD_REQUEST, "Missing track id").into_response()
}

/// Stream a completed track, honoring a single `Range: bytes=` request.
pub async fn play_track(
    State(state): State<Arc<AppState>>,
    Path(track_id): Path<String>,
    Query(params): Query<PlayParams>,
    headers: HeaderMap,
) -> Response {
    let track_id = track_id.trim();
    if track_id.is_empty() {
        return play_track_missing_id().await;
    }

    let job = match state.job_store().get_by_track_id(track_id) {
        Ok(Some(job)) => job,
        Ok(None) => {
            return error_response(StatusCode::NOT_FOUND, "Track not found").into_response()
        }
        Err(e) => {
            error!(track_id = %track_id, "Failed to look up track: {}", e);
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
                .into_response();
        }
    };

    let reference = match (job.status, job.artifact_reference.as_deref()) {
        (JobStatus::Completed, Some(reference)) => reference,
        _ => {
            debug!(track_id = %track_id, status = %job.status, "Track has no artifact yet");
            return error_response(StatusCode::NOT_FOUND, "Track file not available")
                .into_response();
        }
    };

    let artifact = match state.artifacts().open(reference).await {
        Ok(artifact) => artifact,
        Err(ArtifactError::NotFound(_)) | Err(ArtifactError::InvalidReference(_)) => {
            warn!(
                track_id = %track_id,
                artifact = %reference,
                "Completed job points at a missing artifact"
            );
            return error_response(StatusCode::NOT_FOUND, "File not found").into_response();
        }
        Err(e) => {
            error!(track_id = %track_id, artifact = %reference, "Failed to open artifact: {}", e);
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to open file")
                .into_response();
        }
    };

    let range_header = match headers.get(header::RANGE).map(|v| v.to_str()) {
        None => None,
        Some(Ok(value)) => Some(value),
        Some(Err(_)) => {
            return error_response(StatusCode::BAD_REQUEST, "Invalid Range header").into_response()
        }
    };

    let served = match resolve_range(range_header, artifact.size) {
        Ok(served) => served,
        Err(RangeError::Malformed(reason)) => {
            debug!(track_id = %track_id, "Rejected range: {}", reason);
            return error_response(StatusCode::BAD_REQUEST, "Invalid Range header")
                .into_response();
        }
        Err(RangeError::Unsatisfiable { size }) => {
            let mut response =
                error_response(StatusCode::RANGE_NOT_SATISFIABLE, "Range not satisfiable")
                    .into_response();
            if let Ok(value) = HeaderValue::from_str(&format!("bytes */{}", size)) {
                response.headers_mut().insert(header::CONTENT_RANGE, value);
            }
            return response;
        }
    };

    let mut file = artifact.file;
    if served.start() > 0 {
        if let Err(e) = file.seek(SeekFrom::Start(served.start())).await {
            error!(track_id = %track_id, "Seek failed: {}", e);
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Seek failed")
                .into_response();
        }
    }

    debug!(
        track_id = %track_id,
        start = served.start(),
        length = served.content_length(),
        size = artifact.size,
        "Streaming track"
    );

    let body = stream_body(file, track_id, served.content_length());
    let mut response = Response::new(body);
    *response.status_mut() = if served.is_partial() {
        StatusCode::PARTIAL_CONTENT
    } else {
        StatusCode::OK
    };
    apply_headers(response.headers_mut(), &served, track_id, params.wants_download());
    response
}

fn apply_headers(headers: &mut HeaderMap, served: &ServedRange, track_id: &str, download: bool) {
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(AUDIO_CONTENT_TYPE),
    );
    headers.insert(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));
    headers.insert(
        header::CONTENT_LENGTH,
        HeaderValue::from(served.content_length()),
    );
    if let Some(value) = served
        .content_range()
        .and_then(|range| HeaderValue::from_str(&range).ok())
    {
        headers.insert(header::CONTENT_RANGE, value);
    }
    if download {
        let disposition = format!("attachment; filename=\"{}.mp3\"", attachment_stem(track_id));
        if let Ok(value) = HeaderValue::from_str(&disposition) {
            headers.insert(header::CONTENT_DISPOSITION, value);
        }
    }
}

/// File name stem safe to put inside a quoted header parameter.
fn attachment_stem(track_id: &str) -> String {
    let stem: String = track_id
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .collect();
    if stem.is_empty() {
        "track".to_string()
    } else {
        stem
    }
}

/// Bytes sent for one response; logs when the client goes away early.
struct StreamProgress {
    track_id: String,
    expected: u64,
    sent: u64,
}

impl Drop for StreamProgress {
    fn drop(&mut self) {
        if self.sent < self.expected {
            STREAMS_ABORTED.inc();
            debug!(
                track_id = %self.track_id,
                sent = self.sent,
                expected = self.expected,
                "Client disconnected before stream finished"
            );
        }
    }
}

/// Body streaming exactly `length` bytes from the current file position.
fn stream_body(file: tokio::fs::File, track_id: &str, length: u64) -> Body {
    let reader = BufReader::with_capacity(STREAM_CHUNK_SIZE, file).take(length);
    let mut progress = StreamProgress {
        track_id: track_id.to_string(),
        expected: length,
        sent: 0,
    };

    let stream = ReaderStream::with_capacity(reader, STREAM_CHUNK_SIZE).map(move |chunk| {
        match &chunk {
            Ok(bytes) => {
                progress.sent += bytes.len() as u64;
                BYTES_STREAMED.inc_by(bytes.len() as u64);
            }
            Err(e) => warn!(track_id = %progress.track_id, "Read error while streaming: {}", e),
        }
        chunk
    });

    Body::from_stream(stream)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wants_download() {
        let params = |v: Option<&str>| PlayParams {
            download: v.map(str::to_string),
        };
        assert!(!params(None).wants_download());
        assert!(!params(Some("")).wants_download());
        assert!(!params(Some("0")).wants_download());
        assert!(!params(Some("false")).wants_download());
        assert!(params(Some("1")).wants_download());
        assert!(params(Some("true")).wants_download());
    }

    #[test]
    fn test_attachment_stem() {
        assert_eq!(attachment_stem("4uLU6hMCjMI75M1A2tKUQC"), "4uLU6hMCjMI75M1A2tKUQC");
        assert_eq!(attachment_stem("a\"b;c"), "abc");
        assert_eq!(attachment_stem("\"\""), "track");
    }

    #[test]
    fn test_partial_headers() {
        let mut headers = HeaderMap::new();
        let served = ServedRange::Partial {
            start: 100,
            end: 199,
            size: 1000,
        };
        apply_headers(&mut headers, &served, "abc", true);

        assert_eq!(headers[header::CONTENT_TYPE], "audio/mpeg");
        assert_eq!(headers[header::ACCEPT_RANGES], "bytes");
        assert_eq!(headers[header::CONTENT_LENGTH], "100");
        assert_eq!(headers[header::CONTENT_RANGE], "bytes 100-199/1000");
        assert_eq!(
            headers[header::CONTENT_DISPOSITION],
            "attachment; filename=\"abc.mp3\""
        );
    }

    #[test]
    fn test_full_headers() {
        let mut headers = HeaderMap::new();
        apply_headers(&mut headers, &ServedRange::Full { size: 1000 }, "abc", false);

        assert_eq!(headers[header::CONTENT_LENGTH], "1000");
        assert!(headers.get(header::CONTENT_RANGE).is_none());
        assert!(headers.get(header::CONTENT_DISPOSITION).is_none());
    }
}
