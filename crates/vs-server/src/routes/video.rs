//! `GET /video?id=<videoId>`: stream a stored video and announce the view.

use axum::body::Body;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::http::{header, Method, StatusCode};
use axum::response::Response;
use serde::Deserialize;
use vs_core::{Error, VideoId, ViewedEvent, VIDEO_CONTENT_TYPE};

use crate::context::AppContext;
use crate::error::AppError;

#[derive(Debug, Deserialize)]
pub struct VideoQuery {
    pub id: Option<String>,
}

/// Resolve the id, open the file, announce the view, stream the bytes.
///
/// An absent or empty id is an unknown id. `HEAD` answers with the same
/// headers but never announces a view.
///
/// The view is queued as soon as the file is open, before the response
/// headers are written, so a client that disconnects mid-body still counts.
pub async fn stream_video(
    State(ctx): State<AppContext>,
    method: Method,
    query: Result<Query<VideoQuery>, QueryRejection>,
) -> Result<Response, AppError> {
    let id = match query {
        Ok(Query(VideoQuery { id: Some(id) })) => VideoId::from(id),
        _ => VideoId::default(),
    };
    if id.is_empty() {
        return Err(Error::not_found("video", "<none>").into());
    }

    let record = ctx
        .store
        .find_by_video_id(&id)
        .await
        .inspect_err(|e| stream_error(e.kind()))?
        .ok_or_else(|| Error::not_found("video", &id))?;

    let session = ctx.source.open(&record.video_path).await.map_err(|e| {
        tracing::error!(
            video_id = %id,
            video_path = %record.video_path,
            error = %e,
            "Video record exists but its file cannot be served"
        );
        stream_error(e.kind());
        e.into_error(&id)
    })?;

    let size = session.size();
    let body = if method == Method::HEAD {
        Body::empty()
    } else {
        ctx.publisher
            .publish(&ViewedEvent::new(record.video_path.as_str(), id.clone()));
        metrics::counter!("vidstream_streams_started_total").increment(1);
        tracing::info!(video_id = %id, video_path = %record.video_path, size, "Streaming video");
        Body::from_stream(session)
    };

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, VIDEO_CONTENT_TYPE)
        .header(header::CONTENT_LENGTH, size)
        .body(body)
        .map_err(|e| Error::Internal(format!("failed to build response: {e}")).into())
}

fn stream_error(kind: &'static str) {
    metrics::counter!("vidstream_stream_errors_total", "kind" => kind).increment(1);
}
