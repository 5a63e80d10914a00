use axum::{
    extract::{multipart::MultipartRejection, DefaultBodyLimit, Multipart, Path, State},
    http::header,
    response::{IntoResponse, Redirect, Response},
    routing::get,
    Json, Router,
};
use tracing::{instrument, warn};

use super::{
    dto::UploadResponse,
    services::{is_video, UploadItem},
};
use crate::{
    error::{AppError, AppResult},
    state::AppState,
    storage::ObjectBody,
    timesheet::{
        handlers::{parse_date_key, parse_meal},
        OkResponse,
    },
};

const VIDEO_FIELD: &str = "video";

pub fn video_routes(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .route(
            "/video/:date_key/:meal",
            get(get_video).post(upload_video).delete(delete_video),
        )
        .layer(DefaultBodyLimit::max(max_upload_bytes))
}

/// POST /api/video/:date_key/:meal (multipart, field `video`)
#[instrument(skip(state, mp))]
pub async fn upload_video(
    State(state): State<AppState>,
    Path((date_key, meal)): Path<(String, String)>,
    mp: Result<Multipart, MultipartRejection>,
) -> AppResult<Json<UploadResponse>> {
    let date_key = parse_date_key(&date_key)?;
    let slot = parse_meal(&meal)?;
    let mut mp = mp?;

    let mut upload = None;
    while let Some(field) = mp.next_field().await? {
        if field.name() != Some(VIDEO_FIELD) {
            continue;
        }
        let content_type = field
            .content_type()
            .map(|s| s.to_string())
            .unwrap_or_else(|| "application/octet-stream".into());
        if !is_video(&content_type) {
            warn!(%content_type, "rejected non-video upload");
            return Err(AppError::InvalidUpload("Only video files are allowed".into()));
        }
        let file_name = field.file_name().map(|s| s.to_string());
        let body = field.bytes().await?;
        upload = Some(UploadItem {
            body,
            content_type,
            file_name,
        });
        break;
    }
    let Some(item) = upload else {
        return Err(AppError::InvalidUpload("No video file provided".into()));
    };

    let filename = state.videos.put(&date_key, slot, item).await?;
    Ok(Json(UploadResponse { ok: true, filename }))
}

/// Bytes from local disk, or a redirect to a presigned bucket URL.
#[instrument(skip(state))]
pub async fn get_video(
    State(state): State<AppState>,
    Path((date_key, meal)): Path<(String, String)>,
) -> AppResult<Response> {
    let date_key = parse_date_key(&date_key)?;
    let slot = parse_meal(&meal)?;

    match state.videos.get(&date_key, slot).await? {
        Some(ObjectBody::Bytes { body, content_type }) => {
            Ok(([(header::CONTENT_TYPE, content_type)], body).into_response())
        }
        Some(ObjectBody::Redirect(url)) => Ok(Redirect::temporary(&url).into_response()),
        None => Err(AppError::NotFound("Video not found".into())),
    }
}

#[instrument(skip(state))]
pub async fn delete_video(
    State(state): State<AppState>,
    Path((date_key, meal)): Path<(String, String)>,
) -> AppResult<Json<OkResponse>> {
    let date_key = parse_date_key(&date_key)?;
    let slot = parse_meal(&meal)?;
    state.videos.delete(&date_key, slot).await?;
    Ok(Json(OkResponse::ok()))
}
