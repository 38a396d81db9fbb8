//! Detection and history handlers.

use crate::dtos::{ApiResponse, HistoryData};
use crate::middleware::AuthUser;
use crate::startup::AppState;
use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use service_core::error::AppError;
use uuid::Uuid;

/// Multipart field name carrying the image to classify.
const DETECT_IMAGE_FIELD: &str = "detectImage";

/// Upload size cap, matching the rest of the platform.
const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

/// POST /detect - upload an image, classify it, persist the ranked result.
pub async fn detect(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let mut upload = None;
    while let Some(field) = multipart.next_field().await.map_err(|e| {
        AppError::BadRequest(anyhow::anyhow!("Failed to read multipart field: {}", e))
    })? {
        if field.name() != Some(DETECT_IMAGE_FIELD) {
            continue;
        }

        let original_name = field.file_name().unwrap_or("unnamed").to_string();
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(anyhow::anyhow!("Failed to read image bytes: {}", e)))?
            .to_vec();

        upload = Some((original_name, content_type, data));
        break;
    }

    let (original_name, content_type, data) = upload.ok_or_else(|| {
        AppError::BadRequest(anyhow::anyhow!(
            "Missing '{}' upload field",
            DETECT_IMAGE_FIELD
        ))
    })?;

    if data.is_empty() {
        return Err(AppError::BadRequest(anyhow::anyhow!("Uploaded image is empty")));
    }
    if data.len() > MAX_UPLOAD_BYTES {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Image too large (max 20MB)"
        )));
    }

    let extension = std::path::Path::new(&original_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("bin");
    let key = format!("{}/{}.{}", user_id, Uuid::new_v4(), extension);

    tracing::info!(
        user_id = %user_id,
        filename = %original_name,
        size = data.len(),
        "Detection upload started"
    );

    let image_url = state
        .storage
        .upload(&key, data, &content_type)
        .await
        .map_err(|e| {
            tracing::error!(key = %key, error = %e, "Failed to upload image to storage");
            e
        })?;

    let entry = state.history.record_detection(user_id, image_url).await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(HistoryData::from(entry))),
    ))
}

/// GET /history - all of the caller's detection history.
pub async fn list_history(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<impl IntoResponse, AppError> {
    let entries = state.history.list_history(user_id).await?;
    let data: Vec<HistoryData> = entries.into_iter().map(HistoryData::from).collect();
    Ok(Json(ApiResponse::success(data)))
}

/// GET /history/:history_id - one owned entry, with symptoms.
pub async fn get_history(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(history_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let history_id = parse_history_id(&history_id)?;
    let detail = state.history.get_history(history_id, user_id).await?;
    Ok(Json(ApiResponse::success(HistoryData::from(detail))))
}

/// DELETE /history/:history_id - remove an owned entry and its image.
pub async fn delete_history(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(history_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let history_id = parse_history_id(&history_id)?;
    state.history.delete_history(history_id, user_id).await?;

    // Unit serializes to null, matching the `{message, data: null}` contract.
    Ok(Json(ApiResponse {
        message: "success".to_string(),
        data: (),
    }))
}

/// Path ids must be numeric; anything else is rejected before touching the
/// store.
fn parse_history_id(raw: &str) -> Result<i64, AppError> {
    raw.parse::<i64>()
        .map_err(|_| AppError::BadRequest(anyhow::anyhow!("History id must be an integer")))
}
