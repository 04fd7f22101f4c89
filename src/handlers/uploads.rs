use axum::{
    Json,
    body::Bytes,
    extract::{Multipart, State, multipart::MultipartError},
    http::StatusCode,
};
use tracing::warn;

use crate::{
    auth::AuthUser,
    error::{AppError, AppResult},
    images::UploadedImage,
    models::ApiResponse,
    state::AppState,
};

const FILE_FIELDS: [&str; 2] = ["file", "image"];

pub struct ImageField {
    pub file_name: Option<String>,
    pub content_type: String,
    pub bytes: Bytes,
}

pub async fn upload_image(
    State(state): State<AppState>,
    auth: AuthUser,
    multipart: Multipart,
) -> AppResult<(StatusCode, Json<ApiResponse<UploadedImage>>)> {
    let field = read_image_field(multipart).await?;
    let image = state
        .images
        .save(
            auth.user.id,
            field.file_name.as_deref(),
            &field.content_type,
            &field.bytes,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(ApiResponse::new(image))))
}

/// The first `file` (or `image`) part of a multipart body.
pub async fn read_image_field(mut multipart: Multipart) -> AppResult<ImageField> {
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if !field.name().is_some_and(|name| FILE_FIELDS.contains(&name)) {
            continue;
        }

        let file_name = field.file_name().map(str::to_string);
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = field.bytes().await.map_err(multipart_error)?;

        if bytes.is_empty() {
            break;
        }

        return Ok(ImageField {
            file_name,
            content_type,
            bytes,
        });
    }

    Err(AppError::validation("No file provided"))
}

fn multipart_error(err: MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return AppError::PayloadTooLarge(err.body_text());
    }

    warn!(error = %err, "rejected multipart body");
    AppError::validation("invalid multipart body")
}
