use actix_multipart::Multipart;
use actix_web::rt::task::spawn_blocking;
use actix_web::{web, HttpRequest, HttpResponse};
use futures_util::StreamExt;
use image::imageops::FilterType;
use image::ImageFormat;
use log::{error, info, warn};
use serde_json::json;
use std::io::Cursor;
use std::path::Path;
use uuid::Uuid;

use crate::app::AppState;
use crate::config::Config;
use crate::db::UserRepository;
use crate::errors::AppError;
use crate::utils::auth::AuthenticatedUser;

const MAX_AVATAR_BYTES: usize = 5 * 1024 * 1024;
const MAX_AVATAR_DIMENSION: u32 = 800;
const AVATAR_URL_PREFIX: &str = "/media/avatars/";

fn avatar_format(mime_type: &str) -> Option<ImageFormat> {
    match mime_type {
        "image/jpeg" => Some(ImageFormat::Jpeg),
        "image/png" => Some(ImageFormat::Png),
        "image/webp" => Some(ImageFormat::WebP),
        _ => None,
    }
}

/// Scales the image down to fit within 800x800, keeping its aspect ratio.
/// Images already within bounds are returned unchanged.
pub(crate) fn shrink_image(data: &[u8], format: ImageFormat) -> Result<Vec<u8>, image::ImageError> {
    let img = image::load_from_memory_with_format(data, format)?;
    if img.width() <= MAX_AVATAR_DIMENSION && img.height() <= MAX_AVATAR_DIMENSION {
        return Ok(data.to_vec());
    }

    let resized = img.resize(MAX_AVATAR_DIMENSION, MAX_AVATAR_DIMENSION, FilterType::Lanczos3);
    let mut out = Cursor::new(Vec::new());
    resized.write_to(&mut out, format)?;
    Ok(out.into_inner())
}

fn write_avatar(dir: &Path, file_name: &str, data: Vec<u8>, format: ImageFormat) -> std::io::Result<()> {
    let bytes = shrink_image(&data, format).unwrap_or_else(|err| {
        // Keep the upload as-is rather than rejecting it.
        error!("Error optimizing avatar {}: {}", file_name, err);
        data
    });
    std::fs::create_dir_all(dir)?;
    std::fs::write(dir.join(file_name), bytes)
}

/// Best-effort removal of a stored avatar. The database row is the source of
/// truth, so a missing file is not an error.
pub(crate) async fn remove_avatar_file(config: &Config, avatar_url: &str) {
    let Some(file_name) = avatar_url.strip_prefix(AVATAR_URL_PREFIX) else {
        warn!("Ignoring avatar outside the media directory: {}", avatar_url);
        return;
    };
    if file_name.is_empty() || file_name.contains(|c: char| c == '/' || c == '\\') || file_name.contains("..") {
        warn!("Ignoring suspicious avatar reference: {}", avatar_url);
        return;
    }

    let path = config.avatar_dir().join(file_name);
    match tokio::fs::remove_file(&path).await {
        Ok(()) => info!("Removed avatar file {}", path.display()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => warn!("Failed to remove avatar file {}: {}", path.display(), err),
    }
}

// POST /users/upload-avatar
pub async fn upload_avatar(
    auth: AuthenticatedUser,
    state: web::Data<AppState>,
    req: HttpRequest,
    payload: web::Payload,
) -> Result<HttpResponse, AppError> {
    let mut multipart = Multipart::new(req.headers(), payload);
    let mut file_data = Vec::new();

    // Collect file data
    while let Some(item) = multipart.next().await {
        let mut field = item.map_err(|err| {
            error!("Invalid multipart field: {:?}", err);
            AppError::BadRequest("Invalid multipart field".to_string())
        })?;

        if field.name() != "avatar" {
            return Err(AppError::BadRequest("Invalid field name: expected 'avatar'".to_string()));
        }

        while let Some(chunk) = field.next().await {
            let chunk = chunk.map_err(|err| {
                error!("Failed to read chunk: {:?}", err);
                AppError::BadRequest("Failed to read chunk".to_string())
            })?;
            if file_data.len() + chunk.len() > MAX_AVATAR_BYTES {
                return Err(AppError::BadRequest("File size exceeds 5MiB limit".to_string()));
            }
            file_data.extend_from_slice(&chunk);
        }
    }

    if file_data.is_empty() {
        return Err(AppError::BadRequest("File part is missing".to_string()));
    }

    // Detect file type from content, not from the client's claim
    let file_type = infer::get(&file_data)
        .ok_or_else(|| AppError::BadRequest("Unable to detect file type".to_string()))?;
    let format = avatar_format(file_type.mime_type()).ok_or_else(|| {
        AppError::BadRequest("Only JPEG, PNG and WebP images are allowed".to_string())
    })?;

    let file_name = format!("{}.{}", Uuid::new_v4(), file_type.extension());
    let dir = state.config.avatar_dir();
    let name = file_name.clone();
    spawn_blocking(move || write_avatar(&dir, &name, file_data, format))
        .await
        .map_err(|_| AppError::InternalServerError("Avatar processing failed".to_string()))?
        .map_err(|err| {
            error!("Failed to store avatar for user {}: {}", auth.user.id, err);
            AppError::InternalServerError("Failed to store avatar".to_string())
        })?;

    let avatar_url = format!("{}{}", AVATAR_URL_PREFIX, file_name);
    let previous = state.store.set_avatar_url(auth.user.id, Some(&avatar_url)).await?;
    if let Some(previous) = previous {
        remove_avatar_file(&state.config, &previous).await;
    }

    info!("User {} uploaded avatar {}", auth.user.id, avatar_url);
    Ok(HttpResponse::Ok().json(json!({ "avatar_url": avatar_url })))
}

// DELETE /users/delete-avatar
pub async fn delete_avatar(
    auth: AuthenticatedUser,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let Some(previous) = state.store.set_avatar_url(auth.user.id, None).await? else {
        return Err(AppError::NotFound("Avatar not found".to_string()));
    };

    remove_avatar_file(&state.config, &previous).await;
    Ok(HttpResponse::Ok().json(json!({ "message": "Avatar removed" })))
}
