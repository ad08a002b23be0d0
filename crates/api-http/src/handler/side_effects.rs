use crate::auth::AuthUser;
use crate::error::ApiResult;
use crate::extract::ApiJson;
use crate::state::AppState;
use crate::types::{SideEffectLogResponse, SideEffectRequest};
use axum::extract::{FromRequest, Multipart, Request, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::StatusCode;
use axum::Json;
use medtrack_core::application::SideEffectDraft;

/// Image field held in memory until the text fields validate
struct ImageUpload {
    file_name: Option<String>,
    content_type: Option<String>,
    bytes: Vec<u8>,
}

/// Accepts a JSON body or `multipart/form-data` with an optional `image`
pub async fn create(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    request: Request,
) -> ApiResult<(StatusCode, Json<SideEffectLogResponse>)> {
    let is_multipart = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("multipart/form-data"));

    let (body, upload) = if is_multipart {
        let multipart = Multipart::from_request(request, &state).await?;
        read_form(multipart).await?
    } else {
        let ApiJson(body) = ApiJson::<SideEffectRequest>::from_request(request, &state).await?;
        (body, None)
    };

    let (medication_id, symptom, severity, notes) = body.parts()?;

    let image = match upload {
        Some(upload) => Some(
            state
                .media
                .save_side_effect_image(
                    upload.file_name.as_deref(),
                    upload.content_type.as_deref(),
                    &upload.bytes,
                )
                .await?,
        ),
        None => None,
    };

    let draft = SideEffectDraft {
        medication_id,
        symptom,
        severity,
        notes,
        image: image.clone(),
    };

    match state.tracking.log_side_effect(user_id, draft).await {
        Ok(log) => Ok((StatusCode::CREATED, Json(log.into()))),
        Err(err) => {
            if let Some(path) = image {
                state.media.discard(&path).await;
            }
            Err(err.into())
        }
    }
}

async fn read_form(
    mut multipart: Multipart,
) -> ApiResult<(SideEffectRequest, Option<ImageUpload>)> {
    let mut body = SideEffectRequest::default();
    let mut upload = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();

        if name == "image" {
            let file_name = field.file_name().map(str::to_string);
            let content_type = field.content_type().map(str::to_string);
            let bytes = field.bytes().await?;

            // Browsers send an empty part when no file was picked
            let no_file = bytes.is_empty() && file_name.as_deref().unwrap_or_default().is_empty();
            if !no_file {
                upload = Some(ImageUpload {
                    file_name,
                    content_type,
                    bytes: bytes.to_vec(),
                });
            }
        } else {
            let value = field.text().await?;
            body.set_form_field(&name, value)?;
        }
    }

    Ok((body, upload))
}

