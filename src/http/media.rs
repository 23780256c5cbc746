//! Media library handlers backed by the object store.

use axum::{
    extract::{multipart::MultipartRejection, rejection::JsonRejection, Multipart, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use std::time::Duration;

use crate::http::ml::read_upload;
use crate::http::response::{error_response, success};
use crate::http::server::AppState;
use crate::storage::{has_extension, object_key, StoreError, AUDIO_EXTENSIONS, IMAGE_EXTENSIONS};

/// Content type every upload is stored under.
const STORED_CONTENT_TYPE: &str = "application/octet-stream";

#[derive(Debug, Deserialize)]
pub struct UserQuery {
    pub user: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DeleteBody {
    pub user: String,
    pub name: String,
}

impl IntoResponse for StoreError {
    fn into_response(self) -> Response {
        let status = match self {
            StoreError::InvalidKey(_) => StatusCode::BAD_REQUEST,
            StoreError::NotFound(_) => StatusCode::NOT_FOUND,
            StoreError::Backend(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        error_response(status, "object store error", Some(self.to_string()))
    }
}

pub async fn list_images(State(state): State<AppState>, Query(query): Query<UserQuery>) -> Response {
    list_presigned(&state, query, IMAGE_EXTENSIONS).await
}

pub async fn list_tracks(State(state): State<AppState>, Query(query): Query<UserQuery>) -> Response {
    list_presigned(&state, query, AUDIO_EXTENSIONS).await
}

async fn list_presigned(state: &AppState, query: UserQuery, extensions: &[&str]) -> Response {
    let Some(user) = query.user.filter(|u| !u.is_empty()) else {
        return error_response(StatusCode::BAD_REQUEST, "no user in query", None);
    };

    match presigned_urls(state, &user, extensions).await {
        Ok(urls) => success(urls),
        Err(e) => {
            tracing::error!(user = %user, error = %e, "Listing objects failed");
            e.into_response()
        }
    }
}

async fn presigned_urls(state: &AppState, user: &str, extensions: &[&str]) -> Result<Vec<String>, StoreError> {
    let ttl = Duration::from_secs(state.config.storage.presign_ttl_secs);
    let keys = state.objects.list(&format!("{user}/")).await?;

    let mut urls = Vec::new();
    for key in keys.iter().filter(|k| has_extension(k, extensions)) {
        urls.push(state.objects.presign(key, ttl).await?);
    }
    Ok(urls)
}

pub async fn upload_image(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Response {
    let multipart = match multipart {
        Ok(m) => m,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, "bad request", Some(e.body_text())),
    };
    let mut form = match read_upload(multipart, &["user", "name"], "image").await {
        Ok(form) => form,
        Err(e) => return e.into_response(),
    };
    let Some(data) = form.file.take() else {
        return error_response(StatusCode::BAD_REQUEST, "bad request", Some("missing file part `image`".to_string()));
    };

    let user = form.fields.remove("user").unwrap_or_default();
    let name = form.fields.remove("name").unwrap_or_default();
    let result = async {
        let key = object_key(&user, &name)?;
        state.objects.put(&key, data, STORED_CONTENT_TYPE).await?;
        Ok::<_, StoreError>(key)
    }
    .await;

    match result {
        Ok(key) => {
            tracing::info!(key = %key, "Object stored");
            Json(serde_json::json!({"status": "success"})).into_response()
        }
        Err(e) => e.into_response(),
    }
}

pub async fn delete_image(
    State(state): State<AppState>,
    body: Result<Json<DeleteBody>, JsonRejection>,
) -> Response {
    let Json(body) = match body {
        Ok(body) => body,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, "cannot delete", Some(e.body_text())),
    };

    let result = async {
        let key = object_key(&body.user, &body.name)?;
        state.objects.delete(&key).await?;
        Ok::<_, StoreError>(key)
    }
    .await;

    match result {
        Ok(key) => {
            tracing::info!(key = %key, "Object deleted");
            Json(serde_json::json!({"status": "success"})).into_response()
        }
        Err(e) => e.into_response(),
    }
}
