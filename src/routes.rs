use axum::{
    extract::{DefaultBodyLimit, Path, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use base64::Engine;
use bytes::Bytes;
use image::ImageFormat;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::{Any, CorsLayer}, trace::TraceLayer};

use crate::{
    error::OrchestratorError,
    i18n::{translation, Language, Translation},
    models::{LanguageSetting, SnapshotResponse, SourceImage, StyleSummary, SubmitRequest, TaskView},
    orchestrator::Orchestrator,
    store::TaskState,
};

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    /// Largest accepted request body; submissions carry the photo inline.
    pub max_upload_bytes: usize,
}

pub fn router(state: AppState) -> Router {
    let body_limit = state.max_upload_bytes;
    Router::new()
        .route("/api/styles", get(list_styles))
        .route("/api/i18n/:lang", get(get_translation))
        .route("/api/language", get(get_language).put(set_language))
        .route("/api/portraits", post(submit_portraits).get(get_portraits))
        .route("/api/portraits/:style_id/retry", post(retry_portrait))
        .route("/api/portraits/:style_id/download", get(download_portrait))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(DefaultBodyLimit::max(body_limit))
                .layer(
                    CorsLayer::new()
                        .allow_origin(Any)
                        .allow_methods(Any)
                        .allow_headers(Any)
                ),
        )
        .with_state(state)
}

fn snapshot_response(orchestrator: &Orchestrator) -> SnapshotResponse {
    let language = orchestrator.language();
    orchestrator.inspect(|store| SnapshotResponse {
        session_id: store.session_id(),
        phase: store.phase(),
        language,
        tasks: store.snapshot().iter().map(TaskView::from).collect(),
    })
}

pub async fn list_styles(State(state): State<AppState>) -> Json<Vec<StyleSummary>> {
    let styles = state.orchestrator.catalog().list().iter().map(|s| StyleSummary {
        id: s.id.clone(),
        name_en: s.name_en.clone(),
        name_cn: s.name_cn.clone(),
        icon: s.icon.clone(),
    }).collect();
    Json(styles)
}

pub async fn get_translation(Path(lang): Path<String>) -> Result<Json<&'static Translation>, StatusCode> {
    let language: Language = lang.parse().map_err(|_| StatusCode::NOT_FOUND)?;
    Ok(Json(translation(language)))
}

pub async fn get_language(State(state): State<AppState>) -> Json<LanguageSetting> {
    Json(LanguageSetting { language: state.orchestrator.language() })
}

pub async fn set_language(State(state): State<AppState>, Json(body): Json<LanguageSetting>) -> Json<LanguageSetting> {
    state.orchestrator.set_language(body.language);
    Json(body)
}

pub async fn submit_portraits(
    State(state): State<AppState>,
    Json(body): Json<SubmitRequest>,
) -> Result<(StatusCode, Json<SnapshotResponse>), OrchestratorError> {
    let source = SourceImage::from_upload(&body.image, body.mime_type.as_deref())?;
    if let Some(language) = body.language {
        state.orchestrator.set_language(language);
    }
    tracing::info!("📷 Received source image ({} bytes, {})", source.data().len(), source.mime_type());
    state.orchestrator.submit(source)?;
    Ok((StatusCode::ACCEPTED, Json(snapshot_response(&state.orchestrator))))
}

pub async fn get_portraits(State(state): State<AppState>) -> Json<SnapshotResponse> {
    Json(snapshot_response(&state.orchestrator))
}

pub async fn retry_portrait(
    Path(style_id): Path<String>,
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<SnapshotResponse>), StatusCode> {
    if !state.orchestrator.retry(&style_id) {
        return Err(StatusCode::NOT_FOUND);
    }
    Ok((StatusCode::ACCEPTED, Json(snapshot_response(&state.orchestrator))))
}

pub async fn download_portrait(Path(style_id): Path<String>, State(state): State<AppState>) -> Response {
    let image = match state.orchestrator.task(&style_id).map(|t| t.state) {
        Some(TaskState::Succeeded(image)) => image,
        _ => return StatusCode::NOT_FOUND.into_response(),
    };
    match portrait_attachment(&style_id, &image) {
        Some((headers, body)) => (StatusCode::OK, headers, body).into_response(),
        None => {
            tracing::error!("❌ Stored image for '{}' could not be decoded", style_id);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Decodes a stored portrait into file bytes plus the headers that make the
/// browser save it as `portrait-<style>.<ext>`.
fn portrait_attachment(style_id: &str, image_b64: &str) -> Option<(HeaderMap, Bytes)> {
    let bytes = base64::engine::general_purpose::STANDARD.decode(image_b64).ok()?;
    let format = image::guess_format(&bytes).unwrap_or(ImageFormat::Png);
    let ext = format.extensions_str().first().copied().unwrap_or("png");

    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(format.to_mime_type()));
    let disposition = format!("attachment; filename=\"portrait-{}.{}\"", style_id, ext);
    headers.insert(header::CONTENT_DISPOSITION, HeaderValue::from_str(&disposition).ok()?);
    Some((headers, Bytes::from(bytes)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        orchestrator::testing::{eventually, ScriptedClient},
        models::TaskStatus,
        store::SessionPhase,
        styles::StyleCatalog,
    };
    use crate::config::DEFAULT_MAX_UPLOAD_BYTES;
    use axum::body::Body;
    use axum::http::Request;
    use pretty_assertions::assert_eq;
    use tower::ServiceExt;

    const PNG_B64: &str = "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNk+M9QDwADhgGAWjR9awAAAABJRU5ErkJggg==";

    fn app_state() -> (Arc<ScriptedClient>, AppState) {
        let client = Arc::new(ScriptedClient::default());
        let orchestrator = Orchestrator::new(StyleCatalog::builtin().unwrap(), client.clone(), Language::En);
        (client, AppState { orchestrator: Arc::new(orchestrator), max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES })
    }

    /// A JSON submission carrying `len` bytes of JPEG payload.
    fn photo_request(len: usize) -> Request<Body> {
        let mut bytes = vec![0u8; len];
        bytes[..3].copy_from_slice(&[0xFF, 0xD8, 0xFF]);
        let body = serde_json::json!({
            "image": base64::engine::general_purpose::STANDARD.encode(&bytes),
            "mime_type": "image/jpeg",
        });
        Request::builder()
            .method("POST")
            .uri("/api/portraits")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn upload(image: &str) -> SubmitRequest {
        SubmitRequest { image: image.to_string(), mime_type: Some("image/png".into()), language: None }
    }

    #[tokio::test]
    async fn submit_returns_pending_snapshot() {
        let (client, state) = app_state();
        let (status, Json(body)) = submit_portraits(State(state.clone()), Json(upload(PNG_B64))).await.unwrap();
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(body.tasks.len(), 6);
        assert!(body.tasks.iter().all(|t| t.state == TaskStatus::Pending));
        assert_eq!(body.phase, SessionPhase::Dispatching);
        assert!(body.session_id.is_some());
        client.take(6).await;
    }

    #[tokio::test]
    async fn router_accepts_multi_megabyte_photo() {
        let (client, state) = app_state();
        let app = router(state.clone());
        let response = app.oneshot(photo_request(3 * 1024 * 1024)).await.unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);

        let calls = client.take(6).await;
        assert!(calls.iter().all(|c| c.source_len == 3 * 1024 * 1024));
        assert_eq!(state.orchestrator.phase(), SessionPhase::Dispatching);
    }

    #[tokio::test]
    async fn router_rejects_body_over_configured_limit() {
        let (client, mut state) = app_state();
        state.max_upload_bytes = 1024 * 1024;
        let app = router(state.clone());
        let response = app.oneshot(photo_request(3 * 1024 * 1024)).await.unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(state.orchestrator.phase(), SessionPhase::Idle);
        assert_eq!(client.outstanding(), 0);
    }

    #[tokio::test]
    async fn submit_rejects_empty_image() {
        let (client, state) = app_state();
        let err = submit_portraits(State(state.clone()), Json(upload(""))).await.unwrap_err();
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
        let Json(body) = get_portraits(State(state)).await;
        assert!(body.tasks.is_empty());
        assert_eq!(body.phase, SessionPhase::Idle);
        assert_eq!(client.outstanding(), 0);
    }

    #[tokio::test]
    async fn submit_can_switch_language() {
        let (client, state) = app_state();
        let mut req = upload(PNG_B64);
        req.language = Some(Language::Cn);
        submit_portraits(State(state.clone()), Json(req)).await.unwrap();
        let Json(setting) = get_language(State(state)).await;
        assert_eq!(setting.language, Language::Cn);
        let calls = client.take(6).await;
        assert!(calls.iter().any(|c| c.instruction.starts_with("专业商务肖像风格")));
    }

    #[tokio::test]
    async fn retry_of_unknown_style_is_not_found() {
        let (_client, state) = app_state();
        let err = retry_portrait(Path("cyberpunk".into()), State(state.clone())).await.unwrap_err();
        assert_eq!(err, StatusCode::NOT_FOUND);
        let err = retry_portrait(Path("watercolor".into()), State(state)).await.unwrap_err();
        assert_eq!(err, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn download_serves_succeeded_portrait_only() {
        let (client, state) = app_state();
        submit_portraits(State(state.clone()), Json(upload(PNG_B64))).await.unwrap();
        let mut calls = client.take(6).await;
        let response = download_portrait(Path("professional".into()), State(state.clone())).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        for call in calls.drain(..) {
            call.succeed(PNG_B64);
        }
        eventually(|| state.orchestrator.phase() == SessionPhase::Settled).await;

        let response = download_portrait(Path("professional".into()), State(state)).await;
        assert_eq!(response.status(), StatusCode::OK);
        let headers = response.headers();
        assert_eq!(headers[header::CONTENT_TYPE], "image/png");
        assert_eq!(headers[header::CONTENT_DISPOSITION], "attachment; filename=\"portrait-professional.png\"");
    }

    #[test]
    fn attachment_falls_back_to_png_for_unknown_bytes() {
        let (headers, body) = portrait_attachment("oil", "AQID").unwrap();
        assert_eq!(body.as_ref(), &[1u8, 2, 3]);
        assert_eq!(headers[header::CONTENT_TYPE], "image/png");
        assert!(portrait_attachment("oil", "%%%").is_none());
    }

    #[tokio::test]
    async fn translation_and_styles_endpoints() {
        let Json(t) = get_translation(Path("en".into())).await.unwrap();
        assert_eq!(t.regenerate, "Regenerate");
        assert_eq!(get_translation(Path("xx".into())).await.unwrap_err(), StatusCode::NOT_FOUND);

        let (_client, state) = app_state();
        let Json(styles) = list_styles(State(state)).await;
        assert_eq!(styles.len(), 6);
        assert_eq!(styles[1].id, "cyberpunk");
        assert_eq!(styles[1].icon, "zap");
    }
}
