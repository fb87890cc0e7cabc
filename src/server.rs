use crate::{
    config::RelayConfig,
    error::RelayError,
    messages::AnalyzeResponse,
    model::{AnalysisRequest, VisionModel},
    openai::OpenAiVisionModel,
};
use axum::{
    Json, Router,
    extract::{
        DefaultBodyLimit, Multipart, State,
        multipart::{MultipartError, MultipartRejection},
    },
    routing::{get, post},
};
use std::{sync::Arc, time::Instant};
use tower_http::cors::CorsLayer;

pub const PHOTO_FIELD: &str = "photo";
pub const LIVENESS_MESSAGE: &str = "Spark plug relay is running";

/// Shared handler context. The model is built once and only ever read.
pub struct AppState<M: VisionModel> {
    pub model: Arc<M>,
    pub max_upload_bytes: Option<usize>,
}

impl<M: VisionModel> AppState<M> {
    pub fn new(model: M) -> Self {
        Self {
            model: Arc::new(model),
            max_upload_bytes: None,
        }
    }

    pub fn with_max_upload_bytes(mut self, limit: Option<usize>) -> Self {
        self.max_upload_bytes = limit;
        self
    }
}

impl<M: VisionModel> Clone for AppState<M> {
    fn clone(&self) -> Self {
        Self {
            model: self.model.clone(),
            max_upload_bytes: self.max_upload_bytes,
        }
    }
}

pub async fn liveness() -> &'static str {
    LIVENESS_MESSAGE
}

fn upload_error(e: MultipartError) -> RelayError {
    RelayError::Upload {
        status: e.status(),
        message: e.body_text(),
    }
}

/// Pulls the `photo` file out of the form, skipping every other field.
async fn read_photo(
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<AnalysisRequest, RelayError> {
    let mut multipart = multipart.map_err(|e| {
        log::warn!("Rejected non-multipart upload: {e}");
        RelayError::NoFileUploaded
    })?;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => return Err(RelayError::NoFileUploaded),
            Err(e) => return Err(upload_error(e)),
        };

        // Only parts carrying a filename count as files.
        let filename = match (field.name(), field.file_name()) {
            (Some(PHOTO_FIELD), Some(filename)) => filename.to_string(),
            (name, _) => {
                log::debug!("Skipping multipart field {name:?}");
                continue;
            }
        };

        let image = field.bytes().await.map_err(upload_error)?;

        return Ok(AnalysisRequest::new(image, Some(filename)));
    }
}

pub async fn analyze_sparkplug<M: VisionModel>(
    State(state): State<AppState<M>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<AnalyzeResponse>, RelayError> {
    let request = read_photo(multipart).await.inspect_err(|e| {
        log::warn!("Upload rejected: {e}");
    })?;

    let metadata = request.metadata();
    log::debug!(
        "Received {:?} ({}, {} bytes)",
        metadata.filename,
        metadata.mime.as_str(),
        metadata.size
    );

    let start_time = Instant::now();
    let diagnosis = state.model.diagnose(request).await.map_err(|e| {
        log::error!("Error analyzing spark plug: {e}");
        RelayError::Upstream(Box::new(e))
    })?;

    log::info!(
        "Analyzed {:?} ({} bytes) in {:?}",
        metadata.filename,
        metadata.size,
        start_time.elapsed()
    );

    Ok(Json(AnalyzeResponse {
        text: diagnosis.text,
    }))
}

/// Builds the relay routes around an already constructed model.
pub fn router<M: VisionModel>(state: AppState<M>) -> Router {
    let body_limit = match state.max_upload_bytes {
        Some(limit) => DefaultBodyLimit::max(limit),
        None => DefaultBodyLimit::disable(),
    };

    Router::new()
        .route("/", get(liveness))
        .route("/analyze-sparkplug", post(analyze_sparkplug::<M>))
        .layer(body_limit)
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Binds the configured address and serves until the process is stopped.
pub async fn serve(config: RelayConfig) -> std::io::Result<()> {
    let state = AppState::new(OpenAiVisionModel::new(&config))
        .with_max_upload_bytes(config.max_upload_bytes);
    let app = router(state);

    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    log::info!("🚀 Starting the relay");
    log::info!("🔥 Listening on: {}", addr);
    log::info!("🔧 Press Ctrl+C to stop the server");

    axum::serve(listener, app).await
}
