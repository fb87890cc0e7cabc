//! Capture client: take a photo, upload it to the relay, show the diagnosis.
//!
//! The platform pieces (camera, alert dialogs) sit behind traits so the same
//! workflow drives the command-line client and the tests.

use crate::{
    error::{CaptureError, ClientError},
    model::ImageMime,
};
use serde::Deserialize;
use std::{future::Future, path::PathBuf};

pub const NO_DIAGNOSIS: &str = "No diagnosis returned.";
pub const DEFAULT_PHOTO_NAME: &str = "photo.jpg";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Permission {
    Granted,
    Denied,
}

/// A photo taken by the camera, stored locally.
#[derive(Clone, Debug, PartialEq)]
pub struct CapturedPhoto {
    pub path: PathBuf,
}

impl CapturedPhoto {
    /// Name sent with the upload: the last path segment, or a JPEG default.
    pub fn filename(&self) -> String {
        self.path
            .file_name()
            .and_then(|name| name.to_str())
            .filter(|name| !name.is_empty())
            .unwrap_or(DEFAULT_PHOTO_NAME)
            .to_string()
    }

    pub fn mime(&self) -> ImageMime {
        ImageMime::from_filename(Some(&self.filename()))
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Capture {
    Cancelled,
    Photo(CapturedPhoto),
}

pub trait Camera {
    fn request_permission(&mut self) -> impl Future<Output = Permission> + Send;

    fn capture(&mut self) -> impl Future<Output = Result<Capture, CaptureError>> + Send;
}

/// Something that can turn a photo into diagnosis text.
pub trait DiagnosisService {
    fn diagnose(
        &self,
        photo: &CapturedPhoto,
    ) -> impl Future<Output = Result<String, ClientError>> + Send;
}

/// User-visible alert sink.
pub trait Notifier {
    fn alert(&mut self, title: &str, message: &str);
}

/// What the screen currently shows.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ScreenState {
    pub preview: Option<PathBuf>,
    pub diagnosis: Option<String>,
    pub loading: bool,
}

pub struct CaptureScreen<C, S, N> {
    camera: C,
    service: S,
    notifier: N,
    state: ScreenState,
}

impl<C: Camera, S: DiagnosisService, N: Notifier> CaptureScreen<C, S, N> {
    pub fn new(camera: C, service: S, notifier: N) -> Self {
        Self {
            camera,
            service,
            notifier,
            state: ScreenState::default(),
        }
    }

    pub fn state(&self) -> &ScreenState {
        &self.state
    }

    /// Runs one capture-and-diagnose round trip.
    pub async fn take_picture(&mut self) {
        if self.camera.request_permission().await == Permission::Denied {
            self.notifier.alert(
                "Permission required",
                "Camera permission is required to take a picture.",
            );
            return;
        }

        let photo = match self.camera.capture().await {
            Ok(Capture::Photo(photo)) => photo,
            Ok(Capture::Cancelled) => {
                log::debug!("Capture cancelled");
                return;
            }
            Err(e) => {
                log::error!("{e}");
                self.notifier
                    .alert("Error", "Something went wrong while taking the photo.");
                return;
            }
        };

        self.state.preview = Some(photo.path.clone());
        self.state.diagnosis = None;
        self.upload(&photo).await;
    }

    async fn upload(&mut self, photo: &CapturedPhoto) {
        self.state.loading = true;
        self.state.diagnosis = None;

        match self.service.diagnose(photo).await {
            Ok(text) => self.state.diagnosis = Some(text),
            Err(e) => {
                log::error!("Upload of {} failed: {e}", photo.path.display());
                self.notifier.alert(
                    "Upload failed",
                    "Could not upload the photo or get a diagnosis. \
                     Make sure your backend is running and reachable.",
                );
            }
        }

        self.state.loading = false;
    }
}

#[derive(Deserialize)]
struct RelayReply {
    text: Option<String>,
}

/// HTTP client for a running relay.
#[derive(Clone)]
pub struct RelayClient {
    http: reqwest::Client,
    base_url: String,
}

impl RelayClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Returns the relay's liveness string.
    pub async fn health(&self) -> Result<String, ClientError> {
        let response = self.http.get(format!("{}/", self.base_url)).send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(ClientError::Status { status, body });
        }
        Ok(body)
    }
}

impl DiagnosisService for RelayClient {
    async fn diagnose(&self, photo: &CapturedPhoto) -> Result<String, ClientError> {
        let bytes = tokio::fs::read(&photo.path).await?;
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(photo.filename())
            .mime_str(photo.mime().as_str())?;
        let form = reqwest::multipart::Form::new().part("photo", part);

        let response = self
            .http
            .post(format!("{}/analyze-sparkplug", self.base_url))
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await?;
            log::error!("Backend error {status}: {body}");
            return Err(ClientError::Status { status, body });
        }

        let reply: RelayReply = response.json().await?;
        Ok(reply.text.unwrap_or_else(|| NO_DIAGNOSIS.to_string()))
    }
}
