use axum::body::Bytes;
use std::future::Future;

/// Image encodings the relay labels uploads with.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImageMime {
    Jpeg,
    Png,
}

impl ImageMime {
    /// Infers the MIME type from a filename. Anything that is not a `.png` is
    /// treated as JPEG, including a missing filename.
    pub fn from_filename(filename: Option<&str>) -> Self {
        let extension = filename
            .and_then(|name| name.rsplit_once('.'))
            .map(|(_, ext)| ext);

        match extension {
            Some(ext) if ext.eq_ignore_ascii_case("png") => ImageMime::Png,
            _ => ImageMime::Jpeg,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ImageMime::Jpeg => "image/jpeg",
            ImageMime::Png => "image/png",
        }
    }
}

/// A single uploaded photo, alive only for the duration of one HTTP call.
pub struct AnalysisRequest {
    /// Raw upload bytes, forwarded as-is.
    pub image: Bytes,
    /// Filename reported by the client, if any.
    pub filename: Option<String>,
    pub mime: ImageMime,
}

/// Lightweight description of a request, safe to log without touching the image.
#[derive(Clone, Debug, PartialEq)]
pub struct AnalysisMetadata {
    pub filename: Option<String>,
    pub mime: ImageMime,
    pub size: usize,
}

impl AnalysisRequest {
    pub fn new(image: Bytes, filename: Option<String>) -> Self {
        let mime = ImageMime::from_filename(filename.as_deref());
        Self {
            image,
            filename,
            mime,
        }
    }

    /// Extracts the request metadata without cloning the image.
    pub fn metadata(&self) -> AnalysisMetadata {
        AnalysisMetadata {
            filename: self.filename.clone(),
            mime: self.mime,
            size: self.image.len(),
        }
    }
}

/// The model's textual verdict on the photo.
#[derive(Clone, Debug, PartialEq)]
pub struct Diagnosis {
    pub text: String,
}

/// Trait for the external vision model the relay forwards photos to.
///
/// Implementations are constructed once at startup and shared by every
/// request handler, so they take `&self` and must be thread-safe.
pub trait VisionModel: Send + Sync + 'static {
    /// The error type returned when the model cannot produce a diagnosis.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Sends the photo to the model and waits for its diagnosis.
    fn diagnose(
        &self,
        request: AnalysisRequest,
    ) -> impl Future<Output = Result<Diagnosis, Self::Error>> + Send;
}
