//! Spark plug photo relay.
//!
//! A small axum service that accepts a single multipart photo upload, forwards
//! it with a fixed instruction prompt to a vision-capable language model, and
//! returns the model's diagnosis as JSON. The [`capture`] module holds the
//! client side of the same round trip.

pub mod capture;
pub mod config;
pub mod error;
pub mod messages;
pub mod model;
pub mod openai;
pub mod server;

pub use config::{Prompt, RelayConfig};
pub use error::{CaptureError, ClientError, ConfigError, RelayError, UpstreamError};
pub use messages::{AnalyzeResponse, ErrorResponse};
pub use model::{AnalysisMetadata, AnalysisRequest, Diagnosis, ImageMime, VisionModel};
pub use openai::OpenAiVisionModel;
pub use server::{AppState, router, serve};
