use crate::messages::ErrorResponse;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

pub const NO_FILE_UPLOADED: &str = "No file uploaded";

/// Errors raised inside the relay handlers, converted to JSON at the boundary.
#[derive(Error, Debug)]
pub enum RelayError {
    /// The request carried no `photo` file.
    #[error("{}", NO_FILE_UPLOADED)]
    NoFileUploaded,

    /// The multipart body could not be read off the wire.
    #[error("Failed to read upload: {message}")]
    Upload { status: StatusCode, message: String },

    /// The vision model failed to produce a diagnosis.
    #[error("{0}")]
    Upstream(Box<dyn std::error::Error + Send + Sync>),
}

impl RelayError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            RelayError::NoFileUploaded => StatusCode::BAD_REQUEST,
            RelayError::Upload { status, .. } => *status,
            RelayError::Upstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// Failures talking to the OpenAI-compatible completion API.
#[derive(Error, Debug)]
pub enum UpstreamError {
    #[error("OPENAI_API_KEY is not set")]
    MissingCredential,

    #[error("Request to vision model failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Vision model returned HTTP {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("Vision model returned an unreadable response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Vision model returned no text")]
    EmptyCompletion,
}

/// Startup configuration problems. All of them are fatal.
#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("PORT must be set in this environment")]
    MissingPort,

    #[error("Invalid {name} value {value:?}")]
    InvalidNumber { name: &'static str, value: String },
}

/// Failures uploading a photo from the capture client to the relay.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Could not read photo: {0}")]
    Io(#[from] std::io::Error),

    #[error("Upload failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Relay returned HTTP {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
}

/// Failures from the camera itself, as opposed to a user cancelling.
#[derive(Error, Debug)]
#[error("Camera failed: {0}")]
pub struct CaptureError(pub String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes() {
        assert_eq!(RelayError::NoFileUploaded.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            RelayError::Upload {
                status: StatusCode::PAYLOAD_TOO_LARGE,
                message: "length limit exceeded".into(),
            }
            .status_code(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(
            RelayError::Upstream(Box::new(UpstreamError::EmptyCompletion)).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn no_file_message_matches_wire_text() {
        assert_eq!(RelayError::NoFileUploaded.to_string(), NO_FILE_UPLOADED);
    }

    #[test]
    fn upstream_message_is_surfaced() {
        let err = RelayError::Upstream(Box::new(UpstreamError::MissingCredential));
        assert_eq!(err.to_string(), "OPENAI_API_KEY is not set");
    }
}
