use serde::{Deserialize, Serialize};

/// Successful analysis, as returned by `POST /analyze-sparkplug`.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct AnalyzeResponse {
    pub text: String,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ErrorResponse {
    pub error: String,
}
