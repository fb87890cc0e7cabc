//! Vision model backed by the OpenAI Chat Completions API.
//!
//! The photo is inlined as a base64 `data:` URL in an `image_url` content
//! part, and the diagnosis is read from `choices[0].message.content`.

use crate::{
    config::{Prompt, RelayConfig},
    error::UpstreamError,
    model::{AnalysisRequest, Diagnosis, VisionModel},
};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize};

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
#[serde(tag = "role", rename_all = "lowercase")]
enum ChatMessage<'a> {
    System { content: &'a str },
    User { content: Vec<ContentPart<'a>> },
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart<'a> {
    Text { text: &'a str },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Deserialize)]
struct ChatCompletion {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: CompletionMessage,
}

#[derive(Deserialize)]
struct CompletionMessage {
    content: Option<String>,
}

/// Builds the `data:` URL the model receives in place of a hosted image.
pub fn data_url(request: &AnalysisRequest) -> String {
    format!(
        "data:{};base64,{}",
        request.mime.as_str(),
        STANDARD.encode(&request.image)
    )
}

pub struct OpenAiVisionModel {
    http: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    model: String,
    prompt: Prompt,
}

impl OpenAiVisionModel {
    pub fn new(config: &RelayConfig) -> Self {
        let endpoint = format!(
            "{}/chat/completions",
            config.openai_base_url.trim_end_matches('/')
        );
        log::info!("Vision model {} at {endpoint}", config.openai_model);

        Self {
            http: reqwest::Client::new(),
            endpoint,
            api_key: config.api_key.clone(),
            model: config.openai_model.clone(),
            prompt: config.prompt.clone(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl VisionModel for OpenAiVisionModel {
    type Error = UpstreamError;

    async fn diagnose(&self, request: AnalysisRequest) -> Result<Diagnosis, Self::Error> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(UpstreamError::MissingCredential)?;

        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage::System {
                    content: &self.prompt.system,
                },
                ChatMessage::User {
                    content: vec![
                        ContentPart::Text {
                            text: &self.prompt.user,
                        },
                        ContentPart::ImageUrl {
                            image_url: ImageUrl {
                                url: data_url(&request),
                            },
                        },
                    ],
                },
            ],
        };

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(UpstreamError::Status { status, body: text });
        }

        let completion: ChatCompletion = serde_json::from_str(&text)?;
        completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|text| Diagnosis { text })
            .ok_or(UpstreamError::EmptyCompletion)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Bytes;
    use serde_json::{Value, json};
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(server: &MockServer, api_key: Option<&str>) -> RelayConfig {
        RelayConfig {
            api_key: api_key.map(str::to_string),
            openai_base_url: format!("{}/v1/", server.uri()),
            ..RelayConfig::default()
        }
    }

    fn completion(content: &str) -> Value {
        json!({
            "id": "chatcmpl-123",
            "object": "chat.completion",
            "model": "gpt-4o-mini",
            "choices": [{
                "index": 0,
                "message": { "role": "assistant", "content": content },
                "finish_reason": "stop"
            }]
        })
    }

    #[test]
    fn data_url_embeds_mime_and_base64() {
        let request = AnalysisRequest::new(Bytes::from_static(b"hello"), Some("plug.png".into()));
        assert_eq!(data_url(&request), "data:image/png;base64,aGVsbG8=");
    }

    #[tokio::test]
    async fn returns_completion_text_unmodified() {
        let server = MockServer::start().await;
        let diagnosis = "  Carbon fouling: the mixture is running rich.\n";
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion(diagnosis)))
            .expect(1)
            .mount(&server)
            .await;

        let model = OpenAiVisionModel::new(&config_for(&server, Some("sk-test")));
        let result = model
            .diagnose(AnalysisRequest::new(
                Bytes::from_static(&[0xff, 0xd8, 0xff]),
                Some("plug.jpg".into()),
            ))
            .await
            .unwrap();

        assert_eq!(result.text, diagnosis);
    }

    #[tokio::test]
    async fn sends_prompt_and_inline_image() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion("ok")))
            .mount(&server)
            .await;

        let model = OpenAiVisionModel::new(&config_for(&server, Some("sk-test")));
        model
            .diagnose(AnalysisRequest::new(Bytes::from_static(b"abc"), None))
            .await
            .unwrap();

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 1);
        let body: Value = serde_json::from_slice(&requests[0].body).unwrap();

        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][0]["content"], Prompt::default().system);
        assert_eq!(body["messages"][1]["role"], "user");
        assert_eq!(body["messages"][1]["content"][0]["type"], "text");
        assert_eq!(body["messages"][1]["content"][0]["text"], Prompt::default().user);
        assert_eq!(body["messages"][1]["content"][1]["type"], "image_url");
        assert_eq!(
            body["messages"][1]["content"][1]["image_url"]["url"],
            "data:image/jpeg;base64,YWJj"
        );
    }

    #[tokio::test]
    async fn missing_credential_skips_network() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion("ok")))
            .expect(0)
            .mount(&server)
            .await;

        let model = OpenAiVisionModel::new(&config_for(&server, None));
        let err = model
            .diagnose(AnalysisRequest::new(Bytes::from_static(b"abc"), None))
            .await
            .unwrap_err();

        assert!(matches!(err, UpstreamError::MissingCredential));
    }

    #[tokio::test]
    async fn non_success_status_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(401)
                    .set_body_json(json!({ "error": { "message": "Incorrect API key" } })),
            )
            .mount(&server)
            .await;

        let model = OpenAiVisionModel::new(&config_for(&server, Some("sk-bad")));
        let err = model
            .diagnose(AnalysisRequest::new(Bytes::from_static(b"abc"), None))
            .await
            .unwrap_err();

        match err {
            UpstreamError::Status { status, body } => {
                assert_eq!(status, reqwest::StatusCode::UNAUTHORIZED);
                assert!(body.contains("Incorrect API key"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn empty_choices_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "choices": [] })))
            .mount(&server)
            .await;

        let model = OpenAiVisionModel::new(&config_for(&server, Some("sk-test")));
        let err = model
            .diagnose(AnalysisRequest::new(Bytes::from_static(b"abc"), None))
            .await
            .unwrap_err();

        assert!(matches!(err, UpstreamError::EmptyCompletion));
    }

    #[tokio::test]
    async fn malformed_body_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let model = OpenAiVisionModel::new(&config_for(&server, Some("sk-test")));
        let err = model
            .diagnose(AnalysisRequest::new(Bytes::from_static(b"abc"), None))
            .await
            .unwrap_err();

        assert!(matches!(err, UpstreamError::Decode(_)));
    }

    #[test]
    fn endpoint_trims_trailing_slash() {
        let config = RelayConfig {
            openai_base_url: "http://localhost:1234/v1/".into(),
            ..RelayConfig::default()
        };
        let model = OpenAiVisionModel::new(&config);
        assert_eq!(model.endpoint(), "http://localhost:1234/v1/chat/completions");
    }
}
