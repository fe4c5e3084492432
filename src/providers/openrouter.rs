use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::backend::{AnalysisBackend, GenerationBackend};
use crate::detect;
use crate::registry::ProviderId;
use crate::types::{DetectedObject, GenerationRequest, ImageSource};
use crate::utils::http::{check_status, default_http_client, join_endpoint};
use crate::{GatewayError, Result};

const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";

/// Chat-completion-shaped family: prompt and optional image travel as an
/// ordered list of content parts inside one user message, and the
/// `modalities` flag tells the model to reply with an embedded image.
#[derive(Clone)]
pub struct OpenRouter {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl OpenRouter {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            http: default_http_client(),
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    fn content_parts(prompt: &str, image: Option<&ImageSource>) -> Vec<Value> {
        let mut parts = vec![json!({ "type": "text", "text": prompt })];
        if let Some(source) = image {
            parts.push(json!({
                "type": "image_url",
                "image_url": { "url": source.to_display_string() }
            }));
        }
        parts
    }

    async fn chat_completion(&self, body: Value) -> Result<ChatCompletionResponse> {
        let url = join_endpoint(&self.base_url, "chat/completions");
        let response = self
            .http
            .post(url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;
        let response = check_status(response).await?;
        Ok(response.json::<ChatCompletionResponse>().await?)
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    #[serde(default)]
    message: Option<ChatMessage>,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<Value>,
    #[serde(default)]
    images: Vec<ChatImage>,
}

#[derive(Debug, Deserialize)]
struct ChatImage {
    #[serde(default)]
    image_url: Option<ChatImageUrl>,
}

#[derive(Debug, Deserialize)]
struct ChatImageUrl {
    url: String,
}

/// Completion content is usually a plain string, but some models echo the
/// content-part array back.
fn content_text(content: &Value) -> String {
    match content {
        Value::String(text) => text.clone(),
        Value::Array(parts) => parts
            .iter()
            .filter_map(|part| part.get("text").and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join(""),
        _ => String::new(),
    }
}

#[async_trait]
impl GenerationBackend for OpenRouter {
    fn provider(&self) -> ProviderId {
        ProviderId::OpenRouter
    }

    async fn generate(&self, request: &GenerationRequest, model: &str) -> Result<ImageSource> {
        let body = json!({
            "model": model,
            "messages": [{
                "role": "user",
                "content": Self::content_parts(&request.prompt, request.source_image.as_ref()),
            }],
            "modalities": ["image", "text"],
        });

        let parsed = self.chat_completion(body).await?;
        let message = parsed
            .choices
            .first()
            .and_then(|choice| choice.message.as_ref())
            .ok_or_else(|| {
                GatewayError::InvalidResponse("completion has no choices".to_string())
            })?;

        let image_url = message
            .images
            .iter()
            .find_map(|image| image.image_url.as_ref())
            .map(|image_url| image_url.url.as_str())
            .filter(|url| !url.trim().is_empty());

        match image_url {
            Some(url) => Ok(ImageSource::from_reference(url)),
            None => Err(GatewayError::InvalidResponse(
                "completion carried no image".to_string(),
            )),
        }
    }
}

#[async_trait]
impl AnalysisBackend for OpenRouter {
    fn provider(&self) -> ProviderId {
        ProviderId::OpenRouter
    }

    async fn analyze(&self, image: &ImageSource, model: &str) -> Result<Vec<DetectedObject>> {
        let body = json!({
            "model": model,
            "messages": [{
                "role": "user",
                "content": Self::content_parts(detect::ANALYSIS_PROMPT, Some(image)),
            }],
        });

        let parsed = self.chat_completion(body).await?;
        let reply = parsed
            .choices
            .first()
            .and_then(|choice| choice.message.as_ref())
            .and_then(|message| message.content.as_ref())
            .map(content_text)
            .unwrap_or_default();
        Ok(detect::detections_or_fallback("openrouter", &reply))
    }
}
