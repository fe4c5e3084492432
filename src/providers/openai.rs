use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::backend::{AnalysisBackend, GenerationBackend};
use crate::detect;
use crate::registry::ProviderId;
use crate::types::{DetectedObject, GenerationRequest, ImageSource};
use crate::utils::http::{check_status, default_http_client, join_endpoint};
use crate::{GatewayError, Result};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Direct image-generation REST family. `images/generations` takes a flat
/// prompt-and-size body and has no true edit mode; analysis rides the
/// chat-completions endpoint with a vision message.
#[derive(Clone)]
pub struct OpenAi {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl OpenAi {
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

    /// This family cannot condition on a source image, so an edit request
    /// degrades to an elaborated text prompt. Known limitation of the
    /// provider, not of the gateway.
    fn effective_prompt(request: &GenerationRequest) -> String {
        if request.source_image.is_none() {
            return request.prompt.clone();
        }
        format!(
            "Photorealistic interior rendering of an existing room after this renovation: \
{}. Keep the room's layout, camera angle and architectural structure plausible \
for a lived-in home.",
            request.prompt
        )
    }
}

#[derive(Debug, Deserialize)]
struct ImagesGenerationResponse {
    #[serde(default)]
    data: Vec<ImageGenerationData>,
}

#[derive(Debug, Deserialize)]
struct ImageGenerationData {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    b64_json: Option<String>,
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
    content: Option<String>,
}

#[async_trait]
impl GenerationBackend for OpenAi {
    fn provider(&self) -> ProviderId {
        ProviderId::OpenAi
    }

    async fn generate(&self, request: &GenerationRequest, model: &str) -> Result<ImageSource> {
        let body = json!({
            "model": model,
            "prompt": Self::effective_prompt(request),
            "n": 1,
            "size": format!("{}x{}", request.width, request.height),
        });

        let url = join_endpoint(&self.base_url, "images/generations");
        let response = self
            .http
            .post(url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;
        let response = check_status(response).await?;
        let parsed = response.json::<ImagesGenerationResponse>().await?;

        let Some(item) = parsed.data.first() else {
            return Err(GatewayError::InvalidResponse(
                "images response has no data items".to_string(),
            ));
        };
        if let Some(url) = item.url.as_deref().filter(|v| !v.trim().is_empty()) {
            return Ok(ImageSource::Url {
                url: url.to_string(),
            });
        }
        if let Some(data) = item.b64_json.as_deref().filter(|v| !v.trim().is_empty()) {
            return Ok(ImageSource::Base64 {
                media_type: "image/png".to_string(),
                data: data.to_string(),
            });
        }
        Err(GatewayError::InvalidResponse(
            "image item is missing both url and b64_json".to_string(),
        ))
    }
}

#[async_trait]
impl AnalysisBackend for OpenAi {
    fn provider(&self) -> ProviderId {
        ProviderId::OpenAi
    }

    async fn analyze(&self, image: &ImageSource, model: &str) -> Result<Vec<DetectedObject>> {
        let body = json!({
            "model": model,
            "messages": [{
                "role": "user",
                "content": [
                    { "type": "text", "text": detect::ANALYSIS_PROMPT },
                    { "type": "image_url", "image_url": { "url": image.to_display_string() } },
                ]
            }],
            "max_tokens": 800,
        });

        let url = join_endpoint(&self.base_url, "chat/completions");
        let response = self
            .http
            .post(url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;
        let response = check_status(response).await?;
        let parsed = response.json::<ChatCompletionResponse>().await?;

        let reply = parsed
            .choices
            .first()
            .and_then(|choice| choice.message.as_ref())
            .and_then(|message| message.content.clone())
            .unwrap_or_default();
        Ok(detect::detections_or_fallback("openai", &reply))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method::POST, MockServer};

    #[tokio::test]
    async fn generate_prefers_hosted_url() -> Result<()> {
        if crate::utils::test_support::should_skip_httpmock() {
            return Ok(());
        }
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1/images/generations")
                    .header("authorization", "Bearer sk-test")
                    .body_includes("\"model\":\"dall-e-3\"")
                    .body_includes("\"size\":\"1024x1024\"");
                then.status(200)
                    .header("content-type", "application/json")
                    .body(
                        json!({
                            "data": [{ "url": "https://cdn.example.com/after.png" }]
                        })
                        .to_string(),
                    );
            })
            .await;

        let client = OpenAi::new("sk-test").with_base_url(server.url("/v1"));
        let request = GenerationRequest {
            prompt: "industrial loft kitchen".to_string(),
            source_image: None,
            strength: None,
            width: 1024,
            height: 1024,
            provider: ProviderId::OpenAi,
            model: None,
        };
        let image = client.generate(&request, "dall-e-3").await?;

        mock.assert_async().await;
        assert_eq!(
            image,
            ImageSource::Url {
                url: "https://cdn.example.com/after.png".to_string(),
            }
        );
        Ok(())
    }

    #[tokio::test]
    async fn edit_request_folds_intent_into_prompt_without_image_field() -> Result<()> {
        if crate::utils::test_support::should_skip_httpmock() {
            return Ok(());
        }
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1/images/generations")
                    .body_includes("after this renovation: paint walls sage green")
                    .body_excludes("\"image\"");
                then.status(200)
                    .header("content-type", "application/json")
                    .body(json!({ "data": [{ "b64_json": "aWMK" }] }).to_string());
            })
            .await;

        let client = OpenAi::new("sk-test").with_base_url(server.url("/v1"));
        let request = GenerationRequest {
            prompt: "paint walls sage green".to_string(),
            source_image: Some(ImageSource::Base64 {
                media_type: "image/jpeg".to_string(),
                data: "aWMK".to_string(),
            }),
            strength: Some(0.4),
            width: 1024,
            height: 1024,
            provider: ProviderId::OpenAi,
            model: None,
        };
        let image = client.generate(&request, "gpt-image-1").await?;

        mock.assert_async().await;
        assert_eq!(
            image,
            ImageSource::Base64 {
                media_type: "image/png".to_string(),
                data: "aWMK".to_string(),
            }
        );
        Ok(())
    }

    #[tokio::test]
    async fn analyze_extracts_json_from_chat_reply() -> Result<()> {
        if crate::utils::test_support::should_skip_httpmock() {
            return Ok(());
        }
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1/chat/completions")
                    .body_includes("\"image_url\"");
                then.status(200)
                    .header("content-type", "application/json")
                    .body(
                        json!({
                            "choices": [{
                                "message": {
                                    "content": "{\"objects\": [{\"name\": \"countertop\", \"confidence\": 0.9, \"location\": \"kitchen island\", \"estimated_cost\": \"$2,000-5,000\"}]}"
                                }
                            }]
                        })
                        .to_string(),
                    );
            })
            .await;

        let client = OpenAi::new("sk-test").with_base_url(server.url("/v1"));
        let image = ImageSource::Url {
            url: "https://example.com/kitchen.jpg".to_string(),
        };
        let objects = client.analyze(&image, "gpt-4o-mini").await?;
        assert_eq!(objects.len(), 1);
        assert_eq!(objects[0].estimated_cost.as_deref(), Some("$2,000-5,000"));
        Ok(())
    }
}
