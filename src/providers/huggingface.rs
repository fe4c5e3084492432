use async_trait::async_trait;
use serde_json::{Value, json};

use crate::backend::GenerationBackend;
use crate::registry::ProviderId;
use crate::types::{GenerationRequest, ImageSource};
use crate::utils::data_uri;
use crate::utils::http::{check_status, default_http_client, read_image_bytes};
use crate::{GatewayError, Result};

const DEFAULT_BASE_URL: &str = "https://api-inference.huggingface.co";

/// Synchronous binary-blob family: the response body *is* the image bytes,
/// with no JSON envelope. Only a subset of hosted models accepts an input
/// image; the call is attempted either way and the remote API decides.
#[derive(Clone)]
pub struct HuggingFace {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HuggingFace {
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

    fn model_url(&self, model: &str) -> String {
        let base = self.base_url.trim_end_matches('/');
        format!("{base}/models/{model}")
    }

    fn build_body(request: &GenerationRequest) -> Value {
        match &request.source_image {
            Some(source) => {
                let image = match source {
                    ImageSource::Base64 { data, .. } => data.clone(),
                    ImageSource::Url { url } => url.clone(),
                };
                let mut parameters = serde_json::Map::new();
                if let Some(strength) = request.strength {
                    parameters.insert("strength".to_string(), json!(strength));
                }
                json!({
                    "inputs": { "prompt": request.prompt, "image": image },
                    "parameters": parameters,
                })
            }
            None => json!({
                "inputs": request.prompt,
                "parameters": { "width": request.width, "height": request.height },
            }),
        }
    }
}

#[async_trait]
impl GenerationBackend for HuggingFace {
    fn provider(&self) -> ProviderId {
        ProviderId::HuggingFace
    }

    async fn generate(&self, request: &GenerationRequest, model: &str) -> Result<ImageSource> {
        let response = self
            .http
            .post(self.model_url(model))
            .bearer_auth(&self.api_key)
            .json(&Self::build_body(request))
            .send()
            .await?;
        let response = check_status(response).await?;

        let media_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
            .unwrap_or_else(|| "image/png".to_string());

        // A 2xx with a JSON body means the model answered with an error
        // envelope instead of pixels.
        if media_type.starts_with("application/json") {
            let body = crate::utils::http::read_text_truncated(response, 4 * 1024).await;
            return Err(GatewayError::InvalidResponse(format!(
                "expected image bytes, got json: {body}"
            )));
        }

        let bytes = read_image_bytes(response).await?;
        if bytes.is_empty() {
            return Err(GatewayError::InvalidResponse(
                "empty image body".to_string(),
            ));
        }
        Ok(ImageSource::Base64 {
            media_type,
            data: data_uri::encode_bytes(&bytes),
        })
    }
}
