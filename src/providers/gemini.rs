use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::backend::{AnalysisBackend, GenerationBackend};
use crate::detect;
use crate::registry::ProviderId;
use crate::types::{DetectedObject, GenerationRequest, ImageSource};
use crate::utils::http::{check_status, default_http_client};
use crate::{GatewayError, Result};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Gemini `generateContent` family: multimodal content parts with
/// vendor-specific `inlineData` image encoding, authenticated via the
/// `x-goog-api-key` header. Produces an image when the request declares
/// image response modalities.
#[derive(Clone)]
pub struct Gemini {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl Gemini {
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

    fn generate_url(&self, model: &str) -> String {
        let base = self.base_url.trim_end_matches('/');
        let model = model.trim();
        let path = if model.starts_with("models/") {
            model.to_string()
        } else {
            format!("models/{model}")
        };
        format!("{base}/{path}:generateContent")
    }

    fn image_part(source: &ImageSource) -> Value {
        match source {
            ImageSource::Base64 { media_type, data } => json!({
                "inlineData": { "mimeType": media_type, "data": data }
            }),
            ImageSource::Url { url } => json!({
                "fileData": { "mimeType": "image/jpeg", "fileUri": url }
            }),
        }
    }

    async fn generate_content(&self, model: &str, body: Value) -> Result<GenerateContentResponse> {
        let response = self
            .http
            .post(self.generate_url(model))
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;
        let response = check_status(response).await?;
        Ok(response.json::<GenerateContentResponse>().await?)
    }
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

impl GenerateContentResponse {
    fn parts(&self) -> &[CandidatePart] {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|c| c.parts.as_slice())
            .unwrap_or_default()
    }
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    inline_data: Option<InlineData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    #[serde(default)]
    mime_type: Option<String>,
    data: String,
}

#[async_trait]
impl GenerationBackend for Gemini {
    fn provider(&self) -> ProviderId {
        ProviderId::Gemini
    }

    async fn generate(&self, request: &GenerationRequest, model: &str) -> Result<ImageSource> {
        let mut parts = vec![json!({ "text": request.prompt })];
        if let Some(source) = &request.source_image {
            parts.push(Self::image_part(source));
        }
        // Gemini conditions edits on the inline source image alone; there
        // is no strength parameter on this endpoint.
        let body = json!({
            "contents": [{ "role": "user", "parts": parts }],
            "generationConfig": { "responseModalities": ["TEXT", "IMAGE"] }
        });

        let parsed = self.generate_content(model, body).await?;
        for part in parsed.parts() {
            if let Some(inline) = &part.inline_data {
                if !inline.data.trim().is_empty() {
                    return Ok(ImageSource::Base64 {
                        media_type: inline
                            .mime_type
                            .clone()
                            .unwrap_or_else(|| "image/png".to_string()),
                        data: inline.data.clone(),
                    });
                }
            }
        }
        Err(GatewayError::InvalidResponse(
            "no image part in gemini candidate".to_string(),
        ))
    }
}

#[async_trait]
impl AnalysisBackend for Gemini {
    fn provider(&self) -> ProviderId {
        ProviderId::Gemini
    }

    async fn analyze(&self, image: &ImageSource, model: &str) -> Result<Vec<DetectedObject>> {
        let body = json!({
            "contents": [{
                "role": "user",
                "parts": [
                    { "text": detect::ANALYSIS_PROMPT },
                    Self::image_part(image)
                ]
            }]
        });

        let parsed = self.generate_content(model, body).await?;
        let mut reply = String::new();
        for part in parsed.parts() {
            if let Some(text) = &part.text {
                reply.push_str(text);
            }
        }
        Ok(detect::detections_or_fallback("gemini", &reply))
    }
}
