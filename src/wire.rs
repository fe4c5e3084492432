use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::registry::ProviderId;
use crate::types::{
    AnalysisRequest, DetectedObject, Failure, FailureKind, GatewayResult, GenerationRequest,
    ImageSource,
};

fn default_dimension() -> u32 {
    1024
}

/// Inbound generation body as the UI-facing edge layer sends it.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationPayload {
    pub prompt: String,
    #[serde(default)]
    pub original_image: Option<String>,
    #[serde(default)]
    pub selected_provider: Option<String>,
    #[serde(default)]
    pub selected_model: Option<String>,
    #[serde(default = "default_dimension")]
    pub width: u32,
    #[serde(default = "default_dimension")]
    pub height: u32,
    #[serde(default)]
    pub strength: Option<f32>,
}

impl GenerationPayload {
    pub fn into_request(
        self,
        default_provider: ProviderId,
    ) -> Result<GenerationRequest, Failure> {
        let provider = resolve_provider(self.selected_provider.as_deref(), default_provider)?;
        let source_image = self
            .original_image
            .as_deref()
            .map(str::trim)
            .filter(|reference| !reference.is_empty())
            .map(ImageSource::from_reference);
        Ok(GenerationRequest {
            prompt: self.prompt,
            source_image,
            strength: self.strength,
            width: self.width,
            height: self.height,
            provider,
            model: self.selected_model.filter(|m| !m.trim().is_empty()),
        })
    }
}

/// Inbound analysis body.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisPayload {
    pub image_base64: String,
    #[serde(default)]
    pub selected_provider: Option<String>,
    #[serde(default)]
    pub selected_model: Option<String>,
}

impl AnalysisPayload {
    pub fn into_request(self, default_provider: ProviderId) -> Result<AnalysisRequest, Failure> {
        let provider = resolve_provider(self.selected_provider.as_deref(), default_provider)?;
        Ok(AnalysisRequest {
            image: ImageSource::from_reference(&self.image_base64),
            provider,
            model: self.selected_model.filter(|m| !m.trim().is_empty()),
        })
    }
}

fn resolve_provider(
    selected: Option<&str>,
    default_provider: ProviderId,
) -> Result<ProviderId, Failure> {
    match selected.map(str::trim).filter(|s| !s.is_empty()) {
        Some(raw) => ProviderId::from_str(raw).map_err(|err| {
            Failure::new(FailureKind::ClientError, err.to_string(), raw.to_string())
        }),
        None => Ok(default_provider),
    }
}

/// Outbound body mirrored to the browser. The HTTP status is carried out
/// of band because it is not part of the JSON contract.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayReply {
    pub status: String,
    pub provider: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub objects: Option<Vec<DetectedObject>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    #[serde(skip)]
    http_status: u16,
}

impl GatewayReply {
    pub fn from_result(
        result: GatewayResult,
        provider: ProviderId,
        model: Option<&str>,
    ) -> Self {
        match result {
            GatewayResult::Image { image } => Self {
                status: "success".to_string(),
                provider: provider.to_string(),
                model: model.map(str::to_string),
                image_url: Some(image.to_display_string()),
                objects: None,
                error: None,
                details: None,
                suggestion: None,
                http_status: 200,
            },
            GatewayResult::Detections { objects } => Self {
                status: "success".to_string(),
                provider: provider.to_string(),
                model: model.map(str::to_string),
                image_url: None,
                objects: Some(objects),
                error: None,
                details: None,
                suggestion: None,
                http_status: 200,
            },
            GatewayResult::Failure { failure } => Self::from_failure(failure),
        }
    }

    pub fn from_failure(failure: Failure) -> Self {
        Self {
            status: failure.kind.wire_status().to_string(),
            provider: failure.provider,
            model: failure.model,
            image_url: None,
            objects: None,
            error: Some(failure.message),
            details: failure.detail,
            suggestion: failure.suggestion,
            http_status: failure.kind.http_status(),
        }
    }

    pub fn http_status(&self) -> u16 {
        self.http_status
    }
}
