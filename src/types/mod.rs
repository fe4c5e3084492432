use serde::{Deserialize, Serialize};

use crate::registry::ProviderId;
use crate::utils::data_uri;

/// A displayable image reference, on both the input and output side of a
/// dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ImageSource {
    Url { url: String },
    Base64 { media_type: String, data: String },
}

impl ImageSource {
    /// Accepts the forms the edge layer sends: a data URI, an http(s) URL,
    /// or bare base64 (assumed JPEG, the camera-upload default).
    pub fn from_reference(reference: &str) -> Self {
        let reference = reference.trim();
        if let Some(parsed) = data_uri::parse(reference) {
            return Self::Base64 {
                media_type: parsed.media_type,
                data: parsed.data,
            };
        }
        if reference.starts_with("http://") || reference.starts_with("https://") {
            return Self::Url {
                url: reference.to_string(),
            };
        }
        Self::Base64 {
            media_type: "image/jpeg".to_string(),
            data: reference.to_string(),
        }
    }

    /// Renders the single string the edge layer displays (`imageUrl`).
    pub fn to_display_string(&self) -> String {
        match self {
            Self::Url { url } => url.clone(),
            Self::Base64 { media_type, data } => data_uri::format(media_type, data),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_image: Option<ImageSource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strength: Option<f32>,
    pub width: u32,
    pub height: u32,
    pub provider: ProviderId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub image: ImageSource,
    pub provider: ProviderId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

/// One object the analysis model found in the room. The suggestion fields
/// are provider-dependent and therefore optional rather than schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedObject {
    pub name: String,
    #[serde(default)]
    pub confidence: f32,
    #[serde(default)]
    pub location: String,
    #[serde(default, alias = "suggestionTitle", skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    #[serde(default, alias = "estimatedCost", skip_serializing_if = "Option::is_none")]
    pub estimated_cost: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeline: Option<String>,
    #[serde(default, alias = "shoppingLinks", skip_serializing_if = "Option::is_none")]
    pub shopping_links: Option<Vec<String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    ClientError,
    OutOfService,
    RateLimited,
    MalformedResponse,
    TransientError,
}

impl FailureKind {
    /// The HTTP status the edge layer mirrors back to the browser.
    pub fn http_status(self) -> u16 {
        match self {
            Self::ClientError => 400,
            Self::OutOfService => 503,
            Self::RateLimited => 429,
            Self::MalformedResponse | Self::TransientError => 500,
        }
    }

    /// The coarse `status` vocabulary of the outbound wire contract.
    pub fn wire_status(self) -> &'static str {
        match self {
            Self::RateLimited => "rate_limited",
            Self::OutOfService => "out_of_service",
            Self::ClientError | Self::MalformedResponse | Self::TransientError => "error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Failure {
    pub kind: FailureKind,
    pub message: String,
    pub provider: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl Failure {
    pub fn new(kind: FailureKind, message: impl Into<String>, provider: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            provider: provider.into(),
            model: None,
            detail: None,
            suggestion: None,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }
}

/// The sole type crossing the boundary back to the caller. Exactly one
/// variant per dispatch; partial or degraded payloads are not modeled.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GatewayResult {
    Image { image: ImageSource },
    Detections { objects: Vec<DetectedObject> },
    Failure { failure: Failure },
}

impl GatewayResult {
    pub fn image(image: ImageSource) -> Self {
        Self::Image { image }
    }

    pub fn detections(objects: Vec<DetectedObject>) -> Self {
        Self::Detections { objects }
    }

    pub fn failure(failure: Failure) -> Self {
        Self::Failure { failure }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failure { .. })
    }

    pub fn as_failure(&self) -> Option<&Failure> {
        match self {
            Self::Failure { failure } => Some(failure),
            _ => None,
        }
    }
}
