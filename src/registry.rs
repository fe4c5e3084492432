use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The closed set of backends the gateway knows how to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProviderId {
    #[serde(rename = "GEMINI")]
    Gemini,
    #[serde(rename = "OPENROUTER")]
    OpenRouter,
    #[serde(rename = "OPENAI")]
    OpenAi,
    #[serde(rename = "REPLICATE")]
    Replicate,
    #[serde(rename = "HUGGINGFACE")]
    HuggingFace,
}

impl ProviderId {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Gemini => "GEMINI",
            Self::OpenRouter => "OPENROUTER",
            Self::OpenAi => "OPENAI",
            Self::Replicate => "REPLICATE",
            Self::HuggingFace => "HUGGINGFACE",
        }
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderId {
    type Err = UnknownProvider;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "GEMINI" | "GOOGLE" => Ok(Self::Gemini),
            "OPENROUTER" => Ok(Self::OpenRouter),
            "OPENAI" => Ok(Self::OpenAi),
            "REPLICATE" => Ok(Self::Replicate),
            "HUGGINGFACE" | "HF" => Ok(Self::HuggingFace),
            _ => Err(UnknownProvider(s.trim().to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownProvider(pub String);

impl fmt::Display for UnknownProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown provider {:?}", self.0)
    }
}

impl std::error::Error for UnknownProvider {}

/// Declared support level for image-editing (as opposed to text-to-image
/// only) requests. Informational: the adapter still attempts the call and
/// lets the remote API be the authority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditCapability {
    None,
    Limited,
    Full,
}

#[derive(Debug, Clone)]
pub struct ProviderDescriptor {
    pub id: ProviderId,
    pub display_name: &'static str,
    pub credential_key: &'static str,
    pub base_url: String,
    /// Ordered; the first entry is the default generation model.
    pub models: Vec<String>,
    /// Model used for room analysis; `None` means the provider has no
    /// analysis endpoint in this system.
    pub analysis_model: Option<&'static str>,
    /// Informational figures surfaced to the UI, not enforced here.
    pub requests_per_minute: u32,
    pub free_tier: &'static str,
    pub edit_capability: EditCapability,
}

impl ProviderDescriptor {
    pub fn default_model(&self) -> Option<&str> {
        self.models.first().map(String::as_str)
    }

    pub fn supports_analysis(&self) -> bool {
        self.analysis_model.is_some()
    }
}

/// Immutable provider table, built once at startup and injected into the
/// gateway so every code path sees the same provider set.
#[derive(Debug, Clone)]
pub struct Registry {
    providers: Vec<ProviderDescriptor>,
}

impl Registry {
    pub fn builtin() -> Self {
        Self {
            providers: vec![
                ProviderDescriptor {
                    id: ProviderId::Gemini,
                    display_name: "Google Gemini",
                    credential_key: "GEMINI_API_KEY",
                    base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
                    models: vec![
                        "gemini-2.5-flash-image-preview".to_string(),
                        "gemini-2.0-flash-preview-image-generation".to_string(),
                    ],
                    analysis_model: Some("gemini-2.5-flash"),
                    requests_per_minute: 15,
                    free_tier: "1500 requests/day",
                    edit_capability: EditCapability::Full,
                },
                ProviderDescriptor {
                    id: ProviderId::OpenRouter,
                    display_name: "OpenRouter",
                    credential_key: "OPENROUTER_API_KEY",
                    base_url: "https://openrouter.ai/api/v1".to_string(),
                    models: vec!["google/gemini-2.5-flash-image-preview".to_string()],
                    analysis_model: Some("openai/gpt-4o-mini"),
                    requests_per_minute: 20,
                    free_tier: "50 requests/day on free models",
                    edit_capability: EditCapability::Full,
                },
                ProviderDescriptor {
                    id: ProviderId::OpenAi,
                    display_name: "OpenAI",
                    credential_key: "OPENAI_API_KEY",
                    base_url: "https://api.openai.com/v1".to_string(),
                    models: vec!["dall-e-3".to_string(), "gpt-image-1".to_string()],
                    analysis_model: Some("gpt-4o-mini"),
                    requests_per_minute: 5,
                    free_tier: "none (paid account required)",
                    edit_capability: EditCapability::None,
                },
                ProviderDescriptor {
                    id: ProviderId::Replicate,
                    display_name: "Replicate",
                    credential_key: "REPLICATE_API_TOKEN",
                    base_url: "https://api.replicate.com/v1".to_string(),
                    models: vec![
                        "black-forest-labs/flux-schnell".to_string(),
                        "stability-ai/sdxl".to_string(),
                    ],
                    analysis_model: None,
                    requests_per_minute: 10,
                    free_tier: "trial credits only",
                    edit_capability: EditCapability::Full,
                },
                ProviderDescriptor {
                    id: ProviderId::HuggingFace,
                    display_name: "Hugging Face",
                    credential_key: "HUGGINGFACE_API_KEY",
                    base_url: "https://api-inference.huggingface.co".to_string(),
                    models: vec![
                        "stabilityai/stable-diffusion-xl-base-1.0".to_string(),
                        "black-forest-labs/FLUX.1-schnell".to_string(),
                    ],
                    analysis_model: None,
                    requests_per_minute: 5,
                    free_tier: "rate-limited free inference",
                    edit_capability: EditCapability::Limited,
                },
            ],
        }
    }

    pub fn lookup(&self, id: ProviderId) -> Option<&ProviderDescriptor> {
        self.providers.iter().find(|p| p.id == id)
    }

    pub fn providers(&self) -> &[ProviderDescriptor] {
        &self.providers
    }

    /// Redirects one provider at a mock or proxy endpoint. Consumes and
    /// returns the registry so the table stays immutable once injected.
    pub fn with_base_url(mut self, id: ProviderId, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        if let Some(descriptor) = self.providers.iter_mut().find(|p| p.id == id) {
            descriptor.base_url = base_url;
        }
        self
    }

    /// Drops every provider except the given ones. Test/bring-up helper.
    pub fn retain(mut self, ids: &[ProviderId]) -> Self {
        self.providers.retain(|p| ids.contains(&p.id));
        self
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::builtin()
    }
}
