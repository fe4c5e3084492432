mod gemini;
mod huggingface;
mod openai;
mod openrouter;
mod replicate;

pub use gemini::Gemini;
pub use huggingface::HuggingFace;
pub use openai::OpenAi;
pub use openrouter::OpenRouter;
pub use replicate::Replicate;

use crate::backend::{AnalysisBackend, GenerationBackend};
use crate::poll::PollConfig;
use crate::registry::{ProviderDescriptor, ProviderId};

/// Selects the generation adapter for a provider, exactly once per
/// dispatch. The match is exhaustive over the closed provider set, so a
/// new provider cannot silently fall through to a wrong branch.
pub(crate) fn generation_backend(
    descriptor: &ProviderDescriptor,
    credential: String,
    http: reqwest::Client,
    poll: PollConfig,
) -> Box<dyn GenerationBackend> {
    match descriptor.id {
        ProviderId::Gemini => Box::new(
            Gemini::new(credential)
                .with_base_url(descriptor.base_url.as_str())
                .with_http_client(http),
        ),
        ProviderId::OpenRouter => Box::new(
            OpenRouter::new(credential)
                .with_base_url(descriptor.base_url.as_str())
                .with_http_client(http),
        ),
        ProviderId::OpenAi => Box::new(
            OpenAi::new(credential)
                .with_base_url(descriptor.base_url.as_str())
                .with_http_client(http),
        ),
        ProviderId::Replicate => Box::new(
            Replicate::new(credential)
                .with_base_url(descriptor.base_url.as_str())
                .with_http_client(http)
                .with_poll_config(poll),
        ),
        ProviderId::HuggingFace => Box::new(
            HuggingFace::new(credential)
                .with_base_url(descriptor.base_url.as_str())
                .with_http_client(http),
        ),
    }
}

/// Selects the analysis adapter; `None` means the provider has no analysis
/// endpoint in this system and the dispatcher reports `out_of_service`.
pub(crate) fn analysis_backend(
    descriptor: &ProviderDescriptor,
    credential: String,
    http: reqwest::Client,
) -> Option<Box<dyn AnalysisBackend>> {
    match descriptor.id {
        ProviderId::Gemini => Some(Box::new(
            Gemini::new(credential)
                .with_base_url(descriptor.base_url.as_str())
                .with_http_client(http),
        )),
        ProviderId::OpenRouter => Some(Box::new(
            OpenRouter::new(credential)
                .with_base_url(descriptor.base_url.as_str())
                .with_http_client(http),
        )),
        ProviderId::OpenAi => Some(Box::new(
            OpenAi::new(credential)
                .with_base_url(descriptor.base_url.as_str())
                .with_http_client(http),
        )),
        ProviderId::Replicate | ProviderId::HuggingFace => None,
    }
}
