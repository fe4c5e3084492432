pub mod backend;
pub mod detect;
mod dispatch;
mod env;
mod error;
pub mod poll;
pub mod providers;
mod registry;
pub mod types;
pub mod utils;
mod wire;

pub use backend::{AnalysisBackend, GenerationBackend};
pub use dispatch::{Gateway, GatewayConfig};
pub use env::{Env, parse_dotenv};
pub use error::{GatewayError, Result};
pub use poll::PollConfig;
pub use providers::{Gemini, HuggingFace, OpenAi, OpenRouter, Replicate};
pub use registry::{
    EditCapability, ProviderDescriptor, ProviderId, Registry, UnknownProvider,
};
pub use types::{
    AnalysisRequest, DetectedObject, Failure, FailureKind, GatewayResult, GenerationRequest,
    ImageSource,
};
pub use wire::{AnalysisPayload, GatewayReply, GenerationPayload};
