use async_trait::async_trait;

use crate::Result;
use crate::registry::ProviderId;
use crate::types::{DetectedObject, GenerationRequest, ImageSource};

/// One provider family's generation adapter: builds the wire request,
/// sends it, and extracts the produced image. Failure classification into
/// the shared taxonomy happens in the dispatcher.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    fn provider(&self) -> ProviderId;

    async fn generate(&self, request: &GenerationRequest, model: &str) -> Result<ImageSource>;
}

/// One provider family's analysis adapter: sends the room photo and
/// recovers a detections list from the model's reply.
#[async_trait]
pub trait AnalysisBackend: Send + Sync {
    fn provider(&self) -> ProviderId;

    async fn analyze(&self, image: &ImageSource, model: &str) -> Result<Vec<DetectedObject>>;
}
