use crate::GatewayError;
use crate::env::Env;
use crate::poll::PollConfig;
use crate::providers;
use crate::registry::{ProviderId, Registry};
use crate::types::{
    AnalysisRequest, Failure, FailureKind, GatewayResult, GenerationRequest, ImageSource,
};
use crate::utils::http::default_http_client;

/// Explicit gateway configuration. The canonical default provider lives
/// here instead of being inferred per call site.
#[derive(Debug, Clone, Copy)]
pub struct GatewayConfig {
    pub default_provider: ProviderId,
    pub poll: PollConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            default_provider: ProviderId::Replicate,
            poll: PollConfig::default(),
        }
    }
}

/// The gateway entry point. One dispatch call makes exactly one attempt
/// against exactly one provider and always comes back as a `GatewayResult`;
/// no remote failure escapes as an error.
pub struct Gateway {
    registry: Registry,
    env: Env,
    http: reqwest::Client,
    config: GatewayConfig,
}

impl Gateway {
    pub fn new(registry: Registry, env: Env) -> Self {
        Self {
            registry,
            env,
            http: default_http_client(),
            config: GatewayConfig::default(),
        }
    }

    pub fn with_config(mut self, config: GatewayConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn default_provider(&self) -> ProviderId {
        self.config.default_provider
    }

    pub async fn dispatch_generation(&self, request: GenerationRequest) -> GatewayResult {
        let provider = request.provider;
        let label = provider.to_string();

        if request.prompt.trim().is_empty() {
            return client_error("prompt is required", label);
        }
        if request.width == 0 || request.height == 0 {
            return client_error("width and height must be positive", label);
        }
        let mut request = request;
        if let Some(strength) = request.strength {
            if !strength.is_finite() {
                return client_error("strength must be a finite number in [0, 1]", label);
            }
            let clamped = strength.clamp(0.0, 1.0);
            if clamped != strength {
                tracing::debug!(strength, clamped, "clamping strength into [0, 1]");
                request.strength = Some(clamped);
            }
        }

        let Some(descriptor) = self.registry.lookup(provider) else {
            return client_error(format!("unknown provider {provider}"), label);
        };

        let model = match request.model.as_deref().filter(|m| !m.trim().is_empty()) {
            Some(requested) => {
                if !descriptor.models.iter().any(|known| known == requested) {
                    return client_error(
                        format!(
                            "unknown model {requested:?} for {}",
                            descriptor.display_name
                        ),
                        label,
                    );
                }
                requested.to_string()
            }
            None => match descriptor.default_model() {
                Some(model) => model.to_string(),
                None => {
                    return GatewayResult::failure(Failure::new(
                        FailureKind::OutOfService,
                        format!("{} declares no models", descriptor.display_name),
                        label,
                    ));
                }
            },
        };

        let Some(credential) = self.env.get(descriptor.credential_key) else {
            return missing_credential(descriptor.display_name, descriptor.credential_key, label)
                .into();
        };

        tracing::debug!(
            provider = %provider,
            model = %model,
            mode = if request.source_image.is_some() { "edit" } else { "create" },
            "dispatching generation"
        );
        let backend =
            providers::generation_backend(descriptor, credential, self.http.clone(), self.config.poll);
        match backend.generate(&request, &model).await {
            Ok(image) => GatewayResult::image(image),
            Err(err) => GatewayResult::failure(classify(err, provider, &model)),
        }
    }

    pub async fn dispatch_analysis(&self, request: AnalysisRequest) -> GatewayResult {
        let provider = request.provider;
        let label = provider.to_string();

        let image_missing = match &request.image {
            ImageSource::Url { url } => url.trim().is_empty(),
            ImageSource::Base64 { data, .. } => data.trim().is_empty(),
        };
        if image_missing {
            return client_error("image is required", label);
        }

        let Some(descriptor) = self.registry.lookup(provider) else {
            return client_error(format!("unknown provider {provider}"), label);
        };

        let Some(analysis_model) = descriptor.analysis_model else {
            return no_analysis_endpoint(descriptor.display_name, label).into();
        };
        let model = request
            .model
            .as_deref()
            .filter(|m| !m.trim().is_empty())
            .unwrap_or(analysis_model)
            .to_string();

        let Some(credential) = self.env.get(descriptor.credential_key) else {
            return missing_credential(descriptor.display_name, descriptor.credential_key, label)
                .into();
        };

        tracing::debug!(provider = %provider, model = %model, "dispatching analysis");
        let Some(backend) = providers::analysis_backend(descriptor, credential, self.http.clone())
        else {
            return no_analysis_endpoint(descriptor.display_name, label).into();
        };
        match backend.analyze(&request.image, &model).await {
            Ok(objects) => GatewayResult::detections(objects),
            Err(err) => GatewayResult::failure(classify(err, provider, &model)),
        }
    }
}

fn client_error(message: impl Into<String>, provider: String) -> GatewayResult {
    GatewayResult::failure(Failure::new(FailureKind::ClientError, message, provider))
}

fn missing_credential(display_name: &str, credential_key: &str, provider: String) -> Failure {
    Failure::new(
        FailureKind::OutOfService,
        format!("{display_name} has no credential configured"),
        provider,
    )
    .with_suggestion(format!("set {credential_key} or switch to another provider"))
}

fn no_analysis_endpoint(display_name: &str, provider: String) -> Failure {
    Failure::new(
        FailureKind::OutOfService,
        format!("{display_name} does not support room analysis"),
        provider,
    )
    .with_suggestion("switch to a provider with an analysis endpoint")
}

impl From<Failure> for GatewayResult {
    fn from(failure: Failure) -> Self {
        GatewayResult::failure(failure)
    }
}

/// The single place adapter errors are folded into the failure taxonomy.
fn classify(err: GatewayError, provider: ProviderId, model: &str) -> Failure {
    let label = provider.to_string();
    match err {
        GatewayError::Api { status, body } if status.as_u16() == 429 => Failure::new(
            FailureKind::RateLimited,
            "provider rate limit reached",
            label,
        )
        .with_model(model)
        .with_detail(body)
        .with_suggestion("wait a moment or switch to another provider"),
        GatewayError::Api { status, body } => Failure::new(
            FailureKind::TransientError,
            format!("provider returned {status}"),
            label,
        )
        .with_model(model)
        .with_detail(body),
        // A 2xx whose body fails to decode is a payload-shape problem,
        // not a transport one.
        GatewayError::Http(err) if err.is_decode() => Failure::new(
            FailureKind::MalformedResponse,
            format!("undecodable provider payload: {err}"),
            label,
        )
        .with_model(model),
        GatewayError::Http(err) => Failure::new(
            FailureKind::TransientError,
            format!("network error: {err}"),
            label,
        )
        .with_model(model),
        GatewayError::Json(err) => Failure::new(
            FailureKind::MalformedResponse,
            format!("unreadable provider payload: {err}"),
            label,
        )
        .with_model(model),
        GatewayError::InvalidResponse(message) => {
            Failure::new(FailureKind::MalformedResponse, message, label).with_model(model)
        }
        GatewayError::JobFailed(message) => Failure::new(
            FailureKind::TransientError,
            format!("job failed: {message}"),
            label,
        )
        .with_model(model),
        GatewayError::JobTimedOut { attempts } => Failure::new(
            FailureKind::TransientError,
            format!("job did not complete within {attempts} status checks"),
            label,
        )
        .with_model(model),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Registry;

    fn gateway_without_credentials() -> Gateway {
        // Registry trimmed to nothing so lookups fail deterministically.
        Gateway::new(Registry::builtin().retain(&[]), Env::default())
    }

    fn generation(provider: ProviderId, prompt: &str) -> GenerationRequest {
        GenerationRequest {
            prompt: prompt.to_string(),
            source_image: None,
            strength: None,
            width: 1024,
            height: 1024,
            provider,
            model: None,
        }
    }

    #[tokio::test]
    async fn empty_prompt_is_rejected_before_lookup() {
        let gateway = gateway_without_credentials();
        let result = gateway
            .dispatch_generation(generation(ProviderId::Replicate, "   "))
            .await;
        let failure = result.as_failure().expect("must fail");
        assert_eq!(failure.kind, FailureKind::ClientError);
        assert_eq!(failure.message, "prompt is required");
    }

    #[tokio::test]
    async fn provider_absent_from_registry_is_client_error() {
        let gateway = gateway_without_credentials();
        let result = gateway
            .dispatch_generation(generation(ProviderId::OpenAi, "new backsplash"))
            .await;
        let failure = result.as_failure().expect("must fail");
        assert_eq!(failure.kind, FailureKind::ClientError);
        assert!(failure.message.contains("unknown provider"));
    }

    #[tokio::test]
    async fn non_finite_strength_is_client_error() {
        let gateway = Gateway::new(Registry::builtin(), Env::default());
        let mut request = generation(ProviderId::Replicate, "repaint trim");
        request.strength = Some(f32::NAN);
        let failure = gateway
            .dispatch_generation(request)
            .await
            .as_failure()
            .cloned()
            .expect("must fail");
        assert_eq!(failure.kind, FailureKind::ClientError);
    }

    #[tokio::test]
    async fn unknown_model_is_client_error() {
        let mut env = Env::default();
        env.dotenv
            .insert("REPLICATE_API_TOKEN".to_string(), "r8-test".to_string());
        let gateway = Gateway::new(Registry::builtin(), env);
        let mut request = generation(ProviderId::Replicate, "skylight over the stairs");
        request.model = Some("not-a-registered-model".to_string());
        let failure = gateway
            .dispatch_generation(request)
            .await
            .as_failure()
            .cloned()
            .expect("must fail");
        assert_eq!(failure.kind, FailureKind::ClientError);
        assert!(failure.message.contains("unknown model"));
    }

    #[tokio::test]
    async fn analysis_on_job_poll_provider_is_out_of_service() {
        let mut env = Env::default();
        env.dotenv
            .insert("REPLICATE_API_TOKEN".to_string(), "r8-test".to_string());
        let gateway = Gateway::new(Registry::builtin(), env);
        let result = gateway
            .dispatch_analysis(AnalysisRequest {
                image: ImageSource::Base64 {
                    media_type: "image/jpeg".to_string(),
                    data: "aWMK".to_string(),
                },
                provider: ProviderId::Replicate,
                model: None,
            })
            .await;
        let failure = result.as_failure().expect("must fail");
        assert_eq!(failure.kind, FailureKind::OutOfService);
        assert!(failure.suggestion.is_some());
    }
}
