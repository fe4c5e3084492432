use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value, json};

use crate::backend::GenerationBackend;
use crate::poll::{PollConfig, PollOutcome, PollState, poll_until_terminal};
use crate::registry::ProviderId;
use crate::types::{GenerationRequest, ImageSource};
use crate::utils::http::{check_status, default_http_client, join_endpoint};
use crate::{GatewayError, Result};

const DEFAULT_BASE_URL: &str = "https://api.replicate.com/v1";

/// Asynchronous job/poll family: creating a prediction returns a job
/// handle immediately, and the result is fetched by re-reading the job
/// until it reaches a terminal state.
#[derive(Clone)]
pub struct Replicate {
    http: reqwest::Client,
    base_url: String,
    api_token: String,
    poll: PollConfig,
}

impl Replicate {
    pub fn new(api_token: impl Into<String>) -> Self {
        Self {
            http: default_http_client(),
            base_url: DEFAULT_BASE_URL.to_string(),
            api_token: api_token.into(),
            poll: PollConfig::default(),
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

    pub fn with_poll_config(mut self, poll: PollConfig) -> Self {
        self.poll = poll;
        self
    }

    /// Versioned identifiers (`owner/name:hash`) go through the generic
    /// predictions endpoint; bare `owner/name` slugs use the model route.
    fn create_call(&self, model: &str, input: Value) -> (String, Value) {
        match model.split_once(':') {
            Some((_, version)) => (
                join_endpoint(&self.base_url, "predictions"),
                json!({ "version": version, "input": input }),
            ),
            None => (
                join_endpoint(&self.base_url, &format!("models/{model}/predictions")),
                json!({ "input": input }),
            ),
        }
    }

    fn build_input(request: &GenerationRequest) -> Value {
        let mut input = Map::<String, Value>::new();
        input.insert("prompt".to_string(), Value::String(request.prompt.clone()));
        input.insert("width".to_string(), Value::Number(request.width.into()));
        input.insert("height".to_string(), Value::Number(request.height.into()));
        if let Some(source) = &request.source_image {
            input.insert(
                "image".to_string(),
                Value::String(source.to_display_string()),
            );
            if let Some(strength) = request.strength {
                input.insert("prompt_strength".to_string(), json!(strength));
            }
        }
        Value::Object(input)
    }

    async fn fetch_job(&self, id: &str, attempt: u32) -> Result<PollState<ImageSource>> {
        let url = join_endpoint(&self.base_url, &format!("predictions/{id}"));
        tracing::debug!(prediction = id, attempt, "fetching prediction status");
        let response = self
            .http
            .get(url)
            .bearer_auth(&self.api_token)
            .send()
            .await?;
        let response = check_status(response).await?;
        let job = response.json::<PredictionResponse>().await?;
        job.poll_state()
    }
}

#[derive(Debug, Deserialize)]
struct PredictionResponse {
    id: String,
    #[serde(default)]
    status: String,
    #[serde(default)]
    output: Option<Value>,
    #[serde(default)]
    error: Option<Value>,
}

impl PredictionResponse {
    fn poll_state(&self) -> Result<PollState<ImageSource>> {
        match self.status.as_str() {
            "succeeded" => {
                let url = match &self.output {
                    Some(Value::String(url)) => Some(url.clone()),
                    Some(Value::Array(items)) => items
                        .iter()
                        .find_map(|item| item.as_str())
                        .map(str::to_string),
                    _ => None,
                };
                match url.filter(|u| !u.trim().is_empty()) {
                    Some(url) => Ok(PollState::Completed(ImageSource::from_reference(&url))),
                    None => Err(GatewayError::InvalidResponse(
                        "succeeded prediction has no output image".to_string(),
                    )),
                }
            }
            "failed" | "canceled" => {
                let message = match &self.error {
                    Some(Value::String(text)) => text.clone(),
                    Some(other) => other.to_string(),
                    None => format!("prediction reported status {:?}", self.status),
                };
                Ok(PollState::Failed(message))
            }
            _ => Ok(PollState::InProgress),
        }
    }
}

#[async_trait]
impl GenerationBackend for Replicate {
    fn provider(&self) -> ProviderId {
        ProviderId::Replicate
    }

    async fn generate(&self, request: &GenerationRequest, model: &str) -> Result<ImageSource> {
        let (url, body) = self.create_call(model, Self::build_input(request));
        let response = self
            .http
            .post(url)
            .bearer_auth(&self.api_token)
            .json(&body)
            .send()
            .await?;
        let response = check_status(response).await?;
        let created = response.json::<PredictionResponse>().await?;

        // Fast models can come back already terminal on the create call.
        match created.poll_state()? {
            PollState::Completed(image) => return Ok(image),
            PollState::Failed(message) => return Err(GatewayError::JobFailed(message)),
            PollState::InProgress => {}
        }

        let id = created.id;
        let outcome = poll_until_terminal(self.poll, |attempt| {
            let this = self.clone();
            let id = id.clone();
            Box::pin(async move { this.fetch_job(&id, attempt).await })
        })
        .await?;

        match outcome {
            PollOutcome::Completed(image) => Ok(image),
            PollOutcome::Failed(message) => Err(GatewayError::JobFailed(message)),
            PollOutcome::ExhaustedAttempts { attempts } => {
                Err(GatewayError::JobTimedOut { attempts })
            }
        }
    }
}
