//! Replicate predictions client.
//!
//! Creates a prediction with `Prefer: wait`, then polls its status URL until it
//! settles. The whole exchange is bounded by the configured generation timeout.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::{endpoint, http_client, snippet, transport_error};
use crate::config::{ImageGenerationConfig, Secret};
use crate::constants::{
    GENERATION_ASPECT_RATIO, GENERATION_OUTPUT_FORMAT, PREDICTION_POLL_INTERVAL_MS,
};
use crate::error::{PipelineError, Stage};

#[derive(Debug, Serialize)]
struct PredictionRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    version: Option<&'a str>,
    input: PredictionInput<'a>,
}

#[derive(Debug, Serialize)]
struct PredictionInput<'a> {
    prompt: &'a str,
    aspect_ratio: &'a str,
    output_format: &'a str,
}

#[derive(Debug, Deserialize)]
struct Prediction {
    #[serde(default)]
    id: Option<String>,
    status: String,
    #[serde(default)]
    output: Option<PredictionOutput>,
    #[serde(default)]
    error: Option<Value>,
    #[serde(default)]
    urls: Option<PredictionUrls>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PredictionOutput {
    Single(String),
    Many(Vec<String>),
}

#[derive(Debug, Deserialize)]
struct PredictionUrls {
    #[serde(default)]
    get: Option<String>,
}

impl Prediction {
    fn first_output(self) -> Result<String, PipelineError> {
        let url = match self.output {
            Some(PredictionOutput::Single(url)) => Some(url),
            Some(PredictionOutput::Many(urls)) => urls.into_iter().next(),
            None => None,
        };
        url.filter(|url| !url.is_empty())
            .ok_or_else(|| PipelineError::Generation("prediction returned no output".to_string()))
    }

    fn failure_reason(&self) -> String {
        match &self.error {
            Some(Value::String(msg)) => msg.clone(),
            Some(Value::Null) | None => "no error given".to_string(),
            Some(other) => other.to_string(),
        }
    }
}

/// Image generation client; returns the URL of the first generated image.
#[derive(Clone, Debug)]
pub struct ImageGenerationClient {
    config: ImageGenerationConfig,
    client: reqwest::Client,
    poll_interval: Duration,
}

impl ImageGenerationClient {
    /// Creates a client; no request is made until [`Self::generate`].
    pub fn new(config: &ImageGenerationConfig) -> Result<Self, PipelineError> {
        Ok(Self {
            config: config.clone(),
            client: http_client(config.timeout)?,
            poll_interval: Duration::from_millis(PREDICTION_POLL_INTERVAL_MS),
        })
    }

    /// Overrides the delay between status polls.
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Runs a square prediction for `prompt` and returns the first output URL.
    pub async fn generate(&self, prompt: &str) -> Result<String, PipelineError> {
        let Some(token) = self.config.api_token.as_ref() else {
            return Err(PipelineError::Generation(
                "image generation is not configured".to_string(),
            ));
        };
        match tokio::time::timeout(self.config.timeout, self.run_prediction(token, prompt)).await
        {
            Ok(result) => result,
            Err(_) => Err(PipelineError::Timeout(Stage::ImageGeneration)),
        }
    }

    async fn run_prediction(&self, token: &Secret, prompt: &str) -> Result<String, PipelineError> {
        // `owner/name:version` pins a model version through the generic endpoint.
        let (path, version) = match self.config.model.split_once(':') {
            Some((_, version)) => ("v1/predictions".to_string(), Some(version)),
            None => (format!("v1/models/{}/predictions", self.config.model), None),
        };
        let url = endpoint(&self.config.base_url, &path)
            .map_err(|err| PipelineError::Generation(err.to_string()))?;
        let body = PredictionRequest {
            version,
            input: PredictionInput {
                prompt,
                aspect_ratio: GENERATION_ASPECT_RATIO,
                output_format: GENERATION_OUTPUT_FORMAT,
            },
        };

        let response = self
            .client
            .post(url)
            .bearer_auth(token.expose())
            .header("Prefer", "wait")
            .json(&body)
            .send()
            .await
            .map_err(|err| transport_error(&err, Stage::ImageGeneration, PipelineError::Generation))?;
        let mut prediction = read_prediction(response).await?;

        loop {
            match prediction.status.as_str() {
                "succeeded" => return prediction.first_output(),
                "failed" | "canceled" => {
                    return Err(PipelineError::Generation(format!(
                        "prediction {}: {}",
                        prediction.status,
                        prediction.failure_reason()
                    )));
                }
                _ => {}
            }

            let Some(poll_url) = prediction.urls.and_then(|urls| urls.get) else {
                return Err(PipelineError::Generation(format!(
                    "prediction is {} with no status URL",
                    prediction.status
                )));
            };
            debug!(
                "Prediction {} is {}, polling",
                prediction.id.as_deref().unwrap_or("?"),
                prediction.status
            );
            tokio::time::sleep(self.poll_interval).await;

            let response = self
                .client
                .get(&poll_url)
                .bearer_auth(token.expose())
                .send()
                .await
                .map_err(|err| {
                    transport_error(&err, Stage::ImageGeneration, PipelineError::Generation)
                })?;
            prediction = read_prediction(response).await?;
        }
    }
}

async fn read_prediction(response: reqwest::Response) -> Result<Prediction, PipelineError> {
    let status = response.status();
    let bytes = response
        .bytes()
        .await
        .map_err(|err| transport_error(&err, Stage::ImageGeneration, PipelineError::Generation))?;
    if !status.is_success() {
        return Err(PipelineError::Generation(format!(
            "API error {status}: {}",
            snippet(&bytes)
        )));
    }
    serde_json::from_slice(&bytes)
        .map_err(|err| PipelineError::Generation(format!("malformed prediction: {err}")))
}
