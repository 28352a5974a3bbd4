//! Client for the third-party dermatology classification API.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::GatewayConfig;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("diagnosis endpoint is not configured")]
    NotConfigured,

    #[error("diagnosis request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("diagnosis API error: {0}")]
    Api(String),
}

/// One ranked condition from the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub name: String,
    pub confidence: f32,
    #[serde(default)]
    pub icd: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    success: bool,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    predictions: Vec<Prediction>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ApiOutcome {
    /// The service refused the image; handled exactly like a local rejection.
    NotSkin(String),
    /// Highest confidence first.
    Predictions(Vec<Prediction>),
}

#[async_trait]
pub trait DiagnosisApi: Send + Sync {
    async fn diagnose(&self, image: &[u8], mime: &str) -> Result<ApiOutcome, GatewayError>;
}

/// Map an HTTP status and body onto an [`ApiOutcome`].
pub fn interpret(status: u16, body: &str) -> Result<ApiOutcome, GatewayError> {
    if !(200..300).contains(&status) {
        log::warn!("diagnosis API answered HTTP {}: {}", status, body.trim());
        return Ok(ApiOutcome::NotSkin(format!(
            "diagnosis service returned HTTP {status}"
        )));
    }

    let response: ApiResponse = serde_json::from_str(body)
        .map_err(|e| GatewayError::Api(format!("malformed response: {e}")))?;

    if !response.success {
        let message = response.message.unwrap_or_default();
        if message.to_lowercase().contains("not of skin") {
            return Ok(ApiOutcome::NotSkin(message));
        }
        return Err(GatewayError::Api(message));
    }

    let mut predictions = response.predictions;
    if predictions.is_empty() {
        return Err(GatewayError::Api("response contained no predictions".into()));
    }
    predictions.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    Ok(ApiOutcome::Predictions(predictions))
}

pub struct HttpGateway {
    http_client: reqwest::Client,
    config: GatewayConfig,
}

impl HttpGateway {
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayError> {
        if config.endpoint.trim().is_empty() {
            return Err(GatewayError::NotConfigured);
        }
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.request_timeout() {
            builder = builder.timeout(timeout);
        }
        let http_client = builder.build()?;
        Ok(Self {
            http_client,
            config,
        })
    }
}

#[async_trait]
impl DiagnosisApi for HttpGateway {
    async fn diagnose(&self, image: &[u8], mime: &str) -> Result<ApiOutcome, GatewayError> {
        let part = Part::bytes(image.to_vec())
            .file_name("image")
            .mime_str(mime)?;
        let form = Form::new().part("image", part);

        log::info!(
            "sending {} byte image to {} (model={}, lang={})",
            image.len(),
            self.config.endpoint,
            self.config.model,
            self.config.language
        );
        let response = self
            .http_client
            .post(&self.config.endpoint)
            .header("X-API-Key", &self.config.api_key)
            .query(&[
                ("model", self.config.model.as_str()),
                ("lang", self.config.language.as_str()),
            ])
            .multipart(form)
            .send()
            .await?;

        let status = response.status().as_u16();
        let body = response.text().await?;
        interpret(status, &body)
    }
}
