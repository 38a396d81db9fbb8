//! Prediction service client.
//!
//! Thin adapter over the external disease classifier: takes a public image
//! URL, returns a disease name -> raw probability mapping. A single attempt
//! is made per call; callers decide whether to retry.

use crate::config::PredictorConfig;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use service_core::error::AppError;
use std::collections::BTreeMap;
use std::time::Duration;

/// Client for the external prediction service.
#[derive(Clone)]
pub struct PredictionClient {
    client: Client,
    endpoint: String,
}

/// Response envelope from the prediction service.
#[derive(Debug, Deserialize)]
struct PredictResponse {
    data: BTreeMap<String, f64>,
}

impl PredictionClient {
    /// Create a new prediction client with a request-level timeout.
    pub fn new(config: &PredictorConfig) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| {
                AppError::ConfigError(anyhow::anyhow!("Failed to build predictor client: {}", e))
            })?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
        })
    }

    /// Ask the prediction service to classify the image at `image_url`.
    ///
    /// Returns the raw disease -> probability mapping, each probability
    /// validated to lie in [0, 1].
    #[tracing::instrument(skip(self), fields(endpoint = %self.endpoint))]
    pub async fn predict(&self, image_url: &str) -> Result<BTreeMap<String, f64>, AppError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&json!({ "image_url": image_url }))
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Prediction request failed");
                if e.is_timeout() {
                    AppError::BadGateway("prediction service timed out".to_string())
                } else {
                    AppError::BadGateway(format!("prediction service unreachable: {}", e))
                }
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            AppError::BadGateway(format!("failed to read prediction response: {}", e))
        })?;

        tracing::debug!(status = %status, body = %body, "Prediction response");

        if !status.is_success() {
            tracing::error!(status = %status, "Prediction service returned an error");
            return Err(AppError::BadGateway(format!(
                "prediction service returned {}",
                status
            )));
        }

        let predictions = parse_predictions(&body)?;

        tracing::info!(diseases = predictions.len(), "Prediction completed");
        Ok(predictions)
    }
}

/// Parse and validate the prediction service's `{data: {name: probability}}`
/// body. Probabilities outside [0, 1] are rejected before any ranking.
fn parse_predictions(body: &str) -> Result<BTreeMap<String, f64>, AppError> {
    let response: PredictResponse = serde_json::from_str(body).map_err(|e| {
        AppError::BadGateway(format!("malformed prediction response: {}", e))
    })?;

    for (disease, probability) in &response.data {
        if !(0.0..=1.0).contains(probability) {
            return Err(AppError::BadGateway(format!(
                "prediction for '{}' out of range: {}",
                disease, probability
            )));
        }
    }

    Ok(response.data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_valid_response() {
        let body = r#"{"data": {"Acne": 0.92, "Eczema": 0.5}}"#;
        let predictions = parse_predictions(body).unwrap();
        assert_eq!(predictions.len(), 2);
        assert_eq!(predictions["Acne"], 0.92);
    }

    #[test]
    fn rejects_probability_above_one() {
        let body = r#"{"data": {"Acne": 1.2}}"#;
        assert!(parse_predictions(body).is_err());
    }

    #[test]
    fn rejects_negative_probability() {
        let body = r#"{"data": {"Acne": -0.1}}"#;
        assert!(parse_predictions(body).is_err());
    }

    #[test]
    fn rejects_malformed_body() {
        assert!(parse_predictions("not json").is_err());
        assert!(parse_predictions(r#"{"data": {"Acne": "high"}}"#).is_err());
    }

    #[test]
    fn empty_mapping_is_valid() {
        let predictions = parse_predictions(r#"{"data": {}}"#).unwrap();
        assert!(predictions.is_empty());
    }
}
