use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::enrich::TextGenerator;
use crate::error::AppError;

const MODEL_URL: &str =
    "https://api.replicate.com/v1/models/meta/meta-llama-3-8b-instruct/predictions";
const MAX_TOKENS: u32 = 512;
const PREDICTION_TIMEOUT: Duration = Duration::from_secs(120);

/// Replicate's prediction API in blocking mode (`Prefer: wait`), with
/// deterministic decoding and stop sequences bounding the output.
pub struct ReplicateClient {
    client: reqwest::Client,
    api_token: String,
}

impl ReplicateClient {
    pub fn new(api_token: String) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(PREDICTION_TIMEOUT)
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { client, api_token })
    }
}

#[derive(Debug, Serialize)]
struct PredictionRequest<'a> {
    input: PredictionInput<'a>,
}

#[derive(Debug, Serialize)]
struct PredictionInput<'a> {
    prompt: &'a str,
    temperature: f64,
    stop_sequences: &'a str,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct Prediction {
    status: String,
    #[serde(default)]
    output: Option<Value>,
    #[serde(default)]
    error: Option<Value>,
}

#[async_trait]
impl TextGenerator for ReplicateClient {
    async fn generate(&self, prompt: &str) -> Result<String, AppError> {
        let request = PredictionRequest {
            input: PredictionInput {
                prompt,
                temperature: 0.0,
                stop_sequences: "\n\n,###",
                max_tokens: MAX_TOKENS,
            },
        };

        let resp = self
            .client
            .post(MODEL_URL)
            .bearer_auth(&self.api_token)
            .header("Prefer", "wait")
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::Fetch(format!("Text generation request failed: {e}")))?;

        if !resp.status().is_success() {
            return Err(AppError::Fetch(format!(
                "Text generation endpoint returned {}",
                resp.status()
            )));
        }

        let prediction: Prediction = resp
            .json()
            .await
            .map_err(|e| AppError::Fetch(format!("Invalid prediction response: {e}")))?;

        if let Some(error) = prediction.error {
            return Err(AppError::Fetch(format!("Prediction failed: {error}")));
        }
        if matches!(prediction.status.as_str(), "failed" | "canceled") {
            return Err(AppError::Fetch(format!("Prediction {}", prediction.status)));
        }

        Ok(flatten_output(prediction.output.as_ref()))
    }
}

/// Language models on Replicate stream output as an array of string
/// chunks; older models return one string.
fn flatten_output(output: Option<&Value>) -> String {
    match output {
        Some(Value::Array(chunks)) => chunks
            .iter()
            .filter_map(|chunk| chunk.as_str())
            .collect::<String>(),
        Some(Value::String(text)) => text.clone(),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn chunked_output_is_concatenated() {
        let output = json!(["{\"years\"", ": 2, \"skills\"", ": [\"Go\"]}"]);
        assert_eq!(
            flatten_output(Some(&output)),
            "{\"years\": 2, \"skills\": [\"Go\"]}"
        );
    }

    #[test]
    fn string_output_passes_through() {
        let output = json!("plain text");
        assert_eq!(flatten_output(Some(&output)), "plain text");
    }

    #[test]
    fn missing_output_is_empty() {
        assert_eq!(flatten_output(None), "");
        assert_eq!(flatten_output(Some(&Value::Null)), "");
    }

    #[test]
    fn request_serializes_expected_input_shape() {
        let request = PredictionRequest {
            input: PredictionInput {
                prompt: "describe",
                temperature: 0.0,
                stop_sequences: "\n\n,###",
                max_tokens: MAX_TOKENS,
            },
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["input"]["prompt"], "describe");
        assert_eq!(value["input"]["temperature"], 0.0);
        assert_eq!(value["input"]["max_tokens"], 512);
    }
}
