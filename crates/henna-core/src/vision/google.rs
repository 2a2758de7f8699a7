//! Google Cloud Vision label detection over REST.

use super::LabelExtractor;
use crate::config::{AppConfig, VisionConfig};
use crate::error::{GalleryError, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose, Engine};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::Path;
use tracing::debug;

pub struct GoogleVisionClient {
    client: Client,
    config: VisionConfig,
}

impl GoogleVisionClient {
    pub fn new(config: VisionConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(format!("henna-gallery/{}", AppConfig::VERSION))
            .build()
            .map_err(|e| GalleryError::Network {
                message: format!("Failed to create HTTP client: {}", e),
            })?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &VisionConfig {
        &self.config
    }

    fn annotate_url(&self) -> String {
        format!("{}/v1/images:annotate", self.config.endpoint)
    }
}

#[async_trait]
impl LabelExtractor for GoogleVisionClient {
    async fn extract_labels(&self, path: &Path) -> Result<Vec<String>> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| GalleryError::io_with_path(e, path))?;
        let body = annotate_request(&bytes, self.config.max_labels);

        let response = self
            .client
            .post(self.annotate_url())
            .query(&[("key", self.config.api_key.as_str())])
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(GalleryError::LabelExtraction {
                message: format!("Vision API returned {} for {}: {}", status, path.display(), detail),
            });
        }

        let parsed: AnnotateResponse = response.json().await?;
        let labels = labels_from_response(parsed, self.config.max_labels)?;
        debug!("Vision labels for {}: {:?}", path.display(), labels);
        Ok(labels)
    }
}

fn annotate_request(image: &[u8], max_labels: usize) -> Value {
    json!({
        "requests": [{
            "image": {"content": general_purpose::STANDARD.encode(image)},
            "features": [{"type": "LABEL_DETECTION", "maxResults": max_labels}],
        }]
    })
}

#[derive(Debug, Deserialize)]
struct AnnotateResponse {
    #[serde(default)]
    responses: Vec<ImageResponse>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImageResponse {
    #[serde(default)]
    label_annotations: Vec<LabelAnnotation>,
    #[serde(default)]
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct LabelAnnotation {
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    message: String,
}

fn labels_from_response(response: AnnotateResponse, max_labels: usize) -> Result<Vec<String>> {
    let Some(image) = response.responses.into_iter().next() else {
        return Ok(Vec::new());
    };
    if let Some(error) = image.error {
        return Err(GalleryError::LabelExtraction {
            message: error.message,
        });
    }
    Ok(image
        .label_annotations
        .into_iter()
        .map(|label| label.description.trim().to_lowercase())
        .filter(|label| !label.is_empty())
        .take(max_labels)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn parse(value: Value) -> AnnotateResponse {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_request_body() {
        let body = annotate_request(b"abc", 6);
        assert_eq!(body["requests"][0]["image"]["content"], "YWJj");
        assert_eq!(body["requests"][0]["features"][0]["type"], "LABEL_DETECTION");
        assert_eq!(body["requests"][0]["features"][0]["maxResults"], 6);
    }

    #[test]
    fn test_labels_lowercased_and_truncated() {
        let response = parse(json!({
            "responses": [{"labelAnnotations": [
                {"description": "Hand", "score": 0.97},
                {"description": "Henna", "score": 0.95},
                {"description": "Pattern"}
            ]}]
        }));
        assert_eq!(labels_from_response(response, 2).unwrap(), vec!["hand", "henna"]);
    }

    #[test]
    fn test_api_error_is_reported() {
        let response = parse(json!({
            "responses": [{"error": {"code": 3, "message": "Bad image data."}}]
        }));
        let err = labels_from_response(response, 6).unwrap_err();
        assert!(matches!(err, GalleryError::LabelExtraction { message } if message == "Bad image data."));
    }

    #[test]
    fn test_empty_response() {
        assert!(labels_from_response(parse(json!({})), 6).unwrap().is_empty());
    }

    #[test]
    fn test_url_uses_configured_endpoint() {
        let client = GoogleVisionClient::new(VisionConfig {
            api_key: "k".into(),
            endpoint: "http://localhost:9000".into(),
            max_labels: 6,
            timeout: Duration::from_secs(5),
        })
        .unwrap();
        assert_eq!(client.annotate_url(), "http://localhost:9000/v1/images:annotate");
    }
}
