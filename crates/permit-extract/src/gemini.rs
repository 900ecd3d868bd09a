//! Gemini API client for table extraction.
//!
//! This module provides an async client for Google's Gemini models:
//!
//! - **File API**: resumable upload of a page-pair PDF
//! - **generateContent**: structured JSON extraction against a response
//!   schema, or plain text generation
//!
//! ## Example
//!
//! ```no_run
//! use permit_extract::{ExtractionConfig, GeminiClient};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let client = GeminiClient::new(&ExtractionConfig::from_env())?;
//! let reply = client.generate_text("Say 'hello from Gemini' and nothing else.").await?;
//! println!("{}", reply.text);
//! # Ok(())
//! # }
//! ```

// Clippy pedantic allows:
// - Latency in milliseconds from u128
#![allow(clippy::cast_possible_truncation)]

use crate::config::ExtractionConfig;
use anyhow::{Context, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Instant;
use tracing::{debug, warn};

/// `generateContent` request.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    role: String,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part {
    Text {
        text: String,
    },
    File {
        #[serde(rename = "fileData")]
        file_data: FileData,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FileData {
    mime_type: String,
    file_uri: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f64,
    max_output_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_schema: Option<Value>,
}

/// `generateContent` response.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
}

#[derive(Debug, Serialize)]
struct UploadStart<'a> {
    file: UploadStartFile<'a>,
}

#[derive(Debug, Serialize)]
struct UploadStartFile<'a> {
    display_name: &'a str,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    file: UploadedFile,
}

/// A file stored by the Gemini File API.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedFile {
    /// Resource name, e.g. `files/abc123`
    pub name: String,
    /// URI referenced from prompts
    pub uri: String,
    /// Stored MIME type
    #[serde(default)]
    pub mime_type: String,
}

/// Text returned by one generation call, with usage metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Generation {
    /// Concatenated text parts of the first candidate
    pub text: String,
    /// Why generation stopped, when reported
    pub finish_reason: Option<String>,
    /// Number of input tokens consumed
    pub input_tokens: u32,
    /// Number of output tokens generated
    pub output_tokens: u32,
    /// Processing latency in milliseconds
    pub latency_ms: u64,
}

/// HTTP client for Gemini API requests
#[derive(Debug, Clone)]
pub struct GeminiClient {
    client: Client,
    api_key: String,
    api_base: String,
    model: String,
    max_output_tokens: u32,
}

impl GeminiClient {
    /// Create a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if no API key is configured or the HTTP client
    /// cannot be built.
    pub fn new(config: &ExtractionConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .context("GEMINI_API_KEY not set. Add it to .env or the environment")?;

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            api_key,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            max_output_tokens: config.max_output_tokens,
        })
    }

    /// Model id used for generation.
    #[inline]
    #[must_use = "returns the model id"]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Upload a PDF through the resumable File API.
    ///
    /// # Errors
    ///
    /// Returns an error if either upload request fails.
    pub async fn upload_pdf(&self, bytes: Vec<u8>, display_name: &str) -> Result<UploadedFile> {
        let start = self
            .client
            .post(format!("{}/upload/v1beta/files", self.api_base))
            .header("x-goog-api-key", &self.api_key)
            .header("X-Goog-Upload-Protocol", "resumable")
            .header("X-Goog-Upload-Command", "start")
            .header("X-Goog-Upload-Header-Content-Length", bytes.len())
            .header("X-Goog-Upload-Header-Content-Type", "application/pdf")
            .json(&UploadStart {
                file: UploadStartFile { display_name },
            })
            .send()
            .await
            .context("Failed to start file upload")?;

        let status = start.status();
        if !status.is_success() {
            let error_text = start.text().await.unwrap_or_default();
            anyhow::bail!("Gemini upload error ({status}): {error_text}");
        }

        let upload_url = start
            .headers()
            .get("x-goog-upload-url")
            .and_then(|v| v.to_str().ok())
            .context("Upload start response has no x-goog-upload-url header")?
            .to_string();

        let size = bytes.len();
        let response = self
            .client
            .post(upload_url)
            .header("X-Goog-Upload-Offset", 0)
            .header("X-Goog-Upload-Command", "upload, finalize")
            .body(bytes)
            .send()
            .await
            .context("Failed to upload file")?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("Gemini upload error ({status}): {error_text}");
        }

        let uploaded: UploadResponse = response
            .json()
            .await
            .context("Failed to parse upload response")?;
        debug!(
            "Uploaded {} ({} KB) as {}",
            display_name,
            size / 1024,
            uploaded.file.name
        );
        Ok(uploaded.file)
    }

    /// Delete an uploaded file. Failures are logged, not returned; the
    /// service expires uploads on its own.
    pub async fn delete_file(&self, file: &UploadedFile) {
        let result = self
            .client
            .delete(format!("{}/v1beta/{}", self.api_base, file.name))
            .header("x-goog-api-key", &self.api_key)
            .send()
            .await;
        match result {
            Ok(r) if r.status().is_success() => debug!("Deleted {}", file.name),
            Ok(r) => warn!("Failed to delete {}: {}", file.name, r.status()),
            Err(e) => warn!("Failed to delete {}: {}", file.name, e),
        }
    }

    /// Generate schema-constrained JSON from a prompt and an uploaded file.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the response is not valid.
    pub async fn generate_json(
        &self,
        prompt: &str,
        file: &UploadedFile,
        schema: Value,
    ) -> Result<Generation> {
        let mime_type = if file.mime_type.is_empty() {
            "application/pdf".to_string()
        } else {
            file.mime_type.clone()
        };

        let request = GenerateRequest {
            contents: vec![Content {
                role: "user".to_string(),
                parts: vec![
                    Part::Text {
                        text: prompt.to_string(),
                    },
                    Part::File {
                        file_data: FileData {
                            mime_type,
                            file_uri: file.uri.clone(),
                        },
                    },
                ],
            }],
            generation_config: GenerationConfig {
                temperature: 0.0,
                max_output_tokens: self.max_output_tokens,
                response_mime_type: Some("application/json".to_string()),
                response_schema: Some(schema),
            },
        };

        self.generate(&request).await
    }

    /// Generate plain text from a prompt.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the response is not valid.
    pub async fn generate_text(&self, prompt: &str) -> Result<Generation> {
        let request = GenerateRequest {
            contents: vec![Content {
                role: "user".to_string(),
                parts: vec![Part::Text {
                    text: prompt.to_string(),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: 0.0,
                max_output_tokens: self.max_output_tokens,
                response_mime_type: None,
                response_schema: None,
            },
        };

        self.generate(&request).await
    }

    async fn generate(&self, request: &GenerateRequest) -> Result<Generation> {
        let start = Instant::now();

        let response = self
            .client
            .post(format!(
                "{}/v1beta/models/{}:generateContent",
                self.api_base, self.model
            ))
            .header("x-goog-api-key", &self.api_key)
            .json(request)
            .send()
            .await
            .context("Failed to send request to Gemini")?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("Gemini API error ({status}): {error_text}");
        }

        let body: GenerateResponse = response
            .json()
            .await
            .context("Failed to parse Gemini response")?;

        Ok(collect_generation(body, start.elapsed().as_millis() as u64))
    }
}

fn collect_generation(body: GenerateResponse, latency_ms: u64) -> Generation {
    let usage = body.usage_metadata.unwrap_or_default();
    let candidate = body.candidates.into_iter().next();
    let finish_reason = candidate.as_ref().and_then(|c| c.finish_reason.clone());
    let text = candidate
        .and_then(|c| c.content)
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|p| p.text)
                .collect::<String>()
        })
        .unwrap_or_default();

    if let Some(reason) = finish_reason.as_deref() {
        if reason != "STOP" {
            warn!("Gemini stopped early: {reason}");
        }
    }

    Generation {
        text,
        finish_reason,
        input_tokens: usage.prompt_token_count,
        output_tokens: usage.candidates_token_count,
        latency_ms,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_client_requires_key() {
        let err = GeminiClient::new(&ExtractionConfig::default()).unwrap_err();
        assert!(err.to_string().contains("GEMINI_API_KEY"));
    }

    #[test]
    fn test_client_trims_base() {
        let config = ExtractionConfig {
            api_key: Some("k".to_string()),
            api_base: "http://localhost:9/".to_string(),
            ..ExtractionConfig::default()
        };
        let client = GeminiClient::new(&config).unwrap();
        assert_eq!(client.api_base, "http://localhost:9");
        assert_eq!(client.model(), "gemini-3-pro-preview");
    }

    #[test]
    fn test_request_shape() {
        let request = GenerateRequest {
            contents: vec![Content {
                role: "user".to_string(),
                parts: vec![
                    Part::Text {
                        text: "extract".to_string(),
                    },
                    Part::File {
                        file_data: FileData {
                            mime_type: "application/pdf".to_string(),
                            file_uri: "https://example/files/1".to_string(),
                        },
                    },
                ],
            }],
            generation_config: GenerationConfig {
                temperature: 0.0,
                max_output_tokens: 10,
                response_mime_type: Some("application/json".to_string()),
                response_schema: None,
            },
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["contents"][0]["parts"][0]["text"], "extract");
        assert_eq!(
            value["contents"][0]["parts"][1]["fileData"]["fileUri"],
            "https://example/files/1"
        );
        assert_eq!(value["generationConfig"]["maxOutputTokens"], 10);
        assert_eq!(
            value["generationConfig"]["responseMimeType"],
            "application/json"
        );
        assert!(value["generationConfig"].get("responseSchema").is_none());
    }

    #[test]
    fn test_collect_generation_joins_parts() {
        let body: GenerateResponse = serde_json::from_value(json!({
            "candidates": [{
                "content": {"parts": [{"text": "{\"rows\": "}, {"text": "[]}"}]},
                "finishReason": "STOP"
            }],
            "usageMetadata": {"promptTokenCount": 1200, "candidatesTokenCount": 5}
        }))
        .unwrap();
        let generation = collect_generation(body, 42);
        assert_eq!(generation.text, "{\"rows\": []}");
        assert_eq!(generation.finish_reason.as_deref(), Some("STOP"));
        assert_eq!(generation.input_tokens, 1200);
        assert_eq!(generation.output_tokens, 5);
        assert_eq!(generation.latency_ms, 42);
    }

    #[test]
    fn test_collect_generation_without_candidates() {
        let body: GenerateResponse = serde_json::from_value(json!({})).unwrap();
        let generation = collect_generation(body, 0);
        assert!(generation.text.is_empty());
        assert!(generation.finish_reason.is_none());
    }

    #[test]
    fn test_uploaded_file_parse() {
        let upload: UploadResponse = serde_json::from_value(json!({
            "file": {"name": "files/abc", "uri": "https://x/files/abc", "mimeType": "application/pdf"}
        }))
        .unwrap();
        assert_eq!(upload.file.name, "files/abc");
        assert_eq!(upload.file.mime_type, "application/pdf");
    }
}
