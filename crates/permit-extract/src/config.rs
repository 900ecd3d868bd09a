//! Configuration for extraction runs

use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Default Gemini model for table extraction
pub const DEFAULT_MODEL: &str = "gemini-3-pro-preview";

/// Default Gemini API endpoint
pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com";

/// Configuration for the extraction service and batch layout
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// Gemini API key; extraction refuses to start without one
    #[serde(skip_serializing)]
    pub api_key: Option<String>,

    /// API base URL (without version path)
    pub api_base: String,

    /// Model id (e.g., "gemini-3-pro-preview")
    pub model: String,

    /// Pause between consecutive extraction calls.
    /// The service allows about 50 requests per minute.
    pub request_delay: Duration,

    /// Maximum tokens in one model response
    pub max_output_tokens: u32,

    /// HTTP timeout for a single request
    pub timeout: Duration,

    /// Directory containing the scanned PDFs
    pub scans_dir: PathBuf,

    /// Directory receiving per-page-pair JSON outputs and logs
    pub output_dir: PathBuf,
}

impl ExtractionConfig {
    /// Create configuration from environment variables
    ///
    /// Environment variables:
    /// - `GEMINI_API_KEY`: API key (no default)
    /// - `GEMINI_API_BASE`: API base URL (default: Google endpoint)
    /// - `PERMIT_OCR_MODEL`: Model name (default: "gemini-3-pro-preview")
    /// - `PERMIT_OCR_REQUEST_DELAY_MS`: Delay between calls (default: 1500)
    /// - `PERMIT_OCR_MAX_OUTPUT_TOKENS`: Max tokens (default: 65536)
    /// - `PERMIT_OCR_TIMEOUT_SECS`: HTTP timeout (default: 300)
    #[must_use = "creates config from environment variables"]
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let api_key = env::var("GEMINI_API_KEY").ok().filter(|k| !k.is_empty());

        let api_base = env::var("GEMINI_API_BASE").unwrap_or(defaults.api_base);

        let model = env::var("PERMIT_OCR_MODEL").unwrap_or(defaults.model);

        let request_delay = env::var("PERMIT_OCR_REQUEST_DELAY_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map_or(defaults.request_delay, Duration::from_millis);

        let max_output_tokens = env::var("PERMIT_OCR_MAX_OUTPUT_TOKENS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.max_output_tokens);

        let timeout = env::var("PERMIT_OCR_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map_or(defaults.timeout, Duration::from_secs);

        Self {
            api_key,
            api_base,
            model,
            request_delay,
            max_output_tokens,
            timeout,
            ..defaults
        }
    }
}

impl Default for ExtractionConfig {
    #[inline]
    fn default() -> Self {
        Self {
            api_key: None,
            api_base: DEFAULT_API_BASE.to_string(),
            model: DEFAULT_MODEL.to_string(),
            request_delay: Duration::from_millis(1500),
            max_output_tokens: 65_536,
            timeout: Duration::from_secs(300),
            scans_dir: PathBuf::from("scans"),
            output_dir: PathBuf::from("raw_ocr"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ExtractionConfig::default();
        assert_eq!(config.model, "gemini-3-pro-preview");
        assert_eq!(config.request_delay, Duration::from_millis(1500));
        assert_eq!(config.max_output_tokens, 65_536);
        assert_eq!(config.scans_dir, PathBuf::from("scans"));
        assert_eq!(config.output_dir, PathBuf::from("raw_ocr"));
        assert!(config.api_key.is_none());
    }

    #[test]
    fn test_config_from_env() {
        env::set_var("PERMIT_OCR_MODEL", "gemini-2.5-pro");
        env::set_var("PERMIT_OCR_REQUEST_DELAY_MS", "250");
        env::set_var("PERMIT_OCR_MAX_OUTPUT_TOKENS", "8192");
        env::set_var("PERMIT_OCR_TIMEOUT_SECS", "not-a-number");

        let config = ExtractionConfig::from_env();
        assert_eq!(config.model, "gemini-2.5-pro");
        assert_eq!(config.request_delay, Duration::from_millis(250));
        assert_eq!(config.max_output_tokens, 8192);
        assert_eq!(config.timeout, Duration::from_secs(300));

        // Clean up
        env::remove_var("PERMIT_OCR_MODEL");
        env::remove_var("PERMIT_OCR_REQUEST_DELAY_MS");
        env::remove_var("PERMIT_OCR_MAX_OUTPUT_TOKENS");
        env::remove_var("PERMIT_OCR_TIMEOUT_SECS");
    }
}
