//! Table extraction backends.

use crate::config::ExtractionConfig;
use crate::gemini::GeminiClient;
use crate::prompt::{parse_rows_response, response_schema, EXTRACTION_PROMPT};
use anyhow::Result;
use async_trait::async_trait;
use permit_core::PermitRow;
use tracing::info;

/// Turns a two-page PDF (housing units + valuation) into joined rows.
#[async_trait]
pub trait TableExtractor {
    /// Extract every row of the page pair in `pdf`.
    ///
    /// `display_name` identifies the pair in uploads and logs.
    async fn extract(&self, pdf: &[u8], display_name: &str) -> Result<Vec<PermitRow>>;
}

/// Extractor backed by the Gemini File API and structured output.
#[derive(Debug, Clone)]
pub struct GeminiExtractor {
    client: GeminiClient,
}

impl GeminiExtractor {
    /// Wrap an existing client.
    #[inline]
    #[must_use = "creates an extractor"]
    pub const fn new(client: GeminiClient) -> Self {
        Self { client }
    }

    /// Create an extractor from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if no API key is configured.
    pub fn from_config(config: &ExtractionConfig) -> Result<Self> {
        Ok(Self::new(GeminiClient::new(config)?))
    }

    /// Underlying client.
    #[inline]
    #[must_use = "returns the client"]
    pub const fn client(&self) -> &GeminiClient {
        &self.client
    }
}

#[async_trait]
impl TableExtractor for GeminiExtractor {
    async fn extract(&self, pdf: &[u8], display_name: &str) -> Result<Vec<PermitRow>> {
        let file = self.client.upload_pdf(pdf.to_vec(), display_name).await?;

        let generation = self
            .client
            .generate_json(EXTRACTION_PROMPT, &file, response_schema())
            .await;
        self.client.delete_file(&file).await;
        let generation = generation?;

        info!(
            "{}: {} input / {} output tokens in {}ms",
            display_name, generation.input_tokens, generation.output_tokens, generation.latency_ms
        );

        parse_rows_response(&generation.text)
    }
}
