//! # permit-extract
//!
//! Extraction of building permit tables from scanned Census reports using
//! Google Gemini, with validation of every extracted page pair.
//!
//! ## Overview
//!
//! The extraction workflow:
//! 1. Split each scanned PDF into page pairs (housing units + valuation)
//! 2. Upload each pair through the Gemini File API
//! 3. Ask for all rows as schema-constrained JSON, joined by line number
//! 4. Save the rows as `{output}/{year}/pages_{p1:02}_{p2:02}.json`
//! 5. Validate the rows with [`permit_core`] and log every issue
//!
//! ## Example Usage
//!
//! ```no_run
//! use permit_extract::{BatchRunner, ExtractionConfig, GeminiExtractor};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = ExtractionConfig::from_env();
//! let extractor = GeminiExtractor::from_config(&config)?;
//!
//! let summary = BatchRunner::new(extractor, &config).run().await?;
//! println!("{summary}");
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`config`] - Environment-driven configuration
//! - [`extractor`] - The [`TableExtractor`] seam and its Gemini implementation
//! - [`gemini`] - Gemini REST client (File API upload, `generateContent`)
//! - [`pdf`] - Page pair splitting using lopdf
//! - [`pipeline`] - Batch extraction with caching and a validation log
//! - [`prompt`] - Extraction prompt, response schema and response parsing
//! - [`trial`] - Single page pair trial runs

pub mod config;
pub mod extractor;
pub mod gemini;
pub mod pdf;
pub mod pipeline;
pub mod prompt;
pub mod trial;

pub use config::ExtractionConfig;
pub use extractor::{GeminiExtractor, TableExtractor};
pub use gemini::{GeminiClient, Generation, UploadedFile};
pub use pdf::{page_pairs, PagePair, ScannedReport};
pub use pipeline::{year_from_path, BatchRunner, BatchSummary, PdfSummary};
pub use trial::{default_trial_output, PairTrial};
