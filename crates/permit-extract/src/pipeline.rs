//! Batch extraction over a directory of scanned reports.
//!
//! For every `*.pdf` in the scans directory, each page pair is extracted
//! into `{output}/{year}/pages_{p1:02}_{p2:02}.json`. Existing outputs are
//! treated as a cache: they are re-validated but never re-extracted, so an
//! interrupted batch can simply be restarted.
//!
//! Every validation issue and extraction failure is appended to
//! `{output}/validation_errors.log`.

use crate::config::ExtractionConfig;
use crate::extractor::TableExtractor;
use crate::pdf::{page_pairs, PagePair, ScannedReport};
use anyhow::{Context, Result};
use permit_core::{load_rows, save_rows, PermitRow, TolerancePolicy, Validator};
use serde::Serialize;
use std::fmt;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// File name of the batch validation log inside the output directory.
pub const VALIDATION_LOG: &str = "validation_errors.log";

/// Report year of a scan, e.g. `1967` for `MSA_Annual 1967.pdf`.
///
/// This is the last whitespace-separated token of the file stem.
#[must_use = "returns the report year"]
pub fn year_from_path(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    stem.split_whitespace()
        .last()
        .map_or_else(|| "unknown".to_string(), str::to_string)
}

/// Outcome of one scanned report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PdfSummary {
    /// Report year
    pub year: String,
    /// Page count
    pub pages: usize,
    /// Number of page pairs
    pub pairs: usize,
    /// Rows extracted or loaded from cache
    pub rows: usize,
    /// One message per failed page pair
    pub extraction_errors: Vec<String>,
    /// Number of validation issues logged
    pub validation_issues: usize,
}

impl PdfSummary {
    /// True if nothing failed and nothing was flagged.
    #[inline]
    #[must_use = "returns whether the report is clean"]
    pub fn is_clean(&self) -> bool {
        self.extraction_errors.is_empty() && self.validation_issues == 0
    }
}

/// Outcome of a whole batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    /// Per-report summaries, in processing order
    pub reports: Vec<PdfSummary>,
    /// Validation log written during the batch
    pub log_path: PathBuf,
}

impl BatchSummary {
    /// Rows across all reports.
    #[must_use = "returns the total row count"]
    pub fn total_rows(&self) -> usize {
        self.reports.iter().map(|r| r.rows).sum()
    }

    /// Failed page pairs across all reports.
    #[must_use = "returns the extraction error count"]
    pub fn total_extraction_errors(&self) -> usize {
        self.reports.iter().map(|r| r.extraction_errors.len()).sum()
    }

    /// Validation issues across all reports.
    #[must_use = "returns the validation issue count"]
    pub fn total_validation_issues(&self) -> usize {
        self.reports.iter().map(|r| r.validation_issues).sum()
    }
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = "=".repeat(60);
        writeln!(f, "{rule}")?;
        writeln!(f, "SUMMARY")?;
        writeln!(f, "{rule}")?;

        for report in &self.reports {
            if report.is_clean() {
                writeln!(f, "  {}: {} rows (OK)", report.year, report.rows)?;
            } else {
                writeln!(
                    f,
                    "  {}: {} rows ({} errors, {} validation issues)",
                    report.year,
                    report.rows,
                    report.extraction_errors.len(),
                    report.validation_issues
                )?;
            }
        }

        writeln!(f)?;
        writeln!(f, "Total: {} rows extracted", self.total_rows())?;
        let extraction_errors = self.total_extraction_errors();
        if extraction_errors > 0 {
            writeln!(f, "Extraction errors: {extraction_errors}")?;
        }
        let validation_issues = self.total_validation_issues();
        if validation_issues > 0 {
            writeln!(f, "Validation issues: {validation_issues}")?;
            writeln!(f, "See {} for details", self.log_path.display())?;
        }
        Ok(())
    }
}

/// Drives a [`TableExtractor`] over every page pair of every scan.
#[derive(Debug)]
pub struct BatchRunner<E> {
    extractor: E,
    validator: Validator,
    scans_dir: PathBuf,
    output_dir: PathBuf,
    request_delay: Duration,
}

impl<E: TableExtractor + Sync> BatchRunner<E> {
    /// Runner with the lenient validator and the configured directories.
    #[must_use = "creates a batch runner"]
    pub fn new(extractor: E, config: &ExtractionConfig) -> Self {
        Self {
            extractor,
            validator: Validator::new(TolerancePolicy::lenient()),
            scans_dir: config.scans_dir.clone(),
            output_dir: config.output_dir.clone(),
            request_delay: config.request_delay,
        }
    }

    /// Replace the validator used for fresh and cached outputs.
    #[must_use = "returns the reconfigured runner"]
    pub const fn with_validator(mut self, validator: Validator) -> Self {
        self.validator = validator;
        self
    }

    /// Directory receiving the outputs.
    #[inline]
    #[must_use = "returns the output directory"]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Scanned reports to process, sorted by path.
    ///
    /// # Errors
    ///
    /// Returns an error if the scans directory cannot be listed.
    pub fn find_pdfs(&self) -> Result<Vec<PathBuf>> {
        let entries = fs::read_dir(&self.scans_dir).with_context(|| {
            format!("Failed to read scans directory {}", self.scans_dir.display())
        })?;

        let mut pdfs: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.is_file()
                    && path
                        .extension()
                        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
            })
            .collect();
        pdfs.sort();
        Ok(pdfs)
    }

    /// Process every scan and write the validation log.
    ///
    /// # Errors
    ///
    /// Returns an error if the scans directory cannot be listed or the
    /// output directory and log cannot be written. Per-pair failures are
    /// recorded in the summary instead.
    pub async fn run(&self) -> Result<BatchSummary> {
        let pdfs = self.find_pdfs()?;
        let log_path = self.output_dir.join(VALIDATION_LOG);

        if pdfs.is_empty() {
            warn!("No PDF files found in {}", self.scans_dir.display());
            return Ok(BatchSummary {
                reports: Vec::new(),
                log_path,
            });
        }

        info!("Found {} PDF files to process", pdfs.len());
        info!("Output directory: {}", self.output_dir.display());

        fs::create_dir_all(&self.output_dir).with_context(|| {
            format!("Failed to create output directory {}", self.output_dir.display())
        })?;
        let mut log = File::create(&log_path)
            .with_context(|| format!("Failed to create {}", log_path.display()))?;
        writeln!(
            log,
            "Validation log - {}",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
        )?;
        writeln!(log, "{}\n", "=".repeat(60))?;

        let mut reports = Vec::with_capacity(pdfs.len());
        for pdf in &pdfs {
            reports.push(self.process_pdf(pdf, &mut log).await?);
        }

        Ok(BatchSummary { reports, log_path })
    }

    /// Process all page pairs of one scan, appending issues to `log`.
    ///
    /// A scan that cannot be loaded is reported as a single extraction
    /// error.
    ///
    /// # Errors
    ///
    /// Returns an error only if the year directory or the log cannot be
    /// written.
    pub async fn process_pdf<W: Write>(&self, pdf: &Path, log: &mut W) -> Result<PdfSummary> {
        let year = year_from_path(pdf);
        let mut summary = PdfSummary {
            year: year.clone(),
            ..PdfSummary::default()
        };

        let report = match ScannedReport::open(pdf) {
            Ok(report) => report,
            Err(e) => {
                let message = format!("{e:#}");
                warn!("{message}");
                writeln!(log, "{year} {message}")?;
                summary.extraction_errors.push(message);
                return Ok(summary);
            }
        };

        let year_dir = self.output_dir.join(&year);
        fs::create_dir_all(&year_dir)
            .with_context(|| format!("Failed to create {}", year_dir.display()))?;

        let pairs = page_pairs(report.page_count());
        summary.pages = report.page_count();
        summary.pairs = pairs.len();
        info!(
            "Processing {}: {} pages ({} pairs)",
            pdf.display(),
            summary.pages,
            summary.pairs
        );

        for pair in pairs {
            let output_file = year_dir.join(pair.output_file_name());

            if output_file.exists() {
                match load_rows(&output_file) {
                    Ok(rows) => {
                        let issues = self.validate(&rows, &year, pair, log)?;
                        info!(
                            "  Pages {pair}: skipped ({} rows, {issues} validation issues)",
                            rows.len()
                        );
                        summary.rows += rows.len();
                        summary.validation_issues += issues;
                    }
                    Err(e) => {
                        let message = format!("Pages {pair}: {e}");
                        warn!("  ERROR - {message}");
                        writeln!(log, "{year} {message}")?;
                        summary.extraction_errors.push(message);
                    }
                }
                continue;
            }

            match self.extract_pair(&report, &year, pair, &output_file).await {
                Ok(rows) => {
                    let issues = self.validate(&rows, &year, pair, log)?;
                    info!(
                        "  Pages {pair}: {} rows, {issues} validation issues",
                        rows.len()
                    );
                    summary.rows += rows.len();
                    summary.validation_issues += issues;
                }
                Err(e) => {
                    let message = format!("Pages {pair}: {e:#}");
                    warn!("  ERROR - {message}");
                    writeln!(log, "{year} {message}")?;
                    summary.extraction_errors.push(message);
                }
            }

            // Rate limit
            if !self.request_delay.is_zero() {
                tokio::time::sleep(self.request_delay).await;
            }
        }

        Ok(summary)
    }

    async fn extract_pair(
        &self,
        report: &ScannedReport,
        year: &str,
        pair: PagePair,
        output_file: &Path,
    ) -> Result<Vec<PermitRow>> {
        let bytes = report.extract_pages(&[pair.first, pair.second])?;
        let display_name = format!("{year}_pages_{:02}_{:02}.pdf", pair.first, pair.second);
        let rows = self.extractor.extract(&bytes, &display_name).await?;
        save_rows(output_file, &rows)?;
        Ok(rows)
    }

    fn validate<W: Write>(
        &self,
        rows: &[PermitRow],
        year: &str,
        pair: PagePair,
        log: &mut W,
    ) -> Result<usize> {
        let issues = self.validator.validate_rows(rows);
        for issue in &issues {
            writeln!(log, "{year} pages {pair}: {issue}")?;
        }
        Ok(issues.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::test_support::sample_pdf;
    use async_trait::async_trait;
    use permit_core::Field;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    /// Returns one scripted result per call, in order.
    struct ScriptedExtractor {
        calls: AtomicUsize,
        script: Vec<std::result::Result<Vec<PermitRow>, String>>,
    }

    impl ScriptedExtractor {
        fn new(script: Vec<std::result::Result<Vec<PermitRow>, String>>) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                script,
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TableExtractor for ScriptedExtractor {
        async fn extract(&self, pdf: &[u8], _display_name: &str) -> Result<Vec<PermitRow>> {
            let pair = ScannedReport::from_bytes(pdf)?;
            assert_eq!(pair.page_count(), 2);

            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            match self.script.get(call) {
                Some(Ok(rows)) => Ok(rows.clone()),
                Some(Err(message)) => anyhow::bail!("{message}"),
                None => anyhow::bail!("unexpected call {call}"),
            }
        }
    }

    fn row(line: &str, total: &str, private: &str, public: &str) -> PermitRow {
        PermitRow {
            line_number: Some(line.to_string()),
            smsa_name: Some(format!("AREA {line}")),
            ..PermitRow::default()
        }
        .with(Field::TotalUnits, total)
        .with(Field::PrivateTotal, private)
        .with(Field::PublicUnits, public)
    }

    fn setup(pages: u32) -> (TempDir, ExtractionConfig) {
        let dir = TempDir::new().unwrap();
        let scans = dir.path().join("scans");
        fs::create_dir_all(&scans).unwrap();
        fs::write(scans.join("MSA_Annual 1967.pdf"), sample_pdf(pages)).unwrap();

        let config = ExtractionConfig {
            scans_dir: scans,
            output_dir: dir.path().join("raw_ocr"),
            request_delay: Duration::ZERO,
            ..ExtractionConfig::default()
        };
        (dir, config)
    }

    #[test]
    fn test_year_from_path() {
        assert_eq!(year_from_path(Path::new("scans/MSA_Annual 1967.pdf")), "1967");
        assert_eq!(year_from_path(Path::new("1970.pdf")), "1970");
        assert_eq!(year_from_path(Path::new("a b  c.pdf")), "c");
        assert_eq!(year_from_path(Path::new("")), "unknown");
    }

    #[tokio::test]
    async fn test_run_extracts_and_logs() {
        let (_dir, config) = setup(4);
        let extractor = ScriptedExtractor::new(vec![
            Ok(vec![row("1", "100", "90", "10"), row("2", "150", "130", "10")]),
            Err("quota exceeded".to_string()),
        ]);
        let runner = BatchRunner::new(extractor, &config);

        let summary = runner.run().await.unwrap();
        assert_eq!(summary.reports.len(), 1);
        let report = &summary.reports[0];
        assert_eq!(report.year, "1967");
        assert_eq!(report.pages, 4);
        assert_eq!(report.pairs, 2);
        assert_eq!(report.rows, 2);
        assert_eq!(report.validation_issues, 1);
        assert_eq!(report.extraction_errors, vec!["Pages 3-4: quota exceeded"]);

        let saved = config.output_dir.join("1967").join("pages_01_02.json");
        assert_eq!(load_rows(&saved).unwrap().len(), 2);
        assert!(!config.output_dir.join("1967").join("pages_03_04.json").exists());

        let log = fs::read_to_string(&summary.log_path).unwrap();
        assert!(log.starts_with("Validation log - "));
        assert!(log.contains(&"=".repeat(60)));
        assert!(log.contains(
            "1967 pages 1-2: Line 2 (AREA 2): total_units: 150 != 130 + 10 = 140 (diff=+10)"
        ));
        assert!(log.contains("1967 Pages 3-4: quota exceeded"));

        let text = summary.to_string();
        assert!(text.contains("  1967: 2 rows (1 errors, 1 validation issues)"));
        assert!(text.contains("Total: 2 rows extracted"));
        assert!(text.contains("Extraction errors: 1"));
        assert!(text.contains("See "));
    }

    #[tokio::test]
    async fn test_cached_pairs_are_not_reextracted() {
        let (_dir, config) = setup(4);
        let year_dir = config.output_dir.join("1967");
        fs::create_dir_all(&year_dir).unwrap();
        save_rows(
            &year_dir.join("pages_01_02.json"),
            &[row("1", "100", "90", "10"), row("3", "5", "5", "-")],
        )
        .unwrap();

        let extractor = ScriptedExtractor::new(vec![Ok(vec![row("1", "7", "7", "-")])]);
        let runner = BatchRunner::new(extractor, &config);
        let summary = runner.run().await.unwrap();

        assert_eq!(runner.extractor.calls(), 1);
        let report = &summary.reports[0];
        assert_eq!(report.rows, 3);
        // The cached pair is missing line 2
        assert_eq!(report.validation_issues, 1);
        assert!(report.extraction_errors.is_empty());

        let log = fs::read_to_string(&summary.log_path).unwrap();
        assert!(log.contains("1967 pages 1-2: Missing line numbers: [2]"));
    }

    #[tokio::test]
    async fn test_malformed_cache_is_an_extraction_error() {
        let (_dir, config) = setup(2);
        let year_dir = config.output_dir.join("1967");
        fs::create_dir_all(&year_dir).unwrap();
        fs::write(year_dir.join("pages_01_02.json"), "{not json").unwrap();

        let runner = BatchRunner::new(ScriptedExtractor::new(Vec::new()), &config);
        let summary = runner.run().await.unwrap();

        assert_eq!(runner.extractor.calls(), 0);
        let report = &summary.reports[0];
        assert_eq!(report.extraction_errors.len(), 1);
        assert!(report.extraction_errors[0].starts_with("Pages 1-2: "));
    }

    #[tokio::test]
    async fn test_clean_batch_summary() {
        let (_dir, config) = setup(3);
        let extractor = ScriptedExtractor::new(vec![Ok(vec![row("1", "100", "90", "10")])]);
        let runner = BatchRunner::new(extractor, &config);
        let summary = runner.run().await.unwrap();

        // Trailing odd page is ignored
        assert_eq!(summary.reports[0].pairs, 1);
        assert!(summary.reports[0].is_clean());
        let text = summary.to_string();
        assert!(text.contains("  1967: 1 rows (OK)"));
        assert!(!text.contains("Validation issues"));
    }

    #[tokio::test]
    async fn test_unreadable_pdf_is_reported() {
        let (_dir, config) = setup(2);
        fs::write(config.scans_dir.join("MSA_Annual 1968.pdf"), b"not a pdf").unwrap();
        let extractor = ScriptedExtractor::new(vec![Ok(vec![row("1", "1", "1", "-")])]);
        let runner = BatchRunner::new(extractor, &config);
        let summary = runner.run().await.unwrap();

        assert_eq!(summary.reports.len(), 2);
        assert_eq!(summary.reports[0].year, "1967");
        assert_eq!(summary.reports[1].year, "1968");
        assert_eq!(summary.reports[1].extraction_errors.len(), 1);
        assert_eq!(summary.total_rows(), 1);
    }

    #[tokio::test]
    async fn test_no_pdfs() {
        let dir = TempDir::new().unwrap();
        let config = ExtractionConfig {
            scans_dir: dir.path().to_path_buf(),
            output_dir: dir.path().join("out"),
            ..ExtractionConfig::default()
        };
        let runner = BatchRunner::new(ScriptedExtractor::new(Vec::new()), &config);
        let summary = runner.run().await.unwrap();
        assert!(summary.reports.is_empty());
        assert!(!config.output_dir.exists());
    }

    #[tokio::test]
    async fn test_missing_scans_dir() {
        let dir = TempDir::new().unwrap();
        let config = ExtractionConfig {
            scans_dir: dir.path().join("missing"),
            ..ExtractionConfig::default()
        };
        let runner = BatchRunner::new(ScriptedExtractor::new(Vec::new()), &config);
        assert!(runner.run().await.is_err());
    }
}
