//! Single page-pair trial run.
//!
//! Extracts one page pair, then reports per-row validation (with the
//! required-field check on), the line-number sequence and a sample of the
//! extracted rows. Used to try a model or prompt before a full batch.

use crate::extractor::TableExtractor;
use crate::pdf::{PagePair, ScannedReport};
use crate::pipeline::year_from_path;
use anyhow::Result;
use permit_core::sequence::{check_line_numbers, line_numbers};
use permit_core::{PermitRow, RowIssue, RowValidator, SequenceIssue, TolerancePolicy};
use std::fmt::{self, Write as _};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::info;

/// Number of rows shown in the sample section.
const SAMPLE_ROWS: usize = 3;

/// Default location of a trial's full output, e.g.
/// `output/test_extraction_1967_pages_1_2.json`.
#[must_use = "returns the output path"]
pub fn default_trial_output(pdf: &Path, pair: PagePair) -> PathBuf {
    PathBuf::from("output").join(format!(
        "test_extraction_{}_pages_{}_{}.json",
        year_from_path(pdf),
        pair.first,
        pair.second
    ))
}

/// Issues of one extracted row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowFinding {
    /// 1-based position in the extraction
    pub position: usize,
    /// Printed line number, or `?`
    pub line_number: String,
    /// Everything wrong with the row
    pub issues: Vec<RowIssue>,
}

/// Result of a trial extraction.
#[derive(Debug, Clone)]
pub struct PairTrial {
    /// Source scan
    pub pdf: PathBuf,
    /// Extracted pages
    pub pair: PagePair,
    /// Extracted rows
    pub rows: Vec<PermitRow>,
    /// Wall-clock extraction time
    pub elapsed: Duration,
}

impl PairTrial {
    /// Extract `pair` from `pdf`.
    ///
    /// # Errors
    ///
    /// Returns an error if the pages cannot be cut out or extraction fails.
    pub async fn run<E: TableExtractor + Sync>(
        extractor: &E,
        pdf: &Path,
        pair: PagePair,
    ) -> Result<Self> {
        let report = ScannedReport::open(pdf)?;
        let bytes = report.extract_pages(&[pair.first, pair.second])?;
        info!(
            "Extracted {:.1} KB for pages {pair} of {}",
            bytes.len() as f64 / 1024.0,
            pdf.display()
        );

        let start = Instant::now();
        let display_name = format!(
            "{}_pages_{:02}_{:02}.pdf",
            year_from_path(pdf),
            pair.first,
            pair.second
        );
        let rows = extractor.extract(&bytes, &display_name).await?;

        Ok(Self {
            pdf: pdf.to_path_buf(),
            pair,
            rows,
            elapsed: start.elapsed(),
        })
    }

    /// Rows with issues under the lenient policy, required fields included.
    #[must_use = "returns the row findings"]
    pub fn row_findings(&self) -> Vec<RowFinding> {
        let validator =
            RowValidator::new(TolerancePolicy::lenient()).with_required_fields(true);

        self.rows
            .iter()
            .enumerate()
            .filter_map(|(i, row)| {
                let issues = validator.validate_row(row);
                (!issues.is_empty()).then(|| RowFinding {
                    position: i + 1,
                    line_number: row.line_label().to_string(),
                    issues,
                })
            })
            .collect()
    }

    /// Line-number sequence issues of the extraction.
    #[must_use = "returns the sequence issues"]
    pub fn sequence_issues(&self) -> Vec<SequenceIssue> {
        check_line_numbers(&line_numbers(&self.rows))
    }

    /// Full trial report: validation, sequence check and row sample.
    #[must_use = "returns the rendered report"]
    pub fn render(&self) -> String {
        let mut out = String::new();
        // Writing to a String cannot fail
        let _ = self.write_report(&mut out);
        out
    }

    fn write_report(&self, out: &mut String) -> fmt::Result {
        let rule = "=".repeat(60);
        writeln!(out, "Extraction took {:.1} seconds", self.elapsed.as_secs_f64())?;

        if self.rows.is_empty() {
            writeln!(out, "No data extracted!")?;
            return Ok(());
        }

        writeln!(out, "\n{rule}\nValidation Results\n{rule}")?;
        let findings = self.row_findings();
        for finding in &findings {
            let messages: Vec<String> = finding.issues.iter().map(ToString::to_string).collect();
            writeln!(
                out,
                "Row {} (line {}): {}",
                finding.position,
                finding.line_number,
                messages.join(", ")
            )?;
        }
        let total: usize = findings.iter().map(|f| f.issues.len()).sum();
        if total == 0 {
            writeln!(out, "All rows passed validation!")?;
        } else {
            writeln!(out, "\nTotal validation errors: {total}")?;
        }

        writeln!(out, "\n{rule}\nLine Number Sequence Check\n{rule}")?;
        let numbers = line_numbers(&self.rows);
        let issues = check_line_numbers(&numbers);
        for issue in &issues {
            match issue {
                SequenceIssue::OutOfOrder => {
                    writeln!(out, "WARNING: Line numbers are not in ascending order")?;
                }
                other => writeln!(out, "{other}")?,
            }
        }
        let gaps_or_repeats = issues
            .iter()
            .any(|i| !matches!(i, SequenceIssue::OutOfOrder));
        if let Some(max) = numbers.iter().max() {
            if !gaps_or_repeats {
                writeln!(out, "Line numbers 1-{max} are complete and sequential!")?;
            }
        }

        writeln!(out, "\n{rule}\nSample Output (first {SAMPLE_ROWS} rows)\n{rule}")?;
        for row in self.rows.iter().take(SAMPLE_ROWS) {
            let json = serde_json::to_string_pretty(row).map_err(|_| fmt::Error)?;
            writeln!(out, "{json}\n{}", "-".repeat(40))?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use permit_core::Field;

    fn trial(rows: Vec<PermitRow>) -> PairTrial {
        PairTrial {
            pdf: PathBuf::from("scans/MSA_Annual 1967.pdf"),
            pair: PagePair::starting_at(1),
            rows,
            elapsed: Duration::from_millis(12_300),
        }
    }

    fn row(line: &str) -> PermitRow {
        PermitRow {
            line_number: Some(line.to_string()),
            smsa_name: Some("ABILENE, TEX.".to_string()),
            ..PermitRow::default()
        }
        .with(Field::TotalUnits, "100")
        .with(Field::PrivateTotal, "90")
        .with(Field::PublicUnits, "10")
    }

    #[test]
    fn test_default_trial_output() {
        assert_eq!(
            default_trial_output(Path::new("scans/MSA_Annual 1967.pdf"), PagePair::starting_at(1)),
            PathBuf::from("output/test_extraction_1967_pages_1_2.json")
        );
    }

    #[test]
    fn test_clean_trial() {
        let report = trial(vec![row("1"), row("2"), row("3"), row("4")]).render();
        assert!(report.starts_with("Extraction took 12.3 seconds"));
        assert!(report.contains("All rows passed validation!"));
        assert!(report.contains("Line numbers 1-4 are complete and sequential!"));
        assert_eq!(report.matches(&"-".repeat(40)).count(), 3);
    }

    #[test]
    fn test_required_fields_are_checked() {
        let mut missing_name = row("2");
        missing_name.smsa_name = None;
        let trial = trial(vec![row("1"), missing_name]);

        let findings = trial.row_findings();
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].position, 2);
        assert_eq!(findings[0].line_number, "2");

        let report = trial.render();
        assert!(report.contains("Row 2 (line 2): Missing required field: smsa_name"));
        assert!(report.contains("Total validation errors: 1"));
    }

    #[test]
    fn test_sequence_section() {
        let report = trial(vec![row("1"), row("3"), row("2"), row("2")]).render();
        assert!(report.contains("Duplicate line numbers: [2]"));
        assert!(report.contains("WARNING: Line numbers are not in ascending order"));
        assert!(!report.contains("complete and sequential"));

        let gaps = trial(vec![row("1"), row("4")]).render();
        assert!(gaps.contains("Missing line numbers: [2, 3]"));
    }

    #[test]
    fn test_empty_trial() {
        let report = trial(Vec::new()).render();
        assert!(report.contains("No data extracted!"));
        assert!(!report.contains("Validation Results"));
    }
}
