//! Aggregation of row and sequence checks over many page-pair outputs.
//!
//! A [`Validator`] turns row files into [`FileReport`]s and collects them into
//! a [`ValidationReport`]. Nothing here fails because of what a file
//! contains: unreadable and malformed files become report entries and the
//! scan moves on.

use crate::error::{CoreError, Result};
use crate::row::PermitRow;
use crate::sequence::{validate_sequence, SequenceIssue};
use crate::tolerance::TolerancePolicy;
use crate::validate::{RowIssue, RowValidator};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Read a JSON array of rows from disk.
///
/// # Errors
///
/// Returns [`CoreError::Io`] if the file cannot be read and
/// [`CoreError::Json`] if it is not an array of row objects.
pub fn load_rows(path: &Path) -> Result<Vec<PermitRow>> {
    let text = std::fs::read_to_string(path).map_err(|e| CoreError::io(path, e))?;
    Ok(serde_json::from_str(&text)?)
}

/// Write rows as a pretty-printed JSON array.
///
/// # Errors
///
/// Returns an error if serialization or the write fails.
pub fn save_rows(path: &Path, rows: &[PermitRow]) -> Result<()> {
    let json = serde_json::to_string_pretty(rows)?;
    std::fs::write(path, json).map_err(|e| CoreError::io(path, e))
}

/// All `*.json` files below `dir`, sorted.
///
/// # Errors
///
/// Returns an error if `dir` is not a readable directory.
pub fn find_row_files(dir: &Path) -> Result<Vec<PathBuf>> {
    std::fs::read_dir(dir).map_err(|e| CoreError::io(dir, e))?;

    let pattern = dir.join("**").join("*.json");
    let mut files: Vec<PathBuf> = glob::glob(&pattern.to_string_lossy())?
        .filter_map(std::result::Result::ok)
        .filter(|p| p.is_file())
        .collect();
    files.sort();
    Ok(files)
}

/// One diagnostic attached to a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "scope", rename_all = "snake_case")]
pub enum FileIssue {
    /// Issue with a single row
    Row {
        /// Printed line number, `?` when absent
        line_number: String,
        /// Area name, `Unknown` when absent
        area: String,
        /// What is wrong
        issue: RowIssue,
    },
    /// Issue with the row sequence as a whole
    Sequence {
        /// What is wrong
        issue: SequenceIssue,
    },
}

impl fmt::Display for FileIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Row {
                line_number,
                area,
                issue,
            } => write!(f, "Line {line_number} ({area}): {issue}"),
            Self::Sequence { issue } => fmt::Display::fmt(issue, f),
        }
    }
}

/// How a file was handled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FileOutcome {
    /// Rows were present and validated
    Checked,
    /// The file holds no rows
    Empty,
    /// The file could not be read as rows
    Malformed {
        /// Parse or I/O error text
        error: String,
    },
}

/// Validation result for one page-pair output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileReport {
    /// Path as shown in reports
    pub path: PathBuf,
    /// Number of rows read
    pub row_count: usize,
    /// How the file was handled
    #[serde(flatten)]
    pub outcome: FileOutcome,
    /// Validation diagnostics, rows first then sequence
    pub issues: Vec<FileIssue>,
}

impl FileReport {
    /// True when the file is malformed or has at least one diagnostic.
    #[inline]
    #[must_use = "returns whether the file has errors"]
    pub fn has_errors(&self) -> bool {
        matches!(self.outcome, FileOutcome::Malformed { .. }) || !self.issues.is_empty()
    }

    /// True when the file holds no rows.
    #[inline]
    #[must_use = "returns whether the file is empty"]
    pub fn is_empty(&self) -> bool {
        matches!(self.outcome, FileOutcome::Empty)
    }

    /// Messages to print for this file, one per line.
    #[must_use = "returns the file's messages"]
    pub fn messages(&self) -> Vec<String> {
        match &self.outcome {
            FileOutcome::Malformed { error } => vec![error.clone()],
            _ => self.issues.iter().map(ToString::to_string).collect(),
        }
    }
}

/// Aggregate counts over a report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSummary {
    /// Files examined
    pub files_scanned: usize,
    /// Rows across all readable files
    pub total_rows: usize,
    /// Files with no rows
    pub empty_files: usize,
    /// Files with at least one error
    pub files_with_errors: usize,
    /// Row and sequence diagnostics; malformed files do not count
    pub validation_errors: usize,
}

/// Validation result for a collection of page-pair outputs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    /// Aggregate counts
    pub summary: ReportSummary,
    /// Per-file results, in scan order
    pub files: Vec<FileReport>,
}

impl ValidationReport {
    /// Build a report, computing the summary from the files.
    #[must_use = "creates a validation report"]
    pub fn from_files(files: Vec<FileReport>) -> Self {
        let summary = ReportSummary {
            files_scanned: files.len(),
            total_rows: files.iter().map(|f| f.row_count).sum(),
            empty_files: files.iter().filter(|f| f.is_empty()).count(),
            files_with_errors: files.iter().filter(|f| f.has_errors()).count(),
            validation_errors: files.iter().map(|f| f.issues.len()).sum(),
        };
        Self { summary, files }
    }

    /// Files with no rows.
    pub fn empty_files(&self) -> impl Iterator<Item = &FileReport> {
        self.files.iter().filter(|f| f.is_empty())
    }

    /// Files with at least one error.
    pub fn files_with_errors(&self) -> impl Iterator<Item = &FileReport> {
        self.files.iter().filter(|f| f.has_errors())
    }

    /// True when no file has errors.
    #[inline]
    #[must_use = "returns whether the report is clean"]
    pub fn is_clean(&self) -> bool {
        self.summary.files_with_errors == 0
    }
}

/// Row and sequence validation over page-pair outputs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Validator {
    rows: RowValidator,
    check_sequence: bool,
}

impl Validator {
    /// Validator running row checks under `policy` and sequence checks.
    #[must_use = "creates a validator"]
    pub const fn new(policy: TolerancePolicy) -> Self {
        Self::with_row_validator(RowValidator::new(policy))
    }

    /// Validator around a preconfigured row validator.
    #[must_use = "creates a validator"]
    pub const fn with_row_validator(rows: RowValidator) -> Self {
        Self {
            rows,
            check_sequence: true,
        }
    }

    /// Enable or disable the sequence checks.
    #[must_use = "returns the reconfigured validator"]
    pub const fn with_sequence_check(mut self, enabled: bool) -> Self {
        self.check_sequence = enabled;
        self
    }

    /// Row validator in use.
    #[inline]
    #[must_use = "returns the row validator"]
    pub const fn row_validator(&self) -> &RowValidator {
        &self.rows
    }

    /// Diagnostics for one page pair's rows.
    #[must_use = "returns the issues found"]
    pub fn validate_rows(&self, rows: &[PermitRow]) -> Vec<FileIssue> {
        let mut issues: Vec<FileIssue> = rows
            .iter()
            .flat_map(|row| {
                self.rows
                    .validate_row(row)
                    .into_iter()
                    .map(move |issue| FileIssue::Row {
                        line_number: row.line_label().to_string(),
                        area: row.area_label().to_string(),
                        issue,
                    })
            })
            .collect();

        if self.check_sequence {
            issues.extend(
                validate_sequence(rows)
                    .into_iter()
                    .map(|issue| FileIssue::Sequence { issue }),
            );
        }

        issues
    }

    /// Report for rows already in memory.
    #[must_use = "returns the file report"]
    pub fn check_rows(&self, path: impl Into<PathBuf>, rows: &[PermitRow]) -> FileReport {
        let path = path.into();
        if rows.is_empty() {
            return FileReport {
                path,
                row_count: 0,
                outcome: FileOutcome::Empty,
                issues: Vec::new(),
            };
        }

        FileReport {
            path,
            row_count: rows.len(),
            outcome: FileOutcome::Checked,
            issues: self.validate_rows(rows),
        }
    }

    /// Report for a row file on disk, shown under `display_path`.
    #[must_use = "returns the file report"]
    pub fn check_file(&self, path: &Path, display_path: impl Into<PathBuf>) -> FileReport {
        match load_rows(path) {
            Ok(rows) => self.check_rows(display_path, &rows),
            Err(e) => FileReport {
                path: display_path.into(),
                row_count: 0,
                outcome: FileOutcome::Malformed {
                    error: e.to_string(),
                },
                issues: Vec::new(),
            },
        }
    }

    /// Report for in-memory row sets, e.g. from a test or another store.
    #[must_use = "returns the validation report"]
    pub fn check_collection<I, P>(&self, row_sets: I) -> ValidationReport
    where
        I: IntoIterator<Item = (P, Vec<PermitRow>)>,
        P: Into<PathBuf>,
    {
        ValidationReport::from_files(
            row_sets
                .into_iter()
                .map(|(path, rows)| self.check_rows(path, &rows))
                .collect(),
        )
    }

    /// Report for every `*.json` file below `dir`.
    ///
    /// Paths in the report are relative to `dir`.
    ///
    /// # Errors
    ///
    /// Returns an error only if `dir` cannot be listed.
    pub fn check_directory(&self, dir: &Path) -> Result<ValidationReport> {
        let files = find_row_files(dir)?
            .iter()
            .map(|path| {
                let display = path.strip_prefix(dir).unwrap_or(path).to_path_buf();
                self.check_file(path, display)
            })
            .collect();
        Ok(ValidationReport::from_files(files))
    }
}

impl Default for Validator {
    #[inline]
    fn default() -> Self {
        Self::new(TolerancePolicy::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::row::Field;

    fn row(line: &str, total: &str, private: &str, public: &str) -> PermitRow {
        PermitRow {
            line_number: Some(line.to_string()),
            smsa_name: Some("AKRON, OHIO".to_string()),
            ..PermitRow::default()
        }
        .with(Field::TotalUnits, total)
        .with(Field::PrivateTotal, private)
        .with(Field::PublicUnits, public)
    }

    fn valid_rows(n: usize) -> Vec<PermitRow> {
        (1..=n)
            .map(|i| row(&i.to_string(), "150", "140", "10"))
            .collect()
    }

    #[test]
    fn test_aggregate_counts() {
        let mut second = valid_rows(5);
        second[2] = row("3", "150", "130", "10");

        let report = Validator::new(TolerancePolicy::strict()).check_collection([
            ("1967/pages_01_02.json", Vec::new()),
            ("1967/pages_03_04.json", second),
            ("1967/pages_05_06.json", valid_rows(3)),
        ]);

        assert_eq!(
            report.summary,
            ReportSummary {
                files_scanned: 3,
                total_rows: 8,
                empty_files: 1,
                files_with_errors: 1,
                validation_errors: 1,
            }
        );
        let with_errors: Vec<_> = report.files_with_errors().collect();
        assert_eq!(with_errors[0].path, PathBuf::from("1967/pages_03_04.json"));
        assert_eq!(
            with_errors[0].messages(),
            vec!["Line 3 (AKRON, OHIO): total_units: 150 != 130 + 10 = 140 (diff=+10)"]
        );
        assert!(!report.is_clean());
    }

    #[test]
    fn test_sequence_issues_follow_row_issues() {
        let rows = vec![
            row("1", "150", "140", "10"),
            row("x", "150", "140", "10"),
            row("3", "150", "140", "10"),
        ];
        let issues = Validator::default().validate_rows(&rows);
        let messages: Vec<String> = issues.iter().map(ToString::to_string).collect();
        assert_eq!(
            messages,
            vec![
                "Line x (AKRON, OHIO): Invalid line_number: x",
                "Missing line numbers: [2]",
            ]
        );
    }

    #[test]
    fn test_sequence_check_can_be_disabled() {
        let rows = vec![row("2", "1", "1", "-")];
        let validator = Validator::default().with_sequence_check(false);
        assert!(validator.validate_rows(&rows).is_empty());
        assert_eq!(Validator::default().validate_rows(&rows).len(), 1);
    }

    #[test]
    fn test_empty_report_is_clean() {
        let report = Validator::default().check_collection(Vec::<(PathBuf, Vec<PermitRow>)>::new());
        assert!(report.is_clean());
        assert_eq!(report.summary, ReportSummary::default());
    }
}
