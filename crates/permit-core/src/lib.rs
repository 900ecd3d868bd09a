//! # permit-core
//!
//! Row model and consistency validation for building permit tables extracted
//! from scanned Census reports.
//!
//! Each extracted row reports new housing units and their valuation, each as
//! a total, a public/private split and a private breakdown by structure
//! size. Those figures must add up. This crate checks that they do and
//! reports where they don't:
//!
//! 1. [`parse_number`] reads a printed cell (`"1 234"`, `"-"`, `"(X)"`)
//! 2. [`RowValidator`] applies the four sum checks under a [`TolerancePolicy`]
//! 3. [`validate_sequence`] looks for missing, repeated or reordered line numbers
//! 4. [`Validator`] aggregates both over many files into a [`ValidationReport`]
//!
//! ## Example
//!
//! ```
//! use permit_core::{Field, PermitRow, TolerancePolicy, Validator};
//!
//! let rows = vec![
//!     PermitRow {
//!         line_number: Some("1".into()),
//!         smsa_name: Some("ABILENE, TEX.".into()),
//!         ..PermitRow::default()
//!     }
//!     .with(Field::TotalUnits, "150")
//!     .with(Field::PrivateTotal, "140")
//!     .with(Field::PublicUnits, "10"),
//! ];
//!
//! let report = Validator::new(TolerancePolicy::strict())
//!     .check_collection([("1967/pages_01_02.json", rows)]);
//! assert!(report.is_clean());
//! assert_eq!(report.summary.total_rows, 1);
//! ```
//!
//! ## Tolerance
//!
//! - [`TolerancePolicy::lenient`]: `max(5, 1%)` for units, `max(10, 1%)` for
//!   valuations; used right after extraction
//! - [`TolerancePolicy::strict`]: ±1 for rounding; used for the audit pass
//!
//! Validation never fails and never mutates rows. Only reading row files
//! can produce a [`CoreError`].

pub mod error;
pub mod number;
pub mod render;
pub mod report;
pub mod row;
pub mod sequence;
pub mod tolerance;
pub mod validate;

pub use error::{CoreError, Result};
pub use number::{parse_number, ParsedNumber, SUPPRESSION_MARKER};
pub use render::{render_json, render_text};
pub use report::{
    find_row_files, load_rows, save_rows, FileIssue, FileOutcome, FileReport, ReportSummary,
    ValidationReport, Validator,
};
pub use row::{Field, PermitRow};
pub use sequence::{validate_sequence, SequenceIssue};
pub use tolerance::{Quantity, TolerancePolicy};
pub use validate::{Mismatch, RowIssue, RowValidator};
