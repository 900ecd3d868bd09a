//! Structural completeness of the rows extracted from one page pair.
//!
//! Line numbers in a table run 1, 2, 3, ... without gaps. A page pair whose
//! rows skip, repeat or reorder numbers was most likely mis-extracted even
//! when every row is arithmetically consistent.

use crate::number::parse_line_number;
use crate::row::PermitRow;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Largest gap listed number by number; larger gaps are only counted.
pub const MAX_LISTED_MISSING: u64 = 100;

/// A structural anomaly in a row sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "lines", rename_all = "snake_case")]
pub enum SequenceIssue {
    /// Numbers of `1..=max` that never appear, ascending
    Missing(Vec<i64>),
    /// More than [`MAX_LISTED_MISSING`] numbers of `1..=max` never appear,
    /// usually because one line number was misread
    TooManyMissing {
        /// How many numbers are missing
        count: u64,
        /// Largest line number seen
        max: i64,
    },
    /// Numbers appearing more than once, ascending
    Duplicates(Vec<i64>),
    /// The numbers are not non-decreasing in extraction order
    OutOfOrder,
}

impl fmt::Display for SequenceIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing(lines) => write!(f, "Missing line numbers: {}", list(lines)),
            Self::TooManyMissing { count, max } => {
                write!(f, "Missing {count} line numbers up to {max}")
            }
            Self::Duplicates(lines) => write!(f, "Duplicate line numbers: {}", list(lines)),
            Self::OutOfOrder => f.write_str("Line numbers not in order"),
        }
    }
}

fn list(lines: &[i64]) -> String {
    let items: Vec<String> = lines.iter().map(ToString::to_string).collect();
    format!("[{}]", items.join(", "))
}

/// Line numbers that parse as integers, in extraction order.
///
/// Rows without a line number, or with a non-numeric one, are skipped; the
/// row validator reports the latter.
#[must_use = "returns the parsed line numbers"]
pub fn line_numbers(rows: &[PermitRow]) -> Vec<i64> {
    rows.iter()
        .filter_map(|row| row.line_number.as_deref())
        .filter_map(parse_line_number)
        .collect()
}

/// Check a page pair's rows for gaps, repeats and ordering.
///
/// The three checks are independent: all that apply are returned, in the
/// order missing, duplicates, out-of-order.
#[must_use = "returns the sequence issues found"]
pub fn validate_sequence(rows: &[PermitRow]) -> Vec<SequenceIssue> {
    check_line_numbers(&line_numbers(rows))
}

/// [`validate_sequence`] on already-parsed line numbers.
#[must_use = "returns the sequence issues found"]
pub fn check_line_numbers(numbers: &[i64]) -> Vec<SequenceIssue> {
    let Some(&max) = numbers.iter().max() else {
        return Vec::new();
    };

    let mut counts: BTreeMap<i64, usize> = BTreeMap::new();
    for n in numbers {
        *counts.entry(*n).or_default() += 1;
    }

    let mut issues = Vec::new();

    let seen: BTreeSet<i64> = counts.keys().copied().collect();
    issues.extend(missing_lines(&seen, max));

    let duplicates: Vec<i64> = counts
        .iter()
        .filter(|(_, count)| **count > 1)
        .map(|(n, _)| *n)
        .collect();
    if !duplicates.is_empty() {
        issues.push(SequenceIssue::Duplicates(duplicates));
    }

    if numbers.windows(2).any(|pair| pair[0] > pair[1]) {
        issues.push(SequenceIssue::OutOfOrder);
    }

    issues
}

/// Gaps in `1..=max`, walking only the numbers present.
fn missing_lines(seen: &BTreeSet<i64>, max: i64) -> Option<SequenceIssue> {
    if max < 1 {
        return None;
    }

    let present = seen.range(1..=max).count() as u64;
    let count = max.unsigned_abs() - present;
    if count == 0 {
        return None;
    }
    if count > MAX_LISTED_MISSING {
        return Some(SequenceIssue::TooManyMissing { count, max });
    }

    let mut missing = Vec::new();
    let mut next = 1;
    for &n in seen.range(1..=max) {
        missing.extend(next..n);
        next = n + 1;
    }
    Some(SequenceIssue::Missing(missing))
}
