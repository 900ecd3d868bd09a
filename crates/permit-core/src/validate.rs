//! Per-row arithmetic consistency checks.
//!
//! Each row carries two groups of figures (unit counts and valuations), and
//! each group has a total, a public/private split and a private breakdown by
//! structure size. [`CHECKS`] lists the four relations these figures must
//! satisfy. A check is skipped when any of its cells is unknown.
//!
//! ```
//! use permit_core::{Field, PermitRow, RowValidator, TolerancePolicy};
//!
//! let row = PermitRow::default()
//!     .with(Field::TotalUnits, "150")
//!     .with(Field::PrivateTotal, "130")
//!     .with(Field::PublicUnits, "10");
//!
//! let issues = RowValidator::new(TolerancePolicy::strict()).validate_row(&row);
//! assert_eq!(issues.len(), 1);
//! assert_eq!(
//!     issues[0].to_string(),
//!     "total_units: 150 != 130 + 10 = 140 (diff=+10)"
//! );
//! ```

use crate::number::{parse_line_number, parse_number};
use crate::row::{Field, PermitRow};
use crate::tolerance::{Quantity, TolerancePolicy};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A relation `total == sum(parts)` between cells of one row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsistencyCheck {
    /// Cell holding the reported total
    pub total: Field,
    /// Cells that should add up to the total
    pub parts: &'static [Field],
    /// Which tolerance floor applies
    pub quantity: Quantity,
}

/// The four relations checked on every row.
pub const CHECKS: [ConsistencyCheck; 4] = [
    ConsistencyCheck {
        total: Field::TotalUnits,
        parts: &[Field::PrivateTotal, Field::PublicUnits],
        quantity: Quantity::Units,
    },
    ConsistencyCheck {
        total: Field::PrivateTotal,
        parts: &[
            Field::Private1Unit,
            Field::Private2Units,
            Field::Private34Units,
            Field::Private5PlusUnits,
        ],
        quantity: Quantity::Units,
    },
    ConsistencyCheck {
        total: Field::TotalValuation,
        parts: &[Field::PrivateValuation, Field::PublicValuation],
        quantity: Quantity::Valuation,
    },
    ConsistencyCheck {
        total: Field::PrivateValuation,
        parts: &[
            Field::Private1UnitVal,
            Field::Private2UnitsVal,
            Field::Private34UnitsVal,
            Field::Private5PlusUnitsVal,
        ],
        quantity: Quantity::Valuation,
    },
];

impl ConsistencyCheck {
    /// Evaluate the check on a row.
    ///
    /// Returns `None` when the check passes or cannot be evaluated.
    #[must_use = "returns the mismatch if the check failed"]
    pub fn evaluate(&self, row: &PermitRow, policy: &TolerancePolicy) -> Option<Mismatch> {
        let total = parse_number(row.get(self.total)).known()?;
        let parts = self
            .parts
            .iter()
            .map(|field| parse_number(row.get(*field)).known())
            .collect::<Option<Vec<i64>>>()?;

        // Wide enough that no sum of i64 cells can overflow
        let expected: i128 = parts.iter().copied().map(i128::from).sum();
        let diff = i128::from(total) - expected;
        if policy.accepts(self.quantity, total, diff) {
            return None;
        }

        Some(Mismatch {
            field: self.total.key().to_string(),
            total,
            parts,
            expected,
            diff,
        })
    }
}

/// A failed consistency check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mismatch {
    /// Key of the total cell, which names the check
    pub field: String,
    /// Reported total
    pub total: i64,
    /// Reported parts, in check order
    pub parts: Vec<i64>,
    /// Sum of the parts
    pub expected: i128,
    /// `total - expected`
    pub diff: i128,
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} != ", self.field, self.total)?;
        for (i, part) in self.parts.iter().enumerate() {
            if i > 0 {
                f.write_str(" + ")?;
            }
            write!(f, "{part}")?;
        }
        write!(f, " = {} (diff={:+})", self.expected, self.diff)
    }
}

/// Something wrong with a single row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RowIssue {
    /// The line number is present but not an integer
    InvalidLineNumber {
        /// Printed value
        value: String,
    },
    /// A required cell is absent or empty
    MissingField {
        /// Key of the missing cell
        field: String,
    },
    /// An arithmetic relation is outside tolerance
    Mismatch(Mismatch),
}

impl fmt::Display for RowIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidLineNumber { value } => write!(f, "Invalid line_number: {value}"),
            Self::MissingField { field } => write!(f, "Missing required field: {field}"),
            Self::Mismatch(m) => fmt::Display::fmt(m, f),
        }
    }
}

/// Cells that must be present when required-field checking is enabled.
pub const REQUIRED_FIELDS: [&str; 4] = ["line_number", "smsa_name", "total_units", "private_total"];

/// Validates single rows against a tolerance policy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RowValidator {
    policy: TolerancePolicy,
    check_line_numbers: bool,
    require_fields: bool,
}

impl RowValidator {
    /// Validator with line-number checking on and required fields off.
    #[must_use = "creates a row validator"]
    pub const fn new(policy: TolerancePolicy) -> Self {
        Self {
            policy,
            check_line_numbers: true,
            require_fields: false,
        }
    }

    /// Enable or disable the non-numeric line-number check.
    #[must_use = "returns the reconfigured validator"]
    pub const fn with_line_number_check(mut self, enabled: bool) -> Self {
        self.check_line_numbers = enabled;
        self
    }

    /// Enable or disable the required-field check.
    #[must_use = "returns the reconfigured validator"]
    pub const fn with_required_fields(mut self, enabled: bool) -> Self {
        self.require_fields = enabled;
        self
    }

    /// Tolerance policy in use.
    #[inline]
    #[must_use = "returns the tolerance policy"]
    pub const fn policy(&self) -> &TolerancePolicy {
        &self.policy
    }

    /// All issues of one row, in check order. Never mutates the row.
    #[must_use = "returns the issues found"]
    pub fn validate_row(&self, row: &PermitRow) -> Vec<RowIssue> {
        let mut issues = Vec::new();

        if self.require_fields {
            issues.extend(missing_required_fields(row).map(|field| RowIssue::MissingField {
                field: field.to_string(),
            }));
        }

        if self.check_line_numbers {
            if let Some(value) = row.line_number.as_deref() {
                if parse_line_number(value).is_none() {
                    issues.push(RowIssue::InvalidLineNumber {
                        value: value.to_string(),
                    });
                }
            }
        }

        issues.extend(
            CHECKS
                .iter()
                .filter_map(|check| check.evaluate(row, &self.policy))
                .map(RowIssue::Mismatch),
        );

        issues
    }
}

impl Default for RowValidator {
    #[inline]
    fn default() -> Self {
        Self::new(TolerancePolicy::default())
    }
}

fn missing_required_fields(row: &PermitRow) -> impl Iterator<Item = &'static str> + '_ {
    REQUIRED_FIELDS.into_iter().filter(|key| {
        let value = match *key {
            "line_number" => row.line_number.as_deref().unwrap_or(""),
            "smsa_name" => row.smsa_name.as_deref().unwrap_or(""),
            "total_units" => row.get(Field::TotalUnits),
            _ => row.get(Field::PrivateTotal),
        };
        value.is_empty()
    })
}
