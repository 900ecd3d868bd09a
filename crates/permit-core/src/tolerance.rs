//! Rules deciding whether an arithmetic discrepancy is reported.
//!
//! A discrepancy is accepted when its magnitude does not exceed
//! `max(floor, round(share * |total|))`, where the floor depends on whether
//! the check compares unit counts or valuations. The share is kept in basis
//! points so rounding is exact integer arithmetic.

use serde::{Deserialize, Serialize};

/// What a consistency check compares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Quantity {
    /// Housing unit counts
    Units,
    /// Valuations in thousands of dollars
    Valuation,
}

/// Tolerance applied to every consistency check of a validator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TolerancePolicy {
    /// Minimum accepted difference for unit counts
    pub units_floor: i64,
    /// Minimum accepted difference for valuations
    pub valuation_floor: i64,
    /// Share of the total that is also accepted, in basis points (100 = 1%)
    pub basis_points: i64,
}

impl TolerancePolicy {
    /// Tolerance for first-pass checking of fresh extractions.
    ///
    /// OCR noise on large tables and rounding of the constituent values are
    /// common, so 1% of the total (at least 5 units / 10 thousand dollars)
    /// is accepted.
    #[must_use = "returns the lenient policy"]
    pub const fn lenient() -> Self {
        Self {
            units_floor: 5,
            valuation_floor: 10,
            basis_points: 100,
        }
    }

    /// Tolerance for the audit pass: rounding only.
    #[must_use = "returns the strict policy"]
    pub const fn strict() -> Self {
        Self::max_abs_diff(1)
    }

    /// A fixed absolute tolerance, independent of the totals.
    #[must_use = "returns a fixed-tolerance policy"]
    pub const fn max_abs_diff(diff: i64) -> Self {
        Self {
            units_floor: diff,
            valuation_floor: diff,
            basis_points: 0,
        }
    }

    /// Largest difference accepted for a check on `total`.
    #[must_use = "returns the accepted difference"]
    pub fn allowed_difference(&self, quantity: Quantity, total: i64) -> i64 {
        let floor = match quantity {
            Quantity::Units => self.units_floor,
            Quantity::Valuation => self.valuation_floor,
        };
        // Half rounds up
        let scaled = i128::from(total.unsigned_abs()) * i128::from(self.basis_points);
        let relative = i64::try_from((scaled + 5_000) / 10_000).unwrap_or(i64::MAX);
        floor.max(relative)
    }

    /// Whether `diff` is within tolerance for a check on `total`.
    #[inline]
    #[must_use = "returns whether the difference is accepted"]
    pub fn accepts(&self, quantity: Quantity, total: i64, diff: i128) -> bool {
        diff.unsigned_abs() <= u128::from(self.allowed_difference(quantity, total).unsigned_abs())
    }
}

impl Default for TolerancePolicy {
    #[inline]
    fn default() -> Self {
        Self::lenient()
    }
}
