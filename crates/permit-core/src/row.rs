//! The row model shared by extraction and validation.
//!
//! A [`PermitRow`] is one line of a two-page table pair: the housing-unit
//! counts from the first page joined with the valuations from the second
//! page by line number. Every cell is kept as printed.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Named numeric cells of a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    /// All new housing units
    TotalUnits,
    /// Privately owned units
    PrivateTotal,
    /// Private one-unit structures
    Private1Unit,
    /// Private two-unit structures
    Private2Units,
    /// Private three- and four-unit structures
    Private34Units,
    /// Private structures with five or more units
    Private5PlusUnits,
    /// Publicly owned units
    PublicUnits,
    /// Number of private structures
    PrivateStructures,
    /// Total valuation
    TotalValuation,
    /// Valuation of private construction
    PrivateValuation,
    /// Valuation, private one-unit structures
    Private1UnitVal,
    /// Valuation, private two-unit structures
    Private2UnitsVal,
    /// Valuation, private three- and four-unit structures
    Private34UnitsVal,
    /// Valuation, private structures with five or more units
    Private5PlusUnitsVal,
    /// Valuation of public construction
    PublicValuation,
}

impl Field {
    /// Every numeric field, in table order.
    pub const ALL: [Self; 15] = [
        Self::TotalUnits,
        Self::PrivateTotal,
        Self::Private1Unit,
        Self::Private2Units,
        Self::Private34Units,
        Self::Private5PlusUnits,
        Self::PublicUnits,
        Self::PrivateStructures,
        Self::TotalValuation,
        Self::PrivateValuation,
        Self::Private1UnitVal,
        Self::Private2UnitsVal,
        Self::Private34UnitsVal,
        Self::Private5PlusUnitsVal,
        Self::PublicValuation,
    ];

    /// JSON key of the field.
    #[inline]
    #[must_use = "returns the field key"]
    pub const fn key(self) -> &'static str {
        match self {
            Self::TotalUnits => "total_units",
            Self::PrivateTotal => "private_total",
            Self::Private1Unit => "private_1_unit",
            Self::Private2Units => "private_2_units",
            Self::Private34Units => "private_3_4_units",
            Self::Private5PlusUnits => "private_5plus_units",
            Self::PublicUnits => "public_units",
            Self::PrivateStructures => "private_structures",
            Self::TotalValuation => "total_valuation",
            Self::PrivateValuation => "private_valuation",
            Self::Private1UnitVal => "private_1_unit_val",
            Self::Private2UnitsVal => "private_2_units_val",
            Self::Private34UnitsVal => "private_3_4_units_val",
            Self::Private5PlusUnitsVal => "private_5plus_units_val",
            Self::PublicValuation => "public_valuation",
        }
    }
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

/// One extracted table row.
///
/// Missing keys deserialize to empty strings, which the validator reads as
/// unknown. Numbers and `null` are accepted in place of strings. Keys not
/// listed here are kept in [`PermitRow::extra`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermitRow {
    /// Row number printed in the table
    #[serde(
        default,
        deserialize_with = "optional_cell",
        skip_serializing_if = "Option::is_none"
    )]
    pub line_number: Option<String>,
    /// Metropolitan statistical area (or sub-area) name
    #[serde(
        default,
        deserialize_with = "optional_cell",
        skip_serializing_if = "Option::is_none"
    )]
    pub smsa_name: Option<String>,

    #[serde(default, deserialize_with = "cell")]
    pub total_units: String,
    #[serde(default, deserialize_with = "cell")]
    pub private_total: String,
    #[serde(default, deserialize_with = "cell")]
    pub private_1_unit: String,
    #[serde(default, deserialize_with = "cell")]
    pub private_2_units: String,
    #[serde(default, deserialize_with = "cell")]
    pub private_3_4_units: String,
    #[serde(default, deserialize_with = "cell")]
    pub private_5plus_units: String,
    #[serde(default, deserialize_with = "cell")]
    pub public_units: String,
    #[serde(default, deserialize_with = "cell")]
    pub private_structures: String,

    #[serde(default, deserialize_with = "cell")]
    pub total_valuation: String,
    #[serde(default, deserialize_with = "cell")]
    pub private_valuation: String,
    #[serde(default, deserialize_with = "cell")]
    pub private_1_unit_val: String,
    #[serde(default, deserialize_with = "cell")]
    pub private_2_units_val: String,
    #[serde(default, deserialize_with = "cell")]
    pub private_3_4_units_val: String,
    #[serde(default, deserialize_with = "cell")]
    pub private_5plus_units_val: String,
    #[serde(default, deserialize_with = "cell")]
    pub public_valuation: String,

    /// Keys outside the table schema, preserved as-is
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PermitRow {
    /// Raw text of a numeric field.
    #[must_use = "returns the raw cell text"]
    pub fn get(&self, field: Field) -> &str {
        match field {
            Field::TotalUnits => &self.total_units,
            Field::PrivateTotal => &self.private_total,
            Field::Private1Unit => &self.private_1_unit,
            Field::Private2Units => &self.private_2_units,
            Field::Private34Units => &self.private_3_4_units,
            Field::Private5PlusUnits => &self.private_5plus_units,
            Field::PublicUnits => &self.public_units,
            Field::PrivateStructures => &self.private_structures,
            Field::TotalValuation => &self.total_valuation,
            Field::PrivateValuation => &self.private_valuation,
            Field::Private1UnitVal => &self.private_1_unit_val,
            Field::Private2UnitsVal => &self.private_2_units_val,
            Field::Private34UnitsVal => &self.private_3_4_units_val,
            Field::Private5PlusUnitsVal => &self.private_5plus_units_val,
            Field::PublicValuation => &self.public_valuation,
        }
    }

    /// Set a numeric field, returning the row for chaining.
    #[must_use = "returns the updated row"]
    pub fn with(mut self, field: Field, value: impl Into<String>) -> Self {
        let value = value.into();
        match field {
            Field::TotalUnits => self.total_units = value,
            Field::PrivateTotal => self.private_total = value,
            Field::Private1Unit => self.private_1_unit = value,
            Field::Private2Units => self.private_2_units = value,
            Field::Private34Units => self.private_3_4_units = value,
            Field::Private5PlusUnits => self.private_5plus_units = value,
            Field::PublicUnits => self.public_units = value,
            Field::PrivateStructures => self.private_structures = value,
            Field::TotalValuation => self.total_valuation = value,
            Field::PrivateValuation => self.private_valuation = value,
            Field::Private1UnitVal => self.private_1_unit_val = value,
            Field::Private2UnitsVal => self.private_2_units_val = value,
            Field::Private34UnitsVal => self.private_3_4_units_val = value,
            Field::Private5PlusUnitsVal => self.private_5plus_units_val = value,
            Field::PublicValuation => self.public_valuation = value,
        }
        self
    }

    /// Line number as printed, `?` when absent.
    #[must_use = "returns the display line number"]
    pub fn line_label(&self) -> &str {
        self.line_number.as_deref().unwrap_or("?")
    }

    /// Area name as printed, `Unknown` when absent.
    #[must_use = "returns the display area name"]
    pub fn area_label(&self) -> &str {
        self.smsa_name.as_deref().unwrap_or("Unknown")
    }
}

/// Accept a string, a number or `null` for a table cell.
fn cell<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(optional_cell(deserializer)?.unwrap_or_default())
}

fn optional_cell<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s)),
        Value::Number(n) => Ok(Some(n.to_string())),
        Value::Bool(b) => Ok(Some(b.to_string())),
        other => Err(serde::de::Error::custom(format!(
            "expected a string cell, found {other}"
        ))),
    }
}
