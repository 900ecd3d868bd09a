//! Extraction prompt, response schema and response parsing.

use anyhow::{Context, Result};
use permit_core::{Field, PermitRow};
use serde_json::{json, Map, Value};
use tracing::warn;

/// Instructions sent with every page pair.
pub const EXTRACTION_PROMPT: &str = r#"You are extracting data from scanned Census Building Permits Survey tables.

I'm showing you two consecutive pages from a report:
- The first page shows "Number of housing units" data
- The second page shows "Valuation (thousands of dollars)" data

Both pages have the same rows (matched by line_number). Extract all rows from both pages and join them by line_number.

Field mapping:
- line_number: Row number from the table
- smsa_name: Metropolitan statistical area name (e.g., "ABILENE, TEX.")
- total_units, private_total, private_1_unit, private_2_units, private_3_4_units, private_5plus_units, public_units, private_structures: From housing units page
- total_valuation, private_valuation, private_1_unit_val, private_2_units_val, private_3_4_units_val, private_5plus_units_val, public_valuation: From valuation page

IMPORTANT:
- Keep all values as strings exactly as printed (e.g., "1 234", "150", "-", "(X)")
- Use "-" for dashes/missing values
- Use "(X)" for suppressed data
- Include ALL rows, including sub-rows (like "INSIDE CENTRAL CITIES", "OUTSIDE CENTRAL CITY")

Extract ALL rows from these two pages:"#;

/// Keys of every row field, in table order.
#[must_use = "returns the row keys"]
pub fn row_keys() -> Vec<&'static str> {
    let mut keys = vec!["line_number", "smsa_name"];
    keys.extend(Field::ALL.iter().map(|f| f.key()));
    keys
}

/// Response schema `{rows: [row]}` with every row field a required string.
#[must_use = "returns the response schema"]
pub fn response_schema() -> Value {
    let keys = row_keys();
    let properties: Map<String, Value> = keys
        .iter()
        .map(|key| ((*key).to_string(), json!({ "type": "STRING" })))
        .collect();

    json!({
        "type": "OBJECT",
        "properties": {
            "rows": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": properties,
                    "required": keys,
                    "propertyOrdering": keys,
                }
            }
        },
        "required": ["rows"],
    })
}

/// Parse model output into rows.
///
/// Accepts `{"rows": [...]}` or a bare array, optionally wrapped in a
/// markdown code block. Empty output yields no rows; any other JSON shape
/// yields no rows and a warning.
///
/// # Errors
///
/// Returns an error if the text is not JSON or the rows are malformed.
pub fn parse_rows_response(text: &str) -> Result<Vec<PermitRow>> {
    let json_text = extract_json(text);
    if json_text.is_empty() {
        return Ok(Vec::new());
    }

    let value: Value = serde_json::from_str(&json_text).context("Failed to parse extraction JSON")?;
    let rows = match value {
        Value::Object(mut obj) => match obj.remove("rows") {
            Some(rows) => rows,
            None => {
                warn!("Unexpected response object without \"rows\"; treating as empty");
                return Ok(Vec::new());
            }
        },
        array @ Value::Array(_) => array,
        other => {
            warn!("Unexpected response format: {}", type_name(&other));
            return Ok(Vec::new());
        }
    };

    serde_json::from_value(rows).context("Failed to parse extracted rows")
}

const fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Extract JSON from response, handling markdown code blocks.
fn extract_json(text: &str) -> String {
    let text = text.trim();

    // Handle ```json ... ``` wrapper
    if text.starts_with("```") {
        if let Some(start) = text.find('\n') {
            let after_first_line = &text[start + 1..];
            if let Some(end) = after_first_line.rfind("```") {
                return after_first_line[..end].trim().to_string();
            }
        }
    }

    text.to_string()
}
