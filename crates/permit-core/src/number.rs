//! Interpretation of printed table cells as quantities.
//!
//! Scanned tables print numbers with a space as the thousands separator
//! (`"1 234"`), a dash for zero and `"(X)"` where the value was withheld.

/// Placeholder printed where the source table withheld a value.
pub const SUPPRESSION_MARKER: &str = "(X)";

/// Placeholder printed for a zero or empty cell.
pub const DASH_PLACEHOLDER: &str = "-";

/// Outcome of reading one cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParsedNumber {
    /// A printed integer
    Value(i64),
    /// Dash placeholder
    Zero,
    /// Suppressed, empty or unreadable
    Unknown,
}

impl ParsedNumber {
    /// Numeric value, or `None` when the cell is unknown.
    #[inline]
    #[must_use = "returns the numeric value if known"]
    pub const fn known(self) -> Option<i64> {
        match self {
            Self::Value(v) => Some(v),
            Self::Zero => Some(0),
            Self::Unknown => None,
        }
    }

    /// True when the cell cannot take part in arithmetic.
    #[inline]
    #[must_use = "returns whether the value is unknown"]
    pub const fn is_unknown(self) -> bool {
        matches!(self, Self::Unknown)
    }
}

/// Parse a printed cell.
///
/// - `""` and `"(X)"` are unknown
/// - `"-"` (surrounding whitespace allowed) is zero
/// - anything else has its spaces removed and is parsed as an integer
///   (surrounding tabs and newlines allowed), falling back to unknown
#[must_use = "returns the parsed cell"]
pub fn parse_number(raw: &str) -> ParsedNumber {
    if raw.is_empty() || raw == SUPPRESSION_MARKER {
        return ParsedNumber::Unknown;
    }
    if raw.trim() == DASH_PLACEHOLDER {
        return ParsedNumber::Zero;
    }

    let compact: String = raw.chars().filter(|c| *c != ' ').collect();
    compact
        .trim()
        .parse::<i64>()
        .map_or(ParsedNumber::Unknown, ParsedNumber::Value)
}

/// Parse a line-number cell the way the sequence checks expect it.
///
/// Unlike [`parse_number`], thousands separators are not removed: a line
/// number is a single token, optionally padded.
#[must_use = "returns the parsed line number if valid"]
pub fn parse_line_number(raw: &str) -> Option<i64> {
    raw.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_and_spaced_numbers() {
        assert_eq!(parse_number("150"), ParsedNumber::Value(150));
        assert_eq!(parse_number("1 234"), ParsedNumber::Value(1234));
        assert_eq!(parse_number("12 345 678"), ParsedNumber::Value(12_345_678));
        assert_eq!(parse_number(" 42 "), ParsedNumber::Value(42));
    }

    #[test]
    fn test_tab_and_newline_padding() {
        assert_eq!(parse_number("42\n"), ParsedNumber::Value(42));
        assert_eq!(parse_number("\t1 234"), ParsedNumber::Value(1234));
        assert_eq!(parse_number("\r\n-7\t"), ParsedNumber::Value(-7));
        assert_eq!(parse_number("\t-\n"), ParsedNumber::Zero);
        // Inner tabs are not thousands separators
        assert_eq!(parse_number("1\t234"), ParsedNumber::Unknown);
    }

    #[test]
    fn test_placeholders() {
        assert_eq!(parse_number("-"), ParsedNumber::Zero);
        assert_eq!(parse_number("  -  "), ParsedNumber::Zero);
        assert_eq!(parse_number("(X)"), ParsedNumber::Unknown);
        assert_eq!(parse_number(""), ParsedNumber::Unknown);
    }

    #[test]
    fn test_unreadable_cells_are_unknown() {
        assert_eq!(parse_number("1,234"), ParsedNumber::Unknown);
        assert_eq!(parse_number("12a"), ParsedNumber::Unknown);
        assert_eq!(parse_number("--"), ParsedNumber::Unknown);
        // Padded marker is not the marker, and not a number either
        assert_eq!(parse_number(" (X) "), ParsedNumber::Unknown);
    }

    #[test]
    fn test_known_values() {
        assert_eq!(ParsedNumber::Value(7).known(), Some(7));
        assert_eq!(ParsedNumber::Zero.known(), Some(0));
        assert_eq!(ParsedNumber::Unknown.known(), None);
        assert!(ParsedNumber::Unknown.is_unknown());
    }

    #[test]
    fn test_line_number() {
        assert_eq!(parse_line_number("12"), Some(12));
        assert_eq!(parse_line_number(" 3 "), Some(3));
        assert_eq!(parse_line_number("1 2"), None);
        assert_eq!(parse_line_number("12a"), None);
        assert_eq!(parse_line_number(""), None);
    }
}
