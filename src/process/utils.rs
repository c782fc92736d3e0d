use once_cell::sync::Lazy;
use regex::Regex;

use crate::process::Cell;

// A `20xx` token not glued to other letters or digits. `_`, spaces and dots separate.
static YEAR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|[^0-9A-Za-z])(20\d{2})(?:[^0-9A-Za-z]|$)").unwrap());

/// Extracts the season year from a filename, e.g.
/// `"Metal Ligaen Teams 2022.xlsx"` → `Some(2022)`.
/// Returns `None` when no standalone `20xx` token is present.
pub fn extract_year_from_filename(filename: &str) -> Option<i32> {
    YEAR_RE
        .captures(filename)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Trim, lower-case, spaces → `_`, drop commas.
pub fn normalize_column_name(raw: &str) -> String {
    raw.trim_start_matches('\u{feff}')
        .trim()
        .to_lowercase()
        .replace(' ', "_")
        .replace(',', "")
}

/// Trim whitespace + strip outer quotes if present.
pub fn clean_str(raw: &str) -> &str {
    let trimmed = raw.trim();
    if trimmed.len() >= 2 && trimmed.starts_with('"') && trimmed.ends_with('"') {
        &trimmed[1..trimmed.len() - 1]
    } else {
        trimmed
    }
}

/// Infer a typed cell from a text field: empty → null, then integer, float,
/// boolean, and text as the fallback.
pub fn infer_cell_from_str(raw: &str) -> Cell {
    let s = clean_str(raw);
    if s.is_empty() {
        return Cell::Null;
    }
    if let Ok(i) = s.parse::<i64>() {
        return Cell::Int(i);
    }
    // Rust happily parses "nan" and "inf"; only accept things that look numeric.
    if s.bytes().any(|b| b.is_ascii_digit()) {
        if let Ok(f) = s.parse::<f64>() {
            if f.is_finite() {
                return Cell::Float(f);
            }
        }
    }
    match s {
        "True" | "TRUE" | "true" => Cell::Bool(true),
        "False" | "FALSE" | "false" => Cell::Bool(false),
        _ => Cell::Text(s.to_string()),
    }
}
