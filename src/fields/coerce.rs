//! Text to value coercion for free-text fields

use crate::config::ConfigValue;

/// Interpret edited text the way the worker config expects.
///
/// Text without a `.` is tried as an integer, text with a `.` as a float.
/// Anything else is kept as a string. Whitespace around numbers is ignored.
/// A float too large for JSON is an error, not a string.
pub fn coerce_text(text: &str) -> Result<ConfigValue, String> {
    let trimmed = text.trim();
    let parsed = if trimmed.contains('.') {
        match trimmed.parse::<f64>() {
            Ok(f) if !f.is_finite() => return Err(format!("'{trimmed}' is out of range")),
            Ok(f) => Some(ConfigValue::Float(f)),
            Err(_) => None,
        }
    } else {
        trimmed.parse::<i64>().ok().map(ConfigValue::Int)
    };
    Ok(parsed.unwrap_or_else(|| ConfigValue::Text(text.to_string())))
}
