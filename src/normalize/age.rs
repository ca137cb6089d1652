//! Age-at-calving parsing.
//!
//! Herd books record ages as free text such as `"2 a 3 m"` (years, months),
//! `"3 ans"` or `"2y 11m"`. Ages are returned in months.

use crate::data::Value;
use regex::Regex;
use std::sync::OnceLock;

fn age_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(\d+)\s*[ay][a-z]*(?:\s*(\d+)\s*m)?").expect("age pattern is a valid regex")
    })
}

/// Parse an age string into months.
///
/// `<years> a|y… [<months> m…]` gives `years * 12 + months`; anything else is
/// read as a plain number. Unparsable or empty input gives `None`.
///
/// # Example
/// ```
/// use composable_h2::normalize::parse_age;
///
/// assert_eq!(parse_age("2 a 3 m"), Some(27.0));
/// assert_eq!(parse_age("5"), Some(5.0));
/// assert_eq!(parse_age(""), None);
/// ```
pub fn parse_age(raw: &str) -> Option<f64> {
    let s = raw.trim().to_lowercase();
    if s.is_empty() {
        return None;
    }

    if let Some(caps) = age_pattern().captures(&s) {
        let years: f64 = caps.get(1)?.as_str().parse().ok()?;
        let months: f64 = caps
            .get(2)
            .and_then(|m| m.as_str().parse().ok())
            .unwrap_or(0.0);
        return Some(years * 12.0 + months);
    }

    crate::data::parse_number(&s)
}

/// Parse an age cell. Numbers pass through unchanged.
pub fn parse_age_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(v) if v.is_finite() => Some(*v),
        Value::Number(_) | Value::Missing => None,
        Value::Text(s) => parse_age(s),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_years_and_months() {
        assert_eq!(parse_age("2 a 3 m"), Some(27.0));
        assert_eq!(parse_age("2a3m"), Some(27.0));
        assert_eq!(parse_age("3 ans 1 mois"), Some(37.0));
        assert_eq!(parse_age("2Y 11M"), Some(35.0));
    }

    #[test]
    fn test_years_only() {
        assert_eq!(parse_age("4 a"), Some(48.0));
        assert_eq!(parse_age("2 ans"), Some(24.0));
    }

    #[test]
    fn test_plain_number() {
        assert_eq!(parse_age("5"), Some(5.0));
        assert_eq!(parse_age(" 26.5 "), Some(26.5));
        assert_eq!(parse_age("27,5"), Some(27.5));
    }

    #[test]
    fn test_unparsable() {
        assert_eq!(parse_age(""), None);
        assert_eq!(parse_age("   "), None);
        assert_eq!(parse_age("unknown"), None);
        assert_eq!(parse_age("a 3 m"), None);
    }

    #[test]
    fn test_value_input() {
        assert_eq!(parse_age_value(&Value::Number(31.0)), Some(31.0));
        assert_eq!(parse_age_value(&Value::Text("1 a 1 m".into())), Some(13.0));
        assert_eq!(parse_age_value(&Value::Missing), None);
        assert_eq!(parse_age_value(&Value::Number(f64::NAN)), None);
    }
}
