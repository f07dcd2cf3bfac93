//! Locale-aware formatting for dashboard values.
//!
//! Reproduces the fr-FR output of the browser `Intl.NumberFormat` the
//! dashboard was designed around:
//!
//! | Kind       | Example input | Output            |
//! |------------|---------------|-------------------|
//! | number     | `1234567.6`   | `1 234 568`       |
//! | currency   | `1234.5`      | `1 234,500 TND`   |
//! | percentage | `33.333`      | `33.3`            |
//! | ratio      | `0.1`         | `10`              |
//!
//! Group separators are U+202F (narrow no-break space); the currency code is
//! preceded by U+00A0 (no-break space).

/// Rendered in place of a value that cannot be computed.
pub const PLACEHOLDER: &str = "—";

const NARROW_NBSP: char = '\u{202f}';
const NBSP: char = '\u{a0}';

/// Number and currency formatting rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NumberFormat {
    pub group_separator: char,
    pub decimal_separator: char,
    /// ISO 4217 code appended to currency values.
    pub currency: String,
    /// Fraction digits shown for currency values.
    pub currency_decimals: usize,
}

impl Default for NumberFormat {
    fn default() -> Self {
        Self::fr_fr("TND")
    }
}

impl NumberFormat {
    /// French grouping and decimal rules for the given currency code.
    pub fn fr_fr(currency: &str) -> Self {
        Self {
            group_separator: NARROW_NBSP,
            decimal_separator: ',',
            currency: currency.to_ascii_uppercase(),
            currency_decimals: currency_decimals(currency),
        }
    }

    /// Round to the nearest integer (ties toward +∞) and group thousands.
    pub fn number(&self, value: f64) -> String {
        if !value.is_finite() {
            return PLACEHOLDER.to_string();
        }
        let rounded = round_half_up(value);
        let digits = format!("{:.0}", rounded.abs());
        let grouped = group_digits(&digits, self.group_separator);
        if rounded < 0.0 {
            format!("-{grouped}")
        } else {
            grouped
        }
    }

    /// Format a monetary amount, e.g. `1 234,500 TND`.
    pub fn currency(&self, value: f64) -> String {
        if !value.is_finite() {
            return PLACEHOLDER.to_string();
        }
        let fixed = format!("{:.*}", self.currency_decimals, value.abs());
        let (int_part, frac_part) = match fixed.split_once('.') {
            Some((i, f)) => (i, Some(f)),
            None => (fixed.as_str(), None),
        };

        let mut out = String::new();
        let is_zero = fixed.chars().all(|c| c == '0' || c == '.');
        if value < 0.0 && !is_zero {
            out.push('-');
        }
        out.push_str(&group_digits(int_part, self.group_separator));
        if let Some(frac) = frac_part {
            out.push(self.decimal_separator);
            out.push_str(frac);
        }
        out.push(NBSP);
        out.push_str(&self.currency);
        out
    }

    /// Optional number: `None` renders as [`PLACEHOLDER`].
    pub fn number_or_placeholder(&self, value: Option<f64>) -> String {
        value.map_or_else(|| PLACEHOLDER.to_string(), |v| self.number(v))
    }

    /// Optional currency: `None` renders as [`PLACEHOLDER`].
    pub fn currency_or_placeholder(&self, value: Option<f64>) -> String {
        value.map_or_else(|| PLACEHOLDER.to_string(), |v| self.currency(v))
    }
}

/// Percentage with exactly one decimal place and a `.` decimal point.
pub fn percentage(value: f64) -> String {
    format!("{:.1}", value)
}

/// Ratio × 100 in shortest round-trip form, without rounding.
///
/// `0.1` → `10`, `0.15` → `15.000000000000002`, `0.125` → `12.5`.
pub fn ratio_as_percent(ratio: f64) -> String {
    let value = ratio * 100.0;
    // -0 prints as "-0"
    if value == 0.0 {
        return "0".to_string();
    }
    format!("{value}")
}

/// Insert `separator` between every group of three digits.
pub fn group_digits(digits: &str, separator: char) -> String {
    let len = digits.chars().count();
    let mut out = String::with_capacity(digits.len() + len / 3 * separator.len_utf8());
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            out.push(separator);
        }
        out.push(ch);
    }
    out
}

/// Nearest integer with ties toward +∞, exact for every finite input.
fn round_half_up(value: f64) -> f64 {
    let away = value.round();
    if value - away == 0.5 { away + 1.0 } else { away }
}

/// Minor-unit digits for a currency code.
fn currency_decimals(code: &str) -> usize {
    match code.to_ascii_uppercase().as_str() {
        "TND" | "BHD" | "IQD" | "JOD" | "KWD" | "LYD" | "OMR" => 3,
        "JPY" | "KRW" | "CLP" | "VND" | "XOF" | "XAF" => 0,
        _ => 2,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn number_groups_thousands() {
        let fmt = NumberFormat::default();
        assert_eq!(fmt.number(0.0), "0");
        assert_eq!(fmt.number(999.0), "999");
        assert_eq!(fmt.number(1000.0), "1\u{202f}000");
        assert_eq!(fmt.number(1234567.0), "1\u{202f}234\u{202f}567");
    }

    #[test]
    fn number_rounds_like_math_round() {
        let fmt = NumberFormat::default();
        assert_eq!(fmt.number(49.5), "50");
        assert_eq!(fmt.number(49.49), "49");
        assert_eq!(fmt.number(-2.5), "-2");
        assert_eq!(fmt.number(-0.3), "0");
        assert_eq!(fmt.number(-1234.6), "-1\u{202f}235");
    }

    #[test]
    fn number_rounding_is_exact_at_float_edges() {
        let fmt = NumberFormat::default();
        // largest double below 0.5
        assert_eq!(fmt.number(0.49999999999999994), "0");
        assert_eq!(fmt.number(-0.5), "0");
        assert_eq!(
            fmt.number(4503599627370497.0),
            "4\u{202f}503\u{202f}599\u{202f}627\u{202f}370\u{202f}497"
        );
    }

    #[test]
    fn number_non_finite_is_placeholder() {
        let fmt = NumberFormat::default();
        assert_eq!(fmt.number(f64::NAN), PLACEHOLDER);
        assert_eq!(fmt.number(f64::INFINITY), PLACEHOLDER);
    }

    #[test]
    fn currency_uses_three_decimals_for_tnd() {
        let fmt = NumberFormat::default();
        assert_eq!(fmt.currency(300.0), "300,000\u{a0}TND");
        assert_eq!(fmt.currency(1234.5), "1\u{202f}234,500\u{a0}TND");
        assert_eq!(fmt.currency(-12.25), "-12,250\u{a0}TND");
    }

    #[test]
    fn currency_other_codes() {
        assert_eq!(NumberFormat::fr_fr("eur").currency(1.5), "1,50\u{a0}EUR");
        assert_eq!(NumberFormat::fr_fr("JPY").currency(1500.4), "1\u{202f}500\u{a0}JPY");
    }

    #[test]
    fn placeholders_for_missing_values() {
        let fmt = NumberFormat::default();
        assert_eq!(fmt.number_or_placeholder(None), PLACEHOLDER);
        assert_eq!(fmt.currency_or_placeholder(None), PLACEHOLDER);
        assert_eq!(fmt.number_or_placeholder(Some(50.0)), "50");
    }

    #[test]
    fn percentage_has_one_decimal() {
        assert_eq!(percentage(50.0), "50.0");
        assert_eq!(percentage(33.333), "33.3");
    }

    #[test]
    fn ratio_is_not_rounded() {
        assert_eq!(ratio_as_percent(0.1), "10");
        assert_eq!(ratio_as_percent(0.2), "20");
        assert_eq!(ratio_as_percent(0.125), "12.5");
        assert_eq!(ratio_as_percent(0.15), "15.000000000000002");
        assert_eq!(ratio_as_percent(0.0), "0");
    }

    #[test]
    fn group_digits_handles_short_inputs() {
        assert_eq!(group_digits("", ','), "");
        assert_eq!(group_digits("12", ','), "12");
        assert_eq!(group_digits("123456", ','), "123,456");
    }
}
