//! Field parsers for bank statement values.

use chrono::{Datelike, NaiveDate};
use kasboek_core::{Money, ValidationError};
use regex::Regex;
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::LazyLock;

const DATE_FORMATS: [&str; 3] = ["%d/%m/%Y", "%d-%m-%Y", "%d.%m.%Y"];

static DATE_PARTS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+").unwrap());

/// Parses an amount written with either `,` or `.` as the decimal separator.
/// When both appear, the last one is the decimal separator and the other
/// groups thousands.
pub fn parse_amount(raw: &str) -> Result<Money, ValidationError> {
    let s = raw.trim();
    let (negative, s) = if s.starts_with('(') && s.ends_with(')') {
        (true, &s[1..s.len() - 1])
    } else {
        (false, s)
    };
    let s: String = s
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '€')
        .collect();

    let normalized = match (s.rfind(','), s.rfind('.')) {
        (Some(comma), Some(dot)) if comma > dot => s.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => s.replace(',', ""),
        (Some(_), None) => s.replace(',', "."),
        _ => s.clone(),
    };

    let mut decimal = Decimal::from_str(&normalized)
        .map_err(|_| ValidationError::InvalidAmount(raw.trim().to_string()))?;
    if negative {
        decimal = -decimal;
    }
    Ok(Money::from_decimal(decimal))
}

/// Parses a day-first date. Unknown layouts fall back to guessing the field
/// order from the digit groups: a leading 4-digit group is the year
/// (Y-M-D), a trailing one too (D-M-Y), and a trailing 2-digit group is a
/// year in the 2000s.
pub fn parse_date(raw: &str) -> Result<NaiveDate, ValidationError> {
    let s = raw.trim();
    for fmt in DATE_FORMATS {
        // `%Y` happily reads "24" as year 24; short years go to the guesser.
        if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
            if date.year() >= 1000 {
                return Ok(date);
            }
        }
    }
    guess_date(s).ok_or_else(|| ValidationError::InvalidDate(s.to_string()))
}

fn guess_date(s: &str) -> Option<NaiveDate> {
    let parts: Vec<&str> = DATE_PARTS.find_iter(s).map(|m| m.as_str()).collect();
    let [a, b, c] = parts.as_slice() else {
        return None;
    };
    let (year, month, day) = match (a.len(), c.len()) {
        (4, _) => (a.parse::<i32>().ok()?, b, c),
        (_, 4) => (c.parse::<i32>().ok()?, b, a),
        (_, 2) => (2000 + c.parse::<i32>().ok()?, b, a),
        _ => return None,
    };
    NaiveDate::from_ymd_opt(year, month.parse().ok()?, day.parse().ok()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    // ── parse_amount ──────────────────────────────────────────────────────────

    #[test]
    fn parse_amount_comma_decimal() {
        assert_eq!(parse_amount("-12,50").unwrap(), Money::from_cents(-1250));
    }

    #[test]
    fn parse_amount_dot_decimal() {
        assert_eq!(parse_amount("12.5").unwrap(), Money::from_cents(1250));
    }

    #[test]
    fn parse_amount_european_thousands() {
        assert_eq!(parse_amount("1.234,56").unwrap(), Money::from_cents(123456));
    }

    #[test]
    fn parse_amount_english_thousands() {
        assert_eq!(parse_amount("1,234.56").unwrap(), Money::from_cents(123456));
    }

    #[test]
    fn parse_amount_with_euro_sign_and_spaces() {
        assert_eq!(parse_amount(" € 1 000,00 ").unwrap(), Money::from_cents(100000));
    }

    #[test]
    fn parse_amount_accounting_parens() {
        assert_eq!(parse_amount("(75,25)").unwrap(), Money::from_cents(-7525));
    }

    #[test]
    fn parse_amount_invalid() {
        assert!(matches!(
            parse_amount("twelve"),
            Err(ValidationError::InvalidAmount(_))
        ));
        assert!(parse_amount("").is_err());
    }

    // ── parse_date ────────────────────────────────────────────────────────────

    #[test]
    fn parse_date_day_first() {
        assert_eq!(parse_date("15/01/2024").unwrap(), date(2024, 1, 15));
        assert_eq!(parse_date("15-01-2024").unwrap(), date(2024, 1, 15));
        assert_eq!(parse_date("15.01.2024").unwrap(), date(2024, 1, 15));
        assert_eq!(parse_date("15/01/24").unwrap(), date(2024, 1, 15));
    }

    #[test]
    fn parse_date_heuristic_year_first() {
        assert_eq!(parse_date("2024-01-15").unwrap(), date(2024, 1, 15));
        assert_eq!(parse_date("2024/1/5").unwrap(), date(2024, 1, 5));
    }

    #[test]
    fn parse_date_heuristic_day_first() {
        assert_eq!(parse_date("5 1 2024").unwrap(), date(2024, 1, 5));
        assert_eq!(parse_date("5_1_24").unwrap(), date(2024, 1, 5));
    }

    #[test]
    fn parse_date_invalid() {
        assert!(matches!(
            parse_date("31/02/2024"),
            Err(ValidationError::InvalidDate(_))
        ));
        assert!(parse_date("yesterday").is_err());
        assert!(parse_date("2024-01").is_err());
    }
}
