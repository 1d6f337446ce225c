use chrono::NaiveDate;

/// True when `s` is exactly eight ASCII digits (`YYYYMMDD`). Rows failing
/// this are excluded before any date formatting happens.
pub fn is_compact_date(s: &str) -> bool {
    s.len() == 8 && s.bytes().all(|b| b.is_ascii_digit())
}

/// Rearrange a compact `YYYYMMDD` string into `YYYY-MM-DD`. Anything that
/// is not a compact date passes through unchanged; callers are expected
/// to have filtered with [`is_compact_date`] already.
pub fn format_compact_date(s: &str) -> String {
    if is_compact_date(s) {
        format!("{}-{}-{}", &s[0..4], &s[4..6], &s[6..8])
    } else {
        s.to_string()
    }
}

/// Parse a statement date cell that may be compact (`20260115`) or
/// already ISO (`2026-01-15`).
pub fn parse_statement_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if is_compact_date(s) {
        let y: i32 = s[0..4].parse().ok()?;
        let m: u32 = s[4..6].parse().ok()?;
        let d: u32 = s[6..8].parse().ok()?;
        return NaiveDate::from_ymd_opt(y, m, d);
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
}

/// Parse an amount string with thousands commas and the banking
/// convention of a trailing minus (`"1,234.56-"` → `-1234.56`).
pub fn parse_signed_amount(raw: &str) -> Option<f64> {
    let mut s = raw.trim().replace(',', "").replace('"', "");
    let negative = s.ends_with('-');
    if negative {
        s.pop();
        s = s.trim().to_string();
    }
    if s.is_empty() {
        return None;
    }
    let value: f64 = s.parse().ok()?;
    Some(if negative { -value.abs() } else { value })
}

/// Round to two decimals, the precision statements carry amounts in.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Round to four decimals, used for unit prices.
pub fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compact_date_validation() {
        assert!(is_compact_date("20260115"));
        assert!(!is_compact_date("2026-01-15"));
        assert!(!is_compact_date("12345"));
        assert!(!is_compact_date(""));
        assert!(!is_compact_date("2026011a"));
    }

    #[test]
    fn compact_date_formatting_rearranges_digits() {
        assert_eq!(format_compact_date("20260115"), "2026-01-15");
        assert_eq!(format_compact_date("20251201"), "2025-12-01");
        // non-compact input passes through
        assert_eq!(format_compact_date("n/a"), "n/a");
    }

    #[test]
    fn statement_dates_accept_both_shapes() {
        let expected = NaiveDate::from_ymd_opt(2026, 1, 15).unwrap();
        assert_eq!(parse_statement_date("20260115"), Some(expected));
        assert_eq!(parse_statement_date("2026-01-15"), Some(expected));
        assert_eq!(parse_statement_date("20261345"), None);
    }

    #[test]
    fn trailing_minus_amounts() {
        assert_eq!(parse_signed_amount("100.98"), Some(100.98));
        assert_eq!(parse_signed_amount("100.98-"), Some(-100.98));
        assert_eq!(parse_signed_amount("1,234.56"), Some(1234.56));
        assert_eq!(parse_signed_amount(""), None);
        assert_eq!(parse_signed_amount("abc"), None);
    }

    #[test]
    fn rounding_helpers() {
        assert_eq!(round2(10.666_66), 10.67);
        assert_eq!(round4(10.666_666), 10.6667);
    }
}
