//! Lenient conversions from vendor cells to destination types.

use chrono::NaiveDate;
use underlying_ingestor::models::CellValue;

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%m/%d/%Y", "%Y/%m/%d"];

/// Interprets a cell as a calendar date. Anything unrecognised is `None`.
///
/// Accepted: native dates, `YYYY-MM-DD` (optionally followed by a time part
/// separated by `T` or a space), `MM/DD/YYYY`, `YYYY/MM/DD`, and `YYYYMMDD`
/// as text or integer.
pub fn coerce_date(cell: &CellValue) -> Option<NaiveDate> {
    match cell {
        CellValue::Date(d) => Some(*d),
        CellValue::Text(s) => parse_date_text(s.trim()),
        CellValue::Integer(i) if (10_000_101..=99_991_231).contains(i) => compact_date(*i),
        _ => None,
    }
}

fn parse_date_text(s: &str) -> Option<NaiveDate> {
    if s.is_empty() {
        return None;
    }
    if s.len() == 8 && s.bytes().all(|b| b.is_ascii_digit()) {
        return s.parse().ok().and_then(compact_date);
    }
    if let Some(date) = DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
    {
        return Some(date);
    }
    // Timestamps: keep the calendar part.
    match (s.get(..10), s.as_bytes().get(10)) {
        (Some(day), Some(b'T' | b' ')) => NaiveDate::parse_from_str(day, "%Y-%m-%d").ok(),
        _ => None,
    }
}

fn compact_date(value: i64) -> Option<NaiveDate> {
    let year = i32::try_from(value / 10_000).ok()?;
    let month = u32::try_from(value / 100 % 100).ok()?;
    let day = u32::try_from(value % 100).ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Interprets a cell as an integer id: integers, integral floats and
/// integer-looking text. Everything else is `None`.
pub fn coerce_integer(cell: &CellValue) -> Option<i64> {
    match cell {
        CellValue::Integer(i) => Some(*i),
        CellValue::Float(f) => integral(*f),
        CellValue::Text(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(integral))
        }
        _ => None,
    }
}

fn integral(f: f64) -> Option<i64> {
    // i64::MAX as f64 rounds up to 2^63, hence the strict upper bound.
    (f.is_finite() && f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64)
        .then_some(f as i64)
}

/// `true` for cells that carry no value at all (null or blank text).
pub fn is_blank(cell: &CellValue) -> bool {
    match cell {
        CellValue::Null => true,
        CellValue::Text(s) => s.trim().is_empty(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(y, m, d)
    }

    #[test]
    fn accepted_date_shapes() {
        let cases = [
            (CellValue::from("2021-12-24"), ymd(2021, 12, 24)),
            (CellValue::from(" 2021-12-24 "), ymd(2021, 12, 24)),
            (CellValue::from("2021-12-24T00:00:00"), ymd(2021, 12, 24)),
            (CellValue::from("2021-12-24 13:45:00.000"), ymd(2021, 12, 24)),
            (CellValue::from("12/24/2021"), ymd(2021, 12, 24)),
            (CellValue::from("2021/12/24"), ymd(2021, 12, 24)),
            (CellValue::from("20211224"), ymd(2021, 12, 24)),
            (CellValue::Integer(20211224), ymd(2021, 12, 24)),
            (CellValue::Date(ymd(2021, 12, 24).unwrap()), ymd(2021, 12, 24)),
        ];
        for (cell, expected) in cases {
            assert_eq!(coerce_date(&cell), expected, "{cell:?}");
        }
    }

    #[test]
    fn unparseable_dates_become_none() {
        let cases = [
            CellValue::Null,
            CellValue::from(""),
            CellValue::from("   "),
            CellValue::from("not a date"),
            CellValue::from("2021-13-45"),
            CellValue::from("20211345"),
            CellValue::Integer(7),
            CellValue::Float(20211224.5),
            CellValue::Bool(true),
        ];
        for cell in cases {
            assert_eq!(coerce_date(&cell), None, "{cell:?}");
        }
    }

    #[test]
    fn integer_coercion() {
        assert_eq!(coerce_integer(&CellValue::Integer(5)), Some(5));
        assert_eq!(coerce_integer(&CellValue::Float(5.0)), Some(5));
        assert_eq!(coerce_integer(&CellValue::from(" 42 ")), Some(42));
        assert_eq!(coerce_integer(&CellValue::from("42.0")), Some(42));

        assert_eq!(coerce_integer(&CellValue::Float(5.5)), None);
        assert_eq!(coerce_integer(&CellValue::Float(f64::NAN)), None);
        assert_eq!(coerce_integer(&CellValue::from("abc")), None);
        assert_eq!(coerce_integer(&CellValue::Bool(true)), None);
        assert_eq!(coerce_integer(&CellValue::Null), None);
    }
}
