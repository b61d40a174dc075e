use chrono::NaiveDate;

/// Parse `YYYY-MM-DD` or `DD/MM/YYYY` into an ISO date.
///
/// Years below 100 in the French format are read as 20YY: the register
/// sometimes carries `01/02/0021` for `01/02/2021`.
pub fn normalize_date(value: &str) -> Option<String> {
    let value = value.trim();
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Some(date.format("%Y-%m-%d").to_string());
    }

    let mut parts = value.split('/');
    let (day, month, year) = (parts.next()?, parts.next()?, parts.next()?);
    if parts.next().is_some() || year.is_empty() || !year.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let mut year: i32 = year.parse().ok()?;
    if year < 100 {
        year += 2000;
    }
    NaiveDate::from_ymd_opt(year, month.parse().ok()?, day.parse().ok()?)
        .map(|date| date.format("%Y-%m-%d").to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_iso_dates_are_kept() {
        assert_eq!(normalize_date("1962-04-01").as_deref(), Some("1962-04-01"));
    }

    #[test]
    fn test_french_dates_are_converted() {
        assert_eq!(normalize_date("01/04/1962").as_deref(), Some("1962-04-01"));
        assert_eq!(normalize_date("28/06/2020").as_deref(), Some("2020-06-28"));
    }

    #[test]
    fn test_two_digit_years_are_in_this_century() {
        assert_eq!(normalize_date("03/07/0020").as_deref(), Some("2020-07-03"));
        assert_eq!(normalize_date("03/07/20").as_deref(), Some("2020-07-03"));
    }

    #[test]
    fn test_invalid_dates_are_rejected() {
        assert_eq!(normalize_date(""), None);
        assert_eq!(normalize_date("31/02/2020"), None);
        assert_eq!(normalize_date("2020-13-01"), None);
        assert_eq!(normalize_date("1/2/3/4"), None);
        assert_eq!(normalize_date("demain"), None);
    }
}
