use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;

use super::FieldError;

/// A partial date, with support for:
///
/// - year
/// - year and month
/// - year, month, and day
///
/// No other combinations are allowed. The string form (`YYYY`, `YYYY-MM`, or
/// `YYYY-MM-DD`) is also the storage form, and sorts chronologically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PartialDate {
    year: u16,
    month: Option<u8>,
    day: Option<u8>,
}

impl PartialDate {
    pub fn new(year: u16, month: Option<u8>, day: Option<u8>) -> Result<Self, FieldError> {
        if month.is_none() && day.is_some() {
            return Err(FieldError::DayRequiresMonth);
        }
        if !(1900..=9999).contains(&year) {
            return Err(FieldError::InvalidYear);
        }
        if let Some(m) = month {
            if !(1..=12).contains(&m) {
                return Err(FieldError::InvalidMonth);
            }
        }
        if let Some(d) = day {
            if !(1..=31).contains(&d) {
                return Err(FieldError::InvalidDay);
            }
            let m = month.expect("checked above");
            // Reject day combinations that never hit the calendar.
            if NaiveDate::from_ymd_opt(i32::from(year), u32::from(m), u32::from(d)).is_none() {
                return Err(FieldError::InvalidDate);
            }
        }
        Ok(Self { year, month, day })
    }

    pub fn year(&self) -> u16 {
        self.year
    }

    pub fn month(&self) -> Option<u8> {
        self.month
    }

    pub fn day(&self) -> Option<u8> {
        self.day
    }
}

fn check_int(value: &str, expected_length: usize) -> Result<u16, FieldError> {
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(FieldError::InvalidInteger(value.to_string()));
    }
    if value.len() != expected_length {
        return Err(FieldError::InvalidIntegerLength {
            expected: expected_length,
        });
    }
    value
        .parse()
        .map_err(|_| FieldError::InvalidInteger(value.to_string()))
}

impl FromStr for PartialDate {
    type Err = FieldError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let mut parts = value.split('-');
        let y_str = parts.next().unwrap_or_default();
        let m_str = parts.next();
        let d_str = parts.next();
        if parts.next().is_some() {
            return Err(FieldError::InvalidDateFormat);
        }
        let year = check_int(y_str, 4)?;
        let month = m_str.map(|m| check_int(m, 2)).transpose()?;
        let day = d_str.map(|d| check_int(d, 2)).transpose()?;
        Self::new(year, month.map(|m| m as u8), day.map(|d| d as u8))
    }
}

impl fmt::Display for PartialDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.month, self.day) {
            (None, _) => write!(f, "{:04}", self.year),
            (Some(m), None) => write!(f, "{:04}-{:02}", self.year, m),
            (Some(m), Some(d)) => write!(f, "{:04}-{:02}-{:02}", self.year, m, d),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_all_three_precisions() {
        assert_eq!(
            "2023".parse::<PartialDate>().unwrap(),
            PartialDate::new(2023, None, None).unwrap()
        );
        assert_eq!(
            "2023-04".parse::<PartialDate>().unwrap(),
            PartialDate::new(2023, Some(4), None).unwrap()
        );
        assert_eq!(
            "2023-04-09".parse::<PartialDate>().unwrap(),
            PartialDate::new(2023, Some(4), Some(9)).unwrap()
        );
    }

    #[test]
    fn display_round_trips() {
        for s in ["2023", "2023-04", "2023-04-09"] {
            assert_eq!(s.parse::<PartialDate>().unwrap().to_string(), s);
        }
    }

    #[test]
    fn enforces_digit_widths() {
        assert!("23".parse::<PartialDate>().is_err());
        assert!("2023-4".parse::<PartialDate>().is_err());
        assert!("2023-04-9".parse::<PartialDate>().is_err());
        assert!("2023-04-09-01".parse::<PartialDate>().is_err());
        assert!("20a3".parse::<PartialDate>().is_err());
    }

    #[test]
    fn day_requires_month() {
        assert_eq!(
            PartialDate::new(2023, None, Some(9)).unwrap_err(),
            FieldError::DayRequiresMonth
        );
    }

    #[test]
    fn rejects_out_of_range_components() {
        assert_eq!(
            PartialDate::new(1899, None, None).unwrap_err(),
            FieldError::InvalidYear
        );
        assert_eq!(
            PartialDate::new(2023, Some(13), None).unwrap_err(),
            FieldError::InvalidMonth
        );
        assert_eq!(
            PartialDate::new(2023, Some(1), Some(32)).unwrap_err(),
            FieldError::InvalidDay
        );
    }

    #[test]
    fn rejects_impossible_calendar_dates() {
        assert_eq!(
            PartialDate::new(2023, Some(2), Some(30)).unwrap_err(),
            FieldError::InvalidDate
        );
        // 2024 is a leap year.
        assert!(PartialDate::new(2024, Some(2), Some(29)).is_ok());
        assert_eq!(
            PartialDate::new(2023, Some(2), Some(29)).unwrap_err(),
            FieldError::InvalidDate
        );
    }

    #[test]
    fn string_form_sorts_chronologically() {
        let mut dates = vec!["2023-04-09", "2022", "2023-04", "2023"];
        dates.sort();
        assert_eq!(dates, vec!["2022", "2023", "2023-04", "2023-04-09"]);
    }
}
