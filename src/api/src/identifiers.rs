//! Date strings and composite race ids used as document keys.

use chrono::NaiveDate;

use crate::error::{DataError, Result};

/// ddMMyyyy, e.g. `01012023`
pub const DATE_FORMAT: &str = "%d%m%Y";

/// Format a program date as its ddMMyyyy key
pub fn date_string_from_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Parse a ddMMyyyy key back into a date
pub fn parse_date_string(date_string: &str) -> Result<NaiveDate> {
    // chrono accepts unpadded fields, the key format does not
    if date_string.len() != 8 || !date_string.bytes().all(|b| b.is_ascii_digit()) {
        return Err(DataError::InvalidDate(date_string.to_string()));
    }
    NaiveDate::parse_from_str(date_string, DATE_FORMAT)
        .map_err(|_| DataError::InvalidDate(date_string.to_string()))
}

/// Build the composite race id: `{date}R{meeting}C{race}`
pub fn race_key(date_string: &str, meeting_id: u32, race_id: u32) -> String {
    format!("{}R{}C{}", date_string, meeting_id, race_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_date_string_round_trip() {
        let dates = [
            NaiveDate::from_ymd_opt(2023, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2019, 12, 31).unwrap(),
            NaiveDate::from_ymd_opt(2024, 2, 29).unwrap(),
        ];
        for date in dates {
            let s = date_string_from_date(date);
            assert_eq!(s.len(), 8);
            assert_eq!(parse_date_string(&s).unwrap(), date);
        }
    }

    #[test]
    fn test_date_string_format() {
        let date = NaiveDate::from_ymd_opt(2023, 3, 7).unwrap();
        assert_eq!(date_string_from_date(date), "07032023");
    }

    #[test]
    fn test_parse_rejects_bad_strings() {
        assert!(parse_date_string("2023-01-01").is_err());
        assert!(parse_date_string("1012023").is_err());
        assert!(parse_date_string("32012023").is_err());
        assert!(parse_date_string("").is_err());
    }

    #[test]
    fn test_race_key() {
        assert_eq!(race_key("01012023", 1, 5), "01012023R1C5");
    }

    #[test]
    fn test_race_key_distinct_triples() {
        let mut keys = HashSet::new();
        for date in ["01012023", "02012023"] {
            for meeting in 1..=12 {
                for race in 1..=12 {
                    assert!(keys.insert(race_key(date, meeting, race)));
                }
            }
        }
        // R1C12 and R11C2 must not collide
        assert_ne!(race_key("01012023", 1, 12), race_key("01012023", 11, 2));
    }
}
