//! Reporting date and fiscal quarter from the report's header phrase
//!
//! The header reads like "Del 1 de enero al 31 de marzo de 2024"; only the
//! closing date ("al {día} de {mes} de {año}") is used.

use chrono::{Datelike, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;

static PERIOD_END: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"al (\d{1,2}) de (\w+) de (\d{4})").expect("valid regex"));

const MONTHS: [&str; 12] = [
    "enero",
    "febrero",
    "marzo",
    "abril",
    "mayo",
    "junio",
    "julio",
    "agosto",
    "septiembre",
    "octubre",
    "noviembre",
    "diciembre",
];

/// Closing date of the reported period
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportPeriod {
    pub date: NaiveDate,
}

impl ReportPeriod {
    /// `DD/MM/YYYY`
    pub fn fecha(&self) -> String {
        self.date.format("%d/%m/%Y").to_string()
    }

    /// Fiscal quarter 1–4
    pub fn cuarto(&self) -> u8 {
        ((self.date.month() - 1) / 3 + 1) as u8
    }
}

/// 1-based month number for a Spanish month name
pub fn month_number(name: &str) -> Option<u32> {
    let name = name.to_lowercase();
    MONTHS
        .iter()
        .position(|m| *m == name)
        .map(|i| i as u32 + 1)
}

/// Find the closing date in free header text.
///
/// Returns `None` when the phrase is missing, the month is unknown or the
/// date does not exist on the calendar.
pub fn parse_report_period(text: &str) -> Option<ReportPeriod> {
    let caps = PERIOD_END.captures(text)?;
    let day: u32 = caps.get(1)?.as_str().parse().ok()?;
    let month = month_number(caps.get(2)?.as_str())?;
    let year: i32 = caps.get(3)?.as_str().parse().ok()?;
    let date = NaiveDate::from_ymd_opt(year, month, day)?;
    Some(ReportPeriod { date })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_first_quarter() {
        let period =
            parse_report_period("Del 1 de enero al 15 de marzo de 2024 (Pesos)").unwrap();
        assert_eq!(period.fecha(), "15/03/2024");
        assert_eq!(period.cuarto(), 1);
    }

    #[test]
    fn test_quarter_boundaries() {
        let cases = [
            ("al 30 de abril de 2023", 2),
            ("al 30 de junio de 2023", 2),
            ("al 1 de julio de 2023", 3),
            ("al 30 de septiembre de 2023", 3),
            ("al 31 de Diciembre de 2023", 4),
        ];
        for (text, quarter) in cases {
            assert_eq!(parse_report_period(text).unwrap().cuarto(), quarter, "{}", text);
        }
    }

    #[test]
    fn test_single_digit_day_is_padded() {
        let period = parse_report_period("al 5 de octubre de 2022").unwrap();
        assert_eq!(period.fecha(), "05/10/2022");
    }

    #[test]
    fn test_unmatched_text() {
        assert!(parse_report_period("Estado Analítico de Ingresos Detallado").is_none());
        assert!(parse_report_period("").is_none());
    }

    #[test]
    fn test_unknown_month_or_impossible_date() {
        assert!(parse_report_period("al 15 de march de 2024").is_none());
        assert!(parse_report_period("al 31 de febrero de 2024").is_none());
    }

    #[test]
    fn test_month_number() {
        assert_eq!(month_number("Enero"), Some(1));
        assert_eq!(month_number("SEPTIEMBRE"), Some(9));
        assert_eq!(month_number("setiembre"), None);
    }
}
