//! Untyped cell grid read from the report workbook

use calamine::{Data, Range};
use serde::Serialize;

/// A single cell value as it appeared in the workbook.
///
/// No coercion happens here: amount columns travel through the pipeline in
/// this form and are only turned into numbers when bound for storage.
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
#[serde(untagged)]
pub enum RawCell {
    #[default]
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
}

impl RawCell {
    pub fn text(s: impl Into<String>) -> Self {
        RawCell::Text(s.into())
    }

    /// Blank cells and whitespace-only strings
    pub fn is_blank(&self) -> bool {
        match self {
            RawCell::Empty => true,
            RawCell::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// Trimmed text rendering. Blank cells render as an empty string.
    pub fn render(&self) -> String {
        match self {
            RawCell::Empty => String::new(),
            RawCell::Text(s) => s.trim().to_string(),
            RawCell::Number(n) => n.to_string(),
            RawCell::Bool(b) => b.to_string(),
        }
    }

    /// Numeric reading used when the cell is written to a REAL column.
    ///
    /// Strings are accepted when they parse as a number once trimmed and
    /// stripped of thousands separators; anything else is NULL.
    pub fn as_amount(&self) -> Option<f64> {
        match self {
            RawCell::Number(n) if n.is_finite() => Some(*n),
            RawCell::Text(s) => {
                let cleaned: String = s.trim().chars().filter(|c| *c != ',').collect();
                if cleaned.is_empty() {
                    return None;
                }
                cleaned.parse::<f64>().ok().filter(|n| n.is_finite())
            }
            _ => None,
        }
    }
}

impl From<&Data> for RawCell {
    fn from(cell: &Data) -> Self {
        match cell {
            Data::Empty => RawCell::Empty,
            Data::String(s) => RawCell::Text(s.clone()),
            Data::Int(i) => RawCell::Number(*i as f64),
            Data::Float(f) => RawCell::Number(*f),
            Data::Bool(b) => RawCell::Bool(*b),
            Data::DateTime(dt) => RawCell::Number(dt.as_f64()),
            Data::DateTimeIso(s) => RawCell::Text(s.clone()),
            Data::DurationIso(s) => RawCell::Text(s.clone()),
            // Formula errors (#DIV/0!, #REF!, ...) carry no value
            Data::Error(_) => RawCell::Empty,
        }
    }
}

/// Rows × columns grid with its origin at the workbook's A1 cell.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawSheet {
    rows: Vec<Vec<RawCell>>,
}

impl RawSheet {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_rows(rows: Vec<Vec<RawCell>>) -> Self {
        Self { rows }
    }

    /// Build a grid from a calamine range.
    ///
    /// calamine ranges start at the first used cell; positions here are
    /// absolute so that leading blank rows and columns keep their offsets.
    pub fn from_range(range: &Range<Data>) -> Self {
        let Some((end_row, end_col)) = range.end() else {
            return Self::empty();
        };

        let rows = (0..=end_row)
            .map(|r| {
                (0..=end_col)
                    .map(|c| {
                        range
                            .get_value((r, c))
                            .map(RawCell::from)
                            .unwrap_or_default()
                    })
                    .collect()
            })
            .collect();

        Self { rows }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn height(&self) -> usize {
        self.rows.len()
    }

    /// Width of the widest row
    pub fn width(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }

    /// Cell at (row, col); out-of-bounds reads are blank
    pub fn cell(&self, row: usize, col: usize) -> &RawCell {
        static BLANK: RawCell = RawCell::Empty;
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .unwrap_or(&BLANK)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_as_amount() {
        assert_eq!(RawCell::Number(12.5).as_amount(), Some(12.5));
        assert_eq!(RawCell::text(" 1,234.50 ").as_amount(), Some(1234.5));
        assert_eq!(RawCell::text("-").as_amount(), None);
        assert_eq!(RawCell::text("").as_amount(), None);
        assert_eq!(RawCell::Empty.as_amount(), None);
        assert_eq!(RawCell::Bool(true).as_amount(), None);
        assert_eq!(RawCell::Number(f64::NAN).as_amount(), None);
    }

    #[test]
    fn test_render() {
        assert_eq!(RawCell::text("  A. Impuestos ").render(), "A. Impuestos");
        assert_eq!(RawCell::Number(15.0).render(), "15");
        assert_eq!(RawCell::Empty.render(), "");
    }

    #[test]
    fn test_from_range_keeps_absolute_positions() {
        let mut range = Range::new((2, 1), (3, 2));
        range.set_value((2, 1), Data::String("B3".to_string()));
        range.set_value((3, 2), Data::Float(4.0));

        let sheet = RawSheet::from_range(&range);
        assert_eq!(sheet.height(), 4);
        assert_eq!(sheet.width(), 3);
        assert_eq!(sheet.cell(2, 1), &RawCell::text("B3"));
        assert_eq!(sheet.cell(3, 2), &RawCell::Number(4.0));
        assert!(sheet.cell(0, 0).is_blank());
        assert!(sheet.cell(100, 100).is_blank());
    }

    #[test]
    fn test_from_empty_range() {
        let range: Range<Data> = Range::empty();
        assert!(RawSheet::from_range(&range).is_empty());
    }
}
