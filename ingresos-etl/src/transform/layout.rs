//! Fixed cell offsets of the "F5 EAI" worksheet

use serde::{Deserialize, Serialize};

use super::sheet::RawSheet;
use crate::error::{EtlError, EtlResult};

/// Number of columns a record window spans: concepto + six amounts
pub const RECORD_WIDTH: usize = 7;

/// Half-open `[start, end)` run of 0-based row or column indices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub const fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// Where the report keeps its header phrase and its two record tables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SheetLayout {
    /// Row holding the "... al {día} de {mes} de {año}" phrase
    pub header_row: usize,
    /// Columns read for both the header phrase and the record windows
    pub columns: Span,
    /// Record windows, read in order
    pub windows: Vec<Span>,
}

impl Default for SheetLayout {
    fn default() -> Self {
        Self {
            header_row: 3,
            columns: Span::new(1, 8),
            windows: vec![Span::new(7, 44), Span::new(45, 76)],
        }
    }
}

impl SheetLayout {
    /// Check the layout itself is coherent
    pub fn validate(&self) -> EtlResult<()> {
        if self.columns.len() != RECORD_WIDTH {
            return Err(EtlError::Layout(format!(
                "column span {}..{} covers {} columns, records need {}",
                self.columns.start,
                self.columns.end,
                self.columns.len(),
                RECORD_WIDTH
            )));
        }
        if self.windows.is_empty() {
            return Err(EtlError::Layout("no record windows configured".to_string()));
        }
        for (i, window) in self.windows.iter().enumerate() {
            if window.is_empty() {
                return Err(EtlError::Layout(format!(
                    "record window {} ({}..{}) is empty",
                    i + 1,
                    window.start,
                    window.end
                )));
            }
            if let Some(other) = self.windows[..i].iter().find(|w| w.overlaps(window)) {
                return Err(EtlError::Layout(format!(
                    "record windows {}..{} and {}..{} overlap",
                    other.start, other.end, window.start, window.end
                )));
            }
        }
        Ok(())
    }

    /// Fail fast when a sheet lacks a row or column the layout anchors on:
    /// the header row, the first row of each window, the first record column.
    ///
    /// Decoders drop trailing blank rows and columns, so a sheet may end
    /// inside a window or short of the last record column. That is not a
    /// layout mismatch: missing rows are not read, missing columns read blank.
    pub fn check_shape(&self, sheet: &RawSheet) -> EtlResult<()> {
        let (rows, cols) = (sheet.height(), sheet.width());
        let mismatch = |what: String| {
            EtlError::Layout(format!(
                "sheet is {}x{} (rows x columns), {}",
                rows, cols, what
            ))
        };

        if rows <= self.header_row {
            return Err(mismatch(format!("header row {} is missing", self.header_row)));
        }
        if cols <= self.columns.start {
            return Err(mismatch(format!(
                "record column {} is missing",
                self.columns.start
            )));
        }
        if let Some(window) = self.windows.iter().find(|w| rows <= w.start) {
            return Err(mismatch(format!(
                "record window {}..{} starts past the last row",
                window.start, window.end
            )));
        }
        Ok(())
    }

    /// Rows of `window` present in `sheet`
    pub fn rows_in(&self, window: &Span, sheet: &RawSheet) -> std::ops::Range<usize> {
        window.start..window.end.min(sheet.height())
    }
}
