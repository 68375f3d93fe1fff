//! Decode report workbooks

use std::io::Cursor;

use anyhow::{Context, Result};
use calamine::{Reader, Xlsx};

use crate::transform::RawSheet;

/// Worksheet holding the detailed revenue statement
pub const DEFAULT_SHEET: &str = "F5 EAI";

/// Parse `.xlsx` bytes and return the named worksheet as a grid
pub fn read_sheet(bytes: Vec<u8>, sheet_name: &str) -> Result<RawSheet> {
    let mut workbook: Xlsx<_> =
        Xlsx::new(Cursor::new(bytes)).context("Failed to open workbook")?;

    if !workbook.sheet_names().iter().any(|s| s == sheet_name) {
        anyhow::bail!(
            "Workbook has no sheet '{}' (found: {})",
            sheet_name,
            workbook.sheet_names().join(", ")
        );
    }

    let range = workbook
        .worksheet_range(sheet_name)
        .with_context(|| format!("Failed to read sheet: {}", sheet_name))?;

    Ok(RawSheet::from_range(&range))
}
