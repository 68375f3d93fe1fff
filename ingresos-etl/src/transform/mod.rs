//! Reshape the report worksheet into [`DetailRecord`]s
//!
//! Two fixed row windows are sliced out of the sheet and concatenated in
//! window order. Every record of one run shares the reporting date and
//! quarter found in the header row.

pub mod layout;
pub mod period;
pub mod record;
pub mod sheet;

pub use layout::{SheetLayout, Span};
pub use period::{ReportPeriod, parse_report_period};
pub use record::DetailRecord;
pub use sheet::{RawCell, RawSheet};

use crate::error::EtlResult;

/// Header phrase: the header row's cells in the record column span,
/// trimmed and joined with single spaces.
pub fn header_text(sheet: &RawSheet, layout: &SheetLayout) -> String {
    (layout.columns.start..layout.columns.end)
        .map(|col| sheet.cell(layout.header_row, col).render())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Slice the record windows out of `sheet`.
///
/// An empty sheet (what a failed extraction hands over) yields no records.
/// A window the sheet ends inside yields only the rows that exist; a sheet
/// without the header row or a window's first row is rejected.
pub fn transform(sheet: &RawSheet, layout: &SheetLayout) -> EtlResult<Vec<DetailRecord>> {
    if sheet.is_empty() {
        log::info!("Empty sheet, nothing to transform");
        return Ok(Vec::new());
    }

    layout.validate()?;
    layout.check_shape(sheet)?;

    let header = header_text(sheet, layout);
    let (fecha, cuarto) = match parse_report_period(&header) {
        Some(period) => {
            log::debug!("Report period closes {} (quarter {})", period.fecha(), period.cuarto());
            (Some(period.fecha()), Some(period.cuarto()))
        }
        None => {
            log::warn!(
                "No reporting date found in header row {}: {:?}; fecha and cuarto left empty",
                layout.header_row,
                header
            );
            (None, None)
        }
    };

    let start_col = layout.columns.start;
    let mut records = Vec::with_capacity(layout.windows.iter().map(|w| w.len()).sum());

    for window in &layout.windows {
        let rows = layout.rows_in(window, sheet);
        if rows.end < window.end {
            log::debug!(
                "Sheet ends at row {}, window {}..{} read up to there",
                sheet.height(),
                window.start,
                window.end
            );
        }
        for row in rows {
            let cells: [RawCell; 7] =
                std::array::from_fn(|i| sheet.cell(row, start_col + i).clone());
            records.push(DetailRecord::from_cells(cells, fecha.clone(), cuarto));
        }
    }

    log::info!(
        "Transformed {} records from {} windows",
        records.len(),
        layout.windows.len()
    );

    Ok(records)
}
