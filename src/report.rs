//! Result serialization: an extracted score becomes a one-cell xlsx table.

use crate::defaults::{ARTIFACT_FILENAME, SCORE_HEADER};
use crate::error::Result;
use rust_xlsxwriter::Workbook;

/// The deliverable spreadsheet: filename plus complete xlsx bytes.
///
/// Built entirely in memory, so a failed encode never leaves a partial
/// artifact behind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultArtifact {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// Encode a score as a single-sheet, single-column xlsx table.
///
/// One header cell with the scale label, one data row with the integer
/// value, nothing else.
///
/// # Errors
/// `Encoding` when the xlsx writer faults; no bytes are produced in that
/// case.
pub fn encode(score: u8) -> Result<ResultArtifact> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();

    worksheet.write_string(0, 0, SCORE_HEADER)?;
    worksheet.write_number(1, 0, score as f64)?;

    let bytes = workbook.save_to_buffer()?;

    Ok(ResultArtifact {
        filename: ARTIFACT_FILENAME.to_string(),
        bytes,
    })
}
