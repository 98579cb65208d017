use anyhow::Result;
use std::io::Write;

use crate::export::{ExportRow, EXPORT_COLUMNS};

/// Write export rows as CSV with the fixed header. Missing values become
/// empty fields; the header is written even when there are no rows.
pub fn write_csv<W: Write>(rows: &[ExportRow], out: W) -> Result<()> {
    let mut writer = ::csv::WriterBuilder::new().has_headers(false).from_writer(out);
    writer.write_record(EXPORT_COLUMNS)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

/// Render the whole export in memory, so a failure never leaves a
/// truncated file behind.
pub fn to_csv_bytes(rows: &[ExportRow]) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    write_csv(rows, &mut buf)?;
    Ok(buf)
}
