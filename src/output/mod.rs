pub mod json;
pub mod tsv;

use std::io::Write;

use crate::cli::OutputFormat;
use crate::error::RouteError;
use crate::resolver::Resolution;

/// Write the leading line for `format`, if it has one.
pub fn write_header(format: OutputFormat, writer: &mut impl Write) -> Result<(), RouteError> {
    match format {
        OutputFormat::Tsv => tsv::write_header(writer),
        OutputFormat::Json => Ok(()),
    }
}

/// Write a single resolution as one line.
pub fn write_resolution(
    res: &Resolution,
    format: OutputFormat,
    writer: &mut impl Write,
) -> Result<(), RouteError> {
    match format {
        OutputFormat::Tsv => tsv::write_row(res, writer),
        OutputFormat::Json => json::write_line(res, writer),
    }
}

/// Write a header followed by every resolution, sorted by request id.
pub fn write_resolutions(
    results: &[Resolution],
    format: OutputFormat,
    writer: &mut impl Write,
) -> Result<(), RouteError> {
    let mut sorted: Vec<&Resolution> = results.iter().collect();
    sorted.sort_by_key(|r| r.id);

    write_header(format, writer)?;
    for res in sorted {
        write_resolution(res, format, writer)?;
    }
    Ok(())
}
