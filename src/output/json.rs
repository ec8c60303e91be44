use std::io::Write;

use crate::error::RouteError;
use crate::resolver::Resolution;

/// Write a resolution as a single JSON line.
pub fn write_line(res: &Resolution, writer: &mut impl Write) -> Result<(), RouteError> {
    serde_json::to_writer(&mut *writer, res)
        .map_err(|e| RouteError::Output(std::io::Error::other(e.to_string())))?;
    writeln!(writer).map_err(RouteError::Output)
}
