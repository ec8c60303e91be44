use std::io::Write;

use crate::error::RouteError;
use crate::resolver::Resolution;

const HEADER: &str = "id\tkey\tdevice_id\tdestination_url\tmax_payload_bytes\tgeneration";

pub fn write_header(writer: &mut impl Write) -> Result<(), RouteError> {
    writeln!(writer, "{HEADER}").map_err(RouteError::Output)
}

/// One row per lookup; unrouted keys show `-` in the entry columns.
pub fn write_row(res: &Resolution, writer: &mut impl Write) -> Result<(), RouteError> {
    let written = match &res.entry {
        Some(entry) => writeln!(
            writer,
            "{}\t{}\t{}\t{}\t{}\t{}",
            res.id,
            escape_tsv(&res.key),
            escape_tsv(&entry.device_id),
            escape_tsv(&entry.destination_url),
            entry.max_payload_bytes,
            res.generation,
        ),
        None => writeln!(
            writer,
            "{}\t{}\t-\t-\t-\t{}",
            res.id,
            escape_tsv(&res.key),
            res.generation,
        ),
    };
    written.map_err(RouteError::Output)
}

/// Escape tabs and newlines in a string for TSV output.
fn escape_tsv(s: &str) -> String {
    s.replace(['\t', '\n', '\r'], " ")
}
