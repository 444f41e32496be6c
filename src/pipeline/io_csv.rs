// Primitives for reading CSV files.

use survey_coding::geo::{GeoEntry, GeoReference};
use survey_coding::{RawRecord, RawValue};

use crate::pipeline::*;

fn open_reader(path: &str, delimiter: u8) -> PResult<csv::Reader<std::fs::File>> {
    csv::ReaderBuilder::new()
        .has_headers(true)
        .delimiter(delimiter)
        .flexible(false)
        .from_path(path)
        .context(CsvOpenSnafu { path })
}

// Survey exports are not always UTF-8 (Windows-1252 for the Comet poll): cells are
// decoded leniently instead of failing on the first accented character.
fn lossy(b: &[u8]) -> String {
    String::from_utf8_lossy(b).to_string()
}

/// Reads a CSV file with a header row. Empty cells are missing values.
pub fn read_csv_records(path: &str) -> PResult<Vec<RawRecord>> {
    let mut rdr = open_reader(path, b',')?;
    let header: Vec<String> = rdr
        .byte_headers()
        .context(CsvOpenSnafu { path })?
        .iter()
        .map(lossy)
        .collect();
    debug!("read_csv_records: {:?} header: {:?}", path, header);
    let mut res: Vec<RawRecord> = Vec::new();
    for (idx, line_r) in rdr.byte_records().enumerate() {
        // The header is line 1.
        let lineno = idx + 2;
        let line = line_r.context(CsvLineParseSnafu { path, lineno })?;
        let mut r = RawRecord::new();
        for (name, cell) in header.iter().zip(line.iter()) {
            r = r.with(name, RawValue::from_cell(&lossy(cell)));
        }
        res.push(r);
    }
    info!("Read {} records from {}", res.len(), path);
    Ok(res)
}

fn column_index(header: &csv::StringRecord, column: &str, path: &str) -> PResult<usize> {
    header
        .iter()
        .position(|h| h.trim() == column)
        .context(MissingColumnSnafu { column, path })
}

/// Reads the census state reference (`STATE|STATEFP|STATENS|STATE_NAME`).
pub fn read_geo_reference(
    path: &str,
    delimiter: u8,
    cutoff: Option<u32>,
) -> PResult<GeoReference> {
    let mut rdr = open_reader(path, delimiter)?;
    let header = rdr.headers().context(CsvOpenSnafu { path })?.clone();
    let abbr_idx = column_index(&header, "STATE", path)?;
    let fips_idx = column_index(&header, "STATEFP", path)?;
    let name_idx = column_index(&header, "STATE_NAME", path)?;

    let mut entries: Vec<GeoEntry> = Vec::new();
    for (idx, line_r) in rdr.records().enumerate() {
        let lineno = idx + 2;
        let line = line_r.context(CsvLineParseSnafu { path, lineno })?;
        let cell = |i: usize| line.get(i).unwrap_or("");
        let e = GeoEntry::from_census(cell(abbr_idx), cell(fips_idx), cell(name_idx))
            .context(GeoSnafu { path })?;
        entries.push(e);
    }
    debug!("read_geo_reference: {} entries in {}", entries.len(), path);
    Ok(GeoReference::new(entries, cutoff))
}
