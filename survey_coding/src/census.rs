// Census API responses are a list of rows, the first one being the header:
// [["NAME","B02015_009E","B02015_009M","state"], ["Alabama","1234","56","01"], ...]

use snafu::prelude::*;

use crate::config::*;

#[derive(Debug, Snafu, PartialEq)]
pub enum CensusError {
    #[snafu(display("row {row} has {found} cells, the header has {expected}"))]
    RaggedRow {
        row: usize,
        found: usize,
        expected: usize,
    },
}

// Only cells that print back unchanged become numbers: "01" is a FIPS code, not 1.
fn census_cell(s: &str) -> RawValue {
    match parse_finite(s) {
        Some(x) if format_number(x) == s.trim() => RawValue::Number(x),
        _ => RawValue::from_cell(s),
    }
}

/// Converts the rows of a census response to records.
pub fn records_from_rows(rows: &[Vec<String>]) -> Result<Vec<RawRecord>, CensusError> {
    let (header, body) = match rows.split_first() {
        Some(x) => x,
        None => return Ok(Vec::new()),
    };
    let mut res: Vec<RawRecord> = Vec::with_capacity(body.len());
    for (idx, row) in body.iter().enumerate() {
        ensure!(
            row.len() == header.len(),
            RaggedRowSnafu {
                row: idx + 1,
                found: row.len(),
                expected: header.len()
            }
        );
        let mut r = RawRecord::new();
        for (name, cell) in header.iter().zip(row.iter()) {
            r = r.with(name, census_cell(cell));
        }
        res.push(r);
    }
    Ok(res)
}
