use calamine::{open_workbook, DataType, Range, Reader, Xlsx};

use survey_coding::{RawRecord, RawValue};

use crate::pipeline::*;

fn read_cell(cell: &DataType, lineno: usize) -> PResult<RawValue> {
    match cell {
        DataType::String(s) => Ok(RawValue::from_cell(s)),
        DataType::Float(f) => Ok(RawValue::Number(*f)),
        DataType::Int(i) => Ok(RawValue::Number(*i as f64)),
        DataType::DateTime(f) => Ok(RawValue::Number(*f)),
        DataType::Bool(b) => Ok(RawValue::Text(b.to_string())),
        DataType::Empty => Ok(RawValue::Missing),
        _ => ExcelWrongCellTypeSnafu {
            lineno,
            content: format!("{:?}", cell),
        }
        .fail(),
    }
}

fn header_name(cell: &DataType) -> String {
    match cell {
        DataType::String(s) => s.trim().to_string(),
        DataType::Empty => "".to_string(),
        x => x.to_string(),
    }
}

/// Reads a worksheet with a header row: the named one, or the first one.
pub fn read_excel_records(path: &str, worksheet_name: Option<&str>) -> PResult<Vec<RawRecord>> {
    let mut workbook: Xlsx<_> = open_workbook(path).context(OpeningExcelSnafu { path })?;
    let wrange: Range<DataType> = match worksheet_name {
        Some(name) => workbook
            .worksheet_range(name)
            .context(MissingWorksheetSnafu { path, name })?
            .context(OpeningExcelSnafu { path })?,
        None => workbook
            .worksheet_range_at(0)
            .context(EmptyExcelSnafu { path })?
            .context(OpeningExcelSnafu { path })?,
    };

    let mut iter = wrange.rows();
    let header: Vec<String> = iter
        .next()
        .context(EmptyExcelSnafu { path })?
        .iter()
        .map(header_name)
        .collect();
    debug!("read_excel_records: {:?} header: {:?}", path, header);

    let mut res: Vec<RawRecord> = Vec::new();
    for (idx, row) in iter.enumerate() {
        let lineno = idx + 2;
        let mut r = RawRecord::new();
        for (name, cell) in header.iter().zip(row.iter()) {
            r = r.with(name, read_cell(cell, lineno)?);
        }
        res.push(r);
    }
    info!("Read {} records from {}", res.len(), path);
    Ok(res)
}
