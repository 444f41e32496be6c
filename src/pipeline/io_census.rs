// Census API responses, saved as JSON.

use serde_json::Value as JSValue;

use survey_coding::census::records_from_rows;
use survey_coding::RawRecord;

use crate::pipeline::*;

fn cell_text(v: &JSValue) -> String {
    match v {
        JSValue::String(s) => s.clone(),
        JSValue::Null => "".to_string(),
        x => x.to_string(),
    }
}

pub fn parse_census_rows(contents: &str, path: &str) -> PResult<Vec<Vec<String>>> {
    let js: Vec<Vec<JSValue>> =
        serde_json::from_str(contents).context(ParsingJsonSnafu { path })?;
    Ok(js
        .iter()
        .map(|row| row.iter().map(cell_text).collect())
        .collect())
}

pub fn read_census_records(path: &str) -> PResult<Vec<RawRecord>> {
    let contents = fs::read_to_string(path).context(OpeningFileSnafu { path })?;
    let rows = parse_census_rows(&contents, path)?;
    let res = records_from_rows(&rows).context(CensusSnafu { path })?;
    info!("Read {} census rows from {}", res.len(), path);
    Ok(res)
}
