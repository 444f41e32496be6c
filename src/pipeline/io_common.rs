// Helpers shared by the readers and the writers.

use std::path::{Path, PathBuf};

use crate::pipeline::*;

#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum InputFormat {
    Csv,
    Excel,
    CensusJson,
}

pub fn input_format(path: &str) -> PResult<InputFormat> {
    let ext = Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase());
    match ext.as_deref() {
        Some("csv") | Some("txt") => Ok(InputFormat::Csv),
        Some("xlsx") => Ok(InputFormat::Excel),
        Some("json") => Ok(InputFormat::CensusJson),
        _ => UnsupportedInputSnafu { path }.fail(),
    }
}

pub fn simplify_file_name(path: &str) -> String {
    Path::new(path)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output")
        .to_string()
}

/// Paths in a configuration are relative to the directory of the configuration.
pub fn resolve_path(root: &Path, file_path: &str) -> String {
    let p: PathBuf = [root, Path::new(file_path)].iter().collect();
    p.as_path().display().to_string()
}

pub fn write_table(path: &str, header: &[String], rows: &[Vec<String>]) -> PResult<()> {
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).context(WritingOutputSnafu {
                path: parent.display().to_string(),
            })?;
        }
    }
    let mut wtr = csv::Writer::from_path(path).context(CsvWriteSnafu { path })?;
    wtr.write_record(header).context(CsvWriteSnafu { path })?;
    for row in rows.iter() {
        wtr.write_record(row).context(CsvWriteSnafu { path })?;
    }
    wtr.flush().context(WritingOutputSnafu { path })?;
    info!("Wrote {} rows to {}", rows.len(), path);
    Ok(())
}
