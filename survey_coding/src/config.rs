// ********* Input data structures ***********

use std::fmt::Display;

use snafu::prelude::*;

use crate::recode::{DuplicateFieldSnafu, RecodeError};

/// The content of one cell of a raw table.
///
/// Readers produce text for everything that is not clearly numeric. Empty cells
/// are `Missing`.
#[derive(PartialEq, Debug, Clone)]
pub enum RawValue {
    Text(String),
    Number(f64),
    Missing,
}

impl RawValue {
    /// Builds a value from the content of a cell. Empty (or blank) content is missing.
    pub fn from_cell(s: &str) -> RawValue {
        if s.trim().is_empty() {
            RawValue::Missing
        } else {
            RawValue::Text(s.to_string())
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, RawValue::Missing)
    }

    /// The value as it is compared by text predicates: trimmed and lowercased.
    pub fn normalized_text(&self) -> Option<String> {
        match self {
            RawValue::Text(s) => Some(normalize_text(s)),
            RawValue::Number(n) => Some(format_number(*n)),
            RawValue::Missing => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            RawValue::Number(n) => Some(*n).filter(|x| x.is_finite()),
            RawValue::Text(s) => parse_finite(s),
            RawValue::Missing => None,
        }
    }
}

impl Display for RawValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RawValue::Text(s) => write!(f, "{}", s),
            RawValue::Number(n) => write!(f, "{}", format_number(*n)),
            RawValue::Missing => Ok(()),
        }
    }
}

/// Trims and lowercases some free text.
pub fn normalize_text(s: &str) -> String {
    s.trim().to_lowercase()
}

/// Parses a number. `nan` and `inf` are not numbers for survey data.
pub fn parse_finite(s: &str) -> Option<f64> {
    s.trim().parse::<f64>().ok().filter(|x| x.is_finite())
}

// Integral values are written without the decimal part, the way spreadsheets show them.
pub(crate) fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

/// One row of a raw table (one respondent or one geographic unit).
///
/// The fields keep the order in which they were inserted, which is also the order
/// used when writing the records back.
#[derive(PartialEq, Debug, Clone, Default)]
pub struct RawRecord {
    fields: Vec<(String, RawValue)>,
}

impl RawRecord {
    pub fn new() -> RawRecord {
        RawRecord { fields: Vec::new() }
    }

    pub fn from_pairs(pairs: &[(&str, &str)]) -> RawRecord {
        let mut r = RawRecord::new();
        for (name, value) in pairs {
            r = r.with(name, RawValue::from_cell(value));
        }
        r
    }

    /// Returns a copy of this record with the field set (replaced if it exists).
    pub fn with(&self, name: &str, value: RawValue) -> RawRecord {
        let mut fields = self.fields.clone();
        match fields.iter_mut().find(|(n, _)| n == name) {
            Some(slot) => slot.1 = value,
            None => fields.push((name.to_string(), value)),
        }
        RawRecord { fields }
    }

    pub fn get(&self, name: &str) -> Option<&RawValue> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn fields(&self) -> &[(String, RawValue)] {
        &self.fields
    }

    pub fn names(&self) -> Vec<String> {
        self.fields.iter().map(|(n, _)| n.clone()).collect()
    }

    /// Returns a copy with the given columns renamed. Columns not in the mapping keep their name.
    ///
    /// Fails if two columns end up with the same name.
    pub fn renamed(&self, renames: &[(String, String)]) -> Result<RawRecord, RecodeError> {
        let mut fields: Vec<(String, RawValue)> = Vec::with_capacity(self.fields.len());
        for (n, v) in self.fields.iter() {
            let name = renames
                .iter()
                .find(|(from, _)| from == n)
                .map(|(_, to)| to.clone())
                .unwrap_or_else(|| n.clone());
            ensure!(
                !fields.iter().any(|(m, _)| *m == name),
                DuplicateFieldSnafu { field: name }
            );
            fields.push((name, v.clone()));
        }
        Ok(RawRecord { fields })
    }

    /// Returns a copy with all the text values trimmed and lowercased.
    pub fn normalized(&self) -> RawRecord {
        let fields = self
            .fields
            .iter()
            .map(|(n, v)| {
                let v2 = match v {
                    RawValue::Text(s) => RawValue::from_cell(&normalize_text(s)),
                    x => x.clone(),
                };
                (n.clone(), v2)
            })
            .collect();
        RawRecord { fields }
    }
}

// ******** Output data structures *********

/// The code assigned to one value.
///
/// `Missing` is the explicit marker for "no rule matched and the table has no
/// fallback code". Zero is a regular code (e.g. Biden in the vote choice tables).
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum CodedValue {
    Code(i32),
    Missing,
}

impl CodedValue {
    pub fn code(&self) -> Option<i32> {
        match self {
            CodedValue::Code(c) => Some(*c),
            CodedValue::Missing => None,
        }
    }
}

impl Display for CodedValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CodedValue::Code(c) => write!(f, "{}", c),
            CodedValue::Missing => Ok(()),
        }
    }
}

/// A raw record together with its coded fields and its geographic identifier.
#[derive(PartialEq, Debug, Clone)]
pub struct RecodedRecord {
    pub raw: RawRecord,
    pub coded: Vec<(String, CodedValue)>,
    /// The FIPS code, once joined. `None` before the join and for unmatched records.
    pub geo_id: Option<u32>,
}

impl RecodedRecord {
    pub fn coded_value(&self, name: &str) -> Option<CodedValue> {
        self.coded.iter().find(|(n, _)| n == name).map(|(_, c)| *c)
    }
}
