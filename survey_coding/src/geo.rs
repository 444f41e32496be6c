use std::collections::HashMap;

use log::{debug, info, warn};
use snafu::prelude::*;

use crate::config::*;

/// The first FIPS code that is not a state (or DC). Codes from 60 onwards are territories.
pub const DEFAULT_FIPS_CUTOFF: u32 = 57;

const DECORATIONS: &[char] = &['*', '†', '‡', '§', '^'];

#[derive(Debug, Snafu, PartialEq)]
pub enum GeoError {
    #[snafu(display("invalid FIPS code {value:?} for {name:?}"))]
    InvalidFips { name: String, value: String },
}

/// Normalizes the name (or abbreviation) of a geographic unit for lookups.
///
/// ```
/// use survey_coding::geo::normalize_geo_name;
///
/// assert_eq!(normalize_geo_name("  Maine* "), "maine");
/// assert_eq!(normalize_geo_name("New   York (United States)"), "new york");
/// ```
pub fn normalize_geo_name(s: &str) -> String {
    let lowered = s.to_lowercase();
    let mut t: &str = lowered
        .trim()
        .trim_matches(|c: char| DECORATIONS.contains(&c) || c.is_whitespace());
    if let Some(x) = t.strip_suffix("(united states)") {
        t = x.trim_end();
    }
    t.split_whitespace().collect::<Vec<&str>>().join(" ")
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct GeoEntry {
    pub abbreviation: String,
    pub fips: u32,
    pub name: String,
}

impl GeoEntry {
    /// Builds an entry from the raw fields of a census reference row (`STATE|STATEFP|STATENS|STATE_NAME`).
    pub fn from_census(abbreviation: &str, fips: &str, name: &str) -> Result<GeoEntry, GeoError> {
        let code = fips.trim().parse::<u32>().ok().context(InvalidFipsSnafu {
            name,
            value: fips,
        })?;
        Ok(GeoEntry {
            abbreviation: abbreviation.trim().to_string(),
            fips: code,
            name: name.trim().to_string(),
        })
    }
}

/// Which part of the reference a value is looked up against.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum GeoKey {
    Name,
    Abbreviation,
    /// The name first, then the abbreviation.
    Either,
}

/// The FIPS reference, indexed by normalized name and abbreviation.
///
/// It is immutable once built.
#[derive(PartialEq, Debug, Clone)]
pub struct GeoReference {
    entries: Vec<GeoEntry>,
    by_name: HashMap<String, u32>,
    by_abbreviation: HashMap<String, u32>,
}

impl GeoReference {
    /// Builds the reference. If a cutoff is given, only the entries with a code
    /// strictly below it are kept.
    pub fn new(entries: Vec<GeoEntry>, cutoff: Option<u32>) -> GeoReference {
        let total = entries.len();
        let kept: Vec<GeoEntry> = entries
            .into_iter()
            .filter(|e| cutoff.map(|c| e.fips < c).unwrap_or(true))
            .collect();
        info!(
            "Geographic reference: {} entries ({} removed by cutoff {:?})",
            kept.len(),
            total - kept.len(),
            cutoff
        );
        let by_name = kept
            .iter()
            .map(|e| (normalize_geo_name(&e.name), e.fips))
            .collect();
        let by_abbreviation = kept
            .iter()
            .map(|e| (normalize_geo_name(&e.abbreviation), e.fips))
            .collect();
        GeoReference {
            entries: kept,
            by_name,
            by_abbreviation,
        }
    }

    pub fn entries(&self) -> &[GeoEntry] {
        &self.entries
    }

    pub fn resolve(&self, value: &str, key: GeoKey) -> Option<u32> {
        let k = normalize_geo_name(value);
        match key {
            GeoKey::Name => self.by_name.get(&k).cloned(),
            GeoKey::Abbreviation => self.by_abbreviation.get(&k).cloned(),
            GeoKey::Either => self
                .by_name
                .get(&k)
                .or_else(|| self.by_abbreviation.get(&k))
                .cloned(),
        }
    }
}

/// A record whose geography could not be found in the reference.
///
/// This is a warning: the record is kept with no identifier.
#[derive(PartialEq, Debug, Clone)]
pub struct UnmatchedGeography {
    pub row: usize,
    pub value: String,
}

#[derive(PartialEq, Debug, Clone)]
pub struct JoinOutcome {
    pub records: Vec<RecodedRecord>,
    pub unmatched: Vec<UnmatchedGeography>,
}

impl JoinOutcome {
    /// Only the records that received an identifier.
    pub fn matched_only(&self) -> Vec<RecodedRecord> {
        self.records
            .iter()
            .filter(|r| r.geo_id.is_some())
            .cloned()
            .collect()
    }
}

/// Attaches a FIPS code to each record, using the value of `field`.
///
/// All the records are returned, in order. Records with no (or an unknown)
/// geography get no identifier and are listed in `unmatched`.
pub fn join_geography(
    records: Vec<RecodedRecord>,
    field: &str,
    key: GeoKey,
    reference: &GeoReference,
) -> JoinOutcome {
    let mut unmatched: Vec<UnmatchedGeography> = Vec::new();
    let mut res: Vec<RecodedRecord> = Vec::with_capacity(records.len());
    for (row, rec) in records.into_iter().enumerate() {
        let value = rec.raw.get(field).map(|v| v.to_string()).unwrap_or_default();
        let geo_id = reference.resolve(&value, key);
        if geo_id.is_none() {
            warn!(
                "join_geography: row {}: no geographic identifier for {:?}",
                row, value
            );
            unmatched.push(UnmatchedGeography { row, value });
        }
        res.push(RecodedRecord { geo_id, ..rec });
    }
    debug!(
        "join_geography: {} records, {} unmatched",
        res.len(),
        unmatched.len()
    );
    JoinOutcome {
        records: res,
        unmatched,
    }
}
