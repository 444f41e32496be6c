// Cleaning of electoral college result tables.

use log::debug;
use snafu::prelude::*;

use crate::config::*;
use crate::geo::normalize_geo_name;
use crate::recode::{MissingFieldSnafu, RecodeError, TypeConversionSnafu};
use crate::score::{winner, Outcome, ScoreError, TiePolicy, Winner};

/// The names of the columns of a result table.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ResultColumns {
    pub state: String,
    pub state_votes: Option<String>,
    pub biden: String,
    pub trump: String,
}

impl Default for ResultColumns {
    fn default() -> ResultColumns {
        ResultColumns {
            state: "state".to_string(),
            state_votes: Some("state_votes".to_string()),
            biden: "biden".to_string(),
            trump: "trump".to_string(),
        }
    }
}

#[derive(PartialEq, Debug, Clone)]
pub struct StateResult {
    /// Normalized state name.
    pub state: String,
    pub state_votes: Option<u64>,
    pub biden: u64,
    pub trump: u64,
}

impl StateResult {
    pub fn winner(&self, policy: TiePolicy) -> Result<Winner, ScoreError> {
        winner(self.biden as f64, self.trump as f64, policy)
    }

    pub fn outcome(&self, policy: TiePolicy) -> Result<Outcome, ScoreError> {
        Ok(Outcome {
            winner: Some(self.winner(policy)?),
            margin: None,
        })
    }
}

/// Reads a vote count. The tables use `-` (or nothing) for no vote.
pub fn parse_vote_count(field: &str, value: &RawValue) -> Result<u64, RecodeError> {
    match value {
        RawValue::Missing => Ok(0),
        RawValue::Text(s) if s.trim() == "-" => Ok(0),
        RawValue::Text(s) => s
            .trim()
            .replace(',', "")
            .parse::<u64>()
            .ok()
            .context(TypeConversionSnafu { field, value: s }),
        RawValue::Number(n) if *n >= 0.0 && n.fract() == 0.0 => Ok(*n as u64),
        RawValue::Number(_) => TypeConversionSnafu {
            field,
            value: value.to_string(),
        }
        .fail(),
    }
}

fn is_summary_row(state: &str) -> bool {
    state.is_empty() || state == "total" || state == "totals"
}

/// Extracts the per-state results from the rows of a result table.
///
/// Blank and total rows are skipped. State names are normalized (footnote markers removed).
pub fn state_results(
    records: &[RawRecord],
    columns: &ResultColumns,
) -> Result<Vec<StateResult>, RecodeError> {
    let mut res: Vec<StateResult> = Vec::new();
    for r in records.iter() {
        let state_v = r
            .get(&columns.state)
            .context(MissingFieldSnafu {
                field: &columns.state,
            })?;
        let state = normalize_geo_name(&state_v.to_string());
        if is_summary_row(&state) {
            debug!("state_results: skipping row {:?}", r);
            continue;
        }
        let count = |name: &String| -> Result<u64, RecodeError> {
            let v = r.get(name).context(MissingFieldSnafu { field: name })?;
            parse_vote_count(name, v)
        };
        let state_votes = match &columns.state_votes {
            Some(c) => Some(count(c)?),
            None => None,
        };
        res.push(StateResult {
            state,
            state_votes,
            biden: count(&columns.biden)?,
            trump: count(&columns.trump)?,
        });
    }
    Ok(res)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(state: &str, votes: &str, biden: &str, trump: &str) -> RawRecord {
        RawRecord::from_pairs(&[
            ("state", state),
            ("state_votes", votes),
            ("biden", biden),
            ("trump", trump),
        ])
    }

    #[test]
    fn cleans_the_table() {
        let rows = vec![
            row("Alabama", "9", "-", "9"),
            row("Maine**", "4", "3", "1"),
            row("", "", "", ""),
            row("Total", "538", "306", "232"),
        ];
        let res = state_results(&rows, &ResultColumns::default()).unwrap();
        assert_eq!(
            res,
            vec![
                StateResult {
                    state: "alabama".to_string(),
                    state_votes: Some(9),
                    biden: 0,
                    trump: 9
                },
                StateResult {
                    state: "maine".to_string(),
                    state_votes: Some(4),
                    biden: 3,
                    trump: 1
                }
            ]
        );
        assert_eq!(res[0].winner(TiePolicy::Flag), Ok(Winner::Trump));
        assert_eq!(res[1].winner(TiePolicy::Flag), Ok(Winner::Biden));
    }

    #[test]
    fn bad_counts() {
        let rows = vec![row("Ohio", "18", "many", "18")];
        assert_eq!(
            state_results(&rows, &ResultColumns::default()),
            Err(RecodeError::TypeConversion {
                field: "biden".to_string(),
                value: "many".to_string()
            })
        );
        assert_eq!(
            parse_vote_count("x", &RawValue::Number(1.5)),
            Err(RecodeError::TypeConversion {
                field: "x".to_string(),
                value: "1.5".to_string()
            })
        );
    }

    #[test]
    fn missing_column() {
        let rows = vec![RawRecord::from_pairs(&[("state", "Ohio"), ("biden", "0")])];
        let cols = ResultColumns {
            state_votes: None,
            ..ResultColumns::default()
        };
        assert_eq!(
            state_results(&rows, &cols),
            Err(RecodeError::MissingField {
                field: "trump".to_string()
            })
        );
    }
}
