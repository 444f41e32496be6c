use std::collections::HashMap;

use log::{debug, info, warn};
use snafu::prelude::*;

use crate::config::parse_finite;
use crate::geo::normalize_geo_name;

#[derive(Debug, Snafu, PartialEq)]
pub enum ScoreError {
    #[snafu(display("cannot score an empty set of outcomes"))]
    EmptyInput {},
    #[snafu(display("no prediction source to score"))]
    NoSources {},
    #[snafu(display("tie between both candidates ({votes} votes each)"))]
    AmbiguousWinner { votes: f64 },
    #[snafu(display("{actual} actual values but {predicted} predicted values"))]
    LengthMismatch { actual: usize, predicted: usize },
    #[snafu(display("cannot read margin {value:?}"))]
    InvalidMargin { value: String },
}

/// The winner of a geographic unit. The discriminants are the codes used in the outputs.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum Winner {
    Biden = 0,
    Trump = 1,
}

impl Winner {
    pub fn code(&self) -> i32 {
        *self as i32
    }

    pub fn from_code(code: i32) -> Option<Winner> {
        match code {
            0 => Some(Winner::Biden),
            1 => Some(Winner::Trump),
            _ => None,
        }
    }
}

/// How to resolve a tie between both candidates.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum TiePolicy {
    /// Report the tie as an error.
    Flag,
    /// Count the tie for Trump.
    Trump,
}

/// The candidate with strictly more votes wins.
///
/// ```
/// use survey_coding::score::{winner, TiePolicy, Winner};
///
/// assert_eq!(winner(306.0, 232.0, TiePolicy::Flag)?, Winner::Biden);
/// assert_eq!(winner(232.0, 306.0, TiePolicy::Flag)?, Winner::Trump);
/// assert!(winner(269.0, 269.0, TiePolicy::Flag).is_err());
/// # Ok::<(), survey_coding::score::ScoreError>(())
/// ```
pub fn winner(biden: f64, trump: f64, policy: TiePolicy) -> Result<Winner, ScoreError> {
    if biden > trump {
        Ok(Winner::Biden)
    } else if trump > biden {
        Ok(Winner::Trump)
    } else {
        match policy {
            TiePolicy::Flag => AmbiguousWinnerSnafu { votes: biden }.fail(),
            TiePolicy::Trump => Ok(Winner::Trump),
        }
    }
}

/// Reads a margin, either as a percentage (`"12.5%"`) or as a fraction (`"0.125"`).
pub fn parse_margin(s: &str) -> Result<f64, ScoreError> {
    let t = s.trim();
    let (num, scale) = match t.strip_suffix('%') {
        Some(x) => (x.trim(), 100.0),
        None => (t, 1.0),
    };
    let x = parse_finite(&num.replace(',', "")).context(InvalidMarginSnafu { value: s })?;
    Ok(x / scale)
}

/// What is known about the outcome of one unit, either actual or predicted.
#[derive(PartialEq, Debug, Clone, Copy, Default)]
pub struct Outcome {
    pub winner: Option<Winner>,
    /// Signed margin (Trump minus Biden), as a fraction.
    pub margin: Option<f64>,
}

/// One geographic unit, with the actual outcome and the predicted outcome of each source.
#[derive(PartialEq, Debug, Clone)]
pub struct OutcomeComparison {
    pub unit: String,
    pub actual: Outcome,
    pub predicted: Vec<(String, Outcome)>,
}

impl OutcomeComparison {
    pub fn prediction(&self, source: &str) -> Outcome {
        self.predicted
            .iter()
            .find(|(s, _)| s == source)
            .map(|(_, o)| *o)
            .unwrap_or_default()
    }
}

/// Joins the predictions of each source to the actual outcomes, on the normalized unit name.
///
/// There is one comparison per actual unit, in order. Units that a source does not
/// predict get an empty outcome for this source. Predicted units that are not in
/// the actual outcomes are ignored. When a source names the same unit twice, the
/// last prediction is used.
pub fn comparisons(
    actual: &[(String, Outcome)],
    predictions: &[(String, Vec<(String, Outcome)>)],
) -> Vec<OutcomeComparison> {
    let indexes: Vec<(String, HashMap<String, Outcome>)> = predictions
        .iter()
        .map(|(source, preds)| {
            let mut m: HashMap<String, Outcome> = HashMap::new();
            for (unit, o) in preds.iter() {
                if m.insert(normalize_geo_name(unit), *o).is_some() {
                    warn!("Source {} predicts {:?} more than once", source, unit);
                }
            }
            (source.clone(), m)
        })
        .collect();
    actual
        .iter()
        .map(|(unit, outcome)| {
            let k = normalize_geo_name(unit);
            let predicted = indexes
                .iter()
                .map(|(source, m)| (source.clone(), m.get(&k).cloned().unwrap_or_default()))
                .collect();
            OutcomeComparison {
                unit: unit.clone(),
                actual: *outcome,
                predicted,
            }
        })
        .collect()
}

/// Combines two partial descriptions of the same units (for example winners and margins
/// read from different files). Known values of `first` take precedence.
///
/// The units of `first` come first, in order, followed by the units only found in `second`.
pub fn merge_outcomes(
    first: &[(String, Outcome)],
    second: &[(String, Outcome)],
) -> Vec<(String, Outcome)> {
    let keys: Vec<String> = second.iter().map(|(u, _)| normalize_geo_name(u)).collect();
    let mut used: Vec<bool> = vec![false; second.len()];
    let mut res: Vec<(String, Outcome)> = Vec::with_capacity(first.len());
    for (unit, o) in first.iter() {
        let k = normalize_geo_name(unit);
        let mut merged = *o;
        if let Some(idx) = keys.iter().position(|k2| *k2 == k) {
            used[idx] = true;
            let o2 = second[idx].1;
            merged.winner = merged.winner.or(o2.winner);
            merged.margin = merged.margin.or(o2.margin);
        }
        res.push((unit.clone(), merged));
    }
    for ((unit, o), u) in second.iter().zip(used.iter()) {
        if !u {
            res.push((unit.clone(), *o));
        }
    }
    res
}

pub fn mean_squared_error(actual: &[f64], predicted: &[f64]) -> Result<f64, ScoreError> {
    ensure!(!actual.is_empty(), EmptyInputSnafu {});
    ensure!(
        actual.len() == predicted.len(),
        LengthMismatchSnafu {
            actual: actual.len(),
            predicted: predicted.len()
        }
    );
    let total: f64 = actual
        .iter()
        .zip(predicted.iter())
        .map(|(a, p)| (p - a) * (p - a))
        .sum();
    Ok(total / (actual.len() as f64))
}

/// The scores of one prediction source.
#[derive(PartialEq, Debug, Clone)]
pub struct ScoreSummary {
    pub source: String,
    /// Number of units with an actual winner.
    pub units: usize,
    /// Number of these units where the predicted winner is the actual winner.
    pub correct: usize,
    pub accuracy_rate: Option<f64>,
    /// Number of units with both an actual and a predicted margin.
    pub margin_units: usize,
    pub mean_squared_error: Option<f64>,
}

/// Scores each source against the actual outcomes.
///
/// A unit without a predicted winner counts as a wrong prediction. Only the units
/// where both margins are known enter the mean squared error.
pub fn score(
    comparisons: &[OutcomeComparison],
    sources: &[String],
) -> Result<Vec<ScoreSummary>, ScoreError> {
    ensure!(!comparisons.is_empty(), EmptyInputSnafu {});
    ensure!(!sources.is_empty(), NoSourcesSnafu {});
    let mut res: Vec<ScoreSummary> = Vec::new();
    for source in sources.iter() {
        let mut units = 0;
        let mut correct = 0;
        let mut actual_margins: Vec<f64> = Vec::new();
        let mut predicted_margins: Vec<f64> = Vec::new();
        for c in comparisons.iter() {
            let p = c.prediction(source);
            if let Some(w) = c.actual.winner {
                units += 1;
                if p.winner == Some(w) {
                    correct += 1;
                }
            }
            if let (Some(a), Some(m)) = (c.actual.margin, p.margin) {
                actual_margins.push(a);
                predicted_margins.push(m);
            }
        }
        let accuracy_rate = if units > 0 {
            Some(correct as f64 / units as f64)
        } else {
            None
        };
        let mse = if actual_margins.is_empty() {
            None
        } else {
            Some(mean_squared_error(&actual_margins, &predicted_margins)?)
        };
        debug!(
            "score: source {}: {}/{} correct, {} margins",
            source,
            correct,
            units,
            actual_margins.len()
        );
        res.push(ScoreSummary {
            source: source.clone(),
            units,
            correct,
            accuracy_rate,
            margin_units: actual_margins.len(),
            mean_squared_error: mse,
        });
    }
    info!("Scored {} sources over {} units", res.len(), comparisons.len());
    Ok(res)
}
