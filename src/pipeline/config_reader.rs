use crate::pipeline::*;

use serde::{Deserialize, Serialize};
use serde_json::Value as JSValue;

use survey_coding::codes::{Closed, CodeTable};
use survey_coding::geo::DEFAULT_FIPS_CUTOFF;
use survey_coding::recode::RecordErrorPolicy;
use survey_coding::results::ResultColumns;
use survey_coding::score::TiePolicy;

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize, Default)]
pub struct OutputSettings {
    #[serde(rename = "outputDirectory")]
    pub output_directory: Option<String>,
    #[serde(rename = "keepAll")]
    pub keep_all: Option<bool>,
    #[serde(rename = "onRecordError")]
    pub on_record_error: Option<String>,
}

impl OutputSettings {
    pub fn record_error_policy(&self) -> PResult<RecordErrorPolicy> {
        read_record_error_policy(&self.on_record_error)
    }
}

pub fn read_record_error_policy(s: &Option<String>) -> PResult<RecordErrorPolicy> {
    match s.as_deref() {
        None | Some("drop") => Ok(RecordErrorPolicy::Drop),
        Some("abort") => Ok(RecordErrorPolicy::Abort),
        Some(x) => whatever!("onRecordError: expected drop or abort, got {:?}", x),
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct GeoReferenceSource {
    #[serde(rename = "filePath")]
    pub file_path: String,
    pub delimiter: Option<String>,
    /// Either a number, or `"none"` to keep all the entries.
    pub cutoff: Option<JSValue>,
}

impl GeoReferenceSource {
    pub fn delimiter_byte(&self) -> PResult<u8> {
        match self.delimiter.as_deref() {
            None => Ok(b'|'),
            Some(d) if d.len() == 1 => Ok(d.as_bytes()[0]),
            Some(d) => whatever!("geoReference: delimiter must be a single character: {:?}", d),
        }
    }

    pub fn cutoff(&self) -> PResult<Option<u32>> {
        match &self.cutoff {
            None => Ok(Some(DEFAULT_FIPS_CUTOFF)),
            Some(JSValue::String(s)) if s == "none" => Ok(None),
            Some(JSValue::Null) => Ok(None),
            Some(JSValue::Number(n)) => n
                .as_u64()
                .and_then(|x| u32::try_from(x).ok())
                .map(Some)
                .context(ParsingJsonNumberSnafu {}),
            Some(JSValue::String(s)) => s
                .parse::<u32>()
                .ok()
                .map(Some)
                .context(ParsingJsonNumberSnafu {}),
            _ => None.context(ParsingJsonNumberSnafu {}),
        }
    }
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct AgeBuckets {
    pub edges: Vec<f64>,
    pub codes: Vec<i32>,
    pub closed: Option<String>,
}

impl AgeBuckets {
    pub fn to_table(&self) -> PResult<CodeTable> {
        let closed = match self.closed.as_deref() {
            None | Some("right") => Closed::Right,
            Some("left") => Closed::Left,
            Some(x) => whatever!("ageBuckets: closed must be left or right, got {:?}", x),
        };
        CodeTable::buckets("age_group", &self.edges, &self.codes, closed).context(TableSnafu {})
    }
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct SurveySource {
    pub provider: String,
    #[serde(rename = "filePath")]
    pub file_path: String,
    #[serde(rename = "outputName")]
    pub output_name: Option<String>,
    #[serde(rename = "excelWorksheetName")]
    pub excel_worksheet_name: Option<String>,
    #[serde(rename = "voteChoices")]
    pub vote_choices: Option<Vec<String>>,
    #[serde(rename = "ageBuckets")]
    pub age_buckets: Option<AgeBuckets>,
    #[serde(rename = "keepAll")]
    pub keep_all: Option<bool>,
}

impl SurveySource {
    pub fn output_name(&self) -> String {
        match &self.output_name {
            Some(n) => n.clone(),
            None => format!("{}_recoded.csv", self.provider),
        }
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct ResultsSource {
    #[serde(rename = "filePath")]
    pub file_path: String,
    #[serde(rename = "excelWorksheetName")]
    pub excel_worksheet_name: Option<String>,
    #[serde(rename = "unitColumn")]
    pub unit_column: Option<String>,
    #[serde(rename = "stateVotesColumn")]
    pub state_votes_column: Option<String>,
    #[serde(rename = "bidenColumn")]
    pub biden_column: Option<String>,
    #[serde(rename = "trumpColumn")]
    pub trump_column: Option<String>,
}

impl ResultsSource {
    pub fn columns(&self) -> ResultColumns {
        let d = ResultColumns::default();
        ResultColumns {
            state: self.unit_column.clone().unwrap_or(d.state),
            state_votes: self.state_votes_column.clone().or(d.state_votes),
            biden: self.biden_column.clone().unwrap_or(d.biden),
            trump: self.trump_column.clone().unwrap_or(d.trump),
        }
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct MarginsSource {
    #[serde(rename = "filePath")]
    pub file_path: String,
    #[serde(rename = "unitColumn")]
    pub unit_column: Option<String>,
    #[serde(rename = "marginColumn")]
    pub margin_column: Option<String>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct PredictionSource {
    pub name: String,
    #[serde(rename = "marginPath")]
    pub margin_path: Option<String>,
    #[serde(rename = "winnerPath")]
    pub winner_path: Option<String>,
    #[serde(rename = "unitColumn")]
    pub unit_column: Option<String>,
    #[serde(rename = "marginColumn")]
    pub margin_column: Option<String>,
    #[serde(rename = "winnerColumn")]
    pub winner_column: Option<String>,
}

impl PredictionSource {
    pub fn unit_column(&self) -> String {
        self.unit_column.clone().unwrap_or_else(|| "State".to_string())
    }
    pub fn margin_column(&self) -> String {
        self.margin_column
            .clone()
            .unwrap_or_else(|| "margin_trump".to_string())
    }
    pub fn winner_column(&self) -> String {
        self.winner_column
            .clone()
            .unwrap_or_else(|| "state_pred".to_string())
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationSettings {
    #[serde(rename = "tiePolicy")]
    pub tie_policy: Option<String>,
    #[serde(rename = "actualResults")]
    pub actual_results: Option<ResultsSource>,
    #[serde(rename = "actualMargins")]
    pub actual_margins: Option<MarginsSource>,
    pub predictions: Vec<PredictionSource>,
    #[serde(rename = "summaryName")]
    pub summary_name: Option<String>,
    #[serde(rename = "outcomesName")]
    pub outcomes_name: Option<String>,
}

impl EvaluationSettings {
    pub fn tie_policy(&self) -> PResult<TiePolicy> {
        match self.tie_policy.as_deref() {
            None | Some("flag") => Ok(TiePolicy::Flag),
            Some("trump") => Ok(TiePolicy::Trump),
            Some(x) => whatever!("tiePolicy: expected flag or trump, got {:?}", x),
        }
    }

    pub fn summary_name(&self) -> String {
        self.summary_name
            .clone()
            .unwrap_or_else(|| "model_eval.json".to_string())
    }

    pub fn outcomes_name(&self) -> String {
        self.outcomes_name
            .clone()
            .unwrap_or_else(|| "accuracy_outcomes.csv".to_string())
    }
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    #[serde(rename = "outputSettings")]
    pub output_settings: Option<OutputSettings>,
    #[serde(rename = "geoReference")]
    pub geo_reference: Option<GeoReferenceSource>,
    #[serde(rename = "surveySources", default)]
    pub survey_sources: Vec<SurveySource>,
    pub evaluation: Option<EvaluationSettings>,
}

pub fn read_summary(path: &str) -> PResult<JSValue> {
    let contents = fs::read_to_string(path).context(OpeningFileSnafu { path })?;
    debug!("read_summary: {:?}", contents);
    let js: JSValue =
        serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu { path })?;
    Ok(js)
}

pub fn read_config(path: &str) -> PResult<RunConfig> {
    let config_str = fs::read_to_string(path).context(OpeningFileSnafu { path })?;
    let config: RunConfig =
        serde_json::from_str(&config_str).context(ParsingJsonSnafu { path })?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config() {
        let c: RunConfig = serde_json::from_str(
            r#"{"surveySources": [{"provider": "reuters", "filePath": "r.csv"}]}"#,
        )
        .unwrap();
        assert_eq!(c.survey_sources[0].output_name(), "reuters_recoded.csv");
        assert_eq!(c.output_settings, None);
        assert_eq!(c.evaluation, None);
        assert_eq!(
            OutputSettings::default().record_error_policy().unwrap(),
            RecordErrorPolicy::Drop
        );
    }

    #[test]
    fn geo_cutoff() {
        let g = |s: &str| -> GeoReferenceSource { serde_json::from_str(s).unwrap() };
        assert_eq!(g(r#"{"filePath": "x"}"#).cutoff().unwrap(), Some(57));
        assert_eq!(g(r#"{"filePath": "x", "cutoff": 60}"#).cutoff().unwrap(), Some(60));
        assert_eq!(g(r#"{"filePath": "x", "cutoff": "none"}"#).cutoff().unwrap(), None);
        assert!(g(r#"{"filePath": "x", "cutoff": "lots"}"#).cutoff().is_err());
        // Out of range for a FIPS code, not wrapped around.
        assert!(g(r#"{"filePath": "x", "cutoff": 4294967353}"#).cutoff().is_err());
        assert!(g(r#"{"filePath": "x", "cutoff": -1}"#).cutoff().is_err());
        assert!(g(r#"{"filePath": "x", "delimiter": "||"}"#)
            .delimiter_byte()
            .is_err());
    }

    #[test]
    fn evaluation_defaults() {
        let e: EvaluationSettings =
            serde_json::from_str(r#"{"predictions": [{"name": "ml"}]}"#).unwrap();
        assert_eq!(e.tie_policy().unwrap(), TiePolicy::Flag);
        assert_eq!(e.summary_name(), "model_eval.json");
        assert_eq!(e.predictions[0].winner_column(), "state_pred");
        let r: ResultsSource =
            serde_json::from_str(r#"{"filePath": "x", "bidenColumn": "Biden"}"#).unwrap();
        assert_eq!(r.columns().biden, "Biden");
        assert_eq!(r.columns().trump, "trump");
    }

    #[test]
    fn bad_options() {
        assert!(read_record_error_policy(&Some("ignore".to_string())).is_err());
        let a = AgeBuckets {
            edges: vec![0.0, 10.0],
            codes: vec![1, 2],
            closed: None,
        };
        assert!(a.to_table().is_err());
    }
}
