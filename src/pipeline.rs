use log::{debug, info, warn};

use snafu::{prelude::*, Snafu};

use std::fs;
use std::path::Path;

use serde_json::json;
use serde_json::Value as JSValue;
use text_diff::print_diff;

use survey_coding::census::CensusError;
use survey_coding::codes::TableError;
use survey_coding::geo::{GeoError, GeoReference};
use survey_coding::profile::{ProfileError, SurveyProfile};
use survey_coding::recode::{RecodeError, RecordErrorPolicy};
use survey_coding::results::state_results;
use survey_coding::score::{
    comparisons, merge_outcomes, parse_margin, score, Outcome, OutcomeComparison, ScoreError,
    ScoreSummary, TiePolicy, Winner,
};
use survey_coding::{RawRecord, RawValue};

use crate::pipeline::config_reader::*;
use crate::pipeline::io_common::*;

pub mod config_reader;
mod io_census;
mod io_common;
mod io_csv;
mod io_excel;

#[derive(Debug, Snafu)]
pub enum PipelineError {
    #[snafu(display("Error opening file {path}"))]
    OpeningFile {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error writing file {path}"))]
    WritingOutput {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error parsing the JSON file {path}"))]
    ParsingJson {
        source: serde_json::Error,
        path: String,
    },
    #[snafu(display("Expected a number in the configuration"))]
    ParsingJsonNumber {},
    #[snafu(display("Error opening the CSV file {path}"))]
    CsvOpen { source: csv::Error, path: String },
    #[snafu(display("Error reading line {lineno} of {path}"))]
    CsvLineParse {
        source: csv::Error,
        path: String,
        lineno: usize,
    },
    #[snafu(display("Error writing the CSV file {path}"))]
    CsvWrite { source: csv::Error, path: String },
    #[snafu(display("Error opening file {path}"))]
    OpeningExcel {
        source: calamine::XlsxError,
        path: String,
    },
    #[snafu(display("The Excel file {path} has no data"))]
    EmptyExcel { path: String },
    #[snafu(display("The Excel file {path} has no worksheet named {name}"))]
    MissingWorksheet { path: String, name: String },
    #[snafu(display("Cannot read the cell at line {lineno}: {content}"))]
    ExcelWrongCellType { lineno: usize, content: String },
    #[snafu(display("Column {column} not found in {path}"))]
    MissingColumn { column: String, path: String },
    #[snafu(display("Cannot guess the format of {path} (expected .csv, .xlsx or .json)"))]
    UnsupportedInput { path: String },
    #[snafu(display("The configuration file has no parent directory"))]
    MissingParentDir {},
    #[snafu(display("A geographic reference is required to recode surveys"))]
    MissingGeoReference {},
    #[snafu(display("Invalid geographic reference {path}"))]
    Geo { source: GeoError, path: String },
    #[snafu(display("Invalid census table {path}"))]
    Census { source: CensusError, path: String },
    #[snafu(display("Error processing {path}"))]
    Profile { source: ProfileError, path: String },
    #[snafu(display("Invalid age buckets"))]
    Table { source: TableError },
    #[snafu(display("Invalid result table {path}"))]
    Results { source: RecodeError, path: String },
    #[snafu(display("Cannot decide the winner of {unit}"))]
    Tie { source: ScoreError, unit: String },
    #[snafu(display("Invalid value in {path}"))]
    Values { source: ScoreError, path: String },
    #[snafu(display("Scoring failed"))]
    Score { source: ScoreError },

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

pub type PResult<T> = Result<T, PipelineError>;

/// What a run produced.
#[derive(PartialEq, Debug, Clone)]
pub struct RunReport {
    /// The paths of the recoded tables.
    pub outputs: Vec<String>,
    pub summary: Option<JSValue>,
}

fn read_records(path: &str, worksheet_name: Option<&str>) -> PResult<Vec<RawRecord>> {
    info!("Attempting to read file {:?}", path);
    match input_format(path)? {
        InputFormat::Csv => io_csv::read_csv_records(path),
        InputFormat::Excel => io_excel::read_excel_records(path, worksheet_name),
        InputFormat::CensusJson => io_census::read_census_records(path),
    }
}

fn load_geo_reference(root: &Path, src: &GeoReferenceSource) -> PResult<GeoReference> {
    let path = resolve_path(root, &src.file_path);
    io_csv::read_geo_reference(&path, src.delimiter_byte()?, src.cutoff()?)
}

fn build_profile(source: &SurveySource) -> PResult<SurveyProfile> {
    let path = source.file_path.as_str();
    let mut profile = SurveyProfile::by_name(&source.provider).context(ProfileSnafu { path })?;
    if let Some(choices) = &source.vote_choices {
        profile = profile
            .with_eligible_choices(choices)
            .context(ProfileSnafu { path })?;
    }
    if let Some(buckets) = &source.age_buckets {
        profile = profile
            .with_table("age_group", buckets.to_table()?)
            .context(ProfileSnafu { path })?;
    }
    Ok(profile)
}

fn recode_file(
    profile: &SurveyProfile,
    input: &str,
    worksheet_name: Option<&str>,
    reference: &GeoReference,
    policy: RecordErrorPolicy,
    keep_all: bool,
    output: &str,
) -> PResult<()> {
    let records = read_records(input, worksheet_name)?;
    let outcome = profile
        .run(&records, reference, policy)
        .context(ProfileSnafu { path: input })?;
    for u in outcome.unmatched.iter() {
        debug!("recode_file: row {} has unknown geography {:?}", u.row, u.value);
    }
    let dropped = outcome.rejected.len() + outcome.dropped.len();
    if dropped > 0 || !outcome.unmatched.is_empty() {
        warn!(
            "{}: {} records dropped, {} records without a known state",
            input,
            dropped,
            outcome.unmatched.len()
        );
    }
    let header = profile.output_columns(&outcome.records, keep_all);
    let rows = profile.to_rows(&outcome.records, keep_all);
    write_table(output, &header, &rows)
}

/// The column, with rows without a unit removed.
fn unit_values<'a>(
    records: &'a [RawRecord],
    unit_column: &str,
    value_column: &str,
    path: &str,
) -> PResult<Vec<(String, &'a RawValue)>> {
    let mut res: Vec<(String, &RawValue)> = Vec::new();
    for r in records.iter() {
        let unit = r.get(unit_column).context(MissingColumnSnafu {
            column: unit_column,
            path,
        })?;
        let v = r.get(value_column).context(MissingColumnSnafu {
            column: value_column,
            path,
        })?;
        if unit.is_missing() {
            continue;
        }
        res.push((unit.to_string(), v));
    }
    Ok(res)
}

fn read_margin(v: &RawValue, path: &str) -> PResult<Option<f64>> {
    match v {
        RawValue::Missing => Ok(None),
        RawValue::Number(x) if x.is_finite() => Ok(Some(*x)),
        RawValue::Number(_) => whatever!("{}: invalid margin {}", path, v),
        RawValue::Text(s) => Ok(Some(parse_margin(s).context(ValuesSnafu { path })?)),
    }
}

fn read_winner(v: &RawValue, path: &str) -> PResult<Option<Winner>> {
    if v.is_missing() {
        return Ok(None);
    }
    match v.as_number() {
        Some(x) if x.fract() == 0.0 => match Winner::from_code(x as i32) {
            Some(w) => Ok(Some(w)),
            None => whatever!("{}: unknown winner code {}", path, v),
        },
        _ => whatever!("{}: unknown winner code {}", path, v),
    }
}

fn read_margins(
    path: &str,
    unit_column: &str,
    margin_column: &str,
) -> PResult<Vec<(String, Outcome)>> {
    let records = read_records(path, None)?;
    let mut res: Vec<(String, Outcome)> = Vec::new();
    for (unit, v) in unit_values(&records, unit_column, margin_column, path)? {
        let o = Outcome {
            winner: None,
            margin: read_margin(v, path)?,
        };
        res.push((unit, o));
    }
    Ok(res)
}

fn read_winners(
    path: &str,
    unit_column: &str,
    winner_column: &str,
) -> PResult<Vec<(String, Outcome)>> {
    let records = read_records(path, None)?;
    let mut res: Vec<(String, Outcome)> = Vec::new();
    for (unit, v) in unit_values(&records, unit_column, winner_column, path)? {
        let o = Outcome {
            winner: read_winner(v, path)?,
            margin: None,
        };
        res.push((unit, o));
    }
    Ok(res)
}

fn read_actual_outcomes(
    root: &Path,
    eval: &EvaluationSettings,
    policy: TiePolicy,
) -> PResult<Vec<(String, Outcome)>> {
    let winners: Vec<(String, Outcome)> = match &eval.actual_results {
        Some(src) => {
            let path = resolve_path(root, &src.file_path);
            let records = read_records(&path, src.excel_worksheet_name.as_deref())?;
            let results =
                state_results(&records, &src.columns()).context(ResultsSnafu { path: &path })?;
            let mut res: Vec<(String, Outcome)> = Vec::new();
            for r in results.iter() {
                let o = r.outcome(policy).context(TieSnafu { unit: &r.state })?;
                res.push((r.state.clone(), o));
            }
            res
        }
        None => Vec::new(),
    };
    let margins: Vec<(String, Outcome)> = match &eval.actual_margins {
        Some(src) => read_margins(
            &resolve_path(root, &src.file_path),
            src.unit_column.as_deref().unwrap_or("State"),
            src.margin_column.as_deref().unwrap_or("%"),
        )?,
        None => Vec::new(),
    };
    if eval.actual_results.is_none() && eval.actual_margins.is_none() {
        whatever!("evaluation: actualResults or actualMargins must be provided")
    }
    Ok(merge_outcomes(&winners, &margins))
}

fn read_prediction(root: &Path, p: &PredictionSource) -> PResult<Vec<(String, Outcome)>> {
    let winners = match &p.winner_path {
        Some(x) => read_winners(&resolve_path(root, x), &p.unit_column(), &p.winner_column())?,
        None => Vec::new(),
    };
    let margins = match &p.margin_path {
        Some(x) => read_margins(&resolve_path(root, x), &p.unit_column(), &p.margin_column())?,
        None => Vec::new(),
    };
    if p.winner_path.is_none() && p.margin_path.is_none() {
        whatever!("prediction {}: winnerPath or marginPath must be provided", p.name)
    }
    Ok(merge_outcomes(&winners, &margins))
}

fn tie_policy_name(policy: TiePolicy) -> &'static str {
    match policy {
        TiePolicy::Flag => "flag",
        TiePolicy::Trump => "trump",
    }
}

fn build_summary_js(policy: TiePolicy, summaries: &[ScoreSummary]) -> JSValue {
    let results: Vec<JSValue> = summaries
        .iter()
        .map(|s| {
            json!({
                "source": s.source,
                "units": s.units,
                "correct": s.correct,
                "accuracyRate": s.accuracy_rate,
                "marginUnits": s.margin_units,
                "meanSquaredError": s.mean_squared_error,
            })
        })
        .collect();
    json!({
        "config": {"tiePolicy": tie_policy_name(policy)},
        "results": results
    })
}

fn opt_text<T: ToString>(x: Option<T>) -> String {
    x.map(|v| v.to_string()).unwrap_or_default()
}

/// One row per unit: the actual outcome, then the outcome of each source and whether
/// its winner is right.
fn comparison_table(
    comps: &[OutcomeComparison],
    sources: &[String],
) -> (Vec<String>, Vec<Vec<String>>) {
    let mut header: Vec<String> = vec![
        "unit".to_string(),
        "actual_winner".to_string(),
        "actual_margin".to_string(),
    ];
    for s in sources.iter() {
        header.push(format!("{}_winner", s));
        header.push(format!("{}_margin", s));
        header.push(format!("{}_correct", s));
    }
    let rows = comps
        .iter()
        .map(|c| {
            let mut row = vec![
                c.unit.clone(),
                opt_text(c.actual.winner.map(|w| w.code())),
                opt_text(c.actual.margin),
            ];
            for s in sources.iter() {
                let p = c.prediction(s);
                row.push(opt_text(p.winner.map(|w| w.code())));
                row.push(opt_text(p.margin));
                row.push(opt_text(
                    c.actual.winner.map(|w| (p.winner == Some(w)) as i32),
                ));
            }
            row
        })
        .collect();
    (header, rows)
}

fn check_summary(result_js: &JSValue, summary_path: &str) -> PResult<()> {
    let path = summary_path;
    let pretty_js_stats =
        serde_json::to_string_pretty(result_js).context(ParsingJsonSnafu { path })?;
    let summary_ref = read_summary(path)?;
    debug!("summary: {:?}", summary_ref);
    let pretty_js_summary_ref =
        serde_json::to_string_pretty(&summary_ref).context(ParsingJsonSnafu { path })?;
    if pretty_js_summary_ref != pretty_js_stats {
        warn!("Found differences with the reference summary");
        print_diff(
            pretty_js_summary_ref.as_str(),
            pretty_js_stats.as_ref(),
            "\n",
        );
        whatever!("Difference detected between calculated summary and reference summary")
    }
    Ok(())
}

fn run_evaluation(
    root: &Path,
    out_dir: &str,
    eval: &EvaluationSettings,
    check_summary_path: Option<String>,
) -> PResult<JSValue> {
    let policy = eval.tie_policy()?;
    let actual = read_actual_outcomes(root, eval, policy)?;
    let mut predictions: Vec<(String, Vec<(String, Outcome)>)> = Vec::new();
    for p in eval.predictions.iter() {
        predictions.push((p.name.clone(), read_prediction(root, p)?));
    }
    let sources: Vec<String> = predictions.iter().map(|(s, _)| s.clone()).collect();
    let comps = comparisons(&actual, &predictions);
    let summaries = score(&comps, &sources).context(ScoreSnafu {})?;

    let result_js = build_summary_js(policy, &summaries);
    let pretty_js_stats =
        serde_json::to_string_pretty(&result_js).context(ParsingJsonSnafu { path: out_dir })?;
    println!("summary:{}", pretty_js_stats);

    let summary_path = resolve_path(Path::new(out_dir), &eval.summary_name());
    fs::create_dir_all(out_dir).context(WritingOutputSnafu { path: out_dir })?;
    fs::write(&summary_path, &pretty_js_stats).context(WritingOutputSnafu {
        path: &summary_path,
    })?;
    let (header, rows) = comparison_table(&comps, &sources);
    write_table(
        &resolve_path(Path::new(out_dir), &eval.outcomes_name()),
        &header,
        &rows,
    )?;

    // The reference summary, if provided for comparison
    if let Some(summary_p) = check_summary_path {
        check_summary(&result_js, &summary_p)?;
    }
    Ok(result_js)
}

/// Runs all the steps described in a JSON configuration file.
pub fn run_config(
    config_path: &str,
    out_override: Option<String>,
    check_summary_path: Option<String>,
) -> PResult<RunReport> {
    let config = read_config(config_path)?;
    info!("config: {:?}", config);
    let root_p = Path::new(config_path)
        .parent()
        .context(MissingParentDirSnafu {})?;
    let settings = config.output_settings.clone().unwrap_or_default();
    let policy = settings.record_error_policy()?;
    let out_dir = match (out_override, &settings.output_directory) {
        (Some(o), _) => o,
        (None, Some(d)) => resolve_path(root_p, d),
        (None, None) => root_p.display().to_string(),
    };

    if config.survey_sources.is_empty() && config.evaluation.is_none() {
        whatever!("{}: no survey source and no evaluation", config_path)
    }

    let mut outputs: Vec<String> = Vec::new();
    if !config.survey_sources.is_empty() {
        let geo_src = config
            .geo_reference
            .as_ref()
            .context(MissingGeoReferenceSnafu {})?;
        let reference = load_geo_reference(root_p, geo_src)?;
        for source in config.survey_sources.iter() {
            let profile = build_profile(source)?;
            let input = resolve_path(root_p, &source.file_path);
            let output = resolve_path(Path::new(&out_dir), &source.output_name());
            let keep_all = source.keep_all.or(settings.keep_all).unwrap_or(false);
            recode_file(
                &profile,
                &input,
                source.excel_worksheet_name.as_deref(),
                &reference,
                policy,
                keep_all,
                &output,
            )?;
            outputs.push(output);
        }
    }

    let summary = match &config.evaluation {
        Some(eval) => Some(run_evaluation(root_p, &out_dir, eval, check_summary_path)?),
        None if check_summary_path.is_some() => {
            whatever!("A reference summary was given but the configuration has no evaluation")
        }
        None => None,
    };
    Ok(RunReport { outputs, summary })
}

/// The options to recode a single file without configuration.
#[derive(PartialEq, Debug, Clone, Default)]
pub struct SingleInput {
    pub input: String,
    pub input_type: Option<String>,
    pub geo_reference: Option<String>,
    pub geo_cutoff: Option<u32>,
    pub out: Option<String>,
    pub keep_all: bool,
    pub excel_worksheet_name: Option<String>,
    pub on_record_error: Option<String>,
}

/// Recodes one file and returns the path of the recoded table.
pub fn run_single(opts: &SingleInput) -> PResult<String> {
    let input_type = match &opts.input_type {
        Some(x) => x.clone(),
        None => whatever!("--input-type is required with --input (comet, reuters or census)"),
    };
    let geo_path = match &opts.geo_reference {
        Some(x) => x.clone(),
        None => whatever!("--geo-reference is required with --input"),
    };
    let policy = read_record_error_policy(&opts.on_record_error)?;
    let reference = io_csv::read_geo_reference(
        &geo_path,
        b'|',
        opts.geo_cutoff.or(Some(survey_coding::geo::DEFAULT_FIPS_CUTOFF)),
    )?;
    let profile = SurveyProfile::by_name(&input_type).context(ProfileSnafu {
        path: &opts.input,
    })?;
    let out_dir = match &opts.out {
        Some(o) => o.clone(),
        None => Path::new(&opts.input)
            .parent()
            .context(MissingParentDirSnafu {})?
            .display()
            .to_string(),
    };
    let output = resolve_path(
        Path::new(&out_dir),
        &format!("{}_recoded.csv", simplify_file_name(&opts.input)),
    );
    recode_file(
        &profile,
        &opts.input,
        opts.excel_worksheet_name.as_deref(),
        &reference,
        policy,
        opts.keep_all,
        &output,
    )?;
    Ok(output)
}
