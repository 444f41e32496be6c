use clap::Parser;

/// Recodes election polls, attaches the FIPS code of each respondent's state and scores
/// state-level forecasts.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (file path, optional) The JSON file describing the survey sources and the evaluation.
    /// For more information about the file format, read the documentation of survey_coding::manual.
    #[clap(short, long, value_parser)]
    pub config: Option<String>,

    /// (file path) A reference file containing the expected evaluation summary in JSON format.
    /// If provided, ppredict will check that the computed summary matches the reference.
    #[clap(short, long, value_parser)]
    pub reference: Option<String>,

    /// (directory) If specified, the outputs are written to this directory. Setting this option
    /// overrides the outputDirectory that may be specified with the --config option.
    #[clap(short, long, value_parser)]
    pub out: Option<String>,

    /// (file path) A single survey file to recode, without configuration file.
    #[clap(short, long, value_parser)]
    pub input: Option<String>,

    /// (comet, reuters or census) The survey profile of the --input file.
    #[clap(long, value_parser)]
    pub input_type: Option<String>,

    /// (file path) The census state reference (national_state2020.txt), required with --input.
    #[clap(short, long, value_parser)]
    pub geo_reference: Option<String>,

    /// (default 57) FIPS codes at or above this value are not joined.
    #[clap(long, value_parser)]
    pub geo_cutoff: Option<u32>,

    /// (drop or abort, default drop) What to do with a record that cannot be recoded.
    #[clap(long, value_parser)]
    pub on_record_error: Option<String>,

    /// If passed as an argument, the raw columns are written before the coded columns.
    #[clap(long, takes_value = false)]
    pub keep_all: bool,

    /// (default: first worksheet) When using an Excel file, indicates the name of the worksheet to use.
    #[clap(long, value_parser)]
    pub excel_worksheet_name: Option<String>,

    // Other arguments
    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, takes_value = false)]
    pub verbose: bool,
}
