use clap::Parser;
use log::{debug, error, info};
use snafu::ErrorCompat;

mod args;
mod pipeline;

use crate::args::Args;
use crate::pipeline::{run_config, run_single, PResult, SingleInput};

fn run(args: &Args) -> PResult<()> {
    match (&args.config, &args.input) {
        (Some(config_path), _) => {
            let report = run_config(config_path, args.out.clone(), args.reference.clone())?;
            for p in report.outputs.iter() {
                info!("Recoded table: {}", p);
            }
            Ok(())
        }
        (None, Some(input)) => {
            let opts = SingleInput {
                input: input.clone(),
                input_type: args.input_type.clone(),
                geo_reference: args.geo_reference.clone(),
                geo_cutoff: args.geo_cutoff,
                out: args.out.clone(),
                keep_all: args.keep_all,
                excel_worksheet_name: args.excel_worksheet_name.clone(),
                on_record_error: args.on_record_error.clone(),
            };
            let output = run_single(&opts)?;
            info!("Recoded table: {}", output);
            Ok(())
        }
        (None, None) => {
            snafu::whatever!("Either --config or --input must be provided")
        }
    }
}

fn main() {
    let args = Args::parse();
    let default_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();
    debug!("args: {:?}", args);

    if let Err(e) = run(&args) {
        error!("Error occurred {:?}", e);
        eprintln!("An error occurred: {}", e);
        let mut cause = std::error::Error::source(&e);
        while let Some(c) = cause {
            eprintln!("  caused by: {}", c);
            cause = std::error::Error::source(c);
        }
        if let Some(bt) = ErrorCompat::backtrace(&e) {
            eprintln!("trace: {}", bt);
        }
        std::process::exit(1);
    }
}
