use anyhow::Result;
use clap::Parser;
use clap::error::ErrorKind;
use tracing::{debug, error, trace, warn};

use s3prune::config::Config;
use s3prune::config::args::CLIArgs;
use s3prune::types::error::{
    EXIT_CODE_FLAG_PARSE_ERROR, EXIT_CODE_OK, exit_code_from_error,
};
use s3prune::{DeletionPipeline, create_scanner, create_storage};

pub mod indicator;
mod tracing_init;
pub mod ui_config;

/// s3prune - bulk Amazon S3 object deletion.
///
/// This binary is a thin wrapper over the s3prune library.
#[tokio::main]
async fn main() {
    let config = load_config_exit_if_err();

    start_tracing_if_necessary(&config);

    trace!("config = {:?}", config);

    let exit_code = match run(config).await {
        Ok(()) => EXIT_CODE_OK,
        Err(e) => {
            error!("{:#}", e);
            exit_code_from_error(&e)
        }
    };

    std::process::exit(exit_code);
}

fn load_config_exit_if_err() -> Config {
    let args = match CLIArgs::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let _ = e.print();
            let exit_code = match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => EXIT_CODE_OK,
                _ => EXIT_CODE_FLAG_PARSE_ERROR,
            };
            std::process::exit(exit_code);
        }
    };

    match Config::try_from(args) {
        Ok(config) => config,
        Err(error_message) => {
            eprintln!("{error_message}");
            std::process::exit(EXIT_CODE_FLAG_PARSE_ERROR);
        }
    }
}

fn start_tracing_if_necessary(config: &Config) -> bool {
    let Some(ref tracing_config) = config.tracing_config else {
        return false;
    };

    tracing_init::init_tracing(tracing_config);
    true
}

async fn run(config: Config) -> Result<()> {
    let start_time = tokio::time::Instant::now();

    let target = create_storage(&config).await?;
    let scanner = create_scanner(&config, target.clone()).await?;

    let mut pipeline = DeletionPipeline::new(config.clone(), target);
    if ui_config::is_progress_indicator_needed(&config) || ui_config::is_show_result_needed(&config)
    {
        pipeline = pipeline.with_progress_reporter(Box::new(indicator::ProgressIndicator::new(
            ui_config::is_progress_indicator_needed(&config),
            ui_config::is_show_result_needed(&config),
        )));
    }

    debug!("deletion pipeline start.");
    let summary = pipeline.run(scanner).await?;

    let duration_sec = format!("{:.3}", start_time.elapsed().as_secs_f32());
    if summary.errors > 0 {
        warn!(
            errors = summary.errors,
            duration_sec = duration_sec,
            "some objects could not be deleted."
        );
    }

    debug!(duration_sec = duration_sec, "s3prune has been completed.");

    Ok(())
}
