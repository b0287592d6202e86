//! Functionality related to the `varflow coverage` command itself.

use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use tracing::{debug, info};

use crate::config::{self, Config};
use crate::coverage::record::read_coverage_file;
use crate::coverage::summarize::{summarize, write_summary_to_path, SampleCoverage};
use crate::errors::PipelineError;

//========================//
// Command-line arguments //
//========================//

/// Command line arguments for `varflow coverage`.
#[derive(Args)]
pub struct CoverageArgs {
    /// Sample manifest (each sample must carry a `coverage` key).
    #[arg(short = 's', long, value_name = "PATH")]
    samples_file: PathBuf,

    /// Run configuration (supplies the coverage thresholds).
    #[arg(short = 'c', long, value_name = "PATH")]
    configuration: PathBuf,

    /// Output path for the summary report.
    #[arg(
        short = 'o',
        long,
        value_name = "PATH",
        default_value = "sample_coverage_summary.txt"
    )]
    output: PathBuf,
}

//==============//
// Main command //
//==============//

/// Main method for the `varflow coverage` subcommand.
pub fn coverage(args: CoverageArgs) -> anyhow::Result<()> {
    info!("Starting coverage command...");

    let config = Config::load(&args.configuration)?;
    let samples = config::load_samples(&args.samples_file)?;
    info!("processing {} sample(s)", samples.len());

    let mut inputs = Vec::new();
    for sample in &samples {
        let path = sample.coverage.as_ref().ok_or_else(|| {
            PipelineError::Configuration(format!(
                "sample `{}` has no `coverage` key in the manifest",
                sample.name
            ))
        })?;

        let records = read_coverage_file(path)
            .with_context(|| format!("reading coverage for sample `{}`", sample.name))?;
        debug!("  [*] {}: {} region record(s)", sample.name, records.len());

        inputs.push(SampleCoverage {
            sample: sample.name.clone(),
            protocol: sample.extraction.clone(),
            records,
        });
    }

    let summaries = summarize(&inputs);
    let thresholds = [
        config.settings.coverage_threshold,
        config.settings.coverage_threshold2,
    ];
    write_summary_to_path(&summaries, thresholds, &args.output)?;

    info!(
        "wrote summary for {} region(s) to {}",
        summaries.len(),
        args.output.display()
    );

    Ok(())
}
