//! Functionality related to the `varflow run` command itself.

use std::fs;
use std::path::PathBuf;

use anyhow::bail;
use clap::Args;
use num_format::{Locale, ToFormattedString};
use tracing::info;

use crate::config::{self, Config};
use crate::dag::{execute, Budget, Dag, RunState};
use crate::pipeline::graph;

//========================//
// Command-line arguments //
//========================//

/// Command line arguments for `varflow run`.
#[derive(Args)]
pub struct RunArgs {
    /// Sample manifest.
    #[arg(short = 's', long, value_name = "PATH")]
    samples_file: PathBuf,

    /// Run configuration.
    #[arg(short = 'c', long, value_name = "PATH")]
    configuration: PathBuf,

    /// Directory that receives every artifact and log file.
    #[arg(short = 'o', long, value_name = "DIR", default_value = ".")]
    output_directory: PathBuf,

    /// Call the cohort jointly under this name instead of per sample.
    #[arg(long, value_name = "NAME")]
    cohort: Option<String>,

    /// Also write the run report as JSON to this path.
    #[arg(long, value_name = "PATH")]
    report: Option<PathBuf>,
}

//==============//
// Main command //
//==============//

/// Main method for the `varflow run` subcommand.
pub fn run(args: RunArgs) -> anyhow::Result<()> {
    info!("Starting run command...");

    let config = Config::load(&args.configuration)?;
    let samples = config::load_samples(&args.samples_file)?;
    if samples.is_empty() {
        bail!("sample manifest is empty");
    }
    info!("processing {} sample(s)", samples.len());

    fs::create_dir_all(&args.output_directory)?;

    // Per-sample graphs combine into one DAG so independent samples run
    // concurrently under the same budget.
    let mut dag = match &args.cohort {
        Some(name) => graph::build_cohort_graph(&config, &samples, name, &args.output_directory)?,
        None => {
            let mut dag = Dag::new();
            for sample in &samples {
                dag.extend(graph::build_sample_graph(
                    &config,
                    sample,
                    &args.output_directory,
                )?)?;
            }
            dag
        }
    };

    let budget = Budget::new(config.resources.num_cores, config.resources.max_mem);
    info!(
        "executing {} node(s) within {} core(s) and {} GB",
        dag.len().to_formatted_string(&Locale::en),
        budget.cores,
        budget.memory_gb
    );

    let report = execute(&mut dag, &budget)?;
    report.to_table().printstd();

    if let Some(path) = &args.report {
        report.write_json(path)?;
        info!("wrote run report to {}", path.display());
    }

    if !report.is_success() {
        bail!(
            "{} job(s) failed and {} were skipped",
            report.count(RunState::Failed),
            report.count(RunState::Skipped)
        );
    }

    Ok(())
}
