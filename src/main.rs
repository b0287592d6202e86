use clap::{CommandFactory, FromArgMatches, Parser, Subcommand};
use git_testament::{git_testament, render_testament};

use varflow::coverage::command::{coverage, CoverageArgs};
use varflow::merge::command::{merge, MergeArgs};
use varflow::pipeline::command::{run, RunArgs};

git_testament!(TESTAMENT);

#[derive(Parser)]
#[command(name = "varflow", propagate_version = true)]
struct Cli {
    /// Only errors are printed to the stderr stream.
    #[arg(short = 'q', long, global = true)]
    quiet: bool,

    /// All available information, including debug information, is printed
    /// to stderr.
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Executes the variant calling pipeline for every sample in a manifest.
    Run(RunArgs),

    /// Merges per-caller VCFs into one ensemble call set.
    Merge(MergeArgs),

    /// Summarizes per-region coverage across samples.
    Coverage(CoverageArgs),
}

fn main() -> anyhow::Result<()> {
    let version = render_testament!(TESTAMENT);
    let matches = Cli::command().version(version).get_matches();
    let cli = Cli::from_arg_matches(&matches)?;

    let mut level = tracing::Level::INFO;
    if cli.quiet {
        level = tracing::Level::ERROR;
    } else if cli.verbose {
        level = tracing::Level::DEBUG;
    }

    let subscriber = tracing_subscriber::fmt::Subscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);

    match cli.command {
        Commands::Run(args) => run(args),
        Commands::Merge(args) => merge(args),
        Commands::Coverage(args) => coverage(args),
    }
}
