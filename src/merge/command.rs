//! Functionality related to the `varflow merge` command itself.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Args;
use num_format::{Locale, ToFormattedString};
use tracing::{debug, info};

use crate::invoke;
use crate::merge::{self, CallerOutput, ContigOrder, MergeOptions, Reference};

//========================//
// Command-line arguments //
//========================//

/// Command line arguments for `varflow merge`.
#[derive(Args)]
pub struct MergeArgs {
    /// Sample (or cohort) name; used for default output naming.
    #[arg(short, long, value_name = "NAME")]
    sample: String,

    /// One caller's VCF, tagged as `caller=path`. Repeat per caller.
    #[arg(long = "vcf", value_name = "CALLER=PATH", required = true)]
    vcfs: Vec<String>,

    /// Restrict and order the merge to these callers (defaults to every
    /// `--vcf` in the order given).
    #[arg(long, value_name = "CALLERS", value_delimiter = ',')]
    callers: Option<Vec<String>>,

    /// Reference sequence dictionary establishing output contig order.
    #[arg(short = 'd', long, value_name = "PATH")]
    reference_dict: PathBuf,

    /// Reference FASTA for left-normalization. Without it, records are
    /// decomposed and trimmed but not shifted across their anchor base.
    #[arg(short = 'r', long, value_name = "PATH")]
    reference_fasta: Option<PathBuf>,

    /// Minimum number of callers that must support a record.
    #[arg(long, value_name = "USIZE", default_value_t = 1)]
    num_pass: usize,

    /// Output path. Defaults to `{sample}.merged.sorted.vcf`.
    #[arg(short = 'o', long, value_name = "PATH")]
    output: Option<PathBuf>,

    /// Additionally bgzip-compress and tabix-index the merged VCF.
    #[arg(long)]
    bgzip: bool,
}

//================//
// Main command   //
//================//

/// Main method for the `varflow merge` subcommand.
pub fn merge(args: MergeArgs) -> anyhow::Result<()> {
    info!("Starting merge command...");

    let mut outputs = Vec::new();
    for spec in &args.vcfs {
        let (caller, path) = spec.split_once('=').with_context(|| {
            format!("invalid --vcf value `{}`: expected `caller=path`", spec)
        })?;
        outputs.push(CallerOutput::new(caller, path));
    }

    if let Some(names) = &args.callers {
        outputs = merge::select(&outputs, names)?;
    }

    debug!("merging {} caller output(s)", outputs.len());

    let contigs = ContigOrder::from_dict(&args.reference_dict)?;
    let reference = match &args.reference_fasta {
        Some(path) => Some(
            Reference::load(path)
                .with_context(|| format!("loading reference FASTA: {}", path.display()))?,
        ),
        None => None,
    };

    let options = MergeOptions {
        contigs,
        reference,
        num_pass_callers: args.num_pass,
    };

    let call_set = merge::merge(&outputs, &options)?;

    let output = args
        .output
        .unwrap_or_else(|| PathBuf::from(format!("{}.merged.sorted.vcf", args.sample)));
    merge::write_call_set_to_path(&call_set, &options.contigs, &output)?;

    info!(
        "wrote {} merged record(s) to {}",
        call_set.len().to_formatted_string(&Locale::en),
        output.display()
    );

    if args.bgzip {
        bgzip_and_tabix(&output)?;
    }

    Ok(())
}

/// Compresses and indexes a written VCF in place, producing `{vcf}.gz` and
/// `{vcf}.gz.tbi`. `bgzip` and `tabix` are expected on the PATH.
pub fn bgzip_and_tabix(vcf: &Path) -> anyhow::Result<()> {
    let compressed = format!("{}.gz", vcf.display());

    invoke::run_and_log_command(
        &format!("bgzip -c {} > {}", vcf.display(), compressed),
        format!("{}.bgzip.log", vcf.display()),
    )?;
    invoke::run_and_log_command(
        &format!("tabix -p vcf {}", compressed),
        format!("{}.tabix.log", vcf.display()),
    )?;

    Ok(())
}
