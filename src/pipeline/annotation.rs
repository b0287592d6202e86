//! Post-merge finishing stages: allele normalization, functional annotation
//! with snpEff, and loading the final call set into a GEMINI database.

use std::path::Path;

use crate::config::Config;
use crate::errors::{PipelineError, Result};

use super::{artifact, StageCommand};

/// Decomposes and left-aligns the filtered call set with `vt`, patching the
/// AD header line so `vt decompose` splits the field per allele.
pub fn vt_normalization(
    config: &Config,
    name: &str,
    input_vcf: &Path,
    out_dir: &Path,
) -> Result<StageCommand> {
    let vt = config.tool("vt")?;
    let output = artifact(out_dir, name, "normalized.vcf");

    let command = format!(
        "zless {input} \
         | sed 's/ID=AD,Number=./ID=AD,Number=R/' \
         | {vt} decompose -s - \
         | {vt} normalize -r {reference} - > {output}",
        input = input_vcf.display(),
        vt = vt.bin,
        reference = config.settings.reference.display(),
        output = output.display(),
    );

    Ok(StageCommand {
        command,
        output,
        logfile: artifact(out_dir, name, "normalize.log"),
    })
}

/// Annotates functional effects with snpEff against the configured database.
pub fn snpeff(config: &Config, name: &str, input_vcf: &Path, out_dir: &Path) -> Result<StageCommand> {
    let tool = config.tool("snpeff")?;
    let database = config.settings.snpeff_reference.as_ref().ok_or_else(|| {
        PipelineError::Configuration(
            "snpeff is configured but [settings] has no `snpeff_reference`".to_string(),
        )
    })?;
    let output = artifact(out_dir, name, "snpeff.vcf");

    let command = format!(
        "java -Xmx{mem}g -jar {bin} -formatEff -classic {database} {input} > {output}",
        mem = tool.max_mem,
        bin = tool.bin,
        database = database,
        input = input_vcf.display(),
        output = output.display(),
    );

    Ok(StageCommand {
        command,
        output,
        logfile: artifact(out_dir, name, "snpeff.log"),
    })
}

/// Loads the annotated call set into a GEMINI database for querying.
pub fn gemini_load(
    config: &Config,
    name: &str,
    input_vcf: &Path,
    out_dir: &Path,
) -> Result<StageCommand> {
    let gemini = config.tool("gemini")?;
    let output = artifact(out_dir, name, "db");

    let command = format!(
        "{bin} load --cores {cores} -v {input} -t snpEff {output}",
        bin = gemini.bin,
        cores = gemini.num_cores,
        input = input_vcf.display(),
        output = output.display(),
    );

    Ok(StageCommand {
        command,
        output,
        logfile: artifact(out_dir, name, "gemini.log"),
    })
}
