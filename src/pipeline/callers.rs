//! Variant caller wrappers: one command builder per supported caller.
//!
//! Callers are opaque collaborators; each wrapper only assembles an argv
//! line. The dispatch table is the crate's capability surface — asking for a
//! caller that has no wrapper is a [`PipelineError::CapabilityNotSupported`]
//! at graph-construction time, before anything runs.

use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::errors::{PipelineError, Result};

use super::{artifact, join_paths, StageCommand};

/// Builds the command for one named caller over the given recalibrated
/// BAM(s). In per-sample mode `bams` holds one path; in cohort mode it holds
/// every sample's, for joint calling.
pub fn command_for(
    caller: &str,
    config: &Config,
    name: &str,
    bams: &[PathBuf],
    regions: Option<&Path>,
    out_dir: &Path,
) -> Result<StageCommand> {
    match caller {
        "freebayes" => freebayes(config, name, bams, out_dir),
        "mutect" => mutect(config, name, bams, regions, out_dir),
        "vardict" => vardict(config, name, bams, regions, out_dir),
        "scalpel" => scalpel(config, name, bams, regions, out_dir),
        "platypus" => platypus(config, name, bams, out_dir),
        other => Err(PipelineError::CapabilityNotSupported(format!(
            "variant caller `{}`",
            other
        ))),
    }
}

/// The callers this build knows how to drive.
pub fn supported_callers() -> &'static [&'static str] {
    &["freebayes", "mutect", "vardict", "scalpel", "platypus"]
}

fn vcf_and_log(out_dir: &Path, name: &str, caller: &str) -> (PathBuf, PathBuf) {
    (
        artifact(out_dir, name, &format!("{}.vcf", caller)),
        artifact(out_dir, name, &format!("{}.log", caller)),
    )
}

fn freebayes(config: &Config, name: &str, bams: &[PathBuf], out_dir: &Path) -> Result<StageCommand> {
    let tool = config.tool("freebayes")?;
    let (output, logfile) = vcf_and_log(out_dir, name, "freebayes");

    let command = format!(
        "{bin} --fasta-reference {reference} --min-alternate-fraction {af} \
         --pooled-discrete --pooled-continuous --genotype-qualities \
         --report-genotype-likelihood-max --allele-balance-priors-off \
         --min-repeat-entropy 1 -v {output} {bams}",
        bin = tool.bin,
        reference = config.settings.reference.display(),
        af = config.settings.min_alt_af,
        output = output.display(),
        bams = join_paths(bams),
    );

    Ok(StageCommand {
        command,
        output,
        logfile,
    })
}

fn mutect(
    config: &Config,
    name: &str,
    bams: &[PathBuf],
    regions: Option<&Path>,
    out_dir: &Path,
) -> Result<StageCommand> {
    let tool = config.tool("mutect")?;
    let (output, logfile) = vcf_and_log(out_dir, name, "mutect");

    let mut command = format!(
        "java -Xmx{mem}g -jar {bin} --analysis_type MuTect \
         --reference_sequence {reference} --vcf {output}",
        mem = tool.max_mem,
        bin = tool.bin,
        reference = config.settings.reference.display(),
        output = output.display(),
    );
    for bam in bams {
        command.push_str(&format!(" --input_file:tumor {}", bam.display()));
    }
    if let Some(dbsnp) = &config.settings.dbsnp {
        command.push_str(&format!(" --dbsnp {}", dbsnp.display()));
    }
    if let Some(bed) = regions {
        command.push_str(&format!(" --intervals {}", bed.display()));
    }

    Ok(StageCommand {
        command,
        output,
        logfile,
    })
}

fn vardict(
    config: &Config,
    name: &str,
    bams: &[PathBuf],
    regions: Option<&Path>,
    out_dir: &Path,
) -> Result<StageCommand> {
    let tool = config.tool("vardict")?;
    let (output, logfile) = vcf_and_log(out_dir, name, "vardict");

    let mut command = format!(
        "{bin} -G {reference} -f {af} -N {name} -b '{bams}' -th {cores} -z -c 1 -S 2 -E 3 -g 4",
        bin = tool.bin,
        reference = config.settings.reference.display(),
        af = config.settings.min_alt_af,
        name = name,
        bams = join_paths(bams),
        cores = tool.num_cores,
    );
    if let Some(bed) = regions {
        command.push_str(&format!(" {}", bed.display()));
    }
    command.push_str(&format!(" > {}", output.display()));

    Ok(StageCommand {
        command,
        output,
        logfile,
    })
}

fn scalpel(
    config: &Config,
    name: &str,
    bams: &[PathBuf],
    regions: Option<&Path>,
    out_dir: &Path,
) -> Result<StageCommand> {
    let tool = config.tool("scalpel")?;
    let (output, logfile) = vcf_and_log(out_dir, name, "scalpel");
    let work_dir = artifact(out_dir, name, "scalpel.work");

    let mut command = format!(
        "{bin} --single --ref {reference} --numprocs {cores} --dir {dir}",
        bin = tool.bin,
        reference = config.settings.reference.display(),
        cores = tool.num_cores,
        dir = work_dir.display(),
    );
    for bam in bams {
        command.push_str(&format!(" --bam {}", bam.display()));
    }
    if let Some(bed) = regions {
        command.push_str(&format!(" --bed {}", bed.display()));
    }
    command.push_str(&format!(
        " && cp {}/variants.indel.vcf {}",
        work_dir.display(),
        output.display()
    ));

    Ok(StageCommand {
        command,
        output,
        logfile,
    })
}

fn platypus(config: &Config, name: &str, bams: &[PathBuf], out_dir: &Path) -> Result<StageCommand> {
    let tool = config.tool("platypus")?;
    let (output, logfile) = vcf_and_log(out_dir, name, "platypus");

    let command = format!(
        "{bin} callVariants --refFile={reference} --nCPU={cores} \
         --bamFiles={bams} --output={output}",
        bin = tool.bin,
        reference = config.settings.reference.display(),
        cores = tool.num_cores,
        bams = bams
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join(","),
        output = output.display(),
    );

    Ok(StageCommand {
        command,
        output,
        logfile,
    })
}

#[cfg(test)]
mod tests {

    use super::*;

    static CONFIG: &str = r#"
        [settings]
        reference = "/refs/b37.fasta"
        reference_dict = "/refs/b37.dict"
        callers = ["freebayes", "mutect"]

        [resources]
        num_cores = 4
        max_mem = 4

        [freebayes]
        bin = "freebayes"
    "#;

    #[test]
    pub fn test_unknown_caller_is_capability_not_supported() {
        let config = Config::from_str(CONFIG).unwrap();
        let err = command_for(
            "strelka",
            &config,
            "S1",
            &[PathBuf::from("/out/S1.bam")],
            None,
            Path::new("/out"),
        )
        .unwrap_err();

        assert!(matches!(err, PipelineError::CapabilityNotSupported(_)));
    }

    #[test]
    pub fn test_known_caller_without_section_is_a_configuration_error() {
        let config = Config::from_str(CONFIG).unwrap();
        let err = command_for(
            "mutect",
            &config,
            "S1",
            &[PathBuf::from("/out/S1.bam")],
            None,
            Path::new("/out"),
        )
        .unwrap_err();

        assert!(matches!(err, PipelineError::Configuration(_)));
    }

    #[test]
    pub fn test_freebayes_command_shape() {
        let config = Config::from_str(CONFIG).unwrap();
        let cmd = command_for(
            "freebayes",
            &config,
            "S1",
            &[PathBuf::from("/out/S1.recalibrated.sorted.bam")],
            None,
            Path::new("/out"),
        )
        .unwrap();

        assert!(cmd.command.contains("--fasta-reference /refs/b37.fasta"));
        assert!(cmd.command.ends_with("/out/S1.recalibrated.sorted.bam"));
        assert_eq!(cmd.output, Path::new("/out/S1.freebayes.vcf"));
    }
}
