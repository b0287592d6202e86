//! GATK/picard refinement and finishing stages.

use std::path::Path;

use crate::config::Config;
use crate::errors::Result;

use super::{artifact, StageCommand};

fn java_jar(max_mem: usize, jar: &str) -> String {
    format!("java -Xmx{}g -jar {}", max_mem, jar)
}

/// Assigns read groups with picard `AddOrReplaceReadGroups` and indexes the
/// resulting BAM.
pub fn add_or_replace_readgroups(
    config: &Config,
    name: &str,
    input_bam: &Path,
    out_dir: &Path,
) -> Result<StageCommand> {
    let picard = config.tool("picard")?;
    let output = artifact(out_dir, name, "rg.sorted.bam");

    let readgroups = format!(
        "{java} AddOrReplaceReadGroups INPUT={input} OUTPUT={output} \
         RGID={name} RGSM={name} RGLB={name} RGPL=illumina RGPU=miseq",
        java = java_jar(picard.max_mem, &picard.bin),
        input = input_bam.display(),
        output = output.display(),
        name = name,
    );
    let index = format!(
        "{java} BuildBamIndex INPUT={output}",
        java = java_jar(picard.max_mem, &picard.bin),
        output = output.display(),
    );

    Ok(StageCommand {
        command: format!("{} && {}", readgroups, index),
        output,
        logfile: artifact(out_dir, name, "readgroup.log"),
    })
}

/// Identifies realignment target intervals with `RealignerTargetCreator`.
pub fn realign_target_creator(
    config: &Config,
    name: &str,
    input_bam: &Path,
    out_dir: &Path,
) -> Result<StageCommand> {
    let gatk = config.tool("gatk")?;
    let output = artifact(out_dir, name, "targets.intervals");

    let mut command = format!(
        "{java} -T RealignerTargetCreator -R {reference} -I {input} -o {output} -nt {cores}",
        java = java_jar(gatk.max_mem, &gatk.bin),
        reference = config.settings.reference.display(),
        input = input_bam.display(),
        output = output.display(),
        cores = gatk.num_cores,
    );
    for known in [&config.settings.indel1, &config.settings.indel2]
        .into_iter()
        .flatten()
    {
        command.push_str(&format!(" -known {}", known.display()));
    }

    Ok(StageCommand {
        command,
        output,
        logfile: artifact(out_dir, name, "realign-target.log"),
    })
}

/// Realigns reads over the discovered intervals with `IndelRealigner`.
pub fn realign_indels(
    config: &Config,
    name: &str,
    input_bam: &Path,
    targets: &Path,
    out_dir: &Path,
) -> Result<StageCommand> {
    let gatk = config.tool("gatk")?;
    let output = artifact(out_dir, name, "realigned.sorted.bam");

    let mut command = format!(
        "{java} -T IndelRealigner -R {reference} -I {input} \
         -targetIntervals {targets} -o {output} --read_filter NotPrimaryAlignment",
        java = java_jar(gatk.max_mem, &gatk.bin),
        reference = config.settings.reference.display(),
        input = input_bam.display(),
        targets = targets.display(),
        output = output.display(),
    );
    for known in [&config.settings.indel1, &config.settings.indel2]
        .into_iter()
        .flatten()
    {
        command.push_str(&format!(" -known {}", known.display()));
    }

    Ok(StageCommand {
        command,
        output,
        logfile: artifact(out_dir, name, "realign-indels.log"),
    })
}

/// Recalibrates base quality scores (`BaseRecalibrator` then `PrintReads`).
pub fn recalibrator(
    config: &Config,
    name: &str,
    input_bam: &Path,
    out_dir: &Path,
) -> Result<StageCommand> {
    let gatk = config.tool("gatk")?;
    let output = artifact(out_dir, name, "recalibrated.sorted.bam");
    let table = artifact(out_dir, name, "recal");

    let mut covariates = format!(
        "{java} -T BaseRecalibrator -R {reference} -I {input} -o {table} -nct {cores}",
        java = java_jar(gatk.max_mem, &gatk.bin),
        reference = config.settings.reference.display(),
        input = input_bam.display(),
        table = table.display(),
        cores = gatk.num_cores,
    );
    if let Some(dbsnp) = &config.settings.dbsnp {
        covariates.push_str(&format!(" --knownSites {}", dbsnp.display()));
    }

    let print_reads = format!(
        "{java} -T PrintReads -R {reference} -I {input} -BQSR {table} -o {output} -nct {cores}",
        java = java_jar(gatk.max_mem, &gatk.bin),
        reference = config.settings.reference.display(),
        input = input_bam.display(),
        table = table.display(),
        output = output.display(),
        cores = gatk.num_cores,
    );

    Ok(StageCommand {
        command: format!("{} && {}", covariates, print_reads),
        output,
        logfile: artifact(out_dir, name, "recalibrate.log"),
    })
}

/// Annotates a merged call set with `VariantAnnotator`, reading evidence
/// from the recalibrated BAM(s).
pub fn annotate_vcf(
    config: &Config,
    name: &str,
    input_vcf: &Path,
    input_bams: &[std::path::PathBuf],
    out_dir: &Path,
) -> Result<StageCommand> {
    let gatk = config.tool("gatk")?;
    let output = artifact(out_dir, name, "annotated.vcf");

    let mut command = format!(
        "{java} -T VariantAnnotator -R {reference} -nt {cores} --group StandardAnnotation \
         --variant {input} -L {input} -o {output}",
        java = java_jar(gatk.max_mem, &gatk.bin),
        reference = config.settings.reference.display(),
        cores = gatk.num_cores,
        input = input_vcf.display(),
        output = output.display(),
    );
    for bam in input_bams {
        command.push_str(&format!(" -I {}", bam.display()));
    }
    if let Some(dbsnp) = &config.settings.dbsnp {
        command.push_str(&format!(" --dbsnp {}", dbsnp.display()));
    }

    Ok(StageCommand {
        command,
        output,
        logfile: artifact(out_dir, name, "annotate.log"),
    })
}

/// Flags low-confidence records with `VariantFiltration`.
pub fn filter_variants(
    config: &Config,
    name: &str,
    input_vcf: &Path,
    out_dir: &Path,
) -> Result<StageCommand> {
    let gatk = config.tool("gatk")?;
    let output = artifact(out_dir, name, "filtered.vcf");

    let command = format!(
        "{java} -T VariantFiltration -R {reference} --variant {input} -o {output} \
         --filterExpression 'MQ0 > 50' --filterName 'HighMQ0' \
         --filterExpression 'DP < {depth}' --filterName 'LowDepth' \
         --filterExpression 'QUAL < 10' --filterName 'LowQual' \
         --filterExpression 'MQ < 10' --filterName 'LowMappingQual'",
        java = java_jar(gatk.max_mem, &gatk.bin),
        reference = config.settings.reference.display(),
        input = input_vcf.display(),
        output = output.display(),
        depth = config.settings.coverage_threshold,
    );

    Ok(StageCommand {
        command,
        output,
        logfile: artifact(out_dir, name, "filter.log"),
    })
}
