//! Alignment stage: BWA-MEM piped through samtools into a sorted BAM.

use std::path::Path;

use crate::config::Config;
use crate::errors::Result;

use super::{artifact, StageCommand};

/// Aligns a FASTQ pair with `bwa mem`, converting and coordinate-sorting
/// the stream with samtools.
pub fn bwa_mem(
    config: &Config,
    name: &str,
    fastq1: &Path,
    fastq2: &Path,
    out_dir: &Path,
) -> Result<StageCommand> {
    let bwa = config.tool("bwa")?;
    let samtools = config.tool("samtools")?;

    let output = artifact(out_dir, name, "bwa.sorted.bam");
    let temp = artifact(out_dir, name, "bwa.sort.temp");

    let command = format!(
        "{bwa} mem -t {cores} -M -v 2 {reference} {fastq1} {fastq2} \
         | {samtools} view -u - \
         | {samtools} sort -@ {cores} -O bam -o {output} -T {temp} -",
        bwa = bwa.bin,
        cores = bwa.num_cores,
        reference = config.settings.reference.display(),
        fastq1 = fastq1.display(),
        fastq2 = fastq2.display(),
        samtools = samtools.bin,
        output = output.display(),
        temp = temp.display(),
    );

    Ok(StageCommand {
        command,
        output,
        logfile: artifact(out_dir, name, "align.log"),
    })
}

#[cfg(test)]
mod tests {

    use super::*;

    static CONFIG: &str = r#"
        [settings]
        reference = "/refs/b37.fasta"
        reference_dict = "/refs/b37.dict"
        callers = ["freebayes"]

        [resources]
        num_cores = 4
        max_mem = 4

        [bwa]
        bin = "bwa"

        [samtools]
        bin = "samtools"
    "#;

    #[test]
    pub fn test_command_shape() {
        let config = Config::from_str(CONFIG).unwrap();
        let cmd = bwa_mem(
            &config,
            "S1",
            Path::new("/data/r1.fq.gz"),
            Path::new("/data/r2.fq.gz"),
            Path::new("/out"),
        )
        .unwrap();

        assert!(cmd.command.starts_with("bwa mem -t 4 -M"));
        assert!(cmd.command.contains("| samtools sort"));
        assert_eq!(cmd.output, Path::new("/out/S1.bwa.sorted.bam"));
        assert_eq!(cmd.logfile, Path::new("/out/S1.align.log"));
    }

    #[test]
    pub fn test_missing_tool_section() {
        let config = Config::from_str(
            r#"
            [settings]
            reference = "/r.fa"
            reference_dict = "/r.dict"

            [resources]
            num_cores = 1
            max_mem = 1
            "#,
        )
        .unwrap();

        assert!(bwa_mem(
            &config,
            "S1",
            Path::new("/r1.fq"),
            Path::new("/r2.fq"),
            Path::new("/out")
        )
        .is_err());
    }
}
