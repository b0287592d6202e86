//! Graph builders: wire the per-stage commands into a job DAG.
//!
//! A sample's graph is a refinement chain (align, readgroup, realignment,
//! recalibration), a fan-out to each configured variant caller, the
//! in-process merge fan-in, and a finishing chain (annotate, filter,
//! normalize, snpEff, load). The cohort builder shares the per-sample
//! refinement chains but fans every sample's recalibrated BAM into a single
//! joint calling group.
//!
//! Misconfiguration surfaces here, before anything is dispatched: an empty
//! caller list, a caller with no wrapper, a missing tool section, and a
//! sample with no usable entry point all fail graph construction.

use std::path::{Path, PathBuf};

use tracing::warn;

use crate::config::{Config, Sample, SampleInput};
use crate::dag::{Dag, JobNode, NodeId, Stage};
use crate::errors::{PipelineError, Result};
use crate::invoke::run_and_log_command;
use crate::merge::{self, CallerOutput, ContigOrder, MergeOptions, Reference};

use super::{align, annotation, artifact, callers, gatk, StageCommand};

/// Builds the full graph for one sample.
pub fn build_sample_graph(config: &Config, sample: &Sample, out_dir: &Path) -> Result<Dag> {
    check_callers(config)?;

    let mut dag = Dag::new();
    let (recalibrate_id, recalibrated_bam) = refinement_chain(config, sample, out_dir, &mut dag)?;

    let regions = sample
        .regions
        .as_deref()
        .or(config.settings.regions.as_deref());
    calling_chain(
        config,
        &sample.name,
        vec![recalibrated_bam],
        vec![recalibrate_id],
        regions,
        out_dir,
        &mut dag,
    )?;

    dag.validate()?;
    Ok(dag)
}

/// Builds a joint-calling graph: each sample is refined independently, then
/// every recalibrated BAM feeds a single calling group named `cohort_name`.
pub fn build_cohort_graph(
    config: &Config,
    samples: &[Sample],
    cohort_name: &str,
    out_dir: &Path,
) -> Result<Dag> {
    check_callers(config)?;

    if samples.is_empty() {
        return Err(PipelineError::Configuration(
            "cohort calling requires at least one sample".into(),
        ));
    }

    let mut dag = Dag::new();
    let mut bams = Vec::new();
    let mut recalibrate_ids = Vec::new();

    for sample in samples {
        let (id, bam) = refinement_chain(config, sample, out_dir, &mut dag)?;
        recalibrate_ids.push(id);
        bams.push(bam);
    }

    calling_chain(
        config,
        cohort_name,
        bams,
        recalibrate_ids,
        config.settings.regions.as_deref(),
        out_dir,
        &mut dag,
    )?;

    dag.validate()?;
    Ok(dag)
}

fn check_callers(config: &Config) -> Result<()> {
    if config.settings.callers.is_empty() {
        return Err(PipelineError::Configuration(
            "no variant callers enabled".into(),
        ));
    }

    Ok(())
}

/// A node that shells out: the stage command runs through the invoker with
/// its stderr captured to the stage's log file.
fn command_node(
    name: &str,
    stage: Stage,
    cmd: StageCommand,
    cores: usize,
    memory_gb: usize,
) -> JobNode {
    let command = cmd.command;
    let logfile = cmd.logfile.clone();

    JobNode::new(format!("{}.{}", name, stage), stage)
        .cores(cores)
        .memory_gb(memory_gb)
        .output(cmd.output)
        .logfile(cmd.logfile)
        .work(move || run_and_log_command(&command, &logfile))
}

/// Adds a sample's refinement chain and returns the terminal node id plus the
/// recalibrated BAM it produces.
fn refinement_chain(
    config: &Config,
    sample: &Sample,
    out_dir: &Path,
    dag: &mut Dag,
) -> Result<(NodeId, PathBuf)> {
    let name = &sample.name;
    let picard = config.tool("picard")?.clone();
    let gatk_tool = config.tool("gatk")?.clone();

    // Entry point: FASTQ pairs are aligned first; a pre-aligned BAM goes
    // straight to readgroup assignment.
    let (start_bam, align_id) = match sample.input()? {
        SampleInput::FastqPair(r1, r2) => {
            let bwa = config.tool("bwa")?;
            let cmd = align::bwa_mem(config, name, r1, r2, out_dir)?;
            let output = cmd.output.clone();
            let node = command_node(name, Stage::Align, cmd, bwa.num_cores, bwa.max_mem)
                .input(r1)
                .input(r2);
            let id = node.id.clone();
            dag.add(node)?;
            (output, Some(id))
        }
        SampleInput::Bam(bam) => (bam.to_path_buf(), None),
    };

    let readgroup = gatk::add_or_replace_readgroups(config, name, &start_bam, out_dir)?;
    let rg_bam = readgroup.output.clone();
    let mut node = command_node(
        name,
        Stage::Readgroup,
        readgroup,
        picard.num_cores,
        picard.max_mem,
    )
    .input(&start_bam);
    if let Some(id) = &align_id {
        node = node.predecessor(id.clone());
    }
    let readgroup_id = node.id.clone();
    dag.add(node)?;

    let target = gatk::realign_target_creator(config, name, &rg_bam, out_dir)?;
    let targets = target.output.clone();
    let node = command_node(
        name,
        Stage::RealignTarget,
        target,
        gatk_tool.num_cores,
        gatk_tool.max_mem,
    )
    .predecessor(readgroup_id.clone())
    .input(&rg_bam);
    let target_id = node.id.clone();
    dag.add(node)?;

    let realign = gatk::realign_indels(config, name, &rg_bam, &targets, out_dir)?;
    let realigned_bam = realign.output.clone();
    let node = command_node(
        name,
        Stage::RealignIndels,
        realign,
        gatk_tool.num_cores,
        gatk_tool.max_mem,
    )
    .predecessor(readgroup_id)
    .predecessor(target_id)
    .input(&rg_bam)
    .input(&targets);
    let realign_id = node.id.clone();
    dag.add(node)?;

    let recalibrate = gatk::recalibrator(config, name, &realigned_bam, out_dir)?;
    let recalibrated_bam = recalibrate.output.clone();
    let node = command_node(
        name,
        Stage::Recalibrate,
        recalibrate,
        gatk_tool.num_cores,
        gatk_tool.max_mem,
    )
    .predecessor(realign_id)
    .input(&realigned_bam);
    let recalibrate_id = node.id.clone();
    dag.add(node)?;

    Ok((recalibrate_id, recalibrated_bam))
}

/// Adds the caller fan-out, the merge fan-in, and the finishing chain for one
/// calling group (a sample, or a cohort).
fn calling_chain(
    config: &Config,
    name: &str,
    bams: Vec<PathBuf>,
    predecessors: Vec<NodeId>,
    regions: Option<&Path>,
    out_dir: &Path,
    dag: &mut Dag,
) -> Result<()> {
    let gatk_tool = config.tool("gatk")?.clone();

    // Fan out to each configured caller; all of them wait on every
    // recalibrated BAM in the group.
    let mut caller_ids = Vec::new();
    let mut caller_outputs = Vec::new();
    for caller in &config.settings.callers {
        let cmd = callers::command_for(caller, config, name, &bams, regions, out_dir)?;
        let tool = config.tool(caller)?.clone();
        caller_outputs.push(CallerOutput::new(caller.clone(), cmd.output.clone()));

        let mut node = command_node(
            name,
            Stage::VariantCall(caller.clone()),
            cmd,
            tool.num_cores,
            tool.max_mem,
        );
        for pred in &predecessors {
            node = node.predecessor(pred.clone());
        }
        for bam in &bams {
            node = node.input(bam);
        }
        caller_ids.push(node.id.clone());
        dag.add(node)?;
    }

    // The merge fan-in runs in-process rather than shelling out.
    let merged_vcf = artifact(out_dir, name, "merged.sorted.vcf");
    let dict = config.settings.reference_dict.clone();
    let fasta = config.settings.reference.clone();
    let num_pass_callers = config.settings.num_pass_callers;

    let merge_output = merged_vcf.clone();
    let merge_inputs = caller_outputs.clone();
    let mut node = JobNode::new(format!("{}.{}", name, Stage::Merge), Stage::Merge)
        .output(&merged_vcf)
        .work(move || {
            let contigs = ContigOrder::from_dict(&dict)?;
            let reference = if fasta.exists() {
                Some(Reference::load(&fasta)?)
            } else {
                warn!(
                    "reference `{}` not found; merge will not left-extend alleles",
                    fasta.display()
                );
                None
            };

            let options = MergeOptions {
                contigs,
                reference,
                num_pass_callers,
            };
            let call_set = merge::merge(&merge_inputs, &options)?;
            merge::write_call_set_to_path(&call_set, &options.contigs, &merge_output)
        });
    for (id, output) in caller_ids.iter().zip(&caller_outputs) {
        node = node.predecessor(id.clone()).input(&output.vcf);
    }
    let merge_id = node.id.clone();
    dag.add(node)?;

    let annotate = gatk::annotate_vcf(config, name, &merged_vcf, &bams, out_dir)?;
    let annotated_vcf = annotate.output.clone();
    let mut node = command_node(
        name,
        Stage::Annotate,
        annotate,
        gatk_tool.num_cores,
        gatk_tool.max_mem,
    )
    .predecessor(merge_id)
    .input(&merged_vcf);
    for bam in &bams {
        node = node.input(bam);
    }
    let annotate_id = node.id.clone();
    dag.add(node)?;

    let filter = gatk::filter_variants(config, name, &annotated_vcf, out_dir)?;
    let filtered_vcf = filter.output.clone();
    let node = command_node(
        name,
        Stage::Filter,
        filter,
        gatk_tool.num_cores,
        gatk_tool.max_mem,
    )
    .predecessor(annotate_id)
    .input(&annotated_vcf);
    let filter_id = node.id.clone();
    dag.add(node)?;

    let vt = config.tool("vt")?;
    let normalize = annotation::vt_normalization(config, name, &filtered_vcf, out_dir)?;
    let normalized_vcf = normalize.output.clone();
    let node = command_node(name, Stage::Normalize, normalize, vt.num_cores, vt.max_mem)
        .predecessor(filter_id)
        .input(&filtered_vcf);
    let mut tail_id = node.id.clone();
    let mut tail_vcf = normalized_vcf;
    dag.add(node)?;

    // snpEff and the query-store load are optional tails; a run without those
    // sections stops at the normalized call set.
    if config.has_tool("snpeff") {
        let snpeff_tool = config.tool("snpeff")?;
        let snpeff = annotation::snpeff(config, name, &tail_vcf, out_dir)?;
        let snpeff_vcf = snpeff.output.clone();
        let node = command_node(
            name,
            Stage::SnpEff,
            snpeff,
            snpeff_tool.num_cores,
            snpeff_tool.max_mem,
        )
        .predecessor(tail_id)
        .input(&tail_vcf);
        tail_id = node.id.clone();
        tail_vcf = snpeff_vcf;
        dag.add(node)?;
    }

    if config.has_tool("gemini") {
        let gemini = config.tool("gemini")?;
        let load = annotation::gemini_load(config, name, &tail_vcf, out_dir)?;
        let node = command_node(name, Stage::Load, load, gemini.num_cores, gemini.max_mem)
            .predecessor(tail_id)
            .input(&tail_vcf);
        dag.add(node)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {

    use super::*;
    use crate::config::samples_from_str;
    use crate::dag::RunState;

    static CONFIG: &str = r#"
        [settings]
        reference = "/refs/b37.fasta"
        reference_dict = "/refs/b37.dict"
        snpeff_reference = "GRCh37.75"
        callers = ["freebayes", "platypus"]

        [resources]
        num_cores = 8
        max_mem = 16

        [bwa]
        bin = "bwa"
        num_cores = 4

        [samtools]
        bin = "samtools"

        [picard]
        bin = "/opt/picard.jar"

        [gatk]
        bin = "/opt/gatk.jar"
        max_mem = 8

        [freebayes]
        bin = "freebayes"

        [platypus]
        bin = "platypus"

        [vt]
        bin = "vt"

        [snpeff]
        bin = "/opt/snpEff.jar"

        [gemini]
        bin = "gemini"
    "#;

    fn fastq_sample() -> Sample {
        samples_from_str(
            "[S1]\nfastq1 = \"/data/r1.fq.gz\"\nfastq2 = \"/data/r2.fq.gz\"\n",
        )
        .unwrap()
        .remove(0)
    }

    #[test]
    pub fn test_sample_graph_shape() {
        let config = Config::from_str(CONFIG).unwrap();
        let dag = build_sample_graph(&config, &fastq_sample(), Path::new("/out")).unwrap();

        // 5 refinement + 2 callers + merge + annotate/filter/normalize +
        // snpeff + load.
        assert_eq!(dag.len(), 13);

        let merge = dag.get("S1.merge").unwrap();
        assert_eq!(
            merge.predecessors,
            vec!["S1.freebayes".to_string(), "S1.platypus".to_string()]
        );

        let freebayes = dag.get("S1.freebayes").unwrap();
        assert_eq!(freebayes.predecessors, vec!["S1.recalibrate".to_string()]);
        assert_eq!(
            freebayes.output.as_deref(),
            Some(Path::new("/out/S1.freebayes.vcf"))
        );

        // Builders emit nodes unstarted.
        assert!(dag.iter().all(|node| node.state() == RunState::Pending));
    }

    #[test]
    pub fn test_bam_sample_skips_alignment() {
        let config = Config::from_str(CONFIG).unwrap();
        let sample = samples_from_str("[S2]\nbam = \"/data/S2.bam\"\n")
            .unwrap()
            .remove(0);

        let dag = build_sample_graph(&config, &sample, Path::new("/out")).unwrap();
        assert!(dag.get("S2.align").is_none());

        let readgroup = dag.get("S2.readgroup").unwrap();
        assert!(readgroup.predecessors.is_empty());
        assert_eq!(readgroup.inputs, vec![PathBuf::from("/data/S2.bam")]);
    }

    #[test]
    pub fn test_empty_caller_list_is_rejected() {
        let mut config = Config::from_str(CONFIG).unwrap();
        config.settings.callers.clear();

        let err = build_sample_graph(&config, &fastq_sample(), Path::new("/out")).unwrap_err();
        assert!(err.to_string().contains("no variant callers enabled"));
    }

    #[test]
    pub fn test_unsupported_caller_fails_graph_construction() {
        let mut config = Config::from_str(CONFIG).unwrap();
        config.settings.callers = vec![String::from("strelka")];

        let err = build_sample_graph(&config, &fastq_sample(), Path::new("/out")).unwrap_err();
        assert!(matches!(err, PipelineError::CapabilityNotSupported(_)));
    }

    #[test]
    pub fn test_cohort_graph_joins_samples_at_the_fan_out() {
        let config = Config::from_str(CONFIG).unwrap();
        let samples = samples_from_str(
            "[S1]\nfastq1 = \"/d/a1.fq\"\nfastq2 = \"/d/a2.fq\"\n\
             [S2]\nfastq1 = \"/d/b1.fq\"\nfastq2 = \"/d/b2.fq\"\n",
        )
        .unwrap();

        let dag = build_cohort_graph(&config, &samples, "trio", Path::new("/out")).unwrap();

        let freebayes = dag.get("trio.freebayes").unwrap();
        assert_eq!(
            freebayes.predecessors,
            vec!["S1.recalibrate".to_string(), "S2.recalibrate".to_string()]
        );
        assert!(dag.get("S1.merge").is_none());
        assert!(dag.get("trio.merge").is_some());
    }
}
