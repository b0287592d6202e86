//! Run configuration and sample manifest loading.
//!
//! Both documents are TOML. The run configuration carries a `[settings]`
//! section (reference files, caller list, thresholds), a `[resources]`
//! section (process-wide core/memory defaults that double as the scheduler's
//! budget), and one section per external tool. The sample manifest carries
//! one table per sample. Every recognized key is an explicit struct field —
//! there are no freeform dictionaries read at arbitrary points downstream.

use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::Deserialize;
use tracing::debug;

use crate::errors::{PipelineError, Result};

//==============//
// Run settings //
//==============//

/// The `[settings]` section of the run configuration.
#[derive(Clone, Debug, Deserialize)]
pub struct Settings {
    /// Reference genome FASTA.
    pub reference: PathBuf,

    /// Reference sequence dictionary (`.dict`). Establishes contig order for
    /// the merged call set.
    pub reference_dict: PathBuf,

    /// Known-sites VCF used by recalibration and annotation.
    pub dbsnp: Option<PathBuf>,

    /// First known-indels VCF for the realignment stages.
    pub indel1: Option<PathBuf>,

    /// Second known-indels VCF for the realignment stages.
    pub indel2: Option<PathBuf>,

    /// Default targeted-regions BED (samples may override).
    pub regions: Option<PathBuf>,

    /// snpEff database name (e.g. `GRCh37.75`).
    pub snpeff_reference: Option<String>,

    /// Variant callers to fan out to, in fan-out order.
    #[serde(default)]
    pub callers: Vec<String>,

    /// Minimum number of callers that must support a record for it to
    /// survive the ensemble merge.
    #[serde(default = "default_num_pass_callers")]
    pub num_pass_callers: usize,

    /// First coverage threshold (read depth).
    #[serde(default = "default_coverage_threshold")]
    pub coverage_threshold: u32,

    /// Second coverage threshold (read depth).
    #[serde(default = "default_coverage_threshold2")]
    pub coverage_threshold2: u32,

    /// Minimum alternate allele fraction passed to callers that accept one.
    #[serde(default = "default_min_alt_af")]
    pub min_alt_af: f64,
}

fn default_num_pass_callers() -> usize {
    1
}

fn default_coverage_threshold() -> u32 {
    500
}

fn default_coverage_threshold2() -> u32 {
    1000
}

fn default_min_alt_af() -> f64 {
    0.01
}

/// The `[resources]` section: process-wide defaults and the scheduler's
/// admission budget.
#[derive(Clone, Debug, Deserialize)]
pub struct Resources {
    /// Total concurrently schedulable cores (also the per-tool default).
    pub num_cores: usize,

    /// Total concurrently schedulable memory in gigabytes (also the per-tool
    /// default).
    pub max_mem: usize,
}

/// One external tool's section, after defaults have been filled in.
#[derive(Clone, Debug)]
pub struct ToolConfig {
    /// Path to the tool's executable (or jar).
    pub bin: String,

    /// Cores the tool's node requests from the scheduler.
    pub num_cores: usize,

    /// Memory (gigabytes) the tool's node requests from the scheduler.
    pub max_mem: usize,
}

#[derive(Debug, Deserialize)]
struct RawTool {
    bin: Option<String>,
    num_cores: Option<usize>,
    max_mem: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    settings: Option<Settings>,
    resources: Option<Resources>,

    #[serde(flatten)]
    tools: IndexMap<String, RawTool>,
}

/// The fully validated run configuration.
#[derive(Clone, Debug)]
pub struct Config {
    /// The `[settings]` section.
    pub settings: Settings,

    /// The `[resources]` section.
    pub resources: Resources,

    tools: IndexMap<String, ToolConfig>,
}

impl Config {
    /// Loads and validates a run configuration from a TOML file.
    pub fn load<P>(src: P) -> Result<Self>
    where
        P: AsRef<Path>,
    {
        let path = src.as_ref();
        let contents = fs::read_to_string(path)
            .map_err(|e| PipelineError::Configuration(format!("{}: {}", path.display(), e)))?;
        let config = Self::from_str(&contents)?;
        debug!(
            "loaded configuration with {} tool section(s)",
            config.tools.len()
        );
        Ok(config)
    }

    /// Parses and validates a run configuration from TOML text.
    pub fn from_str(contents: &str) -> Result<Self> {
        let raw: RawConfig = toml::from_str(contents)
            .map_err(|e| PipelineError::Configuration(e.to_string()))?;

        let settings = raw
            .settings
            .ok_or_else(|| PipelineError::Configuration("no section: settings".into()))?;
        let resources = raw
            .resources
            .ok_or_else(|| PipelineError::Configuration("no section: resources".into()))?;

        let mut tools = IndexMap::new();
        for (name, tool) in raw.tools {
            let bin = tool.bin.ok_or_else(|| {
                PipelineError::Configuration(format!("tool section `{}` has no `bin` key", name))
            })?;

            tools.insert(
                name,
                ToolConfig {
                    bin,
                    num_cores: tool.num_cores.unwrap_or(resources.num_cores),
                    max_mem: tool.max_mem.unwrap_or(resources.max_mem),
                },
            );
        }

        Ok(Config {
            settings,
            resources,
            tools,
        })
    }

    /// Looks up a tool's configuration by section name.
    pub fn tool(&self, name: &str) -> Result<&ToolConfig> {
        self.tools
            .get(name)
            .ok_or_else(|| PipelineError::Configuration(format!("no section: {}", name)))
    }

    /// Whether a tool section exists.
    pub fn has_tool(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }
}

//=================//
// Sample manifest //
//=================//

/// One sample from the manifest. Immutable after load.
#[derive(Clone, Debug, Deserialize)]
pub struct Sample {
    /// Sample identifier (the manifest table name).
    #[serde(skip)]
    pub name: String,

    /// First read file of a FASTQ pair.
    pub fastq1: Option<PathBuf>,

    /// Second read file of a FASTQ pair.
    pub fastq2: Option<PathBuf>,

    /// Pre-aligned BAM, as an alternative entry point to a FASTQ pair.
    pub bam: Option<PathBuf>,

    /// Per-sample targeted-regions BED override.
    pub regions: Option<PathBuf>,

    /// Extraction protocol tag, used to stratify coverage summaries.
    #[serde(default = "default_extraction")]
    pub extraction: String,

    /// Per-sample region coverage file (`varflow coverage` input).
    pub coverage: Option<PathBuf>,
}

fn default_extraction() -> String {
    String::from("unknown")
}

/// The first-stage input a sample enters the pipeline with.
pub enum SampleInput<'a> {
    /// A FASTQ pair: the sample starts at the Align stage.
    FastqPair(&'a Path, &'a Path),

    /// An existing BAM: the sample starts at the Readgroup stage.
    Bam(&'a Path),
}

impl Sample {
    /// The sample's first-stage input, or a configuration error if the
    /// manifest declared neither a BAM nor a full FASTQ pair.
    pub fn input(&self) -> Result<SampleInput<'_>> {
        if let Some(bam) = &self.bam {
            return Ok(SampleInput::Bam(bam));
        }

        match (&self.fastq1, &self.fastq2) {
            (Some(r1), Some(r2)) => Ok(SampleInput::FastqPair(r1, r2)),
            _ => Err(PipelineError::Configuration(format!(
                "sample `{}` has neither `bam` nor a `fastq1`/`fastq2` pair",
                self.name
            ))),
        }
    }
}

/// Loads the sample manifest from a TOML file, preserving document order.
pub fn load_samples<P>(src: P) -> Result<Vec<Sample>>
where
    P: AsRef<Path>,
{
    let path = src.as_ref();
    let contents = fs::read_to_string(path)
        .map_err(|e| PipelineError::Configuration(format!("{}: {}", path.display(), e)))?;
    samples_from_str(&contents)
}

/// Parses the sample manifest from TOML text.
pub fn samples_from_str(contents: &str) -> Result<Vec<Sample>> {
    let raw: IndexMap<String, Sample> =
        toml::from_str(contents).map_err(|e| PipelineError::Configuration(e.to_string()))?;

    Ok(raw
        .into_iter()
        .map(|(name, mut sample)| {
            sample.name = name;
            sample
        })
        .collect())
}
