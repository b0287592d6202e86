//! Folding per-sample coverage records into per-region summaries.

use std::io::Write;
use std::path::Path;

use indexmap::IndexMap;
use serde::Serialize;

use crate::errors::Result;

use super::record::{CoverageRecord, Region};

/// One sample's coverage input to the aggregation: its protocol tag and the
/// records scanned from its coverage file.
pub struct SampleCoverage {
    /// Sample identifier.
    pub sample: String,

    /// The sample's extraction-protocol tag.
    pub protocol: String,

    /// The sample's per-region records.
    pub records: Vec<CoverageRecord>,
}

/// Per-stratum statistics within one region's summary.
#[derive(Debug, Default, Serialize)]
pub struct StratumStats {
    /// Samples contributing to this stratum.
    pub samples: usize,

    /// Fraction of contributing samples whose percent-above value reached
    /// 100 for each threshold.
    pub frac_pass: [f64; 2],

    /// Mean percent-above value across contributing samples, per threshold.
    pub mean_pct: [f64; 2],
}

/// Cross-sample summary statistics for one region.
#[derive(Debug, Serialize)]
pub struct RegionSummary {
    /// The region.
    pub region: Region,

    /// Overall statistics plus mean read count.
    pub overall: StratumStats,

    /// Mean read count across contributing samples.
    pub mean_read_count: f64,

    /// Statistics stratified by extraction protocol, in first-seen order.
    pub by_protocol: IndexMap<String, StratumStats>,
}

#[derive(Default)]
struct Accumulator {
    samples: usize,
    read_count_total: u64,
    pass_counts: [usize; 2],
    pct_totals: [f64; 2],
}

impl Accumulator {
    fn fold(&mut self, record: &CoverageRecord) {
        self.samples += 1;
        self.read_count_total += record.read_count;
        for t in 0..2 {
            self.pct_totals[t] += record.pct_above[t];
            // "Passing" a threshold means the entire region cleared it.
            if record.pct_above[t] >= 100.0 {
                self.pass_counts[t] += 1;
            }
        }
    }

    fn stats(&self) -> StratumStats {
        let n = self.samples as f64;
        StratumStats {
            samples: self.samples,
            frac_pass: [
                self.pass_counts[0] as f64 / n,
                self.pass_counts[1] as f64 / n,
            ],
            mean_pct: [self.pct_totals[0] / n, self.pct_totals[1] / n],
        }
    }
}

/// Folds every sample's records into per-region summaries.
///
/// Regions appear in the order they are first seen across samples. A sample
/// with no record for a region contributes nothing to that region's
/// statistics — it is absent, not zero, so sparse panels do not skew means.
pub fn summarize(samples: &[SampleCoverage]) -> Vec<RegionSummary> {
    let mut regions: IndexMap<Region, (Accumulator, IndexMap<String, Accumulator>)> =
        IndexMap::new();

    for sample in samples {
        for record in &sample.records {
            let (overall, by_protocol) = regions.entry(record.region.clone()).or_default();
            overall.fold(record);
            by_protocol
                .entry(sample.protocol.clone())
                .or_default()
                .fold(record);
        }
    }

    regions
        .into_iter()
        .map(|(region, (overall, by_protocol))| RegionSummary {
            region,
            mean_read_count: overall.read_count_total as f64 / overall.samples as f64,
            overall: overall.stats(),
            by_protocol: by_protocol
                .into_iter()
                .map(|(protocol, acc)| (protocol, acc.stats()))
                .collect(),
        })
        .collect()
}

/// Writes summaries as a tab-delimited report, one row per region. The
/// protocol columns cover every protocol seen anywhere in the run; a
/// protocol with no samples at a region renders as `-`.
pub fn write_summary<W>(
    summaries: &[RegionSummary],
    thresholds: [u32; 2],
    writer: &mut W,
) -> Result<()>
where
    W: Write,
{
    let mut protocols: Vec<&str> = Vec::new();
    for summary in summaries {
        for protocol in summary.by_protocol.keys() {
            if !protocols.contains(&protocol.as_str()) {
                protocols.push(protocol);
            }
        }
    }

    write!(
        writer,
        "Region\tSamples\tMean Reads\tFrac Samples {t1}\tFrac Samples {t2}\
         \tMean Pct {t1}\tMean Pct {t2}",
        t1 = thresholds[0],
        t2 = thresholds[1]
    )?;
    for protocol in &protocols {
        write!(
            writer,
            "\tFrac Samples {t1} {p}\tFrac Samples {t2} {p}",
            t1 = thresholds[0],
            t2 = thresholds[1],
            p = protocol
        )?;
    }
    writeln!(writer)?;

    for summary in summaries {
        write!(
            writer,
            "{}\t{}\t{:.1}\t{:.4}\t{:.4}\t{:.2}\t{:.2}",
            summary.region.label(),
            summary.overall.samples,
            summary.mean_read_count,
            summary.overall.frac_pass[0],
            summary.overall.frac_pass[1],
            summary.overall.mean_pct[0],
            summary.overall.mean_pct[1],
        )?;

        for protocol in &protocols {
            match summary.by_protocol.get(*protocol) {
                Some(stats) => write!(
                    writer,
                    "\t{:.4}\t{:.4}",
                    stats.frac_pass[0], stats.frac_pass[1]
                )?,
                None => write!(writer, "\t-\t-")?,
            }
        }
        writeln!(writer)?;
    }

    Ok(())
}

/// Writes summaries to a file.
pub fn write_summary_to_path<P>(
    summaries: &[RegionSummary],
    thresholds: [u32; 2],
    path: P,
) -> Result<()>
where
    P: AsRef<Path>,
{
    let mut writer = std::io::BufWriter::new(std::fs::File::create(path.as_ref())?);
    write_summary(summaries, thresholds, &mut writer)?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {

    use super::*;

    fn region() -> Region {
        Region {
            chrom: "chr1".into(),
            start: 100,
            end: 250,
            name: "AMPL1".into(),
        }
    }

    fn sample(name: &str, protocol: &str, records: Vec<CoverageRecord>) -> SampleCoverage {
        SampleCoverage {
            sample: name.into(),
            protocol: protocol.into(),
            records,
        }
    }

    fn record_at(region: Region, read_count: u64, pct: [f64; 2]) -> CoverageRecord {
        CoverageRecord {
            region,
            read_count,
            pct_above: pct,
        }
    }

    #[test]
    pub fn test_mean_and_pass_fraction() {
        // Depths 80, 100, 120 with pass {false, true, true}: mean 100,
        // pass fraction 2/3.
        let samples = vec![
            sample("s1", "T", vec![record_at(region(), 80, [99.0, 0.0])]),
            sample("s2", "T", vec![record_at(region(), 100, [100.0, 0.0])]),
            sample("s3", "MP", vec![record_at(region(), 120, [100.0, 0.0])]),
        ];

        let summaries = summarize(&samples);
        assert_eq!(summaries.len(), 1);

        let summary = &summaries[0];
        assert_eq!(summary.overall.samples, 3);
        assert!((summary.mean_read_count - 100.0).abs() < f64::EPSILON);
        assert!((summary.overall.frac_pass[0] - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(summary.overall.frac_pass[1], 0.0);
    }

    #[test]
    pub fn test_stratification_by_protocol() {
        let samples = vec![
            sample("s1", "T", vec![record_at(region(), 80, [0.0, 0.0])]),
            sample("s2", "MP", vec![record_at(region(), 120, [100.0, 100.0])]),
        ];

        let summaries = summarize(&samples);
        let by_protocol = &summaries[0].by_protocol;

        assert_eq!(by_protocol.len(), 2);
        assert_eq!(by_protocol["T"].samples, 1);
        assert_eq!(by_protocol["T"].frac_pass, [0.0, 0.0]);
        assert_eq!(by_protocol["MP"].frac_pass, [1.0, 1.0]);
    }

    #[test]
    pub fn test_missing_region_is_absent_not_zero() {
        let other = Region {
            chrom: "chr2".into(),
            start: 10,
            end: 90,
            name: "AMPL2".into(),
        };

        let samples = vec![
            sample("s1", "T", vec![record_at(region(), 200, [100.0, 100.0])]),
            sample(
                "s2",
                "T",
                vec![
                    record_at(region(), 100, [100.0, 0.0]),
                    record_at(other.clone(), 50, [50.0, 10.0]),
                ],
            ),
        ];

        let summaries = summarize(&samples);
        assert_eq!(summaries.len(), 2);

        // AMPL2 sees only s2; s1's absence does not drag the mean down.
        let ampl2 = summaries.iter().find(|s| s.region == other).unwrap();
        assert_eq!(ampl2.overall.samples, 1);
        assert!((ampl2.mean_read_count - 50.0).abs() < f64::EPSILON);
    }
}
