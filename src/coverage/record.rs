//! Per-sample, per-region coverage records and the `depth region` file
//! format they are read from.

use std::fs;
use std::path::Path;

use serde::Serialize;

use crate::errors::{PipelineError, Result};

/// A targeted genomic interval (amplicon).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct Region {
    /// Contig name.
    pub chrom: String,

    /// Interval start, as written in the coverage file.
    pub start: u64,

    /// Interval end.
    pub end: u64,

    /// Region (amplicon) name.
    pub name: String,
}

impl Region {
    /// Renders the region as `chrom,start,end,name` for report rows.
    pub fn label(&self) -> String {
        format!("{},{},{},{}", self.chrom, self.start, self.end, self.name)
    }
}

/// One sample's coverage over one region. Created while scanning a sample's
/// coverage file, folded into [`RegionSummary`](super::RegionSummary)
/// statistics, and discarded once the summary is written.
#[derive(Clone, Debug)]
pub struct CoverageRecord {
    /// The region covered.
    pub region: Region,

    /// Reads observed over the region.
    pub read_count: u64,

    /// Percent of bases at or above each configured threshold. A value of
    /// 100.0 means the whole region cleared the threshold.
    pub pct_above: [f64; 2],
}

/// Parses a sambamba `depth region` output file: tab-delimited, one header
/// line starting with `#`, then per-region rows with the region in columns
/// 0–3, the read count in column 4, and the two percent-above-threshold
/// values in columns 6 and 7.
pub fn read_coverage_file<P>(src: P) -> Result<Vec<CoverageRecord>>
where
    P: AsRef<Path>,
{
    let path = src.as_ref();
    let contents =
        fs::read_to_string(path).map_err(|_| PipelineError::MissingInput(path.to_path_buf()))?;

    let malformed = |line_number: usize, reason: &str| {
        PipelineError::Configuration(format!(
            "{}:{}: {}",
            path.display(),
            line_number,
            reason
        ))
    };

    let mut records = Vec::new();
    for (index, line) in contents.lines().enumerate() {
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < 8 {
            return Err(malformed(index + 1, "expected at least 8 columns"));
        }

        let parse_u64 = |field: &str, what: &str| {
            field
                .parse::<u64>()
                .map_err(|_| malformed(index + 1, &format!("invalid {}: `{}`", what, field)))
        };
        let parse_f64 = |field: &str, what: &str| {
            field
                .parse::<f64>()
                .map_err(|_| malformed(index + 1, &format!("invalid {}: `{}`", what, field)))
        };

        records.push(CoverageRecord {
            region: Region {
                chrom: fields[0].to_string(),
                start: parse_u64(fields[1], "region start")?,
                end: parse_u64(fields[2], "region end")?,
                name: fields[3].to_string(),
            },
            read_count: parse_u64(fields[4], "read count")?,
            pct_above: [
                parse_f64(fields[6], "percent above threshold 1")?,
                parse_f64(fields[7], "percent above threshold 2")?,
            ],
        });
    }

    Ok(records)
}

#[cfg(test)]
mod tests {

    use super::*;

    fn scratch(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("varflow-cov-{}-{}", std::process::id(), name))
    }

    #[test]
    pub fn test_reads_rows_and_skips_the_header() {
        let path = scratch("ok.bed");
        std::fs::write(
            &path,
            "# chrom\tchromStart\tchromEnd\tF3\treadCount\tmeanCoverage\tpercentage500\tpercentage1000\tsampleName\n\
             chr1\t100\t250\tAMPL1\t820\t512.2\t100\t95.5\tS1\n\
             chr2\t5\t60\tAMPL2\t10\t8.1\t12.5\t0\tS1\n",
        )
        .unwrap();

        let records = read_coverage_file(&path).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].region.name, "AMPL1");
        assert_eq!(records[0].read_count, 820);
        assert_eq!(records[0].pct_above, [100.0, 95.5]);
        assert_eq!(records[1].pct_above, [12.5, 0.0]);

        std::fs::remove_file(path).ok();
    }

    #[test]
    pub fn test_short_row_is_rejected() {
        let path = scratch("short.bed");
        std::fs::write(&path, "chr1\t100\t250\tAMPL1\t820\n").unwrap();

        assert!(read_coverage_file(&path).is_err());
        std::fs::remove_file(path).ok();
    }
}
