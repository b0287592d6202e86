//! Reading one caller's VCF into variant records.

use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use noodles::bgzf;
use noodles::vcf;
use tracing::debug;

use crate::errors::{PipelineError, Result};

use super::record::{CallerOutput, VariantRecord};

/// Opens a VCF for reading, transparently handling bgzip compression by
/// file extension.
fn open<P>(src: P) -> Result<vcf::Reader<Box<dyn BufRead>>>
where
    P: AsRef<Path>,
{
    let path = src.as_ref();
    let file = File::open(path).map_err(|_| PipelineError::MissingInput(path.to_path_buf()))?;

    let inner: Box<dyn BufRead> = match path.extension().and_then(|ext| ext.to_str()) {
        Some("gz") | Some("bgz") => Box::new(BufReader::new(bgzf::Reader::new(file))),
        _ => Box::new(BufReader::new(file)),
    };

    Ok(vcf::Reader::new(inner))
}

/// Reads every record from a caller's VCF. Multi-allelic sites come back as
/// one [`VariantRecord`] per alternate allele, each tagged with the caller's
/// name; normalization proper happens later.
pub fn read_caller_records(output: &CallerOutput) -> Result<Vec<VariantRecord>> {
    let malformed = |reason: String| PipelineError::MalformedRecord {
        caller: output.caller.clone(),
        reason,
    };

    let mut reader = open(&output.vcf)?;
    let header = reader
        .read_header()
        .map_err(|e| malformed(e.to_string()))?
        .parse::<vcf::Header>()
        .map_err(|e| malformed(e.to_string()))?;

    let mut records = Vec::new();
    for result in reader.records(&header) {
        let record = result.map_err(|e| malformed(e.to_string()))?;

        let chrom = record.chromosome().to_string();
        let pos = usize::from(record.position());
        let reference = record.reference_bases().to_string().to_uppercase();
        let passed = match record.filters() {
            None | Some(vcf::record::Filters::Pass) => true,
            Some(vcf::record::Filters::Fail(_)) => false,
        };

        if record.alternate_bases().is_empty() {
            // Reference-only lines (e.g. gVCF blocks) carry no call to merge.
            continue;
        }

        for allele in record.alternate_bases().iter() {
            let mut callers = BTreeSet::new();
            callers.insert(output.caller.clone());

            records.push(VariantRecord {
                chrom: chrom.clone(),
                pos,
                reference: reference.clone(),
                alternate: allele.to_string().to_uppercase(),
                passed,
                callers,
            });
        }
    }

    debug!(
        "read {} record(s) from caller `{}`",
        records.len(),
        output.caller
    );

    Ok(records)
}
