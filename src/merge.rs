//! The variant merge engine: consolidate N callers' VCF outputs into one
//! coordinate-sorted, normalized, provenance-tagged call set.
//!
//! The engine is a pure three-step transformation: each caller's records are
//! decomposed and left-normalized independently ([`normalize`]), the
//! normalized sets are unioned under the agreement threshold ([`ensemble`]),
//! and the union is sorted by reference-dictionary contig order
//! ([`dict`]) so downstream annotators see the coordinate order they expect.
//! The sort key is the full record identity, so ordering is total and
//! tie-free: merging the same inputs in any order yields byte-identical
//! output.

pub mod command;
pub mod dict;
pub mod ensemble;
pub mod normalize;
pub mod reader;
pub mod record;

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use tracing::debug;

use crate::errors::{PipelineError, Result};

pub use dict::ContigOrder;
pub use normalize::Reference;
pub use record::{CallerOutput, MergedCallSet, VariantRecord};

/// Everything the merge engine needs beyond the caller outputs themselves.
pub struct MergeOptions {
    /// Contig ordering from the reference sequence dictionary.
    pub contigs: ContigOrder,

    /// Reference sequences for left-extension during normalization. Without
    /// them, normalization still decomposes and trims but cannot shift
    /// records leftward across their anchor base.
    pub reference: Option<Reference>,

    /// Minimum number of supporting callers for a record to be retained.
    pub num_pass_callers: usize,
}

/// Merges the tagged caller outputs into one call set.
///
/// Fails with [`PipelineError::MalformedRecord`] when an input VCF cannot be
/// parsed or names a contig absent from the reference dictionary. Both are
/// fatal for the calling sample's merge node and nothing else.
pub fn merge(outputs: &[CallerOutput], options: &MergeOptions) -> Result<MergedCallSet> {
    if outputs.is_empty() {
        return Err(PipelineError::Configuration(
            "merge requires at least one caller output".into(),
        ));
    }

    // (1) Decompose and normalize each caller's records independently.
    let mut records = Vec::new();
    for output in outputs {
        let mut caller_records = reader::read_caller_records(output)?;
        normalize::normalize_records(&mut caller_records, options.reference.as_ref());
        records.extend(caller_records);
    }

    // (2) Union across callers under the agreement threshold.
    let mut retained = ensemble::union(records, options.num_pass_callers);

    // (3) Coordinate sort in dictionary order. Every contig must be known;
    // an unknown one means the caller was run against a different reference.
    for record in &retained {
        if options.contigs.rank(&record.chrom).is_none() {
            return Err(PipelineError::MalformedRecord {
                caller: record.callers_tag(),
                reason: format!("contig `{}` not in reference dictionary", record.chrom),
            });
        }
    }

    retained.sort_by(|a, b| {
        let rank_a = options.contigs.rank(&a.chrom);
        let rank_b = options.contigs.rank(&b.chrom);
        (rank_a, a.pos, &a.reference, &a.alternate)
            .cmp(&(rank_b, b.pos, &b.reference, &b.alternate))
    });

    debug!("merged call set holds {} record(s)", retained.len());
    Ok(MergedCallSet { records: retained })
}

/// Selects (and orders) caller outputs by name. Naming a caller with no
/// matching output is [`PipelineError::UnknownCaller`].
pub fn select(outputs: &[CallerOutput], names: &[String]) -> Result<Vec<CallerOutput>> {
    names
        .iter()
        .map(|name| {
            outputs
                .iter()
                .find(|output| &output.caller == name)
                .cloned()
                .ok_or_else(|| PipelineError::UnknownCaller(name.clone()))
        })
        .collect()
}

/// Writes a merged call set as VCF text, with `##contig` lines in
/// dictionary order and the `CALLERS` provenance tag in INFO.
pub fn write_call_set<W>(
    call_set: &MergedCallSet,
    contigs: &ContigOrder,
    writer: &mut W,
) -> Result<()>
where
    W: Write,
{
    writeln!(writer, "##fileformat=VCFv4.2")?;
    writeln!(writer, "##source=varflow")?;
    writeln!(
        writer,
        "##INFO=<ID=CALLERS,Number=.,Type=String,Description=\"Callers supporting this record\">"
    )?;
    for (name, length) in contigs.iter() {
        writeln!(writer, "##contig=<ID={},length={}>", name, length)?;
    }
    writeln!(writer, "#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO")?;

    for record in call_set.iter() {
        writeln!(
            writer,
            "{}\t{}\t.\t{}\t{}\t.\t{}\tCALLERS={}",
            record.chrom,
            record.pos,
            record.reference,
            record.alternate,
            if record.passed { "PASS" } else { "." },
            record.callers_tag()
        )?;
    }

    Ok(())
}

/// Writes a merged call set to a file.
pub fn write_call_set_to_path<P>(
    call_set: &MergedCallSet,
    contigs: &ContigOrder,
    path: P,
) -> Result<()>
where
    P: AsRef<Path>,
{
    let mut writer = BufWriter::new(File::create(path.as_ref())?);
    write_call_set(call_set, contigs, &mut writer)?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {

    use std::path::PathBuf;

    use super::*;

    static DICT: &str = "@HD\tVN:1.6\n\
        @SQ\tSN:chr1\tLN:1000000\n\
        @SQ\tSN:chr2\tLN:1000000\n";

    fn write_vcf(name: &str, body: &str) -> PathBuf {
        let path =
            std::env::temp_dir().join(format!("varflow-merge-{}-{}", std::process::id(), name));
        let mut contents = String::from("##fileformat=VCFv4.2\n");
        contents.push_str("#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\n");
        contents.push_str(body);
        std::fs::write(&path, contents).unwrap();
        path
    }

    fn options() -> MergeOptions {
        MergeOptions {
            contigs: ContigOrder::from_header_str(DICT).unwrap(),
            reference: None,
            num_pass_callers: 1,
        }
    }

    fn render(call_set: &MergedCallSet, contigs: &ContigOrder) -> String {
        let mut buffer = Vec::new();
        write_call_set(call_set, contigs, &mut buffer).unwrap();
        String::from_utf8(buffer).unwrap()
    }

    #[test]
    pub fn test_agreement_scenario() {
        let a = write_vcf("agree-a.vcf", "chr1\t100\t.\tA\tG\t.\tPASS\t.\n");
        let b = write_vcf(
            "agree-b.vcf",
            "chr1\t100\t.\tA\tG\t.\tPASS\t.\nchr1\t250\t.\tT\tC\t.\tPASS\t.\n",
        );

        let outputs = vec![
            CallerOutput::new("callerA", &a),
            CallerOutput::new("callerB", &b),
        ];

        let union = merge(&outputs, &options()).unwrap();
        assert_eq!(union.len(), 2);
        assert_eq!(union.records[0].callers_tag(), "callerA,callerB");

        let strict = merge(
            &outputs,
            &MergeOptions {
                num_pass_callers: 2,
                ..options()
            },
        )
        .unwrap();
        assert_eq!(strict.len(), 1);
        assert_eq!(strict.records[0].pos, 100);

        std::fs::remove_file(a).ok();
        std::fs::remove_file(b).ok();
    }

    #[test]
    pub fn test_merge_is_deterministic_under_input_order() {
        let a = write_vcf(
            "det-a.vcf",
            "chr2\t7\t.\tT\tTA\t.\tPASS\t.\nchr1\t100\t.\tA\tG,C\t.\tPASS\t.\n",
        );
        let b = write_vcf("det-b.vcf", "chr1\t100\t.\tA\tC\t.\tPASS\t.\n");

        let forward = vec![
            CallerOutput::new("callerA", &a),
            CallerOutput::new("callerB", &b),
        ];
        let backward: Vec<CallerOutput> = forward.iter().rev().cloned().collect();

        let opts = options();
        let first = render(&merge(&forward, &opts).unwrap(), &opts.contigs);
        let second = render(&merge(&backward, &opts).unwrap(), &opts.contigs);
        assert_eq!(first, second);

        // Decomposition split the multi-allelic site; sort is dictionary
        // order, so chr1 precedes chr2.
        assert!(first.find("chr1\t100\t.\tA\tC").unwrap() < first.find("chr2\t7").unwrap());

        std::fs::remove_file(a).ok();
        std::fs::remove_file(b).ok();
    }

    #[test]
    pub fn test_unknown_contig_is_malformed() {
        let a = write_vcf("badcontig.vcf", "chrUn\t5\t.\tA\tT\t.\tPASS\t.\n");
        let outputs = vec![CallerOutput::new("callerA", &a)];

        let err = merge(&outputs, &options()).unwrap_err();
        assert!(matches!(err, PipelineError::MalformedRecord { .. }));

        std::fs::remove_file(a).ok();
    }

    #[test]
    pub fn test_select_unknown_caller() {
        let outputs = vec![CallerOutput::new("callerA", "/tmp/a.vcf")];
        let err = select(&outputs, &[String::from("callerZ")]).unwrap_err();
        assert!(matches!(err, PipelineError::UnknownCaller(_)));
    }

    #[test]
    pub fn test_empty_outputs_are_rejected() {
        assert!(merge(&[], &options()).is_err());
    }
}
