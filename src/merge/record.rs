//! The merge engine's atomic unit: one normalized variant record, tagged
//! with the callers that support it.

use std::collections::BTreeSet;
use std::path::PathBuf;

use serde::Serialize;

/// One variant caller's output: its name and the path to the VCF it wrote.
#[derive(Clone, Debug)]
pub struct CallerOutput {
    /// The caller's name, used to tag provenance.
    pub caller: String,

    /// Path to the caller's VCF (plain or bgzip-compressed).
    pub vcf: PathBuf,
}

impl CallerOutput {
    /// Creates a caller output.
    pub fn new<C, P>(caller: C, vcf: P) -> Self
    where
        C: Into<String>,
        P: Into<PathBuf>,
    {
        CallerOutput {
            caller: caller.into(),
            vcf: vcf.into(),
        }
    }
}

/// A single decomposed variant: one alternate allele at one position.
///
/// Records from different callers that agree on `(chrom, pos, reference,
/// alternate)` collapse into one record whose `callers` set carries the
/// provenance.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct VariantRecord {
    /// Contig name.
    pub chrom: String,

    /// 1-based position of the first reference base.
    pub pos: usize,

    /// Reference allele, uppercase.
    pub reference: String,

    /// A single alternate allele, uppercase.
    pub alternate: String,

    /// Whether every caller supporting this record left its FILTER column at
    /// `PASS` (or `.`).
    pub passed: bool,

    /// The callers that produced this record. Ordered, so provenance tags
    /// render deterministically.
    pub callers: BTreeSet<String>,
}

impl VariantRecord {
    /// The record's identity for ensemble merging.
    pub fn key(&self) -> (&str, usize, &str, &str) {
        (&self.chrom, self.pos, &self.reference, &self.alternate)
    }

    /// Renders the provenance tag, e.g. `callerA,callerB`.
    pub fn callers_tag(&self) -> String {
        itertools::Itertools::join(&mut self.callers.iter(), ",")
    }
}

/// A coordinate-ordered, duplicate-free sequence of merged records.
#[derive(Debug, Default, Serialize)]
pub struct MergedCallSet {
    /// The records, sorted by reference-dictionary contig order, then
    /// position, then alleles.
    pub records: Vec<VariantRecord>,
}

impl MergedCallSet {
    /// The number of records in the call set.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the call set is empty.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Iterates records in coordinate order.
    pub fn iter(&self) -> impl Iterator<Item = &VariantRecord> {
        self.records.iter()
    }
}
