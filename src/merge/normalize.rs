//! Decomposition and left-normalization of variant records.
//!
//! Multi-allelic decomposition happens at read time (one record per
//! alternate allele); this module canonicalizes each record's position and
//! alleles: shared trailing bases are truncated (left-extending from the
//! reference when truncation would empty an allele), then shared leading
//! bases are stripped while both alleles remain at least two bases long.
//! Applying the transformation to an already-normalized record is a no-op.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use indexmap::IndexMap;
use noodles::fasta;
use tracing::debug;

use crate::errors::{PipelineError, Result};

use super::record::VariantRecord;

//====================//
// Reference sequence //
//====================//

/// An in-memory reference genome used to left-extend alleles during
/// normalization.
pub struct Reference {
    sequences: IndexMap<String, Vec<u8>>,
}

impl Reference {
    /// Loads every sequence from a FASTA file.
    pub fn load<P>(src: P) -> Result<Self>
    where
        P: AsRef<Path>,
    {
        let path = src.as_ref();
        let file = File::open(path).map_err(|_| PipelineError::MissingInput(path.to_path_buf()))?;
        let mut reader = fasta::Reader::new(BufReader::new(file));

        let mut sequences = IndexMap::new();
        for result in reader.records() {
            let record = result?;
            sequences.insert(record.name().to_string(), record.sequence().as_ref().to_vec());
        }

        debug!("loaded {} reference sequence(s)", sequences.len());
        Ok(Reference { sequences })
    }

    /// Builds a reference from in-memory sequences.
    pub fn from_sequences<I, N, S>(sequences: I) -> Self
    where
        I: IntoIterator<Item = (N, S)>,
        N: Into<String>,
        S: Into<Vec<u8>>,
    {
        Reference {
            sequences: sequences
                .into_iter()
                .map(|(name, seq)| (name.into(), seq.into()))
                .collect(),
        }
    }

    /// The uppercase base at a 1-based position, if the contig and position
    /// exist.
    pub fn base(&self, chrom: &str, pos: usize) -> Option<u8> {
        if pos == 0 {
            return None;
        }

        self.sequences
            .get(chrom)
            .and_then(|seq| seq.get(pos - 1))
            .map(|base| base.to_ascii_uppercase())
    }
}

//===============//
// Normalization //
//===============//

/// Left-normalizes a single record in place.
pub fn normalize_record(record: &mut VariantRecord, reference: Option<&Reference>) {
    let mut reference_allele: Vec<u8> = record.reference.bytes().collect();
    let mut alternate_allele: Vec<u8> = record.alternate.bytes().collect();
    let mut pos = record.pos;

    // Truncate shared trailing bases. When truncation would empty an allele,
    // both alleles are first extended leftward with the reference base at
    // pos - 1; without a reference to consult, truncation stops there.
    loop {
        let (Some(&last_ref), Some(&last_alt)) =
            (reference_allele.last(), alternate_allele.last())
        else {
            break;
        };

        if last_ref != last_alt {
            break;
        }

        if reference_allele.len() == 1 || alternate_allele.len() == 1 {
            let Some(base) = reference
                .and_then(|r| pos.checked_sub(1).and_then(|p| r.base(&record.chrom, p)))
            else {
                break;
            };

            reference_allele.insert(0, base);
            alternate_allele.insert(0, base);
            pos -= 1;
        }

        reference_allele.pop();
        alternate_allele.pop();
    }

    // Strip shared leading bases while both alleles keep at least one base
    // beyond the shared one.
    while reference_allele.len() >= 2
        && alternate_allele.len() >= 2
        && reference_allele[0] == alternate_allele[0]
    {
        reference_allele.remove(0);
        alternate_allele.remove(0);
        pos += 1;
    }

    record.reference = String::from_utf8_lossy(&reference_allele).into_owned();
    record.alternate = String::from_utf8_lossy(&alternate_allele).into_owned();
    record.pos = pos;
}

/// Normalizes every record in a caller's decomposed output.
pub fn normalize_records(records: &mut [VariantRecord], reference: Option<&Reference>) {
    for record in records.iter_mut() {
        normalize_record(record, reference);
    }
}

#[cfg(test)]
mod tests {

    use std::collections::BTreeSet;

    use super::*;

    fn record(chrom: &str, pos: usize, reference: &str, alternate: &str) -> VariantRecord {
        VariantRecord {
            chrom: chrom.into(),
            pos,
            reference: reference.into(),
            alternate: alternate.into(),
            passed: true,
            callers: BTreeSet::new(),
        }
    }

    #[test]
    pub fn test_snv_is_untouched() {
        let mut r = record("chr1", 100, "A", "G");
        normalize_record(&mut r, None);
        assert_eq!((r.pos, r.reference.as_str(), r.alternate.as_str()), (100, "A", "G"));
    }

    #[test]
    pub fn test_shared_leading_bases_are_stripped() {
        // chr1:100 GCA>GTA: trailing A trimmed? no (A==A trims; then GC vs GT
        // differ), leading G stripped.
        let mut r = record("chr1", 100, "GCA", "GTA");
        normalize_record(&mut r, None);
        assert_eq!((r.pos, r.reference.as_str(), r.alternate.as_str()), (101, "C", "T"));
    }

    #[test]
    pub fn test_parsimonious_deletion() {
        // CTCC>CC at 100 is a one-base deletion of T, anchored at the C.
        let mut r = record("chr1", 100, "CTCC", "CCC");
        normalize_record(&mut r, None);
        assert_eq!((r.pos, r.reference.as_str(), r.alternate.as_str()), (100, "CT", "C"));
    }

    #[test]
    pub fn test_left_extension_against_reference() {
        //            123456
        // reference: GGGCAC, record chr1:4 CAC>C... suffix C shared, trimming
        // twice empties the alternate; vt extends left from the reference.
        let reference = Reference::from_sequences([("chr1", "GGGCAC")]);
        let mut r = record("chr1", 4, "CAC", "C");
        normalize_record(&mut r, Some(&reference));
        assert_eq!((r.pos, r.reference.as_str(), r.alternate.as_str()), (3, "GCA", "G"));
    }

    #[test]
    pub fn test_normalization_is_idempotent() {
        let reference = Reference::from_sequences([("chr1", "GGGCAC")]);

        for (pos, reference_allele, alternate) in
            [(100, "A", "G"), (100, "CT", "C"), (3, "GCA", "G")]
        {
            let mut once = record("chr1", pos, reference_allele, alternate);
            normalize_record(&mut once, Some(&reference));
            let mut twice = once.clone();
            normalize_record(&mut twice, Some(&reference));
            assert_eq!(once, twice);
        }
    }

    #[test]
    pub fn test_without_reference_truncation_stops_short() {
        // Cannot left-extend without reference bases; the record keeps its
        // last shared base rather than emptying an allele.
        let mut r = record("chr1", 4, "CAC", "C");
        normalize_record(&mut r, None);
        assert_eq!((r.pos, r.reference.as_str(), r.alternate.as_str()), (4, "CAC", "C"));
    }
}
