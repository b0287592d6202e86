//! Contig ordering from a reference sequence dictionary.
//!
//! A `.dict` file is a SAM header (an `@HD` line plus one `@SQ` line per
//! contig), so it parses with the same machinery as any other SAM header.
//! The `@SQ` order is the coordinate order every downstream tool expects the
//! merged call set to follow.

use std::fs;
use std::path::Path;

use indexmap::IndexMap;
use noodles::sam;

use crate::errors::{PipelineError, Result};

/// The reference's contigs, in dictionary order.
#[derive(Clone, Debug)]
pub struct ContigOrder {
    contigs: IndexMap<String, usize>,
}

impl ContigOrder {
    /// Reads and parses a `.dict` file.
    pub fn from_dict<P>(src: P) -> Result<Self>
    where
        P: AsRef<Path>,
    {
        let path = src.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| {
            PipelineError::Configuration(format!("{}: {}", path.display(), e))
        })?;
        Self::from_header_str(&contents)
    }

    /// Parses contig order from SAM header text.
    pub fn from_header_str(contents: &str) -> Result<Self> {
        let header: sam::Header = contents.parse().map_err(|e| {
            PipelineError::Configuration(format!("invalid sequence dictionary: {}", e))
        })?;

        let mut contigs = IndexMap::new();
        for (name, sequence) in header.reference_sequences() {
            let name = name.to_string();
            let length = usize::from(sequence.length());
            contigs.insert(name, length);
        }

        if contigs.is_empty() {
            return Err(PipelineError::Configuration(
                "sequence dictionary contains no @SQ lines".into(),
            ));
        }

        Ok(ContigOrder { contigs })
    }

    /// The rank of a contig in dictionary order, if present.
    pub fn rank(&self, chrom: &str) -> Option<usize> {
        self.contigs.get_index_of(chrom)
    }

    /// Iterates `(name, length)` pairs in dictionary order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.contigs.iter().map(|(name, &length)| (name.as_str(), length))
    }

    /// The number of contigs.
    pub fn len(&self) -> usize {
        self.contigs.len()
    }

    /// Whether the dictionary is empty.
    pub fn is_empty(&self) -> bool {
        self.contigs.is_empty()
    }
}
