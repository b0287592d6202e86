//! The ensemble union: collapse records across callers and apply the
//! agreement threshold.

use indexmap::IndexMap;
use tracing::debug;

use super::record::VariantRecord;

/// Unions normalized records across callers, keyed by
/// `(chrom, pos, reference, alternate)`.
///
/// A collapsed record is retained only when at least `num_pass_callers`
/// callers produced it (1 = plain union). The retained record's `passed`
/// flag survives only if every supporting caller's record passed, and its
/// `callers` set is the union of supporters.
pub fn union(records: Vec<VariantRecord>, num_pass_callers: usize) -> Vec<VariantRecord> {
    let mut collapsed: IndexMap<(String, usize, String, String), VariantRecord> = IndexMap::new();

    for record in records {
        let key = (
            record.chrom.clone(),
            record.pos,
            record.reference.clone(),
            record.alternate.clone(),
        );

        match collapsed.get_mut(&key) {
            Some(existing) => {
                existing.passed &= record.passed;
                existing.callers.extend(record.callers);
            }
            None => {
                collapsed.insert(key, record);
            }
        }
    }

    let before = collapsed.len();
    let retained: Vec<VariantRecord> = collapsed
        .into_iter()
        .map(|(_, record)| record)
        .filter(|record| record.callers.len() >= num_pass_callers)
        .collect();

    debug!(
        "ensemble union: {} distinct record(s), {} retained at num_pass_callers = {}",
        before,
        retained.len(),
        num_pass_callers
    );

    retained
}
