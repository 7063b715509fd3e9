use std::collections::BTreeMap;

use crate::snapshot::CpuRecord;

/// Per-counter differences between two readings of the same CPU
pub type CounterDelta = BTreeMap<String, i128>;

/// Computes `after - before` for every counter present in both records.
///
/// Counters missing from `after` are left out. No wraparound handling is
/// applied, so a reset counter shows up as a negative difference.
pub fn record_delta(before: &CpuRecord, after: &CpuRecord) -> CounterDelta {
	before
		.iter()
		.filter_map(|(name, start)| {
			let end = after.get(name)?;
			Some((name.to_string(), i128::from(end) - i128::from(start)))
		})
		.collect()
}
