use std::collections::{BTreeMap, BTreeSet};

use log::debug;

use crate::constants::{
	APERF_FIELD, JOULES_GFX_FIELD, JOULES_PKG_FIELD, JOULES_RAM_FIELD, MPERF_FIELD, POWER_SCALE, TSC_FIELD,
};
use crate::delta::{CounterDelta, record_delta};
use crate::series::{cpu_key, package_key};
use crate::snapshot::Snapshot;
use crate::topology::{CpuTopology, RaplUnits};

/// Dimension key -> value for one poll
pub type MetricValues = BTreeMap<String, f64>;

/// RAPL energy counters and the metric each one feeds
const ENERGY_COUNTERS: [(&str, &str); 3] = [
	(JOULES_PKG_FIELD, "pkg_watts"),
	(JOULES_RAM_FIELD, "ram_watts"),
	(JOULES_GFX_FIELD, "gfx_watts"),
];

/// Clock frequencies derived from one CPU's counter deltas
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrequencyReading {
	pub avg_mhz: f64,
	/// Absent when mperf did not advance
	pub busy_mhz: Option<f64>,
}

/// Average and busy clock frequency over `elapsed` seconds.
///
/// Values are in kHz-scaled units; the reporting side divides them by 1000.
pub fn frequency(delta: &CounterDelta, elapsed: f64) -> Option<FrequencyReading> {
	let aperf = *delta.get(APERF_FIELD)? as f64;
	let avg_mhz = aperf / elapsed / 1e3;

	let busy_mhz = match (delta.get(TSC_FIELD), delta.get(MPERF_FIELD)) {
		(Some(&tsc), Some(&mperf)) if mperf != 0 => Some((tsc as f64 / 1e3) * aperf / mperf as f64 / elapsed),
		_ => None,
	};

	Some(FrequencyReading { avg_mhz, busy_mhz })
}

/// Package power per energy counter, scaled by 100 for a divisor of 100.
///
/// Negative energy deltas (counter resets) count as no energy consumed.
pub fn package_watts(delta: &CounterDelta, units: RaplUnits, elapsed: f64) -> Vec<(&'static str, f64)> {
	ENERGY_COUNTERS
		.iter()
		.filter_map(|&(counter, metric)| {
			let energy = (*delta.get(counter)?).max(0) as f64;
			Some((metric, energy * units.energy_unit / elapsed * POWER_SCALE))
		})
		.collect()
}

/// Turns two consecutive snapshots into named metric values.
///
/// CPUs missing from `previous` or from the topology are skipped. Power is
/// taken from the first CPU of each package that has RAPL units.
pub fn derive_metrics(previous: &Snapshot, current: &Snapshot, topology: &CpuTopology) -> MetricValues {
	let mut values = MetricValues::new();
	let elapsed = current.timestamp - previous.timestamp;
	if elapsed <= 0.0 {
		return values;
	}

	let mut packages_done = BTreeSet::new();

	for (&cpu, after) in &current.cpus {
		let Some(assignment) = topology.assignment(cpu) else {
			continue;
		};
		let Some(before) = previous.cpu(cpu) else {
			debug!("CPU {cpu} missing from previous sample, skipping");
			continue;
		};

		let delta = record_delta(before, after);

		if let Some(reading) = frequency(&delta, elapsed) {
			values.insert(cpu_key(cpu, "avg_mhz"), reading.avg_mhz);
			if let Some(busy_mhz) = reading.busy_mhz {
				values.insert(cpu_key(cpu, "busy_mhz"), busy_mhz);
			}
		}

		let package = assignment.package;
		if let Some(units) = topology.rapl_units(package) {
			if packages_done.insert(package) {
				for (metric, watts) in package_watts(&delta, units, elapsed) {
					values.insert(package_key(package, metric), watts);
				}
			}
		}
	}

	values
}
