use log::{info, warn};

use crate::config::SplitBy;
use crate::error::Result;
use crate::power::{MetricValues, derive_metrics};
use crate::series::{SeriesDefinition, build_series_definitions};
use crate::snapshot::Snapshot;
use crate::topology::{CacheTopology, CpuTopology};
use crate::turbostat::TelemetrySource;

/// The last successful snapshot, owned by whoever drives the polls
#[derive(Debug, Clone)]
pub struct SampleCell {
	previous: Snapshot,
}

impl SampleCell {
	pub fn new(previous: Snapshot) -> Self {
		Self { previous }
	}

	pub fn previous(&self) -> &Snapshot {
		&self.previous
	}
}

/// Collector state fixed at setup: topology and series layout
#[derive(Debug)]
pub struct Collector<S: TelemetrySource> {
	source: S,
	topology: CpuTopology,
	series: Vec<SeriesDefinition>,
}

impl<S: TelemetrySource> Collector<S> {
	/// Takes the calibration sample, resolves topology and lays out series.
	///
	/// The calibration sample is never reported; it seeds the returned cell.
	pub fn setup(source: S, cache: &dyn CacheTopology, split_by: SplitBy) -> Result<(Self, SampleCell)> {
		let calibration = source.dump()?;
		let topology = CpuTopology::resolve(&calibration, &source, cache)?;

		let online = num_cpus::get();
		info!(
			"Resolved {} of {} CPUs reported by turbostat across {} packages ({} online), RAPL available on {}",
			topology.assignments.len(),
			calibration.cpus.len(),
			topology.package_count(),
			online,
			topology.rapl.len()
		);
		if calibration.cpus.len() < online {
			warn!("turbostat reported {} CPUs but {online} are online", calibration.cpus.len());
		}

		let series = build_series_definitions(&topology, split_by);

		Ok((
			Self {
				source,
				topology,
				series,
			},
			SampleCell::new(calibration),
		))
	}

	pub fn topology(&self) -> &CpuTopology {
		&self.topology
	}

	pub fn series(&self) -> &[SeriesDefinition] {
		&self.series
	}

	/// Takes a fresh sample and derives metrics against the previous one.
	///
	/// On invocation failure the cell is left untouched, so the next
	/// successful poll covers the longer interval.
	pub fn poll(&self, cell: &mut SampleCell) -> Result<MetricValues> {
		let current = self.source.dump()?;

		if current.timestamp <= cell.previous.timestamp {
			warn!(
				"Clock went backwards between samples ({:.3} -> {:.3}), skipping this interval",
				cell.previous.timestamp, current.timestamp
			);
			cell.previous = current;
			return Ok(MetricValues::new());
		}

		let values = derive_metrics(&cell.previous, &current, &self.topology);
		cell.previous = current;
		Ok(values)
	}
}
