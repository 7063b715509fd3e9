pub mod config;
pub mod constants;
pub mod delta;
pub mod display;
pub mod error;
pub mod monitor;
pub mod parser;
pub mod power;
pub mod report;
pub mod series;
pub mod snapshot;
pub mod topology;
pub mod turbostat;

use std::thread;
use std::time::Duration;

use log::{debug, error, warn};

use crate::config::CollectorConfig;
use crate::error::{CollectorError, Result};
use crate::monitor::{Collector, SampleCell};
use crate::report::Reporter;
use crate::topology::SysfsCacheTopology;
use crate::turbostat::{TelemetrySource, Turbostat};

/// Sets up the collector and polls turbostat until `iterations` polls have
/// been reported, or forever when `None`.
///
/// Setup failures disable the collector and are returned. A failed poll
/// drops that sample and the loop carries on.
pub fn run_collector(config: &CollectorConfig, reporter: &mut dyn Reporter, iterations: Option<u64>) -> Result<()> {
	let source = Turbostat::new(&config.command);
	let cache = SysfsCacheTopology::new(&config.sysfs_root);

	let (collector, mut cell) = match Collector::setup(source, &cache, config.split_by()) {
		Ok(setup) => setup,
		Err(e) => {
			match &e {
				CollectorError::TopologyResolution => error!("Could not find any CPUs in turbostat dump, disabling."),
				_ => error!("Could not invoke turbostat, disabling: {e}"),
			}
			return Err(e);
		},
	};

	reporter.register(collector.series())?;

	let interval = Duration::from_secs(config.interval_secs());
	poll_loop(&collector, &mut cell, reporter, interval, iterations)
}

/// Sleeps, polls and publishes until `iterations` polls have been reported.
///
/// Dropped samples do not count towards the limit.
fn poll_loop<S: TelemetrySource>(
	collector: &Collector<S>,
	cell: &mut SampleCell,
	reporter: &mut dyn Reporter,
	interval: Duration,
	iterations: Option<u64>,
) -> Result<()> {
	let mut reported = 0;

	while iterations.is_none_or(|limit| reported < limit) {
		thread::sleep(interval);

		if let Some(values) = poll_once(collector, cell) {
			reporter.publish(collector.series(), &values)?;
			reported += 1;
		}
	}

	Ok(())
}

fn poll_once<S: TelemetrySource>(collector: &Collector<S>, cell: &mut SampleCell) -> Option<power::MetricValues> {
	match collector.poll(cell) {
		Ok(values) => {
			debug!("Derived {} values", values.len());
			Some(values)
		},
		Err(e) => {
			warn!("Dropping sample: {e}");
			None
		},
	}
}
