use std::collections::{BTreeSet, HashMap};

use crate::config::SplitBy;
use crate::constants::{FREQUENCY_DIVISOR, POWER_DIVISOR};
use crate::topology::{CpuTopology, TopologyAssignment};

/// Granularity a metric is natively reported at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
	Package,
	Logical,
}

/// The fixed set of metric families the collector reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricTemplate {
	Power,
	AvgMhz,
	BusyMhz,
}

impl MetricTemplate {
	pub const ALL: [MetricTemplate; 3] = [MetricTemplate::Power, MetricTemplate::AvgMhz, MetricTemplate::BusyMhz];

	pub fn id(&self) -> &'static str {
		match self {
			MetricTemplate::Power => "power",
			MetricTemplate::AvgMhz => "avg_mhz",
			MetricTemplate::BusyMhz => "busy_mhz",
		}
	}

	pub fn title(&self) -> &'static str {
		match self {
			MetricTemplate::Power => "Power utilization",
			MetricTemplate::AvgMhz => "Average CPU clock frequency, including idle time",
			MetricTemplate::BusyMhz => "Average CPU clock frequency, when busy",
		}
	}

	pub fn units(&self) -> &'static str {
		match self {
			MetricTemplate::Power => "Watts",
			MetricTemplate::AvgMhz | MetricTemplate::BusyMhz => "MHz",
		}
	}

	pub fn scope(&self) -> Scope {
		match self {
			MetricTemplate::Power => Scope::Package,
			MetricTemplate::AvgMhz | MetricTemplate::BusyMhz => Scope::Logical,
		}
	}

	/// Divisor the reporting side applies to emitted values
	pub fn divisor(&self) -> u32 {
		match self {
			MetricTemplate::Power => POWER_DIVISOR,
			MetricTemplate::AvgMhz | MetricTemplate::BusyMhz => FREQUENCY_DIVISOR,
		}
	}

	/// Metric suffixes each contributing CPU or package adds
	pub fn metrics(&self) -> &'static [&'static str] {
		match self {
			MetricTemplate::Power => &["pkg_watts", "ram_watts", "gfx_watts"],
			MetricTemplate::AvgMhz => &["avg_mhz"],
			MetricTemplate::BusyMhz => &["busy_mhz"],
		}
	}

	fn label(&self, metric: &str, assignment: &TopologyAssignment) -> String {
		match self.scope() {
			Scope::Package => metric.replace("_watts", ""),
			Scope::Logical => format!("cpu{}", assignment.cpu),
		}
	}
}

/// One value slot within a series
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dimension {
	/// Key the per-poll metric values are looked up by, e.g. `cpu3_avg_mhz`
	pub key: String,
	pub label: String,
	pub divisor: u32,
}

/// A named output series and the dimensions it carries
///
/// Built once at setup and fixed for the lifetime of the collector; the
/// dimension keys are the ones [`crate::power::derive_metrics`] fills in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesDefinition {
	pub name: String,
	pub template: MetricTemplate,
	pub dimensions: Vec<Dimension>,
}

impl SeriesDefinition {
	pub fn title(&self) -> &'static str {
		self.template.title()
	}

	pub fn units(&self) -> &'static str {
		self.template.units()
	}
}

/// Dimension key for a package-scoped metric
pub fn package_key(package: u32, metric: &str) -> String {
	format!("pkg{package}_{metric}")
}

/// Dimension key for a per-CPU metric
pub fn cpu_key(cpu: u32, metric: &str) -> String {
	format!("cpu{cpu}_{metric}")
}

/// Lays out every series for the given grouping.
///
/// CPUs are walked in index order. Power is always split per package and each
/// package contributes its three dimensions once; frequency series follow
/// `split_by`. The result is ordered by the (package, core, cpu) of the CPU
/// that first created each series.
pub fn build_series_definitions(topology: &CpuTopology, split_by: SplitBy) -> Vec<SeriesDefinition> {
	let mut series: Vec<(SeriesDefinition, (u32, u32, u32))> = Vec::new();
	let mut by_name: HashMap<String, usize> = HashMap::new();

	for template in MetricTemplate::ALL {
		let mut packages_seen = BTreeSet::new();

		for assignment in topology.assignments.values() {
			let suffix = match template.scope() {
				Scope::Package => Some(format!("pkg{}", assignment.package)),
				Scope::Logical => split_by.series_suffix(assignment),
			};
			let name = match suffix {
				Some(suffix) => format!("{}_{suffix}", template.id()),
				None => template.id().to_string(),
			};

			let index = *by_name.entry(name.clone()).or_insert_with(|| {
				let definition = SeriesDefinition {
					name,
					template,
					dimensions: Vec::new(),
				};
				series.push((definition, (assignment.package, assignment.core, assignment.cpu)));
				series.len() - 1
			});

			if template.scope() == Scope::Package && !packages_seen.insert(assignment.package) {
				continue;
			}

			let dimensions = &mut series[index].0.dimensions;
			for metric in template.metrics() {
				let key = match template.scope() {
					Scope::Package => package_key(assignment.package, metric),
					Scope::Logical => cpu_key(assignment.cpu, metric),
				};
				dimensions.push(Dimension {
					key,
					label: template.label(metric, assignment),
					divisor: template.divisor(),
				});
			}
		}
	}

	series.sort_by_key(|(_, first_seen)| *first_seen);
	series.into_iter().map(|(definition, _)| definition).collect()
}
