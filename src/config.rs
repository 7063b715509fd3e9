use std::fs;
use std::path::{Path, PathBuf};

use log::{info, warn};
use serde::Deserialize;

use crate::constants::{DEFAULT_COMMAND, DEFAULT_SYSFS_CPU_ROOT, DEFAULT_UPDATE_EVERY_SECS};
use crate::error::{CollectorError, Result};
use crate::topology::TopologyAssignment;

/// Topology granularity the frequency series are grouped by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SplitBy {
	/// One series holding every CPU
	#[default]
	None,
	Logical,
	CacheDomain,
	Core,
	Package,
}

impl SplitBy {
	/// Parses the raw `split_by` option, falling back to ungrouped on
	/// anything missing or unrecognized.
	pub fn from_option(value: Option<&str>) -> Self {
		let Some(value) = value else {
			info!("No 'split_by' option specified. Not dividing CPUs up by topology.");
			return SplitBy::None;
		};

		match value {
			"logical" => SplitBy::Logical,
			"llc" | "cache-domain" => SplitBy::CacheDomain,
			"core" => SplitBy::Core,
			"package" => SplitBy::Package,
			other => {
				warn!("Value '{other}' for 'split_by' configuration option isn't a valid choice, ignoring");
				SplitBy::None
			},
		}
	}

	/// Series name suffix for a CPU, `None` when ungrouped
	pub fn series_suffix(&self, assignment: &TopologyAssignment) -> Option<String> {
		match self {
			SplitBy::None => None,
			SplitBy::Logical => Some(format!("cpu{}", assignment.cpu)),
			SplitBy::CacheDomain => Some(format!("pkg{}_llc{}", assignment.package, assignment.llc_id)),
			SplitBy::Core => Some(format!("pkg{}_core{}", assignment.package, assignment.core)),
			SplitBy::Package => Some(format!("pkg{}", assignment.package)),
		}
	}
}

/// Collector options, read from a TOML file and/or the command line
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
	/// Raw grouping option, see [`SplitBy::from_option`]
	pub split_by: Option<String>,

	/// Path or name of the turbostat binary
	pub command: PathBuf,

	/// Seconds between polls
	pub update_every: u64,

	/// Directory holding the `cpuN/cache` trees
	pub sysfs_root: PathBuf,
}

impl Default for CollectorConfig {
	fn default() -> Self {
		Self {
			split_by: None,
			command: PathBuf::from(DEFAULT_COMMAND),
			update_every: DEFAULT_UPDATE_EVERY_SECS,
			sysfs_root: PathBuf::from(DEFAULT_SYSFS_CPU_ROOT),
		}
	}
}

impl CollectorConfig {
	pub fn from_toml(text: &str) -> std::result::Result<Self, toml::de::Error> {
		toml::from_str(text)
	}

	pub fn load(path: &Path) -> Result<Self> {
		let text = fs::read_to_string(path).map_err(|e| CollectorError::Config {
			path: path.to_path_buf(),
			reason: e.to_string(),
		})?;

		Self::from_toml(&text).map_err(|e| CollectorError::Config {
			path: path.to_path_buf(),
			reason: e.to_string(),
		})
	}

	/// Polling interval in seconds, never below one
	pub fn interval_secs(&self) -> u64 {
		self.update_every.max(1)
	}

	pub fn split_by(&self) -> SplitBy {
		SplitBy::from_option(self.split_by.as_deref())
	}
}
