use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Debug;
use std::path::{Path, PathBuf};
use std::{fs, io};

use log::{debug, warn};

use crate::constants::{CORE_FIELD, PACKAGE_FIELD};
use crate::error::{CollectorError, Result};
use crate::snapshot::{CpuRecord, Snapshot};
use crate::turbostat::TelemetrySource;

/// Where a logical CPU sits in the machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TopologyAssignment {
	pub cpu: u32,
	pub package: u32,
	pub core: u32,
	/// Identifier of the last-level cache domain
	pub llc_id: u32,
}

/// Scale factors decoded from a package's RAPL power unit register
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RaplUnits {
	/// Watts per power unit
	pub power_unit: f64,
	/// Joules per energy unit
	pub energy_unit: f64,
}

impl RaplUnits {
	/// Decodes the power unit exponent (bits 0-3) and energy unit
	/// exponent (bits 8-12); each unit is `1 / 2^exp`.
	pub fn from_register(raw: u64) -> Self {
		let power_exp = raw & 0xF;
		let energy_exp = (raw >> 8) & 0x1F;

		Self {
			power_unit: 1.0 / (1u64 << power_exp) as f64,
			energy_unit: 1.0 / (1u64 << energy_exp) as f64,
		}
	}
}

/// Lookup of a CPU's last-level cache domain
pub trait CacheTopology: Debug {
	fn llc_id(&self, cpu: u32) -> io::Result<u32>;
}

/// Reads cache ids from `<root>/cpuN/cache/indexK/id`
#[derive(Debug, Clone)]
pub struct SysfsCacheTopology {
	root: PathBuf,
}

impl SysfsCacheTopology {
	pub fn new(root: impl Into<PathBuf>) -> Self {
		Self { root: root.into() }
	}

	/// Finds the highest-numbered `indexK` directory, which is the outermost cache level
	fn last_level_dir(cache_dir: &Path) -> io::Result<PathBuf> {
		fs::read_dir(cache_dir)?
			.filter_map(|entry| entry.ok())
			.filter_map(|entry| {
				let name = entry.file_name();
				let index = name.to_str()?.strip_prefix("index")?.parse::<u32>().ok()?;
				Some((index, entry.path()))
			})
			.max_by_key(|(index, _)| *index)
			.map(|(_, path)| path)
			.ok_or_else(|| {
				io::Error::new(
					io::ErrorKind::NotFound,
					format!("no cache index directories under {}", cache_dir.display()),
				)
			})
	}
}

impl CacheTopology for SysfsCacheTopology {
	fn llc_id(&self, cpu: u32) -> io::Result<u32> {
		let cache_dir = self.root.join(format!("cpu{cpu}")).join("cache");
		let id_path = Self::last_level_dir(&cache_dir)?.join("id");

		fs::read_to_string(&id_path)?
			.trim()
			.parse::<u32>()
			.map_err(|e| io::Error::new(io::ErrorKind::InvalidData, format!("{}: {e}", id_path.display())))
	}
}

/// Topology of every CPU turbostat reported, resolved once at setup
#[derive(Debug, Clone, Default)]
pub struct CpuTopology {
	/// Logical CPU index -> placement
	pub assignments: BTreeMap<u32, TopologyAssignment>,

	/// Package index -> RAPL units, only for packages whose register could be read
	pub rapl: BTreeMap<u32, RaplUnits>,
}

impl CpuTopology {
	/// Resolves placements from a calibration snapshot.
	///
	/// CPUs lacking `package`/`core` or a readable cache id are skipped. RAPL
	/// units are read through each CPU of a package until one read succeeds;
	/// a package none of whose CPUs could read them stays without power
	/// metrics. Fails only when no CPU could be resolved.
	pub fn resolve(snapshot: &Snapshot, source: &dyn TelemetrySource, cache: &dyn CacheTopology) -> Result<Self> {
		let mut topology = Self::default();
		let mut rapl_failures: BTreeMap<u32, CollectorError> = BTreeMap::new();

		for (&cpu, record) in &snapshot.cpus {
			let Some((package, core)) = placement(record) else {
				warn!("CPU {cpu} has no package/core fields in the turbostat dump, skipping");
				continue;
			};

			let llc_id = match cache.llc_id(cpu) {
				Ok(id) => id,
				Err(e) => {
					warn!("Could not read last-level cache id for CPU {cpu}: {e}");
					continue;
				},
			};

			topology.assignments.insert(
				cpu,
				TopologyAssignment {
					cpu,
					package,
					core,
					llc_id,
				},
			);

			if !topology.rapl.contains_key(&package) {
				match source.read_rapl_unit(cpu) {
					Ok(raw) => {
						let units = RaplUnits::from_register(raw);
						debug!("Package {package} RAPL units: {units:?}");
						topology.rapl.insert(package, units);
						rapl_failures.remove(&package);
					},
					Err(e) => {
						debug!("RAPL unit read through CPU {cpu} failed: {e}");
						rapl_failures.insert(package, e);
					},
				}
			}
		}

		for (package, error) in &rapl_failures {
			warn_rapl_unavailable(*package, error);
		}

		if topology.assignments.is_empty() {
			return Err(CollectorError::TopologyResolution);
		}

		Ok(topology)
	}

	pub fn assignment(&self, cpu: u32) -> Option<&TopologyAssignment> {
		self.assignments.get(&cpu)
	}

	pub fn rapl_units(&self, package: u32) -> Option<RaplUnits> {
		self.rapl.get(&package).copied()
	}

	/// Number of distinct packages among resolved CPUs
	pub fn package_count(&self) -> usize {
		self.assignments
			.values()
			.map(|assignment| assignment.package)
			.collect::<BTreeSet<_>>()
			.len()
	}
}

fn placement(record: &CpuRecord) -> Option<(u32, u32)> {
	let package = u32::try_from(record.get(PACKAGE_FIELD)?).ok()?;
	let core = u32::try_from(record.get(CORE_FIELD)?).ok()?;
	Some((package, core))
}

fn warn_rapl_unavailable(package: u32, error: &CollectorError) {
	// SAFETY: geteuid has no preconditions and cannot fail
	let euid = unsafe { libc::geteuid() };
	if euid != 0 {
		warn!("Power metrics disabled for package {package}: {error} (reading MSRs needs root or CAP_SYS_RAWIO)");
	} else {
		warn!("Power metrics disabled for package {package}: {error}");
	}
}
