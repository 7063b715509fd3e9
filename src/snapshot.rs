use std::collections::BTreeMap;
use std::io::{self, BufRead};

use crate::constants::CPU_FIELD;
use crate::parser::{ParsedLine, StatField, parse_stat_line};

/// Counters reported for one logical CPU within one snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CpuRecord {
	counters: BTreeMap<String, u64>,
}

impl CpuRecord {
	pub fn get(&self, name: &str) -> Option<u64> {
		self.counters.get(name).copied()
	}

	pub fn insert(&mut self, name: impl Into<String>, value: u64) {
		self.counters.insert(name.into(), value);
	}

	pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
		self.counters.iter().map(|(name, &value)| (name.as_str(), value))
	}

	pub fn len(&self) -> usize {
		self.counters.len()
	}

	pub fn is_empty(&self) -> bool {
		self.counters.is_empty()
	}
}

impl<S: Into<String>> FromIterator<(S, u64)> for CpuRecord {
	fn from_iter<I: IntoIterator<Item = (S, u64)>>(iter: I) -> Self {
		Self {
			counters: iter.into_iter().map(|(name, value)| (name.into(), value)).collect(),
		}
	}
}

/// Point-in-time counter readings for every CPU turbostat reported
///
/// The timestamp is wall-clock seconds, taken when reading of the dump began.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
	pub timestamp: f64,
	pub cpus: BTreeMap<u32, CpuRecord>,
}

impl Snapshot {
	pub fn cpu(&self, index: u32) -> Option<&CpuRecord> {
		self.cpus.get(&index)
	}
}

/// Builds a snapshot from a full `--Dump` output stream.
///
/// Each block starts at a `CPU` header and runs until a blank line. Fields
/// outside a block are dropped and a repeated header replaces the earlier
/// record for that CPU.
pub fn read_snapshot<R: BufRead>(mut reader: R, timestamp: f64) -> io::Result<Snapshot> {
	let mut cpus: BTreeMap<u32, CpuRecord> = BTreeMap::new();
	let mut current: Option<u32> = None;
	let mut buf = Vec::new();

	loop {
		buf.clear();
		if reader.read_until(b'\n', &mut buf)? == 0 {
			break;
		}

		let line = String::from_utf8_lossy(&buf);
		let line = line.trim();

		if line.is_empty() {
			current = None;
			continue;
		}

		let StatField { name, value } = match parse_stat_line(line) {
			ParsedLine::Stat(field) => field,
			ParsedLine::Skip => continue,
		};

		if name == CPU_FIELD {
			// Out-of-range indices end the block like any bad header would
			current = u32::try_from(value).ok();
			if let Some(index) = current {
				let mut record = CpuRecord::default();
				record.insert(name, value);
				cpus.insert(index, record);
			}
			continue;
		}

		if let Some(record) = current.and_then(|index| cpus.get_mut(&index)) {
			record.insert(name, value);
		}
	}

	Ok(Snapshot { timestamp, cpus })
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::Cursor;

	const DUMP: &str = "\
turbostat version 2023.11.07 - Len Brown <lenb@kernel.org>
TSC: 1234
CPU: 0 flags 0x0
core: 0
package: 0
TSC: 00000000000003E8
aperf: 0000000000000064
mperf: 00000000000000C8
Joules PKG: 0000000000001000

CPU: 1 flags 0x0
core: 1
package: 0
TSC: 00000000000007D0
aperf: 0000000000000010
garbage without separator
mperf: nothex

stray: 5
";

	#[test]
	fn test_blocks_become_records() {
		let snapshot = read_snapshot(Cursor::new(DUMP), 42.5).unwrap();

		assert_eq!(snapshot.timestamp, 42.5);
		assert_eq!(snapshot.cpus.len(), 2);

		let cpu0 = snapshot.cpu(0).unwrap();
		assert_eq!(cpu0.get("CPU"), Some(0));
		assert_eq!(cpu0.get("TSC"), Some(1000));
		assert_eq!(cpu0.get("aperf"), Some(100));
		assert_eq!(cpu0.get("mperf"), Some(200));
		assert_eq!(cpu0.get("Joules PKG"), Some(4096));

		let cpu1 = snapshot.cpu(1).unwrap();
		assert_eq!(cpu1.get("core"), Some(1));
		assert_eq!(cpu1.get("TSC"), Some(2000));
		assert_eq!(cpu1.get("mperf"), None);
	}

	#[test]
	fn test_fields_outside_a_block_are_dropped() {
		let snapshot = read_snapshot(Cursor::new(DUMP), 0.0).unwrap();

		// The header TSC came before any CPU, "stray" after a blank line
		assert_eq!(snapshot.cpu(0).unwrap().len(), 7);
		assert_eq!(snapshot.cpu(1).unwrap().len(), 5);
		assert_eq!(snapshot.cpu(1).unwrap().get("stray"), None);
	}

	#[test]
	fn test_repeated_cpu_header_replaces_record() {
		let dump = "CPU: 2\ncore: 5\naperf: 1\n\nCPU: 2\ncore: 6\n";
		let snapshot = read_snapshot(Cursor::new(dump), 0.0).unwrap();

		let record = snapshot.cpu(2).unwrap();
		assert_eq!(record.get("core"), Some(6));
		assert_eq!(record.get("aperf"), None);
	}

	#[test]
	fn test_empty_stream() {
		let snapshot = read_snapshot(Cursor::new(""), 1.0).unwrap();
		assert!(snapshot.cpus.is_empty());
	}

	#[test]
	fn test_crlf_and_non_utf8_lines() {
		let mut dump = b"CPU: 0\r\n\xff\xfe junk\r\ncore: 3\r\n".to_vec();
		dump.extend_from_slice(b"\r\nTSC: 1\r\n");
		let snapshot = read_snapshot(Cursor::new(dump), 0.0).unwrap();

		let record = snapshot.cpu(0).unwrap();
		assert_eq!(record.get("core"), Some(3));
		assert_eq!(record.get("TSC"), None);
	}
}
