use std::fmt::Debug;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

use log::debug;

use crate::constants::RAPL_POWER_UNIT_TOKENS;
use crate::error::{CollectorError, Result};
use crate::parser::parse_hex;
use crate::snapshot::{Snapshot, read_snapshot};

/// Source of counter snapshots and RAPL unit registers
///
/// The production implementation shells out to turbostat; tests script it.
pub trait TelemetrySource: Debug {
	/// Runs a full counter dump for every CPU
	fn dump(&self) -> Result<Snapshot>;

	/// Reads the raw RAPL power unit register through the given CPU
	fn read_rapl_unit(&self, cpu: u32) -> Result<u64>;
}

/// Invokes the turbostat binary
#[derive(Debug, Clone)]
pub struct Turbostat {
	command: PathBuf,
}

impl Turbostat {
	pub fn new(command: impl Into<PathBuf>) -> Self {
		Self {
			command: command.into(),
		}
	}

	fn invocation_error(&self, reason: impl ToString) -> CollectorError {
		CollectorError::Invocation {
			command: self.command.display().to_string(),
			reason: reason.to_string(),
		}
	}
}

impl TelemetrySource for Turbostat {
	fn dump(&self) -> Result<Snapshot> {
		let mut child = Command::new(&self.command)
			.arg("--Dump")
			.stdout(Stdio::piped())
			.stderr(Stdio::null())
			.spawn()
			.map_err(|e| self.invocation_error(e))?;

		let timestamp = wall_clock_secs();
		let snapshot = match child.stdout.take() {
			Some(stdout) => read_snapshot(BufReader::new(stdout), timestamp).map_err(|e| self.invocation_error(e)),
			None => Err(self.invocation_error("stdout was not captured")),
		};

		// Always reap the child, even when reading failed
		let status = child.wait().map_err(|e| self.invocation_error(e))?;
		let snapshot = snapshot?;

		if !status.success() {
			return Err(self.invocation_error(format!("exited with {status}")));
		}

		debug!("turbostat dump covered {} CPUs", snapshot.cpus.len());
		Ok(snapshot)
	}

	fn read_rapl_unit(&self, cpu: u32) -> Result<u64> {
		let unavailable = |reason: String| CollectorError::RaplUnavailable { cpu, reason };
		let cpu_arg = cpu.to_string();

		let mut child = Command::new(&self.command)
			.args(["-c", cpu_arg.as_str(), "-d", "0"])
			.stdout(Stdio::null())
			.stderr(Stdio::piped())
			.spawn()
			.map_err(|e| unavailable(e.to_string()))?;

		let Some(stderr) = child.stderr.take() else {
			reap(&mut child);
			return Err(unavailable("stderr was not captured".to_string()));
		};

		// Diagnostic output is not guaranteed to be UTF-8
		let mut reader = BufReader::new(stderr);
		let mut buf = Vec::new();
		loop {
			buf.clear();
			match reader.read_until(b'\n', &mut buf) {
				Ok(0) => break,
				Ok(_) => {},
				Err(e) => {
					reap(&mut child);
					return Err(unavailable(e.to_string()));
				},
			}

			if let Some(unit) = parse_rapl_unit_line(&String::from_utf8_lossy(&buf)) {
				reap(&mut child);
				return Ok(unit);
			}
		}

		reap(&mut child);
		Err(unavailable("MSR_RAPL_POWER_UNIT not reported".to_string()))
	}
}

/// Stops a diagnostic child we no longer need output from
fn reap(child: &mut Child) {
	let _ = child.kill();
	let _ = child.wait();
}

/// Extracts the register value from a line like
/// `cpu0: MSR_RAPL_POWER_UNIT: 0x000a0e03 (0.125000 Watts, ...)`
pub fn parse_rapl_unit_line(line: &str) -> Option<u64> {
	let tokens: Vec<&str> = line.split_whitespace().collect();
	tokens
		.windows(2)
		.find(|pair| RAPL_POWER_UNIT_TOKENS.contains(&pair[0]))
		.and_then(|pair| parse_hex(pair[1]))
}

/// Seconds since the Unix epoch as a float
pub fn wall_clock_secs() -> f64 {
	SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.map(|elapsed| elapsed.as_secs_f64())
		.unwrap_or_default()
}
