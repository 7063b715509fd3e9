use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use log::{LevelFilter, error};

use turbostat_collector::config::CollectorConfig;
use turbostat_collector::display::TerminalReporter;
use turbostat_collector::error::CollectorError;
use turbostat_collector::report::{ChartWriter, Reporter};
use turbostat_collector::run_collector;

#[derive(Parser)]
#[command(name = "turbostat-collector")]
#[command(about = "Reports CPU clock frequency and RAPL power from turbostat dumps")]
#[command(version)]
struct Cli {
	/// TOML configuration file
	#[arg(short, long)]
	config: Option<PathBuf>,

	/// Group frequency series by topology: logical, core, llc (cache-domain) or package
	#[arg(short, long)]
	split_by: Option<String>,

	/// Path to the turbostat binary
	#[arg(long)]
	command: Option<PathBuf>,

	/// Seconds between polls
	#[arg(short, long)]
	update_every: Option<u64>,

	/// Stop after this many reported polls
	#[arg(short = 'n', long)]
	iterations: Option<u64>,

	/// Print human-readable values instead of the chart protocol
	#[arg(long, default_value_t = false)]
	plain: bool,

	/// Enable debug logging
	#[arg(short, long, default_value_t = false)]
	verbose: bool,
}

impl Cli {
	fn into_config(self) -> Result<CollectorConfig, CollectorError> {
		let mut config = match &self.config {
			Some(path) => CollectorConfig::load(path)?,
			None => CollectorConfig::default(),
		};

		if self.split_by.is_some() {
			config.split_by = self.split_by;
		}
		if let Some(command) = self.command {
			config.command = command;
		}
		if let Some(update_every) = self.update_every {
			config.update_every = update_every;
		}

		Ok(config)
	}
}

fn main() -> ExitCode {
	let cli = Cli::parse();

	let level = if cli.verbose { LevelFilter::Debug } else { LevelFilter::Info };
	env_logger::Builder::new()
		.filter_level(level)
		.parse_default_env()
		.target(env_logger::Target::Stderr)
		.init();

	let plain = cli.plain;
	let iterations = cli.iterations;

	let config = match cli.into_config() {
		Ok(config) => config,
		Err(e) => {
			error!("{e}");
			return ExitCode::FAILURE;
		},
	};

	let stdout = io::stdout().lock();
	let mut reporter: Box<dyn Reporter> = if plain {
		Box::new(TerminalReporter::new(stdout))
	} else {
		Box::new(ChartWriter::new(stdout, config.interval_secs()))
	};

	match run_collector(&config, reporter.as_mut(), iterations) {
		Ok(()) => ExitCode::SUCCESS,
		Err(CollectorError::Io(e)) => {
			error!("Failed to write report: {e}");
			ExitCode::FAILURE
		},
		// Setup failures were already logged when the collector was disabled
		Err(_) => ExitCode::FAILURE,
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::Write;

	fn config_file() -> tempfile::NamedTempFile {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		writeln!(file, "split_by = \"core\"").unwrap();
		writeln!(file, "command = \"/opt/turbostat\"").unwrap();
		writeln!(file, "update_every = 5").unwrap();
		file
	}

	#[test]
	fn test_file_values_without_overrides() {
		let file = config_file();
		let cli = Cli::try_parse_from(["turbostat-collector", "--config", file.path().to_str().unwrap()]).unwrap();

		let config = cli.into_config().unwrap();

		assert_eq!(config.split_by.as_deref(), Some("core"));
		assert_eq!(config.command, PathBuf::from("/opt/turbostat"));
		assert_eq!(config.update_every, 5);
	}

	#[test]
	fn test_flags_override_file_values() {
		let file = config_file();
		let cli = Cli::try_parse_from([
			"turbostat-collector",
			"--config",
			file.path().to_str().unwrap(),
			"--split-by",
			"package",
			"--command",
			"/usr/bin/turbostat",
			"--update-every",
			"2",
		])
		.unwrap();

		let config = cli.into_config().unwrap();

		assert_eq!(config.split_by.as_deref(), Some("package"));
		assert_eq!(config.command, PathBuf::from("/usr/bin/turbostat"));
		assert_eq!(config.update_every, 2);
	}

	#[test]
	fn test_missing_config_file_is_an_error() {
		let cli = Cli::try_parse_from(["turbostat-collector", "-c", "/nonexistent/turbostat.toml"]).unwrap();
		assert!(matches!(cli.into_config(), Err(CollectorError::Config { .. })));
	}
}
