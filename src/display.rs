use std::io::{self, Write};

use crate::power::MetricValues;
use crate::report::Reporter;
use crate::series::SeriesDefinition;

/// Prints readings in a human-readable form, one line per series
#[derive(Debug)]
pub struct TerminalReporter<W: Write> {
	out: W,
}

impl<W: Write> TerminalReporter<W> {
	pub fn new(out: W) -> Self {
		Self { out }
	}

	pub fn into_inner(self) -> W {
		self.out
	}
}

impl<W: Write> Reporter for TerminalReporter<W> {
	fn register(&mut self, series: &[SeriesDefinition]) -> io::Result<()> {
		let dimensions: usize = series.iter().map(|s| s.dimensions.len()).sum();
		writeln!(self.out, "Reporting {} series ({dimensions} values)", series.len())?;
		self.out.flush()
	}

	fn publish(&mut self, series: &[SeriesDefinition], values: &MetricValues) -> io::Result<()> {
		for definition in series {
			let readings: Vec<String> = definition
				.dimensions
				.iter()
				.filter_map(|dimension| {
					let value = values.get(&dimension.key)? / f64::from(dimension.divisor);
					Some(format!("{} {:.2}", dimension.label, value))
				})
				.collect();

			if readings.is_empty() {
				continue;
			}

			writeln!(
				self.out,
				"{:<24} {} ({})",
				definition.name,
				readings.join(" | "),
				definition.units()
			)?;
		}
		writeln!(self.out)?;
		self.out.flush()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::series::{Dimension, MetricTemplate};

	#[test]
	fn test_values_are_divided_for_display() {
		let series = vec![SeriesDefinition {
			name: "busy_mhz_pkg0".to_string(),
			template: MetricTemplate::BusyMhz,
			dimensions: vec![
				Dimension {
					key: "cpu0_busy_mhz".to_string(),
					label: "cpu0".to_string(),
					divisor: 1000,
				},
				Dimension {
					key: "cpu1_busy_mhz".to_string(),
					label: "cpu1".to_string(),
					divisor: 1000,
				},
			],
		}];
		let values = MetricValues::from([
			("cpu0_busy_mhz".to_string(), 3_000_000.0),
			("cpu1_busy_mhz".to_string(), 2_412_340.0),
		]);

		let mut reporter = TerminalReporter::new(Vec::new());
		reporter.register(&series).unwrap();
		reporter.publish(&series, &values).unwrap();

		let text = String::from_utf8(reporter.into_inner()).unwrap();
		let mut lines = text.lines();
		assert_eq!(lines.next(), Some("Reporting 1 series (2 values)"));
		assert_eq!(
			lines.next(),
			Some("busy_mhz_pkg0            cpu0 3000.00 | cpu1 2412.34 (MHz)")
		);
	}
}
