use std::io::{self, Write};

use crate::power::MetricValues;
use crate::series::SeriesDefinition;

/// Receives the series layout once after setup, then the values of each
/// poll keyed by dimension key
pub trait Reporter {
	fn register(&mut self, series: &[SeriesDefinition]) -> io::Result<()>;

	fn publish(&mut self, series: &[SeriesDefinition], values: &MetricValues) -> io::Result<()>;
}

const CHART_TYPE: &str = "turbostat";
const BASE_PRIORITY: usize = 70_000;

/// Writes the line protocol of netdata external plugins
/// (`CHART`/`DIMENSION` once, then `BEGIN`/`SET`/`END` per poll)
#[derive(Debug)]
pub struct ChartWriter<W: Write> {
	out: W,
	update_every: u64,
}

impl<W: Write> ChartWriter<W> {
	pub fn new(out: W, update_every: u64) -> Self {
		Self { out, update_every }
	}

	pub fn into_inner(self) -> W {
		self.out
	}
}

impl<W: Write> Reporter for ChartWriter<W> {
	fn register(&mut self, series: &[SeriesDefinition]) -> io::Result<()> {
		for (priority, definition) in series.iter().enumerate() {
			writeln!(
				self.out,
				"CHART {CHART_TYPE}.{} '' '{}' '{}' '{CHART_TYPE}' '{CHART_TYPE}.{}' line {} {}",
				definition.name,
				definition.title(),
				definition.units(),
				definition.template.id(),
				BASE_PRIORITY + priority,
				self.update_every,
			)?;
			for dimension in &definition.dimensions {
				writeln!(
					self.out,
					"DIMENSION {} '{}' absolute 1 {}",
					dimension.key, dimension.label, dimension.divisor
				)?;
			}
		}
		self.out.flush()
	}

	fn publish(&mut self, series: &[SeriesDefinition], values: &MetricValues) -> io::Result<()> {
		for definition in series {
			let mut present = definition
				.dimensions
				.iter()
				.filter_map(|dimension| Some((dimension, values.get(&dimension.key)?)))
				.peekable();

			if present.peek().is_none() {
				continue;
			}

			writeln!(self.out, "BEGIN {CHART_TYPE}.{}", definition.name)?;
			for (dimension, value) in present {
				writeln!(self.out, "SET {} = {}", dimension.key, value.round() as i64)?;
			}
			writeln!(self.out, "END")?;
		}
		self.out.flush()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::series::{Dimension, MetricTemplate};

	fn series() -> Vec<SeriesDefinition> {
		vec![
			SeriesDefinition {
				name: "power_pkg0".to_string(),
				template: MetricTemplate::Power,
				dimensions: vec![
					Dimension {
						key: "pkg0_pkg_watts".to_string(),
						label: "pkg".to_string(),
						divisor: 100,
					},
					Dimension {
						key: "pkg0_ram_watts".to_string(),
						label: "ram".to_string(),
						divisor: 100,
					},
				],
			},
			SeriesDefinition {
				name: "avg_mhz".to_string(),
				template: MetricTemplate::AvgMhz,
				dimensions: vec![Dimension {
					key: "cpu0_avg_mhz".to_string(),
					label: "cpu0".to_string(),
					divisor: 1000,
				}],
			},
		]
	}

	fn output(writer: ChartWriter<Vec<u8>>) -> String {
		String::from_utf8(writer.into_inner()).unwrap()
	}

	#[test]
	fn test_register_writes_charts_and_dimensions() {
		let mut writer = ChartWriter::new(Vec::new(), 1);
		writer.register(&series()).unwrap();

		assert_eq!(
			output(writer),
			"CHART turbostat.power_pkg0 '' 'Power utilization' 'Watts' 'turbostat' 'turbostat.power' line 70000 1\n\
			 DIMENSION pkg0_pkg_watts 'pkg' absolute 1 100\n\
			 DIMENSION pkg0_ram_watts 'ram' absolute 1 100\n\
			 CHART turbostat.avg_mhz '' 'Average CPU clock frequency, including idle time' 'MHz' 'turbostat' 'turbostat.avg_mhz' line 70001 1\n\
			 DIMENSION cpu0_avg_mhz 'cpu0' absolute 1 1000\n"
		);
	}

	#[test]
	fn test_publish_only_present_values() {
		let mut writer = ChartWriter::new(Vec::new(), 1);
		let values = MetricValues::from([
			("cpu0_avg_mhz".to_string(), 1_499_999.6),
			("cpu9_avg_mhz".to_string(), 1.0),
		]);

		writer.publish(&series(), &values).unwrap();

		assert_eq!(output(writer), "BEGIN turbostat.avg_mhz\nSET cpu0_avg_mhz = 1500000\nEND\n");
	}

	#[test]
	fn test_publish_nothing() {
		let mut writer = ChartWriter::new(Vec::new(), 1);
		writer.publish(&series(), &MetricValues::new()).unwrap();
		assert!(output(writer).is_empty());
	}
}
