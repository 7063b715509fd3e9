use crate::constants::{BASE10_FIELDS, CPU_FIELD};

/// A single `NAME: VALUE` counter from a turbostat dump
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatField {
	pub name: String,
	pub value: u64,
}

/// Outcome of parsing one output line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedLine {
	/// A counter that made it through numeric parsing
	Stat(StatField),
	/// Debug text, headers or a value that didn't parse
	Skip,
}

impl ParsedLine {
	fn stat(name: &str, value: u64) -> Self {
		ParsedLine::Stat(StatField {
			name: name.to_string(),
			value,
		})
	}
}

/// Parses one trimmed line of turbostat `--Dump` output.
///
/// `CPU` takes the first decimal token of its value (the rest is flags),
/// names in [`BASE10_FIELDS`] are decimal, everything else is hex.
pub fn parse_stat_line(line: &str) -> ParsedLine {
	let Some((name, value)) = line.split_once(": ") else {
		return ParsedLine::Skip;
	};

	if name == CPU_FIELD {
		return match value.split_whitespace().next().map(str::parse::<u64>) {
			Some(Ok(index)) => ParsedLine::stat(name, index),
			_ => ParsedLine::Skip,
		};
	}

	let parsed = if BASE10_FIELDS.contains(&name) {
		value.trim().parse::<u64>().ok()
	} else {
		parse_hex(value)
	};

	match parsed {
		Some(value) => ParsedLine::stat(name, value),
		None => ParsedLine::Skip,
	}
}

/// Parses a hex counter, tolerating an optional `0x` prefix
pub fn parse_hex(value: &str) -> Option<u64> {
	let value = value.trim();
	let digits = value
		.strip_prefix("0x")
		.or_else(|| value.strip_prefix("0X"))
		.unwrap_or(value);
	u64::from_str_radix(digits, 16).ok()
}

#[cfg(test)]
mod tests {
	use super::*;

	fn stat(name: &str, value: u64) -> ParsedLine {
		ParsedLine::stat(name, value)
	}

	#[test]
	fn test_cpu_header_takes_first_token() {
		assert_eq!(parse_stat_line("CPU: 3 flags 0x0"), stat("CPU", 3));
		assert_eq!(parse_stat_line("CPU: 12"), stat("CPU", 12));
	}

	#[test]
	fn test_base10_fields() {
		assert_eq!(parse_stat_line("core: 10"), stat("core", 10));
		assert_eq!(parse_stat_line("package: 1"), stat("package", 1));
		assert_eq!(parse_stat_line("IRQ: 4521"), stat("IRQ", 4521));
		assert_eq!(parse_stat_line("SMI: 0"), stat("SMI", 0));
	}

	#[test]
	fn test_other_fields_are_hex() {
		assert_eq!(parse_stat_line("TSC: 10"), stat("TSC", 16));
		assert_eq!(
			parse_stat_line("aperf: 00000001DCD65000"),
			stat("aperf", 0x1_DCD6_5000)
		);
		assert_eq!(parse_stat_line("Joules PKG: 0x1F"), stat("Joules PKG", 31));
	}

	#[test]
	fn test_line_without_separator_is_skipped() {
		assert_eq!(parse_stat_line("turbostat version 2023.11.07"), ParsedLine::Skip);
		assert_eq!(parse_stat_line("TSC:10"), ParsedLine::Skip);
		assert_eq!(parse_stat_line(""), ParsedLine::Skip);
	}

	#[test]
	fn test_unparseable_values_are_skipped() {
		assert_eq!(parse_stat_line("core: abc"), ParsedLine::Skip);
		assert_eq!(parse_stat_line("TSC: xyz"), ParsedLine::Skip);
		assert_eq!(parse_stat_line("CPU: "), ParsedLine::Skip);
		assert_eq!(parse_stat_line("CPU: -1"), ParsedLine::Skip);
	}

	#[test]
	fn test_value_split_happens_once() {
		// Only the first ": " separates name from value
		assert_eq!(parse_stat_line("weird: name: 10"), ParsedLine::Skip);
	}
}
