// Counter names turbostat prints in decimal; everything else is hex
pub const BASE10_FIELDS: [&str; 5] = ["CPU", "core", "IRQ", "SMI", "package"];

pub const CPU_FIELD: &str = "CPU";
pub const CORE_FIELD: &str = "core";
pub const PACKAGE_FIELD: &str = "package";

// Frequency counters
pub const TSC_FIELD: &str = "TSC";
pub const APERF_FIELD: &str = "aperf";
pub const MPERF_FIELD: &str = "mperf";

// RAPL energy counters, in hardware energy units
pub const JOULES_PKG_FIELD: &str = "Joules PKG";
pub const JOULES_RAM_FIELD: &str = "Joules RAM";
pub const JOULES_GFX_FIELD: &str = "Joules GFX";

// Diagnostic tokens for the RAPL unit register
pub const RAPL_POWER_UNIT_TOKENS: [&str; 2] = ["MSR_RAPL_POWER_UNIT:", "MSR_RAPL_PWR_UNIT:"];

// Display divisors applied by the reporting side
pub const POWER_DIVISOR: u32 = 100;
pub const FREQUENCY_DIVISOR: u32 = 1000;
pub const POWER_SCALE: f64 = 100.0;

pub const DEFAULT_COMMAND: &str = "turbostat";
pub const DEFAULT_SYSFS_CPU_ROOT: &str = "/sys/devices/system/cpu";
pub const DEFAULT_UPDATE_EVERY_SECS: u64 = 1;
