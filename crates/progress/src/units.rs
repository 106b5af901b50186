//! Units describing what a tracker measures

use serde::{Deserialize, Serialize};
use std::fmt;

/// Semantic meaning of a tracker's `progress` and `total`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Units {
    Bytes,
    Percent,
    Fraction,
    #[default]
    Steps,
    Seconds,
}

impl Units {
    /// Stable lowercase name, matching the serialized form
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Bytes => "bytes",
            Self::Percent => "percent",
            Self::Fraction => "fraction",
            Self::Steps => "steps",
            Self::Seconds => "seconds",
        }
    }

    /// Format a value expressed in these units for display
    #[must_use]
    pub fn format(self, value: f64) -> String {
        match self {
            Self::Bytes => format_bytes(value),
            Self::Percent => format!("{value:.1}%"),
            Self::Fraction => format!("{value:.3}"),
            Self::Steps => format!("{value:.0}"),
            Self::Seconds => format_seconds(value),
        }
    }
}

impl fmt::Display for Units {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn format_bytes(value: f64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];

    let mut scaled = value;
    let mut unit = 0;
    while scaled.abs() >= 1024.0 && unit < UNITS.len() - 1 {
        scaled /= 1024.0;
        unit += 1;
    }

    if unit == 0 {
        format!("{scaled:.0} {}", UNITS[unit])
    } else {
        format!("{scaled:.1} {}", UNITS[unit])
    }
}

fn format_seconds(value: f64) -> String {
    let total_seconds = value.max(0.0).round() as u64;
    if total_seconds >= 3600 {
        let hours = total_seconds / 3600;
        let minutes = (total_seconds % 3600) / 60;
        format!("{hours}h {minutes}m")
    } else if total_seconds >= 60 {
        let minutes = total_seconds / 60;
        let seconds = total_seconds % 60;
        format!("{minutes}m {seconds}s")
    } else {
        format!("{total_seconds}s")
    }
}
