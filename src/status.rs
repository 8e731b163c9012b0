use std::fmt;

use tracing::{error, info, warn};

use crate::fan_curve::FanSpeed;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TemperatureStats {
    pub min: f32,
    pub max: f32,
    pub avg: f32,
}

impl TemperatureStats {
    pub fn from_readings(readings: &[f32]) -> Option<Self> {
        if readings.is_empty() {
            return None;
        }

        let min = readings.iter().copied().fold(f32::INFINITY, f32::min);
        let max = readings.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        let avg = readings.iter().sum::<f32>() / readings.len() as f32;

        Some(Self { min, max, avg })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Normal,
    Elevated,
    Hot,
    Critical,
}

// Temperatures used to rate the highest reading
#[derive(Debug, Clone, Copy)]
pub struct SeverityThresholds {
    pub elevated: f32,
    pub hot: f32,
    pub critical: f32,
}

impl SeverityThresholds {
    pub fn rate(&self, temp: f32) -> Severity {
        if temp >= self.critical {
            Severity::Critical
        } else if temp >= self.hot {
            Severity::Hot
        } else if temp >= self.elevated {
            Severity::Elevated
        } else {
            Severity::Normal
        }
    }
}

// Summary of one control cycle
#[derive(Debug, Clone, Copy)]
pub struct StatusSummary {
    pub stats: TemperatureStats,
    pub rpm: Option<u32>,
    pub duty: Option<FanSpeed>,
    pub severity: Severity,
}

impl StatusSummary {
    pub fn log(&self) {
        match self.severity {
            Severity::Normal | Severity::Elevated => info!("{self}"),
            Severity::Hot => warn!("{self}"),
            Severity::Critical => error!("{self}"),
        }
    }
}

impl fmt::Display for StatusSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CPU {:?}: lowest {:.1}°C, highest {:.1}°C, average {:.1}°C",
            self.severity, self.stats.min, self.stats.max, self.stats.avg
        )?;

        match self.rpm {
            Some(rpm) => write!(f, " - Fan RPM: {rpm}")?,
            None => write!(f, " - RPM unavailable")?,
        }

        match self.duty {
            Some(duty) => write!(f, " - Fan duty last set to: {duty}"),
            None => write!(f, " - Fan is in auto mode"),
        }
    }
}
