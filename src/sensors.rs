//! CPU temperature readings from lm-sensors
//!
//! `sensors` prints one line per sensor. The lines of interest look like
//! `Core 0:        +45.0°C  (high = +100.0°C, crit = +100.0°C)` or
//! `Package id 0:  +48.0°C  (high = +100.0°C, crit = +100.0°C)`.

use std::{path::PathBuf, process::Command};

use tracing::{debug, error, trace, warn};

use crate::errors::SensorReadError;

// Line prefixes of the CPU temperature readings
const LABELS: [&str; 2] = ["Core", "Package id"];
const CELSIUS: &str = "°C";

pub trait TemperatureSource {
    // Return the current temperature readings in °C,
    // an empty vector means no data is available this cycle
    fn read(&mut self) -> Vec<f32>;
}

// Temperature source backed by the lm-sensors command line tool
#[derive(Debug, Clone)]
pub struct SensorsCommand {
    program: PathBuf,
}

impl SensorsCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn run(&self) -> Result<String, SensorReadError> {
        let command = self.program.display().to_string();

        let output = Command::new(&self.program).output().map_err(|source| {
            SensorReadError::Spawn {
                command: command.clone(),
                source,
            }
        })?;

        if !output.status.success() {
            return Err(SensorReadError::Exit {
                command,
                status: output.status,
            });
        }

        String::from_utf8(output.stdout)
            .map_err(|source| SensorReadError::Output { command, source })
    }
}

impl TemperatureSource for SensorsCommand {
    fn read(&mut self) -> Vec<f32> {
        let report = match self.run() {
            Ok(report) => report,
            Err(err) => {
                error!("Failed to read CPU temperatures: {err}");
                if let Some(source) = std::error::Error::source(&err) {
                    debug!("Error source: {source}");
                }
                return Vec::new();
            }
        };

        let temps = parse_report(&report);

        if temps.is_empty() {
            warn!("No CPU temperature data found");
        } else {
            trace!("CPU temperatures: {:?}", temps);
        }

        temps
    }
}

// Extract every CPU core and package temperature of a sensors report
pub fn parse_report(report: &str) -> Vec<f32> {
    report.lines().filter_map(parse_line).collect()
}

// A line matches when it starts with one of the labels followed by at least
// one blank, an optional sensor index and a colon. The reading is the first
// `+<digits>.<digit>°C` token after the colon.
fn parse_line(line: &str) -> Option<f32> {
    let line = line.trim_start();
    let rest = LABELS
        .iter()
        .find_map(|label| line.strip_prefix(label))?;

    let index = rest.trim_start();
    if index.len() == rest.len() {
        return None;
    }

    let values = index
        .trim_start_matches(|c: char| c.is_ascii_digit())
        .strip_prefix(':')?;

    values.split('+').skip(1).find_map(parse_reading)
}

// Parse `<digits>.<digit>°C` at the start of the given text,
// sensors always prints a single decimal
fn parse_reading(text: &str) -> Option<f32> {
    let number = &text[..text.find(CELSIUS)?];
    let (int, frac) = number.split_once('.')?;

    let is_digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    if !is_digits(int) || frac.len() != 1 || !is_digits(frac) {
        return None;
    }

    number.parse().ok()
}
