use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::Deserialize;
use tracing::{debug, trace};

use crate::{
    errors::ConfigError,
    fan_curve::{
        CurvePoint, FanSpeed,
        duty_curve::{BREAKPOINTS, DutyCurve},
    },
};

const DEFAULT_UPDATE_INTERVAL: f32 = 0.5;
const DEFAULT_COOLDOWN_CYCLES: u32 = 5;
const DEFAULT_ECTOOL_PATH: &str = "./ectool";
const DEFAULT_SENSORS_COMMAND: &str = "sensors";

// Daemon configuration, loaded once at start-up
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    // Curve breakpoints in °C
    pub low_temp_1: f32,
    pub low_temp_2: f32,
    pub low_temp_3: f32,
    pub low_temp_4: f32,

    // Only used to rate the severity of the status summary
    pub high_temp: f32,

    // Fan duty percentage at each breakpoint
    pub duty_1: u8,
    pub duty_2: u8,
    pub duty_3: u8,
    pub duty_4: u8,

    // Control loop period in seconds
    #[serde(default = "default_update_interval")]
    pub update_interval: f32,

    // Consecutive cycles required before lowering the fan duty
    #[serde(default = "default_cooldown_cycles")]
    pub cooldown_cycles: u32,

    #[serde(default = "default_ectool_path")]
    pub ectool_path: PathBuf,
    #[serde(default = "default_use_sudo")]
    pub use_sudo: bool,
    #[serde(default = "default_sensors_command")]
    pub sensors_command: PathBuf,
}

impl Config {
    // Read, parse and validate the configuration file at the given path
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        debug!("Parsing config file at: {:?}", path);

        let file = File::open(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let config: Config = serde_json::from_reader(BufReader::new(file))
            .map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;

        config.validate()?;

        trace!("Loaded configuration: {:?}", config);

        Ok(config)
    }

    pub fn thresholds(&self) -> [f32; BREAKPOINTS] {
        [
            self.low_temp_1,
            self.low_temp_2,
            self.low_temp_3,
            self.low_temp_4,
        ]
    }

    pub fn duties(&self) -> [u8; BREAKPOINTS] {
        [self.duty_1, self.duty_2, self.duty_3, self.duty_4]
    }

    // Build the duty curve described by the breakpoints
    pub fn duty_curve(&self) -> DutyCurve {
        let thresholds = self.thresholds();
        let duties = self.duties();

        let curve = DutyCurve::new(std::array::from_fn(|i| CurvePoint {
            temp: thresholds[i],
            fan_speed: FanSpeed::new(duties[i]),
        }));

        debug!("Duty curve breakpoints: {:?}", curve.points());

        curve
    }

    pub fn update_interval(&self) -> Duration {
        Duration::from_secs_f32(self.update_interval)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let thresholds = self.thresholds();

        if let Some(temp) = thresholds
            .iter()
            .chain([&self.high_temp])
            .find(|t| !t.is_finite())
        {
            return Err(ConfigError::Invalid(format!(
                "temperature {temp} is not a finite number"
            )));
        }

        if let Some(pair) = thresholds.windows(2).find(|w| w[0] >= w[1]) {
            return Err(ConfigError::Invalid(format!(
                "breakpoints must be strictly increasing, got {}°C before {}°C",
                pair[0], pair[1]
            )));
        }

        if let Some(duty) = self.duties().iter().find(|d| **d > 100) {
            return Err(ConfigError::Invalid(format!(
                "fan duty {duty} is outside of 0..=100"
            )));
        }

        if !self.update_interval.is_finite() || self.update_interval <= 0. {
            return Err(ConfigError::Invalid(format!(
                "update_interval must be a positive number of seconds, got {}",
                self.update_interval
            )));
        }

        if let Err(err) = Duration::try_from_secs_f32(self.update_interval) {
            return Err(ConfigError::Invalid(format!(
                "update_interval of {} seconds is not representable: {err}",
                self.update_interval
            )));
        }

        if self.cooldown_cycles == 0 {
            return Err(ConfigError::Invalid(
                "cooldown_cycles must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}

fn default_update_interval() -> f32 {
    DEFAULT_UPDATE_INTERVAL
}

fn default_cooldown_cycles() -> u32 {
    DEFAULT_COOLDOWN_CYCLES
}

fn default_ectool_path() -> PathBuf {
    PathBuf::from(DEFAULT_ECTOOL_PATH)
}

fn default_use_sudo() -> bool {
    true
}

fn default_sensors_command() -> PathBuf {
    PathBuf::from(DEFAULT_SENSORS_COMMAND)
}
