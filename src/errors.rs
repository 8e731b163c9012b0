use std::{io, path::PathBuf, process::ExitStatus};

use thiserror::Error;

// Configuration errors are fatal at start-up
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read configuration file {path:?}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Failed to parse configuration file {path:?}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

// Failure of an external fan control command
#[derive(Debug, Error)]
pub enum ActuatorError {
    #[error("Failed to run `{command}`")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },
    #[error("`{command}` exited with {status}")]
    Exit { command: String, status: ExitStatus },
}

// Failure of the temperature sensor command, never leaves the source
#[derive(Debug, Error)]
pub enum SensorReadError {
    #[error("Failed to run `{command}`")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },
    #[error("`{command}` exited with {status}")]
    Exit { command: String, status: ExitStatus },
    #[error("`{command}` produced non UTF-8 output")]
    Output {
        command: String,
        #[source]
        source: std::string::FromUtf8Error,
    },
}
