//! Fan control through the ChromeOS embedded controller tool

use std::{
    path::PathBuf,
    process::{Command, Output},
};

use tracing::{debug, error, trace};

use crate::{errors::ActuatorError, fan_curve::FanSpeed};

// Index of the fan queried for its RPM
const FAN_INDEX: &str = "0";

pub trait FanActuator {
    // Hand the fan control back to the embedded controller firmware
    fn set_auto(&mut self) -> Result<(), ActuatorError>;

    // Force the fan to the given duty cycle
    fn set_duty(&mut self, duty: FanSpeed) -> Result<(), ActuatorError>;

    // Return the current fan speed in RPM if it can be read
    fn get_rpm(&mut self) -> Option<u32>;
}

// Fan actuator invoking `ectool`, optionally through sudo
#[derive(Debug, Clone)]
pub struct EcTool {
    program: PathBuf,
    use_sudo: bool,
}

impl EcTool {
    pub fn new(program: impl Into<PathBuf>, use_sudo: bool) -> Self {
        Self {
            program: program.into(),
            use_sudo,
        }
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut command = if self.use_sudo {
            let mut command = Command::new("sudo");
            command.arg(&self.program);
            command
        } else {
            Command::new(&self.program)
        };

        command.args(args);
        command
    }

    // Run ectool with the given arguments and fail on a non zero exit status
    fn run(&self, args: &[&str]) -> Result<Output, ActuatorError> {
        let description = format!("{} {}", self.program.display(), args.join(" "));

        trace!("Running: {description}");

        let output = self.command(args).output().map_err(|source| {
            ActuatorError::Spawn {
                command: description.clone(),
                source,
            }
        })?;

        if !output.status.success() {
            debug!(
                "{description} stderr: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            );

            return Err(ActuatorError::Exit {
                command: description,
                status: output.status,
            });
        }

        Ok(output)
    }
}

impl FanActuator for EcTool {
    fn set_auto(&mut self) -> Result<(), ActuatorError> {
        self.run(&["autofanctrl"])?;

        Ok(())
    }

    fn set_duty(&mut self, duty: FanSpeed) -> Result<(), ActuatorError> {
        self.run(&["fanduty", &duty.get().to_string()])?;

        Ok(())
    }

    fn get_rpm(&mut self) -> Option<u32> {
        let output = match self.run(&["pwmgetfanrpm", FAN_INDEX]) {
            Ok(output) => output,
            Err(err) => {
                error!("Failed to retrieve fan RPM: {err}");
                return None;
            }
        };

        parse_rpm(&String::from_utf8_lossy(&output.stdout))
    }
}

// Find the first `Fan <index> RPM: <rpm>` line of the ectool output
pub fn parse_rpm(output: &str) -> Option<u32> {
    output.lines().find_map(|line| {
        let mut words = line.split_whitespace();

        if words.next()? != "Fan" {
            return None;
        }

        words.next()?.parse::<u32>().ok()?;

        if words.next()? != "RPM:" {
            return None;
        }

        words.next()?.parse().ok()
    })
}
