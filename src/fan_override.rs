use tracing::{error, info, trace};

use crate::ectool::FanActuator;

/// Scoped ownership of the fan duty.
///
/// While engaged the daemon drives the fan explicitly. Releasing hands the
/// fan back to the embedded controller's auto mode, at most once. Dropping
/// the guard releases it, so every exit path, unwinding included, ends with
/// the fan in auto mode.
pub struct FanOverride<A: FanActuator> {
    actuator: A,
    engaged: bool,
}

impl<A: FanActuator> FanOverride<A> {
    pub fn new(actuator: A) -> Self {
        Self {
            actuator,
            engaged: false,
        }
    }

    // Force the fan to auto mode and take ownership of the duty
    pub fn engage(&mut self) {
        set_auto(&mut self.actuator);
        self.engaged = true;
    }

    // Give the fan back to the firmware, subsequent calls do nothing
    pub fn release(&mut self) {
        if !self.engaged {
            trace!("Fan override already released");
            return;
        }

        self.engaged = false;
        set_auto(&mut self.actuator);
    }

    #[cfg(test)]
    fn is_engaged(&self) -> bool {
        self.engaged
    }

    pub fn actuator_mut(&mut self) -> &mut A {
        &mut self.actuator
    }
}

impl<A: FanActuator> Drop for FanOverride<A> {
    fn drop(&mut self) {
        self.release();
    }
}

// Best effort, a failure is logged and not retried
fn set_auto<A: FanActuator>(actuator: &mut A) {
    match actuator.set_auto() {
        Ok(()) => info!("Fan set to auto mode"),
        Err(err) => error!("Failed to set fan to auto: {err}"),
    }
}
