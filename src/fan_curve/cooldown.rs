use tracing::info;

use crate::fan_curve::FanSpeed;

// Mutable state of the control loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerState {
    // Duty last applied to the fan, None while the
    // embedded controller is in auto mode
    pub last_set_duty: Option<FanSpeed>,

    // Consecutive cycles spent waiting to commit a decrease
    pub cooldown_counter: u32,
}

impl ControllerState {
    pub fn new(initial_duty: FanSpeed) -> Self {
        Self {
            last_set_duty: Some(initial_duty),
            cooldown_counter: 0,
        }
    }

    // Forget the applied duty, the fan is back under firmware control
    pub fn set_auto(&mut self) {
        self.last_set_duty = None;
    }
}

/// Cooldown hysteresis applied on top of a fan curve.
///
/// Increases are applied immediately. A decrease is only committed after
/// `cooldown_cycles` consecutive observations asking for it. While in auto
/// mode every observation counts as a decrease, so the first duty after auto
/// mode also waits for the full cooldown.
#[derive(Debug, Clone, Copy)]
pub struct HysteresisController {
    cooldown_cycles: u32,
}

impl HysteresisController {
    pub fn new(cooldown_cycles: u32) -> Self {
        Self { cooldown_cycles }
    }

    // Return the duty that should be applied this cycle,
    // None means the fan stays in auto mode
    pub fn decide(
        &self,
        state: &mut ControllerState,
        desired: FanSpeed,
    ) -> Option<FanSpeed> {
        let decreasing = match state.last_set_duty {
            Some(last) => desired < last,
            None => true,
        };

        if !decreasing {
            state.cooldown_counter = 0;
            return Some(desired);
        }

        state.cooldown_counter += 1;

        if state.cooldown_counter >= self.cooldown_cycles {
            state.cooldown_counter = 0;
            Some(desired)
        } else {
            info!(
                "Cooling down: cycle {}/{}",
                state.cooldown_counter, self.cooldown_cycles
            );

            state.last_set_duty
        }
    }
}
