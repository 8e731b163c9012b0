pub mod cooldown;
pub mod duty_curve;

use std::fmt;

pub trait FanCurve {
    // Return the fan speed for the given temperature
    fn get_speed(&self, temp: f32) -> FanSpeed;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct FanSpeed {
    speed: u8,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CurvePoint {
    pub temp: f32,
    pub fan_speed: FanSpeed,
}

impl FanSpeed {
    // Generate a new fan speed point
    // automatically clamp the given value between 0 and 100
    pub fn new(speed: u8) -> FanSpeed {
        FanSpeed {
            speed: speed.clamp(0, 100),
        }
    }

    // Return the stored fan speed
    pub fn get(&self) -> u8 {
        self.speed
    }
}

impl fmt::Display for FanSpeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.speed)
    }
}

impl From<(f32, u8)> for CurvePoint {
    fn from(value: (f32, u8)) -> Self {
        Self {
            temp: value.0,
            fan_speed: FanSpeed::new(value.1),
        }
    }
}
