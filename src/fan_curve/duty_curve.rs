use crate::fan_curve::{CurvePoint, FanCurve, FanSpeed};

// Number of breakpoints of the duty curve
pub const BREAKPOINTS: usize = 4;

/// Piecewise-linear fan curve over four ascending temperature breakpoints.
///
/// Below the first breakpoint the curve is flat at the first duty, at or
/// above the last breakpoint it is flat at the last duty. Interpolated
/// values are rounded half away from zero.
#[derive(Debug, Clone)]
pub struct DutyCurve {
    points: [CurvePoint; BREAKPOINTS],
}

impl DutyCurve {
    // The points are expected to be strictly ascending in temperature,
    // the configuration loader validates this before building the curve
    pub fn new(points: [CurvePoint; BREAKPOINTS]) -> DutyCurve {
        Self { points }
    }

    pub fn points(&self) -> &[CurvePoint; BREAKPOINTS] {
        &self.points
    }
}

impl FanCurve for DutyCurve {
    fn get_speed(&self, temp: f32) -> FanSpeed {
        let first = self.points[0];

        if temp < first.temp {
            return first.fan_speed;
        }

        // Find the segment the temperature falls in
        for segment in self.points.windows(2) {
            let (pre, suc) = (segment[0], segment[1]);

            if pre.temp <= temp && temp < suc.temp {
                return linear_interpolation(pre, suc, temp);
            }
        }

        // Above the last breakpoint, NaN also ends up here
        self.points[BREAKPOINTS - 1].fan_speed
    }
}

// Perform the linear interpolation between
// two points and return the fan speed
fn linear_interpolation(pre: CurvePoint, suc: CurvePoint, temp: f32) -> FanSpeed {
    let x1 = pre.temp;
    let y1 = pre.fan_speed.get() as f32;
    let x2 = suc.temp;
    let y2 = suc.fan_speed.get() as f32;

    let speed = y1 + (y2 - y1) * (temp - x1) / (x2 - x1);

    FanSpeed::new(speed.round().clamp(0., 100.) as u8)
}
