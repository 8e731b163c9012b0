use std::time::Duration;

use tokio::select;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, trace_span, warn};

use crate::{
    config::Config,
    ectool::FanActuator,
    fan_curve::{
        FanCurve, FanSpeed,
        cooldown::{ControllerState, HysteresisController},
        duty_curve::DutyCurve,
    },
    fan_override::FanOverride,
    sensors::TemperatureSource,
    status::{SeverityThresholds, StatusSummary, TemperatureStats},
};

// Delay between forcing auto mode and the first cycle
const SETTLE_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopPhase {
    Starting,
    Running,
    Terminating,
}

#[derive(Debug, Clone, Copy)]
pub struct LoopSettings {
    pub update_interval: Duration,
    pub settle_delay: Duration,
    pub severity: SeverityThresholds,
}

impl LoopSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            update_interval: config.update_interval(),
            settle_delay: SETTLE_DELAY,
            severity: SeverityThresholds {
                elevated: config.low_temp_2,
                hot: config.low_temp_4,
                critical: config.high_temp,
            },
        }
    }
}

// Periodically map the CPU temperature to a fan duty
pub struct ControlLoop<S, A, C = DutyCurve>
where
    S: TemperatureSource,
    A: FanActuator,
    C: FanCurve,
{
    source: S,
    fan: FanOverride<A>,

    curve: C,
    hysteresis: HysteresisController,
    state: ControllerState,

    settings: LoopSettings,
    phase: LoopPhase,
}

impl<S, A, C> ControlLoop<S, A, C>
where
    S: TemperatureSource,
    A: FanActuator,
    C: FanCurve,
{
    pub fn new(
        source: S,
        actuator: A,
        curve: C,
        hysteresis: HysteresisController,
        settings: LoopSettings,
    ) -> Self {
        // Start from the lowest duty of the curve, the
        // start-up phase immediately switches to auto mode
        let state = ControllerState::new(curve.get_speed(f32::NEG_INFINITY));

        Self {
            source,
            fan: FanOverride::new(actuator),
            curve,
            hysteresis,
            state,
            settings,
            phase: LoopPhase::Starting,
        }
    }

    pub fn phase(&self) -> LoopPhase {
        self.phase
    }

    pub fn state(&self) -> &ControllerState {
        &self.state
    }

    // Run the control loop until the token is cancelled,
    // the fan is always left in auto mode when this returns
    pub async fn run(&mut self, run_token: CancellationToken) {
        info!("Control loop: Starting");

        self.start();

        let settled = select! {
            biased;

            _ = run_token.cancelled() => false,
            _ = tokio::time::sleep(self.settings.settle_delay) => true,
        };

        if settled {
            self.phase = LoopPhase::Running;
            info!("Control loop: Running");

            loop {
                {
                    let _guard = trace_span!("updating").entered();
                    self.step();
                }

                select! {
                    biased;

                    _ = run_token.cancelled() => break,
                    _ = tokio::time::sleep(self.settings.update_interval) => {}
                }
            }
        }

        info!("Control loop: Quitting");

        self.terminate();
    }

    // Force auto mode and forget any previously applied duty
    pub fn start(&mut self) {
        self.phase = LoopPhase::Starting;
        self.fan.engage();
        self.state.set_auto();
    }

    // Run a single control cycle
    pub fn step(&mut self) {
        if self.phase == LoopPhase::Terminating {
            warn!("Control loop step requested after termination");
            return;
        }

        let temps = self.source.read();

        let Some(stats) = TemperatureStats::from_readings(&temps) else {
            warn!("No valid temperature data. Fan remains in current state");
            return;
        };

        let desired = self.curve.get_speed(stats.max);
        let applied = self.hysteresis.decide(&mut self.state, desired);

        trace!(
            "Highest temperature {:.1}°C - desired duty: {} - applied: {:?}",
            stats.max, desired, applied
        );

        if let Some(duty) = applied {
            self.apply(duty);
        }

        StatusSummary {
            stats,
            rpm: self.fan.actuator_mut().get_rpm(),
            duty: self.state.last_set_duty,
            severity: self.settings.severity.rate(stats.max),
        }
        .log();
    }

    // Hand the fan back to the firmware, calling this again does nothing
    pub fn terminate(&mut self) {
        self.phase = LoopPhase::Terminating;
        self.fan.release();
        self.state.set_auto();
    }

    fn apply(&mut self, duty: FanSpeed) {
        if self.state.last_set_duty == Some(duty) {
            debug!("Fan duty already set to {duty}");
            return;
        }

        // Leave the state untouched on failure so
        // the next cycle retries the same duty
        match self.fan.actuator_mut().set_duty(duty) {
            Ok(()) => {
                self.state.last_set_duty = Some(duty);
                info!("Fan duty set to {duty}");
            }
            Err(err) => error!("Failed to set fan duty: {err}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, collections::VecDeque, rc::Rc};

    use super::*;
    use crate::errors::ActuatorError;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Call {
        Auto,
        Duty(u8),
    }

    type CallLog = Rc<RefCell<Vec<Call>>>;

    // Replays a scripted list of readings, cancels the
    // token once the script is exhausted
    struct ScriptedSource {
        readings: VecDeque<Vec<f32>>,
        token: Option<CancellationToken>,
    }

    impl TemperatureSource for ScriptedSource {
        fn read(&mut self) -> Vec<f32> {
            let temps = self.readings.pop_front().unwrap_or_default();

            if self.readings.is_empty() {
                if let Some(token) = &self.token {
                    token.cancel();
                }
            }

            temps
        }
    }

    struct RecordingActuator {
        calls: CallLog,
        // Number of upcoming set_duty calls that fail
        failures: u32,
    }

    impl FanActuator for RecordingActuator {
        fn set_auto(&mut self) -> Result<(), ActuatorError> {
            self.calls.borrow_mut().push(Call::Auto);
            Ok(())
        }

        fn set_duty(&mut self, duty: FanSpeed) -> Result<(), ActuatorError> {
            if self.failures > 0 {
                self.failures -= 1;
                return Err(ActuatorError::Spawn {
                    command: "ectool fanduty".to_string(),
                    source: std::io::Error::other("permission denied"),
                });
            }

            self.calls.borrow_mut().push(Call::Duty(duty.get()));
            Ok(())
        }

        fn get_rpm(&mut self) -> Option<u32> {
            Some(2000)
        }
    }

    fn curve() -> DutyCurve {
        DutyCurve::new([
            (40., 20).into(),
            (60., 40).into(),
            (75., 70).into(),
            (85., 100).into(),
        ])
    }

    fn settings() -> LoopSettings {
        LoopSettings {
            update_interval: Duration::ZERO,
            settle_delay: Duration::ZERO,
            severity: SeverityThresholds {
                elevated: 60.,
                hot: 85.,
                critical: 95.,
            },
        }
    }

    fn control_loop(
        readings: Vec<Vec<f32>>,
        cooldown_cycles: u32,
        failures: u32,
    ) -> (ControlLoop<ScriptedSource, RecordingActuator>, CallLog) {
        let calls = CallLog::default();
        let source = ScriptedSource {
            readings: readings.into(),
            token: None,
        };
        let actuator = RecordingActuator {
            calls: calls.clone(),
            failures,
        };

        let control_loop = ControlLoop::new(
            source,
            actuator,
            curve(),
            HysteresisController::new(cooldown_cycles),
            settings(),
        );

        (control_loop, calls)
    }

    fn duty(control_loop: &ControlLoop<ScriptedSource, RecordingActuator>) -> Option<u8> {
        control_loop.state().last_set_duty.map(|d| d.get())
    }

    #[test]
    fn start_forces_auto_mode() {
        let (mut control_loop, calls) = control_loop(vec![], 1, 0);
        assert_eq!(duty(&control_loop), Some(20));

        control_loop.start();

        assert_eq!(*calls.borrow(), vec![Call::Auto]);
        assert_eq!(duty(&control_loop), None);
        assert_eq!(control_loop.phase(), LoopPhase::Starting);
    }

    #[test]
    fn applies_interpolated_duties() {
        let readings = vec![vec![30.], vec![62., 65.], vec![65.], vec![50., 48.]];
        let (mut control_loop, calls) = control_loop(readings, 1, 0);
        control_loop.start();

        let mut applied = Vec::new();
        for _ in 0..4 {
            control_loop.step();
            applied.push(duty(&control_loop));
        }

        assert_eq!(applied, vec![Some(20), Some(50), Some(50), Some(30)]);
        assert_eq!(
            *calls.borrow(),
            vec![Call::Auto, Call::Duty(20), Call::Duty(50), Call::Duty(30)]
        );
    }

    #[test]
    fn holds_auto_mode_during_cooldown() {
        let readings = vec![vec![70.], vec![70.], vec![70.]];
        let (mut control_loop, calls) = control_loop(readings, 3, 0);
        control_loop.start();

        control_loop.step();
        control_loop.step();
        assert_eq!(duty(&control_loop), None);
        assert_eq!(*calls.borrow(), vec![Call::Auto]);

        control_loop.step();
        assert_eq!(duty(&control_loop), Some(60));
    }

    #[test]
    fn empty_reading_keeps_state() {
        let readings = vec![vec![80.], vec![], vec![]];
        let (mut control_loop, calls) = control_loop(readings, 1, 0);
        control_loop.start();

        control_loop.step();
        let state = *control_loop.state();

        control_loop.step();
        control_loop.step();

        assert_eq!(*control_loop.state(), state);
        assert_eq!(*calls.borrow(), vec![Call::Auto, Call::Duty(85)]);
    }

    #[test]
    fn failed_actuation_is_retried() {
        let readings = vec![vec![80.], vec![80.]];
        let (mut control_loop, calls) = control_loop(readings, 1, 1);
        control_loop.start();

        control_loop.step();
        assert_eq!(duty(&control_loop), None);

        control_loop.step();
        assert_eq!(duty(&control_loop), Some(85));
        assert_eq!(*calls.borrow(), vec![Call::Auto, Call::Duty(85)]);
    }

    #[test]
    fn terminate_is_idempotent() {
        let (mut control_loop, calls) = control_loop(vec![vec![80.]], 1, 0);
        control_loop.start();
        control_loop.step();

        control_loop.terminate();
        control_loop.terminate();
        drop(control_loop);

        assert_eq!(
            *calls.borrow(),
            vec![Call::Auto, Call::Duty(85), Call::Auto]
        );
    }

    #[test]
    fn step_after_termination_does_nothing() {
        let (mut control_loop, calls) = control_loop(vec![vec![80.]], 1, 0);
        control_loop.start();
        control_loop.terminate();

        control_loop.step();

        assert_eq!(control_loop.phase(), LoopPhase::Terminating);
        assert_eq!(*calls.borrow(), vec![Call::Auto, Call::Auto]);
    }

    #[test]
    fn dropping_a_running_loop_restores_auto_mode() {
        let (mut control_loop, calls) = control_loop(vec![vec![80.]], 1, 0);
        control_loop.start();
        control_loop.step();

        drop(control_loop);

        assert_eq!(calls.borrow().last(), Some(&Call::Auto));
    }

    #[tokio::test]
    async fn run_until_cancelled() {
        let token = CancellationToken::new();
        let (mut control_loop, calls) =
            control_loop(vec![vec![30.], vec![65.], vec![65.], vec![50.]], 1, 0);
        control_loop.source.token = Some(token.clone());

        control_loop.run(token).await;

        assert_eq!(control_loop.phase(), LoopPhase::Terminating);
        assert_eq!(duty(&control_loop), None);
        assert_eq!(
            *calls.borrow(),
            vec![
                Call::Auto,
                Call::Duty(20),
                Call::Duty(50),
                Call::Duty(30),
                Call::Auto
            ]
        );
    }

    #[tokio::test]
    async fn cancelled_before_start_only_toggles_auto_mode() {
        let token = CancellationToken::new();
        token.cancel();

        let (mut control_loop, calls) = control_loop(vec![vec![80.]], 1, 0);
        control_loop.run(token).await;

        assert_eq!(control_loop.phase(), LoopPhase::Terminating);
        assert_eq!(*calls.borrow(), vec![Call::Auto, Call::Auto]);
    }

    // Cancel the token shortly after the loop started waiting
    fn cancel_soon(token: &CancellationToken) {
        let token = token.clone();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            token.cancel();
        });
    }

    #[tokio::test]
    async fn cancellation_interrupts_update_interval() {
        let token = CancellationToken::new();
        let (mut control_loop, calls) = control_loop(vec![vec![80.]], 1, 0);
        control_loop.settings.update_interval = Duration::from_secs(3600);

        cancel_soon(&token);

        tokio::time::timeout(Duration::from_secs(2), control_loop.run(token))
            .await
            .expect("control loop kept sleeping after cancellation");

        assert_eq!(control_loop.phase(), LoopPhase::Terminating);
        assert_eq!(
            *calls.borrow(),
            vec![Call::Auto, Call::Duty(85), Call::Auto]
        );
    }

    #[tokio::test]
    async fn cancellation_interrupts_settle_delay() {
        let token = CancellationToken::new();
        let (mut control_loop, calls) = control_loop(vec![vec![80.]], 1, 0);
        control_loop.settings.settle_delay = Duration::from_secs(3600);

        cancel_soon(&token);

        tokio::time::timeout(Duration::from_secs(2), control_loop.run(token))
            .await
            .expect("control loop kept settling after cancellation");

        assert_eq!(control_loop.phase(), LoopPhase::Terminating);
        assert_eq!(*calls.borrow(), vec![Call::Auto, Call::Auto]);
    }
}
