use anyhow::{Context, Result};
use ecfan::{
    arg_parser::ArgsOptions,
    config::Config,
    control_loop::{ControlLoop, LoopSettings},
    ectool::EcTool,
    fan_curve::cooldown::HysteresisController,
    logger,
    sensors::SensorsCommand,
};
use tokio::signal::unix::{SignalKind, signal};
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use tracing::info;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    logger::init_logging();

    // Parse the command line arguments
    let args_options = ArgsOptions::parse();

    // A broken configuration stops the daemon before touching the fan
    let config = Config::load(&args_options.config_file_path)
        .with_context(|| "Failed to load the configuration")?;

    let mut control_loop = ControlLoop::new(
        SensorsCommand::new(&config.sensors_command),
        EcTool::new(&config.ectool_path, config.use_sudo),
        config.duty_curve(),
        HysteresisController::new(config.cooldown_cycles),
        LoopSettings::from_config(&config),
    );

    // This token and tracker will be used to handle graceful shutdown
    let tracker = TaskTracker::new();
    let token = CancellationToken::new();

    {
        let token = token.clone();

        tracker.spawn(async move {
            control_loop.run(token).await;
        });
    }

    wait_for_shutdown().await?;

    // Cancel the token to communicate the program
    // termination to the control loop
    token.cancel();

    // Wait for the fan to be handed back to the firmware
    tracker.close();
    tracker.wait().await;

    info!("Exiting fan control daemon");

    Ok(())
}

// Wait for any of the termination signals
async fn wait_for_shutdown() -> Result<()> {
    let mut terminate = signal(SignalKind::terminate())
        .with_context(|| "Failed to listen for SIGTERM")?;
    let mut interrupt = signal(SignalKind::interrupt())
        .with_context(|| "Failed to listen for SIGINT")?;
    let mut hangup = signal(SignalKind::hangup())
        .with_context(|| "Failed to listen for SIGHUP")?;

    let name = tokio::select! {
        _ = terminate.recv() => "SIGTERM",
        _ = interrupt.recv() => "SIGINT",
        _ = hangup.recv() => "SIGHUP",
    };

    info!("Caught {name}, resetting fan to auto mode");

    Ok(())
}
