pub mod config;
pub mod controller;
pub mod game;
pub mod hardware;
pub mod hmi;
pub mod motion;
pub mod serial;

use crate::config::AppConfig;
use crate::controller::ControllerHandle;
use crate::game::{spawn_button_watch, Game, GameHandle};
use crate::hardware::{GpioBallDropSensor, GpioStopButton, PwmServo};
use crate::hmi::TracingHmi;
use crate::motion::CENTER_PULSE_US;
use crate::serial::{CommandChannel, UartPort};
use color_eyre::{eyre::eyre, Result};
use rppal::gpio::Gpio;
use std::path::PathBuf;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    setup()?;

    let (config_path, path_fallback) =
        AppConfig::locate(std::env::args_os().nth(1).map(PathBuf::from));
    let content = AppConfig::read(&config_path).await?;
    setup_logging(
        content
            .as_deref()
            .map(AppConfig::peek_log_level)
            .unwrap_or(Level::INFO),
    );
    if path_fallback {
        warn!(
            "Could not determine config directory, using {}",
            config_path.display()
        );
    }

    let config = match content {
        Some(content) => {
            let config = AppConfig::parse(&content, &config_path)?;
            info!("Loaded configuration from {}", config_path.display());
            config
        }
        None => {
            warn!(
                "No configuration at {}, using defaults",
                config_path.display()
            );
            AppConfig::default()
        }
    }
    .validated()?;

    // Serial link to the hand controller; no game without it
    let port = UartPort::open(&config.serial.device, config.serial.baud_rate)
        .map_err(|e| eyre!("Failed to open serial port: {}", e))?;
    let channel = CommandChannel::new(Box::new(port), config.serial.max_line_bytes);
    let controller = match ControllerHandle::connect(channel, config.controller.link_params()).await
    {
        Ok(controller) => controller,
        Err(e) => {
            error!("Controller link failed: {}", e);
            return Err(eyre!("Controller link failed: {}", e));
        }
    };

    let hw = &config.hardware;
    let gpio = Gpio::new().map_err(|e| eyre!("Failed to access GPIO: {}", e))?;
    let x_servo = PwmServo::new(hw.x_pwm_channel, hw.min_pulse_us, hw.max_pulse_us, CENTER_PULSE_US)
        .map_err(|e| eyre!("Failed to set up X servo: {}", e))?;
    let y_servo = PwmServo::new(hw.y_pwm_channel, hw.min_pulse_us, hw.max_pulse_us, CENTER_PULSE_US)
        .map_err(|e| eyre!("Failed to set up Y servo: {}", e))?;
    let ball_drop = GpioBallDropSensor::new(&gpio, hw.ball_drop_pin, hw.ball_drop_active_low)
        .map_err(|e| eyre!("Failed to set up ball drop sensor: {}", e))?;
    let stop_button = GpioStopButton::new(&gpio, hw.stop_button_pin)
        .map_err(|e| eyre!("Failed to set up stop button: {}", e))?;

    let game = Game::new(
        config.game.clone(),
        Box::new(x_servo),
        Box::new(y_servo),
        Box::new(ball_drop),
    );
    let game_handle = GameHandle::spawn(game, controller.clone(), Box::new(TracingHmi::new()));
    let button_watch = spawn_button_watch(Box::new(stop_button), game_handle.clone());

    info!("Maze ready");

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result.map_err(|e| eyre!("Failed to wait for shutdown signal: {}", e))?;
            info!("Shutting down");
        }
        _ = button_watch => {
            warn!("Stop button watch ended");
        }
    }

    if !game_handle.is_running() {
        warn!("Game task had already ended");
    }
    if !controller.is_running() {
        warn!("Controller link task had already ended");
    }
    Ok(())
}

fn setup() -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info")
    }
    Ok(())
}

fn setup_logging(level: Level) {
    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .pretty()
        .init();
}
