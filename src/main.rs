//! Device entry point.
//!
//! Settings come from the environment:
//!
//! - `COMPANION_CUBE_CONFIG` - config file (default `cfg/config.toml`)
//! - `COMPANION_CUBE_LOG` - log file (default `app.log`)
//! - `COMPANION_CUBE_SWITCH` - GPIO value file of the switch
//! - `COMPANION_CUBE_SWITCH_ACTIVE_LOW` - set to `1` for pull-up wiring
//! - `COMPANION_CUBE_LED` - GPIO value file of the LED
//! - `COMPANION_CUBE_LIGHT_SENSOR` - ADC value file of the light sensor
//! - `RUST_LOG` - log filter (default `companion_cube=info`)
//!
//! Peripherals without a configured path are treated as not fitted: the switch
//! is never pressed, the LED drives nothing, and a missing light sensor reads as
//! full light so the display stays awake.

use companion_cube::hardware::{
    FileLightSensor, FixedLightSensor, Led, LightSensor, Switch, SysfsLed, SysfsSwitch, Unwired,
};
use companion_cube::logging::{self, AppendLog};
use companion_cube::{
    startup, ControlLoop, Fetcher, ImapTransport, LoopConfig, Peripherals, Result, TcpProbe,
    TerminalDisplay, TimeoutConfig,
};
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};

const DEFAULT_CONFIG_PATH: &str = "cfg/config.toml";
const DEFAULT_LOG_PATH: &str = "app.log";

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let log_path =
        env::var_os("COMPANION_CUBE_LOG").map_or_else(|| DEFAULT_LOG_PATH.into(), PathBuf::from);
    let log = match AppendLog::open(log_path) {
        Ok(log) => log,
        Err(e) => {
            eprintln!("{}", startup::exit_line(&e));
            return ExitCode::FAILURE;
        }
    };
    logging::init(log);

    match start().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", startup::exit_line(&e));
            ExitCode::FAILURE
        }
    }
}

async fn start() -> Result<()> {
    let config_path = env::var_os("COMPANION_CUBE_CONFIG")
        .map_or_else(|| DEFAULT_CONFIG_PATH.into(), PathBuf::from);

    let config = startup::prepare(&config_path, &TcpProbe::default()).await?;

    let display = TerminalDisplay::stdout()?;
    info!("Successfully loaded display.");

    let peripherals = Peripherals {
        switch: open_switch()?,
        light_sensor: open_light_sensor()?,
        led: open_led()?,
        display: Box::new(display),
    };

    let fetcher = Fetcher::new(
        TcpProbe::default(),
        ImapTransport::new(TimeoutConfig::default()),
    );

    ControlLoop::new(config, LoopConfig::default(), fetcher, peripherals)
        .run()
        .await;

    Ok(())
}

fn open_switch() -> Result<Box<dyn Switch>> {
    let Some(path) = env::var_os("COMPANION_CUBE_SWITCH") else {
        info!("No switch configured, debug mode is unavailable.");
        return Ok(Box::new(Unwired));
    };
    let active_low = env::var("COMPANION_CUBE_SWITCH_ACTIVE_LOW").is_ok_and(|v| v == "1");
    Ok(Box::new(SysfsSwitch::open(path, active_low)?))
}

fn open_light_sensor() -> Result<Box<dyn LightSensor>> {
    let Some(path) = env::var_os("COMPANION_CUBE_LIGHT_SENSOR") else {
        info!("No light sensor configured, display stays awake.");
        return Ok(Box::new(FixedLightSensor::BRIGHT));
    };
    Ok(Box::new(FileLightSensor::open(path)?))
}

fn open_led() -> Result<Box<dyn Led>> {
    let Some(path) = env::var_os("COMPANION_CUBE_LED") else {
        info!("No LED configured.");
        return Ok(Box::new(Unwired));
    };
    Ok(Box::new(SysfsLed::open(path)?))
}
