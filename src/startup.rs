//! One-time checks before the control loop starts.

use crate::config::UserConfig;
use crate::connectivity::ConnectivityProbe;
use crate::error::{Error, Result, Severity};
use std::path::Path;
use tracing::{error, info, instrument};

/// Verifies connectivity, then loads and validates the configuration.
///
/// Logs where the program runs from, which config it reads and what the config
/// contains (without the password).
///
/// # Errors
///
/// - [`Error::NoConnectivity`] if the probe fails
/// - any configuration error from [`UserConfig::load`]
#[instrument(name = "startup::prepare", skip_all, fields(config_path = %config_path.display()))]
pub async fn prepare(config_path: &Path, probe: &dyn ConnectivityProbe) -> Result<UserConfig> {
    if let Ok(cwd) = std::env::current_dir() {
        info!("Program run from {}.", cwd.display());
    }

    let shown_path = std::path::absolute(config_path).unwrap_or_else(|_| config_path.to_path_buf());
    info!("Loading config from {}.", shown_path.display());

    if !probe.is_online().await {
        error!("No Internet connection when loading config.");
        return Err(Error::NoConnectivity);
    }

    let config = UserConfig::load(config_path)?;

    info!(
        "Loaded config with username {} at IMAP {}.",
        config.username(),
        config.imap_url()
    );
    for address in config.whitelist() {
        info!("Read whitelisted email {address}.");
    }

    Ok(config)
}

/// Line logged when the process stops on `error`, including its causes.
///
/// Fatal errors need an operator; anything else that escapes to the top level
/// is unexpected, and the next start may succeed.
#[must_use]
pub fn exit_line(error: &Error) -> String {
    match error.severity() {
        Severity::Fatal => format!("Fatal exception: {}. Restarting device.", error.detail()),
        Severity::NonFatal => format!("Unexpected exception: {}. Restarting device.", error.detail()),
    }
}
