use std::io::IsTerminal;
use std::sync::OnceLock;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

static INITIALISED: OnceLock<()> = OnceLock::new();

/// Environment variable consulted before `RUST_LOG` when building the filter.
pub const LOG_FILTER_ENV: &str = "SPIRAL_LOG";

/// Configures the global tracing subscriber.
///
/// The filter comes from `SPIRAL_LOG`, then `RUST_LOG`, and defaults to
/// `info`. Only the first successful call installs a subscriber; a call that
/// fails leaves nothing installed and may be retried.
pub fn init_tracing() -> Result<(), InitError> {
    if INITIALISED.get().is_some() {
        return Err(InitError::AlreadyInitialised);
    }

    let ansi = std::io::stderr().is_terminal();
    let filter = log_filter()?;
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_ansi(ansi);

    Registry::default()
        .with(filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|err| InitError::Subscriber(err.to_string()))?;
    INITIALISED
        .set(())
        .map_err(|_| InitError::AlreadyInitialised)
}

fn log_filter() -> Result<EnvFilter, InitError> {
    match std::env::var(LOG_FILTER_ENV) {
        Ok(raw) if !raw.trim().is_empty() => {
            EnvFilter::try_new(raw.trim()).map_err(|err| InitError::Filter(err.to_string()))
        }
        Ok(_) | Err(std::env::VarError::NotPresent) => {
            Ok(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        }
        Err(err) => Err(InitError::Env(err)),
    }
}

/// Errors emitted when configuring the tracing subscriber.
#[derive(Debug, thiserror::Error)]
pub enum InitError {
    #[error("tracing has already been initialised")]
    AlreadyInitialised,
    #[error("failed to read SPIRAL_LOG: {0}")]
    Env(std::env::VarError),
    #[error("invalid log filter: {0}")]
    Filter(String),
    #[error("failed to install the tracing subscriber: {0}")]
    Subscriber(String),
}
