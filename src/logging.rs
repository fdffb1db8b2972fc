use tracing::Level;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::{ConsoleError, Result};

/// Sets up the logging subscriber for the console client.
///
/// `RUST_LOG` wins when set; otherwise `component` logs at INFO, or DEBUG
/// when `verbose` is on. `json` switches to one JSON object per line.
pub fn init_logger(component: &str, verbose: bool, json: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{}={}", component, level)));

    let registry = tracing_subscriber::registry().with(env_filter);

    let initialized = if json {
        registry
            .with(fmt::layer().json().with_target(true).with_writer(std::io::stderr))
            .try_init()
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_file(true)
                    .with_line_number(true)
                    .with_level(true)
                    .with_ansi(true)
                    .with_writer(std::io::stderr)
                    .compact(),
            )
            .try_init()
    };

    initialized.map_err(|e| ConsoleError::Config(format!("Failed to initialize logger: {}", e)))
}
