use tracing_subscriber::{fmt, EnvFilter};

/// Log output format for the subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable lines for interactive runs.
    Human,
    /// JSON lines for log shippers.
    Json,
}

/// Initialize the global subscriber.
///
/// `RUST_LOG` wins when set; otherwise `default_level` applies (e.g. "info",
/// "wl_engine=debug,warn"). Safe to call multiple times (tests call it from
/// several entry points) -- subsequent calls are no-ops.
pub fn init(service_name: &str, default_level: &str, format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    match format {
        LogFormat::Human => {
            fmt()
                .with_env_filter(filter)
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .with_level(true)
                .try_init()
                .ok();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_level(true)
                .try_init()
                .ok();
        }
    }

    tracing::info!(service = service_name, format = ?format, "logging initialised");
}

/// Human-readable logging, the default for local runs.
pub fn init_logging(service_name: &str, default_level: &str) {
    init(service_name, default_level, LogFormat::Human);
}

/// JSON logging for deployments behind a log shipper.
pub fn init_logging_json(service_name: &str, default_level: &str) {
    init(service_name, default_level, LogFormat::Json);
}
