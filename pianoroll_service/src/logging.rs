// Process-wide tracing setup.
//
// The configured `log` value (DEBUG, INFO, WARN, ERROR, FATAL) becomes the
// default filter directive. `RUST_LOG`, when set and parseable, takes
// precedence so a single module can be turned up without editing the config.
// FATAL has no tracing level of its own and maps to error.

use tracing_subscriber::EnvFilter;

/// Map a configured verbosity name to a tracing filter directive.
/// Case-insensitive; `None` for unknown names.
pub fn log_directive(level: &str) -> Option<&'static str> {
    match level.trim().to_ascii_uppercase().as_str() {
        "DEBUG" => Some("debug"),
        "INFO" => Some("info"),
        "WARN" | "WARNING" => Some("warn"),
        "ERROR" | "FATAL" => Some("error"),
        _ => None,
    }
}

/// Install the global subscriber. A second call is a no-op, which keeps
/// tests that start several servers from tripping over each other.
pub fn init_logging(level: &str) {
    let directive = log_directive(level).unwrap_or("info");
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
