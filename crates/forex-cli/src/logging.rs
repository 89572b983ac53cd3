//! Tracing setup for the binaries

use tracing_subscriber::{EnvFilter, fmt};

pub const DEFAULT_LOG_LEVEL: &str = "debug";

/// Filter directive: `RUST_LOG`, else `LOG_LEVEL`, else `debug`
fn directive(rust_log: Option<String>, log_level: Option<String>) -> String {
    if let Some(rust_log) = rust_log.filter(|v| !v.trim().is_empty()) {
        return rust_log;
    }
    match log_level.map(|l| l.trim().to_lowercase()).as_deref() {
        Some("warning") => "warn".to_string(),
        Some("critical") | Some("fatal") => "error".to_string(),
        Some(level) if !level.is_empty() => level.to_string(),
        _ => DEFAULT_LOG_LEVEL.to_string(),
    }
}

pub fn init_tracing() {
    let directive = directive(
        std::env::var("RUST_LOG").ok(),
        std::env::var("LOG_LEVEL").ok(),
    );
    let filter = EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_LEVEL));
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(true)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directive_precedence() {
        assert_eq!(
            directive(Some("forex_a2a=trace".into()), Some("INFO".into())),
            "forex_a2a=trace"
        );
        assert_eq!(directive(None, Some("INFO".into())), "info");
        assert_eq!(directive(Some("".into()), None), "debug");
        assert_eq!(directive(None, None), "debug");
    }

    #[test]
    fn test_long_level_names() {
        assert_eq!(directive(None, Some("WARNING".into())), "warn");
        assert_eq!(directive(None, Some("CRITICAL".into())), "error");
    }
}
