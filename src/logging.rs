//! Logging setup for the server and the CLI
//!
//! Filter precedence: `RUST_LOG`, then `FAMILYHUB_LOG`, then [`DEFAULT_FILTER`].
//! `FAMILYHUB_LOG_JSON=1` switches stderr output to JSON lines.

use tracing_subscriber::{fmt, EnvFilter};

/// Hub and HTTP trace spans at info, dependencies at warn.
pub const DEFAULT_FILTER: &str = "warn,familyhub=info,tower_http=info";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl LogFormat {
    /// `1`, `true` or `json` select JSON; anything else is pretty.
    pub fn from_flag(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_ascii_lowercase()) {
            Some(v) if matches!(v.as_str(), "1" | "true" | "json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        }
    }
}

/// First directive that parses, in precedence order.
fn build_filter(rust_log: Option<&str>, familyhub_log: Option<&str>) -> EnvFilter {
    [rust_log, familyhub_log]
        .into_iter()
        .flatten()
        .filter(|d| !d.trim().is_empty())
        .find_map(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_FILTER))
}

pub fn init_logging() {
    let rust_log = std::env::var("RUST_LOG").ok();
    let familyhub_log = std::env::var("FAMILYHUB_LOG").ok();
    let env_filter = build_filter(rust_log.as_deref(), familyhub_log.as_deref());
    let format = LogFormat::from_flag(std::env::var("FAMILYHUB_LOG_JSON").ok().as_deref());

    let builder = fmt::Subscriber::builder()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr);
    let _ = match format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_flag_values() {
        assert_eq!(LogFormat::from_flag(None), LogFormat::Pretty);
        assert_eq!(LogFormat::from_flag(Some("0")), LogFormat::Pretty);
        assert_eq!(LogFormat::from_flag(Some("1")), LogFormat::Json);
        assert_eq!(LogFormat::from_flag(Some(" JSON ")), LogFormat::Json);
        assert_eq!(LogFormat::from_flag(Some("true")), LogFormat::Json);
    }

    #[test]
    fn filter_precedence() {
        assert_eq!(build_filter(Some("debug"), Some("error")).to_string(), "debug");
        assert_eq!(build_filter(None, Some("familyhub=trace")).to_string(), "familyhub=trace");
        assert_eq!(build_filter(Some(""), Some(" ")).to_string(), EnvFilter::new(DEFAULT_FILTER).to_string());
    }
}
