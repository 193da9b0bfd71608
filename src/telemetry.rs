//! Tracing subscriber setup for binaries and tools embedding the aligner.
//!
//! The library itself only emits events; call [`init_tracing`] once from the
//! application that wants to see them.
//!
//! ## Environment
//!
//! - `RUST_LOG`: filter directives (default: `block_aligner=info`)
//! - `LOG_FORMAT`: `json` for structured logs, `pretty` for development
//!   (default: `json`)

use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::{SubscriberInitExt, TryInitError},
    EnvFilter,
};

/// Default filter when `RUST_LOG` is not set.
pub const DEFAULT_FILTER: &str = "block_aligner=info";

/// Output format of the installed subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per event.
    Json,
    /// Human-readable multi-line output.
    Pretty,
}

impl LogFormat {
    /// Read `LOG_FORMAT`, defaulting to JSON.
    pub fn from_env() -> Self {
        Self::parse(std::env::var("LOG_FORMAT").ok().as_deref())
    }

    fn parse(value: Option<&str>) -> Self {
        match value {
            Some(v) if v.eq_ignore_ascii_case("pretty") => Self::Pretty,
            _ => Self::Json,
        }
    }
}

/// Install a global subscriber configured from the environment.
///
/// Fails if a global subscriber is already installed.
pub fn init_tracing() -> Result<(), TryInitError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into());

    match LogFormat::from_env() {
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_span_events(FmtSpan::CLOSE),
            )
            .try_init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_current_span(true)
                    .with_span_events(FmtSpan::CLOSE)
                    .flatten_event(true),
            )
            .try_init(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_parsing() {
        assert_eq!(LogFormat::parse(None), LogFormat::Json);
        assert_eq!(LogFormat::parse(Some("json")), LogFormat::Json);
        assert_eq!(LogFormat::parse(Some("PRETTY")), LogFormat::Pretty);
        assert_eq!(LogFormat::parse(Some("xml")), LogFormat::Json);
    }

    #[test]
    fn test_second_init_fails() {
        // Another test may have installed a subscriber first.
        let _ = init_tracing();
        assert!(init_tracing().is_err());
    }
}
