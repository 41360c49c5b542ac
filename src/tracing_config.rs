//! Tracing subscriber configuration
//!
//! The library only emits events. The binary calls [`TracingConfig::init`]
//! once at startup. Every layer writes to stderr so stdout carries nothing
//! but the encoded image.

#[cfg(feature = "cli")]
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

/// Environment variable that overrides the verbosity-derived filter
pub const LOG_FILTER_ENV: &str = "RUST_LOG";

/// Output format for log lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TracingFormat {
    /// Human-readable compact lines, colored when stderr is a terminal
    #[default]
    Console,
    /// JSON lines for log collectors
    #[cfg(feature = "tracing-json")]
    Json,
}

/// Tracing configuration builder
#[derive(Debug, Default)]
pub struct TracingConfig {
    /// Verbosity level (number of `-v` flags)
    pub verbosity: u8,
    pub format: TracingFormat,
    /// Explicit filter directive; takes precedence over verbosity
    pub env_filter: Option<String>,
    /// Correlation id logged at startup
    pub session_id: Option<String>,
}

impl TracingConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_verbosity(mut self, verbosity: u8) -> Self {
        self.verbosity = verbosity;
        self
    }

    #[must_use]
    pub fn with_format(mut self, format: TracingFormat) -> Self {
        self.format = format;
        self
    }

    #[must_use]
    pub fn with_env_filter<S: Into<String>>(mut self, filter: S) -> Self {
        self.env_filter = Some(filter.into());
        self
    }

    #[must_use]
    pub fn with_session_id<S: Into<String>>(mut self, session_id: S) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Map verbosity to a filter directive
    ///
    /// The default stays at `warn` so a successful run leaves stderr empty.
    #[must_use]
    pub fn verbosity_to_filter(&self) -> &'static str {
        match self.verbosity {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }

    /// Filter directive actually used: explicit filter, else verbosity
    #[must_use]
    pub fn effective_filter(&self) -> String {
        self.env_filter
            .clone()
            .filter(|f| !f.trim().is_empty())
            .unwrap_or_else(|| self.verbosity_to_filter().to_string())
    }

    /// Parse the effective filter
    ///
    /// A malformed explicit filter is replaced by the verbosity filter; the
    /// parse error is returned alongside so it can be logged once the
    /// subscriber is up.
    #[cfg(feature = "cli")]
    pub fn build_filter(&self) -> (EnvFilter, Option<String>) {
        match EnvFilter::try_new(self.effective_filter()) {
            Ok(filter) => (filter, None),
            Err(err) => (
                EnvFilter::new(self.verbosity_to_filter()),
                Some(format!("{}: {err}", self.effective_filter())),
            ),
        }
    }

    /// Install the global subscriber
    ///
    /// # Errors
    /// - A global subscriber is already installed
    #[cfg(feature = "cli")]
    pub fn init(self) -> anyhow::Result<()> {
        use tracing_subscriber::fmt;

        let (filter, rejected) = self.build_filter();
        let registry = Registry::default().with(filter);

        match self.format {
            TracingFormat::Console => {
                let fmt_layer = fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_ansi(std::io::IsTerminal::is_terminal(&std::io::stderr()))
                    .with_target(false)
                    .with_level(true)
                    .compact();
                registry.with(fmt_layer).try_init()?;
            },
            #[cfg(feature = "tracing-json")]
            TracingFormat::Json => {
                let fmt_layer = fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_current_span(true)
                    .with_span_list(true);
                registry.with(fmt_layer).try_init()?;
            },
        }

        if let Some(rejected) = rejected {
            tracing::warn!("Ignoring invalid {LOG_FILTER_ENV} filter '{rejected}'");
        }
        if let Some(session_id) = &self.session_id {
            tracing::debug!(session_id = %session_id, "Invocation session started");
        }

        Ok(())
    }
}

/// Initialize tracing with CLI defaults, honoring `RUST_LOG`
///
/// # Errors
/// - See [`TracingConfig::init`]
#[cfg(feature = "cli")]
pub fn init_cli_tracing(verbosity: u8, json: bool) -> anyhow::Result<()> {
    let mut config = TracingConfig::new()
        .with_verbosity(verbosity)
        .with_format(cli_format(json))
        .with_session_id(uuid::Uuid::new_v4().to_string());

    if let Ok(filter) = std::env::var(LOG_FILTER_ENV) {
        config = config.with_env_filter(filter);
    }

    config.init()?;
    if json && !cfg!(feature = "tracing-json") {
        tracing::warn!("JSON logging requires the tracing-json feature, using console output");
    }
    Ok(())
}

#[cfg(feature = "cli")]
fn cli_format(json: bool) -> TracingFormat {
    #[cfg(feature = "tracing-json")]
    if json {
        return TracingFormat::Json;
    }
    let _ = json;
    TracingFormat::Console
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_mapping() {
        let filters: Vec<&str> = (0..5)
            .map(|v| TracingConfig::new().with_verbosity(v).verbosity_to_filter())
            .collect();
        assert_eq!(filters, vec!["warn", "info", "debug", "trace", "trace"]);
    }

    #[test]
    fn test_explicit_filter_wins() {
        let config = TracingConfig::new()
            .with_verbosity(3)
            .with_env_filter("bgremove_invoker=debug");
        assert_eq!(config.effective_filter(), "bgremove_invoker=debug");
    }

    #[test]
    fn test_blank_filter_is_ignored() {
        let config = TracingConfig::new().with_verbosity(1).with_env_filter("  ");
        assert_eq!(config.effective_filter(), "info");
    }

    #[cfg(feature = "cli")]
    #[test]
    fn test_malformed_filter_falls_back_to_verbosity() {
        let config = TracingConfig::new()
            .with_verbosity(1)
            .with_env_filter("bgremove_invoker=verbose");
        let (filter, rejected) = config.build_filter();
        assert_eq!(
            filter.max_level_hint(),
            Some(tracing_subscriber::filter::LevelFilter::INFO)
        );
        assert!(rejected.unwrap().starts_with("bgremove_invoker=verbose"));

        let (_, rejected) = TracingConfig::new()
            .with_env_filter("bgremove_invoker=debug")
            .build_filter();
        assert!(rejected.is_none());
    }

    #[test]
    fn test_default_format() {
        assert_eq!(TracingConfig::default().format, TracingFormat::Console);
    }
}
