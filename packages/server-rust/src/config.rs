//! Runtime configuration for routekit services.
//!
//! Parsed from command-line flags with environment-variable fallbacks.
//! Only values that can be expressed as data live here; the unhandled-error
//! hook is attached programmatically via [`TerminatorConfig::with_hook`].

use std::sync::Arc;

use clap::{ArgAction, Parser, ValueEnum};

use crate::controller::{Container, Resolution};
use crate::terminator::TerminatorConfig;

/// Output format of the log subscriber.
#[derive(ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per event.
    Json,
}

/// How controller instances are obtained.
#[derive(ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ResolutionMode {
    /// Construct a fresh instance per controller creation.
    Direct,
    /// Construct once per controller type and share it.
    #[default]
    Memoized,
    /// Look instances up in a dependency container.
    Container,
}

/// Top-level service configuration.
#[derive(Parser, Debug, Clone)]
#[command(name = "routekit", version, about = "routekit handler pipeline")]
pub struct RoutekitConfig {
    /// Expose fault messages and debug detail in 500 responses.
    #[arg(
        long = "dev-mode",
        env = "ROUTEKIT_DEV_MODE",
        action = ArgAction::Set,
        default_value_t = true
    )]
    pub dev_mode: bool,

    /// Log output format.
    #[arg(
        long = "log-format",
        env = "ROUTEKIT_LOG_FORMAT",
        value_enum,
        default_value_t = LogFormat::Text
    )]
    pub log_format: LogFormat,

    /// Controller resolution strategy.
    #[arg(
        long = "resolution",
        env = "ROUTEKIT_RESOLUTION",
        value_enum,
        default_value_t = ResolutionMode::Memoized
    )]
    pub resolution: ResolutionMode,

    /// Bind address.
    #[arg(long = "host", env = "ROUTEKIT_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Port to listen on. 0 means OS-assigned.
    #[arg(long = "port", env = "ROUTEKIT_PORT", default_value_t = 3000)]
    pub port: u16,
}

impl Default for RoutekitConfig {
    fn default() -> Self {
        Self {
            dev_mode: true,
            log_format: LogFormat::Text,
            resolution: ResolutionMode::Memoized,
            host: "127.0.0.1".to_string(),
            port: 3000,
        }
    }
}

impl RoutekitConfig {
    /// `host:port` string suitable for binding a listener.
    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Terminator settings derived from this configuration, with the
    /// default logging hook.
    #[must_use]
    pub fn terminator_config(&self) -> TerminatorConfig {
        TerminatorConfig::new(self.dev_mode)
    }

    /// Builds the configured resolution strategy.
    ///
    /// `container` is only consulted in [`ResolutionMode::Container`]; when
    /// it is `None` there, every resolution fails as dependency-unavailable.
    #[must_use]
    pub fn resolution(&self, container: Option<Arc<dyn Container>>) -> Resolution {
        match self.resolution {
            ResolutionMode::Direct => Resolution::direct(),
            ResolutionMode::Memoized => Resolution::memoized(),
            ResolutionMode::Container => Resolution::container(container),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::TypeRegistry;

    #[test]
    fn defaults_match_parsed_defaults() {
        let parsed = RoutekitConfig::parse_from(["routekit"]);
        let default = RoutekitConfig::default();
        assert_eq!(parsed.dev_mode, default.dev_mode);
        assert_eq!(parsed.log_format, default.log_format);
        assert_eq!(parsed.resolution, default.resolution);
        assert_eq!(parsed.host, default.host);
        assert_eq!(parsed.port, default.port);
    }

    #[test]
    fn dev_mode_defaults_to_true() {
        assert!(RoutekitConfig::default().dev_mode);
        assert!(RoutekitConfig::default().terminator_config().dev_mode);
    }

    #[test]
    fn flags_override_defaults() {
        let config = RoutekitConfig::parse_from([
            "routekit",
            "--dev-mode",
            "false",
            "--log-format",
            "json",
            "--resolution",
            "container",
            "--host",
            "0.0.0.0",
            "--port",
            "8080",
        ]);
        assert!(!config.dev_mode);
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.resolution, ResolutionMode::Container);
        assert_eq!(config.bind_addr(), "0.0.0.0:8080");
        assert!(!config.terminator_config().dev_mode);
    }

    #[test]
    fn invalid_log_format_is_rejected() {
        let result = RoutekitConfig::try_parse_from(["routekit", "--log-format", "xml"]);
        assert!(result.is_err());
    }

    #[test]
    fn resolution_follows_mode() {
        let mut config = RoutekitConfig::default();

        config.resolution = ResolutionMode::Direct;
        assert!(matches!(config.resolution(None), Resolution::Direct(_)));

        config.resolution = ResolutionMode::Memoized;
        assert!(matches!(config.resolution(None), Resolution::Memoized(_)));

        config.resolution = ResolutionMode::Container;
        match config.resolution(None) {
            Resolution::Container(resolver) => assert!(!resolver.is_available()),
            other => panic!("expected container resolution, got {other:?}"),
        }
        match config.resolution(Some(Arc::new(TypeRegistry::new()))) {
            Resolution::Container(resolver) => assert!(resolver.is_available()),
            other => panic!("expected container resolution, got {other:?}"),
        }
    }
}
