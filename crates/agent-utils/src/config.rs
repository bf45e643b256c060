//! Application-level configuration

use serde::{Deserialize, Serialize};

/// Environment variable selecting the deployment environment
pub const APP_ENV: &str = "APP_ENV";
/// Environment variable selecting the log format (`json` or `plain`)
pub const LOG_FORMAT: &str = "LOG_FORMAT";

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Application name
    pub app_name: String,
    /// Environment (development, production, etc.)
    pub environment: String,
    /// Emit logs as JSON lines
    pub log_json: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            app_name: "investment-agents".to_string(),
            environment: "development".to_string(),
            log_json: false,
        }
    }
}

impl Config {
    /// Defaults overridden by `APP_ENV` and `LOG_FORMAT`
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let environment = lookup(APP_ENV)
            .filter(|env| !env.trim().is_empty())
            .unwrap_or(defaults.environment);
        let log_json = lookup(LOG_FORMAT)
            .is_some_and(|format| format.trim().eq_ignore_ascii_case("json"));

        Self {
            environment,
            log_json,
            ..defaults
        }
    }

    /// Whether this is a production deployment
    pub fn is_production(&self) -> bool {
        matches!(self.environment.as_str(), "production" | "prod")
    }
}
