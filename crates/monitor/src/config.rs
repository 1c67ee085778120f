use std::path::PathBuf;
use std::time::Duration;

use xrayops_logtail::controller::MAX_LINE_LIMIT;

/// Monitor configuration loaded from environment variables.
///
/// All fields have defaults suitable for a backend on the local machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorConfig {
    /// HTTP base URL of the backend (default: `http://localhost:8000`).
    pub api_url: String,
    /// WebSocket base URL of the backend (default: `ws://localhost:8000`).
    pub ws_url: String,
    /// Line count for one-shot log refreshes (default: `100`).
    pub log_lines: u32,
    /// Delay before each stats feed reconnection (default: 5s).
    pub reconnect_delay: Duration,
    /// Directory the log buffer is exported to on shutdown. Unset disables
    /// the export.
    pub export_dir: Option<PathBuf>,
}

/// An environment variable that is set but unusable.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} must be {expected}, got {value:?}")]
    Invalid {
        var: &'static str,
        value: String,
        expected: &'static str,
    },
}

impl MonitorConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                  | Default                 |
    /// |--------------------------|-------------------------|
    /// | `XRAYOPS_API_URL`        | `http://localhost:8000` |
    /// | `XRAYOPS_WS_URL`         | `ws://localhost:8000`   |
    /// | `XRAYOPS_LOG_LINES`      | `100` (1..=1000)        |
    /// | `XRAYOPS_RECONNECT_SECS` | `5`                     |
    /// | `XRAYOPS_EXPORT_DIR`     | unset                   |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with a custom variable source.
    /// Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let api_url = var("XRAYOPS_API_URL").unwrap_or_else(|| "http://localhost:8000".into());
        let ws_url = var("XRAYOPS_WS_URL").unwrap_or_else(|| "ws://localhost:8000".into());

        let log_lines = match var("XRAYOPS_LOG_LINES") {
            None => 100,
            Some(value) => match value.parse::<u32>() {
                Ok(n) if (1..=MAX_LINE_LIMIT).contains(&n) => n,
                _ => {
                    return Err(ConfigError::Invalid {
                        var: "XRAYOPS_LOG_LINES",
                        value,
                        expected: "an integer between 1 and 1000",
                    })
                }
            },
        };

        let reconnect_secs = match var("XRAYOPS_RECONNECT_SECS") {
            None => 5,
            Some(value) => match value.parse::<u64>() {
                Ok(n) if n > 0 => n,
                _ => {
                    return Err(ConfigError::Invalid {
                        var: "XRAYOPS_RECONNECT_SECS",
                        value,
                        expected: "a positive number of seconds",
                    })
                }
            },
        };

        let export_dir = var("XRAYOPS_EXPORT_DIR").map(PathBuf::from);

        Ok(Self {
            api_url,
            ws_url,
            log_lines,
            reconnect_delay: Duration::from_secs(reconnect_secs),
            export_dir,
        })
    }
}
