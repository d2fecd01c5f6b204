use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

use crate::diagnostics::{DiagnosticSink, TracingDiagnostics};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub wizard: WizardOptions,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub diagnostics: DiagnosticsConfig,
}

/// Options recognized by a wizard instance
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WizardOptions {
    /// Initial active step (default: 0)
    #[serde(default)]
    pub start_index: usize,
    /// Mirror the active step into the location fragment (default: false)
    #[serde(default)]
    pub hash_enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (overridden by RUST_LOG)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Write logs to a timestamped file instead of stderr
    #[serde(default)]
    pub to_file: bool,
    /// Directory for log files when `to_file` is set
    #[serde(default = "default_log_dir")]
    pub directory: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_dir() -> String {
    ".stepwise/logs".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            to_file: false,
            directory: default_log_dir(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosticsConfig {
    /// Emit misuse warnings (default: on in debug builds only)
    #[serde(default = "default_diagnostics_enabled")]
    pub enabled: bool,
}

fn default_diagnostics_enabled() -> bool {
    cfg!(debug_assertions)
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            enabled: default_diagnostics_enabled(),
        }
    }
}

impl Config {
    /// User-level config in ~/.config/stepwise/
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("stepwise").join("config.toml"))
    }

    pub fn load(config_path: Option<&str>) -> Result<Self> {
        // Start with embedded defaults so stepwise works without config files
        let defaults = Config::default();
        let defaults_json =
            serde_json::to_string(&defaults).context("Failed to serialize default config")?;

        let mut builder = config::Config::builder().add_source(config::File::from_str(
            &defaults_json,
            config::FileFormat::Json,
        ));

        if let Some(user_config) = Self::user_config_path() {
            if user_config.exists() {
                builder = builder.add_source(config::File::from(user_config));
            }
        }

        // Explicit config file (CLI override)
        if let Some(path) = config_path {
            builder = builder.add_source(config::File::with_name(path));
        }

        // Environment variables with STEPWISE_ prefix
        builder = builder.add_source(
            config::Environment::with_prefix("STEPWISE")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build().context("Failed to load configuration")?;
        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Get absolute path to the log directory
    pub fn logs_path(&self) -> PathBuf {
        let path = PathBuf::from(&self.logging.directory);
        if path.is_absolute() {
            path
        } else {
            std::env::current_dir().unwrap_or_default().join(path)
        }
    }

    /// Diagnostic sink matching the `diagnostics` section
    pub fn diagnostics_sink(&self) -> Arc<dyn DiagnosticSink> {
        Arc::new(TracingDiagnostics::new(self.diagnostics.enabled))
    }
}
