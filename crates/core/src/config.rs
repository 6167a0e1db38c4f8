use serde::Deserialize;

/// Root application configuration. Loaded from environment variables with
/// the prefix `OPTIREACH__`.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub sender: SenderConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Cadence between runs while a campaign stays active.
    #[serde(default = "default_run_interval_hours")]
    pub run_interval_hours: u32,
    /// Maximum number of customers returned in a segment preview sample.
    #[serde(default = "default_preview_sample_size")]
    pub preview_sample_size: usize,
    /// How many recent runs campaign analytics include.
    #[serde(default = "default_recent_runs_limit")]
    pub recent_runs_limit: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SenderConfig {
    #[serde(default = "default_sms_from")]
    pub sms_from: String,
    #[serde(default = "default_email_from")]
    pub email_from: String,
}

// Default functions
fn default_run_interval_hours() -> u32 {
    24
}
fn default_preview_sample_size() -> usize {
    10
}
fn default_recent_runs_limit() -> usize {
    20
}
fn default_sms_from() -> String {
    "+15550100000".to_string()
}
fn default_email_from() -> String {
    "no-reply@optireach.example".to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            run_interval_hours: default_run_interval_hours(),
            preview_sample_size: default_preview_sample_size(),
            recent_runs_limit: default_recent_runs_limit(),
        }
    }
}

impl Default for SenderConfig {
    fn default() -> Self {
        Self {
            sms_from: default_sms_from(),
            email_from: default_email_from(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            sender: SenderConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder().add_source(
            config::Environment::with_prefix("OPTIREACH")
                .separator("__")
                .try_parsing(true)
                .list_separator(","),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }
}
