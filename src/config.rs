use crate::core::MAX_SIMILARITY;
use crate::models::Pricing;
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub matching: MatchingSettings,
    #[serde(default)]
    pub latency: LatencySettings,
    #[serde(default)]
    pub pricing: PricingSettings,
    #[serde(default)]
    pub payment: PaymentSettings,
    #[serde(default)]
    pub flows: FlowSettings,
    #[serde(default)]
    pub random: RandomSettings,
    #[serde(default)]
    pub records: RecordSettings,
    #[serde(default)]
    pub artifacts: ArtifactSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub workers: Option<usize>,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            workers: None,
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

fn default_host() -> String { "127.0.0.1".to_string() }
fn default_port() -> u16 { 8080 }
fn default_max_upload_bytes() -> usize { 10 * 1024 * 1024 }

#[derive(Debug, Clone, Deserialize)]
pub struct MatchingSettings {
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f64,
}

impl Default for MatchingSettings {
    fn default() -> Self {
        Self {
            similarity_threshold: default_similarity_threshold(),
        }
    }
}

fn default_similarity_threshold() -> f64 { 75.0 }

/// Simulated delays, in milliseconds
#[derive(Debug, Clone, Deserialize)]
pub struct LatencySettings {
    #[serde(default = "default_match_run_ms")]
    pub match_run_ms: u64,
    #[serde(default = "default_registration_check_ms")]
    pub registration_check_ms: u64,
    #[serde(default = "default_payment_confirmation_ms")]
    pub payment_confirmation_ms: u64,
    #[serde(default = "default_match_run_timeout_ms")]
    pub match_run_timeout_ms: u64,
}

impl Default for LatencySettings {
    fn default() -> Self {
        Self {
            match_run_ms: default_match_run_ms(),
            registration_check_ms: default_registration_check_ms(),
            payment_confirmation_ms: default_payment_confirmation_ms(),
            match_run_timeout_ms: default_match_run_timeout_ms(),
        }
    }
}

fn default_match_run_ms() -> u64 { 3000 }
fn default_registration_check_ms() -> u64 { 1000 }
fn default_payment_confirmation_ms() -> u64 { 2000 }
fn default_match_run_timeout_ms() -> u64 { 30_000 }

#[derive(Debug, Clone, Deserialize)]
pub struct PricingSettings {
    #[serde(default = "default_photo_file_cents")]
    pub photo_file_cents: u64,
    #[serde(default = "default_text_file_cents")]
    pub text_file_cents: u64,
}

impl Default for PricingSettings {
    fn default() -> Self {
        Self {
            photo_file_cents: default_photo_file_cents(),
            text_file_cents: default_text_file_cents(),
        }
    }
}

impl From<&PricingSettings> for Pricing {
    fn from(settings: &PricingSettings) -> Self {
        Pricing {
            photo_file_cents: settings.photo_file_cents,
            text_file_cents: settings.text_file_cents,
        }
    }
}

fn default_photo_file_cents() -> u64 { 2500 }
fn default_text_file_cents() -> u64 { 1500 }

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentSettings {
    #[serde(default = "default_merchant_name")]
    pub merchant_name: String,
    #[serde(default = "default_merchant_city")]
    pub merchant_city: String,
}

impl Default for PaymentSettings {
    fn default() -> Self {
        Self {
            merchant_name: default_merchant_name(),
            merchant_city: default_merchant_city(),
        }
    }
}

fn default_merchant_name() -> String { "FACIAL MATCH SYSTEM".to_string() }
fn default_merchant_city() -> String { "SAO PAULO".to_string() }

#[derive(Debug, Clone, Deserialize)]
pub struct FlowSettings {
    #[serde(default = "default_max_flows")]
    pub max_flows: u64,
    #[serde(default = "default_idle_ttl_secs")]
    pub idle_ttl_secs: u64,
}

impl Default for FlowSettings {
    fn default() -> Self {
        Self {
            max_flows: default_max_flows(),
            idle_ttl_secs: default_idle_ttl_secs(),
        }
    }
}

fn default_max_flows() -> u64 { 10_000 }
fn default_idle_ttl_secs() -> u64 { 1800 }

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RandomSettings {
    /// Fixed seed for reproducible demos; entropy when absent
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecordSettings {
    /// JSON file replacing the built-in demonstration records
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ArtifactSettings {
    /// Directory that also receives every download
    pub output_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String { "info".to_string() }
fn default_log_format() -> String { "json".to_string() }

const LOG_FORMATS: [&str; 3] = ["json", "pretty", "text"];

impl LoggingSettings {
    /// Apply `LOG_LEVEL` / `LOG_FORMAT` style overrides on top of the file values
    pub fn with_overrides(mut self, level: Option<String>, format: Option<String>) -> Self {
        if let Some(level) = level.filter(|l| !l.trim().is_empty()) {
            self.level = level;
        }
        if let Some(format) = format.filter(|f| !f.trim().is_empty()) {
            self.format = format.trim().to_ascii_lowercase();
        }
        self
    }

    /// Overrides taken from the process environment
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(std::env::var("LOG_LEVEL").ok(), std::env::var("LOG_FORMAT").ok())
    }
}

impl Settings {
    /// Load configuration from file and environment variables
    ///
    /// Configuration is loaded in the following order (later overrides earlier):
    /// 1. Default values in the struct
    /// 2. Configuration file (config/default.toml)
    /// 3. Local overrides (config/local.toml)
    /// 4. Environment variables (prefixed with FACIAL_MATCH__)
    pub fn load() -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            // e.g., FACIAL_MATCH__SERVER__PORT -> server.port
            .add_source(
                Environment::with_prefix("FACIAL_MATCH")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let settings: Settings = settings.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load configuration from a custom path
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::from(path.as_ref()))
            .add_source(
                Environment::with_prefix("FACIAL_MATCH")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let settings: Settings = settings.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reject values the flow cannot honour
    pub fn validate(&self) -> Result<(), ConfigError> {
        let threshold = self.matching.similarity_threshold;
        if !(0.0..MAX_SIMILARITY).contains(&threshold) {
            return Err(ConfigError::Message(format!(
                "matching.similarity_threshold must be in [0, {}), got {}",
                MAX_SIMILARITY, threshold
            )));
        }
        if self.pricing.photo_file_cents + self.pricing.text_file_cents == 0 {
            return Err(ConfigError::Message("pricing total must be positive".to_string()));
        }
        if self.flows.max_flows == 0 {
            return Err(ConfigError::Message("flows.max_flows must be positive".to_string()));
        }
        if self.server.max_upload_bytes == 0 {
            return Err(ConfigError::Message("server.max_upload_bytes must be positive".to_string()));
        }
        if !LOG_FORMATS.contains(&self.logging.format.as_str()) {
            return Err(ConfigError::Message(format!(
                "logging.format must be one of {:?}, got {}",
                LOG_FORMATS, self.logging.format
            )));
        }
        Ok(())
    }
}
