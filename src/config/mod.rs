//! Service Configuration
//!
//! Layered settings: built-in defaults, then an optional `loadmatch.toml`,
//! then `LOADMATCH_*` environment variables (a `.env` file is read first).

use anyhow::{ensure, Result};
use config::builder::DefaultState;
use config::{ConfigBuilder, Environment, File};
use serde::Deserialize;
use std::path::PathBuf;

use crate::audit::DEFAULT_AUDIT_CAPACITY;
use crate::evaluator::RuleBasedEvaluatorConfig;
use crate::gateway::GeminiClientConfig;

const CONFIG_FILE: &str = "loadmatch";
const ENV_PREFIX: &str = "LOADMATCH";

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub http_port: u16,
    #[serde(default)]
    pub seed_path: Option<PathBuf>,
    #[serde(default)]
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub gemini_endpoint: String,
    pub gateway_timeout_secs: u64,
    pub audit_capacity: usize,
    /// Rule-based evaluator thresholds, used when no API key is configured
    pub rules_max_pickup_gap_days: i64,
    pub rules_ftl_capacity_kg: f64,
    pub rules_ftl_capacity_m3: f64,
}

impl Config {
    /// Load from `.env`, `loadmatch.toml` and the environment
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let builder = Self::defaults()?
            .add_source(File::with_name(CONFIG_FILE).required(false))
            .add_source(Environment::with_prefix(ENV_PREFIX));
        let mut config = Self::finish(builder)?;

        // Plain GEMINI_API_KEY is honoured when the prefixed one is absent
        if config.gemini_api_key.is_none() {
            config.gemini_api_key = std::env::var("GEMINI_API_KEY")
                .ok()
                .filter(|key| !key.trim().is_empty());
        }
        Ok(config)
    }

    fn defaults() -> Result<ConfigBuilder<DefaultState>> {
        let defaults = GeminiClientConfig::default();
        let rules = RuleBasedEvaluatorConfig::default();
        Ok(config::Config::builder()
            .set_default("http_port", 8080)?
            .set_default("gemini_model", defaults.model)?
            .set_default("gemini_endpoint", defaults.endpoint)?
            .set_default("gateway_timeout_secs", defaults.timeout_secs)?
            .set_default("audit_capacity", DEFAULT_AUDIT_CAPACITY as u64)?
            .set_default("rules_max_pickup_gap_days", rules.max_pickup_gap_days)?
            .set_default("rules_ftl_capacity_kg", rules.ftl_capacity_kg)?
            .set_default("rules_ftl_capacity_m3", rules.ftl_capacity_m3)?)
    }

    fn finish(builder: ConfigBuilder<DefaultState>) -> Result<Self> {
        let mut config: Config = builder.build()?.try_deserialize()?;
        config.gemini_api_key = config
            .gemini_api_key
            .take()
            .filter(|key| !key.trim().is_empty());

        ensure!(config.audit_capacity > 0, "audit_capacity must be at least 1");
        ensure!(config.gateway_timeout_secs > 0, "gateway_timeout_secs must be at least 1");
        ensure!(!config.gemini_model.trim().is_empty(), "gemini_model must not be empty");
        ensure!(
            config.rules_max_pickup_gap_days >= 0,
            "rules_max_pickup_gap_days must not be negative"
        );
        ensure!(
            config.rules_ftl_capacity_kg > 0.0 && config.rules_ftl_capacity_m3 > 0.0,
            "rules_ftl_capacity_kg and rules_ftl_capacity_m3 must be positive"
        );
        Ok(config)
    }

    /// Gemini client settings, when an API key is configured
    pub fn gemini(&self) -> Option<GeminiClientConfig> {
        self.gemini_api_key.as_ref().map(|api_key| GeminiClientConfig {
            api_key: api_key.clone(),
            model: self.gemini_model.clone(),
            endpoint: self.gemini_endpoint.clone(),
            timeout_secs: self.gateway_timeout_secs,
        })
    }

    /// Thresholds for the rule-based evaluator; corridors keep their defaults
    pub fn rule_evaluator(&self) -> RuleBasedEvaluatorConfig {
        RuleBasedEvaluatorConfig {
            max_pickup_gap_days: self.rules_max_pickup_gap_days,
            ftl_capacity_kg: self.rules_ftl_capacity_kg,
            ftl_capacity_m3: self.rules_ftl_capacity_m3,
            ..RuleBasedEvaluatorConfig::default()
        }
    }
}
