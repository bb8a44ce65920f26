use crate::policy::{FRICTION_MAX_AGE_MS, REPORT_INTERVAL_MS};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

// ============================================================================
// Top-level config
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SentinelConfig {
    pub llm: LlmConfig,
    pub store: StoreConfig,
    pub session: SessionConfig,
    pub retention: RetentionConfig,
}

impl SentinelConfig {
    /// Load config from a TOML file, falling back to defaults for missing fields.
    /// After loading, env var overrides are applied.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;
        let mut config: SentinelConfig =
            toml::from_str(&content).with_context(|| "Failed to parse TOML config")?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Try to load from path; if file doesn't exist, return defaults with env overrides.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        match Self::load(path) {
            Ok(cfg) => cfg,
            Err(e) => {
                tracing::info!("Config file not found or invalid ({}), using defaults", e);
                let mut cfg = Self::default();
                cfg.apply_env_overrides();
                cfg
            }
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("LLM_PROVIDER") {
            self.llm.provider = v;
        }
        if let Ok(v) = std::env::var("LLM_MODEL") {
            self.llm.model = v;
        }
        if let Ok(v) = std::env::var("LLM_BASE_URL") {
            self.llm.base_url = Some(v);
        }
        if let Ok(v) = std::env::var("LLM_MAX_TOKENS") {
            if let Ok(n) = v.parse() {
                self.llm.max_tokens = n;
            }
        }
        if let Ok(v) = std::env::var("LLM_TEMPERATURE") {
            if let Ok(n) = v.parse() {
                self.llm.temperature = n;
            }
        }
        if let Ok(v) = std::env::var("SENTINEL_DB") {
            self.store.db_path = v;
        }
    }
}

// ============================================================================
// Sub-configs
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// `gemini`, `anthropic`, `openai` or `mock`.
    pub provider: String,
    pub model: String,
    pub base_url: Option<String>,
    pub max_tokens: u32,
    /// Dialogue sampling temperature. Structured calls run cooler.
    pub temperature: f32,
    /// Environment variable holding the API credential.
    pub api_key_env: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "gemini".to_string(),
            model: "gemini-2.0-flash".to_string(),
            base_url: None,
            max_tokens: 2048,
            temperature: 0.7,
            api_key_env: "SENTINEL_API_KEY".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// SQLite file; `:memory:` keeps everything in-process.
    pub db_path: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: "sentinel.db".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Number of trailing messages sent with each dialogue turn.
    pub context_window: usize,
    pub success_cooldown_secs: u64,
    pub failure_cooldown_secs: u64,
    pub intensity_interval_secs: u64,
    pub countdown_interval_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            context_window: 6,
            success_cooldown_secs: 4,
            failure_cooldown_secs: 15,
            intensity_interval_secs: 60,
            countdown_interval_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetentionConfig {
    pub friction_max_age_ms: i64,
    pub report_interval_ms: i64,
    /// Prior clinical reports quoted back for continuity.
    pub clinical_context_reports: usize,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            friction_max_age_ms: FRICTION_MAX_AGE_MS,
            report_interval_ms: REPORT_INTERVAL_MS,
            clinical_context_reports: 3,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = SentinelConfig::default();
        assert_eq!(cfg.llm.provider, "gemini");
        assert_eq!(cfg.session.context_window, 6);
        assert_eq!(cfg.session.failure_cooldown_secs, 15);
        assert_eq!(cfg.retention.friction_max_age_ms, 2_592_000_000);
        assert_eq!(cfg.retention.report_interval_ms, 604_800_000);
    }

    #[test]
    fn test_parse_minimal_toml() {
        let toml_str = r#"
[llm]
provider = "anthropic"
model = "claude-sonnet-4-5"
"#;
        let cfg: SentinelConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.llm.provider, "anthropic");
        assert_eq!(cfg.llm.model, "claude-sonnet-4-5");
        // Defaults for unspecified fields
        assert_eq!(cfg.llm.max_tokens, 2048);
        assert_eq!(cfg.store.db_path, "sentinel.db");
    }

    #[test]
    fn test_parse_full_toml() {
        let toml_str = r#"
[llm]
provider = "openai"
model = "gpt-4o-mini"
base_url = "http://localhost:11434/v1"
max_tokens = 1024
temperature = 0.3
api_key_env = "OPENAI_API_KEY"

[store]
db_path = "data/sentinel.db"

[session]
context_window = 10
success_cooldown_secs = 2
failure_cooldown_secs = 30
intensity_interval_secs = 15
countdown_interval_ms = 500

[retention]
friction_max_age_ms = 86400000
report_interval_ms = 3600000
clinical_context_reports = 5
"#;
        let cfg: SentinelConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.llm.provider, "openai");
        assert_eq!(cfg.llm.api_key_env, "OPENAI_API_KEY");
        assert_eq!(cfg.store.db_path, "data/sentinel.db");
        assert_eq!(cfg.session.context_window, 10);
        assert_eq!(cfg.session.countdown_interval_ms, 500);
        assert_eq!(cfg.retention.friction_max_age_ms, 86_400_000);
        assert_eq!(cfg.retention.clinical_context_reports, 5);
    }

    #[test]
    fn test_example_config_matches_defaults() {
        let cfg: SentinelConfig =
            toml::from_str(include_str!("../../../sentinel.example.toml")).unwrap();
        let defaults = SentinelConfig::default();
        assert_eq!(cfg.llm.model, defaults.llm.model);
        assert_eq!(cfg.session.context_window, defaults.session.context_window);
        assert_eq!(cfg.retention.report_interval_ms, defaults.retention.report_interval_ms);
    }

    #[test]
    fn test_env_overrides_and_defaults() {
        std::env::set_var("LLM_PROVIDER", "mock");
        std::env::set_var("LLM_MODEL", "scripted");

        let mut cfg = SentinelConfig::default();
        cfg.apply_env_overrides();

        assert_eq!(cfg.llm.provider, "mock");
        assert_eq!(cfg.llm.model, "scripted");

        std::env::remove_var("LLM_PROVIDER");
        std::env::remove_var("LLM_MODEL");

        let cfg = SentinelConfig::load_or_default("/nonexistent/sentinel.toml");
        assert_eq!(cfg.llm.provider, "gemini");
    }
}
