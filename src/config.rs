use config::{Config, ConfigError, Environment, File};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::path::Path;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub aggregator: AggregatorConfig,
    #[serde(default)]
    pub execution: ExecutionConfig,
    #[serde(default)]
    pub idempotency: IdempotencyConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AggregatorConfig {
    /// Ordered list of provider identifiers, highest priority first
    pub provider_priority: Vec<String>,
    /// Per-provider call timeout in milliseconds
    #[serde(default = "default_provider_timeout_ms")]
    pub provider_timeout_ms: u64,
    /// How long a successful quote stays usable within an evaluation burst
    #[serde(default = "default_quote_ttl_ms")]
    pub quote_ttl_ms: u64,
    /// Independent low-latency spot endpoint for price-impact reference
    #[serde(default)]
    pub spot_url: Option<String>,
}

fn default_provider_timeout_ms() -> u64 {
    3_000
}

fn default_quote_ttl_ms() -> u64 {
    2_000
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            provider_priority: vec!["synthetic".to_string()],
            provider_timeout_ms: default_provider_timeout_ms(),
            quote_ttl_ms: default_quote_ttl_ms(),
            spot_url: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExecutionConfig {
    /// Wall-clock budget for a single order evaluation in milliseconds
    #[serde(default = "default_tick_budget_ms")]
    pub tick_budget_ms: u64,
    /// Maximum retry attempts for venue submission
    #[serde(default = "default_max_retries")]
    pub max_retries: u8,
    /// Global slippage ceiling; per-order max_slippage_pct overrides it
    #[serde(default = "default_max_slippage_pct")]
    pub max_slippage_pct: Decimal,
}

fn default_tick_budget_ms() -> u64 {
    5_000
}

fn default_max_retries() -> u8 {
    3
}

fn default_max_slippage_pct() -> Decimal {
    rust_decimal_macros::dec!(0.05)
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            tick_budget_ms: default_tick_budget_ms(),
            max_retries: default_max_retries(),
            max_slippage_pct: default_max_slippage_pct(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct IdempotencyConfig {
    /// Record time-to-live in seconds (default 24h)
    #[serde(default = "default_idempotency_ttl_secs")]
    pub ttl_secs: u64,
    /// Interval for the optional background sweep of expired records
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

fn default_idempotency_ttl_secs() -> u64 {
    86_400
}

fn default_sweep_interval_secs() -> u64 {
    3_600
}

impl Default for IdempotencyConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_idempotency_ttl_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Enable JSON formatted logs
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl AppConfig {
    /// Load configuration from files and environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("config")
    }

    /// Load configuration from a specific directory
    pub fn load_from<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();

        let builder = Config::builder()
            // Start with default values
            .set_default("logging.level", "info")?
            .set_default("logging.json", false)?
            .set_default("aggregator.provider_timeout_ms", 3_000)?
            .set_default("execution.tick_budget_ms", 5_000)?
            .set_default("idempotency.ttl_secs", 86_400)?
            // Load default config file
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Load environment-specific config (e.g., config/production.toml)
            .add_source(
                File::from(config_dir.join(
                    std::env::var("ORDEX_ENV").unwrap_or_else(|_| "development".to_string()),
                ))
                .required(false),
            )
            // Override with environment variables (ORDEX_EXECUTION__MAX_RETRIES, etc.)
            .add_source(
                Environment::with_prefix("ORDEX")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.aggregator.provider_priority.is_empty() {
            errors.push("aggregator.provider_priority must name at least one provider".to_string());
        }

        if self.aggregator.provider_timeout_ms == 0 {
            errors.push("aggregator.provider_timeout_ms must be positive".to_string());
        }

        // The tick budget must leave room for the full sequential fallback chain
        let chain_ms =
            self.aggregator.provider_timeout_ms * self.aggregator.provider_priority.len() as u64;
        if self.execution.tick_budget_ms < chain_ms {
            errors.push(format!(
                "execution.tick_budget_ms ({}) is shorter than the worst-case provider chain ({}ms)",
                self.execution.tick_budget_ms, chain_ms
            ));
        }

        if self.execution.max_slippage_pct <= Decimal::ZERO
            || self.execution.max_slippage_pct >= Decimal::ONE
        {
            errors.push("execution.max_slippage_pct must be between 0 and 1".to_string());
        }

        if self.execution.max_retries == 0 {
            errors.push("execution.max_retries must be at least 1".to_string());
        }

        if self.idempotency.ttl_secs == 0 {
            errors.push("idempotency.ttl_secs must be positive".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            aggregator: AggregatorConfig::default(),
            execution: ExecutionConfig::default(),
            idempotency: IdempotencyConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}
