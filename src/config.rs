use anyhow::Context;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fs;
use std::time::Duration;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    pub log_level: String,
    pub log_dir: String,
    pub log_file: String,
    pub use_json: bool,
    pub rotation: String,
    /// PostgreSQL connection URL for the ledger store
    pub postgres_url: String,
    #[serde(default = "default_postgres_max_connections")]
    pub postgres_max_connections: u32,
    #[serde(default)]
    pub funding: FundingConfig,
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub worker: WorkerSettings,
}

fn default_postgres_max_connections() -> u32 {
    20
}

/// Pricing of GSALT charges in the provider's currency
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct FundingConfig {
    pub payment_currency: String,
    /// Provider currency units per 1 GSALT
    pub payment_rate: Decimal,
}

impl Default for FundingConfig {
    fn default() -> Self {
        Self {
            payment_currency: "IDR".to_string(),
            payment_rate: Decimal::from(1000),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ProvidersConfig {
    pub payment_gateway_url: String,
    pub payout_url: String,
    pub api_key: String,
    #[serde(default = "default_provider_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_provider_timeout_ms() -> u64 {
    10_000
}

impl ProvidersConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct WorkerSettings {
    pub scan_interval_secs: u64,
    /// Age after which a PENDING withdrawal is polled at the provider
    pub stale_threshold_secs: u64,
    /// Age after which an unpaid charge expires
    pub charge_ttl_secs: u64,
    pub batch_size: usize,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            scan_interval_secs: 30,
            stale_threshold_secs: 300,
            charge_ttl_secs: 86_400,
            batch_size: 100,
        }
    }
}

impl AppConfig {
    pub fn load(env: &str) -> anyhow::Result<Self> {
        let config_path = format!("config/{}.yaml", env);
        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path))?;
        Self::from_yaml(&content).with_context(|| format!("Failed to parse {}", config_path))
    }

    pub fn from_yaml(content: &str) -> anyhow::Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }
}
