//! Layered configuration: defaults -> optional TOML file -> `FAUCET_`
//! environment variables -> CLI overrides (applied by `main.rs`).

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const MICRO_PER_TOKEN: u64 = 1_000_000;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FaucetConfig {
    pub port: u16,
    pub block_time_ms: u64,
    pub difficulty_bits: u32,
    pub max_shares_pb: u64,
    pub withdraw_fee_tokens: u64,
    pub pool_a_reward_tokens: u64,
    pub pool_b_reward_tokens: u64,
    pub pool_c_reward_tokens: u64,
    pub db_path: PathBuf,
    pub rate_limit_general: RateLimitConfig,
    pub rate_limit_submit: RateLimitConfig,
    pub payout_poll_interval_ms: u64,
    pub payout_max_attempts: u32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub window_ms: u64,
    pub max_requests: u32,
}

impl Default for FaucetConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            block_time_ms: 400,
            difficulty_bits: 18,
            max_shares_pb: 500,
            withdraw_fee_tokens: 1_000,
            pool_a_reward_tokens: 50,
            pool_b_reward_tokens: 50,
            pool_c_reward_tokens: 0,
            db_path: PathBuf::from("./data/faucet.sqlite3"),
            rate_limit_general: RateLimitConfig {
                window_ms: 60_000,
                max_requests: 300,
            },
            rate_limit_submit: RateLimitConfig {
                window_ms: 60_000,
                max_requests: 60,
            },
            payout_poll_interval_ms: 5_000,
            payout_max_attempts: 5,
        }
    }
}

impl FaucetConfig {
    pub fn pool_a_micro(&self) -> u64 {
        self.pool_a_reward_tokens * MICRO_PER_TOKEN
    }

    pub fn pool_b_micro(&self) -> u64 {
        self.pool_b_reward_tokens * MICRO_PER_TOKEN
    }

    pub fn pool_c_micro(&self) -> u64 {
        self.pool_c_reward_tokens * MICRO_PER_TOKEN
    }

    pub fn withdraw_fee_micro(&self) -> u64 {
        self.withdraw_fee_tokens * MICRO_PER_TOKEN
    }

    /// Loads defaults, then layers an optional TOML file, then `FAUCET_`
    /// prefixed environment variables (e.g. `FAUCET_PORT=9090`).
    pub fn load(file_path: Option<&std::path::Path>) -> Result<Self, ConfigError> {
        let defaults = FaucetConfig::default();

        let mut builder = config::Config::builder()
            .add_source(config::Config::try_from(&defaults).map_err(ConfigError::Source)?);

        if let Some(path) = file_path {
            if path.exists() {
                builder = builder.add_source(config::File::from(path));
            }
        }

        builder = builder.add_source(
            config::Environment::with_prefix("FAUCET")
                .separator("_")
                .try_parsing(true),
        );

        let built = builder.build().map_err(ConfigError::Source)?;
        built
            .try_deserialize()
            .map_err(|e| ConfigError::Parse(e.to_string()))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("configuration source error: {0}")]
    Source(#[from] config::ConfigError),
    #[error("configuration parse error: {0}")]
    Parse(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let cfg = FaucetConfig::default();
        assert_eq!(cfg.block_time_ms, 400);
        assert_eq!(cfg.difficulty_bits, 18);
        assert_eq!(cfg.max_shares_pb, 500);
        assert_eq!(cfg.withdraw_fee_tokens, 1_000);
        assert_eq!(cfg.pool_a_reward_tokens, 50);
        assert_eq!(cfg.pool_b_reward_tokens, 50);
    }

    #[test]
    fn micro_conversion() {
        let cfg = FaucetConfig::default();
        assert_eq!(cfg.pool_a_micro(), 50_000_000);
        assert_eq!(cfg.withdraw_fee_micro(), 1_000_000_000);
    }

    #[test]
    fn load_without_file_returns_defaults() {
        let cfg = FaucetConfig::load(None).unwrap();
        assert_eq!(cfg, FaucetConfig::default());
    }
}
