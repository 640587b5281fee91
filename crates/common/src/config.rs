use std::str::FromStr;

use serde::Deserialize;

use crate::error::RiskError;
use crate::types::{BPS_DENOMINATOR, MonitorConfig, RiskParams};

/// Global configuration loaded from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct RiskConfig {
    /// JSON-RPC endpoint of the chain hosting the DSC engine (Sepolia by default)
    pub rpc_url: String,

    /// Address of the DSC engine (accounting) contract
    pub engine_address: String,

    /// Base URL of the read-only liquidation aggregation service
    pub aggregator_url: String,

    /// Collateral share counted toward solvency, in bps (default: 5000)
    pub liquidation_threshold_bps: u64,

    /// Liquidator bonus on top of repaid debt, in bps (default: 1000)
    pub liquidation_bonus_bps: u64,

    /// Maximum share of debt repaid per liquidation, in bps (default: 10000)
    pub close_factor_bps: u64,

    /// Relative price move that triggers a refresh, in bps (default: 50 = 0.5%)
    pub price_change_threshold_bps: u64,

    /// How often the scheduler checks for a new block, in milliseconds (default: 4000)
    pub block_poll_interval_ms: u64,
}

impl RiskConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            rpc_url: std::env::var("DSC_RPC_URL")
                .unwrap_or_else(|_| "https://ethereum-sepolia-rpc.publicnode.com".to_string()),
            engine_address: std::env::var("DSC_ENGINE_ADDRESS")
                .unwrap_or_else(|_| "0x28083fa0d374a254d107da7db026cd8c3bd97b28".to_string()),
            aggregator_url: std::env::var("DSC_AGGREGATOR_URL")
                .unwrap_or_else(|_| "https://stablecoinsvc.onrender.com".to_string()),
            liquidation_threshold_bps: parse_var("DSC_LIQUIDATION_THRESHOLD_BPS", "5000")?,
            liquidation_bonus_bps: parse_var("DSC_LIQUIDATION_BONUS_BPS", "1000")?,
            close_factor_bps: parse_var("DSC_CLOSE_FACTOR_BPS", "10000")?,
            price_change_threshold_bps: parse_var("DSC_PRICE_CHANGE_THRESHOLD_BPS", "50")?,
            block_poll_interval_ms: parse_var("DSC_BLOCK_POLL_INTERVAL_MS", "4000")?,
        };

        // Fail at startup rather than on the first preview
        config.risk_params()?;
        config.monitor_config()?;

        tracing::debug!(
            engine = %config.engine_address,
            threshold_bps = config.liquidation_threshold_bps,
            price_change_threshold_bps = config.price_change_threshold_bps,
            "Configuration loaded"
        );

        Ok(config)
    }

    /// Risk parameters, validated.
    pub fn risk_params(&self) -> Result<RiskParams, RiskError> {
        let params = RiskParams {
            liquidation_threshold_bps: self.liquidation_threshold_bps,
            liquidation_bonus_bps: self.liquidation_bonus_bps,
            close_factor_bps: self.close_factor_bps,
        };
        validate_risk_params(&params)?;
        Ok(params)
    }

    /// Monitor settings, validated.
    pub fn monitor_config(&self) -> Result<MonitorConfig, RiskError> {
        if self.price_change_threshold_bps == 0 {
            return Err(RiskError::Config(
                "DSC_PRICE_CHANGE_THRESHOLD_BPS must be greater than zero".to_string(),
            ));
        }
        Ok(MonitorConfig {
            significant_change_threshold_bps: self.price_change_threshold_bps,
        })
    }
}

/// Reject ratios outside `(0, 100%]`. The bonus may be zero.
pub fn validate_risk_params(params: &RiskParams) -> Result<(), RiskError> {
    if params.liquidation_threshold_bps == 0 || params.liquidation_threshold_bps > BPS_DENOMINATOR {
        return Err(RiskError::Config(format!(
            "liquidation threshold must be in 1..={BPS_DENOMINATOR} bps, got {}",
            params.liquidation_threshold_bps
        )));
    }
    if params.close_factor_bps == 0 || params.close_factor_bps > BPS_DENOMINATOR {
        return Err(RiskError::Config(format!(
            "close factor must be in 1..={BPS_DENOMINATOR} bps, got {}",
            params.close_factor_bps
        )));
    }
    if params.liquidation_bonus_bps > BPS_DENOMINATOR {
        return Err(RiskError::Config(format!(
            "liquidation bonus must be at most {BPS_DENOMINATOR} bps, got {}",
            params.liquidation_bonus_bps
        )));
    }
    Ok(())
}

fn parse_var<T: FromStr>(key: &str, default: &str) -> anyhow::Result<T> {
    std::env::var(key)
        .unwrap_or_else(|_| default.to_string())
        .parse()
        .map_err(|_| anyhow::anyhow!("{key} must be a valid {}", std::any::type_name::<T>()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_config() -> RiskConfig {
        RiskConfig {
            rpc_url: "http://localhost:8545".to_string(),
            engine_address: "0x0000000000000000000000000000000000000001".to_string(),
            aggregator_url: "http://localhost:3000".to_string(),
            liquidation_threshold_bps: 5_000,
            liquidation_bonus_bps: 1_000,
            close_factor_bps: 10_000,
            price_change_threshold_bps: 50,
            block_poll_interval_ms: 4_000,
        }
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = sample_config();
        assert_eq!(config.risk_params().unwrap(), RiskParams::default());
        assert_eq!(config.monitor_config().unwrap(), MonitorConfig::default());
    }

    #[test]
    fn test_threshold_above_one_hundred_percent_rejected() {
        let mut config = sample_config();
        config.liquidation_threshold_bps = 10_001;
        assert!(matches!(config.risk_params(), Err(RiskError::Config(_))));
    }

    #[test]
    fn test_zero_close_factor_rejected() {
        let mut config = sample_config();
        config.close_factor_bps = 0;
        assert!(config.risk_params().is_err());
    }

    #[test]
    fn test_zero_price_change_threshold_rejected() {
        let mut config = sample_config();
        config.price_change_threshold_bps = 0;
        assert!(config.monitor_config().is_err());
    }

    #[test]
    fn test_zero_bonus_allowed() {
        let params = RiskParams {
            liquidation_bonus_bps: 0,
            ..RiskParams::default()
        };
        assert!(validate_risk_params(&params).is_ok());
    }
}
