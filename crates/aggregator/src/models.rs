//! Wire models of the liquidation aggregation service.
//!
//! Amounts arrive as decimal strings of wei-scaled integers (18 decimals).
//! They are kept as strings and parsed on demand so one malformed field does
//! not drop the whole feed.

use std::str::FromStr;

use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};

use dsc_common::types::HealthFactor;

/// Parse a base-10 wei string.
pub fn parse_wei(value: &str) -> Option<U256> {
    U256::from_str_radix(value.trim(), 10).ok()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteLiquidationDetail {
    pub token: String,
    pub debt_to_cover: String,
    pub collateral_to_receive: String,
    pub profit_estimate: String,
    pub profitable_to_liquidate: bool,
}

impl RemoteLiquidationDetail {
    pub fn token_address(&self) -> Option<Address> {
        Address::from_str(&self.token).ok()
    }
}

/// An account the service flagged, with its own valuation.
///
/// The service's numbers are advisory. Callers re-check the account with
/// the local preview engine before acting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteLiquidationOpportunity {
    pub address: String,
    pub health_factor: String,
    #[serde(default)]
    pub health_factor_formatted: String,
    pub collateral_value_in_usd: String,
    pub dsc_minted: String,
    pub liquidatable: bool,
    #[serde(default)]
    pub last_updated: String,
    #[serde(default)]
    pub liquidation_details: Vec<RemoteLiquidationDetail>,
}

impl RemoteLiquidationOpportunity {
    pub fn account(&self) -> Option<Address> {
        Address::from_str(&self.address).ok()
    }

    pub fn health_factor(&self) -> Option<HealthFactor> {
        parse_wei(&self.health_factor).map(HealthFactor::from_wad)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemotePriceFeed {
    pub token: String,
    pub price_in_usd: String,
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepositEvent {
    pub block_number: u64,
    pub transaction_hash: String,
    pub user: String,
    pub amount: String,
    pub token: String,
    pub timestamp: String,
}

/// `/api/events` wraps its list; a missing key means no events.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct DepositEventsResponse {
    #[serde(default)]
    pub events: Vec<DepositEvent>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtocolMetrics {
    pub total_dsc_minted: String,
    pub total_collateral_value_in_usd: String,
    pub collateralization_ratio: String,
    pub accounts: u64,
    pub liquidation_opportunities: u64,
}
