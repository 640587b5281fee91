//! On-chain `ContractReader` for the DSC engine and its Chainlink feeds.
//!
//! Every read is a plain `eth_call` against the latest block:
//! - token discovery and per-account position go to the engine contract
//! - symbol and decimals go to each collateral token's ERC-20 metadata
//! - prices go to the Chainlink aggregator the engine registered for the token
//!
//! # Usage
//!
//! ```rust,no_run
//! use dsc_chain::contract::DscContractReader;
//! use dsc_engine::source::ContractReader;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let reader = DscContractReader::new(
//!     "https://ethereum-sepolia-rpc.publicnode.com",
//!     "0x28083fa0d374a254d107da7db026cd8c3bd97b28",
//! )?;
//! let tokens = reader.get_collateral_tokens().await?;
//! println!("Engine accepts {} collateral tokens", tokens.len());
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::fmt::Display;
use std::str::FromStr;
use std::sync::{Mutex, PoisonError};

use alloy::primitives::{Address, I256, U256};
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::sol;
use async_trait::async_trait;
use chrono::{TimeZone, Utc};

use dsc_common::error::{RiskError, RiskResult};
use dsc_common::types::{AccountId, CollateralToken, HealthFactor, PriceObservation, TokenId};
use dsc_engine::source::ContractReader;

// Only the view functions the dashboard reads are declared.
sol! {
    #[sol(rpc)]
    interface IDSCEngine {
        function getCollateralTokens() external view returns (address[] memory);
        function getCollateralTokenPriceFeed(address token) external view returns (address);
        function getCollateralBalanceofUser(address user, address token) external view returns (uint256);
        function _getAccountInformation(address user) external view returns (uint256 totalDscMinted, uint256 collateralValueInUsd);
        function getHealthFactor(address user) external view returns (uint256);
    }

    #[sol(rpc)]
    interface IERC20Metadata {
        function symbol() external view returns (string memory);
        function decimals() external view returns (uint8);
    }

    #[sol(rpc)]
    interface AggregatorV3Interface {
        function decimals() external view returns (uint8);
        function latestRoundData() external view returns (uint80 roundId, int256 answer, uint256 startedAt, uint256 updatedAt, uint80 answeredInRound);
    }
}

/// Reads positions and prices from a deployed DSC engine over JSON-RPC.
pub struct DscContractReader {
    provider: DynProvider,
    engine: IDSCEngine::IDSCEngineInstance<DynProvider>,
    /// Feed decimals never change after deployment, so they are read once.
    feed_decimals: Mutex<HashMap<Address, u8>>,
}

impl DscContractReader {
    /// Connect to `rpc_url` and bind the engine at `engine_address`.
    ///
    /// No request is sent until the first read.
    pub fn new(rpc_url: &str, engine_address: &str) -> anyhow::Result<Self> {
        let engine_address = Address::from_str(engine_address)
            .map_err(|e| anyhow::anyhow!("invalid engine address {engine_address}: {e}"))?;
        let provider = ProviderBuilder::new()
            .connect_http(rpc_url.parse()?)
            .erased();
        Ok(Self::with_provider(provider, engine_address))
    }

    pub fn with_provider(provider: DynProvider, engine_address: Address) -> Self {
        Self {
            engine: IDSCEngine::new(engine_address, provider.clone()),
            provider,
            feed_decimals: Mutex::new(HashMap::new()),
        }
    }

    pub fn engine_address(&self) -> Address {
        *self.engine.address()
    }

    /// Provider shared with the block scheduler.
    pub fn provider(&self) -> &DynProvider {
        &self.provider
    }

    async fn feed_decimals(&self, feed: Address) -> RiskResult<u8> {
        if let Some(decimals) = self.cached_decimals(feed) {
            return Ok(decimals);
        }
        let decimals = AggregatorV3Interface::new(feed, self.provider.clone())
            .decimals()
            .call()
            .await
            .map_err(source_unreachable("AggregatorV3Interface.decimals"))?;
        self.feed_decimals
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(feed, decimals);
        Ok(decimals)
    }

    fn cached_decimals(&self, feed: Address) -> Option<u8> {
        self.feed_decimals
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&feed)
            .copied()
    }
}

#[async_trait]
impl ContractReader for DscContractReader {
    async fn get_collateral_tokens(&self) -> RiskResult<Vec<TokenId>> {
        let tokens = self
            .engine
            .getCollateralTokens()
            .call()
            .await
            .map_err(source_unreachable("getCollateralTokens"))?;
        tracing::debug!(
            engine = %self.engine_address(),
            count = tokens.len(),
            "Fetched collateral token list"
        );
        Ok(tokens)
    }

    async fn get_collateral_token(&self, token: TokenId) -> RiskResult<CollateralToken> {
        let price_feed = self
            .engine
            .getCollateralTokenPriceFeed(token)
            .call()
            .await
            .map_err(source_unreachable("getCollateralTokenPriceFeed"))?;
        if price_feed == Address::ZERO {
            return Err(RiskError::UnknownToken(token));
        }

        let metadata = IERC20Metadata::new(token, self.provider.clone());
        let symbol = metadata
            .symbol()
            .call()
            .await
            .map_err(source_unreachable("IERC20Metadata.symbol"))?;
        let decimals = metadata
            .decimals()
            .call()
            .await
            .map_err(source_unreachable("IERC20Metadata.decimals"))?;

        tracing::debug!(
            token = %token,
            symbol = %symbol,
            decimals,
            price_feed = %price_feed,
            "Resolved collateral token"
        );

        Ok(CollateralToken {
            id: token,
            symbol,
            decimals,
            price_feed,
        })
    }

    async fn get_price(&self, token: &CollateralToken) -> RiskResult<PriceObservation> {
        let decimals = self.feed_decimals(token.price_feed).await?;
        let round = AggregatorV3Interface::new(token.price_feed, self.provider.clone())
            .latestRoundData()
            .call()
            .await
            .map_err(source_unreachable("AggregatorV3Interface.latestRoundData"))?;
        observation_from_round(token.id, round.answer, round.updatedAt, decimals)
    }

    async fn get_account_collateral_balance(
        &self,
        account: AccountId,
        token: TokenId,
    ) -> RiskResult<U256> {
        self.engine
            .getCollateralBalanceofUser(account, token)
            .call()
            .await
            .map_err(source_unreachable("getCollateralBalanceofUser"))
    }

    async fn get_account_debt(&self, account: AccountId) -> RiskResult<U256> {
        let info = self
            .engine
            ._getAccountInformation(account)
            .call()
            .await
            .map_err(source_unreachable("_getAccountInformation"))?;
        Ok(info.totalDscMinted)
    }

    async fn get_authoritative_health_factor(
        &self,
        account: AccountId,
    ) -> RiskResult<HealthFactor> {
        self.engine
            .getHealthFactor(account)
            .call()
            .await
            .map(HealthFactor::from_wad)
            .map_err(source_unreachable("getHealthFactor"))
    }

    fn name(&self) -> &'static str {
        "dsc-engine"
    }
}

/// Turn a Chainlink round into an observation.
///
/// A negative answer or a round that never completed (`updatedAt == 0`) is
/// unavailable. A zero answer is passed through for the monitor to reject.
pub fn observation_from_round(
    token: TokenId,
    answer: I256,
    updated_at: U256,
    decimals: u8,
) -> RiskResult<PriceObservation> {
    if answer.is_negative() || updated_at.is_zero() {
        return Err(RiskError::PriceUnavailable(token));
    }
    let observed_at = u64::try_from(updated_at)
        .ok()
        .and_then(|secs| i64::try_from(secs).ok())
        .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
        .unwrap_or_else(Utc::now);

    Ok(PriceObservation {
        token,
        price: answer.into_raw(),
        decimals,
        observed_at,
    })
}

fn source_unreachable<E: Display>(call: &'static str) -> impl FnOnce(E) -> RiskError {
    move |e| RiskError::SourceUnreachable(format!("{call}: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const WETH_SEPOLIA: &str = "0x7b79995e5f793A07Bc00c21412e50Ecae098E7f9";

    fn weth() -> Address {
        Address::from_str(WETH_SEPOLIA).unwrap()
    }

    #[test]
    fn test_positive_round_is_observed() {
        let answer = I256::try_from(200_000_000_000i64).unwrap();
        let observation =
            observation_from_round(weth(), answer, U256::from(1_700_000_000u64), 8).unwrap();

        assert_eq!(observation.price, U256::from(200_000_000_000u64));
        assert_eq!(observation.decimals, 8);
        assert_eq!(observation.observed_at.timestamp(), 1_700_000_000);
    }

    #[test]
    fn test_negative_answer_is_unavailable() {
        let answer = I256::try_from(-1i64).unwrap();
        let err = observation_from_round(weth(), answer, U256::from(1u64), 8).unwrap_err();
        assert!(matches!(err, RiskError::PriceUnavailable(token) if token == weth()));
    }

    #[test]
    fn test_incomplete_round_is_unavailable() {
        let answer = I256::try_from(2_000i64).unwrap();
        let err = observation_from_round(weth(), answer, U256::ZERO, 8).unwrap_err();
        assert!(matches!(err, RiskError::PriceUnavailable(_)));
    }

    #[test]
    fn test_zero_answer_passes_through() {
        let observation =
            observation_from_round(weth(), I256::ZERO, U256::from(1u64), 8).unwrap();
        assert!(!observation.is_available());
    }

    #[test]
    fn test_source_unreachable_wraps_call_name() {
        let err = source_unreachable("getHealthFactor")("connection refused");
        assert!(matches!(err, RiskError::SourceUnreachable(ref msg) if msg.contains("getHealthFactor")));
        assert!(err.is_transient());
    }

    #[test]
    fn test_new_rejects_bad_engine_address() {
        assert!(DscContractReader::new("http://localhost:8545", "0xnot-an-address").is_err());
    }

    #[test]
    fn test_new_binds_engine_address() {
        let reader = DscContractReader::new(
            "http://localhost:8545",
            "0x28083fa0d374a254d107da7db026cd8c3bd97b28",
        )
        .unwrap();
        assert_eq!(
            reader.engine_address(),
            Address::from_str("0x28083fa0d374a254d107da7db026cd8c3bd97b28").unwrap()
        );
        assert_eq!(reader.name(), "dsc-engine");
    }
}
