//! In-memory `ContractReader`.
//!
//! Serves fixed balances and prices without a chain. Used by tests and by
//! offline previews; prices and failures can be changed between calls.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use alloy_primitives::{Address, U256};
use async_trait::async_trait;
use chrono::Utc;

use dsc_common::error::{RiskError, RiskResult};
use dsc_common::types::{
    AccountId, CollateralToken, HealthFactor, PriceObservation, TokenId, pow10,
};

use crate::source::ContractReader;

/// Decimals used by `set_price_usd`, matching Chainlink USD feeds.
pub const FEED_DECIMALS: u8 = 8;

#[derive(Debug, Default)]
struct State {
    tokens: Vec<CollateralToken>,
    prices: HashMap<TokenId, (U256, u8)>,
    failing_prices: HashSet<TokenId>,
    balances: HashMap<(AccountId, TokenId), U256>,
    debts: HashMap<AccountId, U256>,
    health_factors: HashMap<AccountId, HealthFactor>,
    unreachable: bool,
    token_list_reads: usize,
    price_reads: usize,
}

#[derive(Debug, Default)]
pub struct InMemoryReader {
    state: Mutex<State>,
}

impl InMemoryReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Token with id `0xbyte…byte` and a price feed derived from it.
    pub fn token(byte: u8, symbol: &str, decimals: u8) -> CollateralToken {
        CollateralToken {
            id: Address::repeat_byte(byte),
            symbol: symbol.to_string(),
            decimals,
            price_feed: Address::repeat_byte(!byte),
        }
    }

    pub fn add_token(&self, token: CollateralToken) {
        self.state().tokens.push(token);
    }

    pub fn set_price(&self, token: TokenId, price: U256, decimals: u8) {
        self.state().prices.insert(token, (price, decimals));
    }

    /// Set a whole-dollar price with 8 decimals.
    pub fn set_price_usd(&self, token: TokenId, usd: u64) {
        self.set_price(token, U256::from(usd) * pow10(FEED_DECIMALS), FEED_DECIMALS);
    }

    /// Make reads of this token's price fail as unreachable.
    pub fn set_price_failing(&self, token: TokenId, failing: bool) {
        let mut state = self.state();
        if failing {
            state.failing_prices.insert(token);
        } else {
            state.failing_prices.remove(&token);
        }
    }

    pub fn set_balance(&self, account: AccountId, token: TokenId, amount: U256) {
        self.state().balances.insert((account, token), amount);
    }

    pub fn set_debt(&self, account: AccountId, debt: U256) {
        self.state().debts.insert(account, debt);
    }

    pub fn set_authoritative_health_factor(&self, account: AccountId, factor: HealthFactor) {
        self.state().health_factors.insert(account, factor);
    }

    /// Make every read fail as unreachable.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.state().unreachable = unreachable;
    }

    /// How many times the token list was fetched.
    pub fn token_list_reads(&self) -> usize {
        self.state().token_list_reads
    }

    /// How many price reads were attempted.
    pub fn price_reads(&self) -> usize {
        self.state().price_reads
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn reachable(&self) -> RiskResult<MutexGuard<'_, State>> {
        let state = self.state();
        if state.unreachable {
            return Err(RiskError::SourceUnreachable(
                "in-memory source marked unreachable".to_string(),
            ));
        }
        Ok(state)
    }
}

#[async_trait]
impl ContractReader for InMemoryReader {
    async fn get_collateral_tokens(&self) -> RiskResult<Vec<TokenId>> {
        let mut state = self.reachable()?;
        state.token_list_reads += 1;
        Ok(state.tokens.iter().map(|token| token.id).collect())
    }

    async fn get_collateral_token(&self, token: TokenId) -> RiskResult<CollateralToken> {
        self.reachable()?
            .tokens
            .iter()
            .find(|candidate| candidate.id == token)
            .cloned()
            .ok_or(RiskError::UnknownToken(token))
    }

    async fn get_price(&self, token: &CollateralToken) -> RiskResult<PriceObservation> {
        let mut state = self.reachable()?;
        state.price_reads += 1;
        if state.failing_prices.contains(&token.id) {
            return Err(RiskError::SourceUnreachable(format!(
                "price feed {} not responding",
                token.price_feed
            )));
        }
        let (price, decimals) = state
            .prices
            .get(&token.id)
            .copied()
            .ok_or(RiskError::PriceUnavailable(token.id))?;
        Ok(PriceObservation {
            token: token.id,
            price,
            decimals,
            observed_at: Utc::now(),
        })
    }

    async fn get_account_collateral_balance(
        &self,
        account: AccountId,
        token: TokenId,
    ) -> RiskResult<U256> {
        Ok(self
            .reachable()?
            .balances
            .get(&(account, token))
            .copied()
            .unwrap_or_default())
    }

    async fn get_account_debt(&self, account: AccountId) -> RiskResult<U256> {
        Ok(self
            .reachable()?
            .debts
            .get(&account)
            .copied()
            .unwrap_or_default())
    }

    async fn get_authoritative_health_factor(
        &self,
        account: AccountId,
    ) -> RiskResult<HealthFactor> {
        self.reachable()?
            .health_factors
            .get(&account)
            .copied()
            .ok_or_else(|| {
                RiskError::SourceUnreachable(format!("no health factor recorded for {account}"))
            })
    }

    fn name(&self) -> &'static str {
        "in-memory"
    }
}
