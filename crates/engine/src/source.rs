use alloy_primitives::U256;
use async_trait::async_trait;

use dsc_common::error::RiskResult;
use dsc_common::types::{AccountId, CollateralToken, HealthFactor, PriceObservation, TokenId};

/// Read-only view of the accounting contract and its price sources.
///
/// The contract stays the source of truth; implementations only fetch. Every
/// network failure maps to `RiskError::SourceUnreachable` and a negative
/// price to `RiskError::PriceUnavailable`. A zero price may be passed through;
/// callers treat it as unavailable.
#[async_trait]
pub trait ContractReader: Send + Sync {
    /// Addresses of every collateral token the contract accepts.
    async fn get_collateral_tokens(&self) -> RiskResult<Vec<TokenId>>;

    /// Symbol, decimals and price source of one collateral token.
    async fn get_collateral_token(&self, token: TokenId) -> RiskResult<CollateralToken>;

    /// Latest price reported by the token's price source.
    async fn get_price(&self, token: &CollateralToken) -> RiskResult<PriceObservation>;

    /// Collateral deposited by `account`, in native token units.
    async fn get_account_collateral_balance(
        &self,
        account: AccountId,
        token: TokenId,
    ) -> RiskResult<U256>;

    /// DSC minted by `account` (wad).
    async fn get_account_debt(&self, account: AccountId) -> RiskResult<U256>;

    /// Health factor as computed by the contract. Display and cross-check only.
    async fn get_authoritative_health_factor(&self, account: AccountId)
    -> RiskResult<HealthFactor>;

    /// Human-readable name for logs (e.g., "DSCEngine (alloy)").
    fn name(&self) -> &'static str;
}
