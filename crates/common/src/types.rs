use std::collections::{BTreeMap, BTreeSet};

use alloy_primitives::{Address, U256};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Chain-scoped address of a collateral token.
pub type TokenId = Address;

/// Address of a DSC position holder.
pub type AccountId = Address;

/// One unit of 18-decimal fixed point (`1e18`), the contract's `PRECISION`.
pub const WAD: U256 = U256::from_limbs([1_000_000_000_000_000_000, 0, 0, 0]);

/// Denominator for every ratio expressed in basis points.
pub const BPS_DENOMINATOR: u64 = 10_000;

/// Number of decimals used for all USD amounts.
pub const USD_DECIMALS: u8 = 18;

/// `10^exp` as a 256-bit integer.
pub fn pow10(exp: u8) -> U256 {
    U256::from(10u64).pow(U256::from(exp))
}

/// Rescale a fixed-point value from `decimals` to 18 decimals.
///
/// Returns `None` if the rescaled value does not fit in 256 bits.
pub fn scale_to_wad(value: U256, decimals: u8) -> Option<U256> {
    if decimals <= USD_DECIMALS {
        value.checked_mul(pow10(USD_DECIMALS - decimals))
    } else {
        Some(value / pow10(decimals - USD_DECIMALS))
    }
}

/// Render a wad amount with a fixed number of fractional digits (truncated).
pub fn format_wad(value: U256, fraction_digits: u8) -> String {
    let digits = fraction_digits.min(USD_DECIMALS);
    let whole = value / WAD;
    if digits == 0 {
        return whole.to_string();
    }
    let fraction = (value % WAD) / pow10(USD_DECIMALS - digits);
    format!(
        "{}.{:0>width$}",
        whole,
        fraction.to_string(),
        width = digits as usize
    )
}

/// A collateral token accepted by the accounting contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollateralToken {
    pub id: TokenId,
    pub symbol: String,
    /// Native decimals of the token (18 for WETH).
    pub decimals: u8,
    /// Address of the price source backing this token.
    pub price_feed: Address,
}

/// A single USD price reading for a collateral token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceObservation {
    pub token: TokenId,
    /// Fixed-point USD price scaled by `10^decimals`.
    pub price: U256,
    pub decimals: u8,
    pub observed_at: DateTime<Utc>,
}

impl PriceObservation {
    /// A zero price means the source has nothing usable.
    pub fn is_available(&self) -> bool {
        !self.price.is_zero()
    }

    /// Price normalised to 18 decimals.
    pub fn price_wad(&self) -> Option<U256> {
        scale_to_wad(self.price, self.decimals)
    }
}

/// Health factor of a position, wad-scaled (`1e18` == 1.0).
///
/// A position without debt cannot be liquidated and carries the maximal
/// value, the same sentinel the contract returns (`type(uint256).max`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct HealthFactor(U256);

impl HealthFactor {
    pub const MAX: Self = Self(U256::MAX);
    pub const ONE: Self = Self(WAD);

    pub fn from_wad(value: U256) -> Self {
        Self(value)
    }

    pub fn as_wad(&self) -> U256 {
        self.0
    }

    /// True for debt-free positions.
    pub fn is_maximal(&self) -> bool {
        self.0 == U256::MAX
    }

    /// Strictly below 1.0. A factor of exactly 1.0 is not liquidatable.
    ///
    /// Ratio test only. Account eligibility also needs collateral and debt,
    /// see `AccountSnapshot::is_liquidatable`.
    pub fn is_liquidatable(&self) -> bool {
        self.0 < WAD
    }
}

impl std::fmt::Display for HealthFactor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_maximal() {
            write!(f, "∞")
        } else {
            write!(f, "{}", format_wad(self.0, 2))
        }
    }
}

/// Protocol risk parameters mirrored from the accounting contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskParams {
    /// Share of collateral value that counts toward solvency (5000 = 50%,
    /// i.e. a 200% collateralization requirement).
    pub liquidation_threshold_bps: u64,
    /// Extra collateral awarded to a liquidator on top of the repaid debt.
    pub liquidation_bonus_bps: u64,
    /// Maximum share of an account's debt one liquidation may repay.
    pub close_factor_bps: u64,
}

impl Default for RiskParams {
    fn default() -> Self {
        Self {
            liquidation_threshold_bps: 5_000,
            liquidation_bonus_bps: 1_000,
            close_factor_bps: BPS_DENOMINATOR,
        }
    }
}

/// Settings for the price-feed monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Relative move from the baseline that counts as significant (50 = 0.5%).
    pub significant_change_threshold_bps: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            significant_change_threshold_bps: 50,
        }
    }
}

/// Result of one `PriceFeedMonitor::refresh` pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshOutcome {
    /// Tokens whose baseline was replaced during this pass.
    pub changed_tokens: BTreeSet<TokenId>,
    /// Tokens whose price could not be read; their baseline was kept.
    pub failed_tokens: BTreeSet<TokenId>,
}

impl RefreshOutcome {
    pub fn has_changes(&self) -> bool {
        !self.changed_tokens.is_empty()
    }
}

/// Point-in-time view of one account, rebuilt on demand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSnapshot {
    pub account: AccountId,
    /// Deposited collateral per token, in native token units.
    pub balances: BTreeMap<TokenId, U256>,
    /// Total collateral value in USD (wad).
    pub collateral_value_usd: U256,
    /// Minted DSC (wad, pegged 1:1 to USD).
    pub debt_usd: U256,
    /// Health factor computed locally from baseline prices.
    pub health_factor: HealthFactor,
    /// Health factor as reported by the contract, when it could be read.
    pub authoritative_health_factor: Option<HealthFactor>,
    pub taken_at: DateTime<Utc>,
}

impl AccountSnapshot {
    /// Eligible for liquidation: holds collateral, owes debt, and the health
    /// factor is strictly below 1.0. Without collateral there is nothing to
    /// seize, so a debt-only account is never eligible.
    pub fn is_liquidatable(&self) -> bool {
        !self.collateral_value_usd.is_zero()
            && !self.debt_usd.is_zero()
            && self.health_factor.is_liquidatable()
    }
}

/// Outcome of depositing collateral, before any DSC is minted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintPreview {
    pub token: TokenId,
    pub collateral_amount: U256,
    pub collateral_usd: U256,
    /// Mint amount that puts the health factor at exactly 1.0.
    pub max_mintable: U256,
    /// Conservative mint amount yielding a health factor of 2.0.
    pub target_mintable: U256,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedeemPreview {
    pub token: TokenId,
    pub debt_to_burn: U256,
    /// Collateral released for the burned DSC, in native token units.
    pub collateral_amount: U256,
    /// Only known when previewed against an account snapshot.
    pub health_factor_after: Option<HealthFactor>,
}

/// Liquidation numbers for one collateral token of an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiquidationDetail {
    pub token: TokenId,
    /// DSC the liquidator burns (wad).
    pub debt_to_cover: U256,
    /// Collateral paid out including the bonus, in native token units.
    pub collateral_to_receive: U256,
    pub collateral_to_receive_usd: U256,
    /// `collateral_to_receive_usd - debt_to_cover`, floored at zero.
    pub profit_estimate: U256,
    pub profitable_to_liquidate: bool,
    /// False when the account holds less of this token than the payout; the
    /// contract would reject such a liquidation.
    pub collateral_available: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiquidationOpportunity {
    pub account: AccountId,
    pub health_factor: HealthFactor,
    pub collateral_value_usd: U256,
    pub debt_usd: U256,
    pub liquidatable: bool,
    pub details: Vec<LiquidationDetail>,
    pub evaluated_at: DateTime<Utc>,
}
