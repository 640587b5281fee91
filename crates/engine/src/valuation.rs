//! Fixed-point USD conversions and the health factor.
//!
//! Mirrors the accounting contract's arithmetic:
//! - USD value = amount * price / 10^token_decimals
//! - health factor = (collateral_usd * threshold) / debt_usd
//!
//! All values are 256-bit integers. USD amounts and the health factor are
//! wad-scaled (18 decimals); token amounts stay in native decimals. Rounding
//! always truncates, as Solidity integer division does.

use alloy_primitives::U256;

use dsc_common::error::{RiskError, RiskResult};
use dsc_common::types::{
    BPS_DENOMINATOR, CollateralToken, HealthFactor, PriceObservation, WAD, pow10,
};

use crate::baseline::Baselines;

/// Wad-scaled baseline price of a token, or `PriceUnavailable`.
pub fn baseline_price_wad(baselines: &Baselines, token: &CollateralToken) -> RiskResult<U256> {
    baselines
        .get(&token.id)
        .and_then(PriceObservation::price_wad)
        .filter(|price| !price.is_zero())
        .ok_or(RiskError::PriceUnavailable(token.id))
}

/// USD value (wad) of `amount` native units of `token` at its accepted baseline.
pub fn usd_value(baselines: &Baselines, token: &CollateralToken, amount: U256) -> RiskResult<U256> {
    let price = baseline_price_wad(baselines, token)?;
    usd_value_at(price, token.decimals, amount).ok_or_else(|| {
        RiskError::Overflow(format!("valuing {amount} {} at {price}", token.symbol))
    })
}

/// Native token amount worth `usd` (wad) at the token's accepted baseline.
pub fn token_amount_from_usd(
    baselines: &Baselines,
    token: &CollateralToken,
    usd: U256,
) -> RiskResult<U256> {
    let price = baseline_price_wad(baselines, token)?;
    token_amount_at(price, token.decimals, usd).ok_or_else(|| {
        RiskError::Overflow(format!("converting {usd} USD into {}", token.symbol))
    })
}

/// `amount * price_wad / 10^decimals`. `None` on overflow.
pub fn usd_value_at(price_wad: U256, token_decimals: u8, amount: U256) -> Option<U256> {
    Some(amount.checked_mul(price_wad)? / pow10(token_decimals))
}

/// `usd * 10^decimals / price_wad`. `None` on overflow or for a zero price.
pub fn token_amount_at(price_wad: U256, token_decimals: u8, usd: U256) -> Option<U256> {
    if price_wad.is_zero() {
        return None;
    }
    Some(usd.checked_mul(pow10(token_decimals))? / price_wad)
}

/// `value * bps / 10_000`.
pub fn apply_bps(value: U256, bps: u64) -> U256 {
    value.saturating_mul(U256::from(bps)) / U256::from(BPS_DENOMINATOR)
}

/// Health factor of a position.
///
/// Collateral is first discounted by the liquidation threshold, then divided
/// by the debt. Without debt the position cannot be liquidated and the result
/// is `HealthFactor::MAX`.
pub fn health_factor(collateral_usd: U256, debt_usd: U256, threshold_bps: u64) -> HealthFactor {
    if debt_usd.is_zero() {
        return HealthFactor::MAX;
    }
    let adjusted = apply_bps(collateral_usd, threshold_bps);
    HealthFactor::from_wad(adjusted.saturating_mul(WAD) / debt_usd)
}

/// Largest debt `collateral_usd` can back at a health factor of exactly 1.0.
pub fn max_debt_for(collateral_usd: U256, threshold_bps: u64) -> U256 {
    apply_bps(collateral_usd, threshold_bps)
}
