//! Price-feed monitor. Decides when cached valuations are stale.
//!
//! On every `refresh()`:
//! 1. Load the registered collateral tokens (discovered once, then cached)
//! 2. Read the current price of each token from its source
//! 3. Compare it against the token's accepted baseline
//! 4. Replace the baseline and report the token when the move is significant
//!
//! The monitor owns no timer. Whoever drives it (a UI effect, the block
//! scheduler) decides the cadence.

use std::sync::Arc;

use alloy_primitives::U256;

use dsc_common::error::RiskResult;
use dsc_common::types::{BPS_DENOMINATOR, MonitorConfig, PriceObservation, RefreshOutcome};

use crate::baseline::BaselineStore;
use crate::registry::TokenRegistry;

pub struct PriceFeedMonitor {
    registry: Arc<TokenRegistry>,
    baselines: Arc<BaselineStore>,
    config: MonitorConfig,
}

impl PriceFeedMonitor {
    pub fn new(
        registry: Arc<TokenRegistry>,
        baselines: Arc<BaselineStore>,
        config: MonitorConfig,
    ) -> Self {
        Self {
            registry,
            baselines,
            config,
        }
    }

    /// Poll every registered token once and report which baselines moved.
    ///
    /// A token whose price cannot be read keeps its last known baseline and
    /// is listed in `failed_tokens`; the remaining tokens are still processed.
    /// Only a failure to discover the token list fails the whole call.
    pub async fn refresh(&self) -> RiskResult<RefreshOutcome> {
        let tokens = self.registry.tokens().await?;
        let reader = self.registry.reader();
        let baselines = self.baselines.snapshot();

        let mut outcome = RefreshOutcome::default();
        let mut accepted = Vec::new();

        for token in tokens {
            let current = match reader.get_price(token).await {
                Ok(observation) if observation.is_available() => observation,
                Ok(_) => {
                    tracing::warn!(
                        token = %token.id,
                        symbol = %token.symbol,
                        "Price source returned zero, keeping last baseline"
                    );
                    outcome.failed_tokens.insert(token.id);
                    continue;
                }
                Err(e) => {
                    tracing::warn!(
                        token = %token.id,
                        symbol = %token.symbol,
                        error = %e,
                        "Failed to read price, keeping last baseline"
                    );
                    outcome.failed_tokens.insert(token.id);
                    continue;
                }
            };

            match baselines.get(&token.id) {
                None => {
                    tracing::debug!(
                        token = %token.id,
                        symbol = %token.symbol,
                        price = %current.price,
                        "Initial baseline recorded"
                    );
                    accepted.push(current);
                }
                Some(baseline) => {
                    if is_significant_change(
                        baseline,
                        &current,
                        self.config.significant_change_threshold_bps,
                    ) {
                        tracing::info!(
                            token = %token.id,
                            symbol = %token.symbol,
                            baseline = %baseline.price,
                            current = %current.price,
                            change_bps = %change_bps(baseline, &current).unwrap_or_default(),
                            "Significant price change"
                        );
                        outcome.changed_tokens.insert(token.id);
                        accepted.push(current);
                    }
                }
            }
        }

        self.baselines.replace(accepted);

        if outcome.has_changes() {
            tracing::info!(
                changed = outcome.changed_tokens.len(),
                failed = outcome.failed_tokens.len(),
                "Refresh complete, cached valuations are stale"
            );
        } else {
            tracing::debug!(failed = outcome.failed_tokens.len(), "Refresh complete");
        }

        Ok(outcome)
    }

    pub fn baselines(&self) -> &Arc<BaselineStore> {
        &self.baselines
    }
}

/// `|current - baseline| / baseline >= threshold`, evaluated in integers as
/// `|current - baseline| * 10_000 >= baseline * threshold_bps`.
///
/// Prices are compared at wad scale so a feed that changes its decimals does
/// not look like a price move. A zero baseline never counts as a change.
pub fn is_significant_change(
    baseline: &PriceObservation,
    current: &PriceObservation,
    threshold_bps: u64,
) -> bool {
    let (Some(base), Some(now)) = (baseline.price_wad(), current.price_wad()) else {
        return false;
    };
    if base.is_zero() {
        return false;
    }
    let delta = base.abs_diff(now);
    delta.saturating_mul(U256::from(BPS_DENOMINATOR)) >= base.saturating_mul(U256::from(threshold_bps))
}

/// Relative move in basis points, truncated. `None` for a zero baseline.
pub fn change_bps(baseline: &PriceObservation, current: &PriceObservation) -> Option<U256> {
    let base = baseline.price_wad()?;
    let now = current.price_wad()?;
    if base.is_zero() {
        return None;
    }
    Some(base.abs_diff(now).saturating_mul(U256::from(BPS_DENOMINATOR)) / base)
}
