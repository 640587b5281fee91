//! Mint, redeem and liquidation previews.
//!
//! Recomputes, off-chain, the numbers the accounting contract will compute
//! again at submission time. Everything here is advisory: previews steer the
//! user away from unsafe actions, the contract enforces.
//!
//! Prices always come from the accepted baselines. Each call takes one
//! baseline snapshot up front, so a refresh landing mid-call cannot mix two
//! price sets in one result.

use std::collections::BTreeMap;
use std::sync::Arc;

use alloy_primitives::U256;
use chrono::Utc;

use dsc_common::error::{RiskError, RiskResult};
use dsc_common::types::{
    AccountId, AccountSnapshot, CollateralToken, HealthFactor, LiquidationDetail,
    LiquidationOpportunity, MintPreview, RedeemPreview, RiskParams, TokenId,
};

use crate::baseline::{BaselineStore, Baselines};
use crate::registry::TokenRegistry;
use crate::valuation;

pub struct RiskPreviewEngine {
    registry: Arc<TokenRegistry>,
    baselines: Arc<BaselineStore>,
    params: RiskParams,
}

impl RiskPreviewEngine {
    pub fn new(
        registry: Arc<TokenRegistry>,
        baselines: Arc<BaselineStore>,
        params: RiskParams,
    ) -> Self {
        Self {
            registry,
            baselines,
            params,
        }
    }

    /// Read an account's position from the contract and value it locally.
    ///
    /// The authoritative health factor is fetched best effort. Disagreement
    /// with the local value is expected while baselines lag the feed.
    pub async fn snapshot(&self, account: AccountId) -> RiskResult<AccountSnapshot> {
        if account.is_zero() {
            return Err(RiskError::InvalidAccount(
                "zero address cannot hold a position".to_string(),
            ));
        }

        let tokens = self.registry.tokens().await?;
        let reader = self.registry.reader();
        let baselines = self.baselines.snapshot();

        let mut balances = BTreeMap::new();
        let mut collateral_value_usd = U256::ZERO;
        for token in tokens {
            let balance = reader
                .get_account_collateral_balance(account, token.id)
                .await?;
            if balance.is_zero() {
                continue;
            }
            let value = valuation::usd_value(&baselines, token, balance)?;
            collateral_value_usd = collateral_value_usd.saturating_add(value);
            balances.insert(token.id, balance);
        }

        let debt_usd = reader.get_account_debt(account).await?;
        let health_factor = valuation::health_factor(
            collateral_value_usd,
            debt_usd,
            self.params.liquidation_threshold_bps,
        );

        let authoritative_health_factor =
            match reader.get_authoritative_health_factor(account).await {
                Ok(factor) => {
                    if factor != health_factor {
                        tracing::debug!(
                            account = %account,
                            local = %health_factor,
                            authoritative = %factor,
                            "Local health factor differs from contract"
                        );
                    }
                    Some(factor)
                }
                Err(e) => {
                    tracing::warn!(
                        account = %account,
                        error = %e,
                        "Could not read authoritative health factor"
                    );
                    None
                }
            };

        Ok(AccountSnapshot {
            account,
            balances,
            collateral_value_usd,
            debt_usd,
            health_factor,
            authoritative_health_factor,
            taken_at: Utc::now(),
        })
    }

    /// What depositing `collateral_amount` of `token` would let the user mint.
    ///
    /// `max_mintable` puts the health factor at exactly 1.0; `target_mintable`
    /// is half of it, a health factor of 2.0.
    pub async fn preview_mint(
        &self,
        token: TokenId,
        collateral_amount: U256,
    ) -> RiskResult<MintPreview> {
        let token = self.registry.get(token).await?;
        let baselines = self.baselines.snapshot();

        let collateral_usd = valuation::usd_value(&baselines, &token, collateral_amount)?;
        let max_mintable =
            valuation::max_debt_for(collateral_usd, self.params.liquidation_threshold_bps);

        Ok(MintPreview {
            token: token.id,
            collateral_amount,
            collateral_usd,
            max_mintable,
            target_mintable: max_mintable / U256::from(2u64),
        })
    }

    /// Health factor after depositing `collateral_amount` and minting
    /// `mint_amount`, on top of an existing position if one is given.
    pub async fn preview_health_after_mint(
        &self,
        position: Option<&AccountSnapshot>,
        token: TokenId,
        collateral_amount: U256,
        mint_amount: U256,
    ) -> RiskResult<HealthFactor> {
        let token = self.registry.get(token).await?;
        let baselines = self.baselines.snapshot();

        let added_usd = valuation::usd_value(&baselines, &token, collateral_amount)?;
        let (collateral_usd, debt_usd) = position
            .map(|snapshot| (snapshot.collateral_value_usd, snapshot.debt_usd))
            .unwrap_or_default();

        Ok(valuation::health_factor(
            collateral_usd.saturating_add(added_usd),
            debt_usd.saturating_add(mint_amount),
            self.params.liquidation_threshold_bps,
        ))
    }

    /// Collateral released when burning `debt_to_burn` DSC against `token`.
    pub async fn preview_redeem(
        &self,
        token: TokenId,
        debt_to_burn: U256,
    ) -> RiskResult<RedeemPreview> {
        let token = self.registry.get(token).await?;
        let baselines = self.baselines.snapshot();

        let collateral_amount = valuation::token_amount_from_usd(&baselines, &token, debt_to_burn)?;

        Ok(RedeemPreview {
            token: token.id,
            debt_to_burn,
            collateral_amount,
            health_factor_after: None,
        })
    }

    /// `preview_redeem` checked against what the account actually holds.
    ///
    /// Fails with `ExceedsPosition` when burning more DSC than minted or
    /// releasing more collateral than deposited.
    pub async fn preview_redeem_for_account(
        &self,
        snapshot: &AccountSnapshot,
        token: TokenId,
        debt_to_burn: U256,
    ) -> RiskResult<RedeemPreview> {
        if debt_to_burn > snapshot.debt_usd {
            return Err(RiskError::ExceedsPosition(format!(
                "burning {} DSC but only {} minted",
                debt_to_burn, snapshot.debt_usd
            )));
        }

        let token = self.registry.get(token).await?;
        let baselines = self.baselines.snapshot();

        let collateral_amount = valuation::token_amount_from_usd(&baselines, &token, debt_to_burn)?;
        let held = snapshot.balances.get(&token.id).copied().unwrap_or_default();
        if collateral_amount > held {
            return Err(RiskError::ExceedsPosition(format!(
                "releasing {} {} but only {} deposited",
                collateral_amount, token.symbol, held
            )));
        }

        let released_usd = valuation::usd_value(&baselines, &token, collateral_amount)?;
        let health_factor_after = valuation::health_factor(
            snapshot.collateral_value_usd.saturating_sub(released_usd),
            snapshot.debt_usd - debt_to_burn,
            self.params.liquidation_threshold_bps,
        );

        Ok(RedeemPreview {
            token: token.id,
            debt_to_burn,
            collateral_amount,
            health_factor_after: Some(health_factor_after),
        })
    }

    /// Liquidation numbers for every collateral token the account holds.
    ///
    /// Accounts with a health factor of 1.0 or more, or without collateral or
    /// debt, come back with `liquidatable = false` and no details.
    pub async fn preview_liquidation(
        &self,
        snapshot: &AccountSnapshot,
    ) -> RiskResult<LiquidationOpportunity> {
        let mut opportunity = LiquidationOpportunity {
            account: snapshot.account,
            health_factor: snapshot.health_factor,
            collateral_value_usd: snapshot.collateral_value_usd,
            debt_usd: snapshot.debt_usd,
            liquidatable: false,
            details: Vec::new(),
            evaluated_at: Utc::now(),
        };

        if !snapshot.is_liquidatable() {
            return Ok(opportunity);
        }

        let baselines = self.baselines.snapshot();
        for (token_id, balance) in &snapshot.balances {
            if balance.is_zero() {
                continue;
            }
            let token = self.registry.get(*token_id).await?;
            let detail = self.liquidation_detail(&baselines, &token, *balance, snapshot.debt_usd)?;
            opportunity.details.push(detail);
        }

        opportunity.liquidatable = !opportunity.details.is_empty();
        Ok(opportunity)
    }

    /// Snapshot each account and keep the ones that can be liquidated.
    ///
    /// Used to re-verify accounts listed by the aggregation feed. Accounts
    /// that cannot be read are logged and skipped.
    pub async fn scan(&self, accounts: &[AccountId]) -> Vec<LiquidationOpportunity> {
        let mut found = Vec::new();
        for account in accounts {
            let result = match self.snapshot(*account).await {
                Ok(snapshot) => self.preview_liquidation(&snapshot).await,
                Err(e) => Err(e),
            };
            match result {
                Ok(opportunity) if opportunity.liquidatable => found.push(opportunity),
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(account = %account, error = %e, "Skipping account");
                }
            }
        }
        found
    }

    fn liquidation_detail(
        &self,
        baselines: &Baselines,
        token: &CollateralToken,
        balance: U256,
        debt_usd: U256,
    ) -> RiskResult<LiquidationDetail> {
        let debt_to_cover = debt_usd.min(valuation::apply_bps(debt_usd, self.params.close_factor_bps));

        let base_collateral = valuation::token_amount_from_usd(baselines, token, debt_to_cover)?;
        let bonus = valuation::apply_bps(base_collateral, self.params.liquidation_bonus_bps);
        let collateral_to_receive = base_collateral.saturating_add(bonus);

        let collateral_to_receive_usd = valuation::usd_value(baselines, token, collateral_to_receive)?;
        let profitable_to_liquidate = collateral_to_receive_usd > debt_to_cover;

        Ok(LiquidationDetail {
            token: token.id,
            debt_to_cover,
            collateral_to_receive,
            collateral_to_receive_usd,
            profit_estimate: collateral_to_receive_usd.saturating_sub(debt_to_cover),
            profitable_to_liquidate,
            collateral_available: collateral_to_receive <= balance,
        })
    }
}

#[cfg(test)]
mod tests {
    use alloy_primitives::Address;

    use dsc_common::types::{MonitorConfig, WAD};

    use super::*;
    use crate::memory::InMemoryReader;
    use crate::monitor::PriceFeedMonitor;

    const WETH: u8 = 0x7b;

    fn wad(units: u64) -> U256 {
        U256::from(units) * WAD
    }

    struct Harness {
        reader: Arc<InMemoryReader>,
        monitor: PriceFeedMonitor,
        engine: RiskPreviewEngine,
    }

    async fn harness(weth_usd: u64) -> Harness {
        let reader = Arc::new(InMemoryReader::new());
        reader.add_token(InMemoryReader::token(WETH, "WETH", 18));
        reader.set_price_usd(Address::repeat_byte(WETH), weth_usd);

        let registry = Arc::new(TokenRegistry::new(reader.clone()));
        let baselines = Arc::new(BaselineStore::new());
        let monitor = PriceFeedMonitor::new(
            registry.clone(),
            baselines.clone(),
            MonitorConfig::default(),
        );
        monitor.refresh().await.unwrap();

        let engine = RiskPreviewEngine::new(registry, baselines, RiskParams::default());
        Harness {
            reader,
            monitor,
            engine,
        }
    }

    fn weth() -> TokenId {
        Address::repeat_byte(WETH)
    }

    fn user() -> AccountId {
        Address::repeat_byte(0xaa)
    }

    #[tokio::test]
    async fn test_preview_mint_one_weth() {
        let h = harness(2_000).await;
        let preview = h.engine.preview_mint(weth(), WAD).await.unwrap();
        assert_eq!(preview.collateral_usd, wad(2_000));
        assert_eq!(preview.max_mintable, wad(1_000));
        assert_eq!(preview.target_mintable, wad(500));
    }

    #[tokio::test]
    async fn test_mint_targets_match_health_factors() {
        let h = harness(2_000).await;
        let preview = h.engine.preview_mint(weth(), WAD).await.unwrap();

        let at_max = h
            .engine
            .preview_health_after_mint(None, weth(), WAD, preview.max_mintable)
            .await
            .unwrap();
        let at_target = h
            .engine
            .preview_health_after_mint(None, weth(), WAD, preview.target_mintable)
            .await
            .unwrap();
        assert_eq!(at_max, HealthFactor::ONE);
        assert_eq!(at_target.as_wad(), wad(2));
    }

    #[tokio::test]
    async fn test_debt_free_account_is_maximal() {
        let h = harness(2_000).await;
        h.reader.set_balance(user(), weth(), WAD);

        let snapshot = h.engine.snapshot(user()).await.unwrap();
        assert_eq!(snapshot.collateral_value_usd, wad(2_000));
        assert!(snapshot.health_factor.is_maximal());

        let opportunity = h.engine.preview_liquidation(&snapshot).await.unwrap();
        assert!(!opportunity.liquidatable);
        assert!(opportunity.details.is_empty());
    }

    #[tokio::test]
    async fn test_debt_without_collateral_is_never_eligible() {
        let h = harness(2_000).await;
        h.reader.set_debt(user(), wad(500));

        let snapshot = h.engine.snapshot(user()).await.unwrap();
        assert!(snapshot.collateral_value_usd.is_zero());
        assert!(!snapshot.is_liquidatable());

        let opportunity = h.engine.preview_liquidation(&snapshot).await.unwrap();
        assert!(!opportunity.liquidatable);
        assert!(opportunity.details.is_empty());
        assert!(h.engine.scan(&[user()]).await.is_empty());
    }

    #[tokio::test]
    async fn test_zero_amount_previews_return_zero() {
        let h = harness(2_000).await;

        let mint = h.engine.preview_mint(weth(), U256::ZERO).await.unwrap();
        assert_eq!(mint.collateral_usd, U256::ZERO);
        assert_eq!(mint.max_mintable, U256::ZERO);
        assert_eq!(mint.target_mintable, U256::ZERO);

        let redeem = h.engine.preview_redeem(weth(), U256::ZERO).await.unwrap();
        assert_eq!(redeem.collateral_amount, U256::ZERO);
    }

    #[tokio::test]
    async fn test_zero_account_rejected() {
        let h = harness(2_000).await;
        assert!(matches!(
            h.engine.snapshot(Address::ZERO).await,
            Err(RiskError::InvalidAccount(_))
        ));
    }

    #[tokio::test]
    async fn test_boundary_account_not_liquidatable() {
        // 0.8 WETH at 2000 = 1600 USD against 800 DSC
        let h = harness(2_000).await;
        h.reader
            .set_balance(user(), weth(), WAD * U256::from(8u64) / U256::from(10u64));
        h.reader.set_debt(user(), wad(800));

        let snapshot = h.engine.snapshot(user()).await.unwrap();
        assert_eq!(snapshot.collateral_value_usd, wad(1_600));
        assert_eq!(snapshot.health_factor, HealthFactor::ONE);

        let opportunity = h.engine.preview_liquidation(&snapshot).await.unwrap();
        assert!(!opportunity.liquidatable);
    }

    #[tokio::test]
    async fn test_underwater_account_detail() {
        let h = harness(2_000).await;
        h.reader.set_balance(user(), weth(), WAD);
        h.reader.set_debt(user(), wad(1_000));
        h.monitor.refresh().await.unwrap();

        // Price drops 25%: 1 WETH = 1500, HF = 750 / 1000
        h.reader.set_price_usd(weth(), 1_500);
        h.monitor.refresh().await.unwrap();

        let snapshot = h.engine.snapshot(user()).await.unwrap();
        assert!(snapshot.health_factor.is_liquidatable());

        let opportunity = h.engine.preview_liquidation(&snapshot).await.unwrap();
        assert!(opportunity.liquidatable);
        assert_eq!(opportunity.details.len(), 1);

        let detail = &opportunity.details[0];
        assert_eq!(detail.debt_to_cover, wad(1_000));
        // 1000 USD / 1500 = 0.666.. WETH, plus 10% bonus
        let base = wad(1_000) * WAD / wad(1_500);
        assert_eq!(detail.collateral_to_receive, base + base / U256::from(10u64));
        assert!(detail.profitable_to_liquidate);
        assert!(detail.collateral_to_receive_usd > detail.debt_to_cover);
        assert!(detail.collateral_available);
    }

    #[tokio::test]
    async fn test_close_factor_bounds_debt_to_cover() {
        let reader = Arc::new(InMemoryReader::new());
        reader.add_token(InMemoryReader::token(WETH, "WETH", 18));
        reader.set_price_usd(weth(), 1_000);
        reader.set_balance(user(), weth(), WAD);
        reader.set_debt(user(), wad(800));

        let registry = Arc::new(TokenRegistry::new(reader.clone()));
        let baselines = Arc::new(BaselineStore::new());
        PriceFeedMonitor::new(registry.clone(), baselines.clone(), MonitorConfig::default())
            .refresh()
            .await
            .unwrap();
        let params = RiskParams {
            close_factor_bps: 5_000,
            ..RiskParams::default()
        };
        let engine = RiskPreviewEngine::new(registry, baselines, params);

        let snapshot = engine.snapshot(user()).await.unwrap();
        let opportunity = engine.preview_liquidation(&snapshot).await.unwrap();
        assert_eq!(opportunity.details[0].debt_to_cover, wad(400));
    }

    #[tokio::test]
    async fn test_insufficient_collateral_flagged() {
        // Deep underwater: payout exceeds what the account holds
        let h = harness(2_000).await;
        h.reader.set_balance(user(), weth(), WAD);
        h.reader.set_debt(user(), wad(1_900));

        let snapshot = h.engine.snapshot(user()).await.unwrap();
        let opportunity = h.engine.preview_liquidation(&snapshot).await.unwrap();
        let detail = &opportunity.details[0];
        assert!(!detail.collateral_available);
        assert!(detail.profitable_to_liquidate);
    }

    #[tokio::test]
    async fn test_zero_bonus_is_not_profitable() {
        let reader = Arc::new(InMemoryReader::new());
        reader.add_token(InMemoryReader::token(WETH, "WETH", 18));
        reader.set_price_usd(weth(), 1_500);
        reader.set_balance(user(), weth(), WAD);
        reader.set_debt(user(), wad(1_000));

        let registry = Arc::new(TokenRegistry::new(reader.clone()));
        let baselines = Arc::new(BaselineStore::new());
        PriceFeedMonitor::new(registry.clone(), baselines.clone(), MonitorConfig::default())
            .refresh()
            .await
            .unwrap();
        let params = RiskParams {
            liquidation_bonus_bps: 0,
            ..RiskParams::default()
        };
        let engine = RiskPreviewEngine::new(registry, baselines, params);

        let snapshot = engine.snapshot(user()).await.unwrap();
        let opportunity = engine.preview_liquidation(&snapshot).await.unwrap();
        for detail in &opportunity.details {
            assert!(!detail.profitable_to_liquidate);
            assert_eq!(detail.profit_estimate, U256::ZERO);
        }
    }

    #[tokio::test]
    async fn test_preview_redeem() {
        let h = harness(2_000).await;
        let preview = h.engine.preview_redeem(weth(), wad(500)).await.unwrap();
        assert_eq!(preview.collateral_amount, WAD / U256::from(4u64));
        assert!(preview.health_factor_after.is_none());
    }

    #[tokio::test]
    async fn test_redeem_beyond_minted_rejected() {
        let h = harness(2_000).await;
        h.reader.set_balance(user(), weth(), WAD);
        h.reader.set_debt(user(), wad(100));
        let snapshot = h.engine.snapshot(user()).await.unwrap();

        assert!(matches!(
            h.engine
                .preview_redeem_for_account(&snapshot, weth(), wad(101))
                .await,
            Err(RiskError::ExceedsPosition(_))
        ));
    }

    #[tokio::test]
    async fn test_redeem_for_account_reports_health_after() {
        let h = harness(2_000).await;
        h.reader.set_balance(user(), weth(), WAD);
        h.reader.set_debt(user(), wad(500));
        let snapshot = h.engine.snapshot(user()).await.unwrap();

        // Burn 250 DSC, release 0.125 WETH (250 USD): 1750 * 50% / 250 = 3.5
        let preview = h
            .engine
            .preview_redeem_for_account(&snapshot, weth(), wad(250))
            .await
            .unwrap();
        assert_eq!(preview.collateral_amount, WAD / U256::from(8u64));
        assert_eq!(
            preview.health_factor_after.unwrap().as_wad(),
            wad(7) / U256::from(2u64)
        );
    }

    #[tokio::test]
    async fn test_preview_without_baseline_is_unavailable() {
        let reader = Arc::new(InMemoryReader::new());
        reader.add_token(InMemoryReader::token(WETH, "WETH", 18));
        let registry = Arc::new(TokenRegistry::new(reader));
        let engine = RiskPreviewEngine::new(
            registry,
            Arc::new(BaselineStore::new()),
            RiskParams::default(),
        );
        assert!(matches!(
            engine.preview_mint(weth(), WAD).await,
            Err(RiskError::PriceUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_scan_keeps_only_liquidatable() {
        let h = harness(2_000).await;
        let healthy = Address::repeat_byte(0x01);
        let underwater = Address::repeat_byte(0x02);
        h.reader.set_balance(healthy, weth(), WAD);
        h.reader.set_debt(healthy, wad(100));
        h.reader.set_balance(underwater, weth(), WAD);
        h.reader.set_debt(underwater, wad(1_500));

        let found = h
            .engine
            .scan(&[healthy, underwater, Address::ZERO])
            .await;
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].account, underwater);
    }

    #[tokio::test]
    async fn test_authoritative_health_factor_carried() {
        let h = harness(2_000).await;
        h.reader.set_balance(user(), weth(), WAD);
        h.reader.set_debt(user(), wad(500));
        // Contract still prices WETH differently; divergence is not an error
        h.reader
            .set_authoritative_health_factor(user(), HealthFactor::from_wad(wad(3)));

        let snapshot = h.engine.snapshot(user()).await.unwrap();
        assert_eq!(snapshot.health_factor.as_wad(), wad(2));
        assert_eq!(
            snapshot.authoritative_health_factor,
            Some(HealthFactor::from_wad(wad(3)))
        );
    }
}
