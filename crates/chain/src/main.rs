use std::sync::Arc;

use dsc_aggregator::AggregatorClient;
use dsc_chain::contract::DscContractReader;
use dsc_chain::scheduler::RefreshScheduler;
use dsc_common::config::RiskConfig;
use dsc_common::types::format_wad;
use dsc_engine::RiskServices;
use dsc_engine::preview::RiskPreviewEngine;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dsc_monitor=info,dsc_chain=info,dsc_engine=info".into()),
        )
        .json()
        .init();

    tracing::info!("DSC risk monitor starting...");

    let config = RiskConfig::from_env()?;

    let reader = Arc::new(DscContractReader::new(
        &config.rpc_url,
        &config.engine_address,
    )?);
    let clock = Arc::new(reader.provider().clone());
    let services = RiskServices::new(reader, config.risk_params()?, config.monitor_config()?);
    let aggregator = AggregatorClient::new(&config.aggregator_url)?;

    let mut scheduler = RefreshScheduler::new(
        clock,
        services.monitor.clone(),
        config.block_poll_interval_ms,
    );

    tracing::info!(
        engine = %config.engine_address,
        aggregator = %aggregator.base_url(),
        "Watching collateral prices"
    );

    // Seed baselines and run a first scan before waiting for moves
    match scheduler.tick().await {
        Ok(_) => scan_candidates(&aggregator, &services.preview).await,
        Err(e) => tracing::warn!(error = %e, "Initial refresh failed, will retry on next block"),
    }

    loop {
        tokio::select! {
            outcome = scheduler.next_change() => {
                tracing::info!(
                    changed = ?outcome.changed_tokens,
                    "Re-scanning accounts after price change"
                );
                scan_candidates(&aggregator, &services.preview).await;
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Received shutdown signal, stopping gracefully...");
                break;
            }
        }
    }

    tracing::info!("DSC risk monitor stopped.");
    Ok(())
}

/// Re-verify the accounts the aggregation feed lists and log the ones that
/// are liquidatable at current baselines.
async fn scan_candidates(aggregator: &AggregatorClient, preview: &RiskPreviewEngine) {
    let accounts = match aggregator.candidate_accounts().await {
        Ok(accounts) => accounts,
        Err(e) => {
            tracing::warn!(error = %e, "Aggregator feed unavailable, skipping scan");
            return;
        }
    };

    let found = preview.scan(&accounts).await;
    for opportunity in &found {
        let best = opportunity
            .details
            .iter()
            .filter(|d| d.profitable_to_liquidate && d.collateral_available)
            .max_by_key(|d| d.profit_estimate);
        tracing::info!(
            account = %opportunity.account,
            health_factor = %opportunity.health_factor,
            debt_usd = %format_wad(opportunity.debt_usd, 2),
            best_token = ?best.map(|d| d.token),
            best_profit_usd = ?best.map(|d| format_wad(d.profit_estimate, 2)),
            "Liquidatable account"
        );
    }

    tracing::info!(
        scanned = accounts.len(),
        liquidatable = found.len(),
        "Scan complete"
    );
}
