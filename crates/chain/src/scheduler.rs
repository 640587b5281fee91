//! Block-driven refresh scheduler.
//!
//! Prices only change on-chain when a block lands, so the scheduler watches
//! the chain head and runs one monitor refresh per new block:
//! 1. Read the latest block number
//! 2. If it moved since the last refresh, run `PriceFeedMonitor::refresh`
//! 3. Hand outcomes with changed tokens to the caller
//!
//! RPC hiccups are logged and retried on the next poll.

use std::sync::Arc;
use std::time::Duration;

use alloy::providers::{DynProvider, Provider};
use async_trait::async_trait;

use dsc_common::types::RefreshOutcome;
use dsc_engine::monitor::PriceFeedMonitor;

/// Source of the current chain height.
#[async_trait]
pub trait BlockClock: Send + Sync {
    async fn block_number(&self) -> anyhow::Result<u64>;
}

#[async_trait]
impl BlockClock for DynProvider {
    async fn block_number(&self) -> anyhow::Result<u64> {
        Ok(self.get_block_number().await?)
    }
}

pub struct RefreshScheduler {
    clock: Arc<dyn BlockClock>,
    monitor: Arc<PriceFeedMonitor>,
    poll_interval: Duration,
    last_block: Option<u64>,
}

impl RefreshScheduler {
    pub fn new(
        clock: Arc<dyn BlockClock>,
        monitor: Arc<PriceFeedMonitor>,
        poll_interval_ms: u64,
    ) -> Self {
        Self {
            clock,
            monitor,
            poll_interval: Duration::from_millis(poll_interval_ms),
            last_block: None,
        }
    }

    /// Last block a refresh ran for.
    pub fn last_block(&self) -> Option<u64> {
        self.last_block
    }

    /// Refresh once if the chain advanced. Returns `None` when the head has
    /// not moved since the previous refresh.
    ///
    /// A failed refresh leaves `last_block` untouched so the same block is
    /// retried on the next tick.
    pub async fn tick(&mut self) -> anyhow::Result<Option<RefreshOutcome>> {
        let block = self.clock.block_number().await?;
        if self.last_block.is_some_and(|last| block <= last) {
            return Ok(None);
        }

        let outcome = self.monitor.refresh().await?;
        tracing::debug!(
            block,
            changed = outcome.changed_tokens.len(),
            failed = outcome.failed_tokens.len(),
            "Refreshed prices for new block"
        );
        self.last_block = Some(block);
        Ok(Some(outcome))
    }

    /// Wait until a refresh reports at least one changed token.
    pub async fn next_change(&mut self) -> RefreshOutcome {
        loop {
            match self.tick().await {
                Ok(Some(outcome)) if outcome.has_changes() => {
                    if let Some(block) = self.last_block {
                        tracing::info!(
                            block,
                            changed = outcome.changed_tokens.len(),
                            "Price change detected"
                        );
                    }
                    return outcome;
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(error = %e, "Refresh tick failed, retrying");
                }
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}
