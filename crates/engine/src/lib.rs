pub mod baseline;
pub mod memory;
pub mod monitor;
pub mod preview;
pub mod registry;
pub mod source;
pub mod valuation;

use std::sync::Arc;

use dsc_common::types::{MonitorConfig, RiskParams};

use crate::baseline::BaselineStore;
use crate::monitor::PriceFeedMonitor;
use crate::preview::RiskPreviewEngine;
use crate::registry::TokenRegistry;
use crate::source::ContractReader;

/// Monitor and preview engine wired to one reader, one token registry and
/// one shared baseline store.
pub struct RiskServices {
    pub monitor: Arc<PriceFeedMonitor>,
    pub preview: Arc<RiskPreviewEngine>,
}

impl RiskServices {
    pub fn new(
        reader: Arc<dyn ContractReader>,
        params: RiskParams,
        monitor_config: MonitorConfig,
    ) -> Self {
        let registry = Arc::new(TokenRegistry::new(reader));
        let baselines = Arc::new(BaselineStore::new());
        Self {
            monitor: Arc::new(PriceFeedMonitor::new(
                registry.clone(),
                baselines.clone(),
                monitor_config,
            )),
            preview: Arc::new(RiskPreviewEngine::new(registry, baselines, params)),
        }
    }
}
