//! HTTP client for the read-only liquidation aggregation service.
//!
//! The service pre-computes a list of at-risk accounts, recent deposits,
//! prices and protocol totals. Nothing it returns is trusted for decisions:
//! `candidate_accounts` only narrows which accounts the local engine scans.

use std::time::Duration;

use alloy_primitives::Address;
use serde::de::DeserializeOwned;

use dsc_common::error::{RiskError, RiskResult};

use crate::models::{
    DepositEvent, DepositEventsResponse, ProtocolMetrics, RemoteLiquidationOpportunity,
    RemotePriceFeed,
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

pub struct AggregatorClient {
    http: reqwest::Client,
    base_url: String,
}

impl AggregatorClient {
    pub fn new(base_url: &str) -> RiskResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| RiskError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `GET /api/liquidations`
    pub async fn liquidations(&self) -> RiskResult<Vec<RemoteLiquidationOpportunity>> {
        self.get_json("liquidations").await
    }

    /// `GET /api/events`
    pub async fn deposit_events(&self) -> RiskResult<Vec<DepositEvent>> {
        let response: DepositEventsResponse = self.get_json("events").await?;
        Ok(response.events)
    }

    /// `GET /api/prices`
    pub async fn prices(&self) -> RiskResult<Vec<RemotePriceFeed>> {
        self.get_json("prices").await
    }

    /// `GET /api/metrics`
    pub async fn metrics(&self) -> RiskResult<ProtocolMetrics> {
        self.get_json("metrics").await
    }

    /// Distinct, well-formed account addresses listed by the service, in
    /// feed order. Entries with a malformed address are skipped.
    pub async fn candidate_accounts(&self) -> RiskResult<Vec<Address>> {
        let opportunities = self.liquidations().await?;
        let mut accounts: Vec<Address> = Vec::with_capacity(opportunities.len());
        for opportunity in &opportunities {
            match opportunity.account() {
                Some(account) if account != Address::ZERO && !accounts.contains(&account) => {
                    accounts.push(account)
                }
                Some(_) => {}
                None => {
                    tracing::warn!(address = %opportunity.address, "Skipping malformed account");
                }
            }
        }
        Ok(accounts)
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/api/{}", self.base_url, path)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> RiskResult<T> {
        let url = self.endpoint(path);
        tracing::debug!(url = %url, "Fetching aggregator feed");

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| RiskError::SourceUnreachable(format!("GET {url}: {e}")))?;

        response
            .json::<T>()
            .await
            .map_err(|e| RiskError::SourceUnreachable(format!("malformed response from {url}: {e}")))
    }
}
