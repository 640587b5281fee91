//! Collateral token registry.
//!
//! The contract's token list is discovered on first use and cached for the
//! lifetime of the process. A failed discovery caches nothing, so the next
//! caller retries it.

use std::sync::Arc;

use tokio::sync::OnceCell;

use dsc_common::error::{RiskError, RiskResult};
use dsc_common::types::{CollateralToken, TokenId};

use crate::source::ContractReader;

pub struct TokenRegistry {
    reader: Arc<dyn ContractReader>,
    tokens: OnceCell<Vec<CollateralToken>>,
}

impl TokenRegistry {
    pub fn new(reader: Arc<dyn ContractReader>) -> Self {
        Self {
            reader,
            tokens: OnceCell::new(),
        }
    }

    /// All registered collateral tokens, discovering them if needed.
    pub async fn tokens(&self) -> RiskResult<&[CollateralToken]> {
        let tokens = self
            .tokens
            .get_or_try_init(|| self.discover())
            .await?;
        Ok(tokens.as_slice())
    }

    /// Look up a registered token by address.
    pub async fn get(&self, id: TokenId) -> RiskResult<CollateralToken> {
        self.tokens()
            .await?
            .iter()
            .find(|token| token.id == id)
            .cloned()
            .ok_or(RiskError::UnknownToken(id))
    }

    /// Whether discovery has already completed.
    pub fn is_loaded(&self) -> bool {
        self.tokens.initialized()
    }

    pub fn reader(&self) -> &Arc<dyn ContractReader> {
        &self.reader
    }

    async fn discover(&self) -> RiskResult<Vec<CollateralToken>> {
        let ids = self.reader.get_collateral_tokens().await.inspect_err(|e| {
            tracing::warn!(
                reader = self.reader.name(),
                error = %e,
                "Failed to fetch collateral tokens"
            );
        })?;

        let mut tokens = Vec::with_capacity(ids.len());
        for id in ids {
            let token = self.reader.get_collateral_token(id).await?;
            tracing::info!(
                token = %token.id,
                symbol = %token.symbol,
                decimals = token.decimals,
                price_feed = %token.price_feed,
                "Registered collateral token"
            );
            tokens.push(token);
        }

        if tokens.is_empty() {
            tracing::warn!("Contract reports no collateral tokens");
        }

        Ok(tokens)
    }
}
