//! Last accepted price per collateral token.
//!
//! Readers (previews) and the writer (the price-feed monitor) run
//! concurrently. The map is never mutated in place: a writer clones the
//! current map, applies its updates, and swaps the new `Arc` in. Readers hold
//! an `Arc` snapshot, so a preview sees one consistent set of prices even if
//! a refresh lands halfway through it.
//!
//! State is in-memory only. After a restart the first refresh rebuilds every
//! baseline without signalling changes.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use dsc_common::types::{PriceObservation, TokenId};

/// Immutable view of all baselines at one point in time.
pub type Baselines = HashMap<TokenId, PriceObservation>;

/// Copy-on-write store of per-token baselines.
#[derive(Debug, Default)]
pub struct BaselineStore {
    current: RwLock<Arc<Baselines>>,
}

impl BaselineStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current snapshot. Cheap: clones an `Arc`, not the map.
    pub fn snapshot(&self) -> Arc<Baselines> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Baseline of a single token, if one has been accepted.
    pub fn get(&self, token: &TokenId) -> Option<PriceObservation> {
        self.snapshot().get(token).cloned()
    }

    /// Replace the baselines of the given tokens in one atomic swap.
    ///
    /// Overwrites, never accumulates: applying the same updates twice leaves
    /// the store unchanged.
    pub fn replace(&self, updates: Vec<PriceObservation>) {
        if updates.is_empty() {
            return;
        }
        let mut guard = self
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let mut next = Baselines::clone(&guard);
        for observation in updates {
            next.insert(observation.token, observation);
        }
        *guard = Arc::new(next);
    }

    /// Number of tokens with an accepted baseline (for monitoring).
    pub fn tracked_count(&self) -> usize {
        self.snapshot().len()
    }
}
