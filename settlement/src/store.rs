//! Quote store abstraction.
//!
//! The store is the single shared mutable resource between the quote
//! engine (creates) and the settlement coordinator (settles). The
//! `compare_and_set_status` operation is the per-key atomic primitive the
//! at-most-once payout guarantee rests on.

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::info;

use ramppay_common::{Quote, QuoteId, QuoteStatus, RampError, Result};

/// Key-value quote store with per-quote atomic status transition.
#[async_trait]
pub trait QuoteStore: Send + Sync {
    /// Persist a new quote. Fails on duplicate id.
    async fn insert(&self, quote: Quote) -> Result<()>;

    /// Fetch a quote by id.
    async fn get(&self, id: &QuoteId) -> Option<Quote>;

    /// Snapshot of quotes whose stored status is Active. Callers must
    /// still apply `effective_status` since the TTL is authoritative.
    async fn active_quotes(&self) -> Vec<Quote>;

    /// Atomically transition the quote's status from `expected` to
    /// `next`. Returns true iff this caller performed the transition.
    async fn compare_and_set_status(
        &self,
        id: &QuoteId,
        expected: QuoteStatus,
        next: QuoteStatus,
    ) -> Result<bool>;
}

/// In-memory quote store.
pub struct InMemoryQuoteStore {
    quotes: DashMap<QuoteId, Quote>,
}

impl InMemoryQuoteStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            quotes: DashMap::new(),
        }
    }

    /// Number of stored quotes.
    pub fn len(&self) -> usize {
        self.quotes.len()
    }

    /// Check if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.quotes.is_empty()
    }
}

impl Default for InMemoryQuoteStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl QuoteStore for InMemoryQuoteStore {
    async fn insert(&self, quote: Quote) -> Result<()> {
        let id = quote.id;
        match self.quotes.entry(id) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(RampError::Internal(format!(
                "duplicate quote id: {}",
                id
            ))),
            dashmap::mapref::entry::Entry::Vacant(entry) => {
                entry.insert(quote);
                info!(quote_id = %id, "Quote stored");
                Ok(())
            }
        }
    }

    async fn get(&self, id: &QuoteId) -> Option<Quote> {
        self.quotes.get(id).map(|q| q.clone())
    }

    async fn active_quotes(&self) -> Vec<Quote> {
        self.quotes
            .iter()
            .filter(|q| q.status == QuoteStatus::Active)
            .map(|q| q.clone())
            .collect()
    }

    async fn compare_and_set_status(
        &self,
        id: &QuoteId,
        expected: QuoteStatus,
        next: QuoteStatus,
    ) -> Result<bool> {
        let mut entry = self
            .quotes
            .get_mut(id)
            .ok_or(RampError::QuoteNotFound(*id))?;

        if entry.status != expected {
            return Ok(false);
        }

        if !expected.can_transition_to(next) {
            return Err(RampError::InvalidTransition {
                from: expected,
                to: next,
            });
        }

        entry.status = next;
        info!(quote_id = %id, from = ?expected, to = ?next, "Quote status transitioned");
        Ok(true)
    }
}
