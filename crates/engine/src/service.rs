use crate::engine::MatchingEngine;
use crate::error::Result;
use async_trait::async_trait;
use concord_protocol::{Listing, ListingId};
use futures::future::join_all;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

/// Nearest-neighbour lookup of listings worth evaluating against a requester.
#[async_trait]
pub trait CandidateRetriever: Send + Sync {
    async fn retrieve(&self, listing: &Listing) -> Result<Vec<ListingId>>;
}

#[async_trait]
pub trait ListingStore: Send + Sync {
    async fn get(&self, id: &str) -> Result<Option<Listing>>;
}

/// Process-local listing store that also serves as an exhaustive retriever.
#[derive(Debug, Default)]
pub struct InMemoryListingStore {
    listings: RwLock<BTreeMap<ListingId, Listing>>,
    next_id: AtomicUsize,
}

impl InMemoryListingStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a validated listing, assigning an id when it has none.
    pub fn insert(&self, mut listing: Listing) -> Result<ListingId> {
        listing.validate()?;
        let id = match &listing.id {
            Some(id) if !id.trim().is_empty() => id.clone(),
            _ => format!("listing-{}", self.next_id.fetch_add(1, Ordering::Relaxed) + 1),
        };
        listing.id = Some(id.clone());
        self.listings
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.clone(), listing);
        Ok(id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.listings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ListingStore for InMemoryListingStore {
    async fn get(&self, id: &str) -> Result<Option<Listing>> {
        Ok(self
            .listings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned())
    }
}

#[async_trait]
impl CandidateRetriever for InMemoryListingStore {
    /// Every stored listing except the requester itself.
    async fn retrieve(&self, listing: &Listing) -> Result<Vec<ListingId>> {
        Ok(self
            .listings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .filter(|id| listing.id.as_ref() != Some(*id))
            .cloned()
            .collect())
    }
}

/// Batch matching: retrieve candidates, load them, keep those that match.
pub struct MatchService {
    engine: Arc<MatchingEngine>,
    retriever: Arc<dyn CandidateRetriever>,
    store: Arc<dyn ListingStore>,
}

impl MatchService {
    pub fn new(
        engine: Arc<MatchingEngine>,
        retriever: Arc<dyn CandidateRetriever>,
        store: Arc<dyn ListingStore>,
    ) -> Self {
        Self {
            engine,
            retriever,
            store,
        }
    }

    /// Ids of stored listings `requester` is satisfied by. Retrieval and
    /// storage failures only shrink the result.
    pub async fn find_matches(&self, requester: &Listing) -> BTreeSet<ListingId> {
        let ids = match self.retriever.retrieve(requester).await {
            Ok(ids) => ids,
            Err(err) => {
                log::warn!("Candidate retrieval failed: {err}");
                return BTreeSet::new();
            }
        };

        let loads = ids.iter().map(|id| async move { (id, self.store.get(id).await) });
        let mut matched = BTreeSet::new();
        for (id, loaded) in join_all(loads).await {
            match loaded {
                Ok(Some(candidate)) => {
                    if self.engine.matches(requester, &candidate) {
                        matched.insert(id.clone());
                    }
                }
                Ok(None) => log::debug!("Retrieved listing {id} is no longer stored"),
                Err(err) => log::warn!("Could not load listing {id}: {err}"),
            }
        }
        log::debug!("{} of {} candidates matched", matched.len(), ids.len());
        matched
    }
}
