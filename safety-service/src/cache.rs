//! Hour-granular score cache with per-cell invalidation.
//!
//! Entries live in a [`ScoreCacheStore`] keyed by `(geocell, hour)`. Each
//! cell carries an epoch that invalidation bumps in the same atomic step
//! that deletes its entries; a write-back must present the epoch observed by
//! its lookup, so a score computed before an invalidation is never stored
//! after it.
//!
//! Read and write failures are logged and treated as a miss or a skipped
//! write. Invalidation failures propagate.
#![forbid(unsafe_code)]

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use log::{debug, warn};
use safety_core::{
    CacheEntry, CacheWrite, GeocellId, SafetyScore, ScoreCacheStore, StoreError,
};

/// Result of [`ScoreCache::lookup`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheProbe {
    /// A fresh entry was found.
    Hit(SafetyScore),
    /// No usable entry; compute and write back with `epoch`.
    Miss {
        /// Epoch observed by the lookup, or `None` when the store could not
        /// be read and the write-back must be skipped.
        epoch: Option<u64>,
    },
}

/// Score cache over a [`ScoreCacheStore`].
#[derive(Clone)]
pub struct ScoreCache {
    store: Arc<dyn ScoreCacheStore>,
    ttl: Duration,
}

impl std::fmt::Debug for ScoreCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScoreCache")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl ScoreCache {
    /// Cache writing entries that live for `ttl`.
    pub fn new(store: Arc<dyn ScoreCacheStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    /// Lifetime of new entries.
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Look up the entry for `(geocell, hour)`.
    ///
    /// Entries are served unchanged, including their original
    /// `calculated_at`, while `now` is before their expiry.
    pub async fn lookup(&self, geocell: &GeocellId, hour: u8, now: DateTime<Utc>) -> CacheProbe {
        match self.store.lookup(geocell, hour).await {
            Ok(lookup) => match lookup.entry {
                Some(entry) if entry.is_fresh(now) => {
                    debug!("cache hit for {geocell} at hour {hour}");
                    CacheProbe::Hit(entry.score)
                }
                Some(_) => {
                    debug!("cache entry for {geocell} at hour {hour} expired");
                    CacheProbe::Miss {
                        epoch: Some(lookup.epoch),
                    }
                }
                None => {
                    debug!("cache miss for {geocell} at hour {hour}");
                    CacheProbe::Miss {
                        epoch: Some(lookup.epoch),
                    }
                }
            },
            Err(err) => {
                warn!("cache lookup for {geocell} failed, computing directly: {err}");
                CacheProbe::Miss { epoch: None }
            }
        }
    }

    /// Write `score` for `(geocell, hour)` under `epoch`.
    ///
    /// Returns `true` when the entry was stored. A write refused because the
    /// cell was invalidated since `epoch`, or one that failed in the store,
    /// returns `false`.
    pub async fn store(
        &self,
        geocell: &GeocellId,
        hour: u8,
        score: &SafetyScore,
        now: DateTime<Utc>,
        epoch: u64,
    ) -> bool {
        let entry = CacheEntry {
            geocell: geocell.clone(),
            hour,
            score: score.clone(),
            expires_at: now + self.ttl,
            epoch,
        };
        match self.store.store(entry).await {
            Ok(CacheWrite::Stored) => true,
            Ok(CacheWrite::Superseded { current_epoch }) => {
                debug!(
                    "skipped cache write for {geocell}: epoch moved from {epoch} to {current_epoch}"
                );
                false
            }
            Err(err) => {
                warn!("cache write for {geocell} failed: {err}");
                false
            }
        }
    }

    /// Drop every cached hour for `geocell` and bump its epoch.
    ///
    /// # Errors
    /// Returns the store error so the caller can report stale data.
    pub async fn invalidate(&self, geocell: &GeocellId) -> Result<u64, StoreError> {
        let epoch = self.store.invalidate(geocell).await?;
        debug!("invalidated cached scores for {geocell}, epoch now {epoch}");
        Ok(epoch)
    }
}
