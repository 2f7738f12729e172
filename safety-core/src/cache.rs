//! Cached score records.
//!
//! Entries are keyed by `(geocell, hour)`. Each geocell also carries an
//! epoch counter, bumped whenever its entries are invalidated; a write-back
//! computed against an older epoch is refused so stale scores cannot
//! reappear after an invalidation.

use chrono::{DateTime, Utc};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{GeocellId, SafetyScore};

/// A cached score for one `(geocell, hour)` key.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CacheEntry {
    /// Cell the score belongs to.
    pub geocell: GeocellId,
    /// Local hour of day, `0..24`.
    pub hour: u8,
    /// The cached score.
    pub score: SafetyScore,
    /// Instant after which the entry must be recomputed.
    pub expires_at: DateTime<Utc>,
    /// Cell epoch the entry was written under.
    pub epoch: u64,
}

impl CacheEntry {
    /// Return `true` while `now` is before the expiry.
    #[must_use]
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

/// Outcome of a cache read.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CacheLookup {
    /// Stored entry for the key, fresh or not.
    pub entry: Option<CacheEntry>,
    /// Current epoch of the cell.
    pub epoch: u64,
}

/// Outcome of a cache write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheWrite {
    /// The entry was written.
    Stored,
    /// The cell was invalidated after the lookup; nothing was written.
    Superseded {
        /// Epoch the cell has moved on to.
        current_epoch: u64,
    },
}
