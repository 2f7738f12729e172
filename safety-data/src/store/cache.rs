//! Epoch-guarded score cache persistence.
#![forbid(unsafe_code)]

use async_trait::async_trait;
use log::warn;
use rusqlite::{OptionalExtension, Transaction, TransactionBehavior, params};
use safety_core::{
    CacheEntry, CacheLookup, CacheWrite, GeocellId, SafetyScore, ScoreCacheStore, StoreError,
};

use super::{SqliteSafetyStore, from_millis, sql_error, to_millis};

fn read_epoch(transaction: &Transaction<'_>, cell: &str) -> Result<u64, StoreError> {
    let raw: Option<i64> = transaction
        .query_row(
            "SELECT epoch FROM cache_epochs WHERE geocell = ?1",
            [cell],
            |row| row.get(0),
        )
        .optional()
        .map_err(sql_error("read cache epoch"))?;
    raw.map_or(Ok(0), |epoch| {
        u64::try_from(epoch).map_err(|_| StoreError::Corrupt {
            entity: "cache epoch",
            reason: format!("negative epoch {epoch}"),
        })
    })
}

fn epoch_to_sql(epoch: u64) -> Result<i64, StoreError> {
    i64::try_from(epoch).map_err(|_| StoreError::Corrupt {
        entity: "cache epoch",
        reason: format!("epoch {epoch} exceeds SQLite integer range"),
    })
}

fn decode_entry(
    geocell: &GeocellId,
    hour: u8,
    score: &str,
    expires_at: i64,
    epoch: i64,
) -> Result<CacheEntry, StoreError> {
    let score: SafetyScore = serde_json::from_str(score).map_err(|err| StoreError::Corrupt {
        entity: "cached score",
        reason: err.to_string(),
    })?;
    Ok(CacheEntry {
        geocell: geocell.clone(),
        hour,
        score,
        expires_at: from_millis("cached score", expires_at)?,
        epoch: u64::try_from(epoch).unwrap_or_default(),
    })
}

#[async_trait]
impl ScoreCacheStore for SqliteSafetyStore {
    async fn lookup(&self, geocell: &GeocellId, hour: u8) -> Result<CacheLookup, StoreError> {
        let owned = geocell.clone();
        self.run("cache lookup", move |connection| {
            let transaction = connection
                .transaction()
                .map_err(sql_error("begin cache lookup"))?;
            let cell = owned.as_str();
            let epoch = read_epoch(&transaction, cell)?;
            let row: Option<(String, i64, i64)> = transaction
                .query_row(
                    "SELECT score, expires_at, epoch FROM score_cache \
                     WHERE geocell = ?1 AND hour = ?2",
                    params![cell, hour],
                    |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
                )
                .optional()
                .map_err(sql_error("read cache entry"))?;
            transaction
                .commit()
                .map_err(sql_error("finish cache lookup"))?;

            let entry = row.and_then(|(score, expires_at, entry_epoch)| {
                match decode_entry(&owned, hour, &score, expires_at, entry_epoch) {
                    Ok(entry) => Some(entry),
                    Err(err) => {
                        warn!("ignoring unreadable cache entry for {owned} hour {hour}: {err}");
                        None
                    }
                }
            });
            Ok(CacheLookup { entry, epoch })
        })
        .await
    }

    async fn store(&self, entry: CacheEntry) -> Result<CacheWrite, StoreError> {
        self.run("cache store", move |connection| {
            let payload = serde_json::to_string(&entry.score)
                .map_err(|err| StoreError::backend("serialise cached score", err))?;
            let transaction = connection
                .transaction_with_behavior(TransactionBehavior::Immediate)
                .map_err(sql_error("begin cache store"))?;
            let cell = entry.geocell.as_str();
            let current_epoch = read_epoch(&transaction, cell)?;
            if current_epoch != entry.epoch {
                return Ok(CacheWrite::Superseded { current_epoch });
            }
            transaction
                .execute(
                    "INSERT OR REPLACE INTO score_cache (geocell, hour, score, expires_at, epoch) \
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![
                        cell,
                        entry.hour,
                        payload,
                        to_millis(entry.expires_at),
                        epoch_to_sql(entry.epoch)?,
                    ],
                )
                .map_err(sql_error("write cache entry"))?;
            transaction
                .commit()
                .map_err(sql_error("commit cache store"))?;
            Ok(CacheWrite::Stored)
        })
        .await
    }

    async fn invalidate(&self, geocell: &GeocellId) -> Result<u64, StoreError> {
        let cell = geocell.to_string();
        self.run("cache invalidate", move |connection| {
            let transaction = connection
                .transaction_with_behavior(TransactionBehavior::Immediate)
                .map_err(sql_error("begin cache invalidation"))?;
            transaction
                .execute("DELETE FROM score_cache WHERE geocell = ?1", [&cell])
                .map_err(sql_error("delete cache entries"))?;
            transaction
                .execute(
                    "INSERT INTO cache_epochs (geocell, epoch) VALUES (?1, 1) \
                     ON CONFLICT(geocell) DO UPDATE SET epoch = epoch + 1",
                    [&cell],
                )
                .map_err(sql_error("bump cache epoch"))?;
            let epoch = read_epoch(&transaction, &cell)?;
            transaction
                .commit()
                .map_err(sql_error("commit cache invalidation"))?;
            Ok(epoch)
        })
        .await
    }
}
