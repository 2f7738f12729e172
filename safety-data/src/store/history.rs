//! Per-day score history persistence.
#![forbid(unsafe_code)]

use async_trait::async_trait;
use chrono::NaiveDate;
use rusqlite::{OptionalExtension, TransactionBehavior, params};
use safety_core::{GeocellId, HistoryBucket, HistoryStore, HourlyScore, StoreError};

use super::{SqliteSafetyStore, sql_error};

fn decode(payload: &str) -> Result<HistoryBucket, StoreError> {
    serde_json::from_str(payload).map_err(|err| StoreError::Corrupt {
        entity: "history bucket",
        reason: err.to_string(),
    })
}

fn day_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

#[async_trait]
impl HistoryStore for SqliteSafetyStore {
    async fn record(
        &self,
        geocell: &GeocellId,
        date: NaiveDate,
        entry: HourlyScore,
    ) -> Result<HistoryBucket, StoreError> {
        let owned = geocell.clone();
        self.run("history record", move |connection| {
            let transaction = connection
                .transaction_with_behavior(TransactionBehavior::Immediate)
                .map_err(sql_error("begin history record"))?;
            let day = day_key(date);
            let existing: Option<String> = transaction
                .query_row(
                    "SELECT bucket FROM score_history WHERE geocell = ?1 AND day = ?2",
                    params![owned.as_str(), day],
                    |row| row.get(0),
                )
                .optional()
                .map_err(sql_error("read history bucket"))?;
            let mut bucket = match existing {
                Some(payload) => decode(&payload)?,
                None => HistoryBucket::empty(owned.clone(), date),
            };
            if bucket.record(entry) {
                let payload = serde_json::to_string(&bucket)
                    .map_err(|err| StoreError::backend("serialise history bucket", err))?;
                transaction
                    .execute(
                        "INSERT OR REPLACE INTO score_history (geocell, day, bucket) \
                         VALUES (?1, ?2, ?3)",
                        params![owned.as_str(), day, payload],
                    )
                    .map_err(sql_error("write history bucket"))?;
            }
            transaction
                .commit()
                .map_err(sql_error("commit history record"))?;
            Ok(bucket)
        })
        .await
    }

    async fn bucket(
        &self,
        geocell: &GeocellId,
        date: NaiveDate,
    ) -> Result<Option<HistoryBucket>, StoreError> {
        let cell = geocell.to_string();
        self.run("history bucket", move |connection| {
            let payload: Option<String> = connection
                .query_row(
                    "SELECT bucket FROM score_history WHERE geocell = ?1 AND day = ?2",
                    params![cell, day_key(date)],
                    |row| row.get(0),
                )
                .optional()
                .map_err(sql_error("read history bucket"))?;
            payload.as_deref().map(decode).transpose()
        })
        .await
    }

    async fn buckets_between(
        &self,
        geocell: &GeocellId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<HistoryBucket>, StoreError> {
        let cell = geocell.to_string();
        self.run("history range", move |connection| {
            let mut statement = connection
                .prepare_cached(
                    "SELECT bucket FROM score_history \
                     WHERE geocell = ?1 AND day BETWEEN ?2 AND ?3 ORDER BY day",
                )
                .map_err(sql_error("prepare history range"))?;
            let rows = statement
                .query_map(params![cell, day_key(from), day_key(to)], |row| {
                    row.get::<_, String>(0)
                })
                .map_err(sql_error("query history range"))?;
            rows.map(|row| decode(&row.map_err(sql_error("read history row"))?))
                .collect()
        })
        .await
    }
}
