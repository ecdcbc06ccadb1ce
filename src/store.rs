use anyhow::Result;
use serde::Serialize;
use serde::de::DeserializeOwned;
use sqlx::{Row, sqlite::SqlitePool};

use crate::models::{ArchivedMessage, Candidate};

const SCAN_RESULTS_KEY: &str = "scan_results";
const IGNORED_SENDERS_KEY: &str = "ignored_senders";
const ARCHIVED_KEY: &str = "archived_messages";

/// How many archive records are kept for undo; oldest evicted first.
pub const MAX_ARCHIVED: usize = 50;

/// Whole-value key-value store over sqlite. Every value is one JSON
/// document; there is no partial update, a writer always replaces the value
/// under its key.
#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    pub async fn new(database_url: &str) -> Result<Self> {
        use sqlx::sqlite::SqliteConnectOptions;
        use std::str::FromStr;

        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);

        let pool = SqlitePool::connect_with(options).await?;
        Ok(Self { pool })
    }

    pub async fn run_migrations(&self) -> Result<()> {
        let schema = include_str!("../schema.sql");
        sqlx::query(schema).execute(&self.pool).await?;
        Ok(())
    }

    #[cfg(test)]
    pub async fn open_in_memory() -> Result<Self> {
        let store = Self::new("sqlite::memory:").await?;
        store.run_migrations().await?;
        Ok(store)
    }

    async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let row = sqlx::query("SELECT value FROM kv WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let raw: String = row.get(0);
                Ok(Some(serde_json::from_str(&raw)?))
            }
            None => Ok(None),
        }
    }

    async fn set<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let raw = serde_json::to_string(value)?;
        sqlx::query(
            "INSERT INTO kv (key, value) VALUES (?, ?)
             ON CONFLICT(key) DO UPDATE SET value=excluded.value",
        )
        .bind(key)
        .bind(raw)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn scan_results(&self) -> Result<Vec<Candidate>> {
        Ok(self.get(SCAN_RESULTS_KEY).await?.unwrap_or_default())
    }

    /// Replaces the previous scan's results wholesale; there is no merge.
    pub async fn replace_scan_results(&self, results: &[Candidate]) -> Result<()> {
        self.set(SCAN_RESULTS_KEY, &results).await
    }

    pub async fn remove_scan_result(&self, id: &str) -> Result<()> {
        let mut results = self.scan_results().await?;
        let before = results.len();
        results.retain(|c| c.id != id);
        if results.len() != before {
            self.replace_scan_results(&results).await?;
        }
        Ok(())
    }

    pub async fn ignored_senders(&self) -> Result<Vec<String>> {
        Ok(self.get(IGNORED_SENDERS_KEY).await?.unwrap_or_default())
    }

    pub async fn add_ignored_sender(&self, sender: &str) -> Result<()> {
        let mut senders = self.ignored_senders().await?;
        if !senders.iter().any(|s| s == sender) {
            senders.push(sender.to_string());
            self.set(IGNORED_SENDERS_KEY, &senders).await?;
        }
        Ok(())
    }

    pub async fn remove_ignored_sender(&self, sender: &str) -> Result<()> {
        let mut senders = self.ignored_senders().await?;
        let before = senders.len();
        senders.retain(|s| s != sender);
        if senders.len() != before {
            self.set(IGNORED_SENDERS_KEY, &senders).await?;
        }
        Ok(())
    }

    pub async fn archived_messages(&self) -> Result<Vec<ArchivedMessage>> {
        Ok(self.get(ARCHIVED_KEY).await?.unwrap_or_default())
    }

    /// Appends an archive record, ignoring ids already present. The list is
    /// capped at [`MAX_ARCHIVED`]; insertion beyond the cap evicts from the
    /// front.
    pub async fn push_archived(&self, record: ArchivedMessage) -> Result<()> {
        let mut records = self.archived_messages().await?;
        if records.iter().any(|r| r.id == record.id) {
            return Ok(());
        }
        records.push(record);
        if records.len() > MAX_ARCHIVED {
            let excess = records.len() - MAX_ARCHIVED;
            records.drain(..excess);
        }
        self.set(ARCHIVED_KEY, &records).await
    }

    pub async fn remove_archived(&self, id: &str) -> Result<()> {
        let mut records = self.archived_messages().await?;
        let before = records.len();
        records.retain(|r| r.id != id);
        if records.len() != before {
            self.set(ARCHIVED_KEY, &records).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn candidate(id: &str, sender: &str) -> Candidate {
        Candidate {
            id: id.into(),
            sender: sender.into(),
            subject: format!("subject {id}"),
            actions: vec![crate::models::UnsubscribeAction::Web {
                url: format!("https://news.example/u/{id}"),
            }],
        }
    }

    fn record(id: &str) -> ArchivedMessage {
        ArchivedMessage {
            id: id.into(),
            sender: "news@example.com".into(),
            subject: format!("subject {id}"),
            archived_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn scan_results_round_trip_and_replace() {
        let store = Store::open_in_memory().await.unwrap();
        assert!(store.scan_results().await.unwrap().is_empty());

        store
            .replace_scan_results(&[candidate("m1", "a"), candidate("m2", "b")])
            .await
            .unwrap();
        assert_eq!(store.scan_results().await.unwrap().len(), 2);

        // A new scan supersedes the old one wholesale.
        store
            .replace_scan_results(&[candidate("m3", "c")])
            .await
            .unwrap();
        let results = store.scan_results().await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "m3");
    }

    #[tokio::test]
    async fn remove_scan_result_drops_only_the_matching_id() {
        let store = Store::open_in_memory().await.unwrap();
        store
            .replace_scan_results(&[candidate("m1", "a"), candidate("m2", "b")])
            .await
            .unwrap();
        store.remove_scan_result("m1").await.unwrap();
        let results = store.scan_results().await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "m2");
    }

    #[tokio::test]
    async fn ignored_senders_behave_as_a_set() {
        let store = Store::open_in_memory().await.unwrap();
        store.add_ignored_sender("news@example.com").await.unwrap();
        store.add_ignored_sender("news@example.com").await.unwrap();
        assert_eq!(store.ignored_senders().await.unwrap().len(), 1);

        store
            .remove_ignored_sender("news@example.com")
            .await
            .unwrap();
        assert!(store.ignored_senders().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn archived_records_dedup_by_id() {
        let store = Store::open_in_memory().await.unwrap();
        store.push_archived(record("m1")).await.unwrap();
        store.push_archived(record("m1")).await.unwrap();
        assert_eq!(store.archived_messages().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn archived_records_cap_evicts_oldest_first() {
        let store = Store::open_in_memory().await.unwrap();
        for i in 0..MAX_ARCHIVED + 3 {
            store.push_archived(record(&format!("m{i}"))).await.unwrap();
        }
        let records = store.archived_messages().await.unwrap();
        assert_eq!(records.len(), MAX_ARCHIVED);
        // m0..m2 were evicted; the newest entry is still last.
        assert_eq!(records[0].id, "m3");
        assert_eq!(records[records.len() - 1].id, format!("m{}", MAX_ARCHIVED + 2));
    }

    #[tokio::test]
    async fn archive_then_restore_round_trip() {
        let store = Store::open_in_memory().await.unwrap();
        store
            .replace_scan_results(&[candidate("m1", "a")])
            .await
            .unwrap();

        // Archive side: record added, candidate dropped.
        store.push_archived(record("m1")).await.unwrap();
        store.remove_scan_result("m1").await.unwrap();
        assert!(store.scan_results().await.unwrap().is_empty());
        assert_eq!(store.archived_messages().await.unwrap().len(), 1);

        // Restore side: record dropped, candidate not reintroduced.
        store.remove_archived("m1").await.unwrap();
        assert!(store.archived_messages().await.unwrap().is_empty());
        assert!(store.scan_results().await.unwrap().is_empty());
    }
}
