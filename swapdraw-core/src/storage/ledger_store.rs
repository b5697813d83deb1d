use crate::error::Result;
use crate::ledger::JackpotLedger;
use crate::storage::Storage;
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq)]
pub struct LedgerSnapshot {
    pub id: String,
    pub recorded_at: DateTime<Utc>,
    pub ledger: JackpotLedger,
}

pub struct LedgerStore<'a> {
    storage: &'a Storage,
}

impl<'a> LedgerStore<'a> {
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    /// Appends a snapshot and returns its id.
    pub async fn record(&self, ledger: &JackpotLedger, recorded_at: DateTime<Utc>) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        let data = serde_json::to_string(ledger)?;
        let conn = self.storage.get_connection().await;

        conn.execute(
            "INSERT INTO ledger_snapshots (id, recorded_at, data) VALUES (?1, ?2, ?3)",
            params![id, recorded_at.timestamp(), data],
        )?;

        Ok(id)
    }

    pub async fn latest(&self) -> Result<Option<LedgerSnapshot>> {
        let conn = self.storage.get_connection().await;

        let row: Option<(String, i64, String)> = conn
            .query_row(
                "SELECT id, recorded_at, data FROM ledger_snapshots ORDER BY seq DESC LIMIT 1",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;

        match row {
            Some((id, recorded_at, data)) => Ok(Some(LedgerSnapshot {
                id,
                recorded_at: DateTime::from_timestamp(recorded_at, 0).unwrap_or_else(Utc::now),
                ledger: serde_json::from_str(&data)?,
            })),
            None => Ok(None),
        }
    }

    pub async fn count(&self) -> Result<u64> {
        let conn = self.storage.get_connection().await;
        let count: i64 =
            conn.query_row("SELECT COUNT(*) FROM ledger_snapshots", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}
