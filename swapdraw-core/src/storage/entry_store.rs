use crate::error::{Result, SwapdrawError};
use crate::storage::Storage;
use crate::types::{EntryOutcome, EntryRequest, EntryState, RequestId};
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};

pub struct EntryStore<'a> {
    storage: &'a Storage,
}

impl<'a> EntryStore<'a> {
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    /// Records a resolved entry. Archiving the same request twice fails.
    pub async fn archive(&self, entry: &EntryRequest, resolved_at: DateTime<Utc>) -> Result<()> {
        let outcome = match entry.state {
            EntryState::Resolved(outcome) => outcome,
            EntryState::Open => {
                return Err(SwapdrawError::internal(format!(
                    "entry {} is still open",
                    entry.request_id
                )))
            }
        };
        let data = serde_json::to_string(entry)?;
        let conn = self.storage.get_connection().await;

        conn.execute(
            "INSERT INTO entries (request_id, participant, stake, threshold, outcome, opened_at, resolved_at, data)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                entry.request_id.0 as i64,
                entry.participant.to_string(),
                entry.stake.to_string(),
                entry.threshold as i64,
                outcome_label(outcome),
                entry.opened_at.timestamp(),
                resolved_at.timestamp(),
                data,
            ],
        )?;

        Ok(())
    }

    pub async fn load(&self, request_id: RequestId) -> Result<Option<EntryRequest>> {
        let conn = self.storage.get_connection().await;

        let data: Option<String> = conn
            .query_row(
                "SELECT data FROM entries WHERE request_id = ?1",
                params![request_id.0 as i64],
                |row| row.get(0),
            )
            .optional()?;

        match data {
            Some(data) => Ok(Some(serde_json::from_str(&data)?)),
            None => Ok(None),
        }
    }

    pub async fn is_archived(&self, request_id: RequestId) -> Result<bool> {
        let conn = self.storage.get_connection().await;

        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM entries WHERE request_id = ?1",
            params![request_id.0 as i64],
            |row| row.get(0),
        )?;

        Ok(count > 0)
    }

    /// Most recently resolved first.
    pub async fn list_recent(&self, limit: usize) -> Result<Vec<EntryRequest>> {
        let conn = self.storage.get_connection().await;

        let mut stmt = conn.prepare(
            "SELECT data FROM entries ORDER BY resolved_at DESC, request_id DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], |row| row.get::<_, String>(0))?;

        let mut entries = Vec::new();
        for row in rows {
            entries.push(serde_json::from_str(&row?)?);
        }

        Ok(entries)
    }

    /// Highest request id this archive has seen, resolved here or relayed
    /// as a remote ticket. A coordinator resuming on the same file continues
    /// after it.
    pub async fn highest_request_id(&self) -> Result<Option<RequestId>> {
        let conn = self.storage.get_connection().await;

        let highest: Option<i64> = conn.query_row(
            "SELECT MAX(id) FROM (
                SELECT request_id AS id FROM entries
                UNION ALL
                SELECT origin_request_id AS id FROM tickets
            )",
            [],
            |row| row.get(0),
        )?;

        Ok(highest.map(|id| RequestId(id as u64)))
    }

    pub async fn count_by_outcome(&self, outcome: EntryOutcome) -> Result<u64> {
        let conn = self.storage.get_connection().await;

        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM entries WHERE outcome = ?1",
            params![outcome_label(outcome)],
            |row| row.get(0),
        )?;

        Ok(count as u64)
    }
}

fn outcome_label(outcome: EntryOutcome) -> &'static str {
    match outcome {
        EntryOutcome::Won => "won",
        EntryOutcome::Lost => "lost",
        EntryOutcome::Expired => "expired",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::TicketStore;
    use crate::types::{Address, BoostSample, OracleRequestId, RemoteTicket, UNIT};

    fn entry(id: u64, state: EntryState) -> EntryRequest {
        let now = Utc::now();
        EntryRequest {
            request_id: RequestId(id),
            participant: Address::from_low_u64(id),
            stake: 5 * UNIT,
            threshold: 20,
            boost: BoostSample {
                participant: Address::from_low_u64(id),
                score: 0,
                sampled_at: now,
            },
            opened_at: now,
            state,
        }
    }

    #[tokio::test]
    async fn test_archive_and_load() {
        let storage = Storage::in_memory().await.unwrap();
        let store = EntryStore::new(&storage);

        let won = entry(1, EntryState::Resolved(EntryOutcome::Won));
        store.archive(&won, Utc::now()).await.unwrap();
        store
            .archive(&entry(2, EntryState::Resolved(EntryOutcome::Lost)), Utc::now())
            .await
            .unwrap();

        assert_eq!(store.load(RequestId(1)).await.unwrap(), Some(won));
        assert!(store.load(RequestId(3)).await.unwrap().is_none());
        assert!(store.is_archived(RequestId(2)).await.unwrap());
        assert_eq!(store.count_by_outcome(EntryOutcome::Won).await.unwrap(), 1);
        assert_eq!(store.list_recent(10).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_highest_request_id_covers_tickets() {
        let storage = Storage::in_memory().await.unwrap();
        let store = EntryStore::new(&storage);
        assert_eq!(store.highest_request_id().await.unwrap(), None);

        store
            .archive(&entry(3, EntryState::Resolved(EntryOutcome::Lost)), Utc::now())
            .await
            .unwrap();
        assert_eq!(store.highest_request_id().await.unwrap(), Some(RequestId(3)));

        let ticket = RemoteTicket {
            origin_request_id: RequestId(7),
            oracle_request_id: OracleRequestId(1),
            fulfilled: false,
            random_value: None,
            created_at: Utc::now(),
        };
        TicketStore::new(&storage).upsert(&ticket).await.unwrap();
        assert_eq!(store.highest_request_id().await.unwrap(), Some(RequestId(7)));
    }

    #[tokio::test]
    async fn test_rejects_open_and_duplicate_entries() {
        let storage = Storage::in_memory().await.unwrap();
        let store = EntryStore::new(&storage);

        assert!(store.archive(&entry(1, EntryState::Open), Utc::now()).await.is_err());

        let lost = entry(1, EntryState::Resolved(EntryOutcome::Lost));
        store.archive(&lost, Utc::now()).await.unwrap();
        assert!(matches!(
            store.archive(&lost, Utc::now()).await,
            Err(SwapdrawError::Storage(_))
        ));
    }
}
