use crate::error::Result;
use crate::storage::Storage;
use crate::types::{OracleRequestId, RemoteTicket, RequestId};
use chrono::Utc;
use rusqlite::{params, OptionalExtension, Row};

pub struct TicketStore<'a> {
    storage: &'a Storage,
}

impl<'a> TicketStore<'a> {
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    pub async fn upsert(&self, ticket: &RemoteTicket) -> Result<()> {
        let random_value = match &ticket.random_value {
            Some(value) => Some(serde_json::to_string(value)?),
            None => None,
        };
        let conn = self.storage.get_connection().await;

        conn.execute(
            "INSERT OR REPLACE INTO tickets (origin_request_id, oracle_request_id, fulfilled, random_value, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                ticket.origin_request_id.0 as i64,
                ticket.oracle_request_id.0 as i64,
                ticket.fulfilled,
                random_value,
                ticket.created_at.timestamp(),
                Utc::now().timestamp(),
            ],
        )?;

        Ok(())
    }

    pub async fn load(&self, origin_request_id: RequestId) -> Result<Option<RemoteTicket>> {
        let conn = self.storage.get_connection().await;

        let raw = conn
            .query_row(
                "SELECT origin_request_id, oracle_request_id, fulfilled, random_value, created_at
                 FROM tickets WHERE origin_request_id = ?1",
                params![origin_request_id.0 as i64],
                RawTicket::from_row,
            )
            .optional()?;

        raw.map(RawTicket::into_ticket).transpose()
    }

    pub async fn list_pending(&self) -> Result<Vec<RemoteTicket>> {
        let conn = self.storage.get_connection().await;

        let mut stmt = conn.prepare(
            "SELECT origin_request_id, oracle_request_id, fulfilled, random_value, created_at
             FROM tickets WHERE fulfilled = 0 ORDER BY origin_request_id",
        )?;
        let rows = stmt.query_map([], RawTicket::from_row)?;

        let mut tickets = Vec::new();
        for row in rows {
            tickets.push(row?.into_ticket()?);
        }

        Ok(tickets)
    }
}

struct RawTicket {
    origin_request_id: i64,
    oracle_request_id: i64,
    fulfilled: bool,
    random_value: Option<String>,
    created_at: i64,
}

impl RawTicket {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            origin_request_id: row.get(0)?,
            oracle_request_id: row.get(1)?,
            fulfilled: row.get(2)?,
            random_value: row.get(3)?,
            created_at: row.get(4)?,
        })
    }

    fn into_ticket(self) -> Result<RemoteTicket> {
        let random_value = match self.random_value {
            Some(value) => Some(serde_json::from_str(&value)?),
            None => None,
        };
        Ok(RemoteTicket {
            origin_request_id: RequestId(self.origin_request_id as u64),
            oracle_request_id: OracleRequestId(self.oracle_request_id as u64),
            fulfilled: self.fulfilled,
            random_value,
            created_at: chrono::DateTime::from_timestamp(self.created_at, 0)
                .unwrap_or_else(Utc::now),
        })
    }
}
