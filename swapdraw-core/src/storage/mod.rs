//! SQLite archive of resolved entries, remote tickets and ledger snapshots.
//!
//! Live state is held by the coordinators; rows here are append-only audit
//! records and are never deleted.

pub mod entry_store;
pub mod ledger_store;
pub mod ticket_store;

pub use entry_store::EntryStore;
pub use ledger_store::{LedgerSnapshot, LedgerStore};
pub use ticket_store::TicketStore;

use crate::error::Result;
use rusqlite::Connection;
use std::path::Path;
use tokio::sync::Mutex;

pub struct Storage {
    conn: Mutex<Connection>,
}

impl Storage {
    pub async fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let conn = Connection::open(db_path)?;
        let storage = Self {
            conn: Mutex::new(conn),
        };

        storage.init_schema().await?;
        Ok(storage)
    }

    pub async fn in_memory() -> Result<Self> {
        let storage = Self {
            conn: Mutex::new(Connection::open_in_memory()?),
        };
        storage.init_schema().await?;
        Ok(storage)
    }

    async fn init_schema(&self) -> Result<()> {
        let conn = self.conn.lock().await;

        // Resolved origin entries
        conn.execute(
            "CREATE TABLE IF NOT EXISTS entries (
                request_id INTEGER PRIMARY KEY,
                participant TEXT NOT NULL,
                stake TEXT NOT NULL,
                threshold INTEGER NOT NULL,
                outcome TEXT NOT NULL,
                opened_at INTEGER NOT NULL,
                resolved_at INTEGER NOT NULL,
                data TEXT NOT NULL
            )",
            [],
        )?;

        // Remote randomness tickets. Oracle ids are only unique per oracle
        // instance, so they are not a key here.
        conn.execute(
            "CREATE TABLE IF NOT EXISTS tickets (
                origin_request_id INTEGER PRIMARY KEY,
                oracle_request_id INTEGER NOT NULL,
                fulfilled INTEGER NOT NULL,
                random_value TEXT,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS ledger_snapshots (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT UNIQUE NOT NULL,
                recorded_at INTEGER NOT NULL,
                data TEXT NOT NULL
            )",
            [],
        )?;

        Ok(())
    }

    pub async fn get_connection(&self) -> tokio::sync::MutexGuard<'_, Connection> {
        self.conn.lock().await
    }
}
