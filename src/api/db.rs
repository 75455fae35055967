use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{Connection, OptionalExtension};

use super::error::LeaderboardError;
use super::sources::ClaimSource;
use super::types::{Claim, normalize_account};

/// Opens (or creates) the SQLite claim database and runs migrations.
pub fn init_claim_db(path: &str) -> Result<Connection, LeaderboardError> {
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .map_err(|e| LeaderboardError::ClaimStore(format!("create {parent:?}: {e}")))?;
        }
    }
    let conn = Connection::open(path)?;
    migrate(&conn)?;
    tracing::info!("SQLite claim DB initialized at {path}");
    Ok(conn)
}

fn migrate(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS claim_nonces (
            address     TEXT PRIMARY KEY,
            nonce       TEXT NOT NULL,
            issued_at   TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS claims (
            id          TEXT PRIMARY KEY,
            account     TEXT NOT NULL UNIQUE,
            claimed_at  TEXT NOT NULL
        )",
    )
}

/// Returns `(nonce, issued_at)` for the given address, replacing any previous nonce.
pub fn issue_nonce(conn: &Connection, address: &str) -> Result<(String, String), rusqlite::Error> {
    let addr = normalize_account(address);
    let nonce = generate_nonce();
    let now = chrono::Utc::now().to_rfc3339();

    conn.execute(
        "INSERT INTO claim_nonces (address, nonce, issued_at)
         VALUES (?1, ?2, ?3)
         ON CONFLICT(address) DO UPDATE SET nonce = ?2, issued_at = ?3",
        rusqlite::params![addr, nonce, now],
    )?;

    Ok((nonce, now))
}

/// Verifies the nonce and issued_at match the stored values, then rotates the nonce
/// so a signature cannot be replayed.
pub fn verify_and_rotate_nonce(
    conn: &Connection,
    address: &str,
    nonce: &str,
    issued_at: &str,
) -> Result<bool, rusqlite::Error> {
    let addr = normalize_account(address);

    let stored: Option<(String, String)> = conn
        .query_row(
            "SELECT nonce, issued_at FROM claim_nonces WHERE address = ?1",
            rusqlite::params![addr],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;

    match stored {
        Some((stored_nonce, stored_issued_at))
            if stored_nonce == nonce && stored_issued_at == issued_at =>
        {
            conn.execute(
                "UPDATE claim_nonces SET nonce = ?1 WHERE address = ?2",
                rusqlite::params![generate_nonce(), addr],
            )?;
            Ok(true)
        }
        _ => Ok(false),
    }
}

fn generate_nonce() -> String {
    use rand::Rng;
    let bytes: [u8; 32] = rand::rng().random();
    hex::encode(bytes)
}

/// Records a claim for `account`. Returns false when the account had already claimed.
pub fn insert_claim(conn: &Connection, account: &str) -> Result<bool, rusqlite::Error> {
    let id = uuid::Uuid::new_v4().to_string();
    let now = chrono::Utc::now().to_rfc3339();
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO claims (id, account, claimed_at) VALUES (?1, ?2, ?3)",
        rusqlite::params![id, normalize_account(account), now],
    )?;
    Ok(inserted > 0)
}

pub fn list_claims(conn: &Connection) -> Result<Vec<Claim>, rusqlite::Error> {
    let mut stmt = conn.prepare("SELECT account, claimed_at FROM claims ORDER BY claimed_at")?;
    let claims = stmt
        .query_map([], |row| {
            Ok(Claim {
                account: row.get(0)?,
                claimed_at: row.get(1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(claims)
}

/// Shared handle to the claim database.
#[derive(Clone)]
pub struct ClaimStore {
    conn: Arc<Mutex<Connection>>,
}

impl ClaimStore {
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    /// Runs `f` against the connection on the blocking pool.
    pub async fn with_conn<T, F>(&self, f: F) -> Result<T, LeaderboardError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, rusqlite::Error> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|_| LeaderboardError::ClaimStore("connection lock poisoned".into()))?;
            f(&*guard).map_err(LeaderboardError::from)
        })
        .await
        .map_err(|e| LeaderboardError::ClaimStore(e.to_string()))?
    }
}

#[async_trait]
impl ClaimSource for ClaimStore {
    async fn fetch_claims(&self) -> Result<Vec<Claim>, LeaderboardError> {
        self.with_conn(list_claims).await
    }
}
