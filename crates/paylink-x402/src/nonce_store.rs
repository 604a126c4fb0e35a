//! Replay protection: a record of authorization nonces already accepted.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use alloy::primitives::B256;
use dashmap::DashMap;

/// Storage for consumed nonces. Implementations must be thread-safe.
pub trait NonceStore: Send + Sync {
    fn is_used(&self, nonce: &B256) -> bool;

    /// Atomically claim a nonce. `false` means it was already claimed.
    fn try_use(&self, nonce: B256) -> bool;

    /// Give a claimed nonce back, e.g. when the action it paid for failed
    /// before doing anything.
    fn release(&self, nonce: &B256);

    /// Drop nonces recorded more than `max_age_secs` ago. Returns the count removed.
    fn purge_expired(&self, max_age_secs: u64) -> usize;
}

/// Purge nonces older than `max_age` from `store` every minute. Needs a
/// tokio runtime.
pub fn spawn_purge_task(
    store: Arc<dyn NonceStore>,
    max_age: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(60));
        loop {
            interval.tick().await;
            let purged = store.purge_expired(max_age.as_secs());
            if purged > 0 {
                tracing::info!(purged, "purged expired nonces");
            }
        }
    })
}

/// In-memory store backed by DashMap. Lost on restart.
#[derive(Default)]
pub struct InMemoryNonceStore {
    nonces: DashMap<B256, Instant>,
}

impl InMemoryNonceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nonces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nonces.is_empty()
    }
}

impl NonceStore for InMemoryNonceStore {
    fn is_used(&self, nonce: &B256) -> bool {
        self.nonces.contains_key(nonce)
    }

    fn try_use(&self, nonce: B256) -> bool {
        use dashmap::mapref::entry::Entry;
        match self.nonces.entry(nonce) {
            Entry::Occupied(_) => false,
            Entry::Vacant(v) => {
                v.insert(Instant::now());
                true
            }
        }
    }

    fn release(&self, nonce: &B256) {
        self.nonces.remove(nonce);
    }

    fn purge_expired(&self, max_age_secs: u64) -> usize {
        let before = self.nonces.len();
        self.nonces
            .retain(|_, recorded| recorded.elapsed().as_secs() < max_age_secs);
        before.saturating_sub(self.nonces.len())
    }
}

/// SQLite-backed store. Survives restarts and is safe across processes
/// sharing the file.
///
/// Every failure path treats the nonce as used.
pub struct SqliteNonceStore {
    conn: Mutex<rusqlite::Connection>,
}

impl SqliteNonceStore {
    /// Open or create the database. On Unix the file is restricted to 0600.
    pub fn open(path: &str) -> Result<Self, rusqlite::Error> {
        let conn = rusqlite::Connection::open(path)?;
        conn.execute_batch(
            "PRAGMA journal_mode=WAL;
            CREATE TABLE IF NOT EXISTS used_nonces (
                nonce BLOB PRIMARY KEY,
                recorded_at INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_nonces_recorded_at ON used_nonces(recorded_at);",
        )?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Err(e) = std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)) {
                tracing::warn!(path = %path, error = %e, "failed to restrict nonce database permissions");
            }
        }

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> MutexGuard<'_, rusqlite::Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| {
            tracing::error!("nonce store mutex poisoned, recovering");
            poisoned.into_inner()
        })
    }
}

/// Seconds since the epoch. A broken clock yields `i64::MAX`, which no
/// purge cutoff can reach.
fn unix_now() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
        .unwrap_or_else(|_| {
            tracing::error!("system clock before UNIX epoch, pinning nonce timestamps to max");
            i64::MAX
        })
}

impl NonceStore for SqliteNonceStore {
    fn is_used(&self, nonce: &B256) -> bool {
        let conn = self.lock();
        conn.query_row(
            "SELECT COUNT(*) FROM used_nonces WHERE nonce = ?1",
            [nonce.as_slice()],
            |row| row.get::<_, i64>(0),
        )
        .map(|count| count > 0)
        .unwrap_or(true)
    }

    fn try_use(&self, nonce: B256) -> bool {
        let conn = self.lock();
        // The primary key makes a second insert fail.
        conn.execute(
            "INSERT INTO used_nonces (nonce, recorded_at) VALUES (?1, ?2)",
            rusqlite::params![nonce.as_slice(), unix_now()],
        )
        .is_ok()
    }

    fn release(&self, nonce: &B256) {
        let conn = self.lock();
        if let Err(e) = conn.execute(
            "DELETE FROM used_nonces WHERE nonce = ?1",
            [nonce.as_slice()],
        ) {
            tracing::error!(error = %e, "failed to release nonce, it stays consumed");
        }
    }

    fn purge_expired(&self, max_age_secs: u64) -> usize {
        let conn = self.lock();
        let now = unix_now();

        let min_recorded: i64 = conn
            .query_row(
                "SELECT COALESCE(MIN(recorded_at), 0) FROM used_nonces",
                [],
                |row| row.get(0),
            )
            .unwrap_or(0);
        if min_recorded > 0 && now < min_recorded {
            tracing::warn!(now, min_recorded, "clock jumped backward, skipping nonce purge");
            return 0;
        }

        let cutoff = now.saturating_sub(i64::try_from(max_age_secs).unwrap_or(i64::MAX));
        conn.execute("DELETE FROM used_nonces WHERE recorded_at < ?1", [cutoff])
            .unwrap_or(0)
    }
}
