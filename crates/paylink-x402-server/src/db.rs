use rand::distr::Alphanumeric;
use rand::Rng;
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex, MutexGuard};
use x402::VerifiedPayment;

use crate::error::ServerError;

const SHORT_CODE_LEN: usize = 6;
const SHORT_CODE_ATTEMPTS: usize = 5;

/// A stored short link and the payment that bought it.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Link {
    pub short_code: String,
    pub original_url: String,
    /// `X-PAYMENT` header exactly as received.
    #[serde(skip)]
    pub payment_header: String,
    pub receiver: String,
    pub amount: String,
    pub payer: String,
    pub network: String,
    pub created_at: i64,
}

/// SQLite-backed short link table.
#[derive(Clone)]
pub struct LinkStore {
    conn: Arc<Mutex<Connection>>,
}

impl LinkStore {
    pub fn open(path: &str) -> Result<Self, ServerError> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, ServerError> {
        self.conn
            .lock()
            .map_err(|_| ServerError::Internal("database lock poisoned".to_string()))
    }

    fn init_schema(&self) -> Result<(), ServerError> {
        let conn = self.lock()?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS links (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                short_code TEXT UNIQUE NOT NULL,
                original_url TEXT NOT NULL,
                payment_header TEXT NOT NULL,
                receiver TEXT NOT NULL,
                amount TEXT NOT NULL,
                payer TEXT NOT NULL,
                network TEXT NOT NULL,
                created_at INTEGER NOT NULL
            )
            "#,
            [],
        )?;
        Ok(())
    }

    /// Store `original_url` under a fresh random code, together with the
    /// payment that authorized it.
    pub fn create_link(
        &self,
        original_url: &str,
        payment: &VerifiedPayment,
    ) -> Result<Link, ServerError> {
        let conn = self.lock()?;
        let created_at = chrono::Utc::now().timestamp();

        for _ in 0..SHORT_CODE_ATTEMPTS {
            let short_code = generate_short_code();
            let inserted = conn.execute(
                r#"
                INSERT INTO links
                    (short_code, original_url, payment_header, receiver, amount, payer, network, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                ON CONFLICT(short_code) DO NOTHING
                "#,
                params![
                    short_code,
                    original_url,
                    payment.raw_header,
                    payment.receiver,
                    payment.amount,
                    payment.payer,
                    payment.network,
                    created_at,
                ],
            )?;
            if inserted == 1 {
                return Ok(Link {
                    short_code,
                    original_url: original_url.to_string(),
                    payment_header: payment.raw_header.clone(),
                    receiver: payment.receiver.clone(),
                    amount: payment.amount.clone(),
                    payer: payment.payer.clone(),
                    network: payment.network.clone(),
                    created_at,
                });
            }
            tracing::debug!(short_code = %short_code, "short code collision, retrying");
        }

        Err(ServerError::Internal(
            "could not allocate a unique short code".to_string(),
        ))
    }

    pub fn find(&self, short_code: &str) -> Result<Option<Link>, ServerError> {
        let conn = self.lock()?;
        let link = conn
            .query_row(
                r#"
                SELECT short_code, original_url, payment_header, receiver, amount, payer, network, created_at
                FROM links WHERE short_code = ?1
                "#,
                params![short_code],
                |row| {
                    Ok(Link {
                        short_code: row.get(0)?,
                        original_url: row.get(1)?,
                        payment_header: row.get(2)?,
                        receiver: row.get(3)?,
                        amount: row.get(4)?,
                        payer: row.get(5)?,
                        network: row.get(6)?,
                        created_at: row.get(7)?,
                    })
                },
            )
            .optional()?;
        Ok(link)
    }

    pub fn count(&self) -> Result<i64, ServerError> {
        let conn = self.lock()?;
        Ok(conn.query_row("SELECT COUNT(*) FROM links", [], |row| row.get(0))?)
    }
}

fn generate_short_code() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(SHORT_CODE_LEN)
        .map(char::from)
        .collect()
}
