//! Persistent audit of authorizations and their eventual disposition.
//!
//! One row per nonce. The store records, it never gates: a failed write is
//! logged and the payment proceeds. Rows move `verified -> settled` or
//! `verified -> failed`, never backwards.

use std::sync::Mutex;

use serde::Serialize;

/// A freshly verified authorization, about to be recorded.
#[derive(Debug, Clone)]
pub struct NewPayment {
    pub payer: String,
    pub recipient: String,
    pub token: String,
    pub authorized_amount: String,
    pub nonce: String,
    pub network: String,
}

/// Aggregates for the `/stats` endpoint.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentStats {
    pub total_payments: i64,
    pub settled_payments: i64,
    pub total_authorized: i64,
    pub total_settled: i64,
    /// `round(100 * (1 - settled/authorized))` — how much the metered
    /// scheme saved payers versus their signed ceilings.
    pub savings_percent: i64,
}

/// SQLite-backed payment audit store.
pub struct AuditStore {
    conn: Mutex<rusqlite::Connection>,
}

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS payments (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    payer TEXT NOT NULL,
    recipient TEXT NOT NULL,
    token TEXT NOT NULL,
    authorized_amount TEXT NOT NULL,
    settled_amount TEXT,
    nonce TEXT NOT NULL UNIQUE,
    tx_hash TEXT,
    status TEXT NOT NULL DEFAULT 'verified',
    network TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    settled_at INTEGER
);
CREATE INDEX IF NOT EXISTS idx_payments_payer ON payments(payer);
CREATE INDEX IF NOT EXISTS idx_payments_status ON payments(status);
CREATE INDEX IF NOT EXISTS idx_payments_nonce ON payments(nonce);";

impl AuditStore {
    /// Open (or create) the audit database at the given path.
    pub fn open(path: &str) -> Result<Self, rusqlite::Error> {
        let conn = rusqlite::Connection::open(path)?;
        conn.execute_batch(SCHEMA)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// In-memory store for tests.
    pub fn open_in_memory() -> Result<Self, rusqlite::Error> {
        let conn = rusqlite::Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Record a verified authorization. Idempotent: repeated verifies of the
    /// same nonce keep the original row.
    pub fn record_verified(&self, payment: &NewPayment) -> Result<(), rusqlite::Error> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT OR IGNORE INTO payments
                 (payer, recipient, token, authorized_amount, nonce, status, network, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, 'verified', ?6, ?7)",
            rusqlite::params![
                payment.payer,
                payment.recipient,
                payment.token,
                payment.authorized_amount,
                payment.nonce,
                payment.network,
                unix_now(),
            ],
        )?;
        Ok(())
    }

    /// Move a row to `settled`. Only `verified` rows transition.
    pub fn record_settled(
        &self,
        nonce: &str,
        settled_amount: &str,
        tx_hash: &str,
    ) -> Result<(), rusqlite::Error> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE payments
             SET status = 'settled', settled_amount = ?1, tx_hash = ?2, settled_at = ?3
             WHERE nonce = ?4 AND status = 'verified'",
            rusqlite::params![settled_amount, tx_hash, unix_now(), nonce],
        )?;
        Ok(())
    }

    /// Move a row to `failed`. The error string lands in `settled_amount`;
    /// stats only aggregate settled rows, so it cannot pollute the sums.
    pub fn record_failed(&self, nonce: &str, error: &str) -> Result<(), rusqlite::Error> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE payments
             SET status = 'failed', settled_amount = ?1, settled_at = ?2
             WHERE nonce = ?3 AND status = 'verified'",
            rusqlite::params![error, unix_now(), nonce],
        )?;
        Ok(())
    }

    /// Single-pass aggregate over all rows.
    pub fn stats(&self) -> Result<PaymentStats, rusqlite::Error> {
        let conn = self.conn.lock().unwrap();
        let (total_payments, settled_payments, total_authorized, total_settled) = conn.query_row(
            "SELECT COUNT(*),
                    COALESCE(SUM(CASE WHEN status = 'settled' THEN 1 ELSE 0 END), 0),
                    COALESCE(SUM(CAST(authorized_amount AS INTEGER)), 0),
                    COALESCE(SUM(CASE WHEN status = 'settled'
                                      THEN CAST(settled_amount AS INTEGER) ELSE 0 END), 0)
             FROM payments",
            [],
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, i64>(3)?,
                ))
            },
        )?;

        let savings_percent = if total_authorized > 0 {
            (((total_authorized - total_settled) as f64 / total_authorized as f64) * 100.0).round()
                as i64
        } else {
            0
        };

        Ok(PaymentStats {
            total_payments,
            settled_payments,
            total_authorized,
            total_settled,
            savings_percent,
        })
    }

    /// Status of a nonce's row, if present. Test and operator convenience.
    pub fn status_of(&self, nonce: &str) -> Result<Option<String>, rusqlite::Error> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT status FROM payments WHERE nonce = ?1",
            [nonce],
            |row| row.get(0),
        )
        .map(Some)
        .or_else(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => Ok(None),
            other => Err(other),
        })
    }
}

fn unix_now() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payment(nonce: &str, authorized: &str) -> NewPayment {
        NewPayment {
            payer: "0x0000000000000000000000000000000000000001".to_string(),
            recipient: "0x0000000000000000000000000000000000000077".to_string(),
            token: "0x036CbD53842c5426634e7929541eC2318f3dCF7e".to_string(),
            authorized_amount: authorized.to_string(),
            nonce: nonce.to_string(),
            network: "eip155:84532".to_string(),
        }
    }

    #[test]
    fn test_verified_insert_is_idempotent() {
        let store = AuditStore::open_in_memory().unwrap();
        store.record_verified(&payment("42", "1000000")).unwrap();
        store.record_verified(&payment("42", "1000000")).unwrap();

        let stats = store.stats().unwrap();
        assert_eq!(stats.total_payments, 1);
        assert_eq!(stats.total_authorized, 1_000_000);
    }

    #[test]
    fn test_nonces_are_unique_rows() {
        let store = AuditStore::open_in_memory().unwrap();
        store.record_verified(&payment("1", "1000000")).unwrap();
        store.record_verified(&payment("2", "1000000")).unwrap();
        assert_eq!(store.stats().unwrap().total_payments, 2);
    }

    #[test]
    fn test_settle_transition() {
        let store = AuditStore::open_in_memory().unwrap();
        store.record_verified(&payment("42", "1000000")).unwrap();
        store.record_settled("42", "43700", "0xabc").unwrap();

        assert_eq!(store.status_of("42").unwrap().as_deref(), Some("settled"));
        let stats = store.stats().unwrap();
        assert_eq!(stats.settled_payments, 1);
        assert_eq!(stats.total_settled, 43_700);
    }

    #[test]
    fn test_failed_transition_keeps_stats_clean() {
        let store = AuditStore::open_in_memory().unwrap();
        store.record_verified(&payment("42", "1000000")).unwrap();
        store.record_failed("42", "transaction_reverted").unwrap();

        assert_eq!(store.status_of("42").unwrap().as_deref(), Some("failed"));
        let stats = store.stats().unwrap();
        assert_eq!(stats.settled_payments, 0);
        // The error string stored in settled_amount is excluded from sums.
        assert_eq!(stats.total_settled, 0);
    }

    #[test]
    fn test_no_reverse_transitions() {
        let store = AuditStore::open_in_memory().unwrap();
        store.record_verified(&payment("42", "1000000")).unwrap();
        store.record_settled("42", "43700", "0xabc").unwrap();

        // A late failure report must not overwrite a settled row.
        store.record_failed("42", "too late").unwrap();
        assert_eq!(store.status_of("42").unwrap().as_deref(), Some("settled"));
    }

    #[test]
    fn test_settle_unknown_nonce_is_noop() {
        let store = AuditStore::open_in_memory().unwrap();
        store.record_settled("404", "1", "0xabc").unwrap();
        assert_eq!(store.status_of("404").unwrap(), None);
    }

    #[test]
    fn test_savings_percent() {
        let store = AuditStore::open_in_memory().unwrap();
        store.record_verified(&payment("1", "1000000")).unwrap();
        store.record_settled("1", "43700", "0xabc").unwrap();

        let stats = store.stats().unwrap();
        // 1 - 43700/1000000 = 95.63% -> 96
        assert_eq!(stats.savings_percent, 96);
    }

    #[test]
    fn test_store_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("payments.db");
        let path = path.to_str().unwrap();

        {
            let store = AuditStore::open(path).unwrap();
            store.record_verified(&payment("42", "1000000")).unwrap();
            store.record_settled("42", "43700", "0xabc").unwrap();
        }

        let store = AuditStore::open(path).unwrap();
        assert_eq!(store.stats().unwrap().total_payments, 1);
        assert_eq!(store.status_of("42").unwrap().as_deref(), Some("settled"));
    }

    #[test]
    fn test_empty_store_stats() {
        let store = AuditStore::open_in_memory().unwrap();
        let stats = store.stats().unwrap();
        assert_eq!(stats.total_payments, 0);
        assert_eq!(stats.savings_percent, 0);
    }
}
