//! Storage layer: a single-file SQLite database behind a `Storage` trait.
//!
//! The block engine and request handlers depend on `Storage`, never on a
//! concrete connection — the same seam the teacher's `DatabaseManager`
//! draws around `Box<dyn UTXOStorage>`, just backed by a real relational
//! engine instead of an in-memory map.
//!
//! All SQLite calls are synchronous; per spec this is a microsecond-scale
//! operation, so handlers call through directly rather than spawning a
//! blocking task for every query.

mod schema;

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use rusqlite::{params, Connection, OptionalExtension};

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayoutStatus {
    Pending,
    Sent,
    Failed,
}

impl PayoutStatus {
    fn as_str(&self) -> &'static str {
        match self {
            PayoutStatus::Pending => "pending",
            PayoutStatus::Sent => "sent",
            PayoutStatus::Failed => "failed",
        }
    }

    fn parse(s: &str) -> Self {
        match s {
            "sent" => PayoutStatus::Sent,
            "failed" => PayoutStatus::Failed,
            _ => PayoutStatus::Pending,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ShareRow {
    pub address: String,
    pub nonce: String,
    pub hash_hex: String,
    pub created_at: i64,
}

#[derive(Debug, Clone)]
pub struct PayoutRow {
    pub id: String,
    pub address: String,
    pub amount_micro: u64,
    pub fee_micro: u64,
    pub status: PayoutStatus,
    pub created_at: i64,
    pub updated_at: i64,
    pub tx_hash: Option<String>,
}

/// Storage operations used by the engine, handlers, and payout dispatcher.
///
/// Kept as a trait (rather than a concrete `SqliteStorage` everywhere) so
/// tests can swap in a `:memory:` connection without touching call sites.
pub trait Storage: Send + Sync {
    fn get_meta(&self, key: &str) -> Result<Option<String>, AppError>;
    fn set_meta(&self, key: &str, value: &str) -> Result<(), AppError>;

    fn insert_block(&self, block_number: u64, seed_hex: &str) -> Result<(), AppError>;
    fn mark_block_processed(&self, block_number: u64, processed_at: i64) -> Result<(), AppError>;

    /// Returns `true` on success, `false` on a uniqueness violation.
    fn insert_share(
        &self,
        block_number: u64,
        address: &str,
        nonce: &str,
        hash_hex: &str,
    ) -> Result<bool, AppError>;
    fn share_count(&self, block_number: u64, address: &str) -> Result<u64, AppError>;
    fn shares_for_block(&self, block_number: u64) -> Result<Vec<ShareRow>, AppError>;

    fn get_balance(&self, address: &str) -> Result<u64, AppError>;

    /// Applies every reward credit and marks the block processed inside a
    /// single transaction, so partial reward application can never occur.
    fn finalize_block(
        &self,
        block_number: u64,
        processed_at: i64,
        rewards: &HashMap<String, u64>,
    ) -> Result<(), AppError>;

    /// Atomically debits `amount_micro` and inserts a payout row for
    /// `amount_micro - fee_micro`. Returns `None` if the balance is
    /// insufficient (no mutation occurs in that case).
    fn withdraw(
        &self,
        address: &str,
        amount_micro: u64,
        fee_micro: u64,
    ) -> Result<Option<PayoutRow>, AppError>;

    fn list_pending_payouts(&self) -> Result<Vec<PayoutRow>, AppError>;
    fn set_payout_status(
        &self,
        id: &str,
        status: PayoutStatus,
        tx_hash: Option<&str>,
    ) -> Result<(), AppError>;
}

/// SQLite-backed implementation. A single `Mutex<Connection>` serializes all
/// writes — SQLite itself only allows one writer at a time, so this matches
/// spec's "short storage write lock" framing without adding a connection
/// pool for a workload that doesn't need one.
pub struct SqliteStorage {
    conn: Mutex<Connection>,
}

impl SqliteStorage {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, AppError> {
        let conn = Connection::open(path).map_err(|e| AppError::fatal(e.to_string()))?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, AppError> {
        let conn = Connection::open_in_memory().map_err(|e| AppError::fatal(e.to_string()))?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self, AppError> {
        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(|e| AppError::fatal(e.to_string()))?;
        schema::create_schema(&conn).map_err(|e| AppError::fatal(e.to_string()))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl Storage for SqliteStorage {
    fn get_meta(&self, key: &str) -> Result<Option<String>, AppError> {
        let conn = self.conn.lock().unwrap();
        conn.query_row("SELECT value FROM meta WHERE key = ?1", params![key], |r| {
            r.get(0)
        })
        .optional()
        .map_err(AppError::from)
    }

    fn set_meta(&self, key: &str, value: &str) -> Result<(), AppError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO meta (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    fn insert_block(&self, block_number: u64, seed_hex: &str) -> Result<(), AppError> {
        let conn = self.conn.lock().unwrap();
        let result = conn.execute(
            "INSERT INTO blocks (block_number, seed_hex, processed_at) VALUES (?1, ?2, NULL)",
            params![block_number as i64, seed_hex],
        );
        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(AppError::fatal(format!(
                    "block {block_number} already exists"
                )))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn mark_block_processed(&self, block_number: u64, processed_at: i64) -> Result<(), AppError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE blocks SET processed_at = ?2 WHERE block_number = ?1 AND processed_at IS NULL",
            params![block_number as i64, processed_at],
        )?;
        Ok(())
    }

    fn insert_share(
        &self,
        block_number: u64,
        address: &str,
        nonce: &str,
        hash_hex: &str,
    ) -> Result<bool, AppError> {
        let conn = self.conn.lock().unwrap();
        let created_at = chrono::Utc::now().timestamp_millis();
        let result = conn.execute(
            "INSERT INTO shares (block_number, address, nonce, hash_hex, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![block_number as i64, address, nonce, hash_hex, created_at],
        );
        match result {
            Ok(_) => Ok(true),
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn share_count(&self, block_number: u64, address: &str) -> Result<u64, AppError> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM shares WHERE block_number = ?1 AND address = ?2",
            params![block_number as i64, address],
            |r| r.get(0),
        )?;
        Ok(count as u64)
    }

    fn shares_for_block(&self, block_number: u64) -> Result<Vec<ShareRow>, AppError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT address, nonce, hash_hex, created_at FROM shares WHERE block_number = ?1",
        )?;
        let rows = stmt
            .query_map(params![block_number as i64], |r| {
                Ok(ShareRow {
                    address: r.get(0)?,
                    nonce: r.get(1)?,
                    hash_hex: r.get(2)?,
                    created_at: r.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn get_balance(&self, address: &str) -> Result<u64, AppError> {
        let conn = self.conn.lock().unwrap();
        let balance: Option<i64> = conn
            .query_row(
                "SELECT balance_micro FROM balances WHERE address = ?1",
                params![address],
                |r| r.get(0),
            )
            .optional()?;
        Ok(balance.unwrap_or(0) as u64)
    }

    fn finalize_block(
        &self,
        block_number: u64,
        processed_at: i64,
        rewards: &HashMap<String, u64>,
    ) -> Result<(), AppError> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn
            .transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)
            .map_err(AppError::from)?;

        for (address, delta) in rewards {
            if *delta == 0 {
                continue;
            }
            tx.execute(
                "INSERT INTO balances (address, balance_micro) VALUES (?1, ?2)
                 ON CONFLICT(address) DO UPDATE SET balance_micro = balance_micro + excluded.balance_micro",
                params![address, *delta as i64],
            )?;
        }

        tx.execute(
            "UPDATE blocks SET processed_at = ?2 WHERE block_number = ?1 AND processed_at IS NULL",
            params![block_number as i64, processed_at],
        )?;

        tx.commit().map_err(AppError::from)?;
        Ok(())
    }

    fn withdraw(
        &self,
        address: &str,
        amount_micro: u64,
        fee_micro: u64,
    ) -> Result<Option<PayoutRow>, AppError> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn
            .transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)
            .map_err(AppError::from)?;

        let balance: Option<i64> = tx
            .query_row(
                "SELECT balance_micro FROM balances WHERE address = ?1",
                params![address],
                |r| r.get(0),
            )
            .optional()?;
        let balance = balance.unwrap_or(0) as u64;

        if balance < amount_micro {
            return Ok(None);
        }

        tx.execute(
            "UPDATE balances SET balance_micro = balance_micro - ?2 WHERE address = ?1",
            params![address, amount_micro as i64],
        )?;

        let id = uuid::Uuid::new_v4().to_string();
        let now = chrono::Utc::now().timestamp_millis();
        let net_amount = amount_micro - fee_micro;
        tx.execute(
            "INSERT INTO payouts (id, address, amount_micro, fee_micro, status, created_at, updated_at, tx_hash)
             VALUES (?1, ?2, ?3, ?4, 'pending', ?5, ?5, NULL)",
            params![id, address, net_amount as i64, fee_micro as i64, now],
        )?;

        tx.commit().map_err(AppError::from)?;

        Ok(Some(PayoutRow {
            id,
            address: address.to_string(),
            amount_micro: net_amount,
            fee_micro,
            status: PayoutStatus::Pending,
            created_at: now,
            updated_at: now,
            tx_hash: None,
        }))
    }

    fn list_pending_payouts(&self) -> Result<Vec<PayoutRow>, AppError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, address, amount_micro, fee_micro, status, created_at, updated_at, tx_hash
             FROM payouts WHERE status = 'pending'",
        )?;
        let rows = stmt
            .query_map([], |r| {
                let status: String = r.get(4)?;
                Ok(PayoutRow {
                    id: r.get(0)?,
                    address: r.get(1)?,
                    amount_micro: r.get::<_, i64>(2)? as u64,
                    fee_micro: r.get::<_, i64>(3)? as u64,
                    status: PayoutStatus::parse(&status),
                    created_at: r.get(5)?,
                    updated_at: r.get(6)?,
                    tx_hash: r.get(7)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn set_payout_status(
        &self,
        id: &str,
        status: PayoutStatus,
        tx_hash: Option<&str>,
    ) -> Result<(), AppError> {
        let conn = self.conn.lock().unwrap();
        let now = chrono::Utc::now().timestamp_millis();
        conn.execute(
            "UPDATE payouts SET status = ?2, tx_hash = ?3, updated_at = ?4
             WHERE id = ?1 AND status = 'pending'",
            params![id, status.as_str(), tx_hash, now],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> SqliteStorage {
        SqliteStorage::open_in_memory().unwrap()
    }

    #[test]
    fn meta_upsert_roundtrips() {
        let s = store();
        assert_eq!(s.get_meta("currentBlockNumber").unwrap(), None);
        s.set_meta("currentBlockNumber", "1").unwrap();
        assert_eq!(
            s.get_meta("currentBlockNumber").unwrap(),
            Some("1".to_string())
        );
        s.set_meta("currentBlockNumber", "2").unwrap();
        assert_eq!(
            s.get_meta("currentBlockNumber").unwrap(),
            Some("2".to_string())
        );
    }

    #[test]
    fn duplicate_share_rejected() {
        let s = store();
        s.insert_block(1, "seed").unwrap();
        assert!(s.insert_share(1, "0xaa", "nonce1", "hash1").unwrap());
        assert!(!s.insert_share(1, "0xaa", "nonce1", "hash2").unwrap());
        assert_eq!(s.share_count(1, "0xaa").unwrap(), 1);
    }

    #[test]
    fn finalize_block_credits_balances_and_marks_processed() {
        let s = store();
        s.insert_block(1, "seed").unwrap();
        let mut rewards = HashMap::new();
        rewards.insert("0xaa".to_string(), 100u64);
        s.finalize_block(1, 12345, &rewards).unwrap();
        assert_eq!(s.get_balance("0xaa").unwrap(), 100);

        // Idempotent: calling again must not double credit processed marker,
        // though a second finalize call is not expected in practice.
        s.mark_block_processed(1, 99999).unwrap();
    }

    #[test]
    fn withdraw_rejects_insufficient_balance() {
        let s = store();
        let result = s.withdraw("0xaa", 100, 10).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn withdraw_debits_and_queues_payout() {
        let s = store();
        s.insert_block(1, "seed").unwrap();
        let mut rewards = HashMap::new();
        rewards.insert("0xaa".to_string(), 3_000_000_000u64);
        s.finalize_block(1, 1, &rewards).unwrap();

        let payout = s.withdraw("0xaa", 2_000_000_000, 1_000_000_000).unwrap();
        let payout = payout.unwrap();
        assert_eq!(payout.amount_micro, 1_000_000_000);
        assert_eq!(payout.fee_micro, 1_000_000_000);
        assert_eq!(s.get_balance("0xaa").unwrap(), 1_000_000_000);

        let pending = s.list_pending_payouts().unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, payout.id);
    }

    #[test]
    fn set_payout_status_is_terminal() {
        let s = store();
        s.insert_block(1, "seed").unwrap();
        let mut rewards = HashMap::new();
        rewards.insert("0xaa".to_string(), 10_000_000_000u64);
        s.finalize_block(1, 1, &rewards).unwrap();
        let payout = s.withdraw("0xaa", 2_000_000_000, 1_000_000_000).unwrap().unwrap();

        s.set_payout_status(&payout.id, PayoutStatus::Sent, Some("0xdeadbeef"))
            .unwrap();
        assert!(s.list_pending_payouts().unwrap().is_empty());

        // A further status update against an already-terminal row is a no-op.
        s.set_payout_status(&payout.id, PayoutStatus::Failed, None)
            .unwrap();
    }

    #[test]
    fn on_disk_database_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("faucet.sqlite3");

        {
            let s = SqliteStorage::open(&db_path).unwrap();
            s.insert_block(1, "seed").unwrap();
            let mut rewards = HashMap::new();
            rewards.insert("0xaa".to_string(), 42u64);
            s.finalize_block(1, 1, &rewards).unwrap();
        }

        let reopened = SqliteStorage::open(&db_path).unwrap();
        assert_eq!(reopened.get_balance("0xaa").unwrap(), 42);
    }
}
