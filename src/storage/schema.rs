//! SQLite schema: `meta`, `blocks`, `shares`, `balances`, `payouts`.

use rusqlite::Connection;

pub fn create_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS meta (
            key   TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS blocks (
            block_number INTEGER PRIMARY KEY,
            seed_hex     TEXT NOT NULL,
            processed_at INTEGER
        );

        CREATE TABLE IF NOT EXISTS shares (
            block_number INTEGER NOT NULL,
            address      TEXT NOT NULL,
            nonce        TEXT NOT NULL,
            hash_hex     TEXT NOT NULL,
            created_at   INTEGER NOT NULL,
            PRIMARY KEY (block_number, address, nonce)
        );
        CREATE INDEX IF NOT EXISTS idx_shares_block_number ON shares (block_number);
        CREATE INDEX IF NOT EXISTS idx_shares_address ON shares (address);

        CREATE TABLE IF NOT EXISTS balances (
            address       TEXT PRIMARY KEY,
            balance_micro INTEGER NOT NULL DEFAULT 0 CHECK (balance_micro >= 0)
        );

        CREATE TABLE IF NOT EXISTS payouts (
            id            TEXT PRIMARY KEY,
            address       TEXT NOT NULL,
            amount_micro  INTEGER NOT NULL,
            fee_micro     INTEGER NOT NULL,
            status        TEXT NOT NULL,
            created_at    INTEGER NOT NULL,
            updated_at    INTEGER NOT NULL,
            tx_hash       TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_payouts_status ON payouts (status);
        ",
    )
}
