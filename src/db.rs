// ==========================================
// Talhão APEX - SQLite connection setup
// ==========================================
// Goals:
// - every Connection::open goes through the same PRAGMA setup
// - uniform busy_timeout so a UI read never trips over a pipeline write
// - one place to open a connection per store operation (acquire-use-release)
// ==========================================

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::time::Duration;

/// Default busy_timeout (milliseconds)
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// Configure the PRAGMAs shared by every connection
///
/// - foreign_keys must be enabled per connection
/// - busy_timeout must be configured per connection
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// Open a SQLite connection with the shared configuration applied
///
/// SQL tracing (statement counts, slow statements) is installed here so that
/// `PerfGuard` sees every statement issued by a stage.
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let mut conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    crate::perf::install_sqlite_tracing(&mut conn);
    Ok(conn)
}

/// Check whether a table exists (case-insensitive, as SQLite resolves names)
pub fn table_exists(conn: &Connection, table: &str) -> rusqlite::Result<bool> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name = ?1 COLLATE NOCASE LIMIT 1",
            [table],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

/// Create the bookkeeping tables owned by this crate (idempotent)
///
/// - config_scope / config_kv: key/value configuration
/// - ApexRunRegistry: one row per evaluation run
pub fn ensure_app_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS config_scope (
            scope_id TEXT PRIMARY KEY,
            scope_type TEXT NOT NULL,
            scope_key TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE(scope_type, scope_key)
        );
        INSERT OR IGNORE INTO config_scope (scope_id, scope_type, scope_key)
        VALUES ('global', 'GLOBAL', 'global');
        CREATE TABLE IF NOT EXISTS config_kv (
            scope_id TEXT NOT NULL REFERENCES config_scope(scope_id) ON DELETE CASCADE,
            key TEXT NOT NULL,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (scope_id, key)
        );
        CREATE TABLE IF NOT EXISTS ApexRunRegistry (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            run_number INTEGER NOT NULL UNIQUE,
            run_id TEXT NOT NULL,
            result_table TEXT NOT NULL,
            remnant_table TEXT,
            remnant_reconciliation INTEGER NOT NULL DEFAULT 0,
            parameters_json TEXT NOT NULL,
            status TEXT NOT NULL,
            failed_stages INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            finished_at TEXT
        );
        "#,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_app_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        ensure_app_schema(&conn).unwrap();
        ensure_app_schema(&conn).unwrap();

        assert!(table_exists(&conn, "config_kv").unwrap());
        assert!(table_exists(&conn, "apexrunregistry").unwrap());
        assert!(!table_exists(&conn, "Apex_Manejo_1").unwrap());
    }
}
