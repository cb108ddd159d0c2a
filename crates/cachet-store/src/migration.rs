//! Database schema migrations for SQLite.
//!
//! We use a simple versioned migration system. Each migration is a SQL string
//! that transforms the schema from version N to N+1.

use rusqlite::Connection;

use crate::error::{Result, StoreError};

/// Current schema version.
pub const CURRENT_VERSION: u32 = 1;

/// Initialize or migrate the database schema.
///
/// This function is idempotent - it can be called multiple times safely.
pub fn migrate(conn: &mut Connection) -> Result<()> {
    // Create migrations table if it doesn't exist
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL
        )",
        [],
    )?;

    // Get current version
    let current: u32 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);

    // Apply migrations
    if current < CURRENT_VERSION {
        let tx = conn.transaction()?;

        for version in (current + 1)..=CURRENT_VERSION {
            apply_migration(&tx, version)?;

            tx.execute(
                "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
                rusqlite::params![version, now_millis()],
            )?;
        }

        tx.commit()?;
    }

    Ok(())
}

/// Apply a specific migration version.
fn apply_migration(conn: &Connection, version: u32) -> Result<()> {
    match version {
        1 => apply_v1(conn),
        _ => Err(StoreError::Migration(format!(
            "unknown migration version: {}",
            version
        ))),
    }
}

/// Migration v1: Initial schema.
///
/// Every table carries its full record as a CBOR blob beside the
/// columns we filter or join on, so the schema never has to chase
/// record-shape changes that don't affect indexing.
fn apply_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- Principals and their key lifecycle state
        CREATE TABLE principals (
            principal_id BLOB PRIMARY KEY,    -- 32 bytes
            state INTEGER NOT NULL,           -- 0=active, 1=escrowed, 2=deleted
            record BLOB NOT NULL,             -- CBOR PrincipalRecord
            updated_at INTEGER NOT NULL
        );

        -- Encrypted resources (envelope + owner wrap)
        CREATE TABLE resources (
            resource_id BLOB PRIMARY KEY,     -- 32 bytes
            record BLOB NOT NULL,             -- CBOR EncryptedResource
            created_at INTEGER NOT NULL
        );

        -- Ownership, versioned for compare-and-swap
        CREATE TABLE ownership (
            resource_id BLOB PRIMARY KEY,     -- 32 bytes
            owner BLOB NOT NULL,              -- 32 bytes
            version INTEGER NOT NULL,
            record BLOB NOT NULL              -- CBOR OwnershipRecord
        );

        -- Current grant per (resource, grantee); re-grants replace
        CREATE TABLE grants (
            resource_id BLOB NOT NULL,        -- 32 bytes
            grantee BLOB NOT NULL,            -- 32 bytes
            granter BLOB NOT NULL,            -- 32 bytes
            expires_at INTEGER,               -- Unix ms, NULL = no expiry
            revoked INTEGER NOT NULL DEFAULT 0,
            record BLOB NOT NULL,             -- CBOR AccessGrant
            PRIMARY KEY (resource_id, grantee)
        );

        -- Append-only commitment ledger per resource
        CREATE TABLE commitments (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            resource_id BLOB NOT NULL,        -- 32 bytes
            subject BLOB NOT NULL,            -- 32 bytes
            kind INTEGER NOT NULL,            -- CommitmentKind as u16
            record BLOB NOT NULL,             -- CBOR Commitment
            UNIQUE (resource_id, subject, kind)
        );

        -- Backup metadata for escrowed principals
        CREATE TABLE backups (
            principal_id BLOB PRIMARY KEY,    -- 32 bytes
            record BLOB NOT NULL,             -- CBOR BackupRecord
            created_at INTEGER NOT NULL
        );

        -- Indexes for common queries
        CREATE INDEX idx_ownership_owner ON ownership(owner);
        CREATE INDEX idx_grants_grantee ON grants(grantee);
        CREATE INDEX idx_grants_expires ON grants(expires_at);
        CREATE INDEX idx_commitments_resource ON commitments(resource_id);
        "#,
    )?;

    Ok(())
}

/// Get current time in milliseconds.
fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("time went backwards")
        .as_millis() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migration_creates_tables() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn).unwrap();

        // Verify tables exist
        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();

        assert!(tables.contains(&"principals".to_string()));
        assert!(tables.contains(&"resources".to_string()));
        assert!(tables.contains(&"ownership".to_string()));
        assert!(tables.contains(&"grants".to_string()));
        assert!(tables.contains(&"commitments".to_string()));
        assert!(tables.contains(&"backups".to_string()));
        assert!(tables.contains(&"schema_migrations".to_string()));
    }

    #[test]
    fn test_migration_idempotent() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn).unwrap();
        migrate(&mut conn).unwrap(); // Should not error
        migrate(&mut conn).unwrap(); // Still should not error

        // Verify version is 1
        let version: u32 = conn
            .query_row(
                "SELECT MAX(version) FROM schema_migrations",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(version, CURRENT_VERSION);
    }
}
