//! Database migrations

use crate::error::Result;
use libsql::Connection;

/// Current schema version
const CURRENT_VERSION: i32 = 2;

/// Run all pending migrations
pub async fn run(conn: &Connection) -> Result<()> {
    let version = get_version(conn).await?;

    if version < 1 {
        migrate_v1(conn).await?;
    }
    if version < 2 {
        migrate_v2(conn).await?;
    }

    Ok(())
}

/// Get the current schema version
async fn get_version(conn: &Connection) -> Result<i32> {
    let mut rows = conn
        .query(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
            (),
        )
        .await?;

    let exists: bool = if let Some(row) = rows.next().await? {
        row.get::<i32>(0)? != 0
    } else {
        false
    };

    if !exists {
        return Ok(0);
    }

    let mut rows = conn
        .query("SELECT COALESCE(MAX(version), 0) FROM schema_version", ())
        .await?;

    let version: i32 = if let Some(row) = rows.next().await? {
        row.get(0)?
    } else {
        0
    };

    Ok(version)
}

async fn apply(conn: &Connection, statements: &[&str]) -> Result<()> {
    conn.execute("BEGIN TRANSACTION", ()).await?;

    for stmt in statements {
        if let Err(e) = conn.execute(stmt, ()).await {
            conn.execute("ROLLBACK", ()).await.ok();
            return Err(e.into());
        }
    }

    if let Err(e) = conn.execute("COMMIT", ()).await {
        conn.execute("ROLLBACK", ()).await.ok();
        return Err(e.into());
    }

    Ok(())
}

/// Migration to version 1: initial schema.
///
/// Every synchronized entity kind gets its own table with the same layout:
/// an id primary key, extracted columns for indexed queries, and the record
/// JSON in `data`. The `kv` table holds the durable sync queue blob and the
/// identity record.
async fn migrate_v1(conn: &Connection) -> Result<()> {
    let mut statements = vec![
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        )"
        .to_string(),
        "CREATE TABLE IF NOT EXISTS kv (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )"
        .to_string(),
    ];

    for table in ["task_lists", "tasks", "backgrounds", "block_rules"] {
        statements.push(format!(
            "CREATE TABLE IF NOT EXISTS {table} (
                id TEXT PRIMARY KEY,
                owner_id TEXT NOT NULL,
                category TEXT,
                due_at INTEGER,
                parent_id TEXT,
                version INTEGER NOT NULL,
                sync_status TEXT NOT NULL,
                updated_at INTEGER NOT NULL,
                data TEXT NOT NULL
            )"
        ));
        statements.push(format!(
            "CREATE INDEX IF NOT EXISTS idx_{table}_owner ON {table}(owner_id)"
        ));
        statements.push(format!(
            "CREATE INDEX IF NOT EXISTS idx_{table}_category ON {table}(category)"
        ));
        statements.push(format!(
            "CREATE INDEX IF NOT EXISTS idx_{table}_updated ON {table}(updated_at DESC)"
        ));
    }

    statements.push("CREATE INDEX IF NOT EXISTS idx_tasks_due ON tasks(due_at)".to_string());
    statements
        .push("CREATE INDEX IF NOT EXISTS idx_tasks_parent ON tasks(parent_id)".to_string());
    statements.push("INSERT INTO schema_version (version) VALUES (1)".to_string());

    let refs: Vec<&str> = statements.iter().map(String::as_str).collect();
    apply(conn, &refs).await?;

    tracing::info!("Migrated database to version 1");
    Ok(())
}

/// Migration to version 2: sync status indices.
///
/// Added when retry exhaustion started surfacing through the `sync_status`
/// column, so status scans ("which records failed to sync?") stay cheap.
async fn migrate_v2(conn: &Connection) -> Result<()> {
    let mut statements = Vec::new();
    for table in ["task_lists", "tasks", "backgrounds", "block_rules"] {
        statements.push(format!(
            "CREATE INDEX IF NOT EXISTS idx_{table}_status ON {table}(sync_status)"
        ));
    }
    statements.push("INSERT INTO schema_version (version) VALUES (2)".to_string());

    let refs: Vec<&str> = statements.iter().map(String::as_str).collect();
    apply(conn, &refs).await?;

    tracing::info!("Migrated database to version {CURRENT_VERSION}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use libsql::Builder;

    async fn setup() -> Connection {
        let db = Builder::new_local(":memory:").build().await.unwrap();
        db.connect().unwrap()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_migrations() {
        let conn = setup().await;
        run(&conn).await.unwrap();

        let version = get_version(&conn).await.unwrap();
        assert_eq!(version, CURRENT_VERSION);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_migrations_idempotent() {
        let conn = setup().await;
        run(&conn).await.unwrap();
        run(&conn).await.unwrap(); // Should not fail

        let version = get_version(&conn).await.unwrap();
        assert_eq!(version, CURRENT_VERSION);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_entity_tables_exist() {
        let conn = setup().await;
        run(&conn).await.unwrap();

        for table in ["task_lists", "tasks", "backgrounds", "block_rules", "kv"] {
            let mut rows = conn
                .query(
                    "SELECT EXISTS(
                        SELECT 1 FROM sqlite_master
                        WHERE type = 'table' AND name = ?
                    )",
                    [table],
                )
                .await
                .unwrap();

            let exists = rows
                .next()
                .await
                .unwrap()
                .is_some_and(|row| row.get::<i32>(0).unwrap() != 0);

            assert!(exists, "missing table {table}");
        }
    }
}
