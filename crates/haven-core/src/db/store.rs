//! Local store - the only component that touches the underlying connection.
//!
//! Each entity kind owns a table with the same layout: extracted columns for
//! indexed queries plus the full record JSON in `data`. The `kv` table backs
//! the durable sync queue blob and the identity record.

use libsql::params;

use super::connection::Database;
use crate::error::{Error, Result};
use crate::models::{EntityId, EntityKind, SyncStatus, SyncedRecord};

/// Durable, per-entity-type document storage with indexed lookups
pub struct LocalStore {
    db: Database,
}

impl LocalStore {
    #[must_use]
    pub const fn new(db: Database) -> Self {
        Self { db }
    }

    fn conn(&self) -> &libsql::Connection {
        self.db.connection()
    }

    /// Insert or replace a record
    pub async fn put<E: SyncedRecord>(&self, record: &E) -> Result<()> {
        let data = serde_json::to_string(record)?;
        let meta = record.meta();
        let sql = format!(
            "INSERT OR REPLACE INTO {}
             (id, owner_id, category, due_at, parent_id, version, sync_status, updated_at, data)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            E::KIND.table()
        );
        self.conn()
            .execute(
                &sql,
                params![
                    record.entity_id().as_str(),
                    record.owner_id(),
                    record.category().map(str::to_string),
                    record.due_at(),
                    record.parent_id().map(|id| id.as_str()),
                    meta.version,
                    meta.sync_status.as_str(),
                    meta.updated_at,
                    data
                ],
            )
            .await?;
        Ok(())
    }

    /// Point lookup by id
    pub async fn get<E: SyncedRecord>(&self, id: &EntityId) -> Result<Option<E>> {
        let sql = format!("SELECT data FROM {} WHERE id = ?", E::KIND.table());
        let mut rows = self.conn().query(&sql, [id.as_str()]).await?;

        match rows.next().await? {
            Some(row) => {
                let raw: String = row.get(0)?;
                Ok(Some(serde_json::from_str(&raw)?))
            }
            None => Ok(None),
        }
    }

    /// All records of a kind, most recently updated first
    pub async fn all<E: SyncedRecord>(&self) -> Result<Vec<E>> {
        let sql = format!(
            "SELECT data FROM {} ORDER BY updated_at DESC",
            E::KIND.table()
        );
        self.collect(&sql, ()).await
    }

    /// Records owned by a specific identity
    pub async fn by_owner<E: SyncedRecord>(&self, owner_id: &str) -> Result<Vec<E>> {
        let sql = format!(
            "SELECT data FROM {} WHERE owner_id = ? ORDER BY updated_at DESC",
            E::KIND.table()
        );
        self.collect(&sql, params![owner_id]).await
    }

    /// Records in a category
    pub async fn by_category<E: SyncedRecord>(&self, category: &str) -> Result<Vec<E>> {
        let sql = format!(
            "SELECT data FROM {} WHERE category = ? ORDER BY updated_at DESC",
            E::KIND.table()
        );
        self.collect(&sql, params![category]).await
    }

    /// Records in a synchronization state
    pub async fn by_status<E: SyncedRecord>(&self, status: SyncStatus) -> Result<Vec<E>> {
        let sql = format!(
            "SELECT data FROM {} WHERE sync_status = ? ORDER BY updated_at DESC",
            E::KIND.table()
        );
        self.collect(&sql, params![status.as_str()]).await
    }

    /// Records due at or before a timestamp (range query on the due index)
    pub async fn due_before<E: SyncedRecord>(&self, cutoff_ms: i64) -> Result<Vec<E>> {
        let sql = format!(
            "SELECT data FROM {} WHERE due_at IS NOT NULL AND due_at <= ? ORDER BY due_at ASC",
            E::KIND.table()
        );
        self.collect(&sql, params![cutoff_ms]).await
    }

    /// Number of records of a kind
    pub async fn count<E: SyncedRecord>(&self) -> Result<i64> {
        let sql = format!("SELECT COUNT(*) FROM {}", E::KIND.table());
        let mut rows = self.conn().query(&sql, ()).await?;
        match rows.next().await? {
            Some(row) => Ok(row.get(0)?),
            None => Ok(0),
        }
    }

    /// Delete a record. Task lists cascade to their tasks atomically: both
    /// deletes succeed or neither does.
    pub async fn delete<E: SyncedRecord>(&self, id: &EntityId) -> Result<()> {
        if E::KIND == EntityKind::TaskList {
            return self.delete_list_cascade(id).await;
        }
        let sql = format!("DELETE FROM {} WHERE id = ?", E::KIND.table());
        self.conn().execute(&sql, [id.as_str()]).await?;
        Ok(())
    }

    async fn delete_list_cascade(&self, id: &EntityId) -> Result<()> {
        let conn = self.conn();
        conn.execute("BEGIN TRANSACTION", ()).await?;

        let steps = [
            ("DELETE FROM tasks WHERE parent_id = ?", id.as_str()),
            ("DELETE FROM task_lists WHERE id = ?", id.as_str()),
        ];
        for (sql, param) in steps {
            if let Err(e) = conn.execute(sql, [param]).await {
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

    /// Flip a record to `synced`, but only if the stored version still equals
    /// the version the server confirmed. A record mutated again since the
    /// operation was sent stays pending.
    pub async fn confirm_synced(
        &self,
        kind: EntityKind,
        id: &EntityId,
        version: i64,
    ) -> Result<()> {
        let sql = format!(
            "UPDATE {} SET
                sync_status = 'synced',
                data = json_set(json_remove(data, '$.error_message'), '$.sync_status', 'synced')
             WHERE id = ? AND version = ?",
            kind.table()
        );
        self.conn()
            .execute(&sql, params![id.as_str(), version])
            .await?;
        Ok(())
    }

    /// Flag a record as permanently failed, with the reason surfaced through
    /// the envelope's `error_message`.
    pub async fn mark_error(&self, kind: EntityKind, id: &EntityId, message: &str) -> Result<()> {
        let sql = format!(
            "UPDATE {} SET
                sync_status = 'error',
                data = json_set(data, '$.sync_status', 'error', '$.error_message', ?)
             WHERE id = ?",
            kind.table()
        );
        self.conn()
            .execute(&sql, params![message, id.as_str()])
            .await?;
        Ok(())
    }

    /// Read a value from the kv table
    pub async fn kv_get(&self, key: &str) -> Result<Option<String>> {
        let mut rows = self
            .conn()
            .query("SELECT value FROM kv WHERE key = ?", [key])
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(row.get(0)?)),
            None => Ok(None),
        }
    }

    /// Write a value to the kv table, replacing any previous value
    pub async fn kv_set(&self, key: &str, value: &str) -> Result<()> {
        self.conn()
            .execute(
                "INSERT OR REPLACE INTO kv (key, value) VALUES (?, ?)",
                [key, value],
            )
            .await?;
        Ok(())
    }

    /// Remove a key from the kv table
    pub async fn kv_delete(&self, key: &str) -> Result<()> {
        self.conn()
            .execute("DELETE FROM kv WHERE key = ?", [key])
            .await?;
        Ok(())
    }

    async fn collect<E: SyncedRecord>(
        &self,
        sql: &str,
        params: impl libsql::params::IntoParams,
    ) -> Result<Vec<E>> {
        let mut rows = self.conn().query(sql, params).await?;
        let mut records = Vec::new();
        while let Some(row) = rows.next().await? {
            let raw: String = row.get(0)?;
            let record = serde_json::from_str(&raw)
                .map_err(|e| Error::Database(format!("corrupt {} record: {e}", E::KIND)))?;
            records.push(record);
        }
        Ok(records)
    }
}
