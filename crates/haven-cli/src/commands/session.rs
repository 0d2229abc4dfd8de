//! Identity commands.
//!
//! The queue is scoped to one identity, so every identity change clears it
//! all-or-nothing before the new identity starts queueing work.

use haven_core::identity::{Identity, IdentityKind};

use super::common::Engine;
use crate::error::CliError;

pub async fn run_login(engine: &Engine, user_id: &str) -> Result<(), CliError> {
    let previous = engine.identities.current().await?;
    if previous.as_ref().is_some_and(|identity| identity.user_id == user_id) {
        println!("already signed in as {user_id}");
        return Ok(());
    }

    if let Some(previous) = previous {
        tracing::info!("identity change from {}, clearing queue", previous.user_id);
        engine.queue.clear().await?;
    }

    engine.identities.save(&Identity::account(user_id)).await?;
    println!("signed in as {user_id}");
    Ok(())
}

pub async fn run_logout(engine: &Engine) -> Result<(), CliError> {
    let dropped = engine.queue.snapshot().await.len();
    engine.queue.clear().await?;
    engine.identities.clear().await?;

    if dropped > 0 {
        println!("signed out ({dropped} queued operations discarded)");
    } else {
        println!("signed out");
    }
    Ok(())
}

pub async fn run_whoami(engine: &Engine) -> Result<(), CliError> {
    match engine.identities.current().await? {
        Some(identity) => {
            let kind = match identity.kind {
                IdentityKind::Account => "account",
                IdentityKind::Guest => "guest",
            };
            println!("{} ({kind})", identity.user_id);
        }
        None => println!("not signed in"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::time::{SystemTime, UNIX_EPOCH};

    use haven_core::models::{EntityId, EntityKind, OperationKind, SyncOperation};

    use super::super::common::open_engine;
    use super::*;

    fn unique_test_db_path() -> PathBuf {
        static NEXT_TEST_DB_ID: AtomicU64 = AtomicU64::new(0);

        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |duration| duration.as_nanos());
        let sequence = NEXT_TEST_DB_ID.fetch_add(1, Ordering::Relaxed);
        std::env::temp_dir().join(format!("haven-session-test-{timestamp}-{sequence}.db"))
    }

    fn cleanup_db_files(path: &PathBuf) {
        let _ = std::fs::remove_file(path);
        let _ = std::fs::remove_file(path.with_extension("db-shm"));
        let _ = std::fs::remove_file(path.with_extension("db-wal"));
    }

    fn noise_op() -> SyncOperation {
        SyncOperation::new(
            OperationKind::Create,
            EntityKind::Task,
            EntityId::new(),
            serde_json::json!({"title": "queued"}),
            1,
        )
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_logout_clears_identity_and_queue() {
        let db_path = unique_test_db_path();
        let engine = open_engine(&db_path, None).await.unwrap();

        run_login(&engine, "user-7").await.unwrap();
        for _ in 0..3 {
            engine.queue.add_operation(noise_op()).await.unwrap();
        }
        assert_eq!(engine.queue.snapshot().await.len(), 3);

        run_logout(&engine).await.unwrap();
        assert!(engine.queue.snapshot().await.is_empty());
        assert!(engine.identities.current().await.unwrap().is_none());

        cleanup_db_files(&db_path);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_login_over_guest_clears_queued_work() {
        let db_path = unique_test_db_path();
        let engine = open_engine(&db_path, None).await.unwrap();

        super::super::common::ensure_identity(&engine).await.unwrap();
        engine.queue.add_operation(noise_op()).await.unwrap();

        run_login(&engine, "user-8").await.unwrap();
        assert!(engine.queue.snapshot().await.is_empty());

        let identity = engine.identities.current().await.unwrap().unwrap();
        assert_eq!(identity.user_id, "user-8");
        assert_eq!(identity.kind, IdentityKind::Account);

        cleanup_db_files(&db_path);
    }
}
