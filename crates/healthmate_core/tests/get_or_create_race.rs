use healthmate_core::HealthStore;
use healthmate_core::sqlite_store::SqliteHealthStore;

/// Concurrent get-or-create calls over a shared database file must never
/// produce two users: the UNIQUE constraint plus insert-or-ignore turns a
/// lost race into a re-fetch of the winner's row.
#[tokio::test]
async fn concurrent_get_or_create_creates_one_user() {
    let file = tempfile::NamedTempFile::new().expect("temp db file");
    let url = format!("sqlite://{}", file.path().display());
    let store = SqliteHealthStore::connect(&url).await.expect("store");

    let mut handles = Vec::new();
    for _ in 0..16 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            store.get_or_create_user("919876543210").await
        }));
    }

    let mut ids = Vec::new();
    for handle in handles {
        let user = handle.await.expect("task").expect("get_or_create");
        ids.push(user.id);
    }
    ids.dedup();
    assert_eq!(ids.len(), 1, "all callers must observe the same user");

    let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
        .fetch_one(store.pool())
        .await
        .unwrap();
    assert_eq!(count, 1);
}
