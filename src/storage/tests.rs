use super::*;
use crate::data_import::models::ImportOutcome;

async fn test_store() -> MetadataStore {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("sqlite memory");
    MetadataStore::new(pool, PasswordCipher::generate())
        .await
        .expect("metadata store")
}

fn new_profile(name: &str, password: Option<&str>) -> ConnectionProfile {
    ConnectionProfile {
        id: String::new(),
        name: name.to_string(),
        engine: "postgresql".to_string(),
        host: "db.internal".to_string(),
        port: 5432,
        username: "app".to_string(),
        password: password.map(str::to_string),
        database: Some("sales".to_string()),
    }
}

fn record(table: &str, file: &str, rows: u64) -> ImportRecord {
    ImportRecord {
        connection_id: "c1".to_string(),
        table_name: table.to_string(),
        file_label: file.to_string(),
        outcome: ImportOutcome {
            success_count: rows,
            error_count: 0,
        },
    }
}

#[tokio::test]
async fn connection_roundtrip_encrypts_password() {
    let store = test_store().await;
    let saved = store
        .save_connection(new_profile("Sales", Some("s3cret")))
        .await
        .expect("save connection");
    assert!(!saved.id.is_empty());
    assert_eq!(saved.password, None);

    let raw: Option<String> = sqlx::query_scalar("SELECT password FROM connections WHERE id = ?")
        .bind(&saved.id)
        .fetch_one(&store.pool)
        .await
        .expect("raw password");
    let raw = raw.expect("stored password");
    assert_ne!(raw, "s3cret");

    let profile = store.get_profile(&saved.id).await.expect("profile");
    assert_eq!(profile.password.as_deref(), Some("s3cret"));
    assert_eq!(profile.database.as_deref(), Some("sales"));

    let listed = store.list_connections().await.expect("list");
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].password, None);
}

#[tokio::test]
async fn update_without_password_keeps_stored_secret() {
    let store = test_store().await;
    let saved = store
        .save_connection(new_profile("Sales", Some("s3cret")))
        .await
        .expect("save");

    let mut edited = new_profile("Sales EU", None);
    edited.id = saved.id.clone();
    store.save_connection(edited).await.expect("update");

    let profile = store.get_connection(&saved.id).await.expect("get");
    assert_eq!(profile.name, "Sales EU");
    assert_eq!(profile.password.as_deref(), Some("s3cret"));
}

#[tokio::test]
async fn invalid_and_missing_connections() {
    let store = test_store().await;
    let mut bad = new_profile("Oracle", None);
    bad.engine = "oracle".to_string();
    assert!(matches!(
        store.save_connection(bad).await,
        Err(CoreError::InvalidInput(_))
    ));

    assert!(matches!(
        store.get_profile("missing").await,
        Err(CoreError::NotFound(_))
    ));
    assert!(matches!(
        store.delete_connection("missing").await,
        Err(CoreError::NotFound(_))
    ));

    let saved = store.save_connection(new_profile("Tmp", None)).await.expect("save");
    store.delete_connection(&saved.id).await.expect("delete");
    assert!(store.list_connections().await.expect("list").is_empty());
}

#[tokio::test]
async fn import_history_newest_first_and_filtered() {
    let store = test_store().await;
    store.record_import(record("orders", "a.csv", 10)).await.expect("record");
    store.record_import(record("customers", "b.xlsx", 5)).await.expect("record");
    store.record_import(record("orders", "c.csv", 7)).await.expect("record");

    let all = store.list_import_history("c1", None).await.expect("history");
    let files: Vec<&str> = all.iter().map(|h| h.file_name.as_str()).collect();
    assert_eq!(files, vec!["c.csv", "b.xlsx", "a.csv"]);

    let orders = store
        .list_import_history("c1", Some("orders"))
        .await
        .expect("history");
    assert_eq!(orders.len(), 2);
    assert_eq!(orders[0].row_count, 7);
    assert_eq!(orders[0].error_count, 0);

    assert!(store
        .list_import_history("other", None)
        .await
        .expect("history")
        .is_empty());
}

#[tokio::test]
async fn mapping_templates_roundtrip_verbatim() {
    let store = test_store().await;
    let mut mappings = ColumnMapping::new();
    mappings.set("Email", "email");
    mappings.set("Notes", "");
    mappings.set("Legacy", "skip");

    let request = SaveMappingRequest {
        table_name: "customers".to_string(),
        name: "CRM export".to_string(),
        mappings: mappings.clone(),
    };
    let first = store.save_mapping_template("c1", &request).await.expect("save");
    let second = store.save_mapping_template("c1", &request).await.expect("save");
    assert!(second > first);

    let listed = store
        .list_mapping_templates("c1", "customers")
        .await
        .expect("list");
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].id, second);
    assert_eq!(listed[0].mappings, mappings);

    let loaded = store.get_mapping_template(first).await.expect("get");
    assert_eq!(loaded.name, "CRM export");
    assert_eq!(loaded.mappings, mappings);

    store.delete_mapping_template(first).await.expect("delete");
    assert!(matches!(
        store.get_mapping_template(first).await,
        Err(CoreError::NotFound(_))
    ));
    assert!(matches!(
        store.delete_mapping_template(first).await,
        Err(CoreError::NotFound(_))
    ));
}

#[tokio::test]
async fn blank_template_name_is_rejected() {
    let store = test_store().await;
    let request = SaveMappingRequest {
        table_name: "customers".to_string(),
        name: "  ".to_string(),
        mappings: ColumnMapping::new(),
    };
    assert!(matches!(
        store.save_mapping_template("c1", &request).await,
        Err(CoreError::InvalidInput(_))
    ));
}

#[tokio::test]
async fn open_creates_database_and_key_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = MetadataStore::open(dir.path()).await.expect("open");
    let saved = store
        .save_connection(new_profile("Sales", Some("pw")))
        .await
        .expect("save");
    drop(store);

    assert!(dir.path().join("datadock.db").exists());
    assert!(crypto::key_file_path(dir.path()).exists());

    let reopened = MetadataStore::open(dir.path()).await.expect("reopen");
    let profile = reopened.get_profile(&saved.id).await.expect("profile");
    assert_eq!(profile.password.as_deref(), Some("pw"));
}
