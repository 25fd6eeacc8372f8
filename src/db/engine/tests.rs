use super::testing::{profile, Script, ScriptedConnector};
use super::*;

#[tokio::test]
async fn begin_twice_is_rejected() {
    let connector = ScriptedConnector::new(Script::new(EngineKind::PostgreSQL));
    let mut handle = connector.handle();

    handle.begin_transaction().await.unwrap();
    assert!(handle.active_transaction().is_some());
    let err = handle.begin_transaction().await.unwrap_err();
    assert!(matches!(err, CoreError::Query(_)));

    handle.commit().await.unwrap();
    assert!(handle.active_transaction().is_none());
    handle.close().await.unwrap();

    let recorder = connector.recorder.lock().unwrap();
    assert_eq!(recorder.begins, 1);
    assert_eq!(recorder.commits, 1);
    assert_eq!(recorder.closes, 1);
}

#[tokio::test]
async fn commit_and_rollback_without_transaction_are_noops() {
    let connector = ScriptedConnector::new(Script::new(EngineKind::MySQL));
    let mut handle = connector.handle();

    handle.commit().await.unwrap();
    handle.rollback().await.unwrap();
    handle.close().await.unwrap();

    let recorder = connector.recorder.lock().unwrap();
    assert_eq!(recorder.commits, 0);
    assert_eq!(recorder.rollbacks, 0);
}

#[tokio::test]
async fn rollback_clears_transaction() {
    let connector = ScriptedConnector::new(Script::new(EngineKind::SqlServer));
    let mut handle = connector.handle();

    handle.begin_transaction().await.unwrap();
    handle.rollback().await.unwrap();
    assert!(handle.active_transaction().is_none());
    // a fresh transaction can be started afterwards
    handle.begin_transaction().await.unwrap();
    handle.commit().await.unwrap();
    handle.close().await.unwrap();

    let recorder = connector.recorder.lock().unwrap();
    assert_eq!(recorder.begins, 2);
    assert_eq!(recorder.rollbacks, 1);
    assert_eq!(recorder.commits, 1);
}

#[tokio::test]
async fn handle_reports_client_kind_and_forwards_calls() {
    let script = Script::new(EngineKind::MySQL).with_table("users", &["id", "email"]);
    let connector = ScriptedConnector::new(script);
    let mut handle = connector.handle();

    assert_eq!(handle.kind(), EngineKind::MySQL);
    assert_eq!(handle.list_tables().await.unwrap(), vec!["users".to_string()]);
    assert_eq!(
        handle.list_columns("users").await.unwrap(),
        vec!["id".to_string(), "email".to_string()]
    );
    assert!(handle.list_columns("missing").await.is_err());

    handle
        .execute_query("SELECT 1", &[SqlParam::Int(1)])
        .await
        .unwrap();
    handle.close().await.unwrap();

    let recorder = connector.recorder.lock().unwrap();
    assert_eq!(recorder.statements.len(), 1);
    assert_eq!(recorder.statements[0].0, "SELECT 1");
    assert_eq!(recorder.statements[0].1, vec![SqlParam::Int(1)]);
}

#[tokio::test]
async fn unknown_engine_is_a_connection_error() {
    let err = connect(&profile("c1", "oracle")).await.unwrap_err();
    match err {
        CoreError::Connection { engine, message } => {
            assert_eq!(engine, "oracle");
            assert!(message.contains("unsupported database type"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn debug_shows_kind_and_transaction_state() {
    let connector = ScriptedConnector::new(Script::new(EngineKind::PostgreSQL));
    let mut handle = connector.handle();
    assert_eq!(
        format!("{handle:?}"),
        "ConnectionHandle { kind: PostgreSQL, open: true, in_transaction: false }"
    );

    handle.begin_transaction().await.unwrap();
    assert!(format!("{handle:?}").contains("in_transaction: true"));
    handle.rollback().await.unwrap();
    handle.close().await.unwrap();
}
