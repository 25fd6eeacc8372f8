use super::*;
use crate::data_import::executor::run_import;
use crate::db::engine::testing::{integration_enabled, live_profile};
use crate::db::engine::ConnectionHandle;
use serde_json::json;

#[test]
fn connect_options_skip_blank_database() {
    let mut profile = live_profile("postgresql", "POSTGRES", 5432, "postgres");
    profile.database = Some("   ".to_string());
    let options = connect_options(&profile);
    assert_eq!(options.get_database(), None);
    assert_eq!(options.get_port(), profile.port);
}

async fn live_handle() -> ConnectionHandle {
    let profile = live_profile("postgresql", "POSTGRES", 35432, "datadock");
    ConnectionHandle::new(Box::new(PostgresClient::connect(&profile).await.unwrap()))
}

#[tokio::test]
async fn live_multi_statement_keeps_last_result() {
    if !integration_enabled() {
        return;
    }
    let mut handle = live_handle().await;

    let result = handle
        .execute_query("SELECT 1 AS a; SELECT 2 AS b, 'x' AS c", &[])
        .await
        .unwrap();
    assert_eq!(result.columns, vec!["b".to_string(), "c".to_string()]);
    assert_eq!(result.rows[0]["b"], serde_json::json!(2));
    assert_eq!(result.rows[0]["c"], serde_json::json!("x"));
    assert_eq!(result.affected_rows, 1);

    handle.close().await.unwrap();
}

#[tokio::test]
async fn live_typed_insert_through_casts() {
    if !integration_enabled() {
        return;
    }
    let mut handle = live_handle().await;

    handle
        .execute_query(
            "DROP TABLE IF EXISTS datadock_it_people; \
             CREATE TABLE datadock_it_people (id integer, name text, joined date)",
            &[],
        )
        .await
        .unwrap();

    let types = handle.column_types("datadock_it_people").await.unwrap();
    assert_eq!(types.get("id").map(String::as_str), Some("integer"));

    let result = handle
        .execute_query(
            "INSERT INTO \"datadock_it_people\" (\"id\", \"name\", \"joined\") VALUES ($1::integer, $2::text, $3::date)",
            &[
                SqlParam::Int(7),
                SqlParam::Text("Ada".to_string()),
                SqlParam::Text("2024-01-31".to_string()),
            ],
        )
        .await
        .unwrap();
    assert_eq!(result.affected_rows, 1);

    let columns = handle.list_columns("datadock_it_people").await.unwrap();
    assert_eq!(columns, vec!["id", "name", "joined"]);

    handle
        .execute_query("DROP TABLE datadock_it_people", &[])
        .await
        .unwrap();
    handle.close().await.unwrap();
}

fn import_row(value: serde_json::Value) -> crate::db_types::Row {
    value.as_object().cloned().unwrap()
}

fn sized_columns() -> Vec<(String, String)> {
    [("Code", "code"), ("Flags", "flags"), ("Amount", "amount"), ("Label", "label")]
        .iter()
        .map(|(source, target)| (source.to_string(), target.to_string()))
        .collect()
}

#[tokio::test]
async fn live_import_keeps_sized_column_values() {
    if !integration_enabled() {
        return;
    }
    let mut handle = live_handle().await;

    handle
        .execute_query(
            "DROP TABLE IF EXISTS datadock_it_codes; \
             CREATE TABLE datadock_it_codes \
             (code char(3), flags bit(3), amount numeric(6,2), label varchar(10))",
            &[],
        )
        .await
        .unwrap();

    let types = handle.column_types("datadock_it_codes").await.unwrap();
    assert_eq!(types.get("code").map(String::as_str), Some("bpchar"));
    assert_eq!(types.get("amount").map(String::as_str), Some("numeric"));

    let rows = vec![
        import_row(json!({"Code": "ABC", "Flags": "101", "Amount": "1234.567", "Label": "hello"})),
        import_row(json!({"Code": "XY", "Flags": "011", "Amount": 12.5, "Label": ""})),
    ];
    let outcome = run_import(&mut handle, "datadock_it_codes", &sized_columns(), &rows)
        .await
        .unwrap();
    assert_eq!(outcome.success_count, 2);

    let stored = handle
        .execute_query(
            "SELECT code, flags::text AS flags, amount::text AS amount, label \
             FROM datadock_it_codes ORDER BY flags DESC",
            &[],
        )
        .await
        .unwrap();
    assert_eq!(stored.rows[0]["code"], json!("ABC"));
    assert_eq!(stored.rows[0]["flags"], json!("101"));
    assert_eq!(stored.rows[0]["amount"], json!("1234.57"));
    assert_eq!(stored.rows[0]["label"], json!("hello"));
    assert_eq!(stored.rows[1]["code"], json!("XY "));
    assert_eq!(stored.rows[1]["flags"], json!("011"));
    assert_eq!(stored.rows[1]["amount"], json!("12.50"));
    assert_eq!(stored.rows[1]["label"], serde_json::Value::Null);

    handle
        .execute_query("DROP TABLE datadock_it_codes", &[])
        .await
        .unwrap();
    handle.close().await.unwrap();
}

#[tokio::test]
async fn live_import_rejects_overlong_values_instead_of_truncating() {
    if !integration_enabled() {
        return;
    }
    let mut handle = live_handle().await;

    handle
        .execute_query(
            "DROP TABLE IF EXISTS datadock_it_short; \
             CREATE TABLE datadock_it_short (code char(3))",
            &[],
        )
        .await
        .unwrap();

    let columns = vec![("Code".to_string(), "code".to_string())];
    let rows = vec![import_row(json!({"Code": "ABCD"}))];
    let err = run_import(&mut handle, "datadock_it_short", &columns, &rows)
        .await
        .unwrap_err();
    match err {
        CoreError::Import {
            success_count,
            error_count,
            ..
        } => {
            assert_eq!(success_count, 0);
            assert_eq!(error_count, 1);
        }
        other => panic!("unexpected error: {:?}", other),
    }

    let stored = handle
        .execute_query("SELECT count(*)::int AS n FROM datadock_it_short", &[])
        .await
        .unwrap();
    assert_eq!(stored.rows[0]["n"], json!(0));

    handle
        .execute_query("DROP TABLE datadock_it_short", &[])
        .await
        .unwrap();
    handle.close().await.unwrap();
}
