use super::*;
use crate::db::engine::testing::{integration_enabled, live_profile};
use crate::db::engine::ConnectionHandle;

#[test]
fn params_map_to_column_data() {
    assert!(matches!(SqlParam::Null.to_sql(), ColumnData::String(None)));
    assert!(matches!(SqlParam::Bool(true).to_sql(), ColumnData::Bit(Some(true))));
    assert!(matches!(SqlParam::Int(9).to_sql(), ColumnData::I64(Some(9))));
    match SqlParam::Text("Ada".to_string()).to_sql() {
        ColumnData::String(Some(s)) => assert_eq!(s, "Ada"),
        other => panic!("unexpected column data: {other:?}"),
    }
}

#[test]
fn column_data_converts_to_json() {
    assert_eq!(convert_column_data(&ColumnData::I32(Some(5))), json!(5));
    assert_eq!(convert_column_data(&ColumnData::Bit(Some(false))), json!(false));
    assert_eq!(
        convert_column_data(&ColumnData::String(Some(Cow::Borrowed("x")))),
        json!("x")
    );
    assert_eq!(
        convert_column_data(&ColumnData::Binary(Some(Cow::Borrowed(&[0xde, 0xad][..])))),
        json!("0xdead")
    );
    assert_eq!(convert_column_data(&ColumnData::I64(None)), Value::Null);
}

async fn live_handle() -> ConnectionHandle {
    let profile = live_profile("sqlserver", "MSSQL", 31433, "sa");
    ConnectionHandle::new(Box::new(SqlServerClient::connect(&profile).await.unwrap()))
}

#[tokio::test]
async fn live_dml_batch_sums_counts() {
    if !integration_enabled() {
        return;
    }
    let mut handle = live_handle().await;

    handle
        .execute_query(
            "IF OBJECT_ID('datadock_it_t', 'U') IS NOT NULL DROP TABLE datadock_it_t; \
             CREATE TABLE datadock_it_t (id INT, name NVARCHAR(50))",
            &[],
        )
        .await
        .unwrap();

    let result = handle
        .execute_query(
            "INSERT INTO datadock_it_t (id, name) VALUES (@P1, @P2), (@P3, @P4)",
            &[
                SqlParam::Int(1),
                SqlParam::Text("a".to_string()),
                SqlParam::Int(2),
                SqlParam::Null,
            ],
        )
        .await
        .unwrap();
    assert_eq!(result.affected_rows, 2);

    let result = handle
        .execute_query("UPDATE datadock_it_t SET name = 'z'; DELETE FROM datadock_it_t WHERE id = 1", &[])
        .await
        .unwrap();
    assert_eq!(result.affected_rows, 3);

    let result = handle
        .execute_query("SELECT id, name FROM datadock_it_t WHERE id < 0", &[])
        .await
        .unwrap();
    assert_eq!(result.columns, vec!["id".to_string(), "name".to_string()]);
    assert!(result.rows.is_empty());

    handle
        .execute_query("DROP TABLE datadock_it_t", &[])
        .await
        .unwrap();
    handle.close().await.unwrap();
}
