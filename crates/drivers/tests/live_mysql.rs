use dbconn_drivers::{Backend, MySqlBackend, SchemaScope, SqlConnectOptions};
use dbconn_translator::sql::{self, ColumnDef};
use serde_json::{Map, Value, json};

const TABLE: &str = "dbconn_live_t";

async fn maybe_backend() -> Option<MySqlBackend> {
    let host = std::env::var("TEST_MYSQL_HOST").ok()?;
    let options = SqlConnectOptions {
        host,
        port: std::env::var("TEST_MYSQL_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(3306),
        username: std::env::var("TEST_MYSQL_USER").unwrap_or_else(|_| "root".to_string()),
        password: std::env::var("TEST_MYSQL_PASSWORD").unwrap_or_default(),
        database: std::env::var("TEST_MYSQL_DATABASE").unwrap_or_else(|_| "testdb".to_string()),
    };
    MySqlBackend::connect(&options).await.ok()
}

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("expected object, got {other}"),
    }
}

#[tokio::test]
async fn mysql_create_insert_select() {
    let Some(backend) = maybe_backend().await else {
        eprintln!(
            "Skipping mysql_create_insert_select: TEST_MYSQL_HOST is not set or the server is unreachable."
        );
        return;
    };
    assert!(backend.is_alive().await);

    backend
        .execute_write(sql::raw(&format!("DROP TABLE IF EXISTS `{TABLE}`")).unwrap())
        .await
        .expect("drop should succeed");

    let columns = [
        ColumnDef {
            name: "id".into(),
            data_type: "INT".into(),
            primary_key: true,
            auto_increment: true,
            ..Default::default()
        },
        ColumnDef {
            name: "name".into(),
            data_type: "VARCHAR(255)".into(),
            not_null: true,
            ..Default::default()
        },
    ];
    backend
        .execute_write(sql::create_table(TABLE, &columns).unwrap())
        .await
        .expect("create table should succeed");

    let inserted = backend
        .execute_write(sql::insert(TABLE, &object(json!({ "name": "a" }))).unwrap())
        .await
        .expect("insert should succeed");
    assert_eq!(inserted.affected_rows, 1);
    assert_eq!(inserted.last_insert_id, 1);

    let rows = backend
        .execute_read(sql::select(TABLE, &[], Some("id = 1"), 100).unwrap())
        .await
        .expect("select should succeed");
    assert_eq!(rows, vec![object(json!({ "id": 1, "name": "a" }))]);

    let counted = backend
        .execute_read(sql::count_rows(TABLE).unwrap())
        .await
        .expect("count should succeed");
    assert_eq!(counted[0]["row_count"], json!(1));

    let tables = backend
        .describe_schema(SchemaScope::Containers)
        .await
        .expect("show tables should succeed");
    assert!(tables.iter().any(|t| t == TABLE));

    let version = backend
        .execute_read(sql::server_version())
        .await
        .expect("version should succeed");
    assert!(version[0]["version"].is_string());

    backend
        .execute_write(sql::raw(&format!("DROP TABLE `{TABLE}`")).unwrap())
        .await
        .expect("cleanup should succeed");
}
