//! Schema introspection integration tests.

use pretty_assertions::assert_eq;
use sqlguard::config::DatabaseConfig;
use sqlguard::db::{DatabaseClient, ForeignKey, SqliteClient};

use super::ShopDb;

#[tokio::test]
async fn test_introspect_all_tables() {
    let db = ShopDb::create().await;
    let client = db.client().await;

    let schema = client.introspect_schema().await.unwrap();

    let names: Vec<&str> = schema.tables.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(
        names,
        vec![
            "audit_log",
            "customers",
            "events",
            "order_items",
            "orders",
            "products",
            "refunds"
        ]
    );

    let orders = schema.table("orders").unwrap();
    assert_eq!(orders.primary_key, vec!["id".to_string()]);
    let status = orders.columns.iter().find(|c| c.name == "status").unwrap();
    assert!(!status.is_nullable);
    assert_eq!(status.default.as_deref(), Some("'placed'"));

    assert!(schema.foreign_keys.contains(&ForeignKey::new(
        "orders",
        vec!["customer_id".to_string()],
        "customers",
        vec!["id".to_string()],
    )));
}

#[tokio::test]
async fn test_include_tables_restricts_schema() {
    let db = ShopDb::create().await;
    let mut config = db.config();
    config.include_tables = vec![
        "products".to_string(),
        "order_items".to_string(),
        "orders".to_string(),
    ];
    let client = SqliteClient::connect(&config).await.unwrap();

    let schema = client.introspect_schema().await.unwrap();

    let names: Vec<&str> = schema.tables.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["order_items", "orders", "products"]);
    // orders -> customers points at a hidden table and is dropped.
    assert!(schema.foreign_keys.iter().all(|fk| fk.to_table != "customers"));
    assert!(schema
        .foreign_keys
        .iter()
        .any(|fk| fk.from_table == "order_items" && fk.to_table == "products"));

    let text = schema.format_for_llm();
    assert!(text.contains("Table: products"));
    assert!(!text.contains("audit_log"));
}

#[tokio::test]
async fn test_include_tables_unknown_table_is_config_error() {
    let db = ShopDb::create().await;
    let mut config = db.config();
    config.include_tables = vec!["products".to_string(), "payments".to_string()];
    let client = SqliteClient::connect(&config).await.unwrap();

    let err = client.introspect_schema().await.unwrap_err();

    assert_eq!(err.category(), "Configuration Error");
    assert!(err.to_string().contains("'payments'"));
}

#[tokio::test]
async fn test_missing_file_is_connection_error() {
    let dir = tempfile::tempdir().unwrap();
    let config = DatabaseConfig::with_url(dir.path().join("absent.db").display().to_string());

    let err = SqliteClient::connect(&config).await.unwrap_err();

    assert_eq!(err.category(), "Connection Error");
    // Opening read-only must not create the file.
    assert!(!dir.path().join("absent.db").exists());
}
