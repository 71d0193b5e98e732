//! Configuration-driven end-to-end tests.

use pretty_assertions::assert_eq;
use sqlguard::config::Config;
use sqlguard::db::{self, Value};
use sqlguard::llm::build_system_prompt;
use sqlguard::query::GuardedExecutor;
use sqlguard::safety::GuardMode;

use super::ShopDb;

fn write_config(dir: &tempfile::TempDir, contents: &str) -> std::path::PathBuf {
    let path = dir.path().join("config.toml");
    std::fs::write(&path, contents).unwrap();
    path
}

#[tokio::test]
async fn test_config_file_drives_guard_and_schema() {
    let db = ShopDb::create().await;
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(
        &dir,
        &format!(
            r#"
[database]
url = "{}"
include_tables = ["customers", "orders", "order_items", "products", "refunds"]

[guard]
mode = "structural"
row_cap = 10

[prompt]
notes = "Revenue = sum(quantity*unit_price_cents) - refunds.amount_cents."
"#,
            db.url()
        ),
    );

    let config = Config::load_from_file(&path).unwrap();
    config.validate().unwrap();
    assert_eq!(config.guard.mode, GuardMode::Structural);

    let client = db::connect(&config.database).await.unwrap();
    let executor = GuardedExecutor::new(client, config.guard()).with_timeout(config.query_timeout());

    let result = executor.execute("SELECT name FROM products").await.unwrap();
    assert_eq!(result.row_count(), 10);

    let count = executor.execute("SELECT count(*) FROM products").await.unwrap();
    assert_eq!(count.rows, vec![vec![Value::Int(300)]]);

    let schema = executor.schema().await.unwrap();
    let prompt = build_system_prompt(
        &schema,
        config.prompt.notes.as_deref(),
        config.guard.row_cap,
    );
    assert!(prompt.contains("Revenue = sum(quantity*unit_price_cents) - refunds.amount_cents."));
    assert!(prompt.contains("capped at 10 rows"));
    assert!(prompt.contains("Table: refunds"));
    assert!(!prompt.contains("Table: events"));

    executor.close().await.unwrap();
}

#[test]
fn test_invalid_config_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(&dir, "[guard]\nrow_cap = 0\n");

    let config = Config::load_from_file(&path).unwrap();
    let err = config.validate().unwrap_err();

    assert_eq!(err.category(), "Configuration Error");
}

#[test]
fn test_malformed_config_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(&dir, "[guard]\nmode = \"loose\"\n");

    let err = Config::load_from_file(&path).unwrap_err();

    assert_eq!(err.category(), "Configuration Error");
}
