//! Schema resources against a real database.

use super::common::*;
use serde_json::Value;
use sqlgate_mcp::ResourceCatalog;

const TABLE: &str = "res_items";

pub async fn test_list_includes_table(ctx: &TestContext) {
    println!("  🧪 test_list_includes_table");
    ctx.reset_table(TABLE).await;
    let catalog = ResourceCatalog::new(ctx.gateway_pool(), "public");

    let resources = catalog.list().await.expect("list resources");
    assert!(
        resources
            .iter()
            .any(|r| r.uri == format!("postgres://{TABLE}/schema")),
        "{:?}",
        resources
    );

    println!("    ✅ Table listed as a resource");
}

pub async fn test_read_describes_columns(ctx: &TestContext) {
    println!("  🧪 test_read_describes_columns");
    ctx.reset_table(TABLE).await;
    let catalog = ResourceCatalog::new(ctx.gateway_pool(), "public");

    let contents = catalog
        .read(&format!("postgres://{TABLE}/schema"))
        .await
        .expect("read resource");
    let columns: Vec<Value> = serde_json::from_str(&contents.text).expect("json columns");

    assert_eq!(columns.len(), 2);
    assert_eq!(columns[0]["column_name"], "id");
    assert_eq!(columns[0]["data_type"], "integer");
    assert_eq!(columns[0]["is_nullable"], "NO");
    assert_eq!(columns[1]["column_name"], "name");

    let missing = catalog.read("postgres://no_such_table/schema").await;
    assert_code(missing, "invalid_arguments", "unknown table");

    println!("    ✅ Columns described in ordinal order");
}

pub async fn run_all_tests(ctx: &TestContext) {
    println!("\n📚 Running Resource Tests\n");

    test_list_includes_table(ctx).await;
    test_read_describes_columns(ctx).await;

    println!("\n✅ All resource tests passed!\n");
}
