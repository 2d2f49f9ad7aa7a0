//! Role gating against a real database.
//!
//! Covers auto-commit execution per role, denials that never reach the
//! database, and the read-only transaction that stops trailing statements.

use super::common::*;
use serde_json::json;
use sqlgate_core::config::RoleName;

const TABLE: &str = "perm_items";

pub async fn test_insert_role_autocommits(ctx: &TestContext) {
    println!("  🧪 test_insert_role_autocommits");
    ctx.reset_table(TABLE).await;
    let executor = ctx.executor(RoleName::Insert);

    let result = executor
        .execute(&format!("INSERT INTO {TABLE} VALUES (1, 'alpha')"))
        .await
        .expect("INSERT should succeed");
    assert_eq!(result.command, "INSERT");
    assert_eq!(row_count(&result), 1);
    assert_eq!(result.checkpoint_id, None);

    // Visible to other connections immediately.
    assert_eq!(ctx.names(TABLE).await, vec!["alpha"]);

    println!("    ✅ INSERT committed without a session");
}

pub async fn test_insert_role_cannot_delete(ctx: &TestContext) {
    println!("  🧪 test_insert_role_cannot_delete");
    ctx.reset_table(TABLE).await;
    let executor = ctx.executor(RoleName::Insert);
    executor
        .execute(&format!("INSERT INTO {TABLE} VALUES (1, 'alpha')"))
        .await
        .expect("INSERT should succeed");

    let result = executor.execute(&format!("DELETE FROM {TABLE}")).await;
    assert_code(result, "permission_denied", "DELETE under insert role");
    assert_eq!(ctx.names(TABLE).await, vec!["alpha"]);

    println!("    ✅ DELETE denied, row intact");
}

pub async fn test_read_role_selects(ctx: &TestContext) {
    println!("  🧪 test_read_role_selects");
    ctx.reset_table(TABLE).await;
    sqlx::query(&format!("INSERT INTO {TABLE} VALUES (1, 'alpha'), (2, 'beta')"))
        .execute(&ctx.pool)
        .await
        .expect("seed");
    let executor = ctx.executor(RoleName::Read);

    let result = executor
        .execute(&format!("SELECT id, name FROM {TABLE} ORDER BY id"))
        .await
        .expect("SELECT should succeed");
    assert_eq!(
        rows(&result),
        &[json!({"id": 1, "name": "alpha"}), json!({"id": 2, "name": "beta"})]
    );

    let empty = executor
        .execute(&format!("SELECT * FROM {TABLE} WHERE id = 99"))
        .await
        .expect("empty SELECT should succeed");
    assert!(rows(&empty).is_empty());

    let cte = executor
        .execute(&format!("WITH x AS (SELECT count(*) AS n FROM {TABLE}) SELECT n FROM x"))
        .await
        .expect("WITH should be treated as a read");
    assert_eq!(rows(&cte), &[json!({"n": 2})]);

    println!("    ✅ Reads return rows, including empty results");
}

pub async fn test_read_role_blocks_trailing_write(ctx: &TestContext) {
    println!("  🧪 test_read_role_blocks_trailing_write");
    ctx.reset_table(TABLE).await;
    let executor = ctx.executor(RoleName::Read);

    let result = executor
        .execute(&format!("SELECT 1; DROP TABLE {TABLE}"))
        .await;
    assert_code(result, "statement_failed", "trailing DROP under read role");
    assert!(ctx.table_exists(TABLE).await, "table must survive");

    println!("    ✅ Read-only transaction rejected the trailing DROP");
}

pub async fn test_statement_failure_passes_through(ctx: &TestContext) {
    println!("  🧪 test_statement_failure_passes_through");
    ctx.reset_table(TABLE).await;
    let executor = ctx.executor(RoleName::Write);
    executor
        .execute(&format!("INSERT INTO {TABLE} VALUES (1, 'alpha')"))
        .await
        .expect("INSERT should succeed");

    let err = executor
        .execute(&format!("INSERT INTO {TABLE} VALUES (1, 'duplicate')"))
        .await
        .expect_err("duplicate key must fail");
    assert_eq!(err.code(), "statement_failed");
    assert!(err.to_string().contains("duplicate key"), "{}", err);

    // The pool still works after the failure.
    executor
        .execute(&format!("INSERT INTO {TABLE} VALUES (2, 'beta')"))
        .await
        .expect("later INSERT should succeed");
    assert_eq!(ctx.names(TABLE).await, vec!["alpha", "beta"]);

    println!("    ✅ Database error surfaced verbatim, connection reusable");
}

pub async fn test_admin_can_alter(ctx: &TestContext) {
    println!("  🧪 test_admin_can_alter");
    ctx.reset_table(TABLE).await;

    let sql = format!("ALTER TABLE {TABLE} ADD COLUMN note text");
    assert_code(
        ctx.executor(RoleName::Write).execute(&sql).await,
        "permission_denied",
        "ALTER under write role",
    );

    let result = ctx
        .executor(RoleName::Admin)
        .execute(&sql)
        .await
        .expect("ALTER under admin should succeed");
    assert_eq!(result.command, "ALTER");

    println!("    ✅ ALTER gated to admin");
}

pub async fn run_all_tests(ctx: &TestContext) {
    println!("\n🔐 Running Permission Tests\n");

    test_insert_role_autocommits(ctx).await;
    test_insert_role_cannot_delete(ctx).await;
    test_read_role_selects(ctx).await;
    test_read_role_blocks_trailing_write(ctx).await;
    test_statement_failure_passes_through(ctx).await;
    test_admin_can_alter(ctx).await;

    println!("\n✅ All permission tests passed!\n");
}
