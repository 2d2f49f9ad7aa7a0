//! Checkpoint mode against a real database.
//!
//! Savepoint rollback, commit and discard semantics, isolation of the open
//! session from other connections, and recovery after a failed statement.

use super::common::*;
use sqlgate_core::config::RoleName;
use sqlgate_mcp::CheckpointAction;

const TABLE: &str = "cp_items";

fn insert(id: i32, name: &str) -> String {
    format!("INSERT INTO {TABLE} VALUES ({id}, '{name}')")
}

pub async fn test_rollback_then_commit_keeps_earlier_write(ctx: &TestContext) {
    println!("  🧪 test_rollback_then_commit_keeps_earlier_write");
    ctx.reset_table(TABLE).await;
    let executor = ctx.executor(RoleName::Write);

    executor
        .checkpoint(CheckpointAction::Start, None)
        .await
        .expect("start");
    let first = executor.execute(&insert(1, "alpha")).await.expect("insert 1");
    assert_eq!(first.checkpoint_id, Some(1));
    let second = executor
        .execute(&format!("UPDATE {TABLE} SET name = 'changed'"))
        .await
        .expect("update");
    assert_eq!(second.checkpoint_id, Some(2));

    let rolled = executor
        .checkpoint(CheckpointAction::Rollback, Some(1))
        .await
        .expect("rollback");
    assert!(rolled.message.starts_with("Rolled back to checkpoint 1."));
    assert_eq!(rolled.checkpoints.len(), 1);

    executor
        .checkpoint(CheckpointAction::Commit, None)
        .await
        .expect("commit");
    assert_eq!(ctx.names(TABLE).await, vec!["alpha"]);

    println!("    ✅ Only the write before the checkpoint survived");
}

pub async fn test_session_is_invisible_until_commit(ctx: &TestContext) {
    println!("  🧪 test_session_is_invisible_until_commit");
    ctx.reset_table(TABLE).await;
    let executor = ctx.executor(RoleName::Insert);

    executor
        .checkpoint(CheckpointAction::Start, None)
        .await
        .expect("start");
    executor.execute(&insert(1, "alpha")).await.expect("insert");

    assert!(ctx.names(TABLE).await.is_empty(), "uncommitted row leaked");

    // Reads inside the session see their own writes.
    let own = executor
        .execute(&format!("SELECT name FROM {TABLE}"))
        .await
        .expect("select in session");
    assert_eq!(rows(&own).len(), 1);
    assert_eq!(own.checkpoint_id, None);

    executor
        .checkpoint(CheckpointAction::Commit, None)
        .await
        .expect("commit");
    assert_eq!(ctx.names(TABLE).await, vec!["alpha"]);

    println!("    ✅ Session writes isolated until commit");
}

pub async fn test_discard_abandons_everything(ctx: &TestContext) {
    println!("  🧪 test_discard_abandons_everything");
    ctx.reset_table(TABLE).await;
    let executor = ctx.executor(RoleName::Write);

    executor
        .checkpoint(CheckpointAction::Start, None)
        .await
        .expect("start");
    executor.execute(&insert(1, "alpha")).await.expect("insert 1");
    executor.execute(&insert(2, "beta")).await.expect("insert 2");

    let discarded = executor
        .checkpoint(CheckpointAction::Discard, None)
        .await
        .expect("discard");
    assert!(!discarded.active);
    assert!(ctx.names(TABLE).await.is_empty());

    // Back to auto-commit.
    let after = executor.execute(&insert(3, "gamma")).await.expect("insert 3");
    assert_eq!(after.checkpoint_id, None);
    assert_eq!(ctx.names(TABLE).await, vec!["gamma"]);

    println!("    ✅ Discard rolled back the whole session");
}

pub async fn test_recover_from_failed_statement(ctx: &TestContext) {
    println!("  🧪 test_recover_from_failed_statement");
    ctx.reset_table(TABLE).await;
    let executor = ctx.executor(RoleName::Write);

    executor
        .checkpoint(CheckpointAction::Start, None)
        .await
        .expect("start");
    executor.execute(&insert(1, "alpha")).await.expect("insert 1");

    let err = executor
        .execute(&insert(1, "duplicate"))
        .await
        .expect_err("duplicate key must fail");
    assert_eq!(err.code(), "statement_failed");

    // The transaction is aborted until it is rolled back to a checkpoint.
    assert_code(
        executor.execute(&insert(2, "beta")).await,
        "statement_failed",
        "insert in aborted transaction",
    );
    assert!(executor.session().is_active().await);

    executor
        .checkpoint(CheckpointAction::Rollback, Some(1))
        .await
        .expect("rollback to 1");
    let retried = executor.execute(&insert(2, "beta")).await.expect("retry");
    assert_eq!(retried.checkpoint_id, Some(2));

    executor
        .checkpoint(CheckpointAction::Commit, None)
        .await
        .expect("commit");
    assert_eq!(ctx.names(TABLE).await, vec!["alpha", "beta"]);

    println!("    ✅ Rollback to a checkpoint recovered the aborted transaction");
}

pub async fn test_unknown_checkpoint_keeps_session(ctx: &TestContext) {
    println!("  🧪 test_unknown_checkpoint_keeps_session");
    ctx.reset_table(TABLE).await;
    let executor = ctx.executor(RoleName::Write);

    executor
        .checkpoint(CheckpointAction::Start, None)
        .await
        .expect("start");
    executor.execute(&insert(1, "alpha")).await.expect("insert");

    assert_code(
        executor.checkpoint(CheckpointAction::Rollback, Some(7)).await,
        "checkpoint_not_found",
        "rollback to missing checkpoint",
    );

    let list = executor
        .checkpoint(CheckpointAction::List, None)
        .await
        .expect("list");
    assert!(list.message.starts_with("Checkpoints:\n1. "));

    executor
        .checkpoint(CheckpointAction::Commit, None)
        .await
        .expect("commit");
    assert_eq!(ctx.names(TABLE).await, vec!["alpha"]);

    println!("    ✅ Missing checkpoint rejected, session intact");
}

pub async fn test_idle_actions_fail(ctx: &TestContext) {
    println!("  🧪 test_idle_actions_fail");
    let executor = ctx.executor(RoleName::Write);

    for action in [CheckpointAction::Commit, CheckpointAction::Discard] {
        assert_code(
            executor.checkpoint(action, None).await,
            "no_active_session",
            "idle action",
        );
    }
    assert_code(
        executor.checkpoint(CheckpointAction::Rollback, Some(1)).await,
        "no_active_session",
        "idle rollback",
    );

    println!("    ✅ Idle commit/discard/rollback rejected");
}

pub async fn run_all_tests(ctx: &TestContext) {
    println!("\n⏪ Running Checkpoint Tests\n");

    test_rollback_then_commit_keeps_earlier_write(ctx).await;
    test_session_is_invisible_until_commit(ctx).await;
    test_discard_abandons_everything(ctx).await;
    test_recover_from_failed_statement(ctx).await;
    test_unknown_checkpoint_keeps_session(ctx).await;
    test_idle_actions_fail(ctx).await;

    println!("\n✅ All checkpoint tests passed!\n");
}
