//! `#[derive(Model)]` end to end against the recording executor.

use chainorm::{
    BoxFuture, Db, ExecOutcome, HookContext, Hooks, Model, ModelHooks, OrmError, OrmResult,
    RecordingExecutor, Row, TxEvent, Value, args, cond,
};
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Default, PartialEq, Model)]
struct AccountHolder {
    #[orm(tag = "primaryKey;autoIncrement")]
    id: i64,
    #[orm(column = "display_name")]
    name: String,
    #[orm(tag = "default:active")]
    status: String,
    deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Model)]
#[orm(table = "ledger_entries", hooks)]
struct LedgerEntry {
    id: i64,
    amount: i64,
    #[orm(tag = "softDelete:flag")]
    removed: Option<i64>,
}

fn reject_negative<'a>(entry: &'a mut LedgerEntry, _ctx: HookContext<'a>) -> BoxFuture<'a, OrmResult<()>> {
    Box::pin(async move {
        if entry.amount < 0 {
            return Err(OrmError::validation("amount must not be negative"));
        }
        Ok(())
    })
}

impl ModelHooks for LedgerEntry {
    fn register_hooks() -> Hooks<Self> {
        Hooks::new().before_mutate(reject_negative)
    }
}

fn setup() -> (RecordingExecutor, Db) {
    let exec = RecordingExecutor::new();
    (exec.clone(), Db::new(exec))
}

#[test]
fn derived_schema_uses_snake_case_and_directives() {
    let schema = AccountHolder::schema().unwrap();
    assert_eq!(schema.table(), "account_holder");
    assert_eq!(schema.primary_field().column, "id");
    assert_eq!(schema.field("name").unwrap().column, "display_name");
    assert_eq!(
        schema.field("status").unwrap().default,
        Some(Value::from("active"))
    );
    assert!(schema.soft_delete_field().is_none());

    let ledger = LedgerEntry::schema().unwrap();
    assert_eq!(ledger.table(), "ledger_entries");
    assert_eq!(ledger.soft_delete_field().unwrap().column, "removed");
}

#[test]
fn schema_is_resolved_once_per_type() {
    let a = AccountHolder::schema().unwrap();
    let b = AccountHolder::schema().unwrap();
    assert!(std::sync::Arc::ptr_eq(&a, &b));
}

#[tokio::test]
async fn create_and_find_round_trip_through_the_executor() {
    let (exec, db) = setup();
    exec.push_outcome(ExecOutcome::Rows(vec![Row::from_pairs([("id", Value::I64(12))])]));

    let mut holder = AccountHolder {
        name: "Ada".into(),
        ..Default::default()
    };
    db.model::<AccountHolder>().create(&mut holder).await.unwrap();
    assert_eq!(holder.id, 12);

    let insert = exec.last_request().unwrap();
    assert_eq!(
        insert.sql,
        r#"INSERT INTO "account_holder" ("display_name", "status", "deleted_at") VALUES ($1, $2, $3) RETURNING "id""#
    );
    assert_eq!(insert.params, args!["Ada", "active", Value::Null]);

    exec.push_outcome(ExecOutcome::Rows(vec![Row::from_pairs([
        ("id", Value::I64(12)),
        ("display_name", Value::from("Ada")),
        ("status", Value::from("active")),
        ("deleted_at", Value::Null),
    ])]));
    let found = db
        .model::<AccountHolder>()
        .where_(cond("status = ?", args!["active"]))
        .find()
        .await
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, holder.id);
    assert_eq!(found[0].name, "Ada");
    assert_eq!(found[0].status, "active");
    assert_eq!(found[0].deleted_at, None);
}

#[tokio::test]
async fn flag_soft_delete_sets_marker() {
    let (exec, db) = setup();
    let mut entry = LedgerEntry {
        id: 3,
        amount: 10,
        removed: None,
    };
    db.model::<LedgerEntry>().delete(&mut entry).await.unwrap();

    let requests = exec.requests();
    assert_eq!(
        requests[0].sql,
        r#"UPDATE "ledger_entries" SET "removed" = $1 WHERE ("removed" IS NULL) AND ("id" = $2)"#
    );
    assert_eq!(requests[0].params, args![1_i64, 3_i64]);
    assert_eq!(exec.tx_events(), [TxEvent::Begin, TxEvent::Commit]);
}

#[tokio::test]
async fn derived_hooks_guard_mutations() {
    let (exec, db) = setup();
    let mut entry = LedgerEntry {
        id: 0,
        amount: -5,
        removed: None,
    };
    let err = db.model::<LedgerEntry>().create(&mut entry).await.unwrap_err();
    assert!(err.is_validation());
    assert!(exec.requests().is_empty());
    assert_eq!(exec.tx_events(), [TxEvent::Begin, TxEvent::Rollback]);
}
