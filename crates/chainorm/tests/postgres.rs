//! Live PostgreSQL checks. Skipped unless `DATABASE_URL` is set.

use std::time::Duration;

use chainorm::pg::{PgExecutor, PgExecutorConfig};
use chainorm::{
    Db, DbConfig, ExecMode, ExecOutcome, ExecRequest, Executor, Model, Session, Value, args, cond,
};
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Default, PartialEq, Model)]
#[orm(table = "chainorm_it_people")]
struct Person {
    #[orm(tag = "primaryKey;autoIncrement")]
    id: i64,
    name: String,
    #[orm(tag = "default:18")]
    age: i32,
    #[orm(tag = "softDelete")]
    deleted_at: Option<DateTime<Utc>>,
}

async fn try_connect() -> Option<Db> {
    let _ = dotenvy::dotenv();
    let database_url = std::env::var("DATABASE_URL").ok()?;
    let executor = PgExecutor::connect(&database_url)
        .await
        .expect("Failed to connect to DATABASE_URL with NoTls")
        .with_config(PgExecutorConfig::new().statement_cache_capacity(16));
    Some(Db::new(executor).with_config(DbConfig::new().debug(true)))
}

async fn reset_table(db: &Db) {
    let exec = db.executor();
    for sql in [
        "DROP TABLE IF EXISTS chainorm_it_people",
        "CREATE TABLE chainorm_it_people (
            id BIGSERIAL PRIMARY KEY,
            name TEXT NOT NULL,
            age INT NOT NULL,
            deleted_at TIMESTAMPTZ
        )",
    ] {
        exec.execute(chainorm::ExecRequest {
            sql: sql.to_string(),
            params: Vec::new(),
            mode: chainorm::ExecMode::Exec,
        })
        .await
        .unwrap();
    }
}

#[tokio::test]
async fn crud_round_trip() {
    let Some(db) = try_connect().await else {
        eprintln!("DATABASE_URL not set; skipping");
        return;
    };
    reset_table(&db).await;

    let mut people = vec![
        Person {
            name: "ann".into(),
            age: 31,
            ..Default::default()
        },
        Person {
            name: "bob".into(),
            ..Default::default()
        },
    ];
    db.model::<Person>().create_many(&mut people).await.unwrap();
    assert!(people[0].id > 0);
    assert_eq!(people[1].id, people[0].id + 1);
    assert_eq!(people[1].age, 18);

    let bob = db
        .model::<Person>()
        .where_(cond("name = ?", args!["bob"]))
        .first()
        .await
        .unwrap();
    assert_eq!(bob.age, 18);

    let updated = db
        .model::<Person>()
        .where_([("name", "ann")])
        .update("age", 32)
        .await
        .unwrap();
    assert_eq!(updated.rows_affected, 1);

    db.model::<Person>().delete(&mut people[1]).await.unwrap();
    assert_eq!(db.model::<Person>().count().await.unwrap(), 1);
    assert_eq!(db.model::<Person>().unscoped().count().await.unwrap(), 2);

    let removed = db
        .model::<Person>()
        .unscoped()
        .session(Session::new().allow_global_delete(true))
        .delete_all()
        .await
        .unwrap();
    assert_eq!(removed.rows_affected, 2);
}

#[tokio::test]
async fn database_errors_surface_as_query_errors() {
    let Some(db) = try_connect().await else {
        eprintln!("DATABASE_URL not set; skipping");
        return;
    };

    let err = db
        .executor()
        .execute(chainorm::ExecRequest {
            sql: "SELECT * FROM chainorm_missing_table".to_string(),
            params: Vec::new(),
            mode: chainorm::ExecMode::QueryMany,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, chainorm::OrmError::Query(_)));
}

async fn raw(db: &Db, sql: &str, mode: ExecMode) -> ExecOutcome {
    db.executor()
        .execute(ExecRequest {
            sql: sql.to_string(),
            params: Vec::new(),
            mode,
        })
        .await
        .unwrap()
}

#[tokio::test]
async fn shared_client_transaction_is_exclusive() {
    let Some(db) = try_connect().await else {
        eprintln!("DATABASE_URL not set; skipping");
        return;
    };
    raw(&db, "DROP TABLE IF EXISTS chainorm_it_tx_notes", ExecMode::Exec).await;
    raw(
        &db,
        "CREATE TABLE chainorm_it_tx_notes (id BIGSERIAL PRIMARY KEY, body TEXT NOT NULL)",
        ExecMode::Exec,
    )
    .await;

    let tx = db.begin().await.unwrap();
    raw(
        tx.db(),
        "INSERT INTO chainorm_it_tx_notes (body) VALUES ('inside')",
        ExecMode::Exec,
    )
    .await;

    let outside = db.clone();
    let mut pending = tokio::spawn(async move {
        raw(
            &outside,
            "INSERT INTO chainorm_it_tx_notes (body) VALUES ('outside')",
            ExecMode::Exec,
        )
        .await
    });
    assert!(
        tokio::time::timeout(Duration::from_millis(200), &mut pending)
            .await
            .is_err(),
        "statement outside the transaction must wait for it"
    );

    tx.rollback().await.unwrap();
    pending.await.unwrap();

    let rows = raw(&db, "SELECT body FROM chainorm_it_tx_notes", ExecMode::QueryMany)
        .await
        .into_rows();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("body"), Some(&Value::from("outside")));
}
