//! Caller-driven transactions.
//!
//! [`Db::begin`] opens a transaction on the executor and returns a
//! [`DbTransaction`] whose [`Db`] handle runs every chain inside it.
//! [`Db::transaction`] wraps that in a closure that commits on `Ok` and rolls
//! back on `Err`.
//!
//! Inside a transaction, a nested `begin` (for example a model hook running in
//! a finisher) becomes a savepoint: it is released on success and rolled back
//! to on failure, leaving the outer transaction open.
//!
//! ```ignore
//! let accounts = db
//!     .transaction(|tx| async move {
//!         tx.model::<Account>().where_(cond("id = ?", args![1])).update("balance", 50).await?;
//!         tx.model::<Account>().where_(cond("id = ?", args![2])).update("balance", 150).await?;
//!         tx.model::<Account>().find().await
//!     })
//!     .await?;
//! ```

use std::sync::{Arc, Weak};

use async_trait::async_trait;
use tracing::warn;

use crate::db::Db;
use crate::error::{OrmError, OrmResult};
use crate::executor::{ExecMode, ExecOutcome, ExecRequest, Executor, Transaction};
use crate::query::Query;
use crate::schema::Model;

/// Commit on `Ok`, roll back on `Err`. A failed rollback is appended to the
/// original error.
pub(crate) async fn finish_tx<T>(tx: Box<dyn Transaction>, result: OrmResult<T>) -> OrmResult<T> {
    match result {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(err) => match tx.rollback().await {
            Ok(()) => Err(err),
            Err(rollback) => {
                warn!(target: "chainorm.sql", error = %rollback, "rollback failed");
                Err(err.combine(rollback))
            }
        },
    }
}

async fn run_sql(executor: &dyn Executor, sql: String) -> OrmResult<()> {
    executor
        .execute(ExecRequest {
            sql,
            params: Vec::new(),
            mode: ExecMode::Exec,
        })
        .await?;
    Ok(())
}

/// The executor a transaction-bound [`Db`] runs on.
struct TxScope {
    tx: Box<dyn Transaction>,
    this: Weak<TxScope>,
}

impl TxScope {
    fn upgrade(&self) -> OrmResult<Arc<TxScope>> {
        self.this
            .upgrade()
            .ok_or_else(|| OrmError::Transaction("transaction already finished".to_string()))
    }
}

#[async_trait]
impl Executor for TxScope {
    async fn execute(&self, request: ExecRequest) -> OrmResult<ExecOutcome> {
        self.tx.execute(request).await
    }

    async fn begin(&self) -> OrmResult<Box<dyn Transaction>> {
        Savepoint::open(self.upgrade()?, 1).await
    }
}

/// `SAVEPOINT chainorm_sp_<depth>` inside a [`TxScope`].
///
/// PostgreSQL lets a savepoint name be reused; `RELEASE` and `ROLLBACK TO`
/// act on the most recent one, so one name per depth is enough.
struct Savepoint {
    scope: Arc<TxScope>,
    depth: usize,
}

impl Savepoint {
    async fn open(scope: Arc<TxScope>, depth: usize) -> OrmResult<Box<dyn Transaction>> {
        let savepoint = Savepoint { scope, depth };
        run_sql(&*savepoint.scope.tx, format!("SAVEPOINT {}", savepoint.name())).await?;
        Ok(Box::new(savepoint))
    }

    fn name(&self) -> String {
        format!("chainorm_sp_{}", self.depth)
    }
}

#[async_trait]
impl Executor for Savepoint {
    async fn execute(&self, request: ExecRequest) -> OrmResult<ExecOutcome> {
        self.scope.tx.execute(request).await
    }

    async fn begin(&self) -> OrmResult<Box<dyn Transaction>> {
        Savepoint::open(Arc::clone(&self.scope), self.depth + 1).await
    }
}

#[async_trait]
impl Transaction for Savepoint {
    async fn commit(self: Box<Self>) -> OrmResult<()> {
        run_sql(&*self.scope.tx, format!("RELEASE SAVEPOINT {}", self.name())).await
    }

    async fn rollback(self: Box<Self>) -> OrmResult<()> {
        run_sql(&*self.scope.tx, format!("ROLLBACK TO SAVEPOINT {}", self.name())).await
    }
}

/// An open transaction started with [`Db::begin`].
///
/// Dropping it without `commit` or `rollback` leaves the rollback to the
/// executor's transaction handle.
pub struct DbTransaction {
    db: Db,
    scope: Arc<TxScope>,
}

impl DbTransaction {
    pub(crate) async fn open(db: &Db) -> OrmResult<Self> {
        let tx = db.executor().begin().await?;
        let scope = Arc::new_cyclic(|this| TxScope {
            tx,
            this: this.clone(),
        });
        let executor: Arc<dyn Executor> = scope.clone();
        Ok(Self {
            db: db.rebind(executor),
            scope,
        })
    }

    /// The handle every chain in this transaction should start from.
    pub fn db(&self) -> &Db {
        &self.db
    }

    pub fn model<M: Model>(&self) -> Query<M> {
        self.db.model()
    }

    pub async fn commit(self) -> OrmResult<()> {
        self.into_inner()?.commit().await
    }

    pub async fn rollback(self) -> OrmResult<()> {
        self.into_inner()?.rollback().await
    }

    /// Commit or roll back depending on `result`.
    pub(crate) async fn finish<T>(self, result: OrmResult<T>) -> OrmResult<T> {
        match self.into_inner() {
            Ok(tx) => finish_tx(tx, result).await,
            Err(err) => Err(match result {
                Ok(_) => err,
                Err(first) => first.combine(err),
            }),
        }
    }

    fn into_inner(self) -> OrmResult<Box<dyn Transaction>> {
        let DbTransaction { db, scope } = self;
        drop(db);
        Arc::into_inner(scope).map(|scope| scope.tx).ok_or_else(|| {
            OrmError::Transaction(
                "transaction handle is still in use by a Db clone or query".to_string(),
            )
        })
    }
}

impl std::fmt::Debug for DbTransaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DbTransaction")
            .field("db", &self.db)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args;
    use crate::condition::cond;
    use crate::executor::{RecordingExecutor, TxEvent};
    use crate::schema::testing::{Note, User, user};

    fn setup() -> (RecordingExecutor, Db) {
        let exec = RecordingExecutor::new();
        (exec.clone(), Db::new(exec))
    }

    #[tokio::test]
    async fn closure_chains_share_one_transaction() {
        let (exec, db) = setup();
        let found = db
            .transaction(|tx| async move {
                let mut ann = user("ann", 30);
                tx.model::<User>().create(&mut ann).await?;
                tx.model::<User>()
                    .where_(cond("name = ?", args!["ann"]))
                    .update("age", 31)
                    .await?;
                tx.model::<User>().find().await.map(|users| users.len())
            })
            .await
            .unwrap();

        assert_eq!(found, 0);
        assert_eq!(exec.tx_events(), [TxEvent::Begin, TxEvent::Commit]);
        assert_eq!(exec.requests().len(), 3);
    }

    #[tokio::test]
    async fn closure_error_rolls_back() {
        let (exec, db) = setup();
        let err = db
            .transaction(|tx| async move {
                tx.model::<User>()
                    .where_(cond("id = ?", args![1]))
                    .update("age", 40)
                    .await?;
                Err::<(), _>(OrmError::validation("stop"))
            })
            .await
            .unwrap_err();

        assert!(err.is_validation());
        assert_eq!(exec.tx_events(), [TxEvent::Begin, TxEvent::Rollback]);
        assert_eq!(exec.requests().len(), 1);
    }

    #[tokio::test]
    async fn hooks_inside_a_transaction_use_savepoints() {
        let (exec, db) = setup();
        let tx = db.begin().await.unwrap();
        let mut note = Note {
            body: "  hello ".into(),
            ..Note::default()
        };
        tx.model::<Note>().create(&mut note).await.unwrap();
        tx.commit().await.unwrap();

        let sql: Vec<String> = exec.requests().into_iter().map(|r| r.sql).collect();
        assert_eq!(sql.first().map(String::as_str), Some("SAVEPOINT chainorm_sp_1"));
        assert_eq!(sql.last().map(String::as_str), Some("RELEASE SAVEPOINT chainorm_sp_1"));
        assert_eq!(note.body, "hello");
        assert_eq!(exec.tx_events(), [TxEvent::Begin, TxEvent::Commit]);
    }

    #[tokio::test]
    async fn failing_hook_rolls_back_to_its_savepoint() {
        let (exec, db) = setup();
        let tx = db.begin().await.unwrap();
        let mut blank = Note::default();
        let err = tx.model::<Note>().create(&mut blank).await.unwrap_err();
        assert!(err.is_validation());
        tx.rollback().await.unwrap();

        let sql: Vec<String> = exec.requests().into_iter().map(|r| r.sql).collect();
        assert_eq!(
            sql,
            ["SAVEPOINT chainorm_sp_1", "ROLLBACK TO SAVEPOINT chainorm_sp_1"]
        );
        assert_eq!(exec.tx_events(), [TxEvent::Begin, TxEvent::Rollback]);
    }

    #[tokio::test]
    async fn leaked_handle_is_reported() {
        let (exec, db) = setup();
        let tx = db.begin().await.unwrap();
        let leaked = tx.db().clone();
        let err = tx.commit().await.unwrap_err();
        assert!(matches!(err, OrmError::Transaction(_)));
        assert_eq!(exec.tx_events(), [TxEvent::Begin]);
        drop(leaked);
    }
}
