use std::fmt;
use std::future::Future;
use std::sync::Arc;

use crate::config::{CancelSignal, DbConfig, Session};
use crate::error::OrmResult;
use crate::executor::Executor;
use crate::query::Query;
use crate::schema::Model;
use crate::transaction::DbTransaction;

/// Entry point: an executor plus default configuration.
///
/// Cheap to clone; every clone shares the executor.
///
/// ```ignore
/// let db = Db::new(PgExecutor::new(client));
/// let adults = db.model::<User>().where_(cond("age >= ?", args![18])).find().await?;
/// ```
#[derive(Clone)]
pub struct Db {
    executor: Arc<dyn Executor>,
    config: DbConfig,
    cancel: Option<CancelSignal>,
}

impl Db {
    pub fn new(executor: impl Executor + 'static) -> Self {
        Self::from_arc(Arc::new(executor))
    }

    pub fn from_arc(executor: Arc<dyn Executor>) -> Self {
        Self {
            executor,
            config: DbConfig::default(),
            cancel: None,
        }
    }

    pub fn with_config(mut self, config: DbConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &DbConfig {
        &self.config
    }

    pub fn executor(&self) -> &Arc<dyn Executor> {
        &self.executor
    }

    pub(crate) fn cancel_signal(&self) -> Option<&CancelSignal> {
        self.cancel.as_ref()
    }

    /// A handle with session overrides applied to every chain it starts.
    pub fn session(&self, session: Session) -> Db {
        let mut db = self.clone();
        session.apply(&mut db.config);
        if let Some(cancel) = session.cancel {
            db.cancel = Some(cancel);
        }
        db
    }

    /// Start a query chain for `M`.
    pub fn model<M: Model>(&self) -> Query<M> {
        Query::new(self.clone())
    }

    /// Same configuration over another executor.
    pub(crate) fn rebind(&self, executor: Arc<dyn Executor>) -> Db {
        Db {
            executor,
            config: self.config,
            cancel: self.cancel.clone(),
        }
    }

    /// Open a transaction. Chains started from [`DbTransaction::db`] run
    /// inside it until `commit` or `rollback`.
    pub async fn begin(&self) -> OrmResult<DbTransaction> {
        DbTransaction::open(self).await
    }

    /// Run `f` inside a transaction: commit when it returns `Ok`, roll back
    /// when it returns `Err`.
    ///
    /// Use the handle passed to `f`. On a single shared client the
    /// transaction holds the connection exclusively, so a statement sent
    /// through the outer `Db` waits until the transaction ends.
    pub async fn transaction<T, F, Fut>(&self, f: F) -> OrmResult<T>
    where
        F: FnOnce(Db) -> Fut,
        Fut: Future<Output = OrmResult<T>>,
    {
        let tx = self.begin().await?;
        let result = f(tx.db().clone()).await;
        tx.finish(result).await
    }
}

impl fmt::Debug for Db {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Db")
            .field("config", &self.config)
            .field("cancel", &self.cancel)
            .finish_non_exhaustive()
    }
}
