//! # chainorm
//!
//! A chain-call query layer for PostgreSQL.
//!
//! ## Features
//!
//! - **Condition trees**: `where_` / `or` / `not` compose into one tree, with
//!   nested groups rendered in fully parenthesized form
//! - **Schema metadata**: `#[derive(Model)]` plus field directives
//!   (`primaryKey`, `autoIncrement`, `softDelete`, `default:...`), resolved once
//!   per type and cached
//! - **Statement assembly**: clause builders rendered in a fixed order with
//!   `$n` placeholders
//! - **Safe defaults**: UPDATE and DELETE require a WHERE unless allowed
//! - **Cheap branching**: cloning a query copies references; builders are
//!   copied on write
//! - **Transactions**: [`Db::transaction`] runs several chains in one
//!   transaction; hooks inside it use savepoints
//! - **Pluggable executor**: any [`Executor`]; [`pg::PgExecutor`] for
//!   PostgreSQL, [`RecordingExecutor`] for dry runs
//!
//! ```ignore
//! use chainorm::{Db, Model, args, cond, pg::PgExecutor};
//!
//! #[derive(Debug, Default, Model)]
//! #[orm(table = "users")]
//! struct User {
//!     #[orm(tag = "primaryKey;autoIncrement")]
//!     id: i64,
//!     name: String,
//!     age: i32,
//! }
//!
//! let db = Db::new(PgExecutor::connect(&database_url).await?);
//!
//! let adults = db
//!     .model::<User>()
//!     .where_(cond("age >= ?", args![18]))
//!     .order("name")
//!     .find()
//!     .await?;
//!
//! let mut user = User { name: "alice".into(), age: 30, ..Default::default() };
//! db.model::<User>().create(&mut user).await?;
//! ```

extern crate self as chainorm;

pub mod clause;
pub mod condition;
pub mod config;
pub mod db;
pub mod error;
pub mod executor;
pub mod hooks;
mod monitor;
pub mod naming;
pub mod pg;
pub mod query;
pub mod schema;
pub mod statement;
pub mod transaction;
pub mod value;

pub use clause::{LockMode, OnConflict};
pub use condition::{Cond, Fields, IntoCondition, JoinKind, Predicate, cond};
pub use config::{CancelSignal, DbConfig, Session};
pub use db::Db;
pub use error::{OrmError, OrmResult};
pub use executor::{
    ExecMode, ExecOutcome, ExecRequest, ExecSummary, Executor, RecordingExecutor, Row,
    Transaction, TxEvent,
};
pub use hooks::{HookContext, Hooks, ModelHooks, Operation};
pub use query::Query;
pub use schema::{Field, FieldDef, FieldValue, FieldValues, Model, Schema, SchemaRegistry};
pub use statement::BuiltStatement;
pub use transaction::DbTransaction;
pub use value::{SqlField, Value, ValueKind};

#[cfg(feature = "derive")]
pub use chainorm_derive::Model;

/// Re-exported for `Hooks` signatures.
pub use futures_core::future::BoxFuture;
