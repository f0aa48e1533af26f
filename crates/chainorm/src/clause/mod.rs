//! Per-kind clause builders.
//!
//! Each builder holds only its own state and renders one [`Clause`] (text with
//! `?` placeholders plus its parameters) against the statement's schema. The
//! statement assembler runs them in [`ClauseKind::ORDER`].

mod conflict;
mod delete;
mod insert;
mod lock;
mod paging;
mod select;
mod update;
mod where_clause;


pub use conflict::{ConflictBuilder, OnConflict};
pub use delete::DeleteBuilder;
pub use insert::{InsertBuilder, ReturningBuilder, ValuesBuilder};
pub use lock::{LockBuilder, LockMode};
pub use paging::{LimitBuilder, OffsetBuilder, OrderBuilder};
pub use select::{FromBuilder, SelectBuilder};
pub use update::UpdateBuilder;
pub use where_clause::WhereBuilder;

use crate::error::OrmResult;
use crate::naming::quote_ident;
use crate::schema::Schema;
use crate::value::Value;

/// Clause kinds in assembly order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ClauseKind {
    Insert,
    Values,
    Conflict,
    Delete,
    Update,
    Select,
    From,
    Where,
    Order,
    Limit,
    Offset,
    Lock,
    Returning,
}

impl ClauseKind {
    pub const ORDER: [ClauseKind; 13] = [
        Self::Insert,
        Self::Values,
        Self::Conflict,
        Self::Delete,
        Self::Update,
        Self::Select,
        Self::From,
        Self::Where,
        Self::Order,
        Self::Limit,
        Self::Offset,
        Self::Lock,
        Self::Returning,
    ];

    pub fn is_mutation(self) -> bool {
        matches!(
            self,
            Self::Insert | Self::Values | Self::Conflict | Self::Delete | Self::Update
        )
    }
}

/// One rendered clause. Produced fresh on every build.
#[derive(Debug, Clone, PartialEq)]
pub struct Clause {
    pub kind: ClauseKind,
    pub sql: String,
    pub params: Vec<Value>,
}

impl Clause {
    pub fn new(kind: ClauseKind, sql: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            kind,
            sql: sql.into(),
            params,
        }
    }
}

/// Statement-wide inputs shared by all builders.
#[derive(Debug, Clone, Copy)]
pub struct BuildContext<'a> {
    pub schema: &'a Schema,
    pub unscoped: bool,
}

impl BuildContext<'_> {
    pub fn table(&self) -> String {
        quote_ident(self.schema.table())
    }

    /// `"table"."column"`
    pub fn qualified(&self, column: &str) -> String {
        format!("{}.{}", self.table(), quote_ident(column))
    }

    /// The soft-delete column that filters and delete rewriting apply to.
    pub fn active_soft_delete(&self) -> Option<&crate::schema::Field> {
        if self.unscoped {
            None
        } else {
            self.schema.soft_delete_field()
        }
    }
}

pub trait ClauseBuilder {
    const KIND: ClauseKind;

    /// Render the clause, or `None` when it contributes nothing.
    fn build(&self, ctx: &BuildContext<'_>) -> OrmResult<Option<Clause>>;
}
