//! Model metadata: the [`Model`] trait and the resolved [`Schema`] descriptor.
//!
//! A model type describes its fields once, as a static [`FieldDef`] list
//! (normally generated by `#[derive(Model)]`). The list is parsed into an
//! immutable [`Schema`] on first use and cached per type by the
//! [`SchemaRegistry`].

mod descriptor;
mod registry;
mod tag;

use std::sync::Arc;

pub use descriptor::{Field, Schema};
pub use registry::SchemaRegistry;
pub use tag::SoftDeleteKind;

use crate::error::{OrmError, OrmResult};
use crate::executor::Row;
use crate::hooks::Hooks;
use crate::value::{SqlField, Value, ValueKind};

/// Static description of one declared field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDef {
    pub name: &'static str,
    /// Raw directive string, e.g. `"primaryKey;autoIncrement"`.
    pub tag: &'static str,
    pub kind: ValueKind,
    pub nullable: bool,
}

impl FieldDef {
    pub const fn new(
        name: &'static str,
        tag: &'static str,
        kind: ValueKind,
        nullable: bool,
    ) -> Self {
        Self {
            name,
            tag,
            kind,
            nullable,
        }
    }
}

/// A field's current value together with its zero-ness.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldValue {
    pub value: Value,
    pub is_zero: bool,
}

impl FieldValue {
    pub fn of<T: SqlField>(field: &T) -> Self {
        Self {
            value: field.to_value(),
            is_zero: field.is_zero(),
        }
    }
}

/// Decoded column values for one row, indexed by field position.
///
/// Fields whose column was not part of the result decode to `Default::default()`.
#[derive(Debug)]
pub struct FieldValues {
    names: &'static [FieldDef],
    slots: Vec<Option<Value>>,
}

impl FieldValues {
    pub(crate) fn from_row(schema: &Schema, names: &'static [FieldDef], row: &Row) -> Self {
        let slots = schema
            .fields()
            .iter()
            .map(|f| row.get(&f.column).cloned())
            .collect();
        Self { names, slots }
    }

    /// Take and convert the value for field `index`.
    pub fn take<T: SqlField>(&mut self, index: usize) -> OrmResult<T> {
        match self.slots.get_mut(index).and_then(Option::take) {
            None => Ok(T::default()),
            Some(value) => T::from_value(value).map_err(|message| {
                let column = self.names.get(index).map_or("?", |d| d.name);
                OrmError::decode(column, message)
            }),
        }
    }
}

/// A record type that maps to one table.
///
/// Implemented by `#[derive(Model)]`; hand-written impls index fields by their
/// position in [`Model::FIELDS`].
pub trait Model: Sized + Send + Sync + 'static {
    /// Rust type name, snake-cased into the default table name.
    const NAME: &'static str;
    /// Explicit table name.
    const TABLE: Option<&'static str> = None;
    /// Declared fields in declaration order.
    const FIELDS: &'static [FieldDef];

    fn field(&self, index: usize) -> Option<FieldValue>;

    fn set_field(&mut self, index: usize, value: Value) -> OrmResult<()>;

    fn from_fields(fields: FieldValues) -> OrmResult<Self>;

    /// Optional lifecycle capabilities. Read once per query chain.
    fn hooks() -> Hooks<Self> {
        Hooks::new()
    }

    /// The cached schema for this type.
    fn schema() -> OrmResult<Arc<Schema>> {
        SchemaRegistry::global().resolve::<Self>()
    }
}

/// Read field `index` or fail with a field resolution error.
pub(crate) fn field_value<M: Model>(record: &M, field: &Field) -> OrmResult<FieldValue> {
    record.field(field.index).ok_or_else(|| {
        OrmError::field_resolution(format!("{} has no field `{}`", M::NAME, field.name))
    })
}

#[cfg(test)]
pub(crate) mod testing;
