//! Hand-written models shared by unit tests.

use chrono::{DateTime, Utc};
use futures_core::future::BoxFuture;

use super::{FieldDef, FieldValue, FieldValues, Model};
use crate::error::{OrmError, OrmResult};
use crate::hooks::{HookContext, Hooks};
use crate::value::{SqlField, Value};

macro_rules! test_model {
    ($ty:ident $(table $table:literal)? $(hooks($hooks:expr))? { $($field:ident : $fty:ty => $tag:literal),* $(,)? }) => {
        #[derive(Debug, Clone, Default, PartialEq)]
        pub struct $ty {
            $(pub $field: $fty),*
        }

        impl Model for $ty {
            const NAME: &'static str = stringify!($ty);
            $(const TABLE: Option<&'static str> = Some($table);)?
            const FIELDS: &'static [FieldDef] = &[
                $(FieldDef::new(
                    stringify!($field),
                    $tag,
                    <$fty as SqlField>::KIND,
                    <$fty as SqlField>::NULLABLE,
                )),*
            ];

            $(fn hooks() -> Hooks<Self> {
                $hooks
            })?

            fn field(&self, index: usize) -> Option<FieldValue> {
                [$(FieldValue::of(&self.$field)),*].into_iter().nth(index)
            }

            #[allow(unused_assignments)]
            fn set_field(&mut self, index: usize, value: Value) -> OrmResult<()> {
                let mut i = 0usize;
                $(
                    if i == index {
                        self.$field = <$fty as SqlField>::from_value(value)
                            .map_err(|m| OrmError::decode(stringify!($field), m))?;
                        return Ok(());
                    }
                    i += 1;
                )*
                Err(OrmError::field_resolution(format!("no field at index {index}")))
            }

            #[allow(unused_assignments)]
            fn from_fields(mut fields: FieldValues) -> OrmResult<Self> {
                let mut i = 0usize;
                Ok(Self {
                    $($field: {
                        let v = fields.take(i)?;
                        i += 1;
                        v
                    }),*
                })
            }
        }
    };
}

test_model!(User table "users" {
    id: i64 => "primaryKey;autoIncrement",
    name: String => "",
    age: i32 => "default:18",
    email: Option<String> => "",
    created_at: Option<DateTime<Utc>> => "",
    updated_at: Option<DateTime<Utc>> => "",
});

test_model!(Post {
    id: i64 => "",
    title: String => "",
    author_id: i64 => "",
    deleted_at: Option<DateTime<Utc>> => "softDelete",
});

test_model!(Article {
    id: i64 => "",
    title: String => "",
    updated_at: Option<DateTime<Utc>> => "",
    deleted_at: Option<DateTime<Utc>> => "softDelete",
});

test_model!(Pizza {
    id: i64 => "",
    pizza: String => "",
    size: String => "",
});

test_model!(Broken {
    body: String => "",
});

fn normalize_name<'a>(note: &'a mut Note, _ctx: HookContext<'a>) -> BoxFuture<'a, OrmResult<()>> {
    Box::pin(async move {
        if note.body.trim().is_empty() {
            return Err(OrmError::validation("note body is empty"));
        }
        note.body = note.body.trim().to_string();
        Ok(())
    })
}

fn write_audit<'a>(note: &'a mut Note, ctx: HookContext<'a>) -> BoxFuture<'a, OrmResult<()>> {
    Box::pin(async move {
        let entry = format!("{:?} {} {}", ctx.operation(), ctx.table(), note.id);
        ctx.exec("INSERT INTO audit (entry) VALUES ($1)", vec![entry.into()])
            .await?;
        Ok(())
    })
}

fn mark_loaded<'a>(note: &'a mut Note, _ctx: HookContext<'a>) -> BoxFuture<'a, OrmResult<()>> {
    Box::pin(async move {
        note.loaded = true;
        Ok(())
    })
}

test_model!(Note table "notes" hooks(
    Hooks::new()
        .before_mutate(normalize_name)
        .after_mutate(write_audit)
        .after_query(mark_loaded)
) {
    id: i64 => "primaryKey;autoIncrement",
    body: String => "",
    loaded: bool => "",
});

pub fn user(name: &str, age: i32) -> User {
    User {
        name: name.to_string(),
        age,
        ..User::default()
    }
}
