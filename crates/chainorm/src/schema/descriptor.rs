use std::collections::HashMap;

use chrono::Utc;
use tracing::debug;

use super::FieldDef;
use super::tag::{SoftDeleteKind, parse_directives};
use crate::error::{OrmError, OrmResult};
use crate::naming::to_snake_case;
use crate::value::{Value, ValueKind};

/// Resolved metadata for one model field.
#[derive(Debug, Clone)]
pub struct Field {
    pub index: usize,
    pub name: &'static str,
    pub column: String,
    pub kind: ValueKind,
    pub nullable: bool,
    pub primary_key: bool,
    pub auto_increment: bool,
    pub auto_update_time: bool,
    pub soft_delete: Option<SoftDeleteKind>,
    pub default: Option<Value>,
}

impl Field {
    fn is_timestamp_column(&self) -> bool {
        matches!(self.column.as_str(), "created_at" | "updated_at")
    }

    /// The value written for this field on INSERT.
    ///
    /// A non-zero current value wins. A zero `created_at`/`updated_at` column
    /// becomes "now"; any other zero field takes its declared default.
    pub fn insert_value(&self, current: Value, is_zero: bool) -> Value {
        if !is_zero {
            return current;
        }
        if self.is_timestamp_column() {
            if let Some(now) = Value::now(self.kind) {
                return now;
            }
        }
        match &self.default {
            Some(default) => default.clone(),
            None => current,
        }
    }

    /// The marker value written by a soft delete, or `None` for other fields.
    pub fn soft_delete_value(&self) -> Option<Value> {
        let now = Utc::now();
        let value = match self.soft_delete? {
            SoftDeleteKind::Time => {
                return Value::now(self.kind).or(Some(Value::Timestamp(now)));
            }
            SoftDeleteKind::Millis => Value::I64(now.timestamp_millis()),
            SoftDeleteKind::Nanos => Value::I64(now.timestamp_nanos_opt().unwrap_or(i64::MAX)),
            SoftDeleteKind::Flag if self.kind == ValueKind::Bool => Value::Bool(true),
            SoftDeleteKind::Flag => Value::I64(1),
        };
        if self.kind.is_integer() {
            Some(value.clone().coerce(self.kind).unwrap_or(value))
        } else {
            Some(value)
        }
    }
}

/// Immutable, per-type schema descriptor.
#[derive(Debug, Clone)]
pub struct Schema {
    name: &'static str,
    table: String,
    fields: Vec<Field>,
    primary: usize,
    soft_delete: Option<usize>,
    auto_update: Vec<usize>,
    lookup: HashMap<String, usize>,
}

impl Schema {
    /// Build a descriptor from a type name, optional table override and field list.
    pub fn parse(
        name: &'static str,
        table: Option<&'static str>,
        defs: &[FieldDef],
    ) -> OrmResult<Self> {
        let mut fields = Vec::with_capacity(defs.len());
        let mut lookup = HashMap::with_capacity(defs.len() * 2);
        let mut explicit_primary: Option<usize> = None;
        let mut soft_delete: Option<usize> = None;
        let mut auto_update = Vec::new();

        for (index, def) in defs.iter().enumerate() {
            let d = parse_directives(def.name, def.tag)?;
            let column = d.column.unwrap_or_else(|| to_snake_case(def.name));

            if fields.iter().any(|f: &Field| f.column == column) {
                return Err(OrmError::schema(format!(
                    "{name}: column `{column}` is declared more than once"
                )));
            }

            if d.primary_key {
                if let Some(prev) = explicit_primary {
                    return Err(OrmError::schema(format!(
                        "{name}: multiple primary keys (`{}` and `{}`)",
                        defs[prev].name, def.name
                    )));
                }
                explicit_primary = Some(index);
            }

            if d.soft_delete.is_some() {
                if let Some(prev) = soft_delete {
                    return Err(OrmError::schema(format!(
                        "{name}: multiple soft delete fields (`{}` and `{}`)",
                        defs[prev].name, def.name
                    )));
                }
                soft_delete = Some(index);
            }

            let default = match d.default.as_deref() {
                Some(literal) => Some(
                    Value::parse_literal(def.kind, literal)
                        .map_err(|e| OrmError::schema(format!("{name}.{}: {e}", def.name)))?,
                ),
                None => None,
            };

            let auto_update_time =
                d.auto_update_time || def.name == "updated_at" || column == "updated_at";
            if auto_update_time {
                auto_update.push(index);
            }

            lookup.insert(def.name.to_string(), index);
            lookup.entry(column.clone()).or_insert(index);

            fields.push(Field {
                index,
                name: def.name,
                column,
                kind: def.kind,
                nullable: def.nullable,
                primary_key: d.primary_key,
                auto_increment: d.auto_increment,
                auto_update_time,
                soft_delete: d.soft_delete,
                default,
            });
        }

        let primary = match explicit_primary {
            Some(index) => index,
            None => fields
                .iter()
                .position(|f| f.column == "id")
                .ok_or_else(|| OrmError::schema(format!("{name}: no primary key")))?,
        };
        fields[primary].primary_key = true;

        let table = table.map_or_else(|| to_snake_case(name), str::to_string);
        debug!(
            target: "chainorm.schema",
            model = name,
            table = %table,
            fields = fields.len(),
            "resolved schema"
        );

        Ok(Self {
            name,
            table,
            fields,
            primary,
            soft_delete,
            auto_update,
            lookup,
        })
    }

    /// The Rust type name the schema was resolved from.
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Fields in declaration order.
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn primary_field(&self) -> &Field {
        &self.fields[self.primary]
    }

    pub fn soft_delete_field(&self) -> Option<&Field> {
        self.soft_delete.map(|i| &self.fields[i])
    }

    pub fn auto_update_fields(&self) -> impl Iterator<Item = &Field> {
        self.auto_update.iter().map(|&i| &self.fields[i])
    }

    /// Look up a field by field name or column name.
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.lookup.get(name).map(|&i| &self.fields[i])
    }

    /// Like [`Schema::field`], failing with a field resolution error.
    pub fn resolve_field(&self, name: &str) -> OrmResult<&Field> {
        self.field(name).ok_or_else(|| {
            OrmError::field_resolution(format!("`{name}` is not a field of {}", self.name))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const fn def(name: &'static str, tag: &'static str, kind: ValueKind) -> FieldDef {
        FieldDef::new(name, tag, kind, false)
    }

    #[test]
    fn resolves_table_columns_and_primary() {
        let schema = Schema::parse(
            "UserProfile",
            None,
            &[
                def("id", "", ValueKind::I64),
                def("displayName", "", ValueKind::Text),
                def("email", "column:email_address", ValueKind::Text),
            ],
        )
        .unwrap();

        assert_eq!(schema.table(), "user_profile");
        assert_eq!(schema.primary_field().name, "id");
        let columns: Vec<_> = schema.fields().iter().map(|f| f.column.as_str()).collect();
        assert_eq!(columns, ["id", "display_name", "email_address"]);
        assert_eq!(schema.field("email_address").map(|f| f.name), Some("email"));
        assert_eq!(schema.field("displayName").map(|f| f.index), Some(1));
    }

    #[test]
    fn explicit_primary_key_wins_over_id() {
        let schema = Schema::parse(
            "Account",
            Some("accounts"),
            &[
                def("id", "", ValueKind::I64),
                def("code", "primaryKey", ValueKind::Text),
            ],
        )
        .unwrap();
        assert_eq!(schema.table(), "accounts");
        assert_eq!(schema.primary_field().name, "code");
        assert!(!schema.field("id").unwrap().primary_key);
    }

    #[test]
    fn column_override_to_id_becomes_primary() {
        let schema =
            Schema::parse("Tag", None, &[def("tagKey", "column:id", ValueKind::Text)]).unwrap();
        assert_eq!(schema.primary_field().name, "tagKey");
    }

    #[test]
    fn two_primary_keys_is_an_error() {
        let err = Schema::parse(
            "Pair",
            None,
            &[
                def("a", "primaryKey", ValueKind::I64),
                def("b", "primaryKey", ValueKind::I64),
            ],
        )
        .unwrap_err();
        assert!(err.is_schema());
    }

    #[test]
    fn missing_primary_key_is_an_error() {
        let err = Schema::parse("Note", None, &[def("body", "", ValueKind::Text)]).unwrap_err();
        assert!(err.is_schema());
        assert!(err.to_string().contains("no primary key"));
    }

    #[test]
    fn two_soft_delete_fields_is_an_error() {
        let err = Schema::parse(
            "Doc",
            None,
            &[
                def("id", "", ValueKind::I64),
                def("deleted_at", "softDelete", ValueKind::Timestamp),
                def("removed", "softDelete:flag", ValueKind::I32),
            ],
        )
        .unwrap_err();
        assert!(err.is_schema());
    }

    #[test]
    fn duplicate_columns_is_an_error() {
        let err = Schema::parse(
            "Doc",
            None,
            &[
                def("id", "", ValueKind::I64),
                def("title", "", ValueKind::Text),
                def("heading", "column:title", ValueKind::Text),
            ],
        )
        .unwrap_err();
        assert!(err.is_schema());
    }

    #[test]
    fn bad_default_literal_is_an_error() {
        let err = Schema::parse(
            "Doc",
            None,
            &[def("id", "", ValueKind::I64), def("age", "default:old", ValueKind::I32)],
        )
        .unwrap_err();
        assert!(err.is_schema());
    }

    #[test]
    fn insert_value_applies_defaults_and_timestamps() {
        let schema = Schema::parse(
            "Doc",
            None,
            &[
                def("id", "", ValueKind::I64),
                def("age", "default:18", ValueKind::I32),
                def("created_at", "default:2020-01-01T00:00:00Z", ValueKind::Timestamp),
            ],
        )
        .unwrap();

        let age = schema.field("age").unwrap();
        assert_eq!(age.insert_value(Value::I32(0), true), Value::I32(18));
        assert_eq!(age.insert_value(Value::I32(3), false), Value::I32(3));

        let created = schema.field("created_at").unwrap();
        let Value::Timestamp(ts) = created.insert_value(Value::Null, true) else {
            panic!("expected a timestamp");
        };
        assert!(ts.timestamp() > 1_600_000_000);
    }

    #[test]
    fn soft_delete_values_follow_variant() {
        let schema = Schema::parse(
            "Doc",
            None,
            &[
                def("id", "", ValueKind::I64),
                def("removed", "softDelete:flag", ValueKind::I32),
            ],
        )
        .unwrap();
        let field = schema.soft_delete_field().unwrap();
        assert_eq!(field.soft_delete_value(), Some(Value::I32(1)));
        assert_eq!(schema.primary_field().soft_delete_value(), None);
    }

    #[test]
    fn updated_at_is_auto_update_time() {
        let schema = Schema::parse(
            "Doc",
            None,
            &[
                def("id", "", ValueKind::I64),
                def("touched", "autoUpdateTime", ValueKind::Timestamp),
                def("updated_at", "", ValueKind::Timestamp),
            ],
        )
        .unwrap();
        let names: Vec<_> = schema.auto_update_fields().map(|f| f.name).collect();
        assert_eq!(names, ["touched", "updated_at"]);
    }
}
