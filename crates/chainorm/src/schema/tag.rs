//! Field directive parsing.
//!
//! A directive string is a `;`-separated list of `key[:value]` entries, e.g.
//! `primaryKey;autoIncrement` or `column:user_name;default:guest`. Order does not
//! matter and unknown keys are ignored.

use crate::error::{OrmError, OrmResult};

/// Soft-delete marker shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoftDeleteKind {
    /// Current timestamp
    Time,
    /// Epoch milliseconds
    Millis,
    /// Epoch nanoseconds
    Nanos,
    /// Integer `1`
    Flag,
}

impl SoftDeleteKind {
    fn parse(variant: Option<&str>) -> Option<Self> {
        match variant.unwrap_or("") {
            "" | "time" => Some(Self::Time),
            "millis" | "milli" | "mill" => Some(Self::Millis),
            "nanos" | "nano" => Some(Self::Nanos),
            "flag" => Some(Self::Flag),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct Directives {
    pub primary_key: bool,
    pub auto_increment: bool,
    pub auto_update_time: bool,
    pub soft_delete: Option<SoftDeleteKind>,
    pub column: Option<String>,
    pub default: Option<String>,
}

pub(crate) fn parse_directives(field: &str, tag: &str) -> OrmResult<Directives> {
    let mut out = Directives::default();

    for entry in tag.split(';').map(str::trim).filter(|e| !e.is_empty()) {
        let (key, value) = match entry.split_once(':') {
            Some((k, v)) => (k.trim(), Some(v.trim())),
            None => (entry, None),
        };

        let required = |value: Option<&str>| -> OrmResult<String> {
            match value {
                Some(v) if !v.is_empty() => Ok(v.to_string()),
                _ => Err(OrmError::schema(format!(
                    "field `{field}`: directive `{key}` requires a value"
                ))),
            }
        };

        match key {
            "primaryKey" => out.primary_key = true,
            "autoIncrement" => out.auto_increment = true,
            "autoUpdateTime" => out.auto_update_time = true,
            "softDelete" => {
                let kind = SoftDeleteKind::parse(value).ok_or_else(|| {
                    OrmError::schema(format!(
                        "field `{field}`: unknown soft delete variant `{}`",
                        value.unwrap_or_default()
                    ))
                })?;
                out.soft_delete = Some(kind);
            }
            "column" => out.column = Some(required(value)?),
            "default" => out.default = Some(required(value)?),
            _ => {}
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_flags_in_any_order() {
        let d = parse_directives("id", "autoIncrement; primaryKey").unwrap();
        assert!(d.primary_key);
        assert!(d.auto_increment);
        assert!(!d.auto_update_time);
    }

    #[test]
    fn parses_values() {
        let d = parse_directives("name", "column:user_name;default:guest").unwrap();
        assert_eq!(d.column.as_deref(), Some("user_name"));
        assert_eq!(d.default.as_deref(), Some("guest"));
    }

    #[test]
    fn default_value_keeps_inner_colons() {
        let d = parse_directives("at", "default:2024-01-01T00:00:00Z").unwrap();
        assert_eq!(d.default.as_deref(), Some("2024-01-01T00:00:00Z"));
    }

    #[test]
    fn unknown_directives_are_ignored() {
        let d = parse_directives("name", "index;size:255;;").unwrap();
        assert_eq!(d, Directives::default());
    }

    #[test]
    fn soft_delete_variants() {
        let kind = |tag| parse_directives("deleted_at", tag).unwrap().soft_delete;
        assert_eq!(kind("softDelete"), Some(SoftDeleteKind::Time));
        assert_eq!(kind("softDelete:mill"), Some(SoftDeleteKind::Millis));
        assert_eq!(kind("softDelete:nanos"), Some(SoftDeleteKind::Nanos));
        assert_eq!(kind("softDelete:flag"), Some(SoftDeleteKind::Flag));
        assert!(parse_directives("deleted_at", "softDelete:weekly").unwrap_err().is_schema());
    }

    #[test]
    fn column_requires_value() {
        let err = parse_directives("name", "column").unwrap_err();
        assert!(err.is_schema());
    }
}
