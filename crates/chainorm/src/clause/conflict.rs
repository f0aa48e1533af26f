use super::{BuildContext, Clause, ClauseBuilder, ClauseKind};
use crate::error::OrmResult;
use crate::naming::quote_ident;
use crate::value::Value;

/// Upsert policy for INSERT.
#[derive(Debug, Clone, PartialEq)]
pub enum OnConflict {
    /// `DO NOTHING`
    DoNothing,
    /// `DO UPDATE SET "col" = ?` with the given values.
    UpdateValues(Vec<(String, Value)>),
    /// `DO UPDATE SET "col" = EXCLUDED."col"` for the named fields.
    UpdateIncoming(Vec<String>),
}

impl OnConflict {
    pub fn update_values<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
    {
        Self::UpdateValues(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    pub fn update_incoming<S: Into<String>>(fields: impl IntoIterator<Item = S>) -> Self {
        Self::UpdateIncoming(fields.into_iter().map(Into::into).collect())
    }
}

/// `ON CONFLICT ("target") DO ...`
///
/// The target defaults to the primary key column.
#[derive(Debug, Clone, PartialEq)]
pub struct ConflictBuilder {
    pub policy: OnConflict,
    pub target: Vec<String>,
}

impl ConflictBuilder {
    pub fn new(policy: OnConflict) -> Self {
        Self {
            policy,
            target: Vec::new(),
        }
    }
}

impl ClauseBuilder for ConflictBuilder {
    const KIND: ClauseKind = ClauseKind::Conflict;

    fn build(&self, ctx: &BuildContext<'_>) -> OrmResult<Option<Clause>> {
        let target = if self.target.is_empty() {
            quote_ident(&ctx.schema.primary_field().column)
        } else {
            let mut cols = Vec::with_capacity(self.target.len());
            for name in &self.target {
                cols.push(quote_ident(&ctx.schema.resolve_field(name)?.column));
            }
            cols.join(", ")
        };

        let mut params = Vec::new();
        let action = match &self.policy {
            OnConflict::DoNothing => "DO NOTHING".to_string(),
            OnConflict::UpdateValues(pairs) if pairs.is_empty() => "DO NOTHING".to_string(),
            OnConflict::UpdateIncoming(fields) if fields.is_empty() => "DO NOTHING".to_string(),
            OnConflict::UpdateValues(pairs) => {
                let mut sets = Vec::with_capacity(pairs.len());
                for (name, value) in pairs {
                    let column = quote_ident(&ctx.schema.resolve_field(name)?.column);
                    sets.push(format!("{column} = ?"));
                    params.push(value.clone());
                }
                format!("DO UPDATE SET {}", sets.join(", "))
            }
            OnConflict::UpdateIncoming(fields) => {
                let mut sets = Vec::with_capacity(fields.len());
                for name in fields {
                    let column = quote_ident(&ctx.schema.resolve_field(name)?.column);
                    sets.push(format!("{column} = EXCLUDED.{column}"));
                }
                format!("DO UPDATE SET {}", sets.join(", "))
            }
        };

        Ok(Some(Clause::new(
            Self::KIND,
            format!("ON CONFLICT ({target}) {action}"),
            params,
        )))
    }
}
