use super::{BuildContext, Clause, ClauseBuilder, ClauseKind};
use crate::error::OrmResult;

/// Row-level lock strength.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    Update,
    NoKeyUpdate,
    Share,
    KeyShare,
}

impl LockMode {
    pub fn as_sql(self) -> &'static str {
        match self {
            Self::Update => "FOR UPDATE",
            Self::NoKeyUpdate => "FOR NO KEY UPDATE",
            Self::Share => "FOR SHARE",
            Self::KeyShare => "FOR KEY SHARE",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockBuilder {
    pub mode: LockMode,
}

impl ClauseBuilder for LockBuilder {
    const KIND: ClauseKind = ClauseKind::Lock;

    fn build(&self, _ctx: &BuildContext<'_>) -> OrmResult<Option<Clause>> {
        Ok(Some(Clause::new(Self::KIND, self.mode.as_sql(), Vec::new())))
    }
}
