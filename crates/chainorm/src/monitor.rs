//! SQL dispatch logging via `tracing`.

use tracing::Level;

use crate::error::OrmError;
use crate::executor::ExecRequest;

/// Longest SQL text logged before truncation, in bytes.
const MAX_SQL_LENGTH: usize = 500;

fn truncate_sql(sql: &str) -> std::borrow::Cow<'_, str> {
    if sql.len() <= MAX_SQL_LENGTH {
        return sql.into();
    }
    let mut end = MAX_SQL_LENGTH;
    while !sql.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &sql[..end]).into()
}

/// Emit the statement about to be dispatched.
pub(crate) fn log_dispatch(request: &ExecRequest, table: &str, debug: bool) {
    let level = if debug { Level::INFO } else { Level::DEBUG };
    let sql = truncate_sql(&request.sql);

    macro_rules! emit_at_level {
        ($level:expr, $($field:tt)*) => {
            match $level {
                Level::INFO => tracing::info!($($field)*),
                _ => tracing::debug!($($field)*),
            }
        };
    }

    emit_at_level!(
        level,
        target: "chainorm.sql",
        mode = ?request.mode,
        table,
        param_count = request.params.len(),
        sql = %sql,
        "dispatch"
    );
}

pub(crate) fn log_failure(request_sql: &str, err: &OrmError) {
    tracing::warn!(
        target: "chainorm.sql",
        sql = %truncate_sql(request_sql),
        error = %err,
        "statement failed"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_sql_is_truncated_on_char_boundary() {
        let sql = "é".repeat(MAX_SQL_LENGTH);
        let out = truncate_sql(&sql);
        assert!(out.ends_with("..."));
        assert!(out.len() <= MAX_SQL_LENGTH + 3);
    }

    #[test]
    fn short_sql_is_untouched() {
        assert_eq!(truncate_sql("SELECT 1"), "SELECT 1");
    }
}
