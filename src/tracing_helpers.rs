//! Span constructors for the optional `tracing` feature.
//!
//! Callers enter the returned span for the duration of the operation:
//! `let _span = tracing_helpers::dump_span("structure_dump", dialect).entered();`

use crate::dialect::Dialect;
use tracing::Span;

/// Longest SQL prefix recorded on query spans.
const SQL_PREVIEW_LEN: usize = 120;

fn sql_preview(sql: &str) -> &str {
    let trimmed = sql.trim_start();
    match trimmed.char_indices().nth(SQL_PREVIEW_LEN) {
        Some((idx, _)) => &trimmed[..idx],
        None => trimmed,
    }
}

pub fn connect_span() -> Span {
    tracing::info_span!("schemadump.connect")
}

pub fn execute_query_span(sql: &str) -> Span {
    tracing::debug_span!("schemadump.execute", sql = sql_preview(sql))
}

pub fn catalog_query_span(query: &str) -> Span {
    tracing::debug_span!("schemadump.catalog_query", query)
}

pub fn dump_span(operation: &str, dialect: Dialect) -> Span {
    tracing::info_span!("schemadump.dump", operation, dialect = dialect.name())
}

pub fn load_span(dialect: Dialect) -> Span {
    tracing::info_span!("schemadump.load", dialect = dialect.name())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sql_preview_is_bounded() {
        let long = format!("   select {}", "x, ".repeat(100));
        let preview = sql_preview(&long);
        assert!(preview.starts_with("select"));
        assert_eq!(preview.chars().count(), SQL_PREVIEW_LEN);
        assert_eq!(sql_preview("select 1"), "select 1");
    }
}
