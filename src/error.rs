//! Metadata query error types

use crate::executor::ExecutorError;

/// Failure while reading or loading database structure.
///
/// An empty catalog answer is never an error; these variants all abort the
/// dump that raised them.
#[derive(Debug)]
pub enum MetadataQueryError {
    /// A catalog query failed (connection lost, dictionary view missing, ...)
    Query {
        /// Short label of the catalog query, e.g. `"foreign keys"`
        query: String,
        source: ExecutorError,
    },
    /// A catalog row lacked a column the query selects
    MissingColumn { query: String, column: String },
    /// A catalog value could not be interpreted
    InvalidValue {
        query: String,
        column: String,
        value: String,
    },
    /// A statement failed while loading a structure dump
    Execution {
        statement: String,
        source: ExecutorError,
    },
}

impl MetadataQueryError {
    pub(crate) fn query(query: &str, source: ExecutorError) -> Self {
        MetadataQueryError::Query {
            query: query.to_string(),
            source,
        }
    }
}

impl std::fmt::Display for MetadataQueryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MetadataQueryError::Query { query, source } => {
                write!(f, "Catalog query for {} failed: {}", query, source)
            }
            MetadataQueryError::MissingColumn { query, column } => {
                write!(
                    f,
                    "Catalog query for {} returned no '{}' column",
                    query, column
                )
            }
            MetadataQueryError::InvalidValue {
                query,
                column,
                value,
            } => {
                write!(
                    f,
                    "Catalog query for {} returned invalid {} value '{}'",
                    query, column, value
                )
            }
            MetadataQueryError::Execution { statement, source } => {
                write!(
                    f,
                    "Failed to execute structure statement: {}\n\
                     Statement: {}",
                    source,
                    first_line(statement)
                )
            }
        }
    }
}

impl std::error::Error for MetadataQueryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MetadataQueryError::Query { source, .. }
            | MetadataQueryError::Execution { source, .. } => Some(source),
            _ => None,
        }
    }
}

fn first_line(statement: &str) -> &str {
    statement.trim_start().lines().next().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_error_names_the_query() {
        let err = MetadataQueryError::query(
            "primary key",
            ExecutorError::QueryError("ORA-00942: table or view does not exist".into()),
        );
        let display = err.to_string();
        assert!(display.contains("primary key"));
        assert!(display.contains("ORA-00942"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_execution_error_shows_first_line_only() {
        let err = MetadataQueryError::Execution {
            statement: "\ncreate table foos (\n id number\n)".into(),
            source: ExecutorError::Other("denied".into()),
        };
        let display = err.to_string();
        assert!(display.contains("Statement: create table foos ("));
        assert!(!display.contains("id number"));
    }

    #[test]
    fn test_invalid_value_display() {
        let err = MetadataQueryError::InvalidValue {
            query: "columns".into(),
            column: "data_precision".into(),
            value: "abc".into(),
        };
        assert_eq!(
            err.to_string(),
            "Catalog query for columns returned invalid data_precision value 'abc'"
        );
    }
}
