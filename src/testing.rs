//! In-memory executor for exercising catalogs and dumps without a database.
//!
//! [`ScriptedExecutor`] answers queries from canned rows keyed by SQL
//! fragments and records every statement it is handed.

use crate::executor::{CatalogRow, DumpExecutor, ExecutorError};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Clone)]
enum Response {
    Rows(Vec<CatalogRow>),
    Fail(String),
}

#[derive(Debug, Clone)]
struct Rule {
    fragments: Vec<String>,
    response: Response,
}

impl Rule {
    fn matches(&self, normalized_sql: &str) -> bool {
        self.fragments.iter().all(|f| normalized_sql.contains(f.as_str()))
    }
}

/// Lower-case and collapse whitespace so fragments match regardless of layout.
fn normalize(sql: &str) -> String {
    sql.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// A [`DumpExecutor`] driven by rules instead of a connection.
///
/// Rules are tried in registration order; the first rule whose fragments all
/// occur in the (lower-cased, whitespace-collapsed) SQL decides the answer.
/// Queries matching no rule return no rows.
///
/// ```
/// use schemadump::testing::ScriptedExecutor;
/// use schemadump::{CatalogRow, DumpExecutor};
///
/// let conn = ScriptedExecutor::new()
///     .on("from user_sequences", vec![CatalogRow::from_pairs([("SEQUENCE_NAME", Some("TEST_POSTS_SEQ"))])]);
///
/// let rows = conn.select_all("select sequence_name from user_sequences").unwrap();
/// assert_eq!(rows[0].get("sequence_name"), Some("TEST_POSTS_SEQ"));
/// assert!(conn.select_all("select 1 from dual").unwrap().is_empty());
/// ```
#[derive(Debug, Clone, Default)]
pub struct ScriptedExecutor {
    rules: Vec<Rule>,
    queries: Arc<Mutex<Vec<String>>>,
    executed: Arc<Mutex<Vec<String>>>,
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer queries containing `fragment` with `rows`.
    pub fn on(self, fragment: &str, rows: Vec<CatalogRow>) -> Self {
        self.on_all(&[fragment], rows)
    }

    /// Answer queries containing every one of `fragments` with `rows`.
    pub fn on_all(mut self, fragments: &[&str], rows: Vec<CatalogRow>) -> Self {
        self.rules.push(Rule {
            fragments: fragments.iter().map(|f| normalize(f)).collect(),
            response: Response::Rows(rows),
        });
        self
    }

    /// Fail queries and statements containing `fragment` with `message`.
    pub fn fail_on(mut self, fragment: &str, message: &str) -> Self {
        self.rules.push(Rule {
            fragments: vec![normalize(fragment)],
            response: Response::Fail(message.to_string()),
        });
        self
    }

    /// Queries seen by `select_all` / `select_one`, in order.
    pub fn queries(&self) -> Vec<String> {
        lock(&self.queries).clone()
    }

    /// Statements seen by `execute` / `execute_batch`, in order.
    pub fn executed(&self) -> Vec<String> {
        lock(&self.executed).clone()
    }

    pub fn clear(&self) {
        lock(&self.queries).clear();
        lock(&self.executed).clear();
    }

    fn respond(&self, sql: &str) -> Option<&Response> {
        let normalized = normalize(sql);
        self.rules
            .iter()
            .find(|rule| rule.matches(&normalized))
            .map(|rule| &rule.response)
    }

    fn check_statement(&self, sql: &str) -> Result<(), ExecutorError> {
        lock(&self.executed).push(sql.to_string());
        match self.respond(sql) {
            Some(Response::Fail(message)) => Err(ExecutorError::QueryError(message.clone())),
            _ => Ok(()),
        }
    }
}

fn lock(statements: &Mutex<Vec<String>>) -> MutexGuard<'_, Vec<String>> {
    statements.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl DumpExecutor for ScriptedExecutor {
    fn execute(&self, sql: &str) -> Result<u64, ExecutorError> {
        self.check_statement(sql).map(|_| 0)
    }

    fn select_all(&self, sql: &str) -> Result<Vec<CatalogRow>, ExecutorError> {
        lock(&self.queries).push(sql.to_string());
        match self.respond(sql) {
            Some(Response::Rows(rows)) => Ok(rows.clone()),
            Some(Response::Fail(message)) => Err(ExecutorError::QueryError(message.clone())),
            None => Ok(Vec::new()),
        }
    }

    fn execute_batch(&self, sql: &str) -> Result<(), ExecutorError> {
        self.check_statement(sql)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_matching_rule_wins() {
        let conn = ScriptedExecutor::new()
            .on_all(
                &["from user_constraints", "'BARS'"],
                vec![CatalogRow::from_pairs([("CONSTRAINT_NAME", Some("PK_BARS"))])],
            )
            .on(
                "from user_constraints",
                vec![CatalogRow::from_pairs([("CONSTRAINT_NAME", Some("PK_OTHER"))])],
            );

        let bars = conn
            .select_one("select constraint_name\n  FROM user_constraints where table_name = 'BARS'")
            .unwrap()
            .unwrap();
        assert_eq!(bars.get("constraint_name"), Some("PK_BARS"));

        let other = conn
            .select_one("select constraint_name from user_constraints where table_name = 'FOOS'")
            .unwrap()
            .unwrap();
        assert_eq!(other.get("constraint_name"), Some("PK_OTHER"));
        assert_eq!(conn.queries().len(), 2);
    }

    #[test]
    fn test_execute_records_and_fails() {
        let conn = ScriptedExecutor::new().fail_on("drop table foos", "ORA-00942");

        assert_eq!(conn.execute("create table bars (id number)").unwrap(), 0);
        let err = conn.execute("DROP TABLE FOOS cascade constraints").unwrap_err();
        assert_eq!(err.to_string(), "Query error: ORA-00942");
        assert_eq!(conn.executed().len(), 2);

        conn.clear();
        assert!(conn.executed().is_empty());
    }
}
