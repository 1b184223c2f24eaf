//! Target dialects and their identifier / statement conventions.

use std::fmt;

/// SQL dialect of the database being dumped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Dialect {
    #[default]
    Oracle,
    Postgres,
}

impl Dialect {
    /// Separator placed after each statement of a full dump.
    ///
    /// Oracle dumps use the SQL*Plus `/` terminator so PL/SQL blocks can sit next
    /// to plain DDL; PostgreSQL dumps terminate statements with `;`.
    pub fn statement_separator(self) -> &'static str {
        match self {
            Dialect::Oracle => "\n\n/\n\n",
            Dialect::Postgres => ";\n\n",
        }
    }

    /// Keyword closing a generated column definition
    pub fn virtual_keyword(self) -> &'static str {
        match self {
            Dialect::Oracle => "VIRTUAL",
            Dialect::Postgres => "STORED",
        }
    }

    pub fn temporary_keyword(self) -> &'static str {
        match self {
            Dialect::Oracle => "global temporary ",
            Dialect::Postgres => "temporary ",
        }
    }

    /// Suffix of `drop table` that also removes dependent constraints
    pub fn cascade_clause(self) -> &'static str {
        match self {
            Dialect::Oracle => "cascade constraints",
            Dialect::Postgres => "cascade",
        }
    }

    /// Key and constraint names as they appear inside a table definition.
    ///
    /// Oracle folds unquoted identifiers to upper case; PostgreSQL keeps what the
    /// catalog reports.
    pub fn key_ident(self, name: &str) -> String {
        match self {
            Dialect::Oracle => name.to_uppercase(),
            Dialect::Postgres => name.to_string(),
        }
    }

    /// Names as they appear in `ALTER TABLE ... FOREIGN KEY` and `create index`.
    pub fn display_ident(self, name: &str) -> String {
        match self {
            Dialect::Oracle => oracle_downcase(name),
            Dialect::Postgres => name.to_string(),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Dialect::Oracle => "oracle",
            Dialect::Postgres => "postgres",
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Downcase an identifier the catalog stored in upper case; mixed-case (quoted)
/// identifiers are left alone.
pub fn oracle_downcase(name: &str) -> String {
    if name.chars().any(|c| c.is_lowercase()) {
        name.to_string()
    } else {
        name.to_lowercase()
    }
}

/// Quote `value` as a SQL string literal.
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_oracle_downcase() {
        assert_eq!(oracle_downcase("FK_TEST_POST_FOO"), "fk_test_post_foo");
        assert_eq!(oracle_downcase("MixedCase"), "MixedCase");
        assert_eq!(oracle_downcase("SYS_C0012$"), "sys_c0012$");
    }

    #[test]
    fn test_quote_literal_doubles_quotes() {
        assert_eq!(quote_literal("TEST_POSTS"), "'TEST_POSTS'");
        assert_eq!(quote_literal("O'BRIEN"), "'O''BRIEN'");
    }

    #[test]
    fn test_identifier_case_rules() {
        assert_eq!(Dialect::Oracle.key_ident("pk_id_title"), "PK_ID_TITLE");
        assert_eq!(Dialect::Postgres.key_ident("pk_id_title"), "pk_id_title");
        assert_eq!(Dialect::Oracle.display_ident("FOOS"), "foos");
        assert_eq!(Dialect::Postgres.display_ident("Foos"), "Foos");
    }
}
