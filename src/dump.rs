//! Structure Dump Orchestrator
//!
//! [`StructureDumper`] asks a [`Catalog`] for metadata, renders it and
//! concatenates the result in a fixed order:
//!
//! 1. sequences
//! 2. tables, each with its primary key and unique keys inline
//! 3. the foreign key block
//! 4. standalone (non constraint-backed) indexes
//! 5. stored code
//! 6. synonyms
//!
//! Every operation takes the connection explicitly and either returns the
//! complete text or fails; a partially built dump is never returned.

use crate::catalog::Catalog;
use crate::config::DumpOptions;
use crate::dialect::Dialect;
use crate::error::MetadataQueryError;
use crate::executor::DumpExecutor;
use crate::metadata::StoredCodeKind;
use crate::render;
use once_cell::sync::Lazy;
use regex::Regex;

#[cfg(feature = "tracing")]
use crate::tracing_helpers;

/// A line holding only the SQL*Plus `/` terminator.
static SLASH_TERMINATOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^[ \t]*/[ \t]*$").expect("valid terminator pattern"));

/// `;` closing a line of plain SQL.
static LINE_TERMINATOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r";[ \t]*(?:\r?\n|$)").expect("valid line terminator pattern"));

/// Statements that carry a PL/SQL body and must keep their inner `;`.
static PLSQL_UNIT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?is)^\s*create\s+(?:or\s+replace\s+)?(?:(?:editionable|noneditionable)\s+)?(?:procedure|function|package|trigger|type)\b",
    )
    .expect("valid PL/SQL unit pattern")
});

/// Accumulates rendered statements, terminating each with the dialect separator.
#[derive(Debug)]
pub struct DumpBuilder {
    dialect: Dialect,
    out: String,
    statements: usize,
}

impl DumpBuilder {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            out: String::new(),
            statements: 0,
        }
    }

    /// Append one chunk followed by the statement separator.
    ///
    /// PostgreSQL chunks that already end in `;` only get the blank line.
    pub fn push_statement(&mut self, chunk: &str) {
        let chunk = chunk.trim_end();
        if chunk.is_empty() {
            return;
        }
        self.out.push_str(chunk);
        match self.dialect {
            Dialect::Postgres if chunk.ends_with(';') => self.out.push_str("\n\n"),
            dialect => self.out.push_str(dialect.statement_separator()),
        }
        self.statements += 1;
    }

    pub fn statement_count(&self) -> usize {
        self.statements
    }

    pub fn is_empty(&self) -> bool {
        self.statements == 0
    }

    pub fn finish(self) -> String {
        self.out
    }
}

/// Regenerates DDL for everything a [`Catalog`] can see.
///
/// ```
/// use schemadump::testing::ScriptedExecutor;
/// use schemadump::{ColumnMetadata, ConstraintMetadata, Dialect, MemoryCatalog, StructureDumper, TableMetadata};
///
/// let catalog = MemoryCatalog::new(Dialect::Oracle)
///     .table(TableMetadata::new("FOOS").column(ColumnMetadata::new("ID", "NUMBER").precision(38, Some(0)).not_null()))
///     .constraint(ConstraintMetadata::primary_key("FOOS", "SYS_C0013", &["ID"]));
///
/// let dump = StructureDumper::new(catalog).structure_dump(&ScriptedExecutor::new()).unwrap();
/// assert_eq!(
///     dump,
///     "create table FOOS (\n id number(38,0) not null,\n CONSTRAINT SYS_C0013 PRIMARY KEY (ID)\n)\n\n/\n\n"
/// );
/// ```
#[derive(Debug, Clone)]
pub struct StructureDumper<C: Catalog> {
    catalog: C,
    options: DumpOptions,
}

impl<C: Catalog> StructureDumper<C> {
    pub fn new(catalog: C) -> Self {
        Self::with_options(catalog, DumpOptions::default())
    }

    pub fn with_options(catalog: C, options: DumpOptions) -> Self {
        Self { catalog, options }
    }

    pub fn catalog(&self) -> &C {
        &self.catalog
    }

    pub fn options(&self) -> &DumpOptions {
        &self.options
    }

    pub fn dialect(&self) -> Dialect {
        self.catalog.dialect()
    }

    /// Full structure dump in canonical order.
    ///
    /// # Errors
    ///
    /// Returns the first [`MetadataQueryError`] raised by a catalog query.
    pub fn structure_dump(&self, conn: &dyn DumpExecutor) -> Result<String, MetadataQueryError> {
        let dialect = self.dialect();
        #[cfg(feature = "tracing")]
        let _span = tracing_helpers::dump_span("structure_dump", dialect).entered();

        let mut dump = DumpBuilder::new(dialect);

        if self.options.include_sequences {
            for sequence in self.catalog.fetch_sequences(conn)? {
                dump.push_statement(&render::render_sequence(&sequence));
            }
        }

        let tables = self.catalog.tables(conn)?;
        for table in &tables {
            let primary_key = self.catalog.fetch_primary_key(conn, &table.name)?;
            let unique_keys = self.catalog.fetch_unique_keys(conn, &table.name)?;
            dump.push_statement(&render::render_table(
                table,
                primary_key.as_ref(),
                &unique_keys,
                dialect,
            ));
        }

        dump.push_statement(&self.structure_dump_foreign_keys(conn)?);

        for index in self.catalog.fetch_indexes(conn, None)? {
            if index.constraint_backed {
                log::debug!("Index {} backs a key constraint, not dumped", index.name);
                continue;
            }
            dump.push_statement(&render::render_index(&index, dialect, &self.options));
        }

        self.push_stored_code(conn, &mut dump, &self.options.stored_code_kinds)?;

        if self.options.include_synonyms {
            for synonym in self.catalog.fetch_synonyms(conn)? {
                dump.push_statement(&render::render_synonym(&synonym));
            }
        }

        log::info!(
            "Dumped {} tables as {} statements ({})",
            tables.len(),
            dump.statement_count(),
            dialect
        );
        Ok(dump.finish())
    }

    /// `ALTER TABLE ... FOREIGN KEY` statements for every table, one per line.
    ///
    /// Returns `""` when there are no foreign keys.
    pub fn structure_dump_foreign_keys(
        &self,
        conn: &dyn DumpExecutor,
    ) -> Result<String, MetadataQueryError> {
        let dialect = self.dialect();
        let statements: Vec<String> = self
            .catalog
            .fetch_foreign_keys(conn, None)?
            .iter()
            .map(|fk| render::render_foreign_key(fk, dialect))
            .collect();
        log::debug!("Rendered {} foreign keys", statements.len());
        Ok(statements.join("\n"))
    }

    /// Unique key fragments of `table`, e.g. `" CONSTRAINT UK_FOO UNIQUE (FOO)"`.
    pub fn structure_dump_unique_keys(
        &self,
        conn: &dyn DumpExecutor,
        table: &str,
    ) -> Result<Vec<String>, MetadataQueryError> {
        let dialect = self.dialect();
        Ok(self
            .catalog
            .fetch_unique_keys(conn, table)?
            .iter()
            .map(|uk| render::render_unique_key(uk, dialect))
            .collect())
    }

    /// `create index` statements of `table`, constraint-backed indexes excluded.
    pub fn structure_dump_indexes(
        &self,
        conn: &dyn DumpExecutor,
        table: &str,
    ) -> Result<Vec<String>, MetadataQueryError> {
        let dialect = self.dialect();
        Ok(self
            .catalog
            .fetch_indexes(conn, Some(table))?
            .iter()
            .filter(|index| !index.constraint_backed)
            .map(|index| render::render_index(index, dialect, &self.options))
            .collect())
    }

    /// Stored code of the configured kinds, each terminated by the separator.
    pub fn structure_dump_stored_code(
        &self,
        conn: &dyn DumpExecutor,
    ) -> Result<String, MetadataQueryError> {
        self.structure_dump_stored_code_of(conn, &self.options.stored_code_kinds)
    }

    pub fn structure_dump_stored_code_of(
        &self,
        conn: &dyn DumpExecutor,
        kinds: &[StoredCodeKind],
    ) -> Result<String, MetadataQueryError> {
        #[cfg(feature = "tracing")]
        let _span = tracing_helpers::dump_span("structure_dump_stored_code", self.dialect()).entered();

        let mut dump = DumpBuilder::new(self.dialect());
        self.push_stored_code(conn, &mut dump, kinds)?;
        Ok(dump.finish())
    }

    fn push_stored_code(
        &self,
        conn: &dyn DumpExecutor,
        dump: &mut DumpBuilder,
        kinds: &[StoredCodeKind],
    ) -> Result<(), MetadataQueryError> {
        if kinds.is_empty() {
            return Ok(());
        }
        let objects = self.catalog.fetch_stored_code(conn, kinds)?;
        log::debug!("Rendering {} stored code objects", objects.len());
        for object in &objects {
            dump.push_statement(&render::render_stored_code(object, self.dialect()));
        }
        Ok(())
    }

    /// `drop sequence` and `drop table ... cascade` for every sequence and table.
    pub fn structure_drop(&self, conn: &dyn DumpExecutor) -> Result<String, MetadataQueryError> {
        let dialect = self.dialect();
        let mut script = String::new();

        for sequence in self.catalog.fetch_sequences(conn)? {
            script.push_str(&render::render_drop_sequence(&sequence.name));
            script.push_str("\n\n");
        }
        for table in self.catalog.table_names(conn)? {
            script.push_str(&render::render_drop_table(&table, dialect));
            script.push_str("\n\n");
        }
        Ok(script)
    }

    /// Drop everything the dump would create.
    ///
    /// With `preserve_tables` only temporary tables are dropped (and no
    /// sequences); views, synonyms, types, packages, functions and procedures
    /// are always dropped.
    pub fn full_drop(
        &self,
        conn: &dyn DumpExecutor,
        preserve_tables: bool,
    ) -> Result<String, MetadataQueryError> {
        let dialect = self.dialect();
        #[cfg(feature = "tracing")]
        let _span = tracing_helpers::dump_span("full_drop", dialect).entered();

        let mut script = if preserve_tables {
            let mut temporary = String::new();
            for table in self.catalog.list_tables(conn)?.iter().filter(|t| t.temporary) {
                temporary.push_str(&render::render_drop_table(&table.name, dialect));
                temporary.push_str("\n\n");
            }
            temporary
        } else {
            self.structure_drop(conn)?
        };

        let code = self.catalog.fetch_stored_code(
            conn,
            &[
                StoredCodeKind::View,
                StoredCodeKind::Type,
                StoredCodeKind::Package,
                StoredCodeKind::Function,
                StoredCodeKind::Procedure,
            ],
        )?;
        let synonyms = self.catalog.fetch_synonyms(conn)?;

        let mut push_drops = |kind: &str, names: Vec<&str>| {
            for name in names {
                script.push_str(&render::render_drop_object(kind, name, dialect));
                script.push_str("\n\n");
            }
        };
        let names_of = |kind: StoredCodeKind| {
            code.iter()
                .filter(|o| o.kind == kind)
                .map(|o| o.name.as_str())
                .collect::<Vec<_>>()
        };

        push_drops("view", names_of(StoredCodeKind::View));
        push_drops("synonym", synonyms.iter().map(|s| s.name.as_str()).collect());
        push_drops("type", names_of(StoredCodeKind::Type));
        push_drops("package", names_of(StoredCodeKind::Package));
        push_drops("function", names_of(StoredCodeKind::Function));
        push_drops("procedure", names_of(StoredCodeKind::Procedure));

        log::debug!("Full drop script covers {} stored objects", code.len());
        Ok(script)
    }

    /// Execute a dump produced by [`structure_dump`](Self::structure_dump) (or a
    /// drop script) statement by statement; returns how many were executed.
    ///
    /// # Errors
    ///
    /// Stops at the first failing statement with [`MetadataQueryError::Execution`].
    pub fn load_structure(
        &self,
        conn: &dyn DumpExecutor,
        dump: &str,
    ) -> Result<usize, MetadataQueryError> {
        let dialect = self.dialect();
        #[cfg(feature = "tracing")]
        let _span = tracing_helpers::load_span(dialect).entered();

        let executed = match dialect {
            Dialect::Oracle => {
                let statements = split_oracle_statements(dump);
                for statement in &statements {
                    log::debug!("Executing {}", statement.lines().next().unwrap_or_default());
                    conn.execute(statement)
                        .map_err(|source| MetadataQueryError::Execution {
                            statement: statement.clone(),
                            source,
                        })?;
                }
                statements.len()
            }
            Dialect::Postgres => {
                let count = count_postgres_statements(dump);
                if count > 0 {
                    conn.execute_batch(dump)
                        .map_err(|source| MetadataQueryError::Execution {
                            statement: dump.to_string(),
                            source,
                        })?;
                }
                count
            }
        };

        log::info!("Loaded {} structure statements ({})", executed, dialect);
        Ok(executed)
    }
}

/// Split an Oracle dump into executable statements.
///
/// Chunks are separated by `/` lines. PL/SQL units are kept whole with their
/// trailing `;`; other chunks (the foreign key block, drop scripts) are split
/// on line-ending `;`, which is removed.
fn split_oracle_statements(dump: &str) -> Vec<String> {
    let mut statements = Vec::new();
    for chunk in SLASH_TERMINATOR.split(dump) {
        let chunk = chunk.trim();
        if chunk.is_empty() {
            continue;
        }
        if PLSQL_UNIT.is_match(chunk) {
            statements.push(chunk.to_string());
            continue;
        }
        statements.extend(
            LINE_TERMINATOR
                .split(chunk)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
        );
    }
    statements
}

/// Number of top-level statements in a PostgreSQL script.
///
/// `;` inside quotes, dollar-quoted bodies and comments does not count.
fn count_postgres_statements(script: &str) -> usize {
    let bytes = script.as_bytes();
    let mut count = 0;
    let mut pending = false;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            quote @ (b'\'' | b'"') => {
                i += 1;
                while i < bytes.len() && bytes[i] != quote {
                    i += 1;
                }
                pending = true;
            }
            b'-' if bytes.get(i + 1) == Some(&b'-') => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i = script[i + 2..]
                    .find("*/")
                    .map_or(bytes.len(), |end| i + 2 + end + 1);
            }
            b'$' => {
                pending = true;
                if let Some(tag_len) = dollar_tag_len(&bytes[i..]) {
                    let tag = &script[i..i + tag_len];
                    let body_start = i + tag_len;
                    i = script[body_start..]
                        .find(tag)
                        .map_or(bytes.len(), |end| body_start + end + tag_len - 1);
                }
            }
            b';' => {
                if pending {
                    count += 1;
                }
                pending = false;
            }
            b if b.is_ascii_whitespace() => {}
            _ => pending = true,
        }
        i += 1;
    }

    if pending {
        count += 1;
    }
    count
}

/// Length of a `$tag$` opener at the start of `bytes`, if there is one.
fn dollar_tag_len(bytes: &[u8]) -> Option<usize> {
    let mut end = 1;
    while end < bytes.len() && (bytes[end].is_ascii_alphanumeric() || bytes[end] == b'_') {
        end += 1;
    }
    let positional = end > 1 && bytes[1].is_ascii_digit();
    (end < bytes.len() && bytes[end] == b'$' && !positional).then_some(end + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_oracle_separator() {
        let mut dump = DumpBuilder::new(Dialect::Oracle);
        dump.push_statement("create sequence TEST_POSTS_SEQ");
        dump.push_statement("   ");
        dump.push_statement("create or replace TYPE TEST_TYPE AS TABLE OF VARCHAR2(10);\n");
        assert_eq!(dump.statement_count(), 2);
        assert_eq!(
            dump.finish(),
            "create sequence TEST_POSTS_SEQ\n\n/\n\ncreate or replace TYPE TEST_TYPE AS TABLE OF VARCHAR2(10);\n\n/\n\n"
        );
    }

    #[test]
    fn test_builder_postgres_does_not_double_semicolons() {
        let mut dump = DumpBuilder::new(Dialect::Postgres);
        dump.push_statement("create table posts (\n id integer\n)");
        dump.push_statement("ALTER TABLE posts ADD CONSTRAINT fk FOREIGN KEY (a) REFERENCES b(id);");
        assert_eq!(
            dump.finish(),
            "create table posts (\n id integer\n);\n\nALTER TABLE posts ADD CONSTRAINT fk FOREIGN KEY (a) REFERENCES b(id);\n\n"
        );
    }

    #[test]
    fn test_split_oracle_statements() {
        let dump = "create sequence TEST_POSTS_SEQ\n\n/\n\n\
                    create table TEST_POSTS (\n id number(38,0) not null\n)\n\n/\n\n\
                    ALTER TABLE A ADD CONSTRAINT fk_a FOREIGN KEY (b_id) REFERENCES b(id);\n\
                    ALTER TABLE C ADD CONSTRAINT fk_c FOREIGN KEY (b_id) REFERENCES b(id);\n\n/\n\n\
                    create or replace TRIGGER T\nBEFORE INSERT ON A\nBEGIN\n  NULL;\nEND;\n\n/\n\n";

        let statements = split_oracle_statements(dump);
        assert_eq!(statements.len(), 5);
        assert_eq!(statements[0], "create sequence TEST_POSTS_SEQ");
        assert!(statements[1].ends_with(")"));
        assert_eq!(
            statements[2],
            "ALTER TABLE A ADD CONSTRAINT fk_a FOREIGN KEY (b_id) REFERENCES b(id)"
        );
        assert!(statements[4].starts_with("create or replace TRIGGER T"));
        assert!(statements[4].ends_with("END;"));
    }

    #[test]
    fn test_split_drop_script() {
        let statements =
            split_oracle_statements("drop sequence S;\n\ndrop table T cascade constraints;\n\n");
        assert_eq!(statements, vec!["drop sequence S", "drop table T cascade constraints"]);
    }

    #[test]
    fn test_count_postgres_statements() {
        assert_eq!(count_postgres_statements(""), 0);
        assert_eq!(count_postgres_statements("create table a (id integer);\n\n"), 1);
        assert_eq!(
            count_postgres_statements("select ';' ; create view v as select 1 -- trailing;\n;"),
            2
        );

        let function = "create or replace FUNCTION public.touch()\n RETURNS trigger\n LANGUAGE plpgsql\nAS $function$\nbegin\n  new.updated_at := now();\n  return new;\nend;\n$function$;\n\n\
                        create or replace TRIGGER t BEFORE UPDATE ON posts FOR EACH ROW EXECUTE FUNCTION touch();\n\n";
        assert_eq!(count_postgres_statements(function), 2);
        assert_eq!(count_postgres_statements("select $1; select 2"), 2);
        assert_eq!(count_postgres_statements("/* a; b */ select 1;"), 1);
    }
}
