//! In-memory catalog.
//!
//! Holds a snapshot of structural metadata and answers every [`Catalog`] call
//! from it without touching the connection. Useful for rendering DDL from
//! metadata obtained elsewhere and for exercising the dump orchestration.

use super::Catalog;
use crate::dialect::Dialect;
use crate::error::MetadataQueryError;
use crate::executor::DumpExecutor;
use crate::metadata::{
    ColumnMetadata, ConstraintKind, ConstraintMetadata, IndexMetadata, SequenceMetadata,
    StoredCodeKind, StoredCodeObject, SynonymMetadata, TableMetadata,
};

/// A [`Catalog`] answering from owned metadata.
///
/// ```
/// use schemadump::{ColumnMetadata, ConstraintMetadata, Dialect, MemoryCatalog, TableMetadata};
///
/// let catalog = MemoryCatalog::new(Dialect::Oracle)
///     .table(TableMetadata::new("FOOS").column(ColumnMetadata::new("ID", "NUMBER").precision(38, Some(0)).not_null()))
///     .constraint(ConstraintMetadata::primary_key("FOOS", "SYS_C0013", &["ID"]));
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryCatalog {
    dialect: Dialect,
    tables: Vec<TableMetadata>,
    constraints: Vec<ConstraintMetadata>,
    indexes: Vec<IndexMetadata>,
    stored_code: Vec<StoredCodeObject>,
    sequences: Vec<SequenceMetadata>,
    synonyms: Vec<SynonymMetadata>,
}

impl MemoryCatalog {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            ..Self::default()
        }
    }

    pub fn table(mut self, table: TableMetadata) -> Self {
        self.tables.push(table);
        self
    }

    pub fn constraint(mut self, constraint: ConstraintMetadata) -> Self {
        self.constraints.push(constraint);
        self
    }

    pub fn index(mut self, index: IndexMetadata) -> Self {
        self.indexes.push(index);
        self
    }

    pub fn stored_code(mut self, object: StoredCodeObject) -> Self {
        self.stored_code.push(object);
        self
    }

    pub fn sequence(mut self, sequence: SequenceMetadata) -> Self {
        self.sequences.push(sequence);
        self
    }

    pub fn synonym(mut self, synonym: SynonymMetadata) -> Self {
        self.synonyms.push(synonym);
        self
    }

    /// Oracle folds unquoted names, so lookups there ignore case.
    fn same_table(&self, stored: &str, wanted: &str) -> bool {
        match self.dialect {
            Dialect::Oracle => stored.eq_ignore_ascii_case(wanted),
            Dialect::Postgres => stored == wanted,
        }
    }

    fn constraints_of<'a>(
        &'a self,
        kind: ConstraintKind,
        table: Option<&'a str>,
    ) -> impl Iterator<Item = &'a ConstraintMetadata> + 'a {
        self.constraints.iter().filter(move |c| {
            c.kind == kind && table.map_or(true, |t| self.same_table(&c.table, t))
        })
    }
}

impl Catalog for MemoryCatalog {
    fn dialect(&self) -> Dialect {
        self.dialect
    }

    fn list_tables(&self, _conn: &dyn DumpExecutor) -> Result<Vec<TableMetadata>, MetadataQueryError> {
        let mut tables: Vec<TableMetadata> = self
            .tables
            .iter()
            .map(|t| TableMetadata {
                name: t.name.clone(),
                temporary: t.temporary,
                columns: Vec::new(),
            })
            .collect();
        tables.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(tables)
    }

    fn columns(
        &self,
        _conn: &dyn DumpExecutor,
        table: &str,
    ) -> Result<Vec<ColumnMetadata>, MetadataQueryError> {
        Ok(self
            .tables
            .iter()
            .find(|t| self.same_table(&t.name, table))
            .map(|t| t.columns.clone())
            .unwrap_or_default())
    }

    fn fetch_primary_key(
        &self,
        _conn: &dyn DumpExecutor,
        table: &str,
    ) -> Result<Option<ConstraintMetadata>, MetadataQueryError> {
        Ok(self
            .constraints_of(ConstraintKind::PrimaryKey, Some(table))
            .next()
            .cloned())
    }

    fn fetch_foreign_keys(
        &self,
        _conn: &dyn DumpExecutor,
        table: Option<&str>,
    ) -> Result<Vec<ConstraintMetadata>, MetadataQueryError> {
        let mut fks: Vec<ConstraintMetadata> = self
            .constraints_of(ConstraintKind::ForeignKey, table)
            .cloned()
            .collect();
        fks.sort_by(|a, b| (&a.table, &a.name).cmp(&(&b.table, &b.name)));
        Ok(fks)
    }

    fn fetch_unique_keys(
        &self,
        _conn: &dyn DumpExecutor,
        table: &str,
    ) -> Result<Vec<ConstraintMetadata>, MetadataQueryError> {
        Ok(self
            .constraints_of(ConstraintKind::Unique, Some(table))
            .cloned()
            .collect())
    }

    fn fetch_indexes(
        &self,
        _conn: &dyn DumpExecutor,
        table: Option<&str>,
    ) -> Result<Vec<IndexMetadata>, MetadataQueryError> {
        Ok(self
            .indexes
            .iter()
            .filter(|i| table.map_or(true, |t| self.same_table(&i.table, t)))
            .cloned()
            .collect())
    }

    fn fetch_stored_code(
        &self,
        _conn: &dyn DumpExecutor,
        kinds: &[StoredCodeKind],
    ) -> Result<Vec<StoredCodeObject>, MetadataQueryError> {
        Ok(self
            .stored_code
            .iter()
            .filter(|o| kinds.contains(&o.kind))
            .cloned()
            .collect())
    }

    fn fetch_sequences(
        &self,
        _conn: &dyn DumpExecutor,
    ) -> Result<Vec<SequenceMetadata>, MetadataQueryError> {
        Ok(self.sequences.clone())
    }

    fn fetch_synonyms(
        &self,
        _conn: &dyn DumpExecutor,
    ) -> Result<Vec<SynonymMetadata>, MetadataQueryError> {
        Ok(self.synonyms.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedExecutor;

    fn catalog() -> MemoryCatalog {
        MemoryCatalog::new(Dialect::Oracle)
            .table(TableMetadata::new("TEST_POSTS").column(ColumnMetadata::new("ID", "NUMBER")))
            .table(TableMetadata::new("FOOS").column(ColumnMetadata::new("ID", "NUMBER")))
            .constraint(ConstraintMetadata::primary_key("TEST_POSTS", "SYS_C0014", &["ID"]))
            .constraint(ConstraintMetadata::unique("TEST_POSTS", "UK_FOO_FOO_ID", &["FOO", "FOO_ID"]))
    }

    #[test]
    fn test_tables_are_sorted_and_loaded() {
        let conn = ScriptedExecutor::new();
        let catalog = catalog();

        assert_eq!(catalog.table_names(&conn).unwrap(), vec!["FOOS", "TEST_POSTS"]);
        let tables = catalog.tables(&conn).unwrap();
        assert_eq!(tables[1].columns.len(), 1);
        assert!(conn.queries().is_empty());
    }

    #[test]
    fn test_oracle_lookups_ignore_case() {
        let conn = ScriptedExecutor::new();
        let catalog = catalog();

        assert!(catalog.fetch_primary_key(&conn, "test_posts").unwrap().is_some());
        assert_eq!(catalog.fetch_unique_keys(&conn, "test_posts").unwrap().len(), 1);
        assert!(catalog.fetch_primary_key(&conn, "foos").unwrap().is_none());
    }

    #[test]
    fn test_postgres_lookups_are_exact() {
        let conn = ScriptedExecutor::new();
        let catalog = MemoryCatalog::new(Dialect::Postgres)
            .constraint(ConstraintMetadata::primary_key("posts", "posts_pkey", &["id"]));

        assert!(catalog.fetch_primary_key(&conn, "posts").unwrap().is_some());
        assert!(catalog.fetch_primary_key(&conn, "POSTS").unwrap().is_none());
    }
}
