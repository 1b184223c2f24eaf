//! Metadata Query Layer
//!
//! A [`Catalog`] knows which dictionary views of one dialect describe tables,
//! keys, indexes and stored code, and turns their rows into [`crate::metadata`]
//! values. The connection is never owned: every call borrows the executor it
//! should query through.
//!
//! Absence is always an empty result. Only executor failures and malformed
//! catalog rows become [`MetadataQueryError`].

mod memory;
mod oracle;
mod postgres;

pub use memory::MemoryCatalog;
pub use oracle::OracleCatalog;
pub use postgres::PostgresCatalog;

use crate::dialect::Dialect;
use crate::error::MetadataQueryError;
use crate::executor::{CatalogRow, DumpExecutor};
use crate::metadata::{
    ColumnMetadata, ConstraintKind, ConstraintMetadata, IndexMetadata, ReferentialAction,
    SequenceMetadata, StoredCodeKind, StoredCodeObject, SynonymMetadata, TableMetadata,
};

#[cfg(feature = "tracing")]
use crate::tracing_helpers;

/// Dialect-specific access to structural metadata.
pub trait Catalog {
    fn dialect(&self) -> Dialect;

    /// Tables of the dumped schema ordered by name, without their columns.
    fn list_tables(&self, conn: &dyn DumpExecutor) -> Result<Vec<TableMetadata>, MetadataQueryError>;

    /// Columns of `table` in catalog order, virtual columns included.
    fn columns(
        &self,
        conn: &dyn DumpExecutor,
        table: &str,
    ) -> Result<Vec<ColumnMetadata>, MetadataQueryError>;

    fn fetch_primary_key(
        &self,
        conn: &dyn DumpExecutor,
        table: &str,
    ) -> Result<Option<ConstraintMetadata>, MetadataQueryError>;

    /// Foreign keys of `table`, or of every table when `None`.
    fn fetch_foreign_keys(
        &self,
        conn: &dyn DumpExecutor,
        table: Option<&str>,
    ) -> Result<Vec<ConstraintMetadata>, MetadataQueryError>;

    fn fetch_unique_keys(
        &self,
        conn: &dyn DumpExecutor,
        table: &str,
    ) -> Result<Vec<ConstraintMetadata>, MetadataQueryError>;

    /// Indexes of `table` (or every table), flagged when they back a key constraint.
    fn fetch_indexes(
        &self,
        conn: &dyn DumpExecutor,
        table: Option<&str>,
    ) -> Result<Vec<IndexMetadata>, MetadataQueryError>;

    fn fetch_stored_code(
        &self,
        conn: &dyn DumpExecutor,
        kinds: &[StoredCodeKind],
    ) -> Result<Vec<StoredCodeObject>, MetadataQueryError>;

    fn fetch_sequences(
        &self,
        conn: &dyn DumpExecutor,
    ) -> Result<Vec<SequenceMetadata>, MetadataQueryError>;

    fn fetch_synonyms(
        &self,
        _conn: &dyn DumpExecutor,
    ) -> Result<Vec<SynonymMetadata>, MetadataQueryError> {
        Ok(Vec::new())
    }

    fn table_names(&self, conn: &dyn DumpExecutor) -> Result<Vec<String>, MetadataQueryError> {
        Ok(self
            .list_tables(conn)?
            .into_iter()
            .map(|t| t.name)
            .collect())
    }

    /// Tables with their columns loaded.
    fn tables(&self, conn: &dyn DumpExecutor) -> Result<Vec<TableMetadata>, MetadataQueryError> {
        let mut tables = self.list_tables(conn)?;
        for table in &mut tables {
            table.columns = self.columns(conn, &table.name)?;
        }
        Ok(tables)
    }

    /// Generated columns of `table` with their expressions.
    fn fetch_virtual_columns(
        &self,
        conn: &dyn DumpExecutor,
        table: &str,
    ) -> Result<Vec<ColumnMetadata>, MetadataQueryError> {
        Ok(self
            .columns(conn, table)?
            .into_iter()
            .filter(ColumnMetadata::is_virtual)
            .collect())
    }
}

/// Run one catalog query, labelling failures with `label`.
pub(crate) fn run_query(
    conn: &dyn DumpExecutor,
    label: &str,
    sql: &str,
) -> Result<Vec<CatalogRow>, MetadataQueryError> {
    #[cfg(feature = "tracing")]
    let _span = tracing_helpers::catalog_query_span(label).entered();

    let rows = conn
        .select_all(sql)
        .map_err(|e| MetadataQueryError::query(label, e))?;
    log::debug!("Catalog query for {} returned {} rows", label, rows.len());
    Ok(rows)
}

/// Non-null text value of `column`.
pub(crate) fn required<'r>(
    row: &'r CatalogRow,
    query: &str,
    column: &str,
) -> Result<&'r str, MetadataQueryError> {
    match row.get(column) {
        Some(value) => Ok(value),
        None if row.contains(column) => Err(MetadataQueryError::InvalidValue {
            query: query.to_string(),
            column: column.to_string(),
            value: "NULL".to_string(),
        }),
        None => Err(MetadataQueryError::MissingColumn {
            query: query.to_string(),
            column: column.to_string(),
        }),
    }
}

/// Integer value of `column`; NULL is `None`. Accepts `38` as well as `38.0`.
pub(crate) fn optional_integer(
    row: &CatalogRow,
    query: &str,
    column: &str,
) -> Result<Option<i64>, MetadataQueryError> {
    let Some(raw) = row.get(column) else {
        return Ok(None);
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    let parsed = trimmed.parse::<i64>().ok().or_else(|| {
        trimmed
            .parse::<f64>()
            .ok()
            .filter(|f| f.fract() == 0.0)
            .map(|f| f as i64)
    });
    parsed
        .map(Some)
        .ok_or_else(|| MetadataQueryError::InvalidValue {
            query: query.to_string(),
            column: column.to_string(),
            value: raw.to_string(),
        })
}

pub(crate) fn optional_u32(
    row: &CatalogRow,
    query: &str,
    column: &str,
) -> Result<Option<u32>, MetadataQueryError> {
    match optional_integer(row, query, column)? {
        None => Ok(None),
        Some(v) => u32::try_from(v)
            .map(Some)
            .map_err(|_| MetadataQueryError::InvalidValue {
                query: query.to_string(),
                column: column.to_string(),
                value: v.to_string(),
            }),
    }
}

/// Catalog flag columns: `Y`/`YES`/`t`/`true` are set.
pub(crate) fn flag(row: &CatalogRow, column: &str) -> bool {
    matches!(
        row.get(column).map(|v| v.trim().to_ascii_uppercase()),
        Some(ref v) if v == "Y" || v == "YES" || v == "T" || v == "TRUE"
    )
}

/// One key under assembly: `(position, column, referenced column)` triples.
#[derive(Debug, Default)]
struct KeyGroup {
    table: String,
    name: String,
    columns: Vec<(i64, String, Option<String>)>,
    referenced_table: Option<String>,
    on_delete: Option<ReferentialAction>,
}

/// Assemble per-column constraint rows into ordered keys.
///
/// Rows must carry `table_name`, `constraint_name`, `column_name` and
/// `position`; foreign key rows also `r_table_name`, `r_column_name` and
/// optionally `delete_rule`. Keys come out in first-seen order, their columns
/// placed by `position` (declaration order), not by name.
pub(crate) fn assemble_keys(
    kind: ConstraintKind,
    rows: &[CatalogRow],
    query: &str,
) -> Result<Vec<ConstraintMetadata>, MetadataQueryError> {
    let mut groups: Vec<KeyGroup> = Vec::new();

    for row in rows {
        let table = required(row, query, "table_name")?;
        let name = required(row, query, "constraint_name")?;
        let column = required(row, query, "column_name")?;
        let position = optional_integer(row, query, "position")?.unwrap_or(0);

        let idx = match groups.iter().position(|g| g.table == table && g.name == name) {
            Some(idx) => idx,
            None => {
                let mut group = KeyGroup {
                    table: table.to_string(),
                    name: name.to_string(),
                    ..KeyGroup::default()
                };
                if kind == ConstraintKind::ForeignKey {
                    group.referenced_table = Some(required(row, query, "r_table_name")?.to_string());
                    group.on_delete = row.get("delete_rule").and_then(ReferentialAction::from_catalog);
                }
                groups.push(group);
                groups.len() - 1
            }
        };

        let referenced_column = if kind == ConstraintKind::ForeignKey {
            Some(required(row, query, "r_column_name")?.to_string())
        } else {
            None
        };
        let group = &mut groups[idx];
        if !group.columns.iter().any(|(p, c, _)| *p == position && c == column) {
            group.columns.push((position, column.to_string(), referenced_column));
        }
    }

    Ok(groups
        .into_iter()
        .map(|mut group| {
            group.columns.sort_by_key(|(position, _, _)| *position);
            let mut key = ConstraintMetadata::new(
                kind,
                group.table,
                group.name,
                group.columns.iter().map(|(_, c, _)| c.clone()).collect(),
            );
            key.referenced_table = group.referenced_table;
            key.referenced_columns = group
                .columns
                .into_iter()
                .filter_map(|(_, _, r)| r)
                .collect();
            key.on_delete = group.on_delete;
            key
        })
        .collect())
}

/// Assemble per-column index rows (`index_name`, `table_name`, `column_name`,
/// `column_position`, `uniqueness`, `constraint_backed`) into indexes.
pub(crate) fn assemble_indexes(
    rows: &[CatalogRow],
    query: &str,
) -> Result<Vec<IndexMetadata>, MetadataQueryError> {
    let mut indexes: Vec<(IndexMetadata, Vec<(i64, String)>)> = Vec::new();

    for row in rows {
        let name = required(row, query, "index_name")?;
        let table = required(row, query, "table_name")?;
        let column = required(row, query, "column_name")?;
        let position = optional_integer(row, query, "column_position")?.unwrap_or(0);

        let idx = match indexes.iter().position(|(i, _)| i.name == name && i.table == table) {
            Some(idx) => idx,
            None => {
                let mut index = IndexMetadata::new(name, table, &[]);
                index.unique = row
                    .get("uniqueness")
                    .map(|u| u.eq_ignore_ascii_case("UNIQUE") || flag(row, "uniqueness"))
                    .unwrap_or(false);
                index.constraint_backed = flag(row, "constraint_backed");
                indexes.push((index, Vec::new()));
                indexes.len() - 1
            }
        };
        indexes[idx].1.push((position, column.to_string()));
    }

    Ok(indexes
        .into_iter()
        .map(|(mut index, mut columns)| {
            columns.sort_by_key(|(position, _)| *position);
            index.columns = columns.into_iter().map(|(_, c)| c).collect();
            index
        })
        .collect())
}
