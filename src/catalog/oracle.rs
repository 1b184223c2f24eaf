//! Oracle data dictionary catalog.
//!
//! Reads the `USER_*` views of the session user, plus `ALL_SOURCE` and
//! `ALL_SYNONYMS` restricted to `sys_context('userenv', 'session_user')`.
//! Recycle bin objects (`BIN$...`) are skipped everywhere.

use super::{
    assemble_indexes, assemble_keys, flag, optional_integer, optional_u32, required, run_query,
    Catalog,
};
use crate::dialect::{quote_literal, Dialect};
use crate::error::MetadataQueryError;
use crate::executor::DumpExecutor;
use crate::metadata::{
    ColumnMetadata, ConstraintKind, ConstraintMetadata, IdentityGeneration, IndexMetadata,
    SequenceMetadata, StoredCodeKind, StoredCodeObject, SynonymMetadata, TableMetadata,
};

const SESSION_USER: &str = "sys_context('userenv', 'session_user')";

/// Catalog over the Oracle data dictionary of the connected user.
#[derive(Debug, Clone, Copy, Default)]
pub struct OracleCatalog;

impl OracleCatalog {
    pub fn new() -> Self {
        Self
    }
}

/// Dictionary name of `table`: unquoted (all lower case) names are stored in
/// upper case, anything else is looked up as given.
fn dictionary_name(table: &str) -> String {
    if table.chars().any(|c| c.is_uppercase()) {
        table.to_string()
    } else {
        table.to_uppercase()
    }
}

fn table_filter(alias: &str, table: Option<&str>) -> String {
    match table {
        Some(table) => format!(
            " and {alias}.table_name = {}",
            quote_literal(&dictionary_name(table))
        ),
        None => String::new(),
    }
}

fn constraints_sql(kind: ConstraintKind, table: &str) -> String {
    format!(
        "select c.table_name, c.constraint_name, cc.column_name, cc.position
  from user_constraints c
  join user_cons_columns cc on cc.owner = c.owner and cc.constraint_name = c.constraint_name
 where c.constraint_type = '{}'
   and c.table_name = {}
   and c.constraint_name not like 'BIN$%'
 order by c.constraint_name, cc.position",
        kind.oracle_code(),
        quote_literal(&dictionary_name(table))
    )
}

/// `ALL_SOURCE.TYPE` values to query; views live in `USER_VIEWS` instead.
fn source_types(kinds: &[StoredCodeKind]) -> Vec<String> {
    kinds
        .iter()
        .filter(|k| **k != StoredCodeKind::View)
        .map(|k| quote_literal(k.keyword()))
        .collect()
}

impl Catalog for OracleCatalog {
    fn dialect(&self) -> Dialect {
        Dialect::Oracle
    }

    fn list_tables(&self, conn: &dyn DumpExecutor) -> Result<Vec<TableMetadata>, MetadataQueryError> {
        const LABEL: &str = "tables";
        let sql = "select t.table_name, t.temporary
  from user_tables t
 where t.secondary = 'N'
   and t.table_name not like 'BIN$%'
   and not exists (select 1 from user_mviews mv where mv.mview_name = t.table_name)
   and not exists (select 1 from user_mview_logs ml where ml.log_table = t.table_name)
 order by t.table_name";

        run_query(conn, LABEL, sql)?
            .iter()
            .map(|row| {
                let mut table = TableMetadata::new(required(row, LABEL, "table_name")?);
                table.temporary = flag(row, "temporary");
                Ok(table)
            })
            .collect()
    }

    fn columns(
        &self,
        conn: &dyn DumpExecutor,
        table: &str,
    ) -> Result<Vec<ColumnMetadata>, MetadataQueryError> {
        const LABEL: &str = "columns";
        let sql = format!(
            "select c.column_name, c.data_type, c.data_length, c.char_used, c.char_length,
       c.data_precision, c.data_scale, c.data_default, c.nullable,
       ic.generation_type as identity_generation
  from user_tab_columns c
  left join user_tab_identity_cols ic
    on ic.table_name = c.table_name and ic.column_name = c.column_name
 where c.table_name = {}
 order by c.column_id",
            quote_literal(&dictionary_name(table))
        );

        let virtual_columns = self.fetch_virtual_columns(conn, table)?;

        run_query(conn, LABEL, &sql)?
            .iter()
            .map(|row| {
                let name = required(row, LABEL, "column_name")?;
                let data_type = required(row, LABEL, "data_type")?;
                let mut column = ColumnMetadata::new(name, data_type);

                column.precision = optional_u32(row, LABEL, "data_precision")?;
                column.scale = optional_integer(row, LABEL, "data_scale")?.map(|s| s as i32);
                if data_type.to_uppercase().contains("CHAR") {
                    column.length = if row.get("char_used") == Some("C") {
                        optional_u32(row, LABEL, "char_length")?
                    } else {
                        optional_u32(row, LABEL, "data_length")?
                    };
                }
                column.nullable = row.get("nullable") != Some("N");
                column.identity = row
                    .get("identity_generation")
                    .and_then(IdentityGeneration::from_catalog);

                match virtual_columns.iter().find(|v| v.name == name) {
                    Some(v) => column.generation_expression = v.generation_expression.clone(),
                    // identity defaults are the ISEQ$$ nextval
                    None if column.identity.is_some() => {}
                    None => column.default = row.get("data_default").map(str::to_string),
                }
                Ok(column)
            })
            .collect()
    }

    fn fetch_virtual_columns(
        &self,
        conn: &dyn DumpExecutor,
        table: &str,
    ) -> Result<Vec<ColumnMetadata>, MetadataQueryError> {
        const LABEL: &str = "virtual columns";
        let sql = format!(
            "select column_name, data_type, data_default
  from user_tab_cols
 where virtual_column = 'YES'
   and hidden_column = 'NO'
   and table_name = {}
 order by column_id",
            quote_literal(&dictionary_name(table))
        );

        run_query(conn, LABEL, &sql)?
            .iter()
            .map(|row| {
                let expression = required(row, LABEL, "data_default")?;
                Ok(ColumnMetadata::new(
                    required(row, LABEL, "column_name")?,
                    required(row, LABEL, "data_type")?,
                )
                .generated_as(expression.trim()))
            })
            .collect()
    }

    fn fetch_primary_key(
        &self,
        conn: &dyn DumpExecutor,
        table: &str,
    ) -> Result<Option<ConstraintMetadata>, MetadataQueryError> {
        const LABEL: &str = "primary key";
        let rows = run_query(conn, LABEL, &constraints_sql(ConstraintKind::PrimaryKey, table))?;
        Ok(assemble_keys(ConstraintKind::PrimaryKey, &rows, LABEL)?
            .into_iter()
            .next())
    }

    fn fetch_foreign_keys(
        &self,
        conn: &dyn DumpExecutor,
        table: Option<&str>,
    ) -> Result<Vec<ConstraintMetadata>, MetadataQueryError> {
        const LABEL: &str = "foreign keys";
        let sql = format!(
            "select c.table_name, c.constraint_name, cc.column_name, cc.position,
       r.table_name as r_table_name, rc.column_name as r_column_name, c.delete_rule
  from user_constraints c
  join user_cons_columns cc on cc.owner = c.owner and cc.constraint_name = c.constraint_name
  join all_constraints r on r.owner = c.r_owner and r.constraint_name = c.r_constraint_name
  join all_cons_columns rc on rc.owner = r.owner and rc.constraint_name = r.constraint_name
   and rc.position = cc.position
 where c.constraint_type = 'R'
   and c.constraint_name not like 'BIN$%'{}
 order by c.table_name, c.constraint_name, cc.position",
            table_filter("c", table)
        );

        let rows = run_query(conn, LABEL, &sql)?;
        assemble_keys(ConstraintKind::ForeignKey, &rows, LABEL)
    }

    fn fetch_unique_keys(
        &self,
        conn: &dyn DumpExecutor,
        table: &str,
    ) -> Result<Vec<ConstraintMetadata>, MetadataQueryError> {
        const LABEL: &str = "unique keys";
        let rows = run_query(conn, LABEL, &constraints_sql(ConstraintKind::Unique, table))?;
        assemble_keys(ConstraintKind::Unique, &rows, LABEL)
    }

    fn fetch_indexes(
        &self,
        conn: &dyn DumpExecutor,
        table: Option<&str>,
    ) -> Result<Vec<IndexMetadata>, MetadataQueryError> {
        const LABEL: &str = "indexes";
        let sql = format!(
            "select i.index_name, i.table_name, ic.column_name, ic.column_position, i.uniqueness,
       case when exists (select 1 from user_constraints c
                          where c.index_name = i.index_name
                            and c.table_name = i.table_name
                            and c.constraint_type in ('P', 'U'))
            then 'Y' else 'N' end as constraint_backed
  from user_indexes i
  join user_ind_columns ic on ic.index_name = i.index_name and ic.table_name = i.table_name
 where i.index_type = 'NORMAL'
   and i.index_name not like 'BIN$%'{}
 order by i.table_name, i.index_name, ic.column_position",
            table_filter("i", table)
        );

        let rows = run_query(conn, LABEL, &sql)?;
        assemble_indexes(&rows, LABEL)
    }

    fn fetch_stored_code(
        &self,
        conn: &dyn DumpExecutor,
        kinds: &[StoredCodeKind],
    ) -> Result<Vec<StoredCodeObject>, MetadataQueryError> {
        let mut objects: Vec<StoredCodeObject> = Vec::new();

        let types = source_types(kinds);
        if !types.is_empty() {
            const LABEL: &str = "stored code";
            let sql = format!(
                "select name, type, text
  from all_source
 where owner = {SESSION_USER}
   and type in ({})
   and name not like 'BIN$%'
 order by type, name, line",
                types.join(", ")
            );

            for row in run_query(conn, LABEL, &sql)? {
                let name = required(&row, LABEL, "name")?;
                let source_type = required(&row, LABEL, "type")?;
                let Some(kind) = StoredCodeKind::from_keyword(source_type) else {
                    log::warn!("Skipping {} of unsupported source type {}", name, source_type);
                    continue;
                };
                let text = row.get("text").unwrap_or_default();

                let same_object = objects
                    .last()
                    .is_some_and(|last| last.kind == kind && last.name == name);
                if same_object {
                    if let Some(last) = objects.last_mut() {
                        last.body.push_str(text);
                    }
                } else {
                    objects.push(StoredCodeObject::new(kind, name, text));
                }
            }
        }

        if kinds.contains(&StoredCodeKind::View) {
            const LABEL: &str = "views";
            let sql = "select view_name, text from user_views order by view_name";
            for row in run_query(conn, LABEL, sql)? {
                objects.push(StoredCodeObject::new(
                    StoredCodeKind::View,
                    required(&row, LABEL, "view_name")?,
                    row.get("text").unwrap_or_default(),
                ));
            }
        }

        Ok(objects)
    }

    fn fetch_sequences(
        &self,
        conn: &dyn DumpExecutor,
    ) -> Result<Vec<SequenceMetadata>, MetadataQueryError> {
        const LABEL: &str = "sequences";
        let sql = "select sequence_name, increment_by
  from user_sequences
 where sequence_name not like 'BIN$%'
   and sequence_name not like 'ISEQ$$%'
 order by sequence_name";

        run_query(conn, LABEL, sql)?
            .iter()
            .map(|row| {
                let mut sequence = SequenceMetadata::new(required(row, LABEL, "sequence_name")?);
                sequence.increment_by = optional_integer(row, LABEL, "increment_by")?;
                Ok(sequence)
            })
            .collect()
    }

    fn fetch_synonyms(
        &self,
        conn: &dyn DumpExecutor,
    ) -> Result<Vec<SynonymMetadata>, MetadataQueryError> {
        const LABEL: &str = "synonyms";
        let sql = format!(
            "select synonym_name, table_owner, table_name
  from all_synonyms
 where owner = {SESSION_USER}
 order by synonym_name"
        );

        run_query(conn, LABEL, &sql)?
            .iter()
            .map(|row| {
                Ok(SynonymMetadata {
                    name: required(row, LABEL, "synonym_name")?.to_string(),
                    target_owner: row.get("table_owner").map(str::to_string),
                    target_name: required(row, LABEL, "table_name")?.to_string(),
                })
            })
            .collect()
    }
}
