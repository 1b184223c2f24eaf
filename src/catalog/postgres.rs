//! PostgreSQL `pg_catalog` catalog.
//!
//! Every selected value is cast to `text` so rows read back uniformly through
//! [`MayPostgresExecutor`](crate::MayPostgresExecutor). Key columns are
//! expanded with `unnest(...) WITH ORDINALITY`, which keeps declaration order.

use super::{
    assemble_indexes, assemble_keys, flag, optional_integer, required, run_query, Catalog,
};
use crate::dialect::{quote_literal, Dialect};
use crate::error::MetadataQueryError;
use crate::executor::DumpExecutor;
use crate::metadata::{
    ColumnMetadata, ConstraintKind, ConstraintMetadata, IdentityGeneration, IndexMetadata,
    SequenceMetadata, StoredCodeKind, StoredCodeObject, TableMetadata,
};

const DEFAULT_SCHEMA: &str = "public";

/// Catalog over one PostgreSQL schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostgresCatalog {
    schema: String,
}

impl Default for PostgresCatalog {
    fn default() -> Self {
        Self::new(DEFAULT_SCHEMA)
    }
}

impl PostgresCatalog {
    pub fn new(schema: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
        }
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }

    fn schema_literal(&self) -> String {
        quote_literal(&self.schema)
    }

    fn table_filter(&self, alias: &str, table: Option<&str>) -> String {
        match table {
            Some(table) => format!(" and {alias}.relname = {}", quote_literal(table)),
            None => String::new(),
        }
    }

    fn keys_sql(&self, kind: ConstraintKind, table: &str) -> String {
        format!(
            "select t.relname::text as table_name, c.conname::text as constraint_name,
       a.attname::text as column_name, k.ord::text as position
  from pg_catalog.pg_constraint c
  join pg_catalog.pg_class t on t.oid = c.conrelid
  join pg_catalog.pg_namespace n on n.oid = t.relnamespace
  cross join lateral unnest(c.conkey) with ordinality as k(attnum, ord)
  join pg_catalog.pg_attribute a on a.attrelid = t.oid and a.attnum = k.attnum
 where c.contype = '{}'
   and n.nspname = {}
   and t.relname = {}
 order by c.conname, k.ord",
            kind.postgres_code(),
            self.schema_literal(),
            quote_literal(table)
        )
    }
}

/// `pg_get_functiondef` / `pg_get_triggerdef` output without its leading
/// `CREATE [OR REPLACE] `, so the body starts with the object kind.
fn strip_create_prefix(definition: &str) -> &str {
    let trimmed = definition.trim_start();
    for prefix in ["CREATE OR REPLACE ", "CREATE "] {
        if trimmed.len() >= prefix.len()
            && trimmed.is_char_boundary(prefix.len())
            && trimmed[..prefix.len()].eq_ignore_ascii_case(prefix)
        {
            return &trimmed[prefix.len()..];
        }
    }
    trimmed
}

impl Catalog for PostgresCatalog {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    fn list_tables(&self, conn: &dyn DumpExecutor) -> Result<Vec<TableMetadata>, MetadataQueryError> {
        const LABEL: &str = "tables";
        let sql = format!(
            "select c.relname::text as table_name,
       case when c.relpersistence = 't' then 'Y' else 'N' end as temporary
  from pg_catalog.pg_class c
  join pg_catalog.pg_namespace n on n.oid = c.relnamespace
 where c.relkind in ('r', 'p')
   and not c.relispartition
   and n.nspname = {}
 order by c.relname",
            self.schema_literal()
        );

        run_query(conn, LABEL, &sql)?
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
            "select a.attname::text as column_name,
       pg_catalog.format_type(a.atttypid, a.atttypmod) as data_type,
       case when a.attnotnull then 'N' else 'Y' end as nullable,
       case when a.attgenerated = '' then pg_catalog.pg_get_expr(d.adbin, d.adrelid) end as data_default,
       case when a.attgenerated = 's' then pg_catalog.pg_get_expr(d.adbin, d.adrelid) end as generation_expression,
       case a.attidentity when 'a' then 'ALWAYS' when 'd' then 'BY DEFAULT' end as identity_generation
  from pg_catalog.pg_attribute a
  join pg_catalog.pg_class c on c.oid = a.attrelid
  join pg_catalog.pg_namespace n on n.oid = c.relnamespace
  left join pg_catalog.pg_attrdef d on d.adrelid = a.attrelid and d.adnum = a.attnum
 where n.nspname = {}
   and c.relname = {}
   and a.attnum > 0
   and not a.attisdropped
 order by a.attnum",
            self.schema_literal(),
            quote_literal(table)
        );

        run_query(conn, LABEL, &sql)?
            .iter()
            .map(|row| {
                let mut column = ColumnMetadata::new(
                    required(row, LABEL, "column_name")?,
                    required(row, LABEL, "data_type")?,
                );
                column.nullable = row.get("nullable") != Some("N");
                column.default = row.get("data_default").map(str::to_string);
                column.generation_expression =
                    row.get("generation_expression").map(str::to_string);
                column.identity = row
                    .get("identity_generation")
                    .and_then(IdentityGeneration::from_catalog);
                Ok(column)
            })
            .collect()
    }

    fn fetch_primary_key(
        &self,
        conn: &dyn DumpExecutor,
        table: &str,
    ) -> Result<Option<ConstraintMetadata>, MetadataQueryError> {
        const LABEL: &str = "primary key";
        let rows = run_query(conn, LABEL, &self.keys_sql(ConstraintKind::PrimaryKey, table))?;
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
            "select t.relname::text as table_name, c.conname::text as constraint_name,
       a.attname::text as column_name, k.ord::text as position,
       rt.relname::text as r_table_name, ra.attname::text as r_column_name,
       c.confdeltype::text as delete_rule
  from pg_catalog.pg_constraint c
  join pg_catalog.pg_class t on t.oid = c.conrelid
  join pg_catalog.pg_namespace n on n.oid = t.relnamespace
  join pg_catalog.pg_class rt on rt.oid = c.confrelid
  cross join lateral unnest(c.conkey, c.confkey) with ordinality as k(attnum, ref_attnum, ord)
  join pg_catalog.pg_attribute a on a.attrelid = t.oid and a.attnum = k.attnum
  join pg_catalog.pg_attribute ra on ra.attrelid = rt.oid and ra.attnum = k.ref_attnum
 where c.contype = 'f'
   and n.nspname = {}{}
 order by t.relname, c.conname, k.ord",
            self.schema_literal(),
            self.table_filter("t", table)
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
        let rows = run_query(conn, LABEL, &self.keys_sql(ConstraintKind::Unique, table))?;
        assemble_keys(ConstraintKind::Unique, &rows, LABEL)
    }

    fn fetch_indexes(
        &self,
        conn: &dyn DumpExecutor,
        table: Option<&str>,
    ) -> Result<Vec<IndexMetadata>, MetadataQueryError> {
        const LABEL: &str = "indexes";
        let sql = format!(
            "select i.relname::text as index_name, t.relname::text as table_name,
       coalesce(a.attname::text, pg_catalog.pg_get_indexdef(ix.indexrelid, k.ord::int, true)) as column_name,
       k.ord::text as column_position,
       case when ix.indisunique then 'UNIQUE' else 'NONUNIQUE' end as uniqueness,
       case when exists (select 1 from pg_catalog.pg_constraint c
                          where c.conindid = ix.indexrelid
                            and c.contype in ('p', 'u'))
            then 'Y' else 'N' end as constraint_backed
  from pg_catalog.pg_index ix
  join pg_catalog.pg_class i on i.oid = ix.indexrelid
  join pg_catalog.pg_class t on t.oid = ix.indrelid
  join pg_catalog.pg_namespace n on n.oid = t.relnamespace
  cross join lateral unnest(ix.indkey::int2[]) with ordinality as k(attnum, ord)
  left join pg_catalog.pg_attribute a on a.attrelid = t.oid and a.attnum = k.attnum and k.attnum > 0
 where n.nspname = {}
   and k.ord <= ix.indnkeyatts{}
 order by t.relname, i.relname, k.ord",
            self.schema_literal(),
            self.table_filter("t", table)
        );

        let rows = run_query(conn, LABEL, &sql)?;
        assemble_indexes(&rows, LABEL)
    }

    fn fetch_stored_code(
        &self,
        conn: &dyn DumpExecutor,
        kinds: &[StoredCodeKind],
    ) -> Result<Vec<StoredCodeObject>, MetadataQueryError> {
        let mut objects = Vec::new();

        let mut prokinds = Vec::new();
        if kinds.contains(&StoredCodeKind::Function) {
            prokinds.push("'f'");
        }
        if kinds.contains(&StoredCodeKind::Procedure) {
            prokinds.push("'p'");
        }
        if !prokinds.is_empty() {
            const LABEL: &str = "routines";
            let sql = format!(
                "select p.proname::text as name,
       case p.prokind when 'p' then 'PROCEDURE' else 'FUNCTION' end as type,
       pg_catalog.pg_get_functiondef(p.oid) as body
  from pg_catalog.pg_proc p
  join pg_catalog.pg_namespace n on n.oid = p.pronamespace
 where n.nspname = {}
   and p.prokind in ({})
   and not exists (select 1 from pg_catalog.pg_depend d where d.objid = p.oid and d.deptype = 'e')
 order by type, p.proname",
                self.schema_literal(),
                prokinds.join(", ")
            );
            for row in run_query(conn, LABEL, &sql)? {
                let kind = if required(&row, LABEL, "type")? == "PROCEDURE" {
                    StoredCodeKind::Procedure
                } else {
                    StoredCodeKind::Function
                };
                objects.push(StoredCodeObject::new(
                    kind,
                    required(&row, LABEL, "name")?,
                    strip_create_prefix(required(&row, LABEL, "body")?),
                ));
            }
        }

        if kinds.contains(&StoredCodeKind::Trigger) {
            const LABEL: &str = "triggers";
            let sql = format!(
                "select tg.tgname::text as name, pg_catalog.pg_get_triggerdef(tg.oid) as body
  from pg_catalog.pg_trigger tg
  join pg_catalog.pg_class c on c.oid = tg.tgrelid
  join pg_catalog.pg_namespace n on n.oid = c.relnamespace
 where not tg.tgisinternal
   and tg.tgconstraint = 0
   and n.nspname = {}
 order by tg.tgname",
                self.schema_literal()
            );
            for row in run_query(conn, LABEL, &sql)? {
                objects.push(StoredCodeObject::new(
                    StoredCodeKind::Trigger,
                    required(&row, LABEL, "name")?,
                    strip_create_prefix(required(&row, LABEL, "body")?),
                ));
            }
        }

        if kinds.contains(&StoredCodeKind::View) {
            const LABEL: &str = "views";
            let sql = format!(
                "select viewname::text as view_name, definition::text as text
  from pg_catalog.pg_views
 where schemaname = {}
 order by viewname",
                self.schema_literal()
            );
            for row in run_query(conn, LABEL, &sql)? {
                objects.push(StoredCodeObject::new(
                    StoredCodeKind::View,
                    required(&row, LABEL, "view_name")?,
                    row.get("text").unwrap_or_default(),
                ));
            }
        }

        for kind in kinds {
            if matches!(
                kind,
                StoredCodeKind::Package
                    | StoredCodeKind::PackageBody
                    | StoredCodeKind::Type
                    | StoredCodeKind::TypeBody
            ) {
                log::debug!("No PostgreSQL counterpart for {} objects", kind);
            }
        }

        Ok(objects)
    }

    fn fetch_sequences(
        &self,
        conn: &dyn DumpExecutor,
    ) -> Result<Vec<SequenceMetadata>, MetadataQueryError> {
        const LABEL: &str = "sequences";
        let sql = format!(
            "select s.relname::text as sequence_name, sq.seqstart::text as start_value,
       sq.seqincrement::text as increment_by
  from pg_catalog.pg_sequence sq
  join pg_catalog.pg_class s on s.oid = sq.seqrelid
  join pg_catalog.pg_namespace n on n.oid = s.relnamespace
 where n.nspname = {}
   and not exists (select 1 from pg_catalog.pg_depend d where d.objid = s.oid and d.deptype = 'i')
 order by s.relname",
            self.schema_literal()
        );

        run_query(conn, LABEL, &sql)?
            .iter()
            .map(|row| {
                let mut sequence = SequenceMetadata::new(required(row, LABEL, "sequence_name")?);
                sequence.start_with = optional_integer(row, LABEL, "start_value")?;
                sequence.increment_by = optional_integer(row, LABEL, "increment_by")?;
                Ok(sequence)
            })
            .collect()
    }
}
