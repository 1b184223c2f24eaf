//! DDL Renderer
//!
//! Pure functions turning catalog metadata into dialect SQL text. Nothing here
//! touches a connection; the same input always renders the same string.
//!
//! Formats follow what the database itself reports back, for example
//! `CONSTRAINT PK_ID_TITLE PRIMARY KEY (ID,TITLE)` and
//! `id_plus number GENERATED ALWAYS AS (ID+2) VIRTUAL`.

use crate::config::DumpOptions;
use crate::dialect::Dialect;
use crate::metadata::{
    ColumnMetadata, ConstraintMetadata, IndexMetadata, SequenceMetadata, StoredCodeKind,
    StoredCodeObject, SynonymMetadata, TableMetadata,
};

/// `CONSTRAINT <NAME> PRIMARY KEY (<COL1,COL2>)`
pub fn render_primary_key(pk: &ConstraintMetadata, dialect: Dialect) -> String {
    format!(
        "CONSTRAINT {} PRIMARY KEY ({})",
        dialect.key_ident(&pk.name),
        key_columns(&pk.columns, dialect)
    )
}

/// ` CONSTRAINT <NAME> UNIQUE (<COL1,COL2>)`; the leading space is part of the
/// fragment because it is spliced into a table body.
pub fn render_unique_key(uk: &ConstraintMetadata, dialect: Dialect) -> String {
    format!(
        " CONSTRAINT {} UNIQUE ({})",
        dialect.key_ident(&uk.name),
        key_columns(&uk.columns, dialect)
    )
}

fn key_columns(columns: &[String], dialect: Dialect) -> String {
    columns
        .iter()
        .map(|c| dialect.key_ident(c))
        .collect::<Vec<_>>()
        .join(",")
}

/// `ALTER TABLE <table> ADD CONSTRAINT <name> FOREIGN KEY (<cols>) REFERENCES <ref>(<cols>);`
pub fn render_foreign_key(fk: &ConstraintMetadata, dialect: Dialect) -> String {
    let idents = |names: &[String]| {
        names
            .iter()
            .map(|n| dialect.display_ident(n))
            .collect::<Vec<_>>()
            .join(", ")
    };
    let referenced_table = fk.referenced_table.as_deref().unwrap_or_default();

    let mut sql = format!(
        "ALTER TABLE {} ADD CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {}({})",
        fk.table,
        dialect.display_ident(&fk.name),
        idents(&fk.columns),
        dialect.display_ident(referenced_table),
        idents(&fk.referenced_columns)
    );
    if let Some(action) = fk.on_delete {
        sql.push_str(" ON DELETE ");
        sql.push_str(action.as_sql());
    }
    sql.push(';');
    sql
}

/// `create [unique] index <name> on <table> (<cols>)`
pub fn render_index(index: &IndexMetadata, dialect: Dialect, options: &DumpOptions) -> String {
    let kind = if index.unique {
        "unique "
    } else if options.legacy_index_spacing {
        " "
    } else {
        ""
    };
    let columns = index
        .columns
        .iter()
        .map(|c| dialect.display_ident(c))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "create {}index {} on {} ({})",
        kind,
        dialect.display_ident(&index.name),
        dialect.display_ident(&index.table),
        columns
    )
}

/// Declared type of a column, e.g. `number(38,0)` or `varchar2(255)`.
pub fn render_column_type(column: &ColumnMetadata, dialect: Dialect) -> String {
    match dialect {
        Dialect::Oracle => {
            let base = column.data_type.to_uppercase();
            let mut ty = column.data_type.to_lowercase();
            if base == "NUMBER" {
                if let Some(precision) = column.precision {
                    ty.push_str(&format!("({precision}"));
                    if let Some(scale) = column.scale {
                        ty.push_str(&format!(",{scale}"));
                    }
                    ty.push(')');
                }
            } else if base.contains("CHAR") {
                if let Some(length) = column.length {
                    ty.push_str(&format!("({length})"));
                }
            }
            ty
        }
        Dialect::Postgres => column.data_type.clone(),
    }
}

fn column_name(column: &ColumnMetadata, dialect: Dialect) -> String {
    match dialect {
        Dialect::Oracle => column.name.to_lowercase(),
        Dialect::Postgres => column.name.clone(),
    }
}

/// `<name> <type>[ default <expr> | GENERATED ... AS IDENTITY][ not null]`
///
/// Virtual columns are delegated to [`render_virtual_column`].
pub fn render_column(column: &ColumnMetadata, dialect: Dialect) -> String {
    if column.is_virtual() {
        return render_virtual_column(column, dialect);
    }

    let mut col = format!(
        "{} {}",
        column_name(column, dialect),
        render_column_type(column, dialect)
    );
    if let Some(identity) = column.identity {
        col.push(' ');
        col.push_str(identity.as_sql());
    } else if let Some(default) = column.default.as_deref().map(str::trim) {
        if !default.is_empty() {
            col.push_str(" default ");
            col.push_str(default);
        }
    }
    if !column.nullable {
        col.push_str(" not null");
    }
    col
}

/// `<name> <type> GENERATED ALWAYS AS (<expr>) VIRTUAL`
pub fn render_virtual_column(column: &ColumnMetadata, dialect: Dialect) -> String {
    let expression = column
        .generation_expression
        .as_deref()
        .map(normalize_expression)
        .unwrap_or_default();

    format!(
        "{} {} GENERATED ALWAYS AS ({}) {}",
        column_name(column, dialect),
        render_column_type(column, dialect),
        expression,
        dialect.virtual_keyword()
    )
}

fn is_operator(c: char) -> bool {
    matches!(
        c,
        '+' | '-' | '*' | '/' | '|' | '=' | '<' | '>' | '!' | '(' | ')' | ','
    )
}

/// Normalize a generation expression to the catalog's compact form.
///
/// Double quotes around identifiers are dropped, whitespace next to operators
/// and parentheses is removed, other whitespace runs collapse to one space.
/// String literals are copied untouched.
///
/// ```
/// use schemadump::render::normalize_expression;
///
/// assert_eq!(normalize_expression("\"ID\" + 2"), "ID+2");
/// assert_eq!(normalize_expression("upper( name ) || ' x '"), "upper(name)||' x '");
/// ```
pub fn normalize_expression(expression: &str) -> String {
    let mut out = String::with_capacity(expression.len());
    let mut in_literal = false;
    let mut pending_space = false;

    for ch in expression.chars() {
        if in_literal {
            out.push(ch);
            if ch == '\'' {
                in_literal = false;
            }
            continue;
        }
        match ch {
            '"' => {}
            c if c.is_whitespace() => pending_space = true,
            c if is_operator(c) => {
                pending_space = false;
                out.push(c);
            }
            c => {
                if pending_space && !out.is_empty() && !out.ends_with(is_operator) {
                    out.push(' ');
                }
                pending_space = false;
                if c == '\'' {
                    in_literal = true;
                }
                out.push(c);
            }
        }
    }
    out
}

/// `create or replace <KIND> <NAME> ...` followed by the stored body.
///
/// The body is kept verbatim apart from trailing whitespace. Views are stored
/// as their query text only and get the `view <name> as` header.
pub fn render_stored_code(object: &StoredCodeObject, dialect: Dialect) -> String {
    if object.kind == StoredCodeKind::View {
        return format!(
            "create or replace view {} as\n {}",
            object.name,
            object.body.trim()
        );
    }

    let body = object.body.trim_end();
    let mut ddl = String::from("create or replace ");
    if !starts_with_keyword(body.trim_start(), object.kind.keyword()) {
        ddl.push_str(object.kind.keyword());
        ddl.push(' ');
        ddl.push_str(&object.name);
        ddl.push(' ');
    }
    ddl.push_str(body.trim_start());

    if dialect == Dialect::Oracle && !ddl.ends_with(';') {
        ddl.push(';');
    }
    ddl
}

fn starts_with_keyword(body: &str, keyword: &str) -> bool {
    body.len() >= keyword.len()
        && body.is_char_boundary(keyword.len())
        && body[..keyword.len()].eq_ignore_ascii_case(keyword)
}

/// `create sequence <name>[ start with <n>][ increment by <n>]`
pub fn render_sequence(sequence: &SequenceMetadata) -> String {
    let mut sql = format!("create sequence {}", sequence.name);
    if let Some(start) = sequence.start_with {
        sql.push_str(&format!(" start with {start}"));
    }
    if let Some(increment) = sequence.increment_by.filter(|i| *i != 1) {
        sql.push_str(&format!(" increment by {increment}"));
    }
    sql
}

/// `create or replace synonym <name> for [<owner>.]<object>`
pub fn render_synonym(synonym: &SynonymMetadata) -> String {
    match &synonym.target_owner {
        Some(owner) => format!(
            "create or replace synonym {} for {}.{}",
            synonym.name, owner, synonym.target_name
        ),
        None => format!(
            "create or replace synonym {} for {}",
            synonym.name, synonym.target_name
        ),
    }
}

/// Full `create table` statement with the primary key and unique keys inline.
///
/// ```text
/// create table TEST_POSTS (
///  id number(38,0) not null,
///  title varchar2(255),
///  CONSTRAINT SYS_C0014 PRIMARY KEY (ID),
///  CONSTRAINT UK_FOO_FOO_ID UNIQUE (FOO,FOO_ID)
/// )
/// ```
pub fn render_table(
    table: &TableMetadata,
    primary_key: Option<&ConstraintMetadata>,
    unique_keys: &[ConstraintMetadata],
    dialect: Dialect,
) -> String {
    let mut ddl = format!(
        "create {}table {} (\n ",
        if table.temporary {
            dialect.temporary_keyword()
        } else {
            ""
        },
        table.name
    );
    let columns: Vec<String> = table
        .columns
        .iter()
        .map(|c| render_column(c, dialect))
        .collect();
    ddl.push_str(&columns.join(",\n "));

    if let Some(pk) = primary_key {
        ddl.push_str(",\n ");
        ddl.push_str(&render_primary_key(pk, dialect));
    }
    for uk in unique_keys {
        ddl.push_str(",\n");
        ddl.push_str(&render_unique_key(uk, dialect));
    }
    ddl.push_str("\n)");
    ddl
}

pub fn render_drop_sequence(name: &str) -> String {
    format!("drop sequence {name};")
}

pub fn render_drop_table(name: &str, dialect: Dialect) -> String {
    format!("drop table {} {};", name, dialect.cascade_clause())
}

/// `drop <kind> <name>;` for views, synonyms and stored code.
pub fn render_drop_object(kind: &str, name: &str, dialect: Dialect) -> String {
    match (dialect, kind.to_ascii_lowercase().as_str()) {
        (Dialect::Oracle, "type") => format!("drop type {name} force;"),
        (Dialect::Postgres, "view" | "function" | "procedure") => {
            format!("drop {} if exists {} cascade;", kind.to_ascii_lowercase(), name)
        }
        (_, k) => format!("drop {k} {name};"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{IdentityGeneration, ReferentialAction};

    #[test]
    fn test_render_single_primary_key() {
        let pk = ConstraintMetadata::primary_key("TEST_POSTS", "SYS_C0014", &["ID"]);
        assert_eq!(
            render_primary_key(&pk, Dialect::Oracle),
            "CONSTRAINT SYS_C0014 PRIMARY KEY (ID)"
        );
    }

    #[test]
    fn test_render_composite_primary_key_keeps_declared_order() {
        let pk = ConstraintMetadata::primary_key("test_posts", "pk_id_title", &["title", "id"]);
        assert_eq!(
            render_primary_key(&pk, Dialect::Oracle),
            "CONSTRAINT PK_ID_TITLE PRIMARY KEY (TITLE,ID)"
        );
        assert_eq!(
            render_primary_key(&pk, Dialect::Postgres),
            "CONSTRAINT pk_id_title PRIMARY KEY (title,id)"
        );
    }

    #[test]
    fn test_render_unique_key_has_leading_space() {
        let uk = ConstraintMetadata::unique("TEST_POSTS", "UK_FOO_FOO_ID", &["FOO", "FOO_ID"]);
        assert_eq!(
            render_unique_key(&uk, Dialect::Oracle),
            " CONSTRAINT UK_FOO_FOO_ID UNIQUE (FOO,FOO_ID)"
        );
    }

    #[test]
    fn test_render_foreign_key() {
        let fk = ConstraintMetadata::foreign_key(
            "TEST_POSTS",
            "FK_TEST_POST_FOO",
            &["FOO_ID"],
            "FOOS",
            &["ID"],
        );
        assert_eq!(
            render_foreign_key(&fk, Dialect::Oracle),
            "ALTER TABLE TEST_POSTS ADD CONSTRAINT fk_test_post_foo FOREIGN KEY (foo_id) REFERENCES foos(id);"
        );
    }

    #[test]
    fn test_render_foreign_key_with_delete_rule() {
        let fk = ConstraintMetadata::foreign_key(
            "orders",
            "orders_customer_fk",
            &["customer_id", "region"],
            "customers",
            &["id", "region"],
        )
        .on_delete(ReferentialAction::Cascade);
        assert_eq!(
            render_foreign_key(&fk, Dialect::Postgres),
            "ALTER TABLE orders ADD CONSTRAINT orders_customer_fk FOREIGN KEY (customer_id, region) REFERENCES customers(id, region) ON DELETE CASCADE;"
        );
    }

    #[test]
    fn test_render_index_spacing() {
        let plain = IndexMetadata::new("IX_TEST_POSTS_FOO", "TEST_POSTS", &["FOO"]);
        let unique = IndexMetadata::new("IX_TEST_POSTS_FOO_ID", "TEST_POSTS", &["FOO_ID"]).unique();
        let options = DumpOptions::default();
        let legacy = DumpOptions::default().legacy_index_spacing(true);

        assert_eq!(
            render_index(&plain, Dialect::Oracle, &options),
            "create index ix_test_posts_foo on test_posts (foo)"
        );
        assert_eq!(
            render_index(&plain, Dialect::Oracle, &legacy),
            "create  index ix_test_posts_foo on test_posts (foo)"
        );
        assert_eq!(
            render_index(&unique, Dialect::Oracle, &legacy),
            "create unique index ix_test_posts_foo_id on test_posts (foo_id)"
        );
    }

    #[test]
    fn test_render_oracle_columns() {
        let id = ColumnMetadata::new("ID", "NUMBER").precision(38, Some(0)).not_null();
        let title = ColumnMetadata::new("TITLE", "VARCHAR2").length(255);
        let amount = ColumnMetadata::new("AMOUNT", "NUMBER");
        let created = ColumnMetadata::new("CREATED_AT", "DATE").default_expr("sysdate \n");

        assert_eq!(render_column(&id, Dialect::Oracle), "id number(38,0) not null");
        assert_eq!(render_column(&title, Dialect::Oracle), "title varchar2(255)");
        assert_eq!(render_column(&amount, Dialect::Oracle), "amount number");
        assert_eq!(render_column(&created, Dialect::Oracle), "created_at date default sysdate");
    }

    #[test]
    fn test_render_identity_column_drops_sequence_default() {
        let pg = ColumnMetadata::new("id", "integer")
            .not_null()
            .identity(IdentityGeneration::Always);
        assert_eq!(
            render_column(&pg, Dialect::Postgres),
            "id integer GENERATED ALWAYS AS IDENTITY not null"
        );

        let ora = ColumnMetadata::new("ID", "NUMBER")
            .precision(38, Some(0))
            .default_expr("\"BLOG\".\"ISEQ$$_73514\".nextval")
            .not_null()
            .identity(IdentityGeneration::ByDefault);
        assert_eq!(
            render_column(&ora, Dialect::Oracle),
            "id number(38,0) GENERATED BY DEFAULT AS IDENTITY not null"
        );
    }

    #[test]
    fn test_render_virtual_column() {
        let column = ColumnMetadata::new("ID_PLUS", "NUMBER").generated_as("\"ID\"+2");
        assert_eq!(
            render_virtual_column(&column, Dialect::Oracle),
            "id_plus number GENERATED ALWAYS AS (ID+2) VIRTUAL"
        );
        // render_column delegates
        assert_eq!(render_column(&column, Dialect::Oracle), render_virtual_column(&column, Dialect::Oracle));

        let pg = ColumnMetadata::new("id_plus", "integer").generated_as("(id + 2)");
        assert_eq!(
            render_virtual_column(&pg, Dialect::Postgres),
            "id_plus integer GENERATED ALWAYS AS ((id+2)) STORED"
        );
    }

    #[test]
    fn test_normalize_expression() {
        assert_eq!(normalize_expression("id + 2"), "id+2");
        assert_eq!(normalize_expression("  \"A\"  *  ( \"B\" - 1 ) "), "A*(B-1)");
        assert_eq!(
            normalize_expression("CASE WHEN \"A\" > 1 THEN 'x  y' ELSE 'it''s' END"),
            "CASE WHEN A>1 THEN 'x  y' ELSE 'it''s' END"
        );
        assert_eq!(normalize_expression("\"FIRST\" || ', ' || \"LAST\""), "FIRST||', '||LAST");
    }

    #[test]
    fn test_render_stored_code_verbatim() {
        let trigger = StoredCodeObject::new(
            StoredCodeKind::Trigger,
            "TEST_POST_TRIGGER",
            "TRIGGER TEST_POST_TRIGGER\n  BEFORE INSERT\n  ON TEST_POSTS\n  FOR EACH ROW\nBEGIN\n  SELECT 'bar' INTO :new.FOO FROM DUAL;\nEND;\n",
        );
        let ddl = render_stored_code(&trigger, Dialect::Oracle);
        assert!(ddl.starts_with("create or replace TRIGGER TEST_POST_TRIGGER\n  BEFORE INSERT"));
        assert!(ddl.ends_with("END;"));

        let ty = StoredCodeObject::new(StoredCodeKind::Type, "TEST_TYPE", "TYPE TEST_TYPE AS TABLE OF VARCHAR2(10)");
        assert_eq!(
            render_stored_code(&ty, Dialect::Oracle),
            "create or replace TYPE TEST_TYPE AS TABLE OF VARCHAR2(10);"
        );
    }

    #[test]
    fn test_render_stored_code_without_header() {
        let proc = StoredCodeObject::new(StoredCodeKind::Procedure, "NOOP", "IS BEGIN NULL; END;");
        assert_eq!(
            render_stored_code(&proc, Dialect::Oracle),
            "create or replace PROCEDURE NOOP IS BEGIN NULL; END;"
        );

        let view = StoredCodeObject::new(StoredCodeKind::View, "ACTIVE_POSTS", "select * from test_posts");
        assert_eq!(
            render_stored_code(&view, Dialect::Oracle),
            "create or replace view ACTIVE_POSTS as\n select * from test_posts"
        );
    }

    #[test]
    fn test_render_table() {
        let table = TableMetadata::new("TEST_POSTS")
            .column(ColumnMetadata::new("ID", "NUMBER").precision(38, Some(0)).not_null())
            .column(ColumnMetadata::new("FOO", "VARCHAR2").length(255))
            .column(ColumnMetadata::new("FOO_ID", "NUMBER").precision(38, Some(0)));
        let pk = ConstraintMetadata::primary_key("TEST_POSTS", "SYS_C0014", &["ID"]);
        let uk = ConstraintMetadata::unique("TEST_POSTS", "UK_FOO_FOO_ID", &["FOO", "FOO_ID"]);

        assert_eq!(
            render_table(&table, Some(&pk), &[uk], Dialect::Oracle),
            "create table TEST_POSTS (\n id number(38,0) not null,\n foo varchar2(255),\n foo_id number(38,0),\n CONSTRAINT SYS_C0014 PRIMARY KEY (ID),\n CONSTRAINT UK_FOO_FOO_ID UNIQUE (FOO,FOO_ID)\n)"
        );

        let temp = TableMetadata::new("SESSION_ROWS")
            .temporary()
            .column(ColumnMetadata::new("ID", "NUMBER"));
        assert_eq!(
            render_table(&temp, None, &[], Dialect::Oracle),
            "create global temporary table SESSION_ROWS (\n id number\n)"
        );
    }

    #[test]
    fn test_render_sequences_synonyms_and_drops() {
        let mut seq = SequenceMetadata::new("TEST_POSTS_SEQ");
        assert_eq!(render_sequence(&seq), "create sequence TEST_POSTS_SEQ");
        seq.start_with = Some(10000);
        seq.increment_by = Some(1);
        assert_eq!(render_sequence(&seq), "create sequence TEST_POSTS_SEQ start with 10000");

        let synonym = SynonymMetadata {
            name: "POSTS".into(),
            target_owner: Some("BLOG".into()),
            target_name: "TEST_POSTS".into(),
        };
        assert_eq!(render_synonym(&synonym), "create or replace synonym POSTS for BLOG.TEST_POSTS");

        assert_eq!(render_drop_sequence("S"), "drop sequence S;");
        assert_eq!(render_drop_table("T", Dialect::Oracle), "drop table T cascade constraints;");
        assert_eq!(render_drop_table("t", Dialect::Postgres), "drop table t cascade;");
        assert_eq!(render_drop_object("TYPE", "TEST_TYPE", Dialect::Oracle), "drop type TEST_TYPE force;");
        assert_eq!(render_drop_object("package", "PKG", Dialect::Oracle), "drop package PKG;");
        assert_eq!(
            render_drop_object("view", "active_posts", Dialect::Postgres),
            "drop view if exists active_posts cascade;"
        );
    }
}
