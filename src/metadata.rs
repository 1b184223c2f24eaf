//! Structural read models fetched from a database catalog.
//!
//! Every value here is built by a single catalog call, handed to the renderer and
//! dropped with the dump that asked for it. Nothing is cached between calls.

use serde::Deserialize;
use std::fmt;

/// A table and its columns in catalog order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableMetadata {
    pub name: String,
    /// Oracle `GLOBAL TEMPORARY` table
    pub temporary: bool,
    pub columns: Vec<ColumnMetadata>,
}

impl TableMetadata {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            temporary: false,
            columns: Vec::new(),
        }
    }

    pub fn column(mut self, column: ColumnMetadata) -> Self {
        self.columns.push(column);
        self
    }

    pub fn temporary(mut self) -> Self {
        self.temporary = true;
        self
    }

    pub fn virtual_columns(&self) -> impl Iterator<Item = &ColumnMetadata> {
        self.columns.iter().filter(|c| c.is_virtual())
    }
}

/// A single column definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMetadata {
    pub name: String,
    /// Base type as the catalog reports it (`NUMBER`, `VARCHAR2`, `character varying(40)`)
    pub data_type: String,
    pub precision: Option<u32>,
    pub scale: Option<i32>,
    /// Declared length of character types (characters or bytes, as declared)
    pub length: Option<u32>,
    pub nullable: bool,
    pub default: Option<String>,
    /// Expression of a virtual / generated column
    pub generation_expression: Option<String>,
    /// Set for identity columns; their backing sequence is never dumped
    pub identity: Option<IdentityGeneration>,
}

impl ColumnMetadata {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            precision: None,
            scale: None,
            length: None,
            nullable: true,
            default: None,
            generation_expression: None,
            identity: None,
        }
    }

    pub fn precision(mut self, precision: u32, scale: Option<i32>) -> Self {
        self.precision = Some(precision);
        self.scale = scale;
        self
    }

    pub fn length(mut self, length: u32) -> Self {
        self.length = Some(length);
        self
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn default_expr(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn generated_as(mut self, expression: impl Into<String>) -> Self {
        self.generation_expression = Some(expression.into());
        self
    }

    pub fn identity(mut self, generation: IdentityGeneration) -> Self {
        self.identity = Some(generation);
        self
    }

    pub fn is_virtual(&self) -> bool {
        self.generation_expression.is_some()
    }
}

/// `GENERATED ALWAYS` or `GENERATED BY DEFAULT` of an identity column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityGeneration {
    Always,
    ByDefault,
}

impl IdentityGeneration {
    /// Parse `ALWAYS` / `BY DEFAULT` (Oracle `GENERATION_TYPE`) or the
    /// PostgreSQL `attidentity` codes `a` / `d`. Anything else is not an identity.
    pub fn from_catalog(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "ALWAYS" | "A" => Some(IdentityGeneration::Always),
            "BY DEFAULT" | "D" => Some(IdentityGeneration::ByDefault),
            _ => None,
        }
    }

    pub fn as_sql(self) -> &'static str {
        match self {
            IdentityGeneration::Always => "GENERATED ALWAYS AS IDENTITY",
            IdentityGeneration::ByDefault => "GENERATED BY DEFAULT AS IDENTITY",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConstraintKind {
    PrimaryKey,
    ForeignKey,
    Unique,
}

impl ConstraintKind {
    /// Oracle `USER_CONSTRAINTS.CONSTRAINT_TYPE` code
    pub fn oracle_code(self) -> &'static str {
        match self {
            ConstraintKind::PrimaryKey => "P",
            ConstraintKind::ForeignKey => "R",
            ConstraintKind::Unique => "U",
        }
    }

    /// PostgreSQL `pg_constraint.contype` code
    pub fn postgres_code(self) -> &'static str {
        match self {
            ConstraintKind::PrimaryKey => "p",
            ConstraintKind::ForeignKey => "f",
            ConstraintKind::Unique => "u",
        }
    }
}

/// `ON DELETE` behaviour of a foreign key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferentialAction {
    Cascade,
    SetNull,
    SetDefault,
    Restrict,
}

impl ReferentialAction {
    /// Parse a catalog delete rule. `NO ACTION` (the default) maps to `None`.
    pub fn from_catalog(rule: &str) -> Option<Self> {
        match rule.trim().to_ascii_uppercase().replace('_', " ").as_str() {
            "CASCADE" | "C" => Some(ReferentialAction::Cascade),
            "SET NULL" | "N" => Some(ReferentialAction::SetNull),
            "SET DEFAULT" | "D" => Some(ReferentialAction::SetDefault),
            "RESTRICT" | "R" => Some(ReferentialAction::Restrict),
            _ => None,
        }
    }

    pub fn as_sql(self) -> &'static str {
        match self {
            ReferentialAction::Cascade => "CASCADE",
            ReferentialAction::SetNull => "SET NULL",
            ReferentialAction::SetDefault => "SET DEFAULT",
            ReferentialAction::Restrict => "RESTRICT",
        }
    }
}

/// A primary, foreign or unique key.
///
/// `columns` is in declaration order (catalog position), never sorted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstraintMetadata {
    pub kind: ConstraintKind,
    pub table: String,
    pub name: String,
    pub columns: Vec<String>,
    pub referenced_table: Option<String>,
    pub referenced_columns: Vec<String>,
    pub on_delete: Option<ReferentialAction>,
}

impl ConstraintMetadata {
    pub fn new(
        kind: ConstraintKind,
        table: impl Into<String>,
        name: impl Into<String>,
        columns: Vec<String>,
    ) -> Self {
        Self {
            kind,
            table: table.into(),
            name: name.into(),
            columns,
            referenced_table: None,
            referenced_columns: Vec::new(),
            on_delete: None,
        }
    }

    pub fn primary_key(table: impl Into<String>, name: impl Into<String>, columns: &[&str]) -> Self {
        Self::new(ConstraintKind::PrimaryKey, table, name, to_owned(columns))
    }

    pub fn unique(table: impl Into<String>, name: impl Into<String>, columns: &[&str]) -> Self {
        Self::new(ConstraintKind::Unique, table, name, to_owned(columns))
    }

    pub fn foreign_key(
        table: impl Into<String>,
        name: impl Into<String>,
        columns: &[&str],
        referenced_table: impl Into<String>,
        referenced_columns: &[&str],
    ) -> Self {
        let mut fk = Self::new(ConstraintKind::ForeignKey, table, name, to_owned(columns));
        fk.referenced_table = Some(referenced_table.into());
        fk.referenced_columns = to_owned(referenced_columns);
        fk
    }

    pub fn on_delete(mut self, action: ReferentialAction) -> Self {
        self.on_delete = Some(action);
        self
    }
}

fn to_owned(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| n.to_string()).collect()
}

/// An index, flagged when it only exists to back a PRIMARY KEY or UNIQUE constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexMetadata {
    pub name: String,
    pub table: String,
    pub columns: Vec<String>,
    pub unique: bool,
    pub constraint_backed: bool,
}

impl IndexMetadata {
    pub fn new(name: impl Into<String>, table: impl Into<String>, columns: &[&str]) -> Self {
        Self {
            name: name.into(),
            table: table.into(),
            columns: to_owned(columns),
            unique: false,
            constraint_backed: false,
        }
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn backing_constraint(mut self) -> Self {
        self.constraint_backed = true;
        self
    }
}

/// Kinds of database-resident code the dump can reproduce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(try_from = "String")]
pub enum StoredCodeKind {
    Procedure,
    Function,
    Package,
    PackageBody,
    Trigger,
    Type,
    TypeBody,
    View,
}

impl StoredCodeKind {
    pub const ALL: [StoredCodeKind; 8] = [
        StoredCodeKind::Procedure,
        StoredCodeKind::Function,
        StoredCodeKind::Package,
        StoredCodeKind::PackageBody,
        StoredCodeKind::Trigger,
        StoredCodeKind::Type,
        StoredCodeKind::TypeBody,
        StoredCodeKind::View,
    ];

    /// Keyword as it appears in `ALL_SOURCE.TYPE` and in DDL
    pub fn keyword(self) -> &'static str {
        match self {
            StoredCodeKind::Procedure => "PROCEDURE",
            StoredCodeKind::Function => "FUNCTION",
            StoredCodeKind::Package => "PACKAGE",
            StoredCodeKind::PackageBody => "PACKAGE BODY",
            StoredCodeKind::Trigger => "TRIGGER",
            StoredCodeKind::Type => "TYPE",
            StoredCodeKind::TypeBody => "TYPE BODY",
            StoredCodeKind::View => "VIEW",
        }
    }

    pub fn from_keyword(keyword: &str) -> Option<Self> {
        let normalized = keyword
            .trim()
            .to_ascii_uppercase()
            .replace(['_', '-'], " ");
        Self::ALL.into_iter().find(|k| k.keyword() == normalized)
    }
}

impl fmt::Display for StoredCodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

impl TryFrom<String> for StoredCodeKind {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl std::str::FromStr for StoredCodeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_keyword(s).ok_or_else(|| format!("unknown stored code kind '{s}'"))
    }
}

/// Source text of a trigger, type, package, procedure, function or view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredCodeObject {
    pub kind: StoredCodeKind,
    pub name: String,
    /// Body exactly as the database keeps it
    pub body: String,
}

impl StoredCodeObject {
    pub fn new(kind: StoredCodeKind, name: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            body: body.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceMetadata {
    pub name: String,
    pub start_with: Option<i64>,
    pub increment_by: Option<i64>,
}

impl SequenceMetadata {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            start_with: None,
            increment_by: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynonymMetadata {
    pub name: String,
    pub target_owner: Option<String>,
    pub target_name: String,
}
