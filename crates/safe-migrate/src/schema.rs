//! Schema vocabulary shared by operations, the dialect, and the inspector.
//!
//! These are plain value objects: column types, default values, the
//! per-operation option structs, and `TableDefinition` (the data form of
//! the column block attached to a `create_table`).

use serde::{Deserialize, Serialize};

/// SQL data types supported by the migration engine.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SqlType {
    /// Integer (32-bit).
    Integer,
    /// Big integer (64-bit).
    BigInt,
    /// Unbounded text.
    Text,
    /// Variable-length character string.
    Varchar(usize),
    /// Boolean.
    Boolean,
    /// Date and time.
    DateTime,
    /// Date only.
    Date,
    /// Floating point (double precision).
    Double,
    /// Decimal with precision and scale.
    Decimal(u8, u8),
    /// Binary large object.
    Blob,
    /// JSON data.
    Json,
}

/// Default value for a column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub enum DefaultValue {
    /// No default value.
    #[default]
    None,
    /// NULL default.
    Null,
    /// Boolean default.
    Bool(bool),
    /// Integer default.
    Integer(i64),
    /// Float default.
    Float(f64),
    /// String default.
    String(String),
    /// SQL expression (e.g., "CURRENT_TIMESTAMP").
    Expression(String),
}

impl DefaultValue {
    /// Returns the SQL representation of this default value.
    #[must_use]
    pub fn to_sql(&self) -> Option<String> {
        match self {
            Self::None => None,
            Self::Null => Some("NULL".to_string()),
            Self::Bool(b) => Some(if *b { "1" } else { "0" }.to_string()),
            Self::Integer(i) => Some(i.to_string()),
            Self::Float(f) => Some(f.to_string()),
            Self::String(s) => Some(format!("'{}'", s.replace('\'', "''"))),
            Self::Expression(expr) => Some(expr.clone()),
        }
    }
}

/// Options for an added or altered column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnOptions {
    /// Whether the column allows NULL values.
    pub null: bool,
    /// Default value.
    pub default: DefaultValue,
    /// Whether the column carries a UNIQUE constraint.
    pub unique: bool,
}

impl Default for ColumnOptions {
    fn default() -> Self {
        Self {
            null: true,
            default: DefaultValue::None,
            unique: false,
        }
    }
}

impl ColumnOptions {
    /// Creates default column options (nullable, no default).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks the column NOT NULL.
    #[must_use]
    pub fn not_null(mut self) -> Self {
        self.null = false;
        self
    }

    /// Sets the default value.
    #[must_use]
    pub fn default_value(mut self, default: DefaultValue) -> Self {
        self.default = default;
        self
    }

    /// Adds a UNIQUE constraint.
    #[must_use]
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }
}

/// Options for an added or removed index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct IndexOptions {
    /// Whether this is a unique index.
    pub unique: bool,
    /// Explicit index name. Defaults to `index_<table>_on_<columns>`.
    pub name: Option<String>,
}

impl IndexOptions {
    /// Creates default index options (non-unique, derived name).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes this a unique index.
    #[must_use]
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Sets an explicit index name.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Resolves the index name for the given table and column set.
    #[must_use]
    pub fn name_for(&self, table: &str, columns: &[String]) -> String {
        self.name.clone().unwrap_or_else(|| {
            format!("index_{}_on_{}", table, columns.join("_and_"))
        })
    }
}

/// Options for an added or removed foreign key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ForeignKeyOptions {
    /// Referencing column in the from-table. Defaults to
    /// `<to_table singular>_id`.
    pub column: Option<String>,
    /// Explicit constraint name.
    pub name: Option<String>,
}

impl ForeignKeyOptions {
    /// Creates default foreign key options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the referencing column.
    #[must_use]
    pub fn column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }

    /// Sets the constraint name.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Resolves the referencing column for the given target table.
    #[must_use]
    pub fn column_for(&self, to_table: &str) -> String {
        self.column.clone().unwrap_or_else(|| {
            let singular = to_table.strip_suffix('s').unwrap_or(to_table);
            format!("{singular}_id")
        })
    }
}

/// Options for an added or removed reference column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceOptions {
    /// Whether to index the reference column.
    pub index: bool,
}

impl Default for ReferenceOptions {
    fn default() -> Self {
        Self { index: true }
    }
}

impl ReferenceOptions {
    /// Creates default reference options (indexed).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Skips the index on the reference column.
    #[must_use]
    pub fn without_index(mut self) -> Self {
        self.index = false;
        self
    }
}

/// Returns the column name backing a reference (`<name>_id`).
#[must_use]
pub fn reference_column(reference: &str) -> String {
    format!("{reference}_id")
}

/// A column declaration inside a [`TableDefinition`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDecl {
    /// Column name.
    pub name: String,
    /// SQL data type.
    pub sql_type: SqlType,
    /// Column options.
    pub options: ColumnOptions,
}

/// Data form of the column block attached to a `create_table` operation.
///
/// Built with Rails-flavoured helpers:
///
/// ```rust
/// use safe_migrate::schema::TableDefinition;
///
/// let users = TableDefinition::new()
///     .string("name")
///     .string("email")
///     .timestamps();
/// assert_eq!(users.columns.len(), 4);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableDefinition {
    /// Whether the table gets an implicit auto-incrementing `id` primary key.
    pub id: bool,
    /// Ordered column declarations.
    pub columns: Vec<ColumnDecl>,
}

impl Default for TableDefinition {
    fn default() -> Self {
        Self {
            id: true,
            columns: Vec::new(),
        }
    }
}

impl TableDefinition {
    /// Creates an empty definition with an implicit `id` primary key.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops the implicit `id` primary key.
    #[must_use]
    pub fn without_id(mut self) -> Self {
        self.id = false;
        self
    }

    /// Declares a column with explicit type and options.
    #[must_use]
    pub fn column(
        mut self,
        name: impl Into<String>,
        sql_type: SqlType,
        options: ColumnOptions,
    ) -> Self {
        self.columns.push(ColumnDecl {
            name: name.into(),
            sql_type,
            options,
        });
        self
    }

    /// Declares a string column.
    #[must_use]
    pub fn string(self, name: impl Into<String>) -> Self {
        self.column(name, SqlType::Varchar(255), ColumnOptions::default())
    }

    /// Declares a text column.
    #[must_use]
    pub fn text(self, name: impl Into<String>) -> Self {
        self.column(name, SqlType::Text, ColumnOptions::default())
    }

    /// Declares an integer column.
    #[must_use]
    pub fn integer(self, name: impl Into<String>) -> Self {
        self.column(name, SqlType::Integer, ColumnOptions::default())
    }

    /// Declares a big integer column.
    #[must_use]
    pub fn bigint(self, name: impl Into<String>) -> Self {
        self.column(name, SqlType::BigInt, ColumnOptions::default())
    }

    /// Declares a boolean column.
    #[must_use]
    pub fn boolean(self, name: impl Into<String>) -> Self {
        self.column(name, SqlType::Boolean, ColumnOptions::default())
    }

    /// Declares a datetime column.
    #[must_use]
    pub fn datetime(self, name: impl Into<String>) -> Self {
        self.column(name, SqlType::DateTime, ColumnOptions::default())
    }

    /// Declares `created_at` and `updated_at` datetime columns.
    #[must_use]
    pub fn timestamps(self) -> Self {
        self.column(
            "created_at",
            SqlType::DateTime,
            ColumnOptions::new()
                .not_null()
                .default_value(DefaultValue::Expression("CURRENT_TIMESTAMP".into())),
        )
        .column(
            "updated_at",
            SqlType::DateTime,
            ColumnOptions::new()
                .not_null()
                .default_value(DefaultValue::Expression("CURRENT_TIMESTAMP".into())),
        )
    }
}
