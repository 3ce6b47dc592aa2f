//! Schema metadata types: column descriptors, field containers, and row snapshots.
//!
//! These types provide a dialect-agnostic representation of table schemas.
//! A [`ColumnDescriptor`] is immutable once fetched from a catalog; a
//! [`RowData`] is one physical row resolved against a single table snapshot.

use serde::{Deserialize, Serialize};

use crate::core::value::SqlValue;

/// Closed semantic-type enumeration driving both literal formatting and
/// row-value scanning. Driver type names map into this set once, at
/// introspection time; downstream code never dispatches on raw type strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SemanticType {
    String,
    Int,
    Float,
    Decimal,
    Time,
    Binary,
    Json,
    Bit,
    Bool,
    Uuid,
}

impl SemanticType {
    /// Map a driver-reported type name to a semantic type.
    ///
    /// Covers the MySQL and PostgreSQL information_schema vocabularies.
    /// Unknown names fall back to `String`, matching how loosely-typed
    /// drivers hand back anything they cannot classify.
    pub fn from_origin(origin: &str) -> Self {
        let t = origin.to_lowercase();
        // Strip display width / precision suffixes like "int(11)" or "decimal(10,2)"
        let base = t.split('(').next().unwrap_or(&t).trim();
        match base {
            "tinyint" | "smallint" | "mediumint" | "int" | "integer" | "bigint" | "serial"
            | "bigserial" | "year" => SemanticType::Int,
            "float" | "double" | "real" | "double precision" => SemanticType::Float,
            "decimal" | "numeric" | "money" => SemanticType::Decimal,
            "datetime" | "timestamp" | "date" | "time" | "timestamptz"
            | "timestamp with time zone" | "timestamp without time zone" => SemanticType::Time,
            "binary" | "varbinary" | "blob" | "tinyblob" | "mediumblob" | "longblob" | "bytea" => {
                SemanticType::Binary
            }
            "json" | "jsonb" => SemanticType::Json,
            "bit" => SemanticType::Bit,
            "bool" | "boolean" => SemanticType::Bool,
            "uuid" | "uniqueidentifier" => SemanticType::Uuid,
            _ => SemanticType::String,
        }
    }

    /// Infer a semantic type from a value alone.
    ///
    /// Used for builder fields and parsed predicates when no descriptor is
    /// available. A declared descriptor always wins over this inference.
    pub fn of_value(value: &SqlValue) -> Self {
        match value {
            SqlValue::Null => SemanticType::String,
            SqlValue::Bool(_) => SemanticType::Bool,
            SqlValue::I32(_) | SqlValue::I64(_) => SemanticType::Int,
            SqlValue::F64(_) => SemanticType::Float,
            SqlValue::Decimal(_) => SemanticType::Decimal,
            SqlValue::Text(_) => SemanticType::String,
            SqlValue::Bytes(_) => SemanticType::Binary,
            SqlValue::Uuid(_) => SemanticType::Uuid,
            SqlValue::DateTime(_) | SqlValue::Date(_) => SemanticType::Time,
            SqlValue::Json(_) => SemanticType::Json,
        }
    }
}

impl std::fmt::Display for SemanticType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SemanticType::String => "string",
            SemanticType::Int => "int",
            SemanticType::Float => "float",
            SemanticType::Decimal => "decimal",
            SemanticType::Time => "time",
            SemanticType::Binary => "binary",
            SemanticType::Json => "json",
            SemanticType::Bit => "bit",
            SemanticType::Bool => "bool",
            SemanticType::Uuid => "uuid",
        };
        f.write_str(s)
    }
}

/// Column metadata, immutable once fetched from a catalog.
///
/// Identity within one `(dialect, database, table)` is the name,
/// compared case-insensitively.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    /// Column name as reported by the catalog.
    pub name: String,

    /// Semantic type derived from the driver type.
    pub semantic_type: SemanticType,

    /// Raw driver type string (e.g. "varchar", "datetime").
    pub origin_type: String,

    /// Whether the column allows NULL.
    pub nullable: bool,

    /// Whether the column is part of the primary key.
    pub is_primary_key: bool,

    /// Whether the column carries a unique constraint.
    pub is_unique: bool,

    /// Ordinal position (1-based).
    pub ordinal_pos: i32,
}

impl ColumnDescriptor {
    /// Case-insensitive name match.
    pub fn matches(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }
}

/// Find a descriptor by case-insensitive name.
pub fn find_column<'a>(columns: &'a [ColumnDescriptor], name: &str) -> Option<&'a ColumnDescriptor> {
    columns.iter().find(|c| c.matches(name))
}

/// One column's value paired with its descriptor flags at fetch time.
///
/// The flags are copied from the descriptor so downstream consumers never
/// re-query schema to learn whether a field is a key.
#[derive(Debug, Clone)]
pub struct FieldData {
    pub name: String,
    pub value: SqlValue,
    pub semantic_type: SemanticType,
    pub is_pk: bool,
    pub is_uq: bool,
    pub nullable: bool,
    pub ordinal_pos: i32,
}

impl FieldData {
    /// Bind a value to a column descriptor.
    pub fn new(column: &ColumnDescriptor, value: SqlValue) -> Self {
        Self {
            name: column.name.clone(),
            value,
            semantic_type: column.semantic_type,
            is_pk: column.is_primary_key,
            is_uq: column.is_unique,
            nullable: column.nullable,
            ordinal_pos: column.ordinal_pos,
        }
    }
}

/// One physical row after normalization: fields sorted by ordinal position,
/// all belonging to the same table snapshot.
#[derive(Debug, Clone)]
pub struct RowData {
    pub table: String,
    pub fields: Vec<FieldData>,
}

impl RowData {
    /// Build a row from unordered fields; sorts by ordinal position.
    pub fn new(table: impl Into<String>, mut fields: Vec<FieldData>) -> Self {
        fields.sort_by_key(|f| f.ordinal_pos);
        Self {
            table: table.into(),
            fields,
        }
    }

    /// Look up a field by case-insensitive column name.
    pub fn get(&self, name: &str) -> Option<&FieldData> {
        self.fields.iter().find(|f| f.name.eq_ignore_ascii_case(name))
    }

    /// Primary-key fields of this row.
    pub fn primary_keys(&self) -> Vec<&FieldData> {
        self.fields.iter().filter(|f| f.is_pk).collect()
    }
}

/// A named unit of generated SQL: the sole artifact emitted by transformers
/// and by catalog DDL/dependency-sort operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SqlContent {
    pub name: String,
    pub sql: String,
}

impl SqlContent {
    pub fn new(name: impl Into<String>, sql: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sql: sql.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn col(name: &str, ordinal: i32, pk: bool) -> ColumnDescriptor {
        ColumnDescriptor {
            name: name.to_string(),
            semantic_type: SemanticType::Int,
            origin_type: "int".to_string(),
            nullable: false,
            is_primary_key: pk,
            is_unique: pk,
            ordinal_pos: ordinal,
        }
    }

    #[test]
    fn test_semantic_type_from_origin() {
        assert_eq!(SemanticType::from_origin("VARCHAR"), SemanticType::String);
        assert_eq!(SemanticType::from_origin("int(11)"), SemanticType::Int);
        assert_eq!(SemanticType::from_origin("bigint"), SemanticType::Int);
        assert_eq!(SemanticType::from_origin("double"), SemanticType::Float);
        assert_eq!(SemanticType::from_origin("decimal(10,2)"), SemanticType::Decimal);
        assert_eq!(SemanticType::from_origin("datetime"), SemanticType::Time);
        assert_eq!(SemanticType::from_origin("varbinary(16)"), SemanticType::Binary);
        assert_eq!(SemanticType::from_origin("json"), SemanticType::Json);
        assert_eq!(SemanticType::from_origin("bit(1)"), SemanticType::Bit);
        assert_eq!(SemanticType::from_origin("something_new"), SemanticType::String);
    }

    #[test]
    fn test_row_data_sorted_by_ordinal() {
        let c2 = col("b", 2, false);
        let c1 = col("a", 1, true);
        let row = RowData::new(
            "t",
            vec![
                FieldData::new(&c2, SqlValue::I64(2)),
                FieldData::new(&c1, SqlValue::I64(1)),
            ],
        );
        assert_eq!(row.fields[0].name, "a");
        assert_eq!(row.fields[1].name, "b");
        assert!(row.fields[0].is_pk);
    }

    #[test]
    fn test_row_data_get_case_insensitive() {
        let c = col("UserId", 1, true);
        let row = RowData::new("t", vec![FieldData::new(&c, SqlValue::I64(7))]);
        assert!(row.get("userid").is_some());
        assert!(row.get("missing").is_none());
        assert_eq!(row.primary_keys().len(), 1);
    }

    #[test]
    fn test_find_column() {
        let cols = vec![col("Id", 1, true), col("Name", 2, false)];
        assert!(find_column(&cols, "id").is_some());
        assert!(find_column(&cols, "nope").is_none());
    }
}
