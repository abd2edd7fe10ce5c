//! Column metadata and type information

use std::str::FromStr;

/// Scalar kind of a column or of a list column's elements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    String,
    Integer,
    Float,
    Decimal,
    Boolean,
    DateTime,
    Guid,
}

impl Kind {
    /// Every supported kind, in tag-table order
    pub const ALL: [Kind; 7] = [
        Kind::String,
        Kind::Integer,
        Kind::Float,
        Kind::Decimal,
        Kind::Boolean,
        Kind::DateTime,
        Kind::Guid,
    ];

    /// Canonical name used in type tags
    pub fn name(self) -> &'static str {
        match self {
            Kind::String => "String",
            Kind::Integer => "Integer",
            Kind::Float => "Float",
            Kind::Decimal => "Decimal",
            Kind::Boolean => "Boolean",
            Kind::DateTime => "DateTime",
            Kind::Guid => "Guid",
        }
    }
}

impl std::fmt::Display for Kind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Kind {
    type Err = ();

    /// Case-sensitive lookup of a canonical kind name
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Kind::ALL.into_iter().find(|k| k.name() == s).ok_or(())
    }
}

/// Declared type of a column: a scalar, or a flat list of scalars
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    Scalar(Kind),
    List(Kind),
}

impl ColumnType {
    /// The scalar kind, or the element kind for lists
    pub fn kind(self) -> Kind {
        match self {
            ColumnType::Scalar(k) | ColumnType::List(k) => k,
        }
    }

    pub fn is_list(self) -> bool {
        matches!(self, ColumnType::List(_))
    }
}

impl From<Kind> for ColumnType {
    fn from(kind: Kind) -> Self {
        ColumnType::Scalar(kind)
    }
}

/// Column metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    /// Column name, unique within its table
    pub name: String,
    /// Declared type
    pub column_type: ColumnType,
}

impl Column {
    /// Create a new column with name and type
    pub fn new(name: impl Into<String>, column_type: impl Into<ColumnType>) -> Self {
        Self {
            name: name.into(),
            column_type: column_type.into(),
        }
    }

    /// Create a list column of the given element kind
    pub fn list(name: impl Into<String>, kind: Kind) -> Self {
        Self::new(name, ColumnType::List(kind))
    }
}
