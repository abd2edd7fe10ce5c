//! Error type shared by the model, the token layer and the codec

use thiserror::Error;

/// Errors raised while building, encoding or decoding a table set.
///
/// Every error is terminal for the call that produced it. Output already
/// written to a sink is a truncated document and must be discarded; a table
/// set returned alongside a failed decode is never handed out.
#[derive(Debug, Error)]
pub enum Error {
    /// A column type tag is neither a known scalar name nor `List<scalar>`
    #[error("unrecognized column type tag: {tag:?}")]
    SchemaResolution { tag: String },

    /// The token stream does not follow the table-set grammar
    #[error("malformed stream: {0}")]
    MalformedStream(String),

    /// A value or token cannot be represented in the scalar model
    #[error("unsupported value type: {0}")]
    UnsupportedValueType(String),

    /// The operation observed a cancellation request
    #[error("operation cancelled")]
    Cancelled,

    #[error("duplicate column {column:?} in table {table:?}")]
    DuplicateColumn { table: String, column: String },

    #[error("cannot add columns to table {table:?} after rows were appended")]
    ColumnsFrozen { table: String },

    #[error("row for table {table:?} has {found} values, expected {expected}")]
    RowArity {
        table: String,
        expected: usize,
        found: usize,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn malformed(msg: impl Into<String>) -> Self {
        Error::MalformedStream(msg.into())
    }

    pub(crate) fn unsupported(msg: impl Into<String>) -> Self {
        Error::UnsupportedValueType(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
