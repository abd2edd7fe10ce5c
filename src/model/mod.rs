//! Data model for typed table sets

mod schema;
mod table;
mod value;

pub use schema::{Column, ColumnType, Kind};
pub use table::{Row, Table, TableSet};
pub use value::{Decimal, Value, MAX_DECIMAL_SCALE};
