//! tablestream - Streaming JSON codec for typed table sets
//!
//! Converts a [`TableSet`] (named tables, typed columns, ordered rows) to and
//! from a JSON document that carries a type tag per column:
//!
//! ```json
//! {"Tables":[{"TableName":"T","Columns":[["A","String"],["B","List<Integer>"]],"Rows":[["x",[1,2]]]}]}
//! ```
//!
//! Both directions work token by token, so neither side materializes the
//! whole document.

pub mod codec;
pub mod config;
pub mod error;
pub mod model;
pub mod token;

pub use codec::{from_reader, from_str, to_string, to_string_pretty, to_writer};
pub use config::Config;
pub use error::{Error, Result};
pub use model::{Column, ColumnType, Kind, Table, TableSet, Value};
