//! Depth-tracked pull decoder
//!
//! The decoder is a flat state machine fed one token at a time. It keeps
//! the table set under construction plus, at most, one pending column name,
//! one partially read row and one partially read list value, so its working
//! set is bounded by the width of the current table no matter how many rows
//! the document holds.
//!
//! Tables are appended as soon as their name is read, columns as soon as
//! their tag resolves, and rows only once every value has been read.

use std::mem;

use chrono::{DateTime, FixedOffset, NaiveDateTime};
use tracing::debug;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::model::{Column, ColumnType, Decimal, Kind, Table, TableSet, Value};
use crate::token::{Token, TokenSource};

use super::encoder::{COLUMNS, ROWS, TABLES, TABLE_NAME};
use super::tag;

/// Position within the table-set grammar
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Before the root object
    Document,
    /// Inside the root object, before `"Tables"`
    TablesKey,
    /// After `"Tables"`, before its array
    TablesArray,
    /// Inside `Tables`, before a table object or the array end
    TableStart,
    /// Inside a table object, before `"TableName"`
    TableNameKey,
    TableNameValue,
    ColumnsKey,
    ColumnsArray,
    /// Inside `Columns`, before an entry or the array end
    ColumnEntry,
    ColumnName,
    ColumnTag,
    /// After a column tag, before the entry's array end
    ColumnEntryEnd,
    RowsKey,
    RowsArray,
    /// Inside `Rows`, before a row or the array end
    RowStart,
    /// Inside a row, before the next value or the row end
    RowValue,
    /// Inside a list value, before the next element or the list end
    ListValue,
    /// After `Rows`, before the table object end
    TableEnd,
    /// After `Tables`, before the root object end
    DocumentEnd,
    Done,
}

impl State {
    fn expecting(self) -> &'static str {
        match self {
            State::Document => "the document object",
            State::TablesKey => "the \"Tables\" field",
            State::TablesArray => "the Tables array",
            State::TableStart => "a table object or the end of Tables",
            State::TableNameKey => "the \"TableName\" field",
            State::TableNameValue => "a table name string",
            State::ColumnsKey => "the \"Columns\" field",
            State::ColumnsArray => "the Columns array",
            State::ColumnEntry => "a [name, type] entry or the end of Columns",
            State::ColumnName => "a column name string",
            State::ColumnTag => "a column type tag string",
            State::ColumnEntryEnd => "the end of a [name, type] entry",
            State::RowsKey => "the \"Rows\" field",
            State::RowsArray => "the Rows array",
            State::RowStart => "a row array or the end of Rows",
            State::RowValue => "a row value or the end of the row",
            State::ListValue => "a list element or the end of the list",
            State::TableEnd => "the end of the table object",
            State::DocumentEnd => "the end of the document object",
            State::Done => "end of input",
        }
    }
}

/// Incremental table-set decoder
#[derive(Debug)]
pub struct Decoder {
    state: State,
    tables: TableSet,
    /// Index of the table being filled
    current: usize,
    pending_column: Option<String>,
    row: Vec<Value>,
    list: Vec<Value>,
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder {
    pub fn new() -> Self {
        Self {
            state: State::Document,
            tables: TableSet::new(),
            current: 0,
            pending_column: None,
            row: Vec::new(),
            list: Vec::new(),
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn is_done(&self) -> bool {
        self.state == State::Done
    }

    /// Tables decoded so far, including a partially filled last table
    pub fn tables(&self) -> &TableSet {
        &self.tables
    }

    /// Hand out the decoded table set; fails unless the document is complete
    pub fn finish(self) -> Result<TableSet> {
        if !self.is_done() {
            return Err(Error::malformed(format!(
                "unexpected end of input, expected {}",
                self.state.expecting()
            )));
        }
        Ok(self.tables)
    }

    /// Advance the state machine by one token
    pub fn step(&mut self, token: Token) -> Result<()> {
        self.state = match (self.state, token) {
            (State::Document, Token::StartObject) => State::TablesKey,
            (State::TablesKey, Token::FieldName(name)) if name == TABLES => State::TablesArray,
            (State::TablesArray, Token::StartArray) => State::TableStart,
            (State::TableStart, Token::StartObject) => State::TableNameKey,
            (State::TableStart, Token::EndArray) => State::DocumentEnd,
            (State::TableNameKey, Token::FieldName(name)) if name == TABLE_NAME => {
                State::TableNameValue
            }
            (State::TableNameValue, Token::String(name)) => {
                self.current = self.tables.add_table(Table::new(name));
                State::ColumnsKey
            }

            (State::ColumnsKey, Token::FieldName(name)) if name == COLUMNS => State::ColumnsArray,
            (State::ColumnsArray, Token::StartArray) => State::ColumnEntry,
            (State::ColumnEntry, Token::StartArray) => State::ColumnName,
            (State::ColumnEntry, Token::EndArray) => State::RowsKey,
            (State::ColumnName, Token::String(name)) => {
                self.pending_column = Some(name);
                State::ColumnTag
            }
            (State::ColumnTag, Token::String(tag)) => {
                self.add_column(&tag)?;
                State::ColumnEntryEnd
            }
            (State::ColumnEntryEnd, Token::EndArray) => State::ColumnEntry,

            (State::RowsKey, Token::FieldName(name)) if name == ROWS => State::RowsArray,
            (State::RowsArray, Token::StartArray) => State::RowStart,
            (State::RowStart, Token::StartArray) => {
                self.row = Vec::with_capacity(self.table()?.column_count());
                State::RowValue
            }
            (State::RowStart, Token::EndArray) => State::TableEnd,
            (State::RowValue, token) => self.row_value(token)?,
            (State::ListValue, token) => self.list_value(token)?,
            (State::TableEnd, Token::EndObject) => {
                let table = self.table()?;
                debug!(
                    table = table.name(),
                    columns = table.column_count(),
                    rows = table.row_count(),
                    "decoded table"
                );
                State::TableStart
            }

            (State::DocumentEnd, Token::EndObject) => State::Done,
            (state, token) => return Err(unexpected(state, &token)),
        };
        Ok(())
    }

    fn table(&self) -> Result<&Table> {
        self.tables
            .tables()
            .get(self.current)
            .ok_or_else(|| Error::malformed("no table is open"))
    }

    fn table_mut(&mut self) -> Result<&mut Table> {
        self.tables
            .table_mut(self.current)
            .ok_or_else(|| Error::malformed("no table is open"))
    }

    fn add_column(&mut self, tag: &str) -> Result<()> {
        let column_type = tag::decode(tag)?;
        let name = self
            .pending_column
            .take()
            .ok_or_else(|| Error::malformed("column tag without a column name"))?;
        self.table_mut()?
            .add_column(Column::new(name, column_type))
            .map_err(|err| Error::malformed(err.to_string()))
    }

    fn row_value(&mut self, token: Token) -> Result<State> {
        let table = self.table()?;
        let arity = table.column_count();
        let position = self.row.len();

        let Some(column) = table.columns().get(position) else {
            return match token {
                Token::EndArray => {
                    let values = mem::take(&mut self.row);
                    self.table_mut()?
                        .add_row(values)
                        .map_err(|err| Error::malformed(err.to_string()))?;
                    Ok(State::RowStart)
                }
                token => Err(Error::malformed(format!(
                    "row has more than the {} declared values, found {}",
                    arity,
                    token.describe()
                ))),
            };
        };
        let column_type = column.column_type;

        match (column_type, token) {
            (_, Token::EndArray) => Err(Error::malformed(format!(
                "row ended after {} of {} values",
                position, arity
            ))),
            (ColumnType::List(_), Token::StartArray) => {
                self.list.clear();
                Ok(State::ListValue)
            }
            (ColumnType::Scalar(kind), Token::StartArray) => Err(Error::malformed(format!(
                "array found where a {} value was expected",
                kind
            ))),
            (_, Token::Null) => {
                self.row.push(Value::Null);
                Ok(State::RowValue)
            }
            (ColumnType::Scalar(kind), token) => {
                self.row.push(scalar_value(kind, token)?);
                Ok(State::RowValue)
            }
            (ColumnType::List(kind), token) => Err(Error::unsupported(format!(
                "{} found where a List<{}> value was expected",
                token.describe(),
                kind
            ))),
        }
    }

    fn list_value(&mut self, token: Token) -> Result<State> {
        let kind = self
            .table()?
            .columns()
            .get(self.row.len())
            .map(|c| c.column_type.kind())
            .ok_or_else(|| Error::malformed("list value outside a list column"))?;

        match token {
            Token::EndArray => {
                let items = mem::take(&mut self.list);
                self.row.push(Value::List(items));
                Ok(State::RowValue)
            }
            Token::StartArray => Err(Error::malformed(format!(
                "nested list where a {} element was expected",
                kind
            ))),
            token => {
                self.list.push(scalar_value(kind, token)?);
                Ok(State::ListValue)
            }
        }
    }
}

fn unexpected(state: State, token: &Token) -> Error {
    let found = match token {
        Token::FieldName(name) => format!("field {:?}", name),
        other => other.describe().to_string(),
    };
    Error::malformed(format!("found {} while expecting {}", found, state.expecting()))
}

/// Interpret a scalar token as a value of the given kind
fn scalar_value(kind: Kind, token: Token) -> Result<Value> {
    let mismatch = |token: &Token| {
        Error::unsupported(format!("{} cannot hold a {} value", token.describe(), kind))
    };

    let value = match (kind, token) {
        (_, Token::Null) => Value::Null,
        (Kind::String, Token::String(s)) => Value::String(s),
        (Kind::Integer, Token::Number(n)) => n
            .parse::<i64>()
            .map(Value::Integer)
            .map_err(|_| Error::unsupported(format!("{} is not an Integer", n)))?,
        (Kind::Float, Token::Number(n)) => match n.parse::<f64>() {
            Ok(f) if f.is_finite() => Value::Float(f),
            _ => return Err(Error::unsupported(format!("{} is not a finite Float", n))),
        },
        (Kind::Decimal, Token::Number(n)) => Value::Decimal(n.parse::<Decimal>()?),
        (Kind::Boolean, Token::Bool(b)) => Value::Boolean(b),
        (Kind::DateTime, Token::String(s)) => Value::DateTime(parse_datetime(&s)?),
        (Kind::Guid, Token::String(s)) => Value::Guid(
            Uuid::parse_str(&s)
                .map_err(|_| Error::unsupported(format!("{:?} is not a Guid", s)))?,
        ),
        (_, token) => return Err(mismatch(&token)),
    };
    Ok(value)
}

/// RFC 3339, or an ISO 8601 timestamp without offset taken as UTC
fn parse_datetime(s: &str) -> Result<DateTime<FixedOffset>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt);
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc().fixed_offset())
        .map_err(|_| Error::unsupported(format!("{:?} is not a DateTime", s)))
}

/// Decode one table-set document from a token source
pub fn decode<S: TokenSource>(mut source: S) -> Result<TableSet> {
    let mut decoder = Decoder::new();
    while let Some(token) = source.next_token()? {
        decoder
            .step(token)
            .map_err(|err| at_depth(err, source.depth()))?;
    }
    decoder.finish()
}

fn at_depth(err: Error, depth: usize) -> Error {
    match err {
        Error::MalformedStream(msg) => Error::malformed(format!("{} (depth {})", msg, depth)),
        Error::UnsupportedValueType(msg) => {
            Error::unsupported(format!("{} (depth {})", msg, depth))
        }
        other => other,
    }
}
