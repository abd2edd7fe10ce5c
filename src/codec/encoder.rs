//! Forward-only table set encoder

use chrono::{Datelike, SecondsFormat};
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::model::{Column, ColumnType, Table, TableSet, Value};
use crate::token::TokenSink;

use super::tag;

pub(crate) const TABLES: &str = "Tables";
pub(crate) const TABLE_NAME: &str = "TableName";
pub(crate) const COLUMNS: &str = "Columns";
pub(crate) const ROWS: &str = "Rows";

/// Writes a [`TableSet`] as
/// `{"Tables":[{"TableName":..,"Columns":[[name,tag],..],"Rows":[[..],..]},..]}`.
///
/// Rows are visited once, in order; nothing beyond the row being written is
/// held. With boundary flushing enabled the sink is flushed after every
/// `Columns` array and after every table, so a transport can forward partial
/// output early.
pub struct Encoder<S: TokenSink> {
    sink: S,
    flush_at_boundaries: bool,
}

impl<S: TokenSink> Encoder<S> {
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            flush_at_boundaries: true,
        }
    }

    pub fn with_flush_at_boundaries(mut self, flush: bool) -> Self {
        self.flush_at_boundaries = flush;
        self
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Write one complete document
    pub fn encode(&mut self, tables: &TableSet) -> Result<()> {
        self.sink.start_object()?;
        self.sink.field_name(TABLES)?;
        self.sink.start_array()?;
        for table in tables {
            self.encode_table(table)?;
        }
        self.sink.end_array()?;
        self.sink.end_object()?;
        self.sink.flush()
    }

    fn encode_table(&mut self, table: &Table) -> Result<()> {
        debug!(
            table = table.name(),
            columns = table.column_count(),
            rows = table.row_count(),
            "encoding table"
        );

        self.sink.start_object()?;
        self.sink.field_name(TABLE_NAME)?;
        self.sink.string(table.name())?;

        self.sink.field_name(COLUMNS)?;
        self.sink.start_array()?;
        for column in table.columns() {
            self.sink.start_array()?;
            self.sink.string(&column.name)?;
            self.sink.string(&tag::encode(column.column_type))?;
            self.sink.end_array()?;
        }
        self.sink.end_array()?;
        self.boundary(table.name(), "columns")?;

        self.sink.field_name(ROWS)?;
        self.sink.start_array()?;
        for (index, row) in table.rows().iter().enumerate() {
            self.sink.start_array()?;
            for (column, value) in table.columns().iter().zip(row.values()) {
                self.encode_value(column, value)
                    .map_err(|err| with_context(table, index, column, err))?;
            }
            self.sink.end_array()?;
        }
        self.sink.end_array()?;

        self.sink.end_object()?;
        self.boundary(table.name(), "table")
    }

    fn boundary(&mut self, table: &str, what: &str) -> Result<()> {
        if self.flush_at_boundaries {
            trace!(table, boundary = what, "flushing sink");
            self.sink.flush()?;
        }
        Ok(())
    }

    fn encode_value(&mut self, column: &Column, value: &Value) -> Result<()> {
        if !value.is_assignable_to(column.column_type) {
            return Err(Error::unsupported(match (column.column_type, value) {
                (ColumnType::List(kind), Value::List(items)) => {
                    let item = items
                        .iter()
                        .find(|item| !item.is_null() && item.kind() != Some(kind))
                        .unwrap_or(value);
                    format!("{} list item where {} was declared", describe(item), kind)
                }
                (column_type, _) => {
                    format!("{} value in a {} column", describe(value), column_type)
                }
            }));
        }

        match value {
            Value::List(items) => {
                self.sink.start_array()?;
                for item in items {
                    self.encode_scalar(item)?;
                }
                self.sink.end_array()
            }
            scalar => self.encode_scalar(scalar),
        }
    }

    /// Write a scalar already checked against its column type
    fn encode_scalar(&mut self, value: &Value) -> Result<()> {
        match value {
            Value::Null => self.sink.null(),
            Value::String(s) => self.sink.string(s),
            Value::Integer(i) => self.sink.number_str(&i.to_string()),
            Value::Float(f) => {
                let number = serde_json::Number::from_f64(*f).ok_or_else(|| {
                    Error::unsupported(format!("non-finite float {} has no JSON form", f))
                })?;
                self.sink.number_str(&number.to_string())
            }
            Value::Decimal(d) => self.sink.number_str(&d.to_string()),
            Value::Boolean(b) => self.sink.bool(*b),
            Value::DateTime(dt) => {
                // RFC 3339 has no form for years outside 0000-9999
                if !(0..=9999).contains(&dt.year()) {
                    return Err(Error::unsupported(format!(
                        "DateTime {} is outside years 0000-9999",
                        dt
                    )));
                }
                self.sink
                    .string(&dt.to_rfc3339_opts(SecondsFormat::AutoSi, true))
            }
            Value::Guid(id) => self.sink.string(&id.to_string()),
            Value::List(_) => Err(Error::unsupported("nested list value")),
        }
    }
}

fn describe(value: &Value) -> String {
    match value.kind() {
        Some(kind) => kind.to_string(),
        None if value.is_null() => "Null".to_string(),
        None => "List".to_string(),
    }
}

/// Attach table, row and column context to a value error
fn with_context(table: &Table, row: usize, column: &Column, err: Error) -> Error {
    match err {
        Error::UnsupportedValueType(detail) => Error::unsupported(format!(
            "table {:?}, row {}, column {:?}: {}",
            table.name(),
            row,
            column.name,
            detail
        )),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Decimal, Kind};
    use crate::token::JsonTokenWriter;
    use chrono::{DateTime, NaiveDate, TimeZone, Utc};
    use uuid::Uuid;

    fn encode(set: &TableSet) -> Result<String> {
        let mut encoder = Encoder::new(JsonTokenWriter::compact(Vec::new()));
        encoder.encode(set)?;
        Ok(String::from_utf8(encoder.into_sink().into_inner()).unwrap())
    }

    /// Sink recording how many flushes happened after how many tokens
    #[derive(Default)]
    struct Recorder {
        tokens: usize,
        flushes: Vec<usize>,
    }

    impl TokenSink for Recorder {
        fn start_object(&mut self) -> Result<()> {
            self.tokens += 1;
            Ok(())
        }
        fn end_object(&mut self) -> Result<()> {
            self.tokens += 1;
            Ok(())
        }
        fn start_array(&mut self) -> Result<()> {
            self.tokens += 1;
            Ok(())
        }
        fn end_array(&mut self) -> Result<()> {
            self.tokens += 1;
            Ok(())
        }
        fn field_name(&mut self, _: &str) -> Result<()> {
            self.tokens += 1;
            Ok(())
        }
        fn string(&mut self, _: &str) -> Result<()> {
            self.tokens += 1;
            Ok(())
        }
        fn number_str(&mut self, _: &str) -> Result<()> {
            self.tokens += 1;
            Ok(())
        }
        fn bool(&mut self, _: bool) -> Result<()> {
            self.tokens += 1;
            Ok(())
        }
        fn null(&mut self) -> Result<()> {
            self.tokens += 1;
            Ok(())
        }
        fn flush(&mut self) -> Result<()> {
            self.flushes.push(self.tokens);
            Ok(())
        }
    }

    fn worked_example() -> TableSet {
        let mut table = Table::with_columns(
            "T",
            [Column::new("A", Kind::String), Column::list("B", Kind::Integer)],
        )
        .unwrap();
        table
            .add_row(vec![Value::from("x"), Value::from(vec![1i64, 2])])
            .unwrap();
        table
            .add_row(vec![Value::Null, Value::List(Vec::new())])
            .unwrap();
        TableSet::from_iter([table])
    }

    #[test]
    fn test_worked_example() {
        assert_eq!(
            encode(&worked_example()).unwrap(),
            r#"{"Tables":[{"TableName":"T","Columns":[["A","String"],["B","List<Integer>"]],"Rows":[["x",[1,2]],[null,[]]]}]}"#
        );
    }

    #[test]
    fn test_empty_table_set() {
        assert_eq!(encode(&TableSet::new()).unwrap(), r#"{"Tables":[]}"#);
    }

    #[test]
    fn test_scalar_kinds() {
        let mut table = Table::with_columns(
            "k",
            [
                Column::new("f", Kind::Float),
                Column::new("d", Kind::Decimal),
                Column::new("b", Kind::Boolean),
                Column::new("t", Kind::DateTime),
                Column::new("g", Kind::Guid),
                Column::list("l", Kind::String),
            ],
        )
        .unwrap();
        table
            .add_row(vec![
                Value::Float(1.0),
                Value::Decimal("10.50".parse::<Decimal>().unwrap()),
                Value::Boolean(false),
                Value::DateTime(DateTime::parse_from_rfc3339("2024-03-01T08:30:00+00:00").unwrap()),
                Value::Guid(Uuid::nil()),
                Value::List(vec![Value::from("a"), Value::Null]),
            ])
            .unwrap();
        let out = encode(&TableSet::from_iter([table])).unwrap();
        assert!(out.contains(
            r#"[1.0,10.50,false,"2024-03-01T08:30:00Z","00000000-0000-0000-0000-000000000000",["a",null]]"#
        ));
    }

    #[test]
    fn test_kind_mismatch_is_unsupported() {
        let mut table = Table::with_columns("t", [Column::new("n", Kind::Integer)]).unwrap();
        table.add_row(vec![Value::from("seven")]).unwrap();
        let err = encode(&TableSet::from_iter([table])).unwrap_err();
        match err {
            Error::UnsupportedValueType(msg) => {
                assert!(msg.contains("\"t\""));
                assert!(msg.contains("row 0"));
                assert!(msg.contains("\"n\""));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_list_value_in_scalar_column_is_unsupported() {
        let mut table = Table::with_columns("t", [Column::new("n", Kind::Integer)]).unwrap();
        table.add_row(vec![Value::from(vec![1i64])]).unwrap();
        assert!(matches!(
            encode(&TableSet::from_iter([table])),
            Err(Error::UnsupportedValueType(_))
        ));
    }

    #[test]
    fn test_non_finite_float_is_unsupported() {
        let mut table = Table::with_columns("t", [Column::new("f", Kind::Float)]).unwrap();
        table.add_row(vec![Value::Float(f64::NAN)]).unwrap();
        assert!(matches!(
            encode(&TableSet::from_iter([table])),
            Err(Error::UnsupportedValueType(_))
        ));
    }

    #[test]
    fn test_wrong_list_item_is_unsupported() {
        let mut table = Table::with_columns("t", [Column::list("l", Kind::Integer)]).unwrap();
        table
            .add_row(vec![Value::List(vec![Value::Integer(1), Value::from("two")])])
            .unwrap();
        match encode(&TableSet::from_iter([table])).unwrap_err() {
            Error::UnsupportedValueType(msg) => {
                assert!(msg.contains("\"l\""));
                assert!(msg.contains("String list item"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_datetime_outside_four_digit_years_is_unsupported() {
        let far_future = NaiveDate::from_ymd_opt(10000, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let before_year_zero = NaiveDate::from_ymd_opt(-1, 6, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        for naive in [far_future, before_year_zero] {
            let dt = Utc.from_utc_datetime(&naive).fixed_offset();
            let mut table = Table::with_columns("t", [Column::new("at", Kind::DateTime)]).unwrap();
            table.add_row(vec![Value::DateTime(dt)]).unwrap();
            assert!(matches!(
                encode(&TableSet::from_iter([table])),
                Err(Error::UnsupportedValueType(_))
            ));
        }

        let last = NaiveDate::from_ymd_opt(9999, 12, 31)
            .unwrap()
            .and_hms_opt(23, 59, 59)
            .unwrap();
        let mut table = Table::with_columns("t", [Column::new("at", Kind::DateTime)]).unwrap();
        table
            .add_row(vec![Value::DateTime(Utc.from_utc_datetime(&last).fixed_offset())])
            .unwrap();
        assert!(encode(&TableSet::from_iter([table]))
            .unwrap()
            .contains("\"9999-12-31T23:59:59Z\""));
    }

    #[test]
    fn test_flushes_at_boundaries() {
        let mut recorder = Recorder::default();
        Encoder::new(&mut recorder).encode(&worked_example()).unwrap();
        // after the Columns array, after the table object, at document end
        assert_eq!(recorder.flushes, vec![17, 33, 35]);

        let mut recorder = Recorder::default();
        Encoder::new(&mut recorder)
            .with_flush_at_boundaries(false)
            .encode(&worked_example())
            .unwrap();
        assert_eq!(recorder.flushes, vec![35]);
    }
}
