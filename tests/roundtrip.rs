use std::io::{Read, Seek, SeekFrom};

use chrono::{DateTime, FixedOffset};
use proptest::prelude::*;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use tablestream::codec::{self, Encoder};
use tablestream::config::{Config, OutputStyle};
use tablestream::model::Decimal;
use tablestream::token::JsonTokenWriter;
use tablestream::{Column, ColumnType, Error, Kind, Table, TableSet, Value};

const WORKED_EXAMPLE: &str = r#"{"Tables":[{"TableName":"T","Columns":[["A","String"],["B","List<Integer>"]],"Rows":[["x",[1,2]],[null,[]]]}]}"#;

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

/// Two tables shaped like a typical report export
fn report() -> TableSet {
    let mut orders = Table::with_columns(
        "Orders",
        [
            Column::new("Id", Kind::Guid),
            Column::new("Customer", Kind::String),
            Column::new("Total", Kind::Decimal),
            Column::new("Placed", Kind::DateTime),
            Column::new("Paid", Kind::Boolean),
            Column::list("Lines", Kind::String),
        ],
    )
    .unwrap();
    for i in 0..3i64 {
        orders
            .add_row(vec![
                Value::Guid(Uuid::from_u128(0x1000 + i as u128)),
                Value::from(format!("customer \"{}\"\n\ttab", i)),
                Value::Decimal(Decimal::new(19_990 + i as i128, 2).unwrap()),
                Value::DateTime(
                    DateTime::parse_from_rfc3339("2023-11-05T17:45:12.123456789-05:00").unwrap(),
                ),
                Value::Boolean(i % 2 == 0),
                Value::from(vec![format!("ListItemRow{}/1", i), format!("ListItemRow{}/2", i)]),
            ])
            .unwrap();
    }

    let mut metrics = Table::with_columns(
        "Metrics",
        [
            Column::new("Count", Kind::Integer),
            Column::new("Ratio", Kind::Float),
            Column::list("Samples", Kind::Float),
        ],
    )
    .unwrap();
    metrics
        .add_row(vec![
            Value::Integer(i64::MIN),
            Value::Float(0.1),
            Value::List(vec![Value::Float(1e300), Value::Null, Value::Float(-2.5e-8)]),
        ])
        .unwrap();

    TableSet::from_iter([orders, metrics, Table::new("Empty")])
}

#[test]
fn worked_example_encodes_exactly() {
    assert_eq!(tablestream::to_string(&worked_example()).unwrap(), WORKED_EXAMPLE);
}

#[test]
fn worked_example_decodes_exactly() {
    assert_eq!(tablestream::from_str(WORKED_EXAMPLE).unwrap(), worked_example());
}

#[test]
fn report_round_trips_compact_and_pretty() {
    let original = report();

    let compact = tablestream::to_string(&original).unwrap();
    assert_eq!(tablestream::from_str(&compact).unwrap(), original);

    let pretty = tablestream::to_string_pretty(&original).unwrap();
    assert!(pretty.lines().count() > 10);
    assert_eq!(tablestream::from_str(&pretty).unwrap(), original);
}

#[test]
fn duplicate_table_names_are_kept() {
    let mut set = worked_example();
    set.add_table(set.tables()[0].clone());
    let decoded = tablestream::from_str(&tablestream::to_string(&set).unwrap()).unwrap();
    assert_eq!(decoded.len(), 2);
    assert_eq!(decoded.tables()[0].name(), decoded.tables()[1].name());
}

#[test]
fn round_trip_through_file() {
    let mut file = tempfile::tempfile().unwrap();
    let config = Config::new().with_style(OutputStyle::Pretty);
    tablestream::to_writer(&mut file, &report(), &config).unwrap();

    file.seek(SeekFrom::Start(0)).unwrap();
    let mut text = String::new();
    file.read_to_string(&mut text).unwrap();
    assert!(text.starts_with('{'));

    file.seek(SeekFrom::Start(0)).unwrap();
    assert_eq!(tablestream::from_reader(&mut file).unwrap(), report());
}

#[test]
fn whitespace_does_not_affect_decoding() {
    let spaced = "\n{ \"Tables\" : [ { \"TableName\" : \"T\" ,\n \"Columns\" : [ [ \"A\" , \"String\" ] ,\r\n [\"B\",\"List<Integer>\"] ] , \"Rows\" : [ [ \"x\" , [ 1 , 2 ] ] , [ null , [ ] ] ] } ] }\n";
    assert_eq!(tablestream::from_str(spaced).unwrap(), worked_example());
}

#[test]
fn short_row_is_malformed() {
    let json = r#"{"Tables":[{"TableName":"T","Columns":[["A","String"],["B","Integer"]],"Rows":[["x"]]}]}"#;
    assert!(matches!(
        tablestream::from_str(json),
        Err(Error::MalformedStream(_))
    ));
}

#[test]
fn unknown_tag_is_schema_error() {
    let json = r#"{"Tables":[{"TableName":"T","Columns":[["X","Frobnicate"]],"Rows":[]}]}"#;
    match tablestream::from_str(json) {
        Err(Error::SchemaResolution { tag }) => assert_eq!(tag, "Frobnicate"),
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn truncated_document_is_malformed() {
    let cut = &WORKED_EXAMPLE[..WORKED_EXAMPLE.len() - 3];
    assert!(matches!(
        tablestream::from_str(cut),
        Err(Error::MalformedStream(_))
    ));
    assert!(matches!(tablestream::from_str(""), Err(Error::MalformedStream(_))));
}

#[test]
fn null_inside_list_is_kept() {
    let json = r#"{"Tables":[{"TableName":"T","Columns":[["L","List<Boolean>"]],"Rows":[[[true,null,false]]]}]}"#;
    let set = tablestream::from_str(json).unwrap();
    assert_eq!(
        set.tables()[0].rows()[0].values(),
        &[Value::List(vec![
            Value::Boolean(true),
            Value::Null,
            Value::Boolean(false)
        ])]
    );
}

#[test]
fn cancelled_decode_fails() {
    let cancel = CancellationToken::new();
    cancel.cancel();
    assert!(matches!(
        codec::from_reader_with_cancellation(WORKED_EXAMPLE.as_bytes(), cancel),
        Err(Error::Cancelled)
    ));
}

#[test]
fn cancelled_encode_fails() {
    let cancel = CancellationToken::new();
    cancel.cancel();
    let mut out = Vec::new();
    let result =
        codec::to_writer_with_cancellation(&mut out, &report(), &Config::default(), cancel);
    assert!(matches!(result, Err(Error::Cancelled)));
    assert!(out.is_empty());
}

#[test]
fn zero_decimal_with_huge_exponent_decodes() {
    let json = r#"{"Tables":[{"TableName":"T","Columns":[["D","Decimal"]],"Rows":[[0e2000000000],[-0e-2000000000]]}]}"#;
    let set = tablestream::from_str(json).unwrap();
    let rows = set.tables()[0].rows();
    assert_eq!(rows[0].values(), &[Value::Decimal(Decimal::new(0, 0).unwrap())]);
    assert_eq!(rows[1].values(), &[Value::Decimal(Decimal::new(0, 28).unwrap())]);
}

#[test]
fn extreme_values_round_trip() {
    let mut table = Table::with_columns(
        "Edges",
        [Column::new("D", Kind::Decimal), Column::new("At", Kind::DateTime)],
    )
    .unwrap();
    table
        .add_row(vec![
            Value::Decimal(Decimal::new(i128::MIN, 0).unwrap()),
            Value::DateTime(DateTime::parse_from_rfc3339("9999-12-31T23:59:59.999999999+14:00").unwrap()),
        ])
        .unwrap();
    table
        .add_row(vec![
            Value::Decimal(Decimal::new(i128::MAX, 28).unwrap()),
            Value::DateTime(DateTime::parse_from_rfc3339("0000-01-01T00:00:00-14:00").unwrap()),
        ])
        .unwrap();
    let set = TableSet::from_iter([table]);
    assert_eq!(tablestream::from_str(&tablestream::to_string(&set).unwrap()).unwrap(), set);
}

#[test]
fn encoder_accepts_custom_sink() {
    let sink = JsonTokenWriter::compact(Vec::new());
    let mut encoder = Encoder::new(sink).with_flush_at_boundaries(false);
    encoder.encode(&worked_example()).unwrap();
    let bytes = encoder.into_sink().into_inner();
    assert_eq!(String::from_utf8(bytes).unwrap(), WORKED_EXAMPLE);
}

fn scalar(kind: Kind) -> BoxedStrategy<Value> {
    match kind {
        Kind::String => ".{0,12}".prop_map(Value::String).boxed(),
        Kind::Integer => any::<i64>().prop_map(Value::Integer).boxed(),
        Kind::Float => any::<f64>()
            .prop_filter("JSON has no non-finite numbers", |f| f.is_finite())
            .prop_map(Value::Float)
            .boxed(),
        Kind::Decimal => (any::<i128>(), 0u8..=28)
            .prop_map(|(m, s)| Value::Decimal(Decimal::new(m, s).unwrap()))
            .boxed(),
        Kind::Boolean => any::<bool>().prop_map(Value::Boolean).boxed(),
        // 0001-01-02 through 9999-12-30 UTC, so every offset stays within four-digit years
        Kind::DateTime => (-62_135_510_400i64..253_402_128_000, 0u32..1_000_000_000, -840i32..=840)
            .prop_map(|(secs, nanos, offset_minutes)| {
                let offset = FixedOffset::east_opt(offset_minutes * 60).unwrap();
                let utc = DateTime::from_timestamp(secs, nanos).unwrap();
                Value::DateTime(utc.with_timezone(&offset))
            })
            .boxed(),
        Kind::Guid => any::<[u8; 16]>()
            .prop_map(|bytes| Value::Guid(Uuid::from_bytes(bytes)))
            .boxed(),
    }
}

fn value(column_type: ColumnType) -> BoxedStrategy<Value> {
    match column_type {
        ColumnType::Scalar(kind) => prop_oneof![1 => Just(Value::Null), 4 => scalar(kind)].boxed(),
        ColumnType::List(kind) => prop_oneof![
            1 => Just(Value::Null),
            4 => prop::collection::vec(
                prop_oneof![1 => Just(Value::Null), 4 => scalar(kind)],
                0..4
            )
            .prop_map(Value::List),
        ]
        .boxed(),
    }
}

fn column_type() -> impl Strategy<Value = ColumnType> {
    (prop::sample::select(Kind::ALL.to_vec()), any::<bool>()).prop_map(|(kind, list)| {
        if list {
            ColumnType::List(kind)
        } else {
            ColumnType::Scalar(kind)
        }
    })
}

fn table() -> impl Strategy<Value = Table> {
    ("[A-Za-z0-9 ]{0,8}", prop::collection::vec(column_type(), 0..5))
        .prop_flat_map(|(name, types)| {
            let row: Vec<BoxedStrategy<Value>> = types.iter().map(|t| value(*t)).collect();
            (Just(name), Just(types), prop::collection::vec(row, 0..6))
        })
        .prop_map(|(name, types, rows)| {
            let columns = types
                .into_iter()
                .enumerate()
                .map(|(i, t)| Column::new(format!("c{}", i), t));
            let mut table = Table::with_columns(name, columns).unwrap();
            for row in rows {
                table.add_row(row).unwrap();
            }
            table
        })
}

proptest! {
    #[test]
    fn encode_then_decode_is_identity(tables in prop::collection::vec(table(), 0..4)) {
        let set = TableSet::from_iter(tables);

        let compact = tablestream::to_string(&set).unwrap();
        prop_assert_eq!(&tablestream::from_str(&compact).unwrap(), &set);

        let pretty = tablestream::to_string_pretty(&set).unwrap();
        prop_assert_eq!(&tablestream::from_str(&pretty).unwrap(), &set);
    }

    #[test]
    fn output_is_plain_json(tables in prop::collection::vec(table(), 0..3)) {
        let set = TableSet::from_iter(tables);
        let parsed: serde_json::Value =
            serde_json::from_str(&tablestream::to_string(&set).unwrap()).unwrap();
        prop_assert_eq!(parsed["Tables"].as_array().map(Vec::len), Some(set.len()));
    }
}
