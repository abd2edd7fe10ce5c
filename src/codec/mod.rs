//! Table set codec: type tags, encoder and decoder

mod decoder;
mod encoder;
pub mod tag;

use std::io::{Read, Write};

use tokio_util::sync::CancellationToken;

use crate::config::{Config, OutputStyle};
use crate::error::Result;
use crate::model::TableSet;
use crate::token::{JsonTokenReader, JsonTokenWriter};

pub use decoder::{decode, Decoder, State};
pub use encoder::Encoder;

/// Encode a table set to a writer
pub fn to_writer<W: Write>(writer: W, tables: &TableSet, config: &Config) -> Result<()> {
    to_writer_with_cancellation(writer, tables, config, CancellationToken::new())
}

/// Encode a table set to a writer, aborting once `cancel` fires
pub fn to_writer_with_cancellation<W: Write>(
    writer: W,
    tables: &TableSet,
    config: &Config,
    cancel: CancellationToken,
) -> Result<()> {
    match config.style {
        OutputStyle::Compact => {
            let sink = JsonTokenWriter::compact(writer).with_cancellation(cancel);
            Encoder::new(sink)
                .with_flush_at_boundaries(config.flush_at_boundaries)
                .encode(tables)
        }
        OutputStyle::Pretty => {
            let sink = JsonTokenWriter::pretty(writer).with_cancellation(cancel);
            Encoder::new(sink)
                .with_flush_at_boundaries(config.flush_at_boundaries)
                .encode(tables)
        }
    }
}

/// Encode a table set as a compact JSON string
pub fn to_string(tables: &TableSet) -> Result<String> {
    encode_to_string(tables, &Config::default())
}

/// Encode a table set as an indented JSON string
pub fn to_string_pretty(tables: &TableSet) -> Result<String> {
    encode_to_string(tables, &Config::default().with_style(OutputStyle::Pretty))
}

fn encode_to_string(tables: &TableSet, config: &Config) -> Result<String> {
    let mut buf = Vec::new();
    to_writer(&mut buf, tables, config)?;
    // The writer only ever emits UTF-8
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// Decode a table set from a reader
pub fn from_reader<R: Read>(reader: R) -> Result<TableSet> {
    decode(JsonTokenReader::new(reader))
}

/// Decode a table set from a reader, aborting once `cancel` fires
pub fn from_reader_with_cancellation<R: Read>(
    reader: R,
    cancel: CancellationToken,
) -> Result<TableSet> {
    decode(JsonTokenReader::new(reader).with_cancellation(cancel))
}

/// Decode a table set from a string
pub fn from_str(json: &str) -> Result<TableSet> {
    from_reader(json.as_bytes())
}
