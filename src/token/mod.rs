//! Token-level access to JSON documents
//!
//! The codec never sees bytes. It pulls tokens from a [`TokenSource`] and
//! pushes tokens into a [`TokenSink`], so neither side has to materialize a
//! whole document. [`JsonTokenReader`] and [`JsonTokenWriter`] are the
//! byte-channel implementations over `std::io`.

mod reader;
mod writer;

use crate::error::Result;

pub use reader::JsonTokenReader;
pub use writer::JsonTokenWriter;

/// A single JSON structural or scalar token
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    StartObject,
    EndObject,
    StartArray,
    EndArray,
    FieldName(String),
    String(String),
    /// Raw number lexeme, interpreted by the consumer
    Number(String),
    Bool(bool),
    Null,
}

impl Token {
    /// Short description used in error messages
    pub fn describe(&self) -> &'static str {
        match self {
            Token::StartObject => "object start",
            Token::EndObject => "object end",
            Token::StartArray => "array start",
            Token::EndArray => "array end",
            Token::FieldName(_) => "field name",
            Token::String(_) => "string",
            Token::Number(_) => "number",
            Token::Bool(_) => "boolean",
            Token::Null => "null",
        }
    }
}

/// Forward-only reader of JSON tokens
pub trait TokenSource {
    /// Read the next token; `None` once the input is exhausted
    fn next_token(&mut self) -> Result<Option<Token>>;

    /// Nesting depth of the last token returned.
    ///
    /// Start and end tokens report the level of the container they open or
    /// close, the root being level 0. Field names and scalars report the
    /// level of their enclosing container plus one.
    fn depth(&self) -> usize;
}

/// Forward-only writer of JSON tokens
pub trait TokenSink {
    fn start_object(&mut self) -> Result<()>;
    fn end_object(&mut self) -> Result<()>;
    fn start_array(&mut self) -> Result<()>;
    fn end_array(&mut self) -> Result<()>;
    fn field_name(&mut self, name: &str) -> Result<()>;
    fn string(&mut self, value: &str) -> Result<()>;
    /// Write an already validated JSON number lexeme
    fn number_str(&mut self, lexeme: &str) -> Result<()>;
    fn bool(&mut self, value: bool) -> Result<()>;
    fn null(&mut self) -> Result<()>;
    /// Push buffered output to the underlying channel
    fn flush(&mut self) -> Result<()>;
}

impl<T: TokenSource + ?Sized> TokenSource for &mut T {
    fn next_token(&mut self) -> Result<Option<Token>> {
        (**self).next_token()
    }

    fn depth(&self) -> usize {
        (**self).depth()
    }
}

impl<T: TokenSink + ?Sized> TokenSink for &mut T {
    fn start_object(&mut self) -> Result<()> {
        (**self).start_object()
    }

    fn end_object(&mut self) -> Result<()> {
        (**self).end_object()
    }

    fn start_array(&mut self) -> Result<()> {
        (**self).start_array()
    }

    fn end_array(&mut self) -> Result<()> {
        (**self).end_array()
    }

    fn field_name(&mut self, name: &str) -> Result<()> {
        (**self).field_name(name)
    }

    fn string(&mut self, value: &str) -> Result<()> {
        (**self).string(value)
    }

    fn number_str(&mut self, lexeme: &str) -> Result<()> {
        (**self).number_str(lexeme)
    }

    fn bool(&mut self, value: bool) -> Result<()> {
        (**self).bool(value)
    }

    fn null(&mut self) -> Result<()> {
        (**self).null()
    }

    fn flush(&mut self) -> Result<()> {
        (**self).flush()
    }
}
