//! JSON token writer over `std::io::Write`

use std::io::Write;

use serde_json::ser::{CompactFormatter, Formatter, PrettyFormatter};
use tokio_util::sync::CancellationToken;

use super::TokenSink;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy)]
enum Frame {
    Array { first: bool },
    Object { first: bool, awaiting_value: bool },
}

/// Writes tokens through a serde_json [`Formatter`].
///
/// Layout (compact or indented) comes from the formatter; string escaping is
/// serde_json's own. Misordered calls, such as a value inside an object
/// without a preceding field name, fail with [`Error::MalformedStream`].
pub struct JsonTokenWriter<W: Write, F: Formatter = CompactFormatter> {
    writer: W,
    formatter: F,
    stack: Vec<Frame>,
    root_written: bool,
    cancel: Option<CancellationToken>,
}

impl<W: Write> JsonTokenWriter<W, CompactFormatter> {
    /// Writer producing JSON without insignificant whitespace
    pub fn compact(writer: W) -> Self {
        Self::with_formatter(writer, CompactFormatter)
    }
}

impl<'a, W: Write> JsonTokenWriter<W, PrettyFormatter<'a>> {
    /// Writer producing indented JSON
    pub fn pretty(writer: W) -> Self {
        Self::with_formatter(writer, PrettyFormatter::new())
    }
}

impl<W: Write, F: Formatter> JsonTokenWriter<W, F> {
    pub fn with_formatter(writer: W, formatter: F) -> Self {
        Self {
            writer,
            formatter,
            stack: Vec::new(),
            root_written: false,
            cancel: None,
        }
    }

    /// Abort with [`Error::Cancelled`] once `token` is cancelled
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn get_ref(&self) -> &W {
        &self.writer
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn check_cancelled(&self) -> Result<()> {
        if self.cancel.as_ref().is_some_and(CancellationToken::is_cancelled) {
            return Err(Error::Cancelled);
        }
        Ok(())
    }

    fn begin_value(&mut self) -> Result<()> {
        self.check_cancelled()?;
        match self.stack.last_mut() {
            Some(Frame::Array { first }) => {
                self.formatter.begin_array_value(&mut self.writer, *first)?;
                *first = false;
            }
            Some(Frame::Object { awaiting_value, .. }) if *awaiting_value => {
                self.formatter.begin_object_value(&mut self.writer)?;
                *awaiting_value = false;
            }
            Some(Frame::Object { .. }) => {
                return Err(Error::malformed("object value written without a field name"));
            }
            None if self.root_written => {
                return Err(Error::malformed("document already has a root value"));
            }
            None => self.root_written = true,
        }
        Ok(())
    }

    fn end_value(&mut self) -> Result<()> {
        match self.stack.last() {
            Some(Frame::Array { .. }) => self.formatter.end_array_value(&mut self.writer)?,
            Some(Frame::Object { .. }) => self.formatter.end_object_value(&mut self.writer)?,
            None => {}
        }
        Ok(())
    }

    fn write_scalar(
        &mut self,
        write: impl FnOnce(&mut W, &mut F) -> std::io::Result<()>,
    ) -> Result<()> {
        self.begin_value()?;
        write(&mut self.writer, &mut self.formatter)?;
        self.end_value()
    }
}

impl<W: Write, F: Formatter> TokenSink for JsonTokenWriter<W, F> {
    fn start_object(&mut self) -> Result<()> {
        self.begin_value()?;
        self.formatter.begin_object(&mut self.writer)?;
        self.stack.push(Frame::Object {
            first: true,
            awaiting_value: false,
        });
        Ok(())
    }

    fn end_object(&mut self) -> Result<()> {
        self.check_cancelled()?;
        match self.stack.pop() {
            Some(Frame::Object {
                awaiting_value: false,
                ..
            }) => {}
            _ => return Err(Error::malformed("object end without a matching object start")),
        }
        self.formatter.end_object(&mut self.writer)?;
        self.end_value()
    }

    fn start_array(&mut self) -> Result<()> {
        self.begin_value()?;
        self.formatter.begin_array(&mut self.writer)?;
        self.stack.push(Frame::Array { first: true });
        Ok(())
    }

    fn end_array(&mut self) -> Result<()> {
        self.check_cancelled()?;
        match self.stack.pop() {
            Some(Frame::Array { .. }) => {}
            _ => return Err(Error::malformed("array end without a matching array start")),
        }
        self.formatter.end_array(&mut self.writer)?;
        self.end_value()
    }

    fn field_name(&mut self, name: &str) -> Result<()> {
        self.check_cancelled()?;
        let Some(Frame::Object {
            first,
            awaiting_value,
        }) = self.stack.last_mut()
        else {
            return Err(Error::malformed("field name written outside an object"));
        };
        if *awaiting_value {
            return Err(Error::malformed("field name written where a value was expected"));
        }
        self.formatter.begin_object_key(&mut self.writer, *first)?;
        *first = false;
        *awaiting_value = true;
        serde_json::to_writer(&mut self.writer, name).map_err(std::io::Error::from)?;
        self.formatter.end_object_key(&mut self.writer)?;
        Ok(())
    }

    fn string(&mut self, value: &str) -> Result<()> {
        self.write_scalar(|w, _| serde_json::to_writer(w, value).map_err(std::io::Error::from))
    }

    fn number_str(&mut self, lexeme: &str) -> Result<()> {
        self.write_scalar(|w, f| f.write_number_str(w, lexeme))
    }

    fn bool(&mut self, value: bool) -> Result<()> {
        self.write_scalar(|w, f| f.write_bool(w, value))
    }

    fn null(&mut self) -> Result<()> {
        self.write_scalar(|w, f| f.write_null(w))
    }

    fn flush(&mut self) -> Result<()> {
        self.check_cancelled()?;
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_sample<S: TokenSink>(sink: &mut S) -> Result<()> {
        sink.start_object()?;
        sink.field_name("k")?;
        sink.start_array()?;
        sink.string("a\"b")?;
        sink.number_str("1.50")?;
        sink.bool(true)?;
        sink.null()?;
        sink.start_array()?;
        sink.end_array()?;
        sink.end_array()?;
        sink.end_object()
    }

    #[test]
    fn test_compact_output() {
        let mut writer = JsonTokenWriter::compact(Vec::new());
        write_sample(&mut writer).unwrap();
        let out = String::from_utf8(writer.into_inner()).unwrap();
        assert_eq!(out, r#"{"k":["a\"b",1.50,true,null,[]]}"#);
    }

    #[test]
    fn test_pretty_output_parses_to_same_value() {
        let mut writer = JsonTokenWriter::pretty(Vec::new());
        write_sample(&mut writer).unwrap();
        let out = String::from_utf8(writer.into_inner()).unwrap();
        assert!(out.contains('\n'));
        let parsed: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(parsed["k"][0], "a\"b");
        assert_eq!(parsed["k"][4], serde_json::json!([]));
    }

    #[test]
    fn test_misordered_calls_fail() {
        let mut writer = JsonTokenWriter::compact(Vec::new());
        writer.start_object().unwrap();
        assert!(writer.string("x").is_err());

        let mut writer = JsonTokenWriter::compact(Vec::new());
        writer.start_array().unwrap();
        assert!(writer.field_name("x").is_err());
        assert!(writer.end_object().is_err());
    }

    #[test]
    fn test_cancelled_writer_stops() {
        let cancel = CancellationToken::new();
        let mut writer = JsonTokenWriter::compact(Vec::new()).with_cancellation(cancel.clone());
        writer.start_array().unwrap();
        cancel.cancel();
        assert!(matches!(writer.null(), Err(Error::Cancelled)));
        assert!(matches!(writer.flush(), Err(Error::Cancelled)));
    }
}
