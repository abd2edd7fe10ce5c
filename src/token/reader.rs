//! Incremental JSON lexer over `std::io::Read`

use std::io::{BufRead, BufReader, Read};
use std::str::FromStr;

use tokio_util::sync::CancellationToken;

use super::{Token, TokenSource};
use crate::error::{Error, Result};

/// Where the lexer is inside an open container
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Frame {
    /// After `[`
    ArrayStart,
    /// After an element
    ArrayValue,
    /// After `,` in an array
    ArrayComma,
    /// After `{`
    ObjectStart,
    /// After a key, `:` not yet consumed
    ObjectKey,
    /// After a member value
    ObjectValue,
    /// After `,` in an object
    ObjectComma,
}

/// Pull-based JSON tokenizer.
///
/// Holds one frame per open container and never buffers more than the
/// token being lexed. Whitespace is insignificant everywhere.
pub struct JsonTokenReader<R: Read> {
    reader: BufReader<R>,
    stack: Vec<Frame>,
    root_done: bool,
    depth: usize,
    cancel: Option<CancellationToken>,
}

impl<R: Read> JsonTokenReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader: BufReader::new(reader),
            stack: Vec::new(),
            root_done: false,
            depth: 0,
            cancel: None,
        }
    }

    /// Abort with [`Error::Cancelled`] once `token` is cancelled
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn into_inner(self) -> R {
        self.reader.into_inner()
    }

    fn peek(&mut self) -> Result<Option<u8>> {
        let buf = self.reader.fill_buf()?;
        Ok(buf.first().copied())
    }

    fn bump(&mut self) {
        self.reader.consume(1);
    }

    fn next_byte(&mut self) -> Result<u8> {
        let b = self
            .peek()?
            .ok_or_else(|| Error::malformed("unexpected end of input"))?;
        self.bump();
        Ok(b)
    }

    fn skip_whitespace(&mut self) -> Result<Option<u8>> {
        loop {
            match self.peek()? {
                Some(b' ' | b'\t' | b'\n' | b'\r') => self.bump(),
                other => return Ok(other),
            }
        }
    }

    fn expect_literal(&mut self, rest: &[u8], token: Token) -> Result<Token> {
        for &expected in rest {
            if self.next_byte()? != expected {
                return Err(Error::malformed("invalid literal"));
            }
        }
        Ok(token)
    }

    fn read_value(&mut self, first: u8) -> Result<Token> {
        match self.stack.last_mut() {
            Some(frame) => {
                *frame = match *frame {
                    Frame::ArrayStart | Frame::ArrayComma => Frame::ArrayValue,
                    Frame::ObjectKey => Frame::ObjectValue,
                    _ => unreachable!("value read outside a value position"),
                }
            }
            None => self.root_done = true,
        }

        self.depth = self.stack.len();
        match first {
            b'{' => {
                self.bump();
                self.stack.push(Frame::ObjectStart);
                Ok(Token::StartObject)
            }
            b'[' => {
                self.bump();
                self.stack.push(Frame::ArrayStart);
                Ok(Token::StartArray)
            }
            b'"' => {
                self.bump();
                Ok(Token::String(self.read_string()?))
            }
            b't' => {
                self.bump();
                self.expect_literal(b"rue", Token::Bool(true))
            }
            b'f' => {
                self.bump();
                self.expect_literal(b"alse", Token::Bool(false))
            }
            b'n' => {
                self.bump();
                self.expect_literal(b"ull", Token::Null)
            }
            b'-' | b'0'..=b'9' => Ok(Token::Number(self.read_number()?)),
            other => Err(Error::malformed(format!(
                "unexpected character {:?}",
                char::from(other)
            ))),
        }
    }

    fn read_number(&mut self) -> Result<String> {
        let mut lexeme = String::new();
        while let Some(b) = self.peek()? {
            if !matches!(b, b'0'..=b'9' | b'-' | b'+' | b'.' | b'e' | b'E') {
                break;
            }
            lexeme.push(char::from(b));
            self.bump();
        }
        serde_json::Number::from_str(&lexeme)
            .map_err(|_| Error::malformed(format!("invalid number {:?}", lexeme)))?;
        Ok(lexeme)
    }

    fn read_hex4(&mut self) -> Result<u16> {
        let mut code = 0u16;
        for _ in 0..4 {
            let digit = char::from(self.next_byte()?)
                .to_digit(16)
                .ok_or_else(|| Error::malformed("invalid \\u escape"))?;
            code = code * 16 + digit as u16;
        }
        Ok(code)
    }

    fn read_unicode_escape(&mut self) -> Result<char> {
        let first = self.read_hex4()?;
        let code = match first {
            0xD800..=0xDBFF => {
                if self.next_byte()? != b'\\' || self.next_byte()? != b'u' {
                    return Err(Error::malformed("unpaired surrogate in string"));
                }
                let second = self.read_hex4()?;
                if !(0xDC00..=0xDFFF).contains(&second) {
                    return Err(Error::malformed("unpaired surrogate in string"));
                }
                0x10000 + ((u32::from(first) - 0xD800) << 10) + (u32::from(second) - 0xDC00)
            }
            0xDC00..=0xDFFF => return Err(Error::malformed("unpaired surrogate in string")),
            _ => u32::from(first),
        };
        char::from_u32(code).ok_or_else(|| Error::malformed("invalid \\u escape"))
    }

    /// Read string contents; the opening quote is already consumed
    fn read_string(&mut self) -> Result<String> {
        let mut bytes = Vec::new();
        loop {
            match self.next_byte()? {
                b'"' => break,
                b'\\' => {
                    let escaped = match self.next_byte()? {
                        b'"' => '"',
                        b'\\' => '\\',
                        b'/' => '/',
                        b'b' => '\u{0008}',
                        b'f' => '\u{000C}',
                        b'n' => '\n',
                        b'r' => '\r',
                        b't' => '\t',
                        b'u' => self.read_unicode_escape()?,
                        other => {
                            return Err(Error::malformed(format!(
                                "invalid escape \\{}",
                                char::from(other)
                            )))
                        }
                    };
                    let mut utf8 = [0u8; 4];
                    bytes.extend_from_slice(escaped.encode_utf8(&mut utf8).as_bytes());
                }
                b if b < 0x20 => {
                    return Err(Error::malformed("control character in string"));
                }
                b => bytes.push(b),
            }
        }
        String::from_utf8(bytes).map_err(|_| Error::malformed("string is not valid UTF-8"))
    }

    fn set_top(&mut self, frame: Frame) {
        if let Some(top) = self.stack.last_mut() {
            *top = frame;
        }
    }

    fn close(&mut self, token: Token) -> Token {
        self.bump();
        self.stack.pop();
        self.depth = self.stack.len();
        token
    }

    fn unexpected(found: Option<u8>, expected: &str) -> Error {
        match found {
            Some(b) => Error::malformed(format!(
                "expected {}, found {:?}",
                expected,
                char::from(b)
            )),
            None => Error::malformed(format!("unexpected end of input, expected {}", expected)),
        }
    }
}

impl<R: Read> TokenSource for JsonTokenReader<R> {
    fn next_token(&mut self) -> Result<Option<Token>> {
        if self.cancel.as_ref().is_some_and(CancellationToken::is_cancelled) {
            return Err(Error::Cancelled);
        }

        loop {
            let next = self.skip_whitespace()?;
            let Some(frame) = self.stack.last().copied() else {
                return match next {
                    None => Ok(None),
                    Some(b) if self.root_done => Err(Error::malformed(format!(
                        "trailing character {:?} after document",
                        char::from(b)
                    ))),
                    Some(b) => self.read_value(b).map(Some),
                };
            };

            match (frame, next) {
                (Frame::ArrayStart, Some(b']')) | (Frame::ArrayValue, Some(b']')) => {
                    return Ok(Some(self.close(Token::EndArray)));
                }
                (Frame::ArrayValue, Some(b',')) => {
                    self.bump();
                    self.set_top(Frame::ArrayComma);
                }
                (Frame::ArrayStart | Frame::ArrayComma, Some(b)) if b != b']' => {
                    return self.read_value(b).map(Some);
                }
                (Frame::ArrayValue, found) => return Err(Self::unexpected(found, "',' or ']'")),
                (Frame::ArrayStart | Frame::ArrayComma, found) => {
                    return Err(Self::unexpected(found, "a value"))
                }

                (Frame::ObjectStart, Some(b'}')) | (Frame::ObjectValue, Some(b'}')) => {
                    return Ok(Some(self.close(Token::EndObject)));
                }
                (Frame::ObjectValue, Some(b',')) => {
                    self.bump();
                    self.set_top(Frame::ObjectComma);
                }
                (Frame::ObjectStart | Frame::ObjectComma, Some(b'"')) => {
                    self.bump();
                    let name = self.read_string()?;
                    self.set_top(Frame::ObjectKey);
                    self.depth = self.stack.len();
                    return Ok(Some(Token::FieldName(name)));
                }
                (Frame::ObjectKey, Some(b':')) => {
                    self.bump();
                    match self.skip_whitespace()? {
                        Some(b) => return self.read_value(b).map(Some),
                        None => return Err(Self::unexpected(None, "a value")),
                    }
                }
                (Frame::ObjectKey, found) => return Err(Self::unexpected(found, "':'")),
                (Frame::ObjectValue, found) => return Err(Self::unexpected(found, "',' or '}'")),
                (Frame::ObjectStart | Frame::ObjectComma, found) => {
                    return Err(Self::unexpected(found, "a field name"))
                }
            }
        }
    }

    fn depth(&self) -> usize {
        self.depth
    }
}
