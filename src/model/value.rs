//! Cell values and the exact decimal representation

use std::str::FromStr;

use chrono::{DateTime, FixedOffset};
use uuid::Uuid;

use super::schema::{ColumnType, Kind};
use crate::error::Error;

/// Largest scale a [`Decimal`] may carry
pub const MAX_DECIMAL_SCALE: u8 = 28;

/// Exact base-10 number: `mantissa * 10^-scale`.
///
/// Parsed straight from the JSON number lexeme so no precision is lost to
/// binary floating point. `1.0` and `1.00` are distinct values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Decimal {
    mantissa: i128,
    scale: u8,
}

impl Decimal {
    pub fn new(mantissa: i128, scale: u8) -> Result<Self, Error> {
        if scale > MAX_DECIMAL_SCALE {
            return Err(Error::unsupported(format!(
                "decimal scale {} exceeds {}",
                scale, MAX_DECIMAL_SCALE
            )));
        }
        Ok(Self { mantissa, scale })
    }

    pub fn mantissa(&self) -> i128 {
        self.mantissa
    }

    pub fn scale(&self) -> u8 {
        self.scale
    }
}

impl FromStr for Decimal {
    type Err = Error;

    /// Parse a JSON number lexeme (`-12.50`, `3e-2`, `7E+1`)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || Error::unsupported(format!("{:?} is not a decimal number", s));

        let (number, exponent) = match s.find(['e', 'E']) {
            Some(pos) => (&s[..pos], parse_exponent(&s[pos + 1..]).ok_or_else(invalid)?),
            None => (s, Some(0)),
        };

        let (negative, digits) = match number.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, number),
        };
        let (int_part, frac_part) = digits.split_once('.').unwrap_or((digits, ""));
        if int_part.is_empty() || !int_part.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        if !frac_part.bytes().all(|b| b.is_ascii_digit()) || digits.ends_with('.') {
            return Err(invalid());
        }

        // Accumulate with the final sign so i128::MIN stays representable
        let mut mantissa: i128 = 0;
        for b in int_part.bytes().chain(frac_part.bytes()) {
            let digit = i128::from(b - b'0');
            mantissa = mantissa
                .checked_mul(10)
                .and_then(|m| {
                    if negative {
                        m.checked_sub(digit)
                    } else {
                        m.checked_add(digit)
                    }
                })
                .ok_or_else(invalid)?;
        }

        let frac_len = i64::try_from(frac_part.len()).map_err(|_| invalid())?;
        if mantissa == 0 {
            // Zero never overflows, so any exponent only moves the scale
            let scale = exponent
                .map(|e| frac_len.saturating_sub(e).clamp(0, i64::from(MAX_DECIMAL_SCALE)))
                .unwrap_or(0);
            return Decimal::new(0, scale as u8);
        }

        let scale = frac_len.saturating_sub(exponent.ok_or_else(invalid)?);
        if scale < 0 {
            let shift = u32::try_from(-scale).map_err(|_| invalid())?;
            mantissa = 10i128
                .checked_pow(shift)
                .and_then(|factor| mantissa.checked_mul(factor))
                .ok_or_else(invalid)?;
            return Decimal::new(mantissa, 0);
        }
        let scale = u8::try_from(scale).map_err(|_| invalid())?;
        Decimal::new(mantissa, scale)
    }
}

/// Exponent digits after `e`; `Some(None)` when well formed but beyond i64
fn parse_exponent(s: &str) -> Option<Option<i64>> {
    let digits = s.strip_prefix(['+', '-']).unwrap_or(s);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(s.parse::<i64>().ok())
}

impl std::fmt::Display for Decimal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let digits = self.mantissa.unsigned_abs().to_string();
        let sign = if self.mantissa < 0 { "-" } else { "" };
        let scale = usize::from(self.scale);
        if scale == 0 {
            return write!(f, "{}{}", sign, digits);
        }
        if digits.len() > scale {
            let (int_part, frac_part) = digits.split_at(digits.len() - scale);
            write!(f, "{}{}.{}", sign, int_part, frac_part)
        } else {
            write!(f, "{}0.{:0>width$}", sign, digits, width = scale)
        }
    }
}

/// A cell value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    String(String),
    Integer(i64),
    Float(f64),
    Decimal(Decimal),
    Boolean(bool),
    DateTime(DateTime<FixedOffset>),
    Guid(Uuid),
    /// Elements of a list column, each of the column's kind or `Null`
    List(Vec<Value>),
}

impl Value {
    /// Check if the value is null
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Scalar kind of the value; `None` for `Null` and lists
    pub fn kind(&self) -> Option<Kind> {
        match self {
            Value::String(_) => Some(Kind::String),
            Value::Integer(_) => Some(Kind::Integer),
            Value::Float(_) => Some(Kind::Float),
            Value::Decimal(_) => Some(Kind::Decimal),
            Value::Boolean(_) => Some(Kind::Boolean),
            Value::DateTime(_) => Some(Kind::DateTime),
            Value::Guid(_) => Some(Kind::Guid),
            Value::Null | Value::List(_) => None,
        }
    }

    /// Whether this value may be stored in a column of the given type
    pub fn is_assignable_to(&self, column_type: ColumnType) -> bool {
        match (self, column_type) {
            (Value::Null, _) => true,
            (Value::List(items), ColumnType::List(kind)) => items
                .iter()
                .all(|item| item.is_null() || item.kind() == Some(kind)),
            (value, ColumnType::Scalar(kind)) => value.kind() == Some(kind),
            _ => false,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<Decimal> for Value {
    fn from(d: Decimal) -> Self {
        Value::Decimal(d)
    }
}

impl From<DateTime<FixedOffset>> for Value {
    fn from(dt: DateTime<FixedOffset>) -> Self {
        Value::DateTime(dt)
    }
}

impl From<Uuid> for Value {
    fn from(id: Uuid) -> Self {
        Value::Guid(id)
    }
}

impl<T> From<Vec<T>> for Value
where
    T: Into<Value>,
{
    fn from(items: Vec<T>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}

impl<T> From<Option<T>> for Value
where
    T: Into<Value>,
{
    fn from(opt: Option<T>) -> Self {
        match opt {
            Some(v) => v.into(),
            None => Value::Null,
        }
    }
}
