use std::fmt::Display;

use crate::common::STRING_MAX_SIZE;
use crate::error::{DbError, Result};
use crate::execution::predicate::Op;
use crate::storage::codec::{Deserializer, Serializer};

/// The primitive column types. Both serialize to a fixed number of bytes.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Type {
    Int,
    Str,
}

impl Type {
    /// Serialized width in bytes of a field of this type.
    pub fn len(&self) -> usize {
        match self {
            Type::Int => std::mem::size_of::<i32>(),
            Type::Str => std::mem::size_of::<u32>() + STRING_MAX_SIZE,
        }
    }

    /// Parses a field of this type from the byte stream. Inverse of
    /// [`Field::serialize`].
    pub fn parse(&self, de: &mut Deserializer) -> Result<Field> {
        match self {
            Type::Int => Ok(Field::Int(de.read_i32()?)),
            Type::Str => {
                let len = de.read_u32()? as usize;
                if len > STRING_MAX_SIZE {
                    return Err(DbError::FormatError(format!(
                        "string length prefix {} exceeds the maximum of {}",
                        len, STRING_MAX_SIZE
                    )));
                }
                let bytes = de.read_bytes(STRING_MAX_SIZE)?;
                let val = std::str::from_utf8(&bytes[..len])
                    .map_err(|_| {
                        DbError::FormatError("string field is not valid UTF-8".to_owned())
                    })?
                    .to_owned();
                Ok(Field::Str(val))
            }
        }
    }
}

impl Display for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Type::Int => write!(f, "int"),
            Type::Str => write!(f, "string"),
        }
    }
}

fn compare<T: PartialEq + PartialOrd + ?Sized>(left: &T, right: &T, op: Op) -> bool {
    match op {
        Op::Equals | Op::Like => left == right,
        Op::NotEquals => left != right,
        Op::LessThan => left < right,
        Op::LessThanOrEq => left <= right,
        Op::GreaterThan => left > right,
        Op::GreaterThanOrEq => left >= right,
    }
}

/// A single column value.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Field {
    Int(i32),
    Str(String),
}

impl Field {
    /// Builds a string field, truncating at a character boundary so the
    /// value fits the fixed serialized width.
    pub fn string(val: impl Into<String>) -> Self {
        let mut val = val.into();
        if val.len() > STRING_MAX_SIZE {
            let mut end = STRING_MAX_SIZE;
            while !val.is_char_boundary(end) {
                end -= 1;
            }
            val.truncate(end);
        }
        Field::Str(val)
    }

    pub fn field_type(&self) -> Type {
        match self {
            Field::Int(_) => Type::Int,
            Field::Str(_) => Type::Str,
        }
    }

    /// Writes exactly `self.field_type().len()` bytes. Integers are
    /// big-endian; strings are a big-endian length prefix followed by the
    /// NUL-padded payload.
    pub fn serialize(&self, ser: &mut Serializer) {
        match self {
            Field::Int(val) => ser.write_i32(*val),
            Field::Str(val) => {
                ser.write_u32(val.len() as u32);
                ser.write_bytes(val.as_bytes());
                ser.write_zeros(STRING_MAX_SIZE - val.len());
            }
        }
    }

    /// Compares against another field of the same type. For strings, LIKE
    /// is substring containment; for integers it degrades to equality.
    pub fn compare(&self, op: Op, other: &Field) -> Result<bool> {
        match (self, other) {
            (Field::Int(left), Field::Int(right)) => Ok(compare(left, right, op)),
            (Field::Str(left), Field::Str(right)) => match op {
                Op::Like => Ok(left.contains(right.as_str())),
                _ => Ok(compare(left.as_str(), right.as_str(), op)),
            },
            (left, right) => Err(DbError::SchemaViolation(format!(
                "cannot compare a {} field with a {} field",
                left.field_type(),
                right.field_type()
            ))),
        }
    }
}

impl Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Field::Int(val) => Display::fmt(val, f),
            Field::Str(val) => Display::fmt(val, f),
        }
    }
}
