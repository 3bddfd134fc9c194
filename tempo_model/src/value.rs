//! The typed leaf value read from a column, carrying the repetition and
//! definition level it was produced at.

use std::fmt;

/// A leaf value in the column format.
#[derive(Clone, PartialEq)]
pub enum ValueData {
    Int(i64),
    Float(f64),
    /// Opaque bytes; used for both UTF-8 strings and raw byte columns (e.g.
    /// trace/span ids). Callers that need a `str` validate at the edge.
    Bytes(Vec<u8>),
    Bool(bool),
    Null,
}

impl fmt::Debug for ValueData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueData::Int(v) => write!(f, "Int({v})"),
            ValueData::Float(v) => write!(f, "Float({v})"),
            ValueData::Bytes(v) => match std::str::from_utf8(v) {
                Ok(s) => write!(f, "Bytes({s:?})"),
                Err(_) => write!(f, "Bytes({v:?})"),
            },
            ValueData::Bool(v) => write!(f, "Bool({v})"),
            ValueData::Null => write!(f, "Null"),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Value {
    pub data: ValueData,
    /// Repetition level at which this value occurred.
    pub repetition_level: u8,
    /// Definition level at which this value occurred.
    pub definition_level: u8,
}

impl Value {
    pub fn new(data: ValueData, repetition_level: u8, definition_level: u8) -> Self {
        Self {
            data,
            repetition_level,
            definition_level,
        }
    }

    pub fn null(repetition_level: u8, definition_level: u8) -> Self {
        Self::new(ValueData::Null, repetition_level, definition_level)
    }

    pub fn is_null(&self) -> bool {
        matches!(self.data, ValueData::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match &self.data {
            ValueData::Bytes(b) => std::str::from_utf8(b).ok(),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match &self.data {
            ValueData::Bytes(b) => Some(b.as_slice()),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match &self.data {
            ValueData::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match &self.data {
            ValueData::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match &self.data {
            ValueData::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn string(s: impl Into<Vec<u8>>, repetition_level: u8, definition_level: u8) -> Self {
        Self::new(ValueData::Bytes(s.into()), repetition_level, definition_level)
    }

    pub fn int(v: i64, repetition_level: u8, definition_level: u8) -> Self {
        Self::new(ValueData::Int(v), repetition_level, definition_level)
    }

    pub fn boolean(v: bool, repetition_level: u8, definition_level: u8) -> Self {
        Self::new(ValueData::Bool(v), repetition_level, definition_level)
    }
}
