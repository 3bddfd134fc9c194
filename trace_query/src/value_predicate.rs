//! Translates a [`crate::request::Op`] plus its operands into the
//! value-level and group-level predicates `parquetquery` consumes (§4.2.4:
//! intrinsic encoding, and §4.1.4: key/value group matching).

use std::cmp::Ordering;
use std::sync::Arc;

use parquetquery::{GroupPredicate, Predicate};
use tempo_model::spanset::Static;
use tempo_model::{IteratorResult, Value, ValueData};

use crate::error::Error;
use crate::request::Op;

fn static_eq(operand: &Static, value: &Value) -> bool {
    match (operand, &value.data) {
        (Static::Nil, ValueData::Null) => true,
        (Static::String(s), ValueData::Bytes(b)) => s.as_bytes() == b.as_slice(),
        (Static::Int(i), ValueData::Int(v)) => i == v,
        (Static::Duration(ns), ValueData::Int(v)) => ns == v,
        (Static::Float(f), ValueData::Float(v)) => f == v,
        (Static::Bool(b), ValueData::Bool(v)) => b == v,
        _ => false,
    }
}

fn static_cmp(value: &Value, operand: &Static) -> Option<Ordering> {
    match (&value.data, operand) {
        (ValueData::Int(v), Static::Int(o)) => Some(v.cmp(o)),
        (ValueData::Int(v), Static::Duration(o)) => Some(v.cmp(o)),
        (ValueData::Float(v), Static::Float(o)) => v.partial_cmp(o),
        _ => None,
    }
}

/// A compiled `(op, operands)` pair that can be asked whether a single
/// column [`Value`] matches.
pub struct ConditionPredicate {
    op: Op,
    operands: Vec<Static>,
    regexes: Vec<regex::Regex>,
}

impl ConditionPredicate {
    pub fn compile(op: Op, operands: Vec<Static>) -> Result<Self, Error> {
        let mut regexes = Vec::new();
        if matches!(op, Op::Regex | Op::NotRegex) {
            for operand in &operands {
                let pattern = match operand {
                    Static::String(s) => s.clone(),
                    other => other.to_string(),
                };
                let re = regex::Regex::new(&pattern).map_err(|source| Error::BadRegex {
                    pattern: pattern.clone(),
                    source,
                })?;
                regexes.push(re);
            }
        }
        Ok(Self { op, operands, regexes })
    }

    pub fn matches_value(&self, value: &Value) -> bool {
        match self.op {
            Op::NoFilter => true,
            Op::Presence => !value.is_null(),
            Op::Equal => self.operands.iter().any(|o| static_eq(o, value)),
            Op::NotEqual => !self.operands.iter().any(|o| static_eq(o, value)),
            Op::Greater => self.operands.iter().all(|o| static_cmp(value, o) == Some(Ordering::Greater)),
            Op::GreaterEqual => self
                .operands
                .iter()
                .all(|o| matches!(static_cmp(value, o), Some(Ordering::Greater | Ordering::Equal))),
            Op::Less => self.operands.iter().all(|o| static_cmp(value, o) == Some(Ordering::Less)),
            Op::LessEqual => self
                .operands
                .iter()
                .all(|o| matches!(static_cmp(value, o), Some(Ordering::Less | Ordering::Equal))),
            Op::Regex => value.as_str().map(|s| self.regexes.iter().any(|r| r.is_match(s))).unwrap_or(false),
            Op::NotRegex => value.as_str().map(|s| !self.regexes.iter().any(|r| r.is_match(s))).unwrap_or(true),
        }
    }
}

impl Predicate for ConditionPredicate {
    fn keep_value(&self, value: &Value) -> bool {
        self.matches_value(value)
    }
}

/// Matches one attribute-map entry (a `("keys", k)`/`("values", v)` pair
/// joined at the attribute's own definition level): true iff the key equals
/// `key` and the value satisfies the wrapped [`ConditionPredicate`].
pub struct AttributePredicate {
    pub key: Vec<u8>,
    pub predicate: ConditionPredicate,
}

impl GroupPredicate for AttributePredicate {
    fn keep_group(&self, result: &IteratorResult) -> bool {
        match (result.first_entry("keys"), result.first_entry("values")) {
            (Some(k), Some(v)) => k.as_bytes() == Some(self.key.as_slice()) && self.predicate.matches_value(v),
            _ => false,
        }
    }
}

pub fn arc_predicate(op: Op, operands: Vec<Static>) -> Result<Arc<dyn Predicate>, Error> {
    Ok(Arc::new(ConditionPredicate::compile(op, operands)?))
}
