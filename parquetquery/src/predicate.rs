//! Pluggable filters at chunk, page, value, and group granularity (§4.1.1).
//!
//! A leaf column iterator holds at most one [`Predicate`]; composition
//! (AND/OR) is left to callers building predicates, not specified by the
//! engine itself. A composite iterator holds at most one [`GroupPredicate`].

use crate::block::{ColumnChunk, Page};
use tempo_model::{IteratorResult, Value};

/// Filters consulted by a column iterator before opening a chunk, before
/// scanning a page, and per value. All three are optional capabilities: a
/// predicate that only cares about values can leave the chunk/page methods
/// at their default (always keep).
pub trait Predicate: Send + Sync {
    fn keep_column_chunk(&self, _chunk: &dyn ColumnChunk) -> bool {
        true
    }

    fn keep_page(&self, _page: &dyn Page) -> bool {
        true
    }

    fn keep_value(&self, _value: &Value) -> bool {
        true
    }
}

/// Consulted by compositional iterators on an assembled group.
pub trait GroupPredicate: Send + Sync {
    fn keep_group(&self, result: &IteratorResult) -> bool;
}

impl<F> GroupPredicate for F
where
    F: Fn(&IteratorResult) -> bool + Send + Sync,
{
    fn keep_group(&self, result: &IteratorResult) -> bool {
        self(result)
    }
}

/// A predicate that rejects values failing a string equality check. Also
/// consults chunk statistics (when present) so whole chunks that cannot
/// contain the value are skipped without reading any pages.
pub struct StringEqualPredicate {
    pub value: Vec<u8>,
}

impl Predicate for StringEqualPredicate {
    fn keep_column_chunk(&self, chunk: &dyn ColumnChunk) -> bool {
        match chunk.statistics() {
            Some(stats) => match (&stats.min, &stats.max) {
                (Some(min), Some(max)) => {
                    let v = Value::string(self.value.clone(), 0, 0);
                    value_le(&min.data, &v.data) && value_le(&v.data, &max.data)
                }
                _ => true,
            },
            None => true,
        }
    }

    fn keep_value(&self, value: &Value) -> bool {
        value.as_bytes() == Some(self.value.as_slice())
    }
}

fn value_le(a: &tempo_model::ValueData, b: &tempo_model::ValueData) -> bool {
    use tempo_model::ValueData::*;
    match (a, b) {
        (Bytes(x), Bytes(y)) => x <= y,
        (Int(x), Int(y)) => x <= y,
        (Float(x), Float(y)) => x <= y,
        _ => true,
    }
}

/// A predicate that keeps a value iff it is non-null (the "presence" /
/// `!= nil` operator from §4.2.1).
pub struct PresencePredicate;

impl Predicate for PresencePredicate {
    fn keep_value(&self, value: &Value) -> bool {
        !value.is_null()
    }
}

/// Realizes attribute-map membership queries over paired `keys`/`values`
/// columns collected into the same group (§4.1.4): true iff for every
/// `(k_i, v_i)` in the predicate, some `(keys[j], values[j])` in the group
/// matches byte-for-byte.
pub struct KeyValueGroupPredicate {
    pub keys_column: String,
    pub values_column: String,
    pub pairs: Vec<(Vec<u8>, Vec<u8>)>,
}

impl GroupPredicate for KeyValueGroupPredicate {
    fn keep_group(&self, result: &IteratorResult) -> bool {
        let keys: Vec<&Value> = result.entries_for(&self.keys_column).collect();
        let values: Vec<&Value> = result.entries_for(&self.values_column).collect();

        self.pairs.iter().all(|(k, v)| {
            keys.iter()
                .zip(values.iter())
                .any(|(kv_k, kv_v)| kv_k.as_bytes() == Some(k.as_slice()) && kv_v.as_bytes() == Some(v.as_slice()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempo_model::RowNumber;

    #[test]
    fn key_value_group_predicate_matches_pair() {
        let mut result = IteratorResult::new(RowNumber::at_row(0));
        result.push_entry("keys", Value::string(b"http.method".to_vec(), 0, 2));
        result.push_entry("values", Value::string(b"GET".to_vec(), 0, 2));
        result.push_entry("keys", Value::string(b"http.status_code".to_vec(), 0, 2));
        result.push_entry("values", Value::int(200, 0, 2));

        let pred = KeyValueGroupPredicate {
            keys_column: "keys".into(),
            values_column: "values".into(),
            pairs: vec![(b"http.method".to_vec(), b"GET".to_vec())],
        };
        assert!(pred.keep_group(&result));

        let pred_miss = KeyValueGroupPredicate {
            keys_column: "keys".into(),
            values_column: "values".into(),
            pairs: vec![(b"http.method".to_vec(), b"POST".to_vec())],
        };
        assert!(!pred_miss.keep_group(&result));
    }

    #[test]
    fn presence_predicate_rejects_null() {
        let p = PresencePredicate;
        assert!(!p.keep_value(&Value::null(0, 0)));
        assert!(p.keep_value(&Value::int(1, 0, 1)));
    }
}
