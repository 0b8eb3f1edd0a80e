//! Tagged wire form for values.
//!
//! A value travels as a two-element JSON array `[type, payload]`:
//!
//! | type | payload |
//! |---|---|
//! | `empty` | `null` |
//! | `string` / `string_index` | `"text"` / table index |
//! | `string_list` / `string_list_indices` | array of strings / indices |
//! | `string_set` / `string_set_indices` | array of strings / indices |
//! | `int`, `int_list`, `int_set` | integer / array of integers |
//! | `dbl` | number |
//! | `duration` | signed nanoseconds |
//! | `timestamp` | `[seconds, nanos]` |

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    Empty,
    String,
    StringIndex,
    StringList,
    StringListIndices,
    StringSet,
    StringSetIndices,
    Int,
    IntList,
    IntSet,
    Dbl,
    Duration,
    Timestamp,
}

impl ValueType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueType::Empty => "empty",
            ValueType::String => "string",
            ValueType::StringIndex => "string_index",
            ValueType::StringList => "string_list",
            ValueType::StringListIndices => "string_list_indices",
            ValueType::StringSet => "string_set",
            ValueType::StringSetIndices => "string_set_indices",
            ValueType::Int => "int",
            ValueType::IntList => "int_list",
            ValueType::IntSet => "int_set",
            ValueType::Dbl => "dbl",
            ValueType::Duration => "duration",
            ValueType::Timestamp => "timestamp",
        }
    }
}

/// `[ValueType, payload]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireValue(pub ValueType, pub serde_json::Value);

impl WireValue {
    pub fn new(kind: ValueType, payload: serde_json::Value) -> Self {
        WireValue(kind, payload)
    }

    pub fn kind(&self) -> ValueType {
        self.0
    }

    pub fn payload(&self) -> &serde_json::Value {
        &self.1
    }
}

/// Errors decoding a wire value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireError {
    /// Payload does not have the shape its type tag requires.
    BadPayload { kind: ValueType, message: String },
    /// A string index points past the end of the string table.
    IndexOutOfRange { index: u64, table_len: usize },
}

impl fmt::Display for WireError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WireError::BadPayload { kind, message } => {
                write!(f, "bad '{}' payload: {}", kind.as_str(), message)
            }
            WireError::IndexOutOfRange { index, table_len } => {
                write!(
                    f,
                    "string table index {} out of range (table has {} entries)",
                    index, table_len
                )
            }
        }
    }
}

impl std::error::Error for WireError {}

/// Deduplicating string table accumulated while encoding a response.
#[derive(Debug, Default, Clone)]
pub struct StringTableBuilder {
    strings: Vec<String>,
    indices: HashMap<String, usize>,
}

impl StringTableBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index of `s`, interning it on first use.
    pub fn index(&mut self, s: &str) -> usize {
        if let Some(&idx) = self.indices.get(s) {
            return idx;
        }
        let idx = self.strings.len();
        self.strings.push(s.to_owned());
        self.indices.insert(s.to_owned(), idx);
        idx
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }

    pub fn into_table(self) -> Vec<String> {
        self.strings
    }
}

// ──────────────────────────────────────────────
// Payload readers
// ──────────────────────────────────────────────

fn bad(kind: ValueType, message: impl Into<String>) -> WireError {
    WireError::BadPayload {
        kind,
        message: message.into(),
    }
}

fn lookup(table: &[String], index: u64) -> Result<String, WireError> {
    usize::try_from(index)
        .ok()
        .and_then(|i| table.get(i))
        .cloned()
        .ok_or(WireError::IndexOutOfRange {
            index,
            table_len: table.len(),
        })
}

impl WireValue {
    /// Read a single string, resolving table indices.
    pub fn read_string(&self, table: &[String]) -> Result<String, WireError> {
        match self.0 {
            ValueType::String => self
                .1
                .as_str()
                .map(str::to_owned)
                .ok_or_else(|| bad(self.0, "expected a string")),
            ValueType::StringIndex => {
                let idx = self
                    .1
                    .as_u64()
                    .ok_or_else(|| bad(self.0, "expected a non-negative index"))?;
                lookup(table, idx)
            }
            other => Err(bad(other, "not a string type")),
        }
    }

    /// Read a string sequence (list or set form), resolving table indices.
    pub fn read_strings(&self, table: &[String]) -> Result<Vec<String>, WireError> {
        let arr = self
            .1
            .as_array()
            .ok_or_else(|| bad(self.0, "expected an array"))?;
        match self.0 {
            ValueType::StringList | ValueType::StringSet => arr
                .iter()
                .map(|v| {
                    v.as_str()
                        .map(str::to_owned)
                        .ok_or_else(|| bad(self.0, "expected array of strings"))
                })
                .collect(),
            ValueType::StringListIndices | ValueType::StringSetIndices => arr
                .iter()
                .map(|v| {
                    let idx = v
                        .as_u64()
                        .ok_or_else(|| bad(self.0, "expected array of indices"))?;
                    lookup(table, idx)
                })
                .collect(),
            other => Err(bad(other, "not a string sequence type")),
        }
    }

    pub fn read_int(&self) -> Result<i64, WireError> {
        if let Some(i) = self.1.as_i64() {
            return Ok(i);
        }
        self.1
            .as_f64()
            .map(|f| f.floor() as i64)
            .ok_or_else(|| bad(self.0, "expected a number"))
    }

    pub fn read_ints(&self) -> Result<Vec<i64>, WireError> {
        let arr = self
            .1
            .as_array()
            .ok_or_else(|| bad(self.0, "expected an array"))?;
        arr.iter()
            .map(|v| {
                v.as_i64()
                    .or_else(|| v.as_f64().map(|f| f.floor() as i64))
                    .ok_or_else(|| bad(self.0, "expected array of integers"))
            })
            .collect()
    }

    pub fn read_f64(&self) -> Result<f64, WireError> {
        self.1
            .as_f64()
            .ok_or_else(|| bad(self.0, "expected a number"))
    }

    /// `[seconds, nanos]`
    pub fn read_timestamp(&self) -> Result<(i64, i64), WireError> {
        let arr = self
            .1
            .as_array()
            .filter(|a| a.len() == 2)
            .ok_or_else(|| bad(self.0, "expected [seconds, nanos]"))?;
        let seconds = arr[0]
            .as_i64()
            .ok_or_else(|| bad(self.0, "seconds must be an integer"))?;
        let nanos = arr[1]
            .as_i64()
            .ok_or_else(|| bad(self.0, "nanos must be an integer"))?;
        Ok((seconds, nanos))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn serializes_as_pair() {
        let w = WireValue::new(ValueType::IntSet, json!([1, 2]));
        assert_eq!(serde_json::to_value(&w).unwrap(), json!(["int_set", [1, 2]]));
        let back: WireValue = serde_json::from_value(json!(["string_index", 3])).unwrap();
        assert_eq!(back.kind(), ValueType::StringIndex);
        assert_eq!(back.payload(), &json!(3));
    }

    #[test]
    fn string_table_interns() {
        let mut t = StringTableBuilder::new();
        assert_eq!(t.index("a"), 0);
        assert_eq!(t.index("b"), 1);
        assert_eq!(t.index("a"), 0);
        assert_eq!(t.len(), 2);
        assert_eq!(t.into_table(), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn reads_indexed_strings() {
        let table = vec!["x".to_string(), "y".to_string()];
        let w = WireValue::new(ValueType::StringListIndices, json!([1, 0, 1]));
        assert_eq!(w.read_strings(&table).unwrap(), vec!["y", "x", "y"]);
        let w = WireValue::new(ValueType::StringIndex, json!(5));
        assert_eq!(
            w.read_string(&table).unwrap_err(),
            WireError::IndexOutOfRange {
                index: 5,
                table_len: 2
            }
        );
    }

    #[test]
    fn int_payload_is_floored() {
        let w = WireValue::new(ValueType::Int, json!(2.7));
        assert_eq!(w.read_int().unwrap(), 2);
        let w = WireValue::new(ValueType::Int, json!(-2.5));
        assert_eq!(w.read_int().unwrap(), -3);
    }

    #[test]
    fn bad_timestamp_shape() {
        let w = WireValue::new(ValueType::Timestamp, json!([1]));
        assert!(matches!(
            w.read_timestamp(),
            Err(WireError::BadPayload { .. })
        ));
    }
}
