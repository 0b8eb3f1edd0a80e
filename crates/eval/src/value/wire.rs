//! Conversion between live values and the `[type, payload]` wire form.

use serde_json::json;
use traceviz_interchange::{StringTableBuilder, ValueType, WireError, WireValue};

use super::{Timestamp, Value, ValueData};
use crate::error::ConfigurationError;

impl Value {
    /// Encode the current payload. With a string table, strings are
    /// interned and emitted in their index forms.
    pub fn to_wire(&self, table: Option<&mut StringTableBuilder>) -> WireValue {
        self.with_data(|d| data_to_wire(d, table))
    }

    pub fn from_wire(wire: &WireValue, table: &[String]) -> Result<Value, ConfigurationError> {
        data_from_wire(wire, table)
            .map(Value::new)
            .map_err(|e| ConfigurationError::error("wire", e.to_string()))
    }
}

fn data_to_wire(data: &ValueData, table: Option<&mut StringTableBuilder>) -> WireValue {
    use ValueData as D;
    match (data, table) {
        (D::Empty, _) => WireValue::new(ValueType::Empty, serde_json::Value::Null),
        (D::String(s), Some(t)) => WireValue::new(ValueType::StringIndex, json!(t.index(s))),
        (D::String(s), None) => WireValue::new(ValueType::String, json!(s)),
        (D::StringList(v), Some(t)) => WireValue::new(
            ValueType::StringListIndices,
            json!(v.iter().map(|s| t.index(s)).collect::<Vec<_>>()),
        ),
        (D::StringList(v), None) => WireValue::new(ValueType::StringList, json!(v)),
        (D::StringSet(s), Some(t)) => WireValue::new(
            ValueType::StringSetIndices,
            json!(s.iter().map(|s| t.index(s)).collect::<Vec<_>>()),
        ),
        (D::StringSet(s), None) => WireValue::new(ValueType::StringSet, json!(s)),
        (D::Int(i), _) => WireValue::new(ValueType::Int, json!(i)),
        (D::IntList(v), _) => WireValue::new(ValueType::IntList, json!(v)),
        (D::IntSet(s), _) => WireValue::new(ValueType::IntSet, json!(s)),
        (D::Double(f), _) => WireValue::new(ValueType::Dbl, json!(f)),
        (D::Duration(n), _) => WireValue::new(ValueType::Duration, json!(n)),
        (D::Timestamp(t), _) => {
            WireValue::new(ValueType::Timestamp, json!([t.seconds(), t.nanos()]))
        }
    }
}

fn data_from_wire(wire: &WireValue, table: &[String]) -> Result<ValueData, WireError> {
    Ok(match wire.kind() {
        ValueType::Empty => ValueData::Empty,
        ValueType::String | ValueType::StringIndex => ValueData::String(wire.read_string(table)?),
        ValueType::StringList | ValueType::StringListIndices => {
            ValueData::StringList(wire.read_strings(table)?)
        }
        ValueType::StringSet | ValueType::StringSetIndices => {
            ValueData::StringSet(wire.read_strings(table)?.into_iter().collect())
        }
        ValueType::Int => ValueData::Int(wire.read_int()?),
        ValueType::IntList => ValueData::IntList(wire.read_ints()?),
        ValueType::IntSet => ValueData::IntSet(wire.read_ints()?.into_iter().collect()),
        ValueType::Dbl => ValueData::Double(wire.read_f64()?),
        ValueType::Duration => ValueData::Duration(wire.read_int()?),
        ValueType::Timestamp => {
            let (seconds, nanos) = wire.read_timestamp()?;
            ValueData::Timestamp(Timestamp::new(seconds, nanos))
        }
    })
}
