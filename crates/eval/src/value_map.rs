//! String-keyed collections of values.

use std::collections::BTreeMap;

use indexmap::IndexMap;
use traceviz_interchange::WireValue;

use crate::error::ConfigurationError;
use crate::value::{Timestamp, Value};

/// An ordered map from key to [`Value`]. Values are shared handles, so
/// two maps may hold the same value.
#[derive(Clone, Default)]
pub struct ValueMap {
    entries: IndexMap<String, Value>,
}

impl ValueMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries<K: Into<String>>(entries: impl IntoIterator<Item = (K, Value)>) -> Self {
        ValueMap {
            entries: entries.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    /// Insert or replace the value under `key`.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.entries.insert(key.into(), value);
    }

    pub fn has(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// A map sharing every value except those under `keys`.
    pub fn without(&self, keys: &[&str]) -> ValueMap {
        ValueMap {
            entries: self
                .entries
                .iter()
                .filter(|(k, _)| !keys.contains(&k.as_str()))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        }
    }

    /// A map sharing every value, with `key` set to `value`.
    pub fn with(&self, key: impl Into<String>, value: Value) -> ValueMap {
        let mut out = self.clone();
        out.insert(key, value);
        out
    }

    /// The value under `key`, or a fatal error naming the keys present.
    pub fn expect(&self, key: &str) -> Result<&Value, ConfigurationError> {
        self.entries.get(key).ok_or_else(|| {
            ConfigurationError::fatal(
                "value_map",
                format!(
                    "key '{}' not found in value map {{{}}}",
                    key,
                    self.keys().collect::<Vec<_>>().join(", ")
                ),
            )
        })
    }

    fn expect_typed<T>(
        &self,
        key: &str,
        expected: &str,
        get: impl FnOnce(&Value) -> Option<T>,
    ) -> Result<T, ConfigurationError> {
        let value = self.expect(key)?;
        get(value).ok_or_else(|| {
            ConfigurationError::fatal(
                "value_map",
                format!(
                    "key '{}' holds a {} value, expected {}",
                    key,
                    value.type_name(),
                    expected
                ),
            )
        })
    }

    pub fn expect_string(&self, key: &str) -> Result<String, ConfigurationError> {
        self.expect_typed(key, "string", Value::as_string)
    }

    pub fn expect_string_list(&self, key: &str) -> Result<Vec<String>, ConfigurationError> {
        self.expect_typed(key, "string_list", Value::as_string_list)
    }

    pub fn expect_string_set(
        &self,
        key: &str,
    ) -> Result<std::collections::BTreeSet<String>, ConfigurationError> {
        self.expect_typed(key, "string_set", Value::as_string_set)
    }

    pub fn expect_int(&self, key: &str) -> Result<i64, ConfigurationError> {
        self.expect_typed(key, "int", Value::as_int)
    }

    pub fn expect_int_list(&self, key: &str) -> Result<Vec<i64>, ConfigurationError> {
        self.expect_typed(key, "int_list", Value::as_int_list)
    }

    pub fn expect_int_set(
        &self,
        key: &str,
    ) -> Result<std::collections::BTreeSet<i64>, ConfigurationError> {
        self.expect_typed(key, "int_set", Value::as_int_set)
    }

    pub fn expect_double(&self, key: &str) -> Result<f64, ConfigurationError> {
        self.expect_typed(key, "dbl", Value::as_f64)
    }

    pub fn expect_duration(&self, key: &str) -> Result<i64, ConfigurationError> {
        self.expect_typed(key, "duration", Value::as_duration)
    }

    pub fn expect_timestamp(&self, key: &str) -> Result<Timestamp, ConfigurationError> {
        self.expect_typed(key, "timestamp", Value::as_timestamp)
    }

    /// `{key: type repr, ...}` in insertion order.
    pub fn describe(&self) -> String {
        let parts: Vec<String> = self
            .entries
            .iter()
            .map(|(k, v)| format!("{}: {}", k, v.describe()))
            .collect();
        format!("{{{}}}", parts.join(", "))
    }

    /// Substitute `$(key)` with each value's display string. `$$` is a
    /// literal `$`.
    pub fn format(&self, template: &str) -> Result<String, ConfigurationError> {
        let mut out = String::with_capacity(template.len());
        let mut rest = template;
        while let Some(pos) = rest.find('$') {
            out.push_str(&rest[..pos]);
            let tail = &rest[pos + 1..];
            if let Some(after) = tail.strip_prefix('$') {
                out.push('$');
                rest = after;
            } else if let Some(inner) = tail.strip_prefix('(') {
                let end = inner.find(')').ok_or_else(|| {
                    ConfigurationError::error(
                        "value_map",
                        format!("unterminated '$(' in format string '{}'", template),
                    )
                })?;
                let key = &inner[..end];
                let value = self
                    .expect(key)
                    .map_err(|e| e.with_severity(crate::error::Severity::Error))?;
                out.push_str(&value.display_string());
                rest = &inner[end + 1..];
            } else {
                out.push('$');
                rest = tail;
            }
        }
        out.push_str(rest);
        Ok(out)
    }

    /// Merge `maps` left to right; later maps win. Two maps disagreeing on
    /// a key's type is fatal.
    pub fn union(maps: &[&ValueMap]) -> Result<ValueMap, ConfigurationError> {
        let mut out = ValueMap::new();
        for map in maps {
            for (k, v) in map.iter() {
                if let Some(prev) = out.get(k) {
                    if prev.type_name() != v.type_name() {
                        return Err(ConfigurationError::fatal(
                            "value_map",
                            format!(
                                "key '{}' is {} in one map and {} in another",
                                k,
                                prev.type_name(),
                                v.type_name()
                            ),
                        ));
                    }
                }
                out.insert(k, v.clone());
            }
        }
        Ok(out)
    }

    /// A map of independent copies of every value.
    pub fn deep_copy(&self) -> ValueMap {
        ValueMap {
            entries: self
                .entries
                .iter()
                .map(|(k, v)| (k.clone(), v.deep_copy()))
                .collect(),
        }
    }

    pub fn from_wire_map(
        wire: &BTreeMap<String, WireValue>,
        table: &[String],
    ) -> Result<ValueMap, ConfigurationError> {
        let mut out = ValueMap::new();
        for (k, w) in wire {
            out.insert(k.clone(), Value::from_wire(w, table)?);
        }
        Ok(out)
    }
}

impl std::fmt::Debug for ValueMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ValueMap{}", self.describe())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ValueMap {
        ValueMap::from_entries([
            ("name", Value::string("thing1")),
            ("num", Value::int(1)),
            ("tags", Value::string_set(["b", "a"])),
        ])
    }

    #[test]
    fn expect_reports_present_keys() {
        let err = sample().expect("missing").unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(err.origin, "value_map");
        assert_eq!(
            err.message,
            "key 'missing' not found in value map {name, num, tags}"
        );
    }

    #[test]
    fn expect_string_checks_type() {
        let m = sample();
        assert_eq!(m.expect_string("name").unwrap(), "thing1");
        let err = m.expect_string("num").unwrap_err();
        assert_eq!(err.message, "key 'num' holds a int value, expected string");
        assert_eq!(m.expect_int("num").unwrap(), 1);
        assert_eq!(m.expect_string_set("tags").unwrap().len(), 2);
    }

    #[test]
    fn with_and_without_share_values() {
        let m = sample();
        let w = m.without(&["tags"]).with("extra", Value::int(9));
        assert_eq!(w.keys().collect::<Vec<_>>(), vec!["name", "num", "extra"]);
        w.get("num").unwrap().fold(&Value::int(5), false, true);
        assert_eq!(m.expect_int("num").unwrap(), 5);
        let copy = m.deep_copy();
        copy.get("num").unwrap().fold(&Value::int(6), false, true);
        assert_eq!(m.expect_int("num").unwrap(), 5);
    }

    #[test]
    fn format_substitutes_and_escapes() {
        let m = sample();
        assert_eq!(
            m.format("$(name) costs $$$(num), tags $(tags)").unwrap(),
            "thing1 costs $1, tags a, b"
        );
        assert_eq!(m.format("plain $ sign").unwrap(), "plain $ sign");
        assert!(m.format("$(name").is_err());
        let err = m.format("$(nope)").unwrap_err();
        assert!(!err.is_fatal());
    }

    #[test]
    fn union_prefers_later_maps_and_checks_types() {
        let a = ValueMap::from_entries([("x", Value::int(1)), ("y", Value::int(2))]);
        let b = ValueMap::from_entries([("y", Value::int(3))]);
        let u = ValueMap::union(&[&a, &b]).unwrap();
        assert_eq!(u.expect_int("y").unwrap(), 3);
        assert_eq!(u.len(), 2);

        let c = ValueMap::from_entries([("x", Value::string("1"))]);
        assert!(ValueMap::union(&[&a, &c]).unwrap_err().is_fatal());
    }

    #[test]
    fn describe_lists_entries_in_order() {
        assert_eq!(
            sample().describe(),
            "{name: string \"thing1\", num: int 1, tags: string_set {\"a\", \"b\"}}"
        );
    }
}
