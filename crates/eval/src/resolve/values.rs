//! Literal values, value maps, references and global state.

use traceviz_core::Element;

use super::Resolver;
use crate::error::ConfigurationError;
use crate::value::Value;
use crate::value_map::ValueMap;
use crate::value_ref::ValueRef;

impl Resolver<'_> {
    /// `<global-state>`: value maps and bare `<value>` entries.
    pub(super) fn global_state(&self, el: &Element) -> Result<(), ConfigurationError> {
        for child in self.elements(el)? {
            match child.name.as_str() {
                "value-map" => {
                    for entry in self.elements(child)? {
                        self.register_global(entry)?;
                    }
                }
                "value" => self.register_global(child)?,
                _ => return Err(self.err(child, "expected <value-map> or <value>")),
            }
        }
        Ok(())
    }

    fn register_global(&self, el: &Element) -> Result<(), ConfigurationError> {
        let (key, value) = self.entry(el, false)?;
        self.global
            .insert(key, value)
            .map_err(|e| self.err(el, e.message))
    }

    pub(super) fn value_map(&self, el: &Element) -> Result<ValueMap, ConfigurationError> {
        if el.name != "value-map" {
            return Err(self.err(el, "expected <value-map>"));
        }
        let mut map = ValueMap::new();
        for child in self.elements(el)? {
            let (key, value) = self.entry(child, true)?;
            if map.has(&key) {
                return Err(self.err(child, format!("duplicate key '{}'", key)));
            }
            map.insert(key, value);
        }
        Ok(map)
    }

    /// `<value key="k">VALUE</value>`. Global refs are allowed where
    /// `allow_refs` is set and resolve to the shared global value.
    fn entry(&self, el: &Element, allow_refs: bool) -> Result<(String, Value), ConfigurationError> {
        if el.name != "value" {
            return Err(self.err(el, "expected <value key=...>"));
        }
        let key = self.attr(el, "key")?.to_string();
        let inner = self.exactly(el, 1)?[0];
        let value = match inner.name.as_str() {
            "global-ref" if allow_refs => match self.value_ref(inner)? {
                ValueRef::Global(k) => self
                    .global
                    .get(&k)
                    .ok()
                    .flatten()
                    .ok_or_else(|| self.err(inner, format!("unknown global '{}'", k)))?,
                _ => return Err(self.err(inner, "expected a global reference")),
            },
            _ => self.literal(inner)?,
        };
        Ok((key, value))
    }

    /// A value operand: `<global-ref>`, `<local-ref>` or a literal.
    pub(super) fn value_ref(&self, el: &Element) -> Result<ValueRef, ConfigurationError> {
        match el.name.as_str() {
            "global-ref" => {
                self.exactly(el, 0)?;
                let key = self.attr(el, "key")?;
                if self.global.is_published() && !self.global.keys().iter().any(|k| k == key) {
                    return Err(self.err(el, format!("unknown global '{}'", key)));
                }
                Ok(ValueRef::Global(key.to_string()))
            }
            "local-ref" => {
                self.exactly(el, 0)?;
                Ok(ValueRef::Local(self.attr(el, "key")?.to_string()))
            }
            _ => Ok(ValueRef::Literal(self.literal(el)?)),
        }
    }

    pub(super) fn literal(&self, el: &Element) -> Result<Value, ConfigurationError> {
        match el.name.as_str() {
            "empty" => {
                self.exactly(el, 0)?;
                Ok(Value::empty())
            }
            "string" => self.scalar(el, |s| Some(Value::string(s))),
            "int" => self.scalar(el, |s| parse_int(s).map(Value::int)),
            "dbl" => self.scalar(el, |s| s.parse::<f64>().ok().map(Value::double)),
            "duration" => self.scalar(el, |s| parse_int(s).map(Value::duration)),
            "timestamp" => {
                self.exactly(el, 0)?;
                let seconds = self.int_attr(el, "seconds")?;
                let nanos = match el.attr("nanos") {
                    Some(_) => self.int_attr(el, "nanos")?,
                    None => 0,
                };
                Ok(Value::timestamp(seconds, nanos))
            }
            "string-list" => Ok(Value::string_list(self.strings(el)?)),
            "string-set" => Ok(Value::string_set(self.strings(el)?)),
            "int-list" => Ok(Value::int_list(self.ints(el)?)),
            "int-set" => Ok(Value::int_set(self.ints(el)?)),
            _ => Err(self.err(el, "expected a value")),
        }
    }

    fn scalar(
        &self,
        el: &Element,
        parse: impl FnOnce(&str) -> Option<Value>,
    ) -> Result<Value, ConfigurationError> {
        if el.elements().next().is_some() {
            return Err(self.err(el, "expected text content only"));
        }
        let text = el.text();
        parse(&text).ok_or_else(|| self.err(el, format!("cannot parse '{}'", text)))
    }

    fn int_attr(&self, el: &Element, name: &str) -> Result<i64, ConfigurationError> {
        let raw = self.attr(el, name)?;
        parse_int(raw).ok_or_else(|| self.err(el, format!("attribute '{}' is not a number", name)))
    }

    fn strings(&self, el: &Element) -> Result<Vec<String>, ConfigurationError> {
        self.elements(el)?
            .into_iter()
            .map(|child| match child.name.as_str() {
                "string" => Ok(child.text()),
                _ => Err(self.err(child, "expected <string>")),
            })
            .collect()
    }

    fn ints(&self, el: &Element) -> Result<Vec<i64>, ConfigurationError> {
        self.elements(el)?
            .into_iter()
            .map(|child| match child.name.as_str() {
                "int" => {
                    let text = child.text();
                    parse_int(&text)
                        .ok_or_else(|| self.err(child, format!("cannot parse '{}'", text)))
                }
                _ => Err(self.err(child, "expected <int>")),
            })
            .collect()
    }
}

/// Integers accept fractional input and are floored.
fn parse_int(s: &str) -> Option<i64> {
    let s = s.trim();
    s.parse::<i64>()
        .ok()
        .or_else(|| s.parse::<f64>().ok().filter(|f| f.is_finite()).map(|f| f.floor() as i64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::global_state::GlobalState;

    fn resolver() -> Resolver<'static> {
        Resolver {
            file: "v.tvz",
            global: GlobalState::new(),
        }
    }

    fn literal(src: &str) -> Result<Value, ConfigurationError> {
        let el = traceviz_core::parse_template(src, "v.tvz").unwrap();
        resolver().literal(&el)
    }

    #[test]
    fn scalars() {
        assert_eq!(literal("<int>2.7</int>").unwrap().as_int(), Some(2));
        assert_eq!(literal("<int>-3</int>").unwrap().as_int(), Some(-3));
        assert_eq!(literal("<dbl>1.25</dbl>").unwrap().as_f64(), Some(1.25));
        assert_eq!(literal("<string>a &amp; b</string>").unwrap().as_string().unwrap(), "a & b");
        assert_eq!(literal("<string/>").unwrap().as_string().unwrap(), "");
        assert_eq!(literal("<duration>1500</duration>").unwrap().as_duration(), Some(1500));
        let t = literal(r#"<timestamp seconds="1" nanos="1500000000"/>"#)
            .unwrap()
            .as_timestamp()
            .unwrap();
        assert_eq!((t.seconds(), t.nanos()), (2, 500_000_000));
        assert_eq!(literal("<empty/>").unwrap().type_name(), "empty");
    }

    #[test]
    fn collections() {
        let v = literal("<string-set><string>b</string><string>a</string><string>b</string></string-set>")
            .unwrap();
        assert_eq!(v.as_string_set().unwrap().len(), 2);
        let v = literal("<int-list><int>3</int><int>3</int></int-list>").unwrap();
        assert_eq!(v.as_int_list(), Some(vec![3, 3]));
        assert!(literal("<int-set><string>x</string></int-set>").is_err());
    }

    #[test]
    fn bad_literals_are_fatal_with_line() {
        let err = literal("<int>\nabc\n</int>").unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(err.message, "v.tvz:1: <int>: cannot parse 'abc'");
        assert!(literal("<widget/>").is_err());
    }

    #[test]
    fn value_map_rejects_duplicate_keys() {
        let el = traceviz_core::parse_template(
            r#"<value-map><value key="a"><int>1</int></value><value key="a"><int>2</int></value></value-map>"#,
            "v.tvz",
        )
        .unwrap();
        let err = resolver().value_map(&el).unwrap_err();
        assert!(err.message.contains("duplicate key 'a'"));
    }
}
