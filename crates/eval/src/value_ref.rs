//! References that resolve to a value from a literal, the local map, or
//! global state.

use std::fmt;

use crate::error::ConfigurationError;
use crate::global_state::GlobalState;
use crate::value::Value;
use crate::value_map::ValueMap;

#[derive(Clone)]
pub enum ValueRef {
    Literal(Value),
    Local(String),
    Global(String),
}

impl ValueRef {
    /// Resolve against the optional local map and global state.
    ///
    /// A missing local key resolves to `None`. A missing global key is
    /// fatal once global state is published, and `None` before that.
    pub fn resolve(
        &self,
        local: Option<&ValueMap>,
        global: Option<&GlobalState>,
    ) -> Result<Option<Value>, ConfigurationError> {
        match self {
            ValueRef::Literal(v) => Ok(Some(v.clone())),
            ValueRef::Local(key) => Ok(local.and_then(|m| m.get(key)).cloned()),
            ValueRef::Global(key) => match global {
                Some(g) => g.get(key),
                None => Ok(None),
            },
        }
    }
}

impl fmt::Display for ValueRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueRef::Literal(v) => write!(f, "literal {}", v.describe()),
            ValueRef::Local(key) => write!(f, "local-ref {}", key),
            ValueRef::Global(key) => write!(f, "global-ref {}", key),
        }
    }
}

impl fmt::Debug for ValueRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_resolves_to_shared_value() {
        let v = Value::int(3);
        let r = ValueRef::Literal(v.clone());
        assert!(r.resolve(None, None).unwrap().unwrap().ptr_eq(&v));
    }

    #[test]
    fn missing_local_is_not_an_error() {
        let local = ValueMap::from_entries([("num", Value::int(1))]);
        let hit = ValueRef::Local("num".into());
        let miss = ValueRef::Local("name".into());
        assert_eq!(
            hit.resolve(Some(&local), None).unwrap().unwrap().as_int(),
            Some(1)
        );
        assert!(miss.resolve(Some(&local), None).unwrap().is_none());
        assert!(hit.resolve(None, None).unwrap().is_none());
    }

    #[test]
    fn missing_global_is_fatal_after_publish() {
        let g = GlobalState::new();
        let r = ValueRef::Global("mode".into());
        assert!(r.resolve(None, Some(&g)).unwrap().is_none());
        g.publish();
        assert!(r.resolve(None, Some(&g)).unwrap_err().is_fatal());
        assert!(r.resolve(None, None).unwrap().is_none());
    }

    #[test]
    fn display_forms() {
        assert_eq!(ValueRef::Literal(Value::int(0)).to_string(), "literal int 0");
        assert_eq!(ValueRef::Local("num".into()).to_string(), "local-ref num");
        assert_eq!(ValueRef::Global("mode".into()).to_string(), "global-ref mode");
    }
}
