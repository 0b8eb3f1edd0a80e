//! The shared key → value registry.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use indexmap::IndexMap;
use tracing::debug;

use crate::error::{ConfigurationError, ErrorChannel};
use crate::value::Value;

type PublishCallback = Box<dyn FnOnce(&GlobalState)>;

/// Page-wide state shared by every component.
///
/// Initialization has two phases: values are inserted while unpublished,
/// then [`GlobalState::publish`] freezes the key set. Lookups before
/// publishing resolve to nothing; after publishing, an unknown key is
/// a fatal misconfiguration.
#[derive(Clone)]
pub struct GlobalState(Rc<Inner>);

struct Inner {
    values: RefCell<IndexMap<String, Value>>,
    published: Cell<bool>,
    on_publish: RefCell<Vec<PublishCallback>>,
    errors: ErrorChannel,
}

impl std::fmt::Debug for GlobalState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GlobalState")
            .field("published", &self.is_published())
            .field("values", &self.0.values.borrow())
            .finish()
    }
}

impl Default for GlobalState {
    fn default() -> Self {
        Self::new()
    }
}

impl GlobalState {
    pub fn new() -> Self {
        GlobalState(Rc::new(Inner {
            values: RefCell::new(IndexMap::new()),
            published: Cell::new(false),
            on_publish: RefCell::new(Vec::new()),
            errors: ErrorChannel::new(),
        }))
    }

    pub fn insert(&self, key: impl Into<String>, value: Value) -> Result<(), ConfigurationError> {
        let key = key.into();
        if self.is_published() {
            return Err(ConfigurationError::fatal(
                "global_state",
                format!("cannot add '{}' after global state is published", key),
            ));
        }
        let mut values = self.0.values.borrow_mut();
        if values.contains_key(&key) {
            return Err(ConfigurationError::fatal(
                "global_state",
                format!("global value '{}' is declared more than once", key),
            ));
        }
        values.insert(key, value);
        Ok(())
    }

    /// Look up `key`. `Ok(None)` until published.
    pub fn get(&self, key: &str) -> Result<Option<Value>, ConfigurationError> {
        if !self.is_published() {
            return Ok(None);
        }
        match self.0.values.borrow().get(key) {
            Some(v) => Ok(Some(v.clone())),
            None => Err(ConfigurationError::fatal(
                "global_state",
                format!("no global value named '{}'", key),
            )),
        }
    }

    /// Freeze the key set and run publish callbacks. Idempotent.
    pub fn publish(&self) {
        if self.0.published.replace(true) {
            return;
        }
        debug!(values = self.len(), "global state published");
        let callbacks = std::mem::take(&mut *self.0.on_publish.borrow_mut());
        for cb in callbacks {
            cb(self);
        }
    }

    pub fn is_published(&self) -> bool {
        self.0.published.get()
    }

    /// Run `f` once the state is published; immediately if it already is.
    pub fn on_publish(&self, f: impl FnOnce(&GlobalState) + 'static) {
        if self.is_published() {
            f(self);
        } else {
            self.0.on_publish.borrow_mut().push(Box::new(f));
        }
    }

    pub fn errors(&self) -> &ErrorChannel {
        &self.0.errors
    }

    /// Route an error raised outside initial resolution to the error channel.
    pub fn report(&self, err: ConfigurationError) {
        self.0.errors.report(err);
    }

    pub fn keys(&self) -> Vec<String> {
        self.0.values.borrow().keys().cloned().collect()
    }

    /// Every (key, value) pair in declaration order.
    pub fn snapshot(&self) -> Vec<(String, Value)> {
        self.0
            .values
            .borrow()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.0.values.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookups_are_deferred_until_publish() {
        let g = GlobalState::new();
        g.insert("mode", Value::string("select")).unwrap();
        assert!(g.get("mode").unwrap().is_none());
        assert!(g.get("nope").unwrap().is_none());
        g.publish();
        assert_eq!(g.get("mode").unwrap().unwrap().as_string().unwrap(), "select");
        assert!(g.get("nope").unwrap_err().is_fatal());
    }

    #[test]
    fn key_set_is_frozen_after_publish() {
        let g = GlobalState::new();
        g.insert("a", Value::int(1)).unwrap();
        assert!(g.insert("a", Value::int(2)).unwrap_err().is_fatal());
        g.publish();
        assert!(g.insert("b", Value::int(2)).is_err());
        assert_eq!(g.keys(), vec!["a"]);
    }

    #[test]
    fn publish_callbacks_run_once() {
        let g = GlobalState::new();
        let hits = Rc::new(Cell::new(0));
        let h = hits.clone();
        g.on_publish(move |_| h.set(h.get() + 1));
        g.publish();
        g.publish();
        assert_eq!(hits.get(), 1);
        let h = hits.clone();
        g.on_publish(move |state| {
            assert!(state.is_published());
            h.set(h.get() + 1)
        });
        assert_eq!(hits.get(), 2);
    }

    #[test]
    fn debug_lists_values() {
        let g = GlobalState::new();
        g.insert("zoom", Value::int(2)).unwrap();
        assert_eq!(
            format!("{:?}", g),
            "GlobalState { published: false, values: {\"zoom\": Value(int 2)} }"
        );
    }

    #[test]
    fn report_reaches_subscribers() {
        let g = GlobalState::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = seen.clone();
        let _sub = g
            .errors()
            .subscribe(move |e| s.borrow_mut().push(e.origin.clone()));
        g.report(ConfigurationError::error("update", "bad fold"));
        assert_eq!(*seen.borrow(), vec!["update"]);
    }
}
