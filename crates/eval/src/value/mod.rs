//! Typed, observable, foldable values.
//!
//! A [`Value`] is a shared handle: clones observe and mutate the same
//! underlying cell. Every successful mutation notifies all current
//! subscribers exactly once; assigning an equal value notifies no one.
//! Use [`Value::deep_copy`] for an independent value.

mod compare;
mod fold;
mod wire;

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::fmt;
use std::rc::{Rc, Weak};

use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing::trace;

use crate::error::ConfigurationError;
use crate::observable::{Observers, Subscription};

const NANOS_PER_SECOND: i64 = 1_000_000_000;

/// Seconds + nanoseconds since the Unix epoch, with `nanos` normalized
/// into `0..1_000_000_000`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Timestamp {
    seconds: i64,
    nanos: u32,
}

impl Timestamp {
    pub fn new(seconds: i64, nanos: i64) -> Self {
        let seconds = seconds.saturating_add(nanos.div_euclid(NANOS_PER_SECOND));
        let nanos = nanos.rem_euclid(NANOS_PER_SECOND) as u32;
        Timestamp { seconds, nanos }
    }

    pub fn seconds(&self) -> i64 {
        self.seconds
    }

    pub fn nanos(&self) -> u32 {
        self.nanos
    }

    fn display(&self) -> String {
        let total = self.seconds as i128 * NANOS_PER_SECOND as i128 + self.nanos as i128;
        OffsetDateTime::from_unix_timestamp_nanos(total)
            .ok()
            .and_then(|dt| dt.format(&Rfc3339).ok())
            .unwrap_or_else(|| format!("{}.{:09}s", self.seconds, self.nanos))
    }
}

/// The payload of a [`Value`].
#[derive(Debug, Clone, PartialEq)]
pub enum ValueData {
    Empty,
    String(String),
    /// Ordered, duplicates allowed
    StringList(Vec<String>),
    /// Unique; iterates in sorted order
    StringSet(BTreeSet<String>),
    Int(i64),
    IntList(Vec<i64>),
    IntSet(BTreeSet<i64>),
    Double(f64),
    /// Signed nanoseconds
    Duration(i64),
    Timestamp(Timestamp),
}

impl ValueData {
    pub fn type_name(&self) -> &'static str {
        match self {
            ValueData::Empty => "empty",
            ValueData::String(_) => "string",
            ValueData::StringList(_) => "string_list",
            ValueData::StringSet(_) => "string_set",
            ValueData::Int(_) => "int",
            ValueData::IntList(_) => "int_list",
            ValueData::IntSet(_) => "int_set",
            ValueData::Double(_) => "dbl",
            ValueData::Duration(_) => "duration",
            ValueData::Timestamp(_) => "timestamp",
        }
    }

    /// The zero value of the same variant.
    pub fn zero(&self) -> ValueData {
        match self {
            ValueData::Empty => ValueData::Empty,
            ValueData::String(_) => ValueData::String(String::new()),
            ValueData::StringList(_) => ValueData::StringList(Vec::new()),
            ValueData::StringSet(_) => ValueData::StringSet(BTreeSet::new()),
            ValueData::Int(_) => ValueData::Int(0),
            ValueData::IntList(_) => ValueData::IntList(Vec::new()),
            ValueData::IntSet(_) => ValueData::IntSet(BTreeSet::new()),
            ValueData::Double(_) => ValueData::Double(0.0),
            ValueData::Duration(_) => ValueData::Duration(0),
            ValueData::Timestamp(_) => ValueData::Timestamp(Timestamp::default()),
        }
    }

    pub fn is_zero(&self) -> bool {
        *self == self.zero()
    }

    pub fn same_variant(&self, other: &ValueData) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }

    pub fn is_collection(&self) -> bool {
        matches!(
            self,
            ValueData::StringList(_)
                | ValueData::StringSet(_)
                | ValueData::IntList(_)
                | ValueData::IntSet(_)
        )
    }

    /// Human-readable rendering, as substituted by `ValueMap::format`.
    pub fn display_string(&self) -> String {
        match self {
            ValueData::Empty => String::new(),
            ValueData::String(s) => s.clone(),
            ValueData::StringList(v) => v.join(", "),
            ValueData::StringSet(s) => s.iter().cloned().collect::<Vec<_>>().join(", "),
            ValueData::Int(i) => i.to_string(),
            ValueData::IntList(v) => join_ints(v.iter()),
            ValueData::IntSet(s) => join_ints(s.iter()),
            ValueData::Double(d) => d.to_string(),
            ValueData::Duration(n) => format_duration(*n),
            ValueData::Timestamp(t) => t.display(),
        }
    }

    /// Typed rendering used in documentation and debug output,
    /// e.g. `string "a"`, `int_set {1, 2}`.
    pub fn describe(&self) -> String {
        let body = match self {
            ValueData::Empty => return "empty".to_string(),
            ValueData::String(s) => format!("{:?}", s),
            ValueData::StringList(v) => format!("{:?}", v),
            ValueData::StringSet(s) => format!("{:?}", s),
            ValueData::Int(i) => i.to_string(),
            ValueData::IntList(v) => format!("{:?}", v),
            ValueData::IntSet(s) => format!("{:?}", s),
            ValueData::Double(d) => format!("{:?}", d),
            ValueData::Duration(n) => format_duration(*n),
            ValueData::Timestamp(t) => t.display(),
        };
        format!("{} {}", self.type_name(), body)
    }
}

fn join_ints<'a>(it: impl Iterator<Item = &'a i64>) -> String {
    it.map(|i| i.to_string()).collect::<Vec<_>>().join(", ")
}

/// Render nanoseconds in the largest unit not exceeding the magnitude.
pub fn format_duration(nanos: i64) -> String {
    let abs = nanos.unsigned_abs();
    let (unit, scale) = if abs >= 1_000_000_000 {
        ("s", 1e9)
    } else if abs >= 1_000_000 {
        ("ms", 1e6)
    } else if abs >= 1_000 {
        ("us", 1e3)
    } else {
        ("ns", 1.0)
    };
    let scaled = format!("{:.3}", nanos as f64 / scale);
    let trimmed = scaled.trim_end_matches('0').trim_end_matches('.');
    format!("{}{}", trimmed, unit)
}

// ──────────────────────────────────────────────
// Value handle
// ──────────────────────────────────────────────

struct ValueCell {
    data: RefCell<ValueData>,
    observers: Rc<Observers<Value>>,
}

/// Shared, observable value handle.
#[derive(Clone)]
pub struct Value(Rc<ValueCell>);

/// Non-owning handle, used by subscriptions that must not keep a value alive.
#[derive(Clone)]
pub struct WeakValue(Weak<ValueCell>);

impl WeakValue {
    pub fn upgrade(&self) -> Option<Value> {
        self.0.upgrade().map(Value)
    }
}

impl Value {
    pub fn new(data: ValueData) -> Self {
        Value(Rc::new(ValueCell {
            data: RefCell::new(data),
            observers: Rc::new(Observers::new()),
        }))
    }

    pub fn empty() -> Self {
        Self::new(ValueData::Empty)
    }

    pub fn string(s: impl Into<String>) -> Self {
        Self::new(ValueData::String(s.into()))
    }

    pub fn string_list<S: Into<String>>(items: impl IntoIterator<Item = S>) -> Self {
        Self::new(ValueData::StringList(
            items.into_iter().map(Into::into).collect(),
        ))
    }

    pub fn string_set<S: Into<String>>(items: impl IntoIterator<Item = S>) -> Self {
        Self::new(ValueData::StringSet(
            items.into_iter().map(Into::into).collect(),
        ))
    }

    pub fn int(i: i64) -> Self {
        Self::new(ValueData::Int(i))
    }

    /// Integer values are always integral: fractional input is floored.
    pub fn int_from_f64(f: f64) -> Self {
        Self::new(ValueData::Int(f.floor() as i64))
    }

    pub fn int_list(items: impl IntoIterator<Item = i64>) -> Self {
        Self::new(ValueData::IntList(items.into_iter().collect()))
    }

    pub fn int_set(items: impl IntoIterator<Item = i64>) -> Self {
        Self::new(ValueData::IntSet(items.into_iter().collect()))
    }

    pub fn double(d: f64) -> Self {
        Self::new(ValueData::Double(d))
    }

    pub fn duration(nanos: i64) -> Self {
        Self::new(ValueData::Duration(nanos))
    }

    pub fn timestamp(seconds: i64, nanos: i64) -> Self {
        Self::new(ValueData::Timestamp(Timestamp::new(seconds, nanos)))
    }

    /// Snapshot of the current payload.
    pub fn data(&self) -> ValueData {
        self.0.data.borrow().clone()
    }

    pub fn with_data<R>(&self, f: impl FnOnce(&ValueData) -> R) -> R {
        f(&self.0.data.borrow())
    }

    pub fn type_name(&self) -> &'static str {
        self.with_data(ValueData::type_name)
    }

    pub fn is_zero(&self) -> bool {
        self.with_data(ValueData::is_zero)
    }

    pub fn display_string(&self) -> String {
        self.with_data(ValueData::display_string)
    }

    pub fn describe(&self) -> String {
        self.with_data(ValueData::describe)
    }

    /// Assign a payload of the same variant. Returns whether anything changed.
    pub fn set(&self, data: ValueData) -> Result<bool, ConfigurationError> {
        let current_type = self.type_name();
        if !self.with_data(|d| d.same_variant(&data)) {
            return Err(ConfigurationError::error(
                "value",
                format!(
                    "cannot assign {} to a {} value",
                    data.type_name(),
                    current_type
                ),
            ));
        }
        Ok(self.replace(data))
    }

    /// A new, independent zero value of the same type.
    pub fn zero_of(&self) -> Value {
        Value::new(self.with_data(ValueData::zero))
    }

    /// Reset to the zero value of the current variant.
    pub fn reset(&self) -> bool {
        let zero = self.with_data(ValueData::zero);
        self.replace(zero)
    }

    /// Store `data` unchecked; notify if it differs from the current payload.
    pub(crate) fn replace(&self, data: ValueData) -> bool {
        {
            let mut current = self.0.data.borrow_mut();
            if *current == data {
                return false;
            }
            *current = data;
        }
        trace!(value = %self.describe(), "value changed");
        self.0.observers.notify(self);
        true
    }

    /// Subscribe to this value. The callback runs immediately with the
    /// current value, then after every change.
    pub fn subscribe(&self, f: impl Fn(&Value) + 'static) -> Subscription {
        let f = Rc::new(f);
        let g = f.clone();
        let sub = Observers::add(&self.0.observers, move |v: &Value| g(v));
        f(self);
        sub
    }

    pub fn subscriber_count(&self) -> usize {
        self.0.observers.len()
    }

    /// An independent value holding a copy of the current payload.
    pub fn deep_copy(&self) -> Value {
        Value::new(self.data())
    }

    pub fn ptr_eq(&self, other: &Value) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn downgrade(&self) -> WeakValue {
        WeakValue(Rc::downgrade(&self.0))
    }

    // -- Typed accessors ----------------------------------------

    pub fn as_string(&self) -> Option<String> {
        self.with_data(|d| match d {
            ValueData::String(s) => Some(s.clone()),
            _ => None,
        })
    }

    pub fn as_string_list(&self) -> Option<Vec<String>> {
        self.with_data(|d| match d {
            ValueData::StringList(v) => Some(v.clone()),
            _ => None,
        })
    }

    pub fn as_string_set(&self) -> Option<BTreeSet<String>> {
        self.with_data(|d| match d {
            ValueData::StringSet(s) => Some(s.clone()),
            _ => None,
        })
    }

    pub fn as_int(&self) -> Option<i64> {
        self.with_data(|d| match d {
            ValueData::Int(i) => Some(*i),
            _ => None,
        })
    }

    pub fn as_int_list(&self) -> Option<Vec<i64>> {
        self.with_data(|d| match d {
            ValueData::IntList(v) => Some(v.clone()),
            _ => None,
        })
    }

    pub fn as_int_set(&self) -> Option<BTreeSet<i64>> {
        self.with_data(|d| match d {
            ValueData::IntSet(s) => Some(s.clone()),
            _ => None,
        })
    }

    pub fn as_f64(&self) -> Option<f64> {
        self.with_data(|d| match d {
            ValueData::Double(f) => Some(*f),
            _ => None,
        })
    }

    pub fn as_duration(&self) -> Option<i64> {
        self.with_data(|d| match d {
            ValueData::Duration(n) => Some(*n),
            _ => None,
        })
    }

    pub fn as_timestamp(&self) -> Option<Timestamp> {
        self.with_data(|d| match d {
            ValueData::Timestamp(t) => Some(*t),
            _ => None,
        })
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_string())
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Value({})", self.describe())
    }
}
