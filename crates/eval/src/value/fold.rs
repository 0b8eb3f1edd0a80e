//! Folding one value into another.

use std::collections::BTreeSet;

use super::{Value, ValueData};

impl Value {
    /// Fold `other` into this value.
    ///
    /// * An empty `other` resets this value to its zero value.
    /// * Scalars: `toggle` onto an equal value resets to zero, otherwise
    ///   the receiver takes `other`. `replace` is ignored.
    /// * Lists: `toggle` onto an equal list resets to empty; otherwise
    ///   `replace` overwrites and non-replace appends.
    /// * Sets: `toggle` takes the symmetric difference; otherwise
    ///   `replace` overwrites and non-replace takes the union.
    ///
    /// Returns false, leaving the receiver untouched, when the types
    /// cannot be folded. Notifies once, and only if the payload changed.
    pub fn fold(&self, other: &Value, toggle: bool, replace: bool) -> bool {
        let incoming = other.data();
        let current = self.data();
        match fold_data(&current, &incoming, toggle, replace) {
            Some(next) => {
                self.replace(next);
                true
            }
            None => false,
        }
    }
}

fn fold_data(
    current: &ValueData,
    incoming: &ValueData,
    toggle: bool,
    replace: bool,
) -> Option<ValueData> {
    use ValueData as D;

    if matches!(incoming, D::Empty) {
        return Some(current.zero());
    }
    match current {
        D::Empty => None,

        D::String(_) | D::Int(_) | D::Double(_) | D::Duration(_) | D::Timestamp(_) => {
            let next = coerce_scalar(current, incoming)?;
            if toggle && next == *current {
                Some(current.zero())
            } else {
                Some(next)
            }
        }

        D::StringList(cur) => {
            let items = strings_of(incoming)?;
            Some(D::StringList(fold_list(cur, items, toggle, replace)))
        }
        D::IntList(cur) => {
            let items = ints_of(incoming)?;
            Some(D::IntList(fold_list(cur, items, toggle, replace)))
        }
        D::StringSet(cur) => {
            let items = strings_of(incoming)?.into_iter().collect();
            Some(D::StringSet(fold_set(cur, items, toggle, replace)))
        }
        D::IntSet(cur) => {
            let items = ints_of(incoming)?.into_iter().collect();
            Some(D::IntSet(fold_set(cur, items, toggle, replace)))
        }
    }
}

/// Convert `incoming` into the receiver's scalar type, if allowed.
fn coerce_scalar(current: &ValueData, incoming: &ValueData) -> Option<ValueData> {
    use ValueData as D;
    match (current, incoming) {
        (D::String(_), D::String(s)) => Some(D::String(s.clone())),
        (D::Int(_), D::Int(i)) => Some(D::Int(*i)),
        (D::Int(_), D::Double(f)) => Some(D::Int(f.floor() as i64)),
        (D::Double(_), D::Double(f)) => Some(D::Double(*f)),
        (D::Double(_), D::Int(i)) => Some(D::Double(*i as f64)),
        (D::Duration(_), D::Duration(n)) => Some(D::Duration(*n)),
        (D::Timestamp(_), D::Timestamp(t)) => Some(D::Timestamp(*t)),
        _ => None,
    }
}

fn strings_of(data: &ValueData) -> Option<Vec<String>> {
    match data {
        ValueData::String(s) => Some(vec![s.clone()]),
        ValueData::StringList(v) => Some(v.clone()),
        ValueData::StringSet(s) => Some(s.iter().cloned().collect()),
        _ => None,
    }
}

fn ints_of(data: &ValueData) -> Option<Vec<i64>> {
    match data {
        ValueData::Int(i) => Some(vec![*i]),
        ValueData::IntList(v) => Some(v.clone()),
        ValueData::IntSet(s) => Some(s.iter().copied().collect()),
        _ => None,
    }
}

fn fold_list<T: Clone + PartialEq>(cur: &[T], items: Vec<T>, toggle: bool, replace: bool) -> Vec<T> {
    if toggle && cur == items.as_slice() {
        Vec::new()
    } else if replace {
        items
    } else {
        let mut out = cur.to_vec();
        out.extend(items);
        out
    }
}

fn fold_set<T: Ord + Clone>(
    cur: &BTreeSet<T>,
    items: BTreeSet<T>,
    toggle: bool,
    replace: bool,
) -> BTreeSet<T> {
    if toggle {
        cur.symmetric_difference(&items).cloned().collect()
    } else if replace {
        items
    } else {
        cur.union(&items).cloned().collect()
    }
}
