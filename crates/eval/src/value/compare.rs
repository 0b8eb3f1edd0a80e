//! Ordering, containment and prefix relations between values.

use std::cmp::Ordering;

use super::{Value, ValueData};

impl Value {
    /// Total-enough ordering used by `<equals>`, `<less-than>` and
    /// `<greater-than>`.
    ///
    /// Empty equals any zero value and sorts below anything else. Ints and
    /// doubles compare numerically across types. Collections compare by
    /// length, then element-wise. Incomparable pairs (and NaN) order as
    /// `Greater`, so they are never equal and never less.
    pub fn compare(&self, other: &Value) -> Ordering {
        let b = other.data();
        self.with_data(|a| compare_data(a, &b))
    }

    pub fn equals(&self, other: &Value) -> bool {
        self.compare(other) == Ordering::Equal
    }

    /// Whether this value contains `item`.
    pub fn includes(&self, item: &Value) -> bool {
        let b = item.data();
        self.with_data(|a| includes_data(a, &b))
    }

    /// Whether this value is a prefix of `other`.
    pub fn prefix_of(&self, other: &Value) -> bool {
        let b = other.data();
        self.with_data(|a| prefix_data(a, &b))
    }
}

pub(crate) fn compare_data(a: &ValueData, b: &ValueData) -> Ordering {
    use ValueData as D;
    match (a, b) {
        (D::Empty, D::Empty) => Ordering::Equal,
        (D::Empty, x) => {
            if x.is_zero() {
                Ordering::Equal
            } else {
                Ordering::Less
            }
        }
        (x, D::Empty) => {
            if x.is_zero() {
                Ordering::Equal
            } else {
                Ordering::Greater
            }
        }
        (D::String(x), D::String(y)) => x.cmp(y),
        (D::Int(x), D::Int(y)) => x.cmp(y),
        (D::Int(x), D::Double(y)) => cmp_f64(*x as f64, *y),
        (D::Double(x), D::Int(y)) => cmp_f64(*x, *y as f64),
        (D::Double(x), D::Double(y)) => cmp_f64(*x, *y),
        (D::Duration(x), D::Duration(y)) => x.cmp(y),
        (D::Timestamp(x), D::Timestamp(y)) => x.cmp(y),
        (D::StringList(x), D::StringList(y)) => cmp_seq(x.iter(), y.iter()),
        (D::StringSet(x), D::StringSet(y)) => cmp_seq(x.iter(), y.iter()),
        (D::IntList(x), D::IntList(y)) => cmp_seq(x.iter(), y.iter()),
        (D::IntSet(x), D::IntSet(y)) => cmp_seq(x.iter(), y.iter()),
        _ => Ordering::Greater,
    }
}

fn cmp_f64(x: f64, y: f64) -> Ordering {
    x.partial_cmp(&y).unwrap_or(Ordering::Greater)
}

fn cmp_seq<'a, T: Ord + 'a>(
    x: impl ExactSizeIterator<Item = &'a T>,
    y: impl ExactSizeIterator<Item = &'a T>,
) -> Ordering {
    x.len().cmp(&y.len()).then_with(|| x.cmp(y))
}

fn includes_data(container: &ValueData, item: &ValueData) -> bool {
    use ValueData as D;
    if matches!(item, D::Empty) {
        return container.is_collection() || container.is_zero();
    }
    match (container, item) {
        (D::StringSet(set), D::String(s)) => set.contains(s),
        (D::StringSet(set), D::StringSet(sub)) => sub.is_subset(set),
        (D::StringSet(set), D::StringList(list)) => list.iter().all(|s| set.contains(s)),
        (D::IntSet(set), D::Int(i)) => set.contains(i),
        (D::IntSet(set), D::IntSet(sub)) => sub.is_subset(set),
        (D::IntSet(set), D::IntList(list)) => list.iter().all(|i| set.contains(i)),
        (D::StringList(list), D::String(s)) => list.contains(s),
        (D::StringList(list), D::StringList(sub)) => is_subsequence(sub, list),
        (D::StringList(list), D::StringSet(sub)) => sub.iter().all(|s| list.contains(s)),
        (D::IntList(list), D::Int(i)) => list.contains(i),
        (D::IntList(list), D::IntList(sub)) => is_subsequence(sub, list),
        (D::IntList(list), D::IntSet(sub)) => sub.iter().all(|i| list.contains(i)),
        (c, i) if !c.is_collection() => compare_data(c, i) == Ordering::Equal,
        _ => false,
    }
}

/// `sub` appears in `list` in order, not necessarily contiguously.
fn is_subsequence<T: PartialEq>(sub: &[T], list: &[T]) -> bool {
    let mut it = list.iter();
    sub.iter().all(|s| it.any(|l| l == s))
}

fn prefix_data(a: &ValueData, b: &ValueData) -> bool {
    use ValueData as D;
    match (a, b) {
        (D::Empty, _) => true,
        (D::String(x), D::String(y)) => y.starts_with(x.as_str()),
        (D::StringList(x), D::StringList(y)) => y.starts_with(x),
        (D::IntList(x), D::IntList(y)) => y.starts_with(x),
        _ => false,
    }
}
