//! Predicate expression trees.
//!
//! A predicate is observed against a local value map and produces a
//! [`BoolStream`] that recomputes whenever any value it references
//! changes. Resolution of references happens once, when the stream is
//! built; the stream then follows the resolved values.

use std::cell::Cell;
use std::rc::Rc;

use tracing::trace;

use crate::error::ConfigurationError;
use crate::global_state::GlobalState;
use crate::observable::{BoolStream, Subscription, WeakBoolStream};
use crate::scheduler::{Scheduler, TimerId};
use crate::value::Value;
use crate::value_map::ValueMap;
use crate::value_ref::ValueRef;

/// Everything an expression needs besides its local map.
#[derive(Clone)]
pub struct EvalContext {
    pub global: GlobalState,
    /// Timer source for debounced predicates.
    pub scheduler: Rc<dyn Scheduler>,
}

impl EvalContext {
    pub fn new(global: GlobalState, scheduler: Rc<dyn Scheduler>) -> Self {
        EvalContext { global, scheduler }
    }
}

#[derive(Debug, Clone)]
pub enum Predicate {
    True,
    False,
    Not(Box<Predicate>),
    /// At least two children
    And(Vec<Predicate>),
    /// At least two children
    Or(Vec<Predicate>),
    Equals(ValueRef, ValueRef),
    LessThan(ValueRef, ValueRef),
    GreaterThan(ValueRef, ValueRef),
    Includes {
        container: ValueRef,
        item: ValueRef,
    },
    PrefixOf(ValueRef, ValueRef),
    /// True right after the value changes; false again after `since_ms`
    /// without further changes.
    Changed {
        value: ValueRef,
        since_ms: u64,
    },
}

impl Predicate {
    pub fn and(children: Vec<Predicate>) -> Result<Predicate, ConfigurationError> {
        check_arity("and", &children)?;
        Ok(Predicate::And(children))
    }

    pub fn or(children: Vec<Predicate>) -> Result<Predicate, ConfigurationError> {
        check_arity("or", &children)?;
        Ok(Predicate::Or(children))
    }

    pub fn not(child: Predicate) -> Predicate {
        Predicate::Not(Box::new(child))
    }

    /// Element name in the template language.
    pub fn name(&self) -> &'static str {
        match self {
            Predicate::True => "true",
            Predicate::False => "false",
            Predicate::Not(_) => "not",
            Predicate::And(_) => "and",
            Predicate::Or(_) => "or",
            Predicate::Equals(..) => "equals",
            Predicate::LessThan(..) => "less-than",
            Predicate::GreaterThan(..) => "greater-than",
            Predicate::Includes { .. } => "includes",
            Predicate::PrefixOf(..) => "prefix-of",
            Predicate::Changed { .. } => "changed",
        }
    }

    /// Build a live boolean stream for this predicate over `local`.
    pub fn observe(
        &self,
        local: &ValueMap,
        ctx: &EvalContext,
    ) -> Result<BoolStream, ConfigurationError> {
        match self {
            Predicate::True => Ok(BoolStream::constant(true)),
            Predicate::False => Ok(BoolStream::constant(false)),
            Predicate::Not(child) => {
                let child = child.observe(local, ctx)?;
                Ok(combine(vec![child], |vals| !vals[0]))
            }
            Predicate::And(children) => {
                let streams = observe_all(children, local, ctx)?;
                Ok(combine(streams, |vals| vals.iter().all(|b| *b)))
            }
            Predicate::Or(children) => {
                let streams = observe_all(children, local, ctx)?;
                Ok(combine(streams, |vals| vals.iter().any(|b| *b)))
            }
            Predicate::Equals(a, b) => {
                self.binary(a, b, local, ctx, |x, y| x.equals(y))
            }
            Predicate::LessThan(a, b) => self.binary(a, b, local, ctx, |x, y| {
                x.compare(y) == std::cmp::Ordering::Less
            }),
            Predicate::GreaterThan(a, b) => self.binary(a, b, local, ctx, |x, y| {
                x.compare(y) == std::cmp::Ordering::Greater
            }),
            Predicate::Includes { container, item } => {
                self.binary(container, item, local, ctx, |c, i| c.includes(i))
            }
            Predicate::PrefixOf(a, b) => self.binary(a, b, local, ctx, |x, y| x.prefix_of(y)),
            Predicate::Changed { value, since_ms } => {
                let value = self.operand(value, local, ctx)?;
                let out = changed(&value, *since_ms, ctx.scheduler.clone());
                out.retain_value(value);
                Ok(out)
            }
        }
    }

    /// Current truth value over `local`.
    ///
    /// The stream built here is dropped on return, so a `<changed>` term
    /// never sees a change and is always false in `<if>` and `<case>`
    /// conditions.
    pub fn evaluate(&self, local: &ValueMap, ctx: &EvalContext) -> Result<bool, ConfigurationError> {
        Ok(self.observe(local, ctx)?.get())
    }

    fn operand(
        &self,
        r: &ValueRef,
        local: &ValueMap,
        ctx: &EvalContext,
    ) -> Result<Value, ConfigurationError> {
        r.resolve(Some(local), Some(&ctx.global))?.ok_or_else(|| {
            ConfigurationError::error(
                "predicate",
                format!(
                    "<{}>: {} does not resolve in local map {}",
                    self.name(),
                    r,
                    local.describe()
                ),
            )
        })
    }

    fn binary(
        &self,
        a: &ValueRef,
        b: &ValueRef,
        local: &ValueMap,
        ctx: &EvalContext,
        test: fn(&Value, &Value) -> bool,
    ) -> Result<BoolStream, ConfigurationError> {
        let a = self.operand(a, local, ctx)?;
        let b = self.operand(b, local, ctx)?;
        let out = BoolStream::new(test(&a, &b));

        let weak_out = out.downgrade();
        let (weak_a, weak_b) = (a.downgrade(), b.downgrade());
        let recompute = Rc::new(move || {
            if let (Some(out), Some(a), Some(b)) =
                (weak_out.upgrade(), weak_a.upgrade(), weak_b.upgrade())
            {
                out.set(test(&a, &b));
            }
        });
        for operand in [a, b] {
            let r = recompute.clone();
            out.hold(operand.subscribe(move |_| r()));
            out.retain_value(operand);
        }
        Ok(out)
    }
}

fn check_arity(name: &str, children: &[Predicate]) -> Result<(), ConfigurationError> {
    if children.len() < 2 {
        return Err(ConfigurationError::fatal(
            "predicate",
            format!(
                "<{}> needs at least two children, got {}",
                name,
                children.len()
            ),
        ));
    }
    Ok(())
}

fn observe_all(
    children: &[Predicate],
    local: &ValueMap,
    ctx: &EvalContext,
) -> Result<Vec<BoolStream>, ConfigurationError> {
    children.iter().map(|c| c.observe(local, ctx)).collect()
}

/// A stream over `children`, recomputed by `f` whenever any child emits.
fn combine(children: Vec<BoolStream>, f: fn(&[bool]) -> bool) -> BoolStream {
    let initial: Vec<bool> = children.iter().map(BoolStream::get).collect();
    let out = BoolStream::new(f(&initial));

    let weak_out = out.downgrade();
    let weak_children: Vec<WeakBoolStream> = children.iter().map(BoolStream::downgrade).collect();
    let recompute = Rc::new(move || {
        let Some(out) = weak_out.upgrade() else {
            return;
        };
        let vals: Vec<bool> = weak_children
            .iter()
            .filter_map(|w| w.upgrade().map(|s| s.get()))
            .collect();
        out.set(f(&vals));
    });
    for child in children {
        let r = recompute.clone();
        out.hold(child.subscribe(move |_| r()));
        out.retain_child(child);
    }
    out
}

fn changed(value: &Value, since_ms: u64, scheduler: Rc<dyn Scheduler>) -> BoolStream {
    let out = BoolStream::new(false);
    let pending: Rc<Cell<Option<TimerId>>> = Rc::new(Cell::new(None));

    let weak_out = out.downgrade();
    let primed = Cell::new(false);
    let timer = pending.clone();
    let sched = scheduler.clone();
    let sub = value.subscribe(move |v| {
        // The first call is the subscription replay, not a change.
        if !primed.replace(true) {
            return;
        }
        let Some(out) = weak_out.upgrade() else {
            return;
        };
        trace!(value = %v.describe(), since_ms, "changed");
        if let Some(id) = timer.take() {
            sched.cancel(id);
        }
        out.set(true);
        if since_ms == 0 {
            out.set(false);
            return;
        }
        let weak_out = weak_out.clone();
        let slot = timer.clone();
        let id = sched.schedule(
            since_ms,
            Box::new(move || {
                slot.set(None);
                if let Some(out) = weak_out.upgrade() {
                    out.set(false);
                }
            }),
        );
        timer.set(Some(id));
    });
    out.hold(sub);
    out.hold(Subscription::new(move || {
        if let Some(id) = pending.take() {
            scheduler.cancel(id);
        }
    }));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::ManualScheduler;
    use std::cell::RefCell;

    fn ctx() -> (EvalContext, Rc<ManualScheduler>) {
        let sched = Rc::new(ManualScheduler::new());
        let global = GlobalState::new();
        global.insert("x", Value::int(0)).unwrap();
        global.insert("name", Value::string("")).unwrap();
        global.publish();
        (EvalContext::new(global, sched.clone()), sched)
    }

    fn global(c: &EvalContext, key: &str) -> Value {
        c.global.get(key).unwrap().unwrap()
    }

    fn record(s: &BoolStream) -> (Rc<RefCell<Vec<bool>>>, Subscription) {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s2 = seen.clone();
        let sub = s.subscribe(move |b| s2.borrow_mut().push(b));
        (seen, sub)
    }

    fn gref(k: &str) -> ValueRef {
        ValueRef::Global(k.into())
    }

    fn lit(v: Value) -> ValueRef {
        ValueRef::Literal(v)
    }

    #[test]
    fn and_or_need_two_children() {
        let err = Predicate::and(vec![Predicate::True]).unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(err.message, "<and> needs at least two children, got 1");
        assert!(Predicate::or(vec![]).is_err());
        assert!(Predicate::or(vec![Predicate::True, Predicate::False]).is_ok());
    }

    #[test]
    fn comparisons_follow_global_changes() {
        let (c, _) = ctx();
        let p = Predicate::GreaterThan(gref("x"), lit(Value::int(2)));
        let s = p.observe(&ValueMap::new(), &c).unwrap();
        let (seen, _sub) = record(&s);
        global(&c, "x").fold(&Value::int(3), false, true);
        global(&c, "x").fold(&Value::int(4), false, true);
        global(&c, "x").fold(&Value::int(1), false, true);
        assert_eq!(*seen.borrow(), vec![false, true, false]);
    }

    #[test]
    fn combinators_track_children() {
        let (c, _) = ctx();
        let p = Predicate::and(vec![
            Predicate::Equals(gref("name"), lit(Value::string("a"))),
            Predicate::not(Predicate::LessThan(gref("x"), lit(Value::int(1)))),
        ])
        .unwrap();
        let s = p.observe(&ValueMap::new(), &c).unwrap();
        assert!(!s.get());
        global(&c, "name").fold(&Value::string("a"), false, true);
        assert!(!s.get());
        global(&c, "x").fold(&Value::int(1), false, true);
        assert!(s.get());
    }

    #[test]
    fn includes_against_local_item() {
        let (c, _) = ctx();
        let local = ValueMap::from_entries([("tag", Value::string("a"))]);
        let p = Predicate::Includes {
            container: lit(Value::string_set(["a", "b"])),
            item: ValueRef::Local("tag".into()),
        };
        assert!(p.evaluate(&local, &c).unwrap());
        local.get("tag").unwrap().fold(&Value::string("c"), false, true);
        assert!(!p.evaluate(&local, &c).unwrap());
    }

    #[test]
    fn stream_outlives_its_local_map() {
        let (c, _) = ctx();
        let p = Predicate::Equals(gref("name"), ValueRef::Local("name".into()));
        let s = p
            .observe(&ValueMap::from_entries([("name", Value::string("a"))]), &c)
            .unwrap();
        assert!(!s.get());
        global(&c, "name").fold(&Value::string("a"), false, true);
        assert!(s.get());
        global(&c, "name").fold(&Value::string("b"), false, true);
        assert!(!s.get());
    }

    #[test]
    fn greater_than_holds_for_incomparable_operands() {
        let (c, _) = ctx();
        let local = ValueMap::new();
        let gt = |a: Value, b: Value| {
            Predicate::GreaterThan(lit(a), lit(b))
                .evaluate(&local, &c)
                .unwrap()
        };
        assert!(gt(Value::string("x"), Value::int(1)));
        assert!(gt(Value::int(1), Value::string("x")));
        assert!(gt(Value::double(f64::NAN), Value::double(1.0)));
        assert!(gt(Value::int(3), Value::double(2.5)));
        assert!(!gt(Value::int(2), Value::int(2)));
        assert!(!gt(Value::int(1), Value::int(2)));
    }

    #[test]
    fn unresolved_operand_is_an_error() {
        let (c, _) = ctx();
        let p = Predicate::Equals(ValueRef::Local("missing".into()), lit(Value::int(0)));
        let err = p.evaluate(&ValueMap::new(), &c).unwrap_err();
        assert!(!err.is_fatal());
        assert_eq!(err.origin, "predicate");
    }

    #[test]
    fn changed_is_debounced() {
        let (c, sched) = ctx();
        let p = Predicate::Changed {
            value: gref("x"),
            since_ms: 100,
        };
        let s = p.observe(&ValueMap::new(), &c).unwrap();
        let (seen, _sub) = record(&s);
        let x = global(&c, "x");

        x.fold(&Value::int(0), false, true);
        assert!(!s.get(), "equal assignment is not a change");

        x.fold(&Value::int(1), false, true);
        assert!(s.get());
        sched.advance(60);
        x.fold(&Value::int(2), false, true);
        sched.advance(60);
        assert!(s.get(), "second change reset the timer");
        sched.advance(40);
        assert!(!s.get());
        assert_eq!(*seen.borrow(), vec![false, true, false]);
        assert_eq!(sched.pending(), 0);
    }

    #[test]
    fn changed_with_zero_delay_is_momentary() {
        let (c, _) = ctx();
        let p = Predicate::Changed {
            value: gref("x"),
            since_ms: 0,
        };
        let s = p.observe(&ValueMap::new(), &c).unwrap();
        let (seen, _sub) = record(&s);
        global(&c, "x").fold(&Value::int(7), false, true);
        assert_eq!(*seen.borrow(), vec![false, true, false]);
    }

    #[test]
    fn dropping_changed_stream_cancels_timer() {
        let (c, sched) = ctx();
        let p = Predicate::Changed {
            value: gref("x"),
            since_ms: 50,
        };
        let s = p.observe(&ValueMap::new(), &c).unwrap();
        global(&c, "x").fold(&Value::int(3), false, true);
        assert_eq!(sched.pending(), 1);
        drop(s);
        assert_eq!(sched.pending(), 0);
        assert_eq!(global(&c, "x").subscriber_count(), 0);
    }
}
