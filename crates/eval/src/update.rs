//! Update expression trees: mutations applied to values when an action
//! fires.

use tracing::debug;

use crate::error::ConfigurationError;
use crate::predicate::{EvalContext, Predicate};
use crate::value::Value;
use crate::value_map::ValueMap;
use crate::value_ref::ValueRef;

#[derive(Debug, Clone)]
pub enum Update {
    Set { target: ValueRef, source: ValueRef },
    /// Like `Set`, but only while the target holds its zero value.
    SetIfEmpty { target: ValueRef, source: ValueRef },
    /// Set, or clear if the target already equals the source.
    SetOrClear { target: ValueRef, source: ValueRef },
    Toggle { target: ValueRef, source: ValueRef },
    /// Append (lists) or union (sets).
    Extend { target: ValueRef, source: ValueRef },
    Clear(Vec<ValueRef>),
    Do(Vec<Update>),
    If {
        predicate: Predicate,
        then: Vec<Update>,
        otherwise: Option<Vec<Update>>,
    },
    /// First matching case wins.
    Switch(Vec<Case>),
}

#[derive(Debug, Clone)]
pub struct Case {
    pub predicate: Predicate,
    pub updates: Vec<Update>,
}

impl Update {
    pub fn name(&self) -> &'static str {
        match self {
            Update::Set { .. } => "set",
            Update::SetIfEmpty { .. } => "set-if-empty",
            Update::SetOrClear { .. } => "set-or-clear",
            Update::Toggle { .. } => "toggle",
            Update::Extend { .. } => "extend",
            Update::Clear(_) => "clear",
            Update::Do(_) => "do",
            Update::If { .. } => "if",
            Update::Switch(_) => "switch",
        }
    }

    /// Execute against `local`, synchronously and in declaration order.
    pub fn apply(&self, local: &ValueMap, ctx: &EvalContext) -> Result<(), ConfigurationError> {
        match self {
            Update::Set { target, source } => self.fold_into(target, source, local, ctx, false, true),
            Update::SetIfEmpty { target, source } => {
                let t = self.target(target, local, ctx)?;
                if !t.is_zero() {
                    return Ok(());
                }
                self.fold_into(target, source, local, ctx, false, true)
            }
            Update::SetOrClear { target, source } | Update::Toggle { target, source } => {
                self.fold_into(target, source, local, ctx, true, true)
            }
            Update::Extend { target, source } => {
                self.fold_into(target, source, local, ctx, false, false)
            }
            Update::Clear(targets) => {
                let empty = Value::empty();
                for target in targets {
                    let t = self.target(target, local, ctx)?;
                    self.fold(&t, &empty, false, true)?;
                }
                Ok(())
            }
            Update::Do(updates) => apply_all(updates, local, ctx),
            Update::If {
                predicate,
                then,
                otherwise,
            } => {
                if predicate.evaluate(local, ctx)? {
                    apply_all(then, local, ctx)
                } else if let Some(otherwise) = otherwise {
                    apply_all(otherwise, local, ctx)
                } else {
                    Ok(())
                }
            }
            Update::Switch(cases) => {
                for case in cases {
                    if case.predicate.evaluate(local, ctx)? {
                        return apply_all(&case.updates, local, ctx);
                    }
                }
                Ok(())
            }
        }
    }

    fn target(
        &self,
        r: &ValueRef,
        local: &ValueMap,
        ctx: &EvalContext,
    ) -> Result<Value, ConfigurationError> {
        r.resolve(Some(local), Some(&ctx.global))?.ok_or_else(|| {
            ConfigurationError::fatal(
                "update",
                format!("<{}>: target {} does not resolve", self.name(), r),
            )
        })
    }

    fn fold_into(
        &self,
        target: &ValueRef,
        source: &ValueRef,
        local: &ValueMap,
        ctx: &EvalContext,
        toggle: bool,
        replace: bool,
    ) -> Result<(), ConfigurationError> {
        let Some(src) = source.resolve(Some(local), Some(&ctx.global))? else {
            debug!(update = self.name(), source = %source, "source unresolved, skipping");
            return Ok(());
        };
        let t = self.target(target, local, ctx)?;
        self.fold(&t, &src, toggle, replace)
    }

    fn fold(
        &self,
        target: &Value,
        source: &Value,
        toggle: bool,
        replace: bool,
    ) -> Result<(), ConfigurationError> {
        if target.fold(source, toggle, replace) {
            Ok(())
        } else {
            Err(ConfigurationError::error(
                "update",
                format!(
                    "<{}>: cannot fold {} into {}",
                    self.name(),
                    source.type_name(),
                    target.type_name()
                ),
            ))
        }
    }
}

/// Apply `updates` in order, stopping at the first error.
pub fn apply_all(
    updates: &[Update],
    local: &ValueMap,
    ctx: &EvalContext,
) -> Result<(), ConfigurationError> {
    for update in updates {
        update.apply(local, ctx)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::global_state::GlobalState;
    use crate::scheduler::ManualScheduler;
    use std::rc::Rc;

    fn ctx() -> EvalContext {
        let global = GlobalState::new();
        global.insert("text", Value::string("")).unwrap();
        global.insert("count", Value::int(0)).unwrap();
        global.insert("names", Value::string_set(Vec::<String>::new())).unwrap();
        global.insert("log", Value::string_list(Vec::<String>::new())).unwrap();
        global.publish();
        EvalContext::new(global, Rc::new(ManualScheduler::new()))
    }

    fn g(c: &EvalContext, k: &str) -> Value {
        c.global.get(k).unwrap().unwrap()
    }

    fn gref(k: &str) -> ValueRef {
        ValueRef::Global(k.into())
    }

    fn lref(k: &str) -> ValueRef {
        ValueRef::Local(k.into())
    }

    fn lit(v: Value) -> ValueRef {
        ValueRef::Literal(v)
    }

    #[test]
    fn set_uses_local_source() {
        let c = ctx();
        let local = ValueMap::from_entries([("name", Value::string("a"))]);
        Update::Set {
            target: gref("text"),
            source: lref("name"),
        }
        .apply(&local, &c)
        .unwrap();
        assert_eq!(g(&c, "text").as_string().unwrap(), "a");
    }

    #[test]
    fn missing_source_is_skipped() {
        let c = ctx();
        g(&c, "text").fold(&Value::string("keep"), false, true);
        Update::Set {
            target: gref("text"),
            source: lref("absent"),
        }
        .apply(&ValueMap::new(), &c)
        .unwrap();
        assert_eq!(g(&c, "text").as_string().unwrap(), "keep");
    }

    #[test]
    fn missing_target_is_fatal() {
        let c = ctx();
        let err = Update::Set {
            target: lref("absent"),
            source: lit(Value::int(1)),
        }
        .apply(&ValueMap::new(), &c)
        .unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn incompatible_fold_is_an_error() {
        let c = ctx();
        let err = Update::Set {
            target: gref("count"),
            source: lit(Value::string("x")),
        }
        .apply(&ValueMap::new(), &c)
        .unwrap_err();
        assert!(!err.is_fatal());
        assert_eq!(err.message, "<set>: cannot fold string into int");
    }

    #[test]
    fn set_if_empty_only_fills_zero_targets() {
        let c = ctx();
        let u = Update::SetIfEmpty {
            target: gref("text"),
            source: lref("name"),
        };
        u.apply(&ValueMap::from_entries([("name", Value::string("first"))]), &c)
            .unwrap();
        u.apply(&ValueMap::from_entries([("name", Value::string("second"))]), &c)
            .unwrap();
        assert_eq!(g(&c, "text").as_string().unwrap(), "first");
    }

    #[test]
    fn toggle_and_set_or_clear_share_semantics() {
        let c = ctx();
        let local = ValueMap::from_entries([("name", Value::string("a"))]);
        for u in [
            Update::Toggle {
                target: gref("names"),
                source: lref("name"),
            },
            Update::SetOrClear {
                target: gref("text"),
                source: lref("name"),
            },
        ] {
            u.apply(&local, &c).unwrap();
            u.apply(&local, &c).unwrap();
        }
        assert!(g(&c, "names").is_zero());
        assert!(g(&c, "text").is_zero());
    }

    #[test]
    fn extend_appends_and_clear_resets() {
        let c = ctx();
        let u = Update::Extend {
            target: gref("log"),
            source: lit(Value::string("x")),
        };
        u.apply(&ValueMap::new(), &c).unwrap();
        u.apply(&ValueMap::new(), &c).unwrap();
        assert_eq!(g(&c, "log").as_string_list().unwrap(), vec!["x", "x"]);
        Update::Clear(vec![gref("log"), gref("count")])
            .apply(&ValueMap::new(), &c)
            .unwrap();
        assert!(g(&c, "log").is_zero());
    }

    #[test]
    fn switch_runs_only_first_match() {
        let c = ctx();
        let set_text = |s: &str| Update::Set {
            target: gref("text"),
            source: lit(Value::string(s)),
        };
        let u = Update::Switch(vec![
            Case {
                predicate: Predicate::Equals(lref("n"), lit(Value::int(1))),
                updates: vec![set_text("one")],
            },
            Case {
                predicate: Predicate::True,
                updates: vec![set_text("other")],
            },
        ]);
        u.apply(&ValueMap::from_entries([("n", Value::int(1))]), &c)
            .unwrap();
        assert_eq!(g(&c, "text").as_string().unwrap(), "one");
        u.apply(&ValueMap::from_entries([("n", Value::int(2))]), &c)
            .unwrap();
        assert_eq!(g(&c, "text").as_string().unwrap(), "other");
    }

    #[test]
    fn later_updates_see_earlier_ones() {
        let c = ctx();
        let u = Update::Do(vec![
            Update::Set {
                target: gref("count"),
                source: lit(Value::int(2)),
            },
            Update::If {
                predicate: Predicate::Equals(gref("count"), lit(Value::int(2))),
                then: vec![Update::Set {
                    target: gref("text"),
                    source: lit(Value::string("two")),
                }],
                otherwise: None,
            },
        ]);
        u.apply(&ValueMap::new(), &c).unwrap();
        assert_eq!(g(&c, "text").as_string().unwrap(), "two");
    }
}
