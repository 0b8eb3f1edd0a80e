//! The interactions runtime: actions, reactions and watches bound to a
//! component.

use std::cell::Cell;
use std::collections::HashMap;
use std::rc::Rc;

use tracing::{debug, trace};

use crate::error::ConfigurationError;
use crate::observable::{BoolStream, Teardown};
use crate::predicate::{EvalContext, Predicate};
use crate::update::{apply_all, Update};
use crate::value_map::ValueMap;

/// Updates run when `(target, kind)` fires.
#[derive(Debug, Clone)]
pub struct Action {
    pub target: String,
    pub kind: String,
    pub updates: Vec<Update>,
}

/// A predicate a renderer evaluates per element for `(target, kind)`.
#[derive(Debug, Clone)]
pub struct Reaction {
    pub target: String,
    pub kind: String,
    pub predicate: Predicate,
}

/// A named callback hook over an argument map.
#[derive(Debug, Clone)]
pub struct Watch {
    pub kind: String,
    pub args: ValueMap,
}

pub type WatchCallback = Box<dyn Fn(&ValueMap)>;

#[derive(Default)]
pub struct InteractionsBuilder {
    actions: Vec<Action>,
    reactions: Vec<Reaction>,
    watches: Vec<Watch>,
}

impl InteractionsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn action(&mut self, action: Action) -> &mut Self {
        self.actions.push(action);
        self
    }

    pub fn reaction(&mut self, reaction: Reaction) -> &mut Self {
        self.reactions.push(reaction);
        self
    }

    pub fn watch(&mut self, watch: Watch) -> &mut Self {
        self.watches.push(watch);
        self
    }

    /// Freeze the declarations. A `(target, kind)` pair bound twice, or a
    /// watch kind declared twice, is fatal.
    pub fn build(self, ctx: EvalContext) -> Result<Interactions, ConfigurationError> {
        if let Some((t, k)) = first_duplicate(self.actions.iter().map(|a| (&a.target, &a.kind))) {
            return Err(duplicate("action", &format!("{}/{}", t, k)));
        }
        if let Some((t, k)) = first_duplicate(self.reactions.iter().map(|r| (&r.target, &r.kind))) {
            return Err(duplicate("reaction", &format!("{}/{}", t, k)));
        }
        if let Some(k) = first_duplicate(self.watches.iter().map(|w| &w.kind)) {
            return Err(duplicate("watch", k));
        }
        Ok(Interactions {
            actions: self.actions,
            reactions: self.reactions,
            watches: self.watches,
            ctx,
        })
    }
}

fn first_duplicate<T: Eq + std::hash::Hash>(items: impl Iterator<Item = T>) -> Option<T> {
    let mut seen = std::collections::HashSet::new();
    for item in items {
        if seen.contains(&item) {
            return Some(item);
        }
        seen.insert(item);
    }
    None
}

fn duplicate(what: &str, name: &str) -> ConfigurationError {
    ConfigurationError::fatal(
        "interactions",
        format!("{} '{}' is declared more than once", what, name),
    )
}

/// The immutable interaction set of one component.
pub struct Interactions {
    actions: Vec<Action>,
    reactions: Vec<Reaction>,
    watches: Vec<Watch>,
    ctx: EvalContext,
}

impl std::fmt::Debug for Interactions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Interactions")
            .field("actions", &self.actions)
            .field("reactions", &self.reactions)
            .field("watches", &self.watches)
            .finish_non_exhaustive()
    }
}

impl Interactions {
    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    pub fn reactions(&self) -> &[Reaction] {
        &self.reactions
    }

    pub fn watches(&self) -> &[Watch] {
        &self.watches
    }

    pub fn context(&self) -> &EvalContext {
        &self.ctx
    }

    /// Run the action bound to `(target, kind)`, if any. Unbound pairs
    /// are a no-op; renderers may query targets nobody declared.
    pub fn update(
        &self,
        target: &str,
        kind: &str,
        local: &ValueMap,
    ) -> Result<(), ConfigurationError> {
        let Some(action) = self
            .actions
            .iter()
            .find(|a| a.target == target && a.kind == kind)
        else {
            debug!(target, kind, "no action bound");
            return Ok(());
        };
        trace!(target, kind, local = %local.describe(), "running action");
        apply_all(&action.updates, local, &self.ctx)
    }

    /// [`Interactions::update`], routing any error to the global error
    /// channel instead of the caller.
    pub fn dispatch(&self, target: &str, kind: &str, local: &ValueMap) {
        if let Err(err) = self.update(target, kind, local) {
            self.ctx.global.report(err);
        }
    }

    /// A matcher for the reaction bound to `(target, kind)`.
    pub fn match_reaction(&self, target: &str, kind: &str) -> Matcher {
        let predicate = self
            .reactions
            .iter()
            .find(|r| r.target == target && r.kind == kind)
            .map(|r| r.predicate.clone());
        Matcher {
            predicate,
            ctx: self.ctx.clone(),
        }
    }

    /// Call `callback` with the arguments of the watch named `kind`: once
    /// now, then whenever any argument value changes, until `teardown`
    /// fires. Undeclared kinds are a no-op.
    pub fn watch(
        &self,
        kind: &str,
        callback: impl Fn(&ValueMap) + 'static,
        teardown: &Teardown,
    ) {
        let Some(watch) = self.watches.iter().find(|w| w.kind == kind) else {
            debug!(kind, "no watch declared");
            return;
        };
        let callback = Rc::new(callback);
        for (_, value) in watch.args.iter() {
            let args = watch.args.clone();
            let cb = callback.clone();
            let primed = Cell::new(false);
            teardown.hold(value.subscribe(move |_| {
                if primed.replace(true) {
                    cb(&args);
                }
            }));
        }
        callback(&watch.args);
    }

    /// Register a callback for every declared watch. A declared watch
    /// with no callback is an error; extra callbacks are ignored.
    pub fn watch_all(
        &self,
        mut callbacks: HashMap<&str, WatchCallback>,
        teardown: &Teardown,
    ) -> Result<(), ConfigurationError> {
        let missing: Vec<&str> = self
            .watches
            .iter()
            .map(|w| w.kind.as_str())
            .filter(|k| !callbacks.contains_key(k))
            .collect();
        if !missing.is_empty() {
            return Err(ConfigurationError::error(
                "interactions",
                format!("no callback for watch {}", quoted(&missing)),
            ));
        }
        for watch in &self.watches {
            if let Some(cb) = callbacks.remove(watch.kind.as_str()) {
                self.watch(&watch.kind, cb, teardown);
            }
        }
        Ok(())
    }

    pub fn check_for_supported_actions(
        &self,
        supported: &[(&str, &str)],
    ) -> Result<(), ConfigurationError> {
        check_pairs(
            "action",
            self.actions.iter().map(|a| (a.target.as_str(), a.kind.as_str())),
            supported,
        )
    }

    pub fn check_for_supported_reactions(
        &self,
        supported: &[(&str, &str)],
    ) -> Result<(), ConfigurationError> {
        check_pairs(
            "reaction",
            self.reactions
                .iter()
                .map(|r| (r.target.as_str(), r.kind.as_str())),
            supported,
        )
    }

    pub fn check_for_supported_watches(&self, supported: &[&str]) -> Result<(), ConfigurationError> {
        let bad: Vec<&str> = self
            .watches
            .iter()
            .map(|w| w.kind.as_str())
            .filter(|k| !supported.contains(k))
            .collect();
        if bad.is_empty() {
            return Ok(());
        }
        Err(ConfigurationError::error(
            "interactions",
            format!(
                "unsupported watch {} (supported: {})",
                quoted(&bad),
                quoted(supported)
            ),
        ))
    }
}

fn check_pairs<'a>(
    what: &str,
    declared: impl Iterator<Item = (&'a str, &'a str)>,
    supported: &[(&str, &str)],
) -> Result<(), ConfigurationError> {
    let bad: Vec<String> = declared
        .filter(|pair| !supported.contains(pair))
        .map(|(t, k)| format!("{}/{}", t, k))
        .collect();
    if bad.is_empty() {
        return Ok(());
    }
    let supported: Vec<String> = supported
        .iter()
        .map(|(t, k)| format!("{}/{}", t, k))
        .collect();
    Err(ConfigurationError::error(
        "interactions",
        format!(
            "unsupported {} {} (supported: {})",
            what,
            quoted(&bad),
            quoted(&supported)
        ),
    ))
}

fn quoted<S: AsRef<str>>(items: &[S]) -> String {
    items
        .iter()
        .map(|s| format!("'{}'", s.as_ref()))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Produces per-element match streams for one reaction.
#[derive(Clone)]
pub struct Matcher {
    predicate: Option<Predicate>,
    ctx: EvalContext,
}

impl Matcher {
    pub fn is_bound(&self) -> bool {
        self.predicate.is_some()
    }

    /// Live match state for an element described by `local`. Constant
    /// false when no reaction is bound.
    pub fn matches(&self, local: &ValueMap) -> Result<BoolStream, ConfigurationError> {
        match &self.predicate {
            Some(p) => p.observe(local, &self.ctx),
            None => Ok(BoolStream::constant(false)),
        }
    }
}
