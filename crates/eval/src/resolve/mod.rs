//! Resolution of a parsed template into live state and interactions.
//!
//! Resolution is eager: every element is validated as it is visited and
//! the first problem is returned as a FATAL [`ConfigurationError`]
//! carrying `file:line`. Global state is registered and published before
//! interactions are resolved, so every `<global-ref>` can be checked.

mod expressions;
mod values;

use std::fmt;
use std::rc::Rc;

use tracing::debug;
use traceviz_core::Element;

use crate::error::ConfigurationError;
use crate::global_state::GlobalState;
use crate::interactions::{Interactions, InteractionsBuilder};
use crate::predicate::EvalContext;
use crate::scheduler::Scheduler;

/// A resolved template.
#[derive(Debug)]
pub struct Document {
    pub global: GlobalState,
    pub interactions: Interactions,
}

/// Resolve `root` (a `<traceviz>` or bare `<interactions>` element).
pub fn resolve(
    root: &Element,
    filename: &str,
    scheduler: Rc<dyn Scheduler>,
) -> Result<Document, ConfigurationError> {
    let r = Resolver {
        file: filename,
        global: GlobalState::new(),
    };
    let interactions_el = match root.name.as_str() {
        "interactions" => Some(root),
        "traceviz" => {
            let mut state = None;
            let mut interactions = None;
            for child in r.elements(root)? {
                let slot = match child.name.as_str() {
                    "global-state" => &mut state,
                    "interactions" => &mut interactions,
                    _ => return Err(r.err(child, "expected <global-state> or <interactions>")),
                };
                if slot.is_some() {
                    return Err(r.err(child, "may appear only once"));
                }
                *slot = Some(child);
            }
            if let Some(state) = state {
                r.global_state(state)?;
            }
            interactions
        }
        _ => return Err(r.err(root, "root must be <traceviz> or <interactions>")),
    };
    r.global.publish();

    let ctx = EvalContext::new(r.global.clone(), scheduler);
    let interactions = match interactions_el {
        Some(el) => r.interactions(el, ctx)?,
        None => InteractionsBuilder::new().build(ctx)?,
    };
    debug!(
        file = filename,
        globals = r.global.len(),
        actions = interactions.actions().len(),
        reactions = interactions.reactions().len(),
        watches = interactions.watches().len(),
        "template resolved"
    );
    Ok(Document {
        global: r.global,
        interactions,
    })
}

pub(crate) struct Resolver<'a> {
    file: &'a str,
    global: GlobalState,
}

impl Resolver<'_> {
    fn err(&self, el: &Element, msg: impl fmt::Display) -> ConfigurationError {
        ConfigurationError::fatal(
            "template",
            format!("{}:{}: <{}>: {}", self.file, el.line, el.name, msg),
        )
    }

    fn attr<'e>(&self, el: &'e Element, name: &str) -> Result<&'e str, ConfigurationError> {
        el.attr(name)
            .ok_or_else(|| self.err(el, format!("missing attribute '{}'", name)))
    }

    /// Child elements of a container element, which may not hold text.
    fn elements<'e>(&self, el: &'e Element) -> Result<Vec<&'e Element>, ConfigurationError> {
        if el.has_text() {
            return Err(self.err(el, format!("unexpected text '{}'", el.text())));
        }
        Ok(el.elements().collect())
    }

    fn exactly<'e>(&self, el: &'e Element, n: usize) -> Result<Vec<&'e Element>, ConfigurationError> {
        let children = self.elements(el)?;
        if children.len() != n {
            return Err(self.err(
                el,
                format!("expected {} child element(s), got {}", n, children.len()),
            ));
        }
        Ok(children)
    }

    fn interactions(
        &self,
        el: &Element,
        ctx: EvalContext,
    ) -> Result<Interactions, ConfigurationError> {
        let mut builder = InteractionsBuilder::new();
        for child in self.elements(el)? {
            match child.name.as_str() {
                "action" => {
                    builder.action(self.action(child)?);
                }
                "reaction" => {
                    builder.reaction(self.reaction(child)?);
                }
                "watch" => {
                    builder.watch(self.watch(child)?);
                }
                _ => return Err(self.err(child, "expected <action>, <reaction> or <watch>")),
            }
        }
        builder.build(ctx).map_err(|e| {
            ConfigurationError::fatal("template", format!("{}:{}: {}", self.file, el.line, e.message))
        })
    }
}
