//! traceviz-eval: the TraceViz value-binding and interaction engine.
//!
//! Templates parsed by `traceviz-core` are resolved here into shared
//! observable [`Value`]s held in [`GlobalState`], and an [`Interactions`]
//! set mapping UI actions to [`Update`] trees and reactions to live
//! [`Predicate`] streams.
//!
//! - [`load_document()`] -- read, parse and resolve a template file
//! - [`Interactions::update()`] / [`Interactions::dispatch()`] -- run actions
//! - [`Interactions::match_reaction()`] -- per-element match streams
//! - [`Interactions::watch()`] -- callbacks over watched arguments
//! - [`documenter::pretty_print()`] -- deterministic interaction dump
//!
//! Everything is single-threaded: values are `Rc`-shared and notify
//! their subscribers synchronously.

pub mod documenter;
pub mod error;
pub mod global_state;
pub mod interactions;
pub mod observable;
pub mod predicate;
pub mod resolve;
pub mod scheduler;
pub mod update;
pub mod value;
pub mod value_map;
pub mod value_ref;

use std::path::Path;
use std::rc::Rc;

use traceviz_core::TemplateError;

pub use error::{ConfigurationError, ErrorChannel, Severity};
pub use global_state::GlobalState;
pub use interactions::{
    Action, Interactions, InteractionsBuilder, Matcher, Reaction, Watch, WatchCallback,
};
pub use observable::{BoolStream, Subscription, Teardown};
pub use predicate::{EvalContext, Predicate};
pub use resolve::{resolve, Document};
pub use scheduler::{ManualScheduler, Scheduler, TimerId};
pub use update::{Case, Update};
pub use value::{Timestamp, Value, ValueData};
pub use value_map::ValueMap;
pub use value_ref::ValueRef;

/// Failure to load a template: a syntax error or a resolution error.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error(transparent)]
    Template(#[from] TemplateError),
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
}

impl LoadError {
    pub fn to_json_value(&self) -> serde_json::Value {
        match self {
            LoadError::Template(e) => e.to_json_value(),
            LoadError::Configuration(e) => e.to_json_value(),
        }
    }
}

/// Read, parse and resolve a template file.
pub fn load_document(path: &Path, scheduler: Rc<dyn Scheduler>) -> Result<Document, LoadError> {
    let root = traceviz_core::load_template(path)?;
    let filename = path.display().to_string();
    Ok(resolve(&root, &filename, scheduler)?)
}

/// Parse and resolve template source text.
pub fn load_document_str(
    src: &str,
    filename: &str,
    scheduler: Rc<dyn Scheduler>,
) -> Result<Document, LoadError> {
    let root = traceviz_core::parse_template(src, filename)?;
    Ok(resolve(&root, filename, scheduler)?)
}
