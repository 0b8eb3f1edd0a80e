//! Configuration errors and the shared error channel.
//!
//! Every problem this engine reports is a [`ConfigurationError`]: either
//! a template-authoring mistake or a data mismatch. `Fatal` errors come
//! out of initial template resolution and are returned straight to the
//! caller. `Error`s raised while handling UI events are routed through
//! the [`ErrorChannel`] so one broken action does not take the page down.

use std::fmt;
use std::rc::Rc;

use serde::Serialize;
use tracing::{error, warn};

use crate::observable::{Observers, Subscription};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    /// The declaring feature is broken; surrounding UI keeps working.
    Error,
    /// Raised while building the object graph; the component cannot start.
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "ERROR"),
            Severity::Fatal => write!(f, "FATAL"),
        }
    }
}

/// A misconfiguration, tagged with the subsystem that detected it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("{severity} [{origin}] {message}")]
pub struct ConfigurationError {
    pub message: String,
    /// Subsystem name (`template`, `value_map`, `update`, ...).
    #[serde(rename = "source")]
    pub origin: String,
    pub severity: Severity,
}

impl ConfigurationError {
    pub fn new(origin: &str, severity: Severity, message: impl Into<String>) -> Self {
        ConfigurationError {
            message: message.into(),
            origin: origin.to_owned(),
            severity,
        }
    }

    pub fn error(origin: &str, message: impl Into<String>) -> Self {
        Self::new(origin, Severity::Error, message)
    }

    pub fn fatal(origin: &str, message: impl Into<String>) -> Self {
        Self::new(origin, Severity::Fatal, message)
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn is_fatal(&self) -> bool {
        self.severity == Severity::Fatal
    }

    pub fn to_json_value(&self) -> serde_json::Value {
        serde_json::json!({
            "message":  self.message,
            "source":   self.origin,
            "severity": self.severity,
        })
    }
}

/// Broadcast stream of reported configuration errors.
///
/// Unlike values, the channel does not replay: subscribers only see
/// errors reported after they subscribed.
#[derive(Clone)]
pub struct ErrorChannel {
    observers: Rc<Observers<ConfigurationError>>,
}

impl Default for ErrorChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl ErrorChannel {
    pub fn new() -> Self {
        ErrorChannel {
            observers: Rc::new(Observers::new()),
        }
    }

    pub fn report(&self, err: ConfigurationError) {
        match err.severity {
            Severity::Fatal => error!(source = %err.origin, "{}", err.message),
            Severity::Error => warn!(source = %err.origin, "{}", err.message),
        }
        self.observers.notify(&err);
    }

    pub fn subscribe(&self, f: impl Fn(&ConfigurationError) + 'static) -> Subscription {
        Observers::add(&self.observers, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[test]
    fn display_includes_severity_and_source() {
        let e = ConfigurationError::fatal("template", "line 3: <and> needs two children");
        assert_eq!(
            e.to_string(),
            "FATAL [template] line 3: <and> needs two children"
        );
        assert!(e.is_fatal());
        assert!(!e.clone().with_severity(Severity::Error).is_fatal());
    }

    #[test]
    fn json_uses_source_field() {
        let e = ConfigurationError::error("update", "boom");
        let json = e.to_json_value();
        assert_eq!(json["source"], "update");
        assert_eq!(json["severity"], "ERROR");
        assert_eq!(json["message"], "boom");
        assert_eq!(serde_json::to_value(&e).unwrap(), json);
    }

    #[test]
    fn channel_broadcasts_to_current_subscribers() {
        let channel = ErrorChannel::new();
        channel.report(ConfigurationError::error("x", "before"));
        let seen = Rc::new(RefCell::new(Vec::new()));
        let seen2 = seen.clone();
        let sub = channel.subscribe(move |e| seen2.borrow_mut().push(e.message.clone()));
        channel.report(ConfigurationError::error("x", "after"));
        sub.unsubscribe();
        channel.report(ConfigurationError::error("x", "ignored"));
        assert_eq!(*seen.borrow(), vec!["after".to_string()]);
    }
}
