use serde::{Deserialize, Serialize};
use std::fmt;

/// A template syntax error, located by file and line.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TemplateError {
    pub file: String,
    pub line: u32,
    pub message: String,
}

impl TemplateError {
    pub fn new(file: &str, line: u32, message: impl Into<String>) -> Self {
        TemplateError {
            file: file.to_owned(),
            line,
            message: message.into(),
        }
    }

    pub fn lex(file: &str, line: u32, message: impl Into<String>) -> Self {
        TemplateError::new(file, line, message)
    }

    pub fn parse(file: &str, line: u32, message: impl Into<String>) -> Self {
        TemplateError::new(file, line, message)
    }

    /// Serialize to the JSON shape printed by `traceviz --output json`.
    pub fn to_json_value(&self) -> serde_json::Value {
        serde_json::json!({
            "file":    self.file,
            "line":    self.line,
            "message": self.message,
        })
    }
}

impl fmt::Display for TemplateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}: {}", self.file, self.line, self.message)
    }
}

impl std::error::Error for TemplateError {}
