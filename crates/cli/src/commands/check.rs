use std::path::Path;
use std::process;
use std::rc::Rc;

use serde::Deserialize;
use traceviz_eval::{ConfigurationError, ManualScheduler};

use super::load_or_exit;
use crate::{report_error, OutputFormat};

/// What the hosting component supports. `None` means "not checked".
#[derive(Debug, Default, PartialEq)]
pub(crate) struct AllowLists {
    pub actions: Option<Vec<(String, String)>>,
    pub reactions: Option<Vec<(String, String)>>,
    pub watches: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
struct CheckConfig {
    #[serde(default)]
    supported: SupportedTable,
}

#[derive(Debug, Default, Deserialize)]
struct SupportedTable {
    actions: Option<Vec<String>>,
    reactions: Option<Vec<String>>,
    watches: Option<Vec<String>>,
}

impl AllowLists {
    pub(crate) fn from_flags(
        actions: Option<&str>,
        reactions: Option<&str>,
        watches: Option<&str>,
    ) -> Result<Self, String> {
        let split = |s: &str| -> Vec<String> {
            s.split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(str::to_owned)
                .collect()
        };
        Ok(AllowLists {
            actions: actions.map(|s| parse_pairs(&split(s))).transpose()?,
            reactions: reactions.map(|s| parse_pairs(&split(s))).transpose()?,
            watches: watches.map(split),
        })
    }

    pub(crate) fn from_config(path: &Path) -> Result<Self, String> {
        let src = std::fs::read_to_string(path)
            .map_err(|e| format!("cannot read config '{}': {}", path.display(), e))?;
        let config: CheckConfig = toml::from_str(&src)
            .map_err(|e| format!("invalid config '{}': {}", path.display(), e))?;
        let s = config.supported;
        Ok(AllowLists {
            actions: s.actions.as_deref().map(parse_pairs).transpose()?,
            reactions: s.reactions.as_deref().map(parse_pairs).transpose()?,
            watches: s.watches,
        })
    }

    /// Union of both sources, per category.
    pub(crate) fn merge(self, other: AllowLists) -> AllowLists {
        fn join<T>(a: Option<Vec<T>>, b: Option<Vec<T>>) -> Option<Vec<T>> {
            match (a, b) {
                (Some(mut a), Some(b)) => {
                    a.extend(b);
                    Some(a)
                }
                (a, b) => a.or(b),
            }
        }
        AllowLists {
            actions: join(self.actions, other.actions),
            reactions: join(self.reactions, other.reactions),
            watches: join(self.watches, other.watches),
        }
    }
}

fn parse_pairs(items: &[String]) -> Result<Vec<(String, String)>, String> {
    items
        .iter()
        .map(|item| match item.split_once(':') {
            Some((t, k)) if !t.is_empty() && !k.is_empty() => Ok((t.to_owned(), k.to_owned())),
            _ => Err(format!("invalid pair '{}', expected target:type", item)),
        })
        .collect()
}

fn borrowed(pairs: &[(String, String)]) -> Vec<(&str, &str)> {
    pairs.iter().map(|(t, k)| (t.as_str(), k.as_str())).collect()
}

pub(crate) fn cmd_check(file: &Path, lists: &AllowLists, output: OutputFormat, quiet: bool) {
    let doc = load_or_exit(file, Rc::new(ManualScheduler::new()), output, quiet);
    let interactions = &doc.interactions;

    let mut errors: Vec<ConfigurationError> = Vec::new();
    if let Some(actions) = &lists.actions {
        errors.extend(
            interactions
                .check_for_supported_actions(&borrowed(actions))
                .err(),
        );
    }
    if let Some(reactions) = &lists.reactions {
        errors.extend(
            interactions
                .check_for_supported_reactions(&borrowed(reactions))
                .err(),
        );
    }
    if let Some(watches) = &lists.watches {
        let refs: Vec<&str> = watches.iter().map(String::as_str).collect();
        errors.extend(interactions.check_for_supported_watches(&refs).err());
    }

    let counts = [
        ("actions", interactions.actions().len(), lists.actions.is_some()),
        ("reactions", interactions.reactions().len(), lists.reactions.is_some()),
        ("watches", interactions.watches().len(), lists.watches.is_some()),
    ];

    match output {
        OutputFormat::Json => {
            let mut json = serde_json::json!({
                "file": file.display().to_string(),
                "valid": errors.is_empty(),
                "globals": doc.global.len(),
                "errors": errors.iter().map(ConfigurationError::to_json_value).collect::<Vec<_>>(),
            });
            for (name, count, checked) in counts {
                json[name] = serde_json::json!({ "declared": count, "checked": checked });
            }
            let pretty = serde_json::to_string_pretty(&json)
                .unwrap_or_else(|e| format!("{{\"error\": \"serialization: {}\"}}", e));
            println!("{}", pretty);
        }
        OutputFormat::Text => {
            for e in &errors {
                report_error(&e.to_string(), output, quiet);
            }
            if !quiet {
                let status = if errors.is_empty() { "ok" } else { "FAILED" };
                println!("{}: {}", status, file.display());
                println!("  globals: {}", doc.global.len());
                for (name, count, checked) in counts {
                    let note = if checked { "checked" } else { "not checked" };
                    println!("  {}: {} ({})", name, count, note);
                }
            }
        }
    }
    if !errors.is_empty() {
        process::exit(1);
    }
}
