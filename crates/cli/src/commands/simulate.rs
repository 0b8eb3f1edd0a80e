//! `traceviz simulate`: replay a script of UI events.
//!
//! Reaction streams opened by a `match` step stay open for the rest of
//! the run, so a later `match` with the same target, type and local map
//! reports how the stream evolved (e.g. a debounced `<changed>`).

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::Path;
use std::process;
use std::rc::Rc;

use tracing::debug;
use traceviz_eval::{BoolStream, ConfigurationError, Document, ManualScheduler, Value, ValueMap};
use traceviz_interchange::{Script, ScriptStep};

use super::load_or_exit;
use crate::{report_error, OutputFormat};

struct StepReport {
    label: String,
    matched: Option<bool>,
    errors: Vec<ConfigurationError>,
    /// Copies; the live values keep changing after the step.
    globals: Vec<(String, Value)>,
}

pub(crate) fn cmd_simulate(file: &Path, script_path: &Path, output: OutputFormat, quiet: bool) {
    let script = match read_script(script_path) {
        Ok(s) => s,
        Err(msg) => {
            report_error(&msg, output, quiet);
            process::exit(1);
        }
    };
    let scheduler = Rc::new(ManualScheduler::new());
    let doc = load_or_exit(file, scheduler.clone(), output, quiet);

    let routed: Rc<RefCell<Vec<ConfigurationError>>> = Rc::new(RefCell::new(Vec::new()));
    let sink = routed.clone();
    let _errors = doc
        .global
        .errors()
        .subscribe(move |e| sink.borrow_mut().push(e.clone()));

    let mut streams: HashMap<String, BoolStream> = HashMap::new();
    let mut reports = Vec::with_capacity(script.steps.len());
    for (n, step) in script.steps.iter().enumerate() {
        debug!(step = n + 1, action = %step.describe(), "simulating");
        let matched = run_step(step, &script.string_table, &doc, &scheduler, &mut streams);
        reports.push(StepReport {
            label: step.describe(),
            matched,
            errors: routed.borrow_mut().drain(..).collect(),
            globals: doc
                .global
                .snapshot()
                .into_iter()
                .map(|(k, v)| (k, v.deep_copy()))
                .collect(),
        });
    }

    let failed = reports.iter().any(|r| !r.errors.is_empty());
    match output {
        OutputFormat::Json => print_json(&reports),
        OutputFormat::Text => {
            if !quiet {
                print_text(&reports);
            }
        }
    }
    if failed {
        process::exit(1);
    }
}

fn read_script(path: &Path) -> Result<Script, String> {
    let src = std::fs::read_to_string(path)
        .map_err(|e| format!("cannot read script '{}': {}", path.display(), e))?;
    serde_json::from_str(&src).map_err(|e| format!("invalid script '{}': {}", path.display(), e))
}

/// Run one step. Errors go to the document's error channel.
fn run_step(
    step: &ScriptStep,
    table: &[String],
    doc: &Document,
    scheduler: &ManualScheduler,
    streams: &mut HashMap<String, BoolStream>,
) -> Option<bool> {
    let report = |e: ConfigurationError| doc.global.report(e);
    match step {
        ScriptStep::Update {
            target,
            kind,
            local,
        } => {
            match ValueMap::from_wire_map(local, table) {
                Ok(local) => doc.interactions.dispatch(target, kind, &local),
                Err(e) => report(e),
            }
            None
        }
        ScriptStep::Set { key, value } => {
            let assigned = Value::from_wire(value, table).and_then(|v| {
                let Some(global) = doc.global.get(key)? else {
                    return Ok(());
                };
                if global.fold(&v, false, true) {
                    Ok(())
                } else {
                    Err(ConfigurationError::error(
                        "simulate",
                        format!(
                            "cannot assign {} to global '{}' of type {}",
                            v.type_name(),
                            key,
                            global.type_name()
                        ),
                    ))
                }
            });
            if let Err(e) = assigned {
                report(e);
            }
            None
        }
        ScriptStep::Match {
            target,
            kind,
            local,
        } => {
            let local = match ValueMap::from_wire_map(local, table) {
                Ok(local) => local,
                Err(e) => {
                    report(e);
                    return None;
                }
            };
            let key = format!("{}/{} {}", target, kind, local.describe());
            if let Some(stream) = streams.get(&key) {
                return Some(stream.get());
            }
            match doc.interactions.match_reaction(target, kind).matches(&local) {
                Ok(stream) => {
                    let now = stream.get();
                    streams.insert(key, stream);
                    Some(now)
                }
                Err(e) => {
                    report(e);
                    None
                }
            }
        }
        ScriptStep::Advance { ms } => {
            scheduler.advance(*ms);
            None
        }
    }
}

fn print_text(reports: &[StepReport]) {
    for (i, r) in reports.iter().enumerate() {
        println!("step {}: {}", i + 1, r.label);
        if let Some(m) = r.matched {
            println!("  matched: {}", m);
        }
        for e in &r.errors {
            println!("  error: {}", e);
        }
        for (key, value) in &r.globals {
            println!("  {}: {} = {}", key, value.type_name(), value.display_string());
        }
    }
}

fn print_json(reports: &[StepReport]) {
    let steps: Vec<serde_json::Value> = reports
        .iter()
        .enumerate()
        .map(|(i, r)| {
            let globals: serde_json::Map<String, serde_json::Value> = r
                .globals
                .iter()
                .map(|(k, v)| {
                    let wire = serde_json::to_value(v.to_wire(None))
                        .unwrap_or(serde_json::Value::Null);
                    (k.clone(), wire)
                })
                .collect();
            serde_json::json!({
                "step": i + 1,
                "action": r.label,
                "matched": r.matched,
                "errors": r.errors.iter().map(ConfigurationError::to_json_value).collect::<Vec<_>>(),
                "globals": globals,
            })
        })
        .collect();
    let pretty = serde_json::to_string_pretty(&serde_json::json!({ "steps": steps }))
        .unwrap_or_else(|e| format!("{{\"error\": \"serialization: {}\"}}", e));
    println!("{}", pretty);
}
