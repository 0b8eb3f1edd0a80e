mod check;
mod doc;
mod simulate;
mod tree;

use std::path::Path;
use std::process;
use std::rc::Rc;

use traceviz_eval::{load_document, Document, LoadError, ManualScheduler};

use crate::OutputFormat;

pub(crate) use check::{cmd_check, AllowLists};
pub(crate) use doc::cmd_doc;
pub(crate) use simulate::cmd_simulate;
pub(crate) use tree::cmd_tree;

/// Load a template or exit with its error.
pub(crate) fn load_or_exit(
    file: &Path,
    scheduler: Rc<ManualScheduler>,
    output: OutputFormat,
    quiet: bool,
) -> Document {
    match load_document(file, scheduler) {
        Ok(doc) => doc,
        Err(e) => {
            report_load_error(&e, output, quiet);
            process::exit(1);
        }
    }
}

pub(crate) fn report_load_error(e: &LoadError, output: OutputFormat, quiet: bool) {
    match output {
        OutputFormat::Json => {
            let err_json = serde_json::to_string_pretty(&e.to_json_value())
                .unwrap_or_else(|_| format!("{{\"error\": \"{:?}\"}}", e));
            eprintln!("{}", err_json);
        }
        OutputFormat::Text => {
            if !quiet {
                eprintln!("error: {}", e);
            }
        }
    }
}
