use std::path::Path;
use std::rc::Rc;

use traceviz_eval::{documenter, ManualScheduler};

use super::load_or_exit;
use crate::OutputFormat;

pub(crate) fn cmd_doc(file: &Path, output: OutputFormat, quiet: bool) {
    let doc = load_or_exit(file, Rc::new(ManualScheduler::new()), output, quiet);
    let text = documenter::pretty_print(&doc.interactions);
    match output {
        OutputFormat::Json => {
            let json = serde_json::json!({
                "file": file.display().to_string(),
                "interactions": text,
            });
            let pretty = serde_json::to_string_pretty(&json)
                .unwrap_or_else(|e| format!("serialization error: {}", e));
            println!("{}", pretty);
        }
        OutputFormat::Text => print!("{}", text),
    }
}
