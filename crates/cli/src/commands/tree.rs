use std::path::Path;
use std::process;

use traceviz_core::{Element, Node};
use traceviz_eval::LoadError;

use super::report_load_error;
use crate::OutputFormat;

pub(crate) fn cmd_tree(file: &Path, output: OutputFormat, quiet: bool) {
    let root = match traceviz_core::load_template(file) {
        Ok(root) => root,
        Err(e) => {
            report_load_error(&LoadError::from(e), output, quiet);
            process::exit(1);
        }
    };
    match output {
        OutputFormat::Json => {
            let pretty = serde_json::to_string_pretty(&root)
                .unwrap_or_else(|e| format!("serialization error: {}", e));
            println!("{}", pretty);
        }
        OutputFormat::Text => {
            let mut out = String::new();
            render(&root, 0, &mut out);
            print!("{}", out);
        }
    }
}

fn render(el: &Element, depth: usize, out: &mut String) {
    let indent = "  ".repeat(depth);
    let attrs: String = el
        .attrs
        .iter()
        .map(|a| format!(" {}=\"{}\"", a.name, a.value))
        .collect();
    out.push_str(&format!("{}<{}{}>  (line {})\n", indent, el.name, attrs, el.line));
    for child in &el.children {
        match child {
            Node::Element(e) => render(e, depth + 1, out),
            Node::Text { text, .. } => {
                out.push_str(&format!("{}  {:?}\n", indent, text));
            }
        }
    }
}
