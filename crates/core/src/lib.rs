//! traceviz-core: the TraceViz template markup language.
//!
//! Templates are XML-like documents declaring global state and the
//! interactions of a visualization component. This crate only turns
//! source text into an [`Element`] tree; giving the elements meaning is
//! left to `traceviz-eval`.
//!
//! - [`parse_template()`] -- lex + parse a source string
//! - [`load_template()`] -- read a file and parse it
//! - [`TemplateError`] -- syntax error with file/line provenance

pub mod ast;
pub mod error;
pub mod lexer;
pub mod parser;
pub mod source;

use std::path::Path;

pub use ast::{Attribute, Element, Node};
pub use error::TemplateError;
pub use source::{FileSystemProvider, InMemoryProvider, SourceProvider};

/// Parse template source text into its root element.
pub fn parse_template(src: &str, filename: &str) -> Result<Element, TemplateError> {
    let tokens = lexer::lex(src, filename)?;
    parser::parse(&tokens, filename)
}

/// Read and parse a template file from disk.
pub fn load_template(path: &Path) -> Result<Element, TemplateError> {
    load_template_with_provider(path, &FileSystemProvider)
}

/// Read and parse a template through the given source provider.
pub fn load_template_with_provider(
    path: &Path,
    provider: &dyn SourceProvider,
) -> Result<Element, TemplateError> {
    let filename = path.display().to_string();
    let src = provider
        .read_source(path)
        .map_err(|e| TemplateError::new(&filename, 0, format!("cannot read template: {}", e)))?;
    parse_template(&src, &filename)
}
