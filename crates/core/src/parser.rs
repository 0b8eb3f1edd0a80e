//! Element tree parser over the lexer's token stream.
//! Every element carries the line of its opening tag; no element names
//! are interpreted here.

use crate::ast::{Attribute, Element, Node};
use crate::error::TemplateError;
use crate::lexer::{Spanned, Token};

struct Parser<'a> {
    tokens: &'a [Spanned],
    pos: usize,
    filename: String,
}

impl<'a> Parser<'a> {
    fn new(tokens: &'a [Spanned], filename: &str) -> Self {
        Parser {
            tokens,
            pos: 0,
            filename: filename.to_owned(),
        }
    }

    fn cur(&self) -> &Spanned {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek(&self) -> &Token {
        &self.cur().token
    }

    fn cur_line(&self) -> u32 {
        self.cur().line
    }

    fn advance(&mut self) -> &Spanned {
        let t = &self.tokens[self.pos.min(self.tokens.len() - 1)];
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        t
    }

    fn err(&self, msg: impl Into<String>) -> TemplateError {
        TemplateError::parse(&self.filename, self.cur_line(), msg)
    }

    fn expect_eq(&mut self, attr: &str) -> Result<(), TemplateError> {
        if self.peek() == &Token::Eq {
            self.advance();
            Ok(())
        } else {
            Err(self.err(format!(
                "expected '=' after attribute '{}', got {:?}",
                attr,
                self.peek()
            )))
        }
    }

    fn take_attr_value(&mut self, attr: &str) -> Result<String, TemplateError> {
        if let Token::AttrValue(v) = self.peek().clone() {
            self.advance();
            Ok(v)
        } else {
            Err(self.err(format!(
                "expected quoted value for attribute '{}', got {:?}",
                attr,
                self.peek()
            )))
        }
    }

    fn parse_document(&mut self) -> Result<Element, TemplateError> {
        match self.peek().clone() {
            Token::Open(name) => {
                let line = self.cur_line();
                self.advance();
                let root = self.parse_element(name, line)?;
                if self.peek() != &Token::Eof {
                    return Err(self.err(format!(
                        "unexpected content after root element <{}>: {:?}",
                        root.name,
                        self.peek()
                    )));
                }
                Ok(root)
            }
            Token::Eof => Err(self.err("empty template: expected a root element")),
            other => Err(self.err(format!("expected root element, got {:?}", other))),
        }
    }

    fn parse_element(&mut self, name: String, line: u32) -> Result<Element, TemplateError> {
        let mut element = Element::new(name, line);

        // Start tag attributes
        loop {
            match self.peek().clone() {
                Token::AttrName(attr) => {
                    self.advance();
                    self.expect_eq(&attr)?;
                    let value = self.take_attr_value(&attr)?;
                    if element.attr(&attr).is_some() {
                        return Err(self.err(format!(
                            "duplicate attribute '{}' on <{}>",
                            attr, element.name
                        )));
                    }
                    element.attrs.push(Attribute { name: attr, value });
                }
                Token::SelfClose => {
                    self.advance();
                    return Ok(element);
                }
                Token::TagEnd => {
                    self.advance();
                    break;
                }
                other => {
                    return Err(self.err(format!(
                        "unexpected {:?} in start tag <{}>",
                        other, element.name
                    )));
                }
            }
        }

        // Content
        loop {
            let child_line = self.cur_line();
            match self.peek().clone() {
                Token::Open(child) => {
                    self.advance();
                    let child = self.parse_element(child, child_line)?;
                    element.children.push(Node::Element(child));
                }
                Token::Text(text) => {
                    self.advance();
                    element.children.push(Node::Text {
                        text,
                        line: child_line,
                    });
                }
                Token::Close(close) => {
                    if close != element.name {
                        return Err(self.err(format!(
                            "mismatched closing tag: expected </{}> (opened on line {}), got </{}>",
                            element.name, element.line, close
                        )));
                    }
                    self.advance();
                    return Ok(element);
                }
                Token::Eof => {
                    return Err(self.err(format!(
                        "unclosed element <{}> opened on line {}",
                        element.name, element.line
                    )));
                }
                other => {
                    return Err(self.err(format!(
                        "unexpected {:?} in content of <{}>",
                        other, element.name
                    )));
                }
            }
        }
    }
}

/// Parse a token stream into its single root element.
pub fn parse(tokens: &[Spanned], filename: &str) -> Result<Element, TemplateError> {
    let mut p = Parser::new(tokens, filename);
    p.parse_document()
}
