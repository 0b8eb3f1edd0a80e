use crate::error::TemplateError;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// `<name` -- opens a start tag; attributes follow until `>` or `/>`
    Open(String),
    /// `</name>`
    Close(String),
    /// Attribute name inside a start tag
    AttrName(String),
    /// `=` inside a start tag
    Eq,
    /// Quoted attribute value (entities resolved)
    AttrValue(String),
    /// `>` ending a start tag
    TagEnd,
    /// `/>` ending a self-closing tag
    SelfClose,
    /// Non-blank character data between tags (trimmed, entities resolved)
    Text(String),
    // End of input
    Eof,
}

#[derive(Debug, Clone)]
pub struct Spanned {
    pub token: Token,
    pub line: u32,
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == ':' || c == '.'
}

fn starts_with(chars: &[char], pos: usize, pat: &str) -> bool {
    let mut i = pos;
    for p in pat.chars() {
        if i >= chars.len() || chars[i] != p {
            return false;
        }
        i += 1;
    }
    true
}

fn take_name(chars: &[char], pos: &mut usize) -> String {
    let start = *pos;
    while *pos < chars.len() && is_name_char(chars[*pos]) {
        *pos += 1;
    }
    chars[start..*pos].iter().collect()
}

/// Resolve the predefined XML entities and numeric character references.
pub fn decode_entities(raw: &str, filename: &str, line: u32) -> Result<String, TemplateError> {
    if !raw.contains('&') {
        return Ok(raw.to_owned());
    }
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let after = &rest[amp + 1..];
        let semi = after.find(';').ok_or_else(|| {
            TemplateError::lex(filename, line, "unterminated entity reference")
        })?;
        let name = &after[..semi];
        let decoded = match name {
            "lt" => '<',
            "gt" => '>',
            "amp" => '&',
            "quot" => '"',
            "apos" => '\'',
            _ => {
                let code = if let Some(hex) = name.strip_prefix("#x") {
                    u32::from_str_radix(hex, 16).ok()
                } else if let Some(dec) = name.strip_prefix('#') {
                    dec.parse::<u32>().ok()
                } else {
                    None
                };
                code.and_then(char::from_u32).ok_or_else(|| {
                    TemplateError::lex(filename, line, format!("unknown entity '&{};'", name))
                })?
            }
        };
        out.push(decoded);
        rest = &after[semi + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

pub fn lex(src: &str, filename: &str) -> Result<Vec<Spanned>, TemplateError> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = src.chars().collect();
    let mut pos = 0usize;
    let mut line: u32 = 1;
    let mut in_tag = false;

    while pos < chars.len() {
        let c = chars[pos];

        if in_tag {
            if c.is_whitespace() {
                if c == '\n' {
                    line += 1;
                }
                pos += 1;
                continue;
            }
            let tok_line = line;
            match c {
                '>' => {
                    tokens.push(Spanned {
                        token: Token::TagEnd,
                        line: tok_line,
                    });
                    in_tag = false;
                    pos += 1;
                }
                '/' => {
                    if pos + 1 < chars.len() && chars[pos + 1] == '>' {
                        tokens.push(Spanned {
                            token: Token::SelfClose,
                            line: tok_line,
                        });
                        in_tag = false;
                        pos += 2;
                    } else {
                        return Err(TemplateError::lex(
                            filename,
                            tok_line,
                            "expected '>' after '/'",
                        ));
                    }
                }
                '=' => {
                    tokens.push(Spanned {
                        token: Token::Eq,
                        line: tok_line,
                    });
                    pos += 1;
                }
                '"' | '\'' => {
                    let quote = c;
                    pos += 1;
                    let start = pos;
                    while pos < chars.len() && chars[pos] != quote {
                        if chars[pos] == '\n' {
                            line += 1;
                        }
                        pos += 1;
                    }
                    if pos >= chars.len() {
                        return Err(TemplateError::lex(
                            filename,
                            tok_line,
                            "unterminated attribute value",
                        ));
                    }
                    let raw: String = chars[start..pos].iter().collect();
                    pos += 1;
                    tokens.push(Spanned {
                        token: Token::AttrValue(decode_entities(&raw, filename, tok_line)?),
                        line: tok_line,
                    });
                }
                c if is_name_char(c) => {
                    let name = take_name(&chars, &mut pos);
                    tokens.push(Spanned {
                        token: Token::AttrName(name),
                        line: tok_line,
                    });
                }
                other => {
                    return Err(TemplateError::lex(
                        filename,
                        tok_line,
                        format!("unexpected character '{}' in tag", other),
                    ));
                }
            }
            continue;
        }

        // Comment
        if starts_with(&chars, pos, "<!--") {
            let tok_line = line;
            pos += 4;
            loop {
                if pos >= chars.len() {
                    return Err(TemplateError::lex(filename, tok_line, "unterminated comment"));
                }
                if starts_with(&chars, pos, "-->") {
                    pos += 3;
                    break;
                }
                if chars[pos] == '\n' {
                    line += 1;
                }
                pos += 1;
            }
            continue;
        }

        // Processing instruction (`<?xml ... ?>`)
        if starts_with(&chars, pos, "<?") {
            let tok_line = line;
            pos += 2;
            loop {
                if pos >= chars.len() {
                    return Err(TemplateError::lex(
                        filename,
                        tok_line,
                        "unterminated processing instruction",
                    ));
                }
                if starts_with(&chars, pos, "?>") {
                    pos += 2;
                    break;
                }
                if chars[pos] == '\n' {
                    line += 1;
                }
                pos += 1;
            }
            continue;
        }

        if c == '<' {
            let tok_line = line;
            if pos + 1 < chars.len() && chars[pos + 1] == '/' {
                pos += 2;
                let name = take_name(&chars, &mut pos);
                if name.is_empty() {
                    return Err(TemplateError::lex(
                        filename,
                        tok_line,
                        "expected tag name after '</'",
                    ));
                }
                while pos < chars.len() && chars[pos].is_whitespace() {
                    if chars[pos] == '\n' {
                        line += 1;
                    }
                    pos += 1;
                }
                if pos >= chars.len() || chars[pos] != '>' {
                    return Err(TemplateError::lex(
                        filename,
                        tok_line,
                        format!("expected '>' to close '</{}'", name),
                    ));
                }
                pos += 1;
                tokens.push(Spanned {
                    token: Token::Close(name),
                    line: tok_line,
                });
            } else {
                pos += 1;
                let name = take_name(&chars, &mut pos);
                if name.is_empty() {
                    return Err(TemplateError::lex(
                        filename,
                        tok_line,
                        "expected tag name after '<'",
                    ));
                }
                tokens.push(Spanned {
                    token: Token::Open(name),
                    line: tok_line,
                });
                in_tag = true;
            }
            continue;
        }

        // Character data up to the next tag
        let start = pos;
        while pos < chars.len() && chars[pos] != '<' {
            pos += 1;
        }
        let raw: String = chars[start..pos].iter().collect();
        let leading_newlines = raw
            .chars()
            .take_while(|c| c.is_whitespace())
            .filter(|&c| c == '\n')
            .count() as u32;
        let text_line = line + leading_newlines;
        line += raw.chars().filter(|&c| c == '\n').count() as u32;
        let trimmed = raw.trim();
        if !trimmed.is_empty() {
            tokens.push(Spanned {
                token: Token::Text(decode_entities(trimmed, filename, text_line)?),
                line: text_line,
            });
        }
    }

    if in_tag {
        return Err(TemplateError::lex(
            filename,
            line,
            "unterminated tag at end of input",
        ));
    }

    tokens.push(Spanned {
        token: Token::Eof,
        line,
    });
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<Token> {
        lex(src, "test.tvz")
            .unwrap()
            .into_iter()
            .map(|s| s.token)
            .collect()
    }

    #[test]
    fn lexes_element_with_attributes() {
        assert_eq!(
            kinds(r#"<global-ref key="mode"/>"#),
            vec![
                Token::Open("global-ref".to_string()),
                Token::AttrName("key".to_string()),
                Token::Eq,
                Token::AttrValue("mode".to_string()),
                Token::SelfClose,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn text_is_trimmed_and_decoded() {
        assert_eq!(
            kinds("<string>\n  a &lt; b &amp;&#x41;\n</string>"),
            vec![
                Token::Open("string".to_string()),
                Token::TagEnd,
                Token::Text("a < b &A".to_string()),
                Token::Close("string".to_string()),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn comments_and_declarations_are_skipped() {
        let toks = kinds("<?xml version=\"1.0\"?>\n<!-- a\ncomment --><true/>");
        assert_eq!(
            toks,
            vec![
                Token::Open("true".to_string()),
                Token::SelfClose,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn tracks_lines() {
        let toks = lex("<and>\n\n  <true/>\n</and>", "test.tvz").unwrap();
        assert_eq!(toks[0].line, 1);
        let inner = toks
            .iter()
            .find(|s| s.token == Token::Open("true".to_string()))
            .unwrap();
        assert_eq!(inner.line, 3);
        let close = toks
            .iter()
            .find(|s| s.token == Token::Close("and".to_string()))
            .unwrap();
        assert_eq!(close.line, 4);
    }

    #[test]
    fn unterminated_comment_is_an_error() {
        let err = lex("<a>\n<!-- never closed", "t.tvz").unwrap_err();
        assert_eq!(err.line, 2);
        assert!(err.message.contains("unterminated comment"));
    }

    #[test]
    fn unterminated_attribute_is_an_error() {
        let err = lex("<a key=\"oops>", "t.tvz").unwrap_err();
        assert!(err.message.contains("unterminated attribute value"));
    }

    #[test]
    fn unknown_entity_is_an_error() {
        let err = lex("<a>&bogus;</a>", "t.tvz").unwrap_err();
        assert!(err.message.contains("&bogus;"));
    }
}
