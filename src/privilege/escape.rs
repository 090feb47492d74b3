// src/privilege/escape.rs

//! Escaping for brace-delimited argv values
//!
//! Compound arguments such as `uuid{instance}{version}` use braces as
//! delimiters, so `\`, `{` and `}` inside a value are prefixed with `\`.

use crate::error::{Error, Result};

fn needs_escape(ch: char) -> bool {
    matches!(ch, '\\' | '{' | '}')
}

/// Prefix every `\`, `{` and `}` with a backslash
pub fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        if needs_escape(ch) {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

/// Inverse of [`escape`]
///
/// A trailing lone backslash is kept as is.
pub fn unescape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(ch) = chars.next() {
        if ch == '\\' {
            match chars.next() {
                Some(next) => out.push(next),
                None => out.push('\\'),
            }
        } else {
            out.push(ch);
        }
    }
    out
}

/// Build `head{field}{field}...` with every part escaped
pub fn join_braced(head: &str, fields: &[&str]) -> String {
    let mut out = escape(head);
    for field in fields {
        out.push('{');
        out.push_str(&escape(field));
        out.push('}');
    }
    out
}

/// Split `head{a}{b}` into the unescaped head and fields
pub fn split_braced(arg: &str) -> Result<(String, Vec<String>)> {
    let mut head = String::new();
    let mut fields = Vec::new();
    let mut current: Option<String> = None;
    let mut chars = arg.chars();

    while let Some(ch) = chars.next() {
        match ch {
            '\\' => {
                let escaped = chars.next().unwrap_or('\\');
                match current.as_mut() {
                    Some(field) => field.push(escaped),
                    None if fields.is_empty() => head.push(escaped),
                    None => return Err(malformed(arg)),
                }
            }
            '{' => {
                if current.is_some() {
                    return Err(malformed(arg));
                }
                current = Some(String::new());
            }
            '}' => match current.take() {
                Some(field) => fields.push(field),
                None => return Err(malformed(arg)),
            },
            _ => match current.as_mut() {
                Some(field) => field.push(ch),
                None if fields.is_empty() => head.push(ch),
                None => return Err(malformed(arg)),
            },
        }
    }

    if current.is_some() {
        return Err(malformed(arg));
    }
    Ok((head, fields))
}

fn malformed(arg: &str) -> Error {
    Error::ParseError(format!("malformed braced argument: {arg}"))
}
