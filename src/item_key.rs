//! Item key formatting and parsing
//!
//! An item key is a metric name optionally followed by bracketed,
//! comma-separated parameters, e.g. `net.tcp.port[127.0.0.1,80]`.
//! [`make_key`] and [`parse_item_key`] are inverse to each other for every
//! parameter list `make_key` is able to express.

use std::fmt;

use crate::agent::{AgentRequest, RequestParam};

/// Error returned when an item key cannot be parsed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyError {
    /// Byte offset the parser stopped at
    pub position: usize,
    pub reason: &'static str,
}

impl KeyError {
    fn new(position: usize, reason: &'static str) -> Self {
        Self { position, reason }
    }
}

impl fmt::Display for KeyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid item key at position {}: {}", self.position, self.reason)
    }
}

impl std::error::Error for KeyError {}

/// Build the composite key string `key[p1,p2,...]`
pub fn make_key<S: AsRef<str>>(key: &str, params: &[S]) -> String {
    if params.is_empty() {
        return key.to_string();
    }

    let mut text = String::with_capacity(key.len() + 2 + params.len() * 8);
    text.push_str(key);
    text.push('[');
    for (i, param) in params.iter().enumerate() {
        if i != 0 {
            text.push(',');
        }
        let param = param.as_ref();
        if must_quote(param) {
            quote_param(&mut text, param);
        } else {
            text.push_str(param);
        }
    }
    text.push(']');
    text
}

fn must_quote(param: &str) -> bool {
    param.starts_with(['"', '[', ' ']) || param.contains([',', ']'])
}

fn quote_param(text: &mut String, param: &str) {
    text.push('"');
    for c in param.chars() {
        if c == '"' {
            text.push('\\');
        }
        text.push(c);
    }
    text.push('"');
}

fn is_key_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-')
}

/// Parse an item key into its metric name and parameters
pub fn parse_item_key(text: &str) -> Result<AgentRequest, KeyError> {
    let key_end = text.find(|c: char| !is_key_char(c)).unwrap_or(text.len());
    if key_end == 0 {
        return Err(KeyError::new(0, "empty key"));
    }

    let key = &text[..key_end];
    if key_end == text.len() {
        return Ok(AgentRequest::new(key, Vec::new()));
    }

    if text.as_bytes()[key_end] != b'[' {
        return Err(KeyError::new(key_end, "invalid character in key"));
    }

    let mut parser = ParamParser {
        text,
        pos: key_end + 1,
    };
    let params = parser.parse_params()?;

    if parser.pos != text.len() {
        return Err(KeyError::new(
            parser.pos,
            "unexpected characters after closing bracket",
        ));
    }

    Ok(AgentRequest::new(key, params))
}

struct ParamParser<'a> {
    text: &'a str,
    pos: usize,
}

impl ParamParser<'_> {
    fn peek(&self) -> Option<u8> {
        self.text.as_bytes().get(self.pos).copied()
    }

    fn skip_spaces(&mut self) {
        while self.peek() == Some(b' ') {
            self.pos += 1;
        }
    }

    /// Parse the top-level list, consuming the closing bracket
    fn parse_params(&mut self) -> Result<Vec<RequestParam>, KeyError> {
        let mut params = Vec::new();
        loop {
            self.skip_spaces();
            let param = match self.peek() {
                Some(b'"') => RequestParam::Quoted(self.parse_quoted()?),
                Some(b'[') => {
                    self.pos += 1;
                    RequestParam::Array(self.parse_array()?)
                }
                _ => RequestParam::Plain(self.parse_unquoted()),
            };
            params.push(param);

            if self.next_separator()? {
                return Ok(params);
            }
        }
    }

    fn parse_array(&mut self) -> Result<Vec<String>, KeyError> {
        let mut items = Vec::new();
        loop {
            self.skip_spaces();
            let item = match self.peek() {
                Some(b'"') => self.parse_quoted()?,
                Some(b'[') => return Err(KeyError::new(self.pos, "nested arrays are not allowed")),
                _ => self.parse_unquoted(),
            };
            items.push(item);

            if self.next_separator()? {
                return Ok(items);
            }
        }
    }

    /// Consume `,` or `]`; returns true when the list was closed
    fn next_separator(&mut self) -> Result<bool, KeyError> {
        self.skip_spaces();
        match self.peek() {
            Some(b',') => {
                self.pos += 1;
                Ok(false)
            }
            Some(b']') => {
                self.pos += 1;
                Ok(true)
            }
            Some(_) => Err(KeyError::new(self.pos, "expected ',' or ']'")),
            None => Err(KeyError::new(self.pos, "unterminated parameter list")),
        }
    }

    fn parse_unquoted(&mut self) -> String {
        let start = self.pos;
        while !matches!(self.peek(), None | Some(b',') | Some(b']')) {
            self.pos += 1;
        }
        self.text[start..self.pos].to_string()
    }

    fn parse_quoted(&mut self) -> Result<String, KeyError> {
        let start = self.pos;
        self.pos += 1;

        let mut value = String::new();
        let mut chunk = self.pos;
        loop {
            match self.peek() {
                None => return Err(KeyError::new(start, "unterminated quoted parameter")),
                Some(b'\\') if self.text.as_bytes().get(self.pos + 1) == Some(&b'"') => {
                    value.push_str(&self.text[chunk..self.pos]);
                    value.push('"');
                    self.pos += 2;
                    chunk = self.pos;
                }
                Some(b'"') => {
                    value.push_str(&self.text[chunk..self.pos]);
                    self.pos += 1;
                    return Ok(value);
                }
                Some(_) => self.pos += 1,
            }
        }
    }
}
