//! Request and result types exchanged between the dispatcher and check routines
//!
//! An [`AgentRequest`] is the parsed form of an item key. An [`AgentResult`]
//! is the scratch object a routine writes its value or failure message into.

use std::fmt;

/// A single item key parameter
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestParam {
    /// Unquoted parameter, taken verbatim up to the next `,` or `]`
    Plain(String),

    /// Double-quoted parameter with `\"` escapes resolved
    Quoted(String),

    /// One-level nested array, e.g. `[a,b]`
    Array(Vec<String>),
}

impl RequestParam {
    /// String content of the parameter, `None` for arrays
    pub fn as_str(&self) -> Option<&str> {
        match self {
            RequestParam::Plain(value) | RequestParam::Quoted(value) => Some(value),
            RequestParam::Array(_) => None,
        }
    }
}

/// Parsed item key: metric name plus ordered parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentRequest {
    key: String,
    params: Vec<RequestParam>,
}

impl AgentRequest {
    pub fn new(key: impl Into<String>, params: Vec<RequestParam>) -> Self {
        Self {
            key: key.into(),
            params,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn params(&self) -> &[RequestParam] {
        &self.params
    }

    pub fn param_count(&self) -> usize {
        self.params.len()
    }

    pub fn param(&self, index: usize) -> Option<&RequestParam> {
        self.params.get(index)
    }
}

/// Typed value produced by a check routine
#[derive(Debug, Clone, PartialEq)]
pub enum ResultValue {
    Uint64(u64),
    Double(f64),
    Str(String),
    Text(String),
}

impl fmt::Display for ResultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResultValue::Uint64(value) => write!(f, "{value}"),
            ResultValue::Double(value) => write!(f, "{value:.6}"),
            ResultValue::Str(value) | ResultValue::Text(value) => f.write_str(value),
        }
    }
}

/// Status reported by a check routine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckStatus {
    Ok,
    Fail,
}

/// Scratch result a check routine writes into
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AgentResult {
    value: Option<ResultValue>,
    msg: Option<String>,
}

impl AgentResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_value(&mut self, value: ResultValue) {
        self.value = Some(value);
    }

    pub fn set_msg(&mut self, msg: impl Into<String>) {
        self.msg = Some(msg.into());
    }

    pub fn value(&self) -> Option<&ResultValue> {
        self.value.as_ref()
    }

    pub fn msg(&self) -> Option<&str> {
        self.msg.as_deref()
    }

    pub fn take_msg(&mut self) -> Option<String> {
        self.msg.take()
    }

    /// Value converted to its string form, if one was set
    pub fn str_value(&self) -> Option<String> {
        self.value.as_ref().map(ToString::to_string)
    }

    /// Record the outcome of a collection step and derive the status from it
    pub fn complete(&mut self, outcome: anyhow::Result<ResultValue>) -> CheckStatus {
        match outcome {
            Ok(value) => {
                self.set_value(value);
                CheckStatus::Ok
            }
            Err(e) => {
                self.set_msg(e.to_string());
                CheckStatus::Fail
            }
        }
    }
}
