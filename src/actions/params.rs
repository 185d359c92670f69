//! Typed decoding of action parameter bags
//!
//! Executors decode the loosely-typed `parameters` map of an action into
//! their own parameter structures through [`ParamReader`]. Numbers may be
//! given as integers, floats or numeric strings.

use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

use crate::config::Params;

/// Why a parameter bag was rejected. Every variant names the parameter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParamError {
    #[error("missing required parameter '{0}'")]
    Missing(&'static str),

    #[error("parameter '{name}' must be {expected}, got {found}")]
    WrongType {
        name: &'static str,
        expected: &'static str,
        found: String,
    },

    #[error("parameter '{name}' must be between {min} and {max}, got {value}")]
    OutOfRange {
        name: &'static str,
        value: i64,
        min: i64,
        max: i64,
    },

    #[error("invalid {name} '{value}' (expected one of: {})", .allowed.join(", "))]
    InvalidChoice {
        name: &'static str,
        value: String,
        allowed: &'static [&'static str],
    },

    #[error("parameter '{0}' cannot be empty")]
    Empty(&'static str),

    #[error("invalid parameter '{name}': {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// A fixed set of keywords a parameter may take
pub trait Keyword: Sized + Copy {
    /// Accepted spellings, used in error messages
    const ALLOWED: &'static [&'static str];

    fn from_keyword(keyword: &str) -> Option<Self>;
}

/// Short description of a JSON value for error messages
fn describe(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => format!("boolean {}", b),
        Value::Number(n) => format!("number {}", n),
        Value::String(s) => format!("string \"{}\"", s),
        Value::Array(items) => format!("list of {} items", items.len()),
        Value::Object(_) => "map".to_string(),
    }
}

/// Read-only accessor over a parameter bag
#[derive(Clone, Copy)]
pub struct ParamReader<'a> {
    params: &'a Params,
}

impl<'a> ParamReader<'a> {
    pub fn new(params: &'a Params) -> Self {
        Self { params }
    }

    fn wrong_type(name: &'static str, expected: &'static str, value: &Value) -> ParamError {
        ParamError::WrongType {
            name,
            expected,
            found: describe(value),
        }
    }

    /// Optional string parameter
    pub fn str(&self, name: &'static str) -> Result<Option<&'a str>, ParamError> {
        match self.params.get(name) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.as_str())),
            Some(other) => Err(Self::wrong_type(name, "a string", other)),
        }
    }

    /// Required, non-empty string parameter
    pub fn required_str(&self, name: &'static str) -> Result<&'a str, ParamError> {
        let value = self.str(name)?.ok_or(ParamError::Missing(name))?;
        if value.trim().is_empty() {
            return Err(ParamError::Empty(name));
        }
        Ok(value)
    }

    /// Optional integer, coerced from integer, float (truncated) or numeric string
    pub fn int(&self, name: &'static str) -> Result<Option<i64>, ParamError> {
        let Some(value) = self.params.get(name) else {
            return Ok(None);
        };

        let parsed = match value {
            Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
            Value::String(s) => {
                let s = s.trim();
                s.parse::<i64>()
                    .ok()
                    .or_else(|| s.parse::<f64>().ok().map(|f| f as i64))
            }
            _ => None,
        };

        parsed
            .map(Some)
            .ok_or_else(|| Self::wrong_type(name, "a number", value))
    }

    /// Optional integer that must lie within `min..=max`
    pub fn int_in_range(&self, name: &'static str, min: i64, max: i64) -> Result<Option<i64>, ParamError> {
        match self.int(name)? {
            Some(value) if value < min || value > max => Err(ParamError::OutOfRange { name, value, min, max }),
            other => Ok(other),
        }
    }

    /// Optional percentage (0-100) with a lower bound
    pub fn percent(&self, name: &'static str, min: u8) -> Result<Option<u8>, ParamError> {
        Ok(self
            .int_in_range(name, i64::from(min), 100)?
            .map(|value| value as u8))
    }

    /// Optional keyword parameter
    pub fn keyword<K: Keyword>(&self, name: &'static str) -> Result<Option<K>, ParamError> {
        let Some(value) = self.str(name)? else {
            return Ok(None);
        };
        K::from_keyword(value)
            .map(Some)
            .ok_or_else(|| ParamError::InvalidChoice {
                name,
                value: value.to_string(),
                allowed: K::ALLOWED,
            })
    }

    /// Optional list of strings: a list of strings, or a comma-separated string
    pub fn string_list(&self, name: &'static str) -> Result<Option<Vec<String>>, ParamError> {
        match self.params.get(name) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(
                s.split(',')
                    .map(str::trim)
                    .filter(|item| !item.is_empty())
                    .map(str::to_string)
                    .collect(),
            )),
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| match item {
                    Value::String(s) => Ok(s.clone()),
                    other => Err(Self::wrong_type(name, "a list of strings", other)),
                })
                .collect::<Result<Vec<_>, _>>()
                .map(Some),
            Some(other) => Err(Self::wrong_type(name, "a list of strings", other)),
        }
    }

    /// Optional duration: a number of milliseconds, or a string like `"150ms"` / `"1s"`
    pub fn duration(&self, name: &'static str) -> Result<Option<Duration>, ParamError> {
        let Some(value) = self.params.get(name) else {
            return Ok(None);
        };

        match value {
            Value::Number(n) => {
                let ms = n.as_f64().unwrap_or(-1.0);
                if ms < 0.0 {
                    return Err(ParamError::Invalid {
                        name,
                        reason: format!("duration cannot be negative ({})", n),
                    });
                }
                Ok(Some(Duration::from_millis(ms as u64)))
            }
            Value::String(s) => {
                let s = s.trim();
                if let Ok(ms) = s.parse::<u64>() {
                    return Ok(Some(Duration::from_millis(ms)));
                }
                humantime::parse_duration(s)
                    .map(Some)
                    .map_err(|e| ParamError::Invalid {
                        name,
                        reason: format!("'{}' is not a duration: {}", s, e),
                    })
            }
            other => Err(Self::wrong_type(name, "a duration", other)),
        }
    }
}
