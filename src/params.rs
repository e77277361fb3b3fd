//! Loosely typed parameter maps
//!
//! Ingestion options and model hyperparameters are both carried as a
//! [`Params`] map so they can come from JSON config, the CLI or code alike.

use crate::error::{AutoRegError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Ordered map of parameter name to value
pub type Params = BTreeMap<String, ParamValue>;

/// A single parameter value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl ParamValue {
    /// Parse a raw `key=value` right-hand side.
    ///
    /// `true`/`false` become booleans, integers and floats are recognized,
    /// everything else is kept as a trimmed string. A whitespace-only value
    /// is kept as given so a space or tab separator survives.
    pub fn parse_loose(raw: &str) -> Self {
        let trimmed = raw.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "true" => return ParamValue::Bool(true),
            "false" => return ParamValue::Bool(false),
            _ => {}
        }
        if let Ok(i) = trimmed.parse::<i64>() {
            return ParamValue::Int(i);
        }
        if let Ok(f) = trimmed.parse::<f64>() {
            return ParamValue::Float(f);
        }
        if trimmed.is_empty() {
            return ParamValue::String(raw.to_string());
        }
        ParamValue::String(trimmed.to_string())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParamValue::Bool(b) => Some(*b),
            ParamValue::Int(0) => Some(false),
            ParamValue::Int(1) => Some(true),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ParamValue::Int(i) => Some(*i),
            ParamValue::Float(f) if f.fract() == 0.0 && f.is_finite() => Some(*f as i64),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParamValue::Float(f) => Some(*f),
            ParamValue::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Name of the variant, used in error messages
    pub fn kind(&self) -> &'static str {
        match self {
            ParamValue::Bool(_) => "bool",
            ParamValue::Int(_) => "int",
            ParamValue::Float(_) => "float",
            ParamValue::String(_) => "string",
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Bool(b) => write!(f, "{b}"),
            ParamValue::Int(i) => write!(f, "{i}"),
            ParamValue::Float(x) => write!(f, "{x}"),
            ParamValue::String(s) => write!(f, "{s}"),
        }
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        ParamValue::Bool(v)
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Int(v)
    }
}

impl From<i32> for ParamValue {
    fn from(v: i32) -> Self {
        ParamValue::Int(v as i64)
    }
}

impl From<usize> for ParamValue {
    fn from(v: usize) -> Self {
        ParamValue::Int(v as i64)
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Float(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::String(v.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        ParamValue::String(v)
    }
}

/// Parse a `key=value` pair as given on the command line
pub fn parse_key_value(raw: &str) -> Result<(String, ParamValue)> {
    let (key, value) = raw.split_once('=').ok_or_else(|| {
        AutoRegError::invalid_parameter(raw, raw, "expected key=value")
    })?;
    let key = key.trim();
    if key.is_empty() {
        return Err(AutoRegError::invalid_parameter(raw, value, "empty key"));
    }
    Ok((key.to_string(), ParamValue::parse_loose(value)))
}

/// Typed lookups over a [`Params`] map that report the offending key on mismatch.
pub(crate) fn get_f64(params: &Params, key: &str) -> Result<Option<f64>> {
    match params.get(key) {
        None => Ok(None),
        Some(v) => v
            .as_f64()
            .map(Some)
            .ok_or_else(|| AutoRegError::invalid_parameter(key, v, format!("expected a number, got {}", v.kind()))),
    }
}

pub(crate) fn get_usize(params: &Params, key: &str) -> Result<Option<usize>> {
    match params.get(key) {
        None => Ok(None),
        Some(v) => match v.as_i64() {
            Some(i) if i >= 0 => Ok(Some(i as usize)),
            _ => Err(AutoRegError::invalid_parameter(
                key,
                v,
                "expected a non-negative integer",
            )),
        },
    }
}

pub(crate) fn get_bool(params: &Params, key: &str) -> Result<Option<bool>> {
    match params.get(key) {
        None => Ok(None),
        Some(v) => v
            .as_bool()
            .map(Some)
            .ok_or_else(|| AutoRegError::invalid_parameter(key, v, "expected a boolean")),
    }
}

pub(crate) fn get_str<'a>(params: &'a Params, key: &str) -> Result<Option<&'a str>> {
    match params.get(key) {
        None => Ok(None),
        Some(v) => v
            .as_str()
            .map(Some)
            .ok_or_else(|| AutoRegError::invalid_parameter(key, v, "expected a string")),
    }
}
