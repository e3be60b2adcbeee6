//! Custom filters for template expressions
//!
//! Registered on top of the minijinja builtins (`trim`, `replace`, `title`,
//! `join`, `first`, `last`, ...):
//! - `default`: Provide fallback for undefined or none values
//! - `required`: Fail if value is undefined
//! - `upper` / `lower`: Case conversion
//! - `base64_encode` (`b64enc`) / `base64_decode` (`b64dec`)
//! - `trim_prefix` / `trim_suffix`: Strip a fixed prefix or suffix
//! - `trunc`: Keep the first (or, if negative, last) N characters
//! - `quote`: Wrap in double quotes, escaping as needed
//! - `kebabcase` / `snakecase`: Re-case identifiers

use base64::{engine::general_purpose::STANDARD, Engine};
use minijinja::{Error, ErrorKind, Value};

/// Default filter - returns fallback if value is undefined or none
///
/// Usage: `{{ value | default("fallback") }}`
pub fn default_filter(value: Value, fallback: Value) -> Value {
    if value.is_undefined() || value.is_none() {
        fallback
    } else {
        value
    }
}

/// Required filter - fails if value is undefined
///
/// Usage: `{{ value | required }}`
pub fn required(value: Value) -> Result<Value, Error> {
    if value.is_undefined() {
        Err(Error::new(
            ErrorKind::UndefinedError,
            "required value is undefined",
        ))
    } else {
        Ok(value)
    }
}

/// Upper case filter
pub fn upper(value: &str) -> String {
    value.to_uppercase()
}

/// Lower case filter
pub fn lower(value: &str) -> String {
    value.to_lowercase()
}

/// Base64 encode filter
///
/// Usage: `{{ value | base64_encode }}`
pub fn base64_encode(value: &str) -> String {
    STANDARD.encode(value.as_bytes())
}

/// Base64 decode filter
///
/// Usage: `{{ value | base64_decode }}`
pub fn base64_decode(value: &str) -> Result<String, Error> {
    STANDARD
        .decode(value)
        .map_err(|e| {
            Error::new(
                ErrorKind::InvalidOperation,
                format!("base64 decode error: {}", e),
            )
        })
        .and_then(|bytes| {
            String::from_utf8(bytes).map_err(|e| {
                Error::new(
                    ErrorKind::InvalidOperation,
                    format!("base64 decode produced invalid UTF-8: {}", e),
                )
            })
        })
}

/// Strip a prefix if present
///
/// Usage: `{{ metadata.name | trim_prefix("team-") }}`
pub fn trim_prefix(value: &str, prefix: &str) -> String {
    value.strip_prefix(prefix).unwrap_or(value).to_string()
}

/// Strip a suffix if present
pub fn trim_suffix(value: &str, suffix: &str) -> String {
    value.strip_suffix(suffix).unwrap_or(value).to_string()
}

/// Truncate to `len` characters; a negative length keeps the last characters
///
/// Usage: `{{ metadata.name | trunc(30) }}`
pub fn trunc(value: &str, len: i64) -> String {
    let count = value.chars().count();
    let keep = usize::try_from(len.unsigned_abs()).unwrap_or(usize::MAX);
    if keep >= count {
        return value.to_string();
    }
    if len >= 0 {
        value.chars().take(keep).collect()
    } else {
        value.chars().skip(count - keep).collect()
    }
}

/// Wrap in double quotes
pub fn quote(value: &str) -> String {
    format!("{:?}", value)
}

/// `MyTopic_name` -> `my-topic-name`
pub fn kebabcase(value: &str) -> String {
    split_words(value).join("-")
}

/// `MyTopic-name` -> `my_topic_name`
pub fn snakecase(value: &str) -> String {
    split_words(value).join("_")
}

/// Split on non-alphanumerics and lower-to-upper case boundaries, lowercased
fn split_words(value: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut prev_lower = false;

    for ch in value.chars() {
        if !ch.is_alphanumeric() {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            prev_lower = false;
            continue;
        }
        if ch.is_uppercase() && prev_lower && !current.is_empty() {
            words.push(std::mem::take(&mut current));
        }
        prev_lower = ch.is_lowercase() || ch.is_numeric();
        current.extend(ch.to_lowercase());
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}
