use canonical_json::to_string;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::identifiers::ProfileId;

/// Error returned when a document cannot be canonicalized or decoded.
#[derive(thiserror::Error, Debug)]
pub enum CanonicalizationError {
    /// A float that JSON cannot carry (NaN or an infinity), located by JSON pointer.
    #[error("non-finite number at '{0}'")]
    NonFiniteNumber(String),
    /// The document root had the wrong JSON type.
    #[error("expected a JSON object, found {0}")]
    NotAnObject(&'static str),
    /// Input text is not valid JSON.
    #[error("decode failed: {0}")]
    Decode(String),
    /// Value could not be serialized into a JSON document.
    #[error("serialization failed: {0}")]
    Serialization(String),
    /// The RFC 8785 encoder refused the value.
    #[error("encoding failed: {0}")]
    Encoding(String),
}

/// Walks a document and reports the JSON pointer (RFC 6901) of the first
/// non-finite number.
fn check_finite(value: &Value, pointer: &mut String) -> Result<(), CanonicalizationError> {
    let mark = pointer.len();
    match value {
        Value::Object(map) => map.iter().try_for_each(|(key, child)| {
            pointer.push('/');
            pointer.push_str(&key.replace('~', "~0").replace('/', "~1"));
            let r = check_finite(child, pointer);
            pointer.truncate(mark);
            r
        }),
        Value::Array(items) => items.iter().enumerate().try_for_each(|(idx, item)| {
            pointer.push('/');
            pointer.push_str(&idx.to_string());
            let r = check_finite(item, pointer);
            pointer.truncate(mark);
            r
        }),
        Value::Number(num) if num.as_f64().is_some_and(|f| !f.is_finite()) => {
            Err(CanonicalizationError::NonFiniteNumber(pointer.clone()))
        }
        _ => Ok(()),
    }
}

/// Canonicalizer that emits deterministic bytes (RFC 8785 key ordering and
/// number/string encoding).
#[derive(Debug, Clone)]
pub struct Canonicalizer {
    profile: ProfileId,
}

impl Canonicalizer {
    /// Binds a canonicalizer to a profile name.
    pub fn new(profile: ProfileId) -> Self {
        Self { profile }
    }

    /// Profile this canonicalizer was built for.
    pub fn profile(&self) -> &ProfileId {
        &self.profile
    }

    /// Produces canonical bytes for a JSON value.
    pub fn canonicalize(&self, value: &Value) -> Result<Vec<u8>, CanonicalizationError> {
        check_finite(value, &mut String::new())?;
        to_string(value)
            .map(String::into_bytes)
            .map_err(|err| CanonicalizationError::Encoding(err.to_string()))
    }

    /// Produces the canonical text for a JSON value.
    pub fn canonical_text(&self, value: &Value) -> Result<String, CanonicalizationError> {
        let bytes = self.canonicalize(value)?;
        String::from_utf8(bytes).map_err(|err| CanonicalizationError::Encoding(err.to_string()))
    }

    /// Serializes any value and canonicalizes the result.
    pub fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, CanonicalizationError> {
        let value = serde_json::to_value(value)
            .map_err(|err| CanonicalizationError::Serialization(err.to_string()))?;
        self.canonicalize(&value)
    }

    /// Decodes canonical text back into a JSON value.
    pub fn decode(&self, text: &str) -> Result<Value, CanonicalizationError> {
        let value: Value =
            serde_json::from_str(text).map_err(|err| CanonicalizationError::Decode(err.to_string()))?;
        check_finite(&value, &mut String::new())?;
        Ok(value)
    }

    /// Decodes text that must hold a JSON object (proposal documents).
    pub fn decode_object(&self, text: &str) -> Result<Map<String, Value>, CanonicalizationError> {
        match self.decode(text)? {
            Value::Object(map) => Ok(map),
            other => Err(CanonicalizationError::NotAnObject(kind_of(&other))),
        }
    }

    /// Returns true when both values canonicalize to the same bytes.
    pub fn equivalent(&self, left: &Value, right: &Value) -> Result<bool, CanonicalizationError> {
        Ok(self.canonicalize(left)? == self.canonicalize(right)?)
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
