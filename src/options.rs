//! Compression option resolution.
//!
//! Optional arguments are positional: method, file name, comment, sha1. The
//! positions start right after the input buffer for the sync entry point and
//! one later for the async entry point, which takes its callback second.

use crate::config::{DEFAULT_COMMENT, DEFAULT_FILE_NAME, DEFAULT_METHOD, DEFAULT_SHA1};
use crate::error::BridgeError;
use crate::types::Value;

/// Options passed to the compress transform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressionOptions {
    /// Codec configuration string, passed to the engine as-is.
    pub method: String,
    /// File name embedded in the stream header.
    pub file_name: String,
    /// Comment embedded in the stream header.
    pub comment: String,
    /// Whether a SHA-1 digest of the input is embedded.
    pub sha1: bool,
}

impl Default for CompressionOptions {
    fn default() -> Self {
        Self { method: DEFAULT_METHOD.to_owned(), file_name: DEFAULT_FILE_NAME.to_owned(), comment: DEFAULT_COMMENT.to_owned(), sha1: DEFAULT_SHA1 }
    }
}

impl CompressionOptions {
    /// Resolves options from positional arguments.
    ///
    /// The method is read at `1 + offset`, then file name, comment and sha1.
    /// Absent, null and undefined arguments take the default; anything else
    /// must have the field's type.
    pub fn resolve(args: &[Value<'_>], offset: usize) -> Result<Self, BridgeError> {
        Ok(Self {
            method: optional_string(args, 1 + offset, DEFAULT_METHOD)?,
            file_name: optional_string(args, 2 + offset, DEFAULT_FILE_NAME)?,
            comment: optional_string(args, 3 + offset, DEFAULT_COMMENT)?,
            sha1: optional_bool(args, 4 + offset, DEFAULT_SHA1)?,
        })
    }

    #[must_use]
    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = method.into();
        self
    }

    #[must_use]
    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = file_name.into();
        self
    }

    #[must_use]
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = comment.into();
        self
    }

    #[must_use]
    pub fn with_sha1(mut self, sha1: bool) -> Self {
        self.sha1 = sha1;
        self
    }

    /// Positional arguments that resolve back to these options.
    pub fn to_args(&self) -> [Value<'static>; 4] {
        [Value::from(self.method.as_str()), Value::from(self.file_name.as_str()), Value::from(self.comment.as_str()), Value::from(self.sha1)]
    }
}

fn optional_string(args: &[Value<'_>], position: usize, default: &str) -> Result<String, BridgeError> {
    match args.get(position) {
        None => Ok(default.to_owned()),
        Some(value) if value.is_nullish() => Ok(default.to_owned()),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(other) => Err(mismatch(position, "string", other)),
    }
}

fn optional_bool(args: &[Value<'_>], position: usize, default: bool) -> Result<bool, BridgeError> {
    match args.get(position) {
        None => Ok(default),
        Some(value) if value.is_nullish() => Ok(default),
        Some(Value::Bool(b)) => Ok(*b),
        Some(other) => Err(mismatch(position, "boolean", other)),
    }
}

fn mismatch(position: usize, expected: &str, got: &Value<'_>) -> BridgeError {
    BridgeError::validation(format!("type mismatch: argument {position} should be a {expected}, got {}", got.type_name()))
}
