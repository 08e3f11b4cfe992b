//! Error taxonomy shared by the synchronous and asynchronous entry points.
//!
//! Every failure a caller can observe is a [`BridgeError`]: a [`ErrorKind`] plus
//! a message. Argument and validation errors are produced before any work is
//! scheduled; out-of-memory and transform errors come out of the engine and are
//! classified from its text by [`classify`].

use std::any::Any;

use strum::{Display, IntoStaticStr};
use thiserror::Error;

/// Markers in engine text that indicate memory exhaustion.
///
/// The engine reports every failure through one textual channel, so this list is
/// coupled to its exact wording. `"ut of memory"` matches both capitalisations.
const OUT_OF_MEMORY_MARKERS: &[&str] = &["ut of memory", "not enough memory"];

/// Caller-visible error category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, IntoStaticStr)]
pub enum ErrorKind {
    /// A required positional argument is missing or of the wrong kind.
    #[strum(serialize = "ArgumentError")]
    Argument,

    /// An optional argument has the wrong type.
    #[strum(serialize = "ValidationError")]
    Validation,

    /// The transform or its allocator ran out of memory.
    #[strum(serialize = "OutOfMemoryError")]
    OutOfMemory,

    /// Any other failure raised by the transform.
    #[strum(serialize = "TransformError")]
    Transform,
}

/// Structured `{kind, message}` error delivered to callers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct BridgeError {
    kind: ErrorKind,
    message: String,
}

impl BridgeError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }

    pub fn argument(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Argument, message)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    pub fn transform(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Transform, message)
    }

    /// Translates a panic payload caught at the transform boundary.
    pub fn from_panic(payload: &(dyn Any + Send)) -> Self {
        let detail = payload
            .downcast_ref::<&str>()
            .map(|s| (*s).to_owned())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic payload".to_owned());

        Self::transform(format!("transform panicked: {detail}"))
    }

    #[inline]
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Failure raised by a transform, carried as plain text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct EngineError(String);

impl EngineError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }

    /// Allocation failure in the wording [`classify`] recognises.
    pub fn out_of_memory(requested: usize) -> Self {
        Self(format!("out of memory: cannot allocate {requested} bytes"))
    }

    #[inline]
    pub fn message(&self) -> &str {
        &self.0
    }
}

impl From<EngineError> for BridgeError {
    fn from(error: EngineError) -> Self {
        let kind = classify(error.message());
        Self { kind, message: error.0 }
    }
}

/// Classifies engine failure text.
///
/// Memory exhaustion is recognised by substring; everything else the engine
/// raises is a transform error.
pub fn classify(message: &str) -> ErrorKind {
    if OUT_OF_MEMORY_MARKERS.iter().any(|marker| message.contains(marker)) {
        ErrorKind::OutOfMemory
    } else {
        ErrorKind::Transform
    }
}
