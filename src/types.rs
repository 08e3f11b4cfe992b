//! Common type definitions for paqbridge.
//!
//! Provides the argument model seen by the entry points and the unit of work
//! that crosses to the background pool.
//!
//! # Overview
//!
//! - [`Value`]: A positional argument as passed by the host
//! - [`Continuation`]: The error-first callback of an asynchronous call
//! - [`Operation`]: Which transform a call runs, with its resolved options
//! - [`Task`]: One asynchronous call, from input copy to delivery
//! - [`TaskState`]: The lifecycle position of a [`Task`]

use std::borrow::Cow;
use std::fmt::{self, Debug, Display, Formatter};
use std::panic::{self, AssertUnwindSafe};

use tracing::trace;

use crate::engine::Transform;
use crate::error::BridgeError;
use crate::options::CompressionOptions;

/// Error-first callback invoked exactly once with the outcome of an async call.
///
/// Receives `(None, Some(bytes))` on success and `(Some(error), None)` on failure.
pub type Continuation = Box<dyn FnOnce(Option<BridgeError>, Option<Vec<u8>>) + Send + 'static>;

/// A positional argument passed to an entry point.
pub enum Value<'a> {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    /// Byte buffer, borrowed from the caller or owned.
    Buffer(Cow<'a, [u8]>),
    Function(Continuation),
}

impl Value<'_> {
    /// Host-style type name used in error messages.
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::Buffer(_) => "buffer",
            Self::Function(_) => "function",
        }
    }

    /// True for values that select an option's default.
    #[inline]
    pub const fn is_nullish(&self) -> bool {
        matches!(self, Self::Undefined | Self::Null)
    }

    #[inline]
    pub fn as_buffer(&self) -> Option<&[u8]> {
        match self {
            Self::Buffer(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// Takes ownership of the buffer bytes, copying only when borrowed.
    pub fn into_bytes(self) -> Option<Vec<u8>> {
        match self {
            Self::Buffer(bytes) => Some(bytes.into_owned()),
            _ => None,
        }
    }

    /// Wraps a closure as a continuation argument.
    pub fn function<F>(f: F) -> Value<'static>
    where
        F: FnOnce(Option<BridgeError>, Option<Vec<u8>>) + Send + 'static,
    {
        Value::Function(Box::new(f))
    }
}

impl Debug for Value<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undefined => f.write_str("Undefined"),
            Self::Null => f.write_str("Null"),
            Self::Bool(b) => write!(f, "Bool({b})"),
            Self::Number(n) => write!(f, "Number({n})"),
            Self::String(s) => write!(f, "String({s:?})"),
            Self::Buffer(bytes) => write!(f, "Buffer([... {} bytes ...])", bytes.len()),
            Self::Function(_) => f.write_str("Function"),
        }
    }
}

impl<'a> From<&'a [u8]> for Value<'a> {
    fn from(bytes: &'a [u8]) -> Self {
        Self::Buffer(Cow::Borrowed(bytes))
    }
}

impl From<Vec<u8>> for Value<'_> {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Buffer(Cow::Owned(bytes))
    }
}

impl From<&str> for Value<'_> {
    fn from(s: &str) -> Self {
        Self::String(s.to_owned())
    }
}

impl From<String> for Value<'_> {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<bool> for Value<'_> {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<f64> for Value<'_> {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

/// The transform a call runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Compress(CompressionOptions),
    Decompress,
}

impl Operation {
    #[inline]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Compress(_) => "compress",
            Self::Decompress => "decompress",
        }
    }

    /// Runs the transform and translates whatever it raises.
    ///
    /// Engine failures are classified by the error translator; a panic inside
    /// the transform is caught here and never leaves the calling thread.
    pub fn apply(&self, transform: &dyn Transform, input: &[u8]) -> Result<Vec<u8>, BridgeError> {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| match self {
            Self::Compress(options) => transform.compress(input, &options.method, &options.file_name, &options.comment, options.sha1),
            Self::Decompress => transform.decompress(input),
        }));

        match outcome {
            Ok(result) => result.map_err(BridgeError::from),
            Err(payload) => Err(BridgeError::from_panic(payload.as_ref())),
        }
    }
}

impl Display for Operation {
    #[inline]
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Lifecycle of a [`Task`].
///
/// `Created → Queued → Executing → {Succeeded | Failed} → Delivered`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Created,
    Queued,
    Executing,
    Succeeded,
    Failed,
    Delivered,
}

/// Represents one asynchronous call.
///
/// The task owns a private copy of the caller's input, the operation with its
/// resolved options, and the continuation. It is executed on a pool thread and
/// delivered on the caller's context, after which it is gone.
pub struct Task {
    /// Sequential id, used in logs.
    id: u64,

    operation: Operation,

    /// Input bytes; `None` once the transform has consumed them.
    input: Option<Box<[u8]>>,

    /// Outcome of the transform; `None` until execution finishes.
    output: Option<Result<Vec<u8>, BridgeError>>,

    continuation: Continuation,

    state: TaskState,
}

impl Task {
    /// Creates a task, copying `input` into task-owned storage.
    pub fn new(id: u64, operation: Operation, input: &[u8], continuation: Continuation) -> Self {
        Self { id, operation, input: Some(Box::from(input)), output: None, continuation, state: TaskState::Created }
    }

    #[inline]
    pub const fn id(&self) -> u64 {
        self.id
    }

    #[inline]
    pub const fn state(&self) -> TaskState {
        self.state
    }

    #[inline]
    pub const fn operation(&self) -> &Operation {
        &self.operation
    }

    fn advance(&mut self, from: TaskState, to: TaskState) {
        debug_assert_eq!(self.state, from, "task {} cannot move to {to:?}", self.id);
        trace!(task = self.id, ?from, ?to, "task state");
        self.state = to;
    }

    /// Marks the task as handed to the dispatcher.
    pub fn queue(&mut self) {
        self.advance(TaskState::Created, TaskState::Queued);
    }

    /// Runs the transform on the current thread and stores the outcome.
    ///
    /// The input is moved out of the task before the transform sees it.
    pub fn execute(&mut self, transform: &dyn Transform) {
        self.advance(TaskState::Queued, TaskState::Executing);

        let result = match self.input.take() {
            Some(input) => self.operation.apply(transform, &input),
            None => Err(BridgeError::transform(format!("task {} has no input", self.id))),
        };

        let next = if result.is_ok() { TaskState::Succeeded } else { TaskState::Failed };
        self.output = Some(result);
        self.advance(TaskState::Executing, next);
    }

    /// Invokes the continuation with the outcome, consuming the task.
    ///
    /// Must only be called on the caller's context.
    pub fn deliver(mut self) {
        let output = self.output.take().unwrap_or_else(|| Err(BridgeError::transform(format!("task {} was delivered before it finished", self.id))));
        let from = self.state;
        self.advance(from, TaskState::Delivered);

        match output {
            Ok(bytes) => (self.continuation)(None, Some(bytes)),
            Err(error) => (self.continuation)(Some(error), None),
        }
    }
}

impl Debug for Task {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task").field("id", &self.id).field("operation", &self.operation).field("state", &self.state).finish_non_exhaustive()
    }
}
