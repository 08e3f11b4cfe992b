//! paqbridge - In-memory compression for single-threaded cooperative callers.
//!
//! Exposes four operations to a host that runs on one thread:
//! - `compressSync` / `decompressSync` run the transform on the calling thread
//! - `compressAsync` / `decompressAsync` copy the input into a task, run it on a
//!   worker pool, and invoke the caller's continuation back on the caller's thread
//!
//! Failures are reported as a [`BridgeError`] of one of four kinds (argument,
//! validation, out of memory, transform) on both paths.

pub mod bindings;
pub mod client;
pub mod config;
pub mod engine;
pub mod error;
pub mod options;
pub mod runtime;
pub mod types;
pub mod worker;

pub use bindings::{Exports, Module, init};
pub use client::Client;
pub use error::{BridgeError, ErrorKind};
pub use options::CompressionOptions;
pub use runtime::Runtime;
pub use types::{Continuation, Value};
