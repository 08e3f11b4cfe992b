//! Global Configuration Constants
//!
//! This module contains the configuration parameters used throughout paqbridge.
//! These constants define the default compression options, the compressed stream
//! format, and the runtime limits applied to the background workers.
//!
//! ## Layout
//!
//! - **Option defaults**: values applied when a caller omits an optional argument
//! - **Stream format**: magic bytes, version and codec identifiers written by the engine
//! - **Runtime limits**: worker pool sizing and the engine's memory ceiling
//!
//! [`BridgeConfig`] gathers the runtime limits that a host may want to override.

use std::thread;

/// Application name used in logs and CLI output
pub const APP_NAME: &str = "paqbridge";

/// File extension appended by the CLI to compressed files
pub const FILE_EXTENSION: &str = ".paq";

// === Compression Option Defaults ===
// Applied by the option resolver when an optional argument is absent, null or undefined.

/// Default method string.
///
/// Level 1 with a block size of `1 MiB << 4` (16 MiB). The two trailing
/// arguments are recorded with the stream.
pub const DEFAULT_METHOD: &str = "14,128,0";

/// Default file name embedded in the stream header
pub const DEFAULT_FILE_NAME: &str = "";

/// Default comment embedded in the stream header
pub const DEFAULT_COMMENT: &str = "";

/// Whether a SHA-1 digest of the original content is embedded by default
pub const DEFAULT_SHA1: bool = true;

// === Stream Format ===
// These constants define the binary layout produced by the engine.

/// Magic bytes opening every compressed stream
pub const MAGIC_BYTES: [u8; 4] = *b"PAQB";

/// Current stream format version
///
/// Streams carrying any other version are rejected on decompression.
pub const CURRENT_VERSION: u16 = 0x0001;

/// Segment codec identifier: bytes stored verbatim
pub const SEGMENT_STORED: u8 = 0x00;

/// Segment codec identifier: bytes compressed with zstd
pub const SEGMENT_ZSTD: u8 = 0x01;

/// Size of the SHA-1 content digest in bytes
pub const DIGEST_SIZE: usize = 20;

/// Highest compression level accepted in a method string
pub const MAX_LEVEL: u8 = 5;

/// zstd level used for each method level. Level 0 stores segments verbatim.
pub const ZSTD_LEVELS: [i32; MAX_LEVEL as usize + 1] = [0, 1, 3, 9, 15, 19];

/// Block size exponent used when a method string names only a level
pub const DEFAULT_BLOCK_LOG: u8 = 4;

/// Highest block size exponent accepted in a method string (`1 MiB << 11` = 2 GiB)
pub const MAX_BLOCK_LOG: u8 = 11;

/// Unit block size; the method's block exponent shifts this value
pub const BLOCK_UNIT: u64 = 1024 * 1024;

// === Runtime Limits ===

/// Largest buffer the engine will allocate for a single transform (1 GiB)
///
/// Requests above this ceiling fail the same way an exhausted allocator does,
/// so callers see an out-of-memory error instead of an aborted process.
pub const DEFAULT_MEMORY_LIMIT: usize = 1024 * 1024 * 1024;

/// Worker count used when the available parallelism cannot be detected
pub const FALLBACK_WORKER_THREADS: usize = 4;

/// Thread name prefix for the background pool
pub const WORKER_THREAD_PREFIX: &str = "paqbridge-worker";

/// Runtime configuration for a [`crate::runtime::Runtime`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BridgeConfig {
    /// Number of background threads executing tasks.
    pub worker_threads: usize,
    /// Largest buffer the engine may allocate, in bytes.
    pub memory_limit: usize,
}

impl BridgeConfig {
    #[must_use]
    pub fn with_worker_threads(mut self, worker_threads: usize) -> Self {
        self.worker_threads = worker_threads.max(1);
        self
    }

    #[must_use]
    pub fn with_memory_limit(mut self, memory_limit: usize) -> Self {
        self.memory_limit = memory_limit;
        self
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        // Use available CPU cores, falling back when detection fails.
        let worker_threads = thread::available_parallelism().map(|p| p.get()).unwrap_or(FALLBACK_WORKER_THREADS);

        Self { worker_threads, memory_limit: DEFAULT_MEMORY_LIMIT }
    }
}
