//! In-memory compression engine.
//!
//! The bridge treats the engine as an opaque primitive reached through the
//! [`Transform`] trait. [`Engine`] is the concrete implementation: block-wise
//! zstd with a wincode header carrying the method, metadata and an optional
//! SHA-1 digest of the original bytes.
//!
//! Every failure leaves the engine as an [`EngineError`] text. Allocation
//! failures use the `out of memory` wording so the error translator can tell
//! them apart from malformed input.

use sha1::{Digest, Sha1};
use subtle::ConstantTimeEq;
use tracing::debug;

use crate::config::DEFAULT_MEMORY_LIMIT;
use crate::error::EngineError;

pub mod header;
pub mod method;
pub mod segment;

use header::Header;
use method::Method;
use segment::Cursor;

/// The compress/decompress primitive invoked by the bridge.
///
/// Both operations are synchronous and CPU-bound. Implementations run on the
/// caller thread for the sync entry points and on pool threads for the async
/// ones, hence `Send + Sync`.
pub trait Transform: Send + Sync {
    fn compress(&self, input: &[u8], method: &str, file_name: &str, comment: &str, sha1: bool) -> Result<Vec<u8>, EngineError>;

    fn decompress(&self, input: &[u8]) -> Result<Vec<u8>, EngineError>;
}

/// Block-wise zstd engine with a bounded memory footprint.
///
/// No input it accepts and no buffer it allocates may exceed `memory_limit`.
/// Larger requests fail with an out-of-memory error.
pub struct Engine {
    memory_limit: usize,
}

impl Engine {
    /// Creates an engine capped at `memory_limit` bytes per buffer.
    #[inline]
    pub fn new(memory_limit: usize) -> Self {
        Self { memory_limit }
    }

    /// Reads the header of a compressed stream without decoding the payload.
    pub fn inspect(input: &[u8]) -> Result<Header, EngineError> {
        Header::read_from(&mut Cursor::new(input)).map(|(header, _)| header)
    }

    fn check_limit(&self, size: usize) -> Result<(), EngineError> {
        if size > self.memory_limit {
            return Err(EngineError::new(format!("out of memory: {size} bytes exceeds the {} byte limit", self.memory_limit)));
        }
        Ok(())
    }

    /// Allocates an output buffer, enforcing the memory limit.
    fn allocate(&self, capacity: usize) -> Result<Vec<u8>, EngineError> {
        self.check_limit(capacity)?;

        let mut buffer = Vec::new();
        buffer.try_reserve_exact(capacity).map_err(|_| EngineError::out_of_memory(capacity))?;
        Ok(buffer)
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(DEFAULT_MEMORY_LIMIT)
    }
}

impl Transform for Engine {
    fn compress(&self, input: &[u8], method: &str, file_name: &str, comment: &str, sha1: bool) -> Result<Vec<u8>, EngineError> {
        let parsed = Method::parse(method)?;

        if input.len() > self.memory_limit {
            return Err(EngineError::new(format!("out of memory: input of {} bytes exceeds the {} byte limit", input.len(), self.memory_limit)));
        }

        let digest = if sha1 { Sha1::digest(input).to_vec() } else { Vec::new() };
        let block_size = usize::try_from(parsed.block_size()).unwrap_or(usize::MAX);
        let header = Header::new(method, file_name, comment, input.len() as u64, parsed.block_size(), digest);

        // Compressed output rarely exceeds a quarter of the input; the vector grows past that as needed.
        let mut out = self.allocate((input.len() / 4 + 256).min(self.memory_limit))?;
        header.write_to(&mut out)?;

        let level = parsed.zstd_level();
        for block in input.chunks(block_size) {
            segment::encode(block, level, &mut out)?;
        }

        debug!(input = input.len(), output = out.len(), method, "compressed");

        Ok(out)
    }

    fn decompress(&self, input: &[u8]) -> Result<Vec<u8>, EngineError> {
        let mut cursor = Cursor::new(input);
        let (header, method) = Header::read_from(&mut cursor)?;

        let size = usize::try_from(header.size()).map_err(|_| EngineError::new(format!("out of memory: stream declares {} bytes", header.size())))?;
        let block_size = usize::try_from(method.block_size()).unwrap_or(usize::MAX);

        // Only the first block is reserved up front; each segment grows the
        // buffer as it decodes, so a forged size cannot claim memory on its own.
        self.check_limit(size)?;
        let mut out = self.allocate(size.min(block_size))?;
        while out.len() < size {
            let expected = block_size.min(size - out.len());
            segment::decode(&mut cursor, expected, &mut out)?;
        }

        if !cursor.is_empty() {
            return Err(EngineError::new("corrupt stream: unexpected trailing data"));
        }

        if !header.digest().is_empty() {
            let actual = Sha1::digest(&out);
            if !bool::from(actual.as_slice().ct_eq(header.digest())) {
                return Err(EngineError::new("checksum mismatch: content does not match its SHA-1 digest"));
            }
        }

        debug!(input = input.len(), output = out.len(), method = header.method(), "decompressed");

        Ok(out)
    }
}
