//! Stream header.
//!
//! A compressed stream opens with the magic bytes, a big-endian `u32` header
//! length, and the wincode-encoded [`Header`]. The header records everything the
//! decoder needs to size and verify its output: the method the stream was built
//! with, the original size, the block size, and the optional SHA-1 digest.

use wincode::{SchemaRead, SchemaWrite};

use crate::config::{CURRENT_VERSION, DIGEST_SIZE, MAGIC_BYTES};
use crate::engine::method::Method;
use crate::engine::segment::Cursor;
use crate::error::EngineError;

/// Metadata written ahead of the segments of every stream.
#[derive(Debug, Clone, PartialEq, Eq, SchemaRead, SchemaWrite)]
pub struct Header {
    version: u16,
    method: String,
    file_name: String,
    comment: String,
    size: u64,
    block_size: u64,
    digest: Vec<u8>,
}

impl Header {
    pub fn new(method: &str, file_name: &str, comment: &str, size: u64, block_size: u64, digest: Vec<u8>) -> Self {
        Self {
            version: CURRENT_VERSION,
            method: method.to_owned(),
            file_name: file_name.to_owned(),
            comment: comment.to_owned(),
            size,
            block_size,
            digest,
        }
    }

    /// Appends magic, length prefix and encoded header to `out`.
    pub fn write_to(&self, out: &mut Vec<u8>) -> Result<(), EngineError> {
        let encoded = wincode::serialize(self).map_err(|e| EngineError::new(format!("header encoding failed: {e}")))?;

        let len = u32::try_from(encoded.len()).map_err(|_| EngineError::new("header length overflow"))?;

        out.extend_from_slice(&MAGIC_BYTES);
        out.extend_from_slice(&len.to_be_bytes());
        out.extend_from_slice(&encoded);

        Ok(())
    }

    /// Reads and validates the header at the cursor position.
    ///
    /// Returns the header together with the method it names, which has been
    /// checked against the recorded block size.
    pub fn read_from(cursor: &mut Cursor<'_>) -> Result<(Self, Method), EngineError> {
        let magic = cursor.take(MAGIC_BYTES.len()).map_err(|_| EngineError::new("not a compressed stream: input too short"))?;
        if magic != MAGIC_BYTES {
            return Err(EngineError::new("not a compressed stream: bad magic"));
        }

        let len = cursor.u32_be()? as usize;
        if len > cursor.remaining() {
            return Err(EngineError::new(format!("corrupt header: length {len} exceeds the {} bytes left", cursor.remaining())));
        }

        let bytes = cursor.take(len)?;
        let header: Header = wincode::deserialize(bytes).map_err(|e| EngineError::new(format!("corrupt header: {e}")))?;

        if header.version != CURRENT_VERSION {
            return Err(EngineError::new(format!("unsupported stream version {}", header.version)));
        }

        if !header.digest.is_empty() && header.digest.len() != DIGEST_SIZE {
            return Err(EngineError::new("corrupt header: bad digest length"));
        }

        let method = Method::parse(&header.method)?;
        if method.block_size() != header.block_size {
            return Err(EngineError::new("corrupt header: block size does not match method"));
        }

        Ok((header, method))
    }

    #[inline]
    pub const fn size(&self) -> u64 {
        self.size
    }

    #[inline]
    pub fn method(&self) -> &str {
        &self.method
    }

    #[inline]
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    #[inline]
    pub fn comment(&self) -> &str {
        &self.comment
    }

    /// SHA-1 digest of the original content, empty when none was embedded.
    #[inline]
    pub fn digest(&self) -> &[u8] {
        &self.digest
    }
}
