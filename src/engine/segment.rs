//! Segment coding.
//!
//! The payload after the header is a run of segments, one per block of the
//! original input. Each segment is `codec (u8) | length (u32 BE) | bytes` and
//! decodes to exactly one block; only the last block may be short.

use crate::config::{SEGMENT_STORED, SEGMENT_ZSTD};
use crate::error::EngineError;

/// Bounds-checked reader over a compressed stream.
pub struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    #[inline]
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn take(&mut self, len: usize) -> Result<&'a [u8], EngineError> {
        let end = self.pos.checked_add(len).filter(|&end| end <= self.data.len()).ok_or_else(|| EngineError::new("unexpected end of stream"))?;

        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    pub fn u8(&mut self) -> Result<u8, EngineError> {
        Ok(self.take(1)?[0])
    }

    pub fn u32_be(&mut self) -> Result<u32, EngineError> {
        let bytes = self.take(4)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Bytes not yet consumed.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pos == self.data.len()
    }
}

/// Encodes one block into `out`.
///
/// With `level == None` the block is stored. Otherwise it is zstd-compressed,
/// falling back to stored when compression does not shrink it.
pub fn encode(block: &[u8], level: Option<i32>, out: &mut Vec<u8>) -> Result<(), EngineError> {
    let compressed = match level {
        Some(level) => Some(zstd::bulk::compress(block, level).map_err(|e| EngineError::new(format!("compression failed: {e}")))?),
        None => None,
    };

    let (codec, payload) = match compressed.as_deref() {
        Some(compressed) if compressed.len() < block.len() => (SEGMENT_ZSTD, compressed),
        _ => (SEGMENT_STORED, block),
    };

    let len = u32::try_from(payload.len()).map_err(|_| EngineError::new("segment too large"))?;

    out.try_reserve(payload.len() + 5).map_err(|_| EngineError::out_of_memory(payload.len() + 5))?;
    out.push(codec);
    out.extend_from_slice(&len.to_be_bytes());
    out.extend_from_slice(payload);

    Ok(())
}

/// Decodes the next segment, which must expand to exactly `expected` bytes,
/// and appends the result to `out`.
pub fn decode(cursor: &mut Cursor<'_>, expected: usize, out: &mut Vec<u8>) -> Result<(), EngineError> {
    let codec = cursor.u8()?;
    let len = cursor.u32_be()? as usize;
    let payload = cursor.take(len)?;

    out.try_reserve(expected).map_err(|_| EngineError::out_of_memory(expected))?;

    match codec {
        SEGMENT_STORED => {
            if payload.len() != expected {
                return Err(EngineError::new(format!("corrupt segment: stored {} bytes, expected {expected}", payload.len())));
            }
            out.extend_from_slice(payload);
        }
        SEGMENT_ZSTD => {
            let block = zstd::bulk::decompress(payload, expected).map_err(|e| EngineError::new(format!("decompression failed: {e}")))?;
            if block.len() != expected {
                return Err(EngineError::new(format!("corrupt segment: decoded {} bytes, expected {expected}", block.len())));
            }
            out.extend_from_slice(&block);
        }
        other => return Err(EngineError::new(format!("corrupt segment: unknown codec 0x{other:02x}"))),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compressible_block_uses_zstd() {
        let block = vec![b'a'; 10_000];
        let mut out = Vec::new();
        encode(&block, Some(3), &mut out).unwrap();

        assert_eq!(out[0], SEGMENT_ZSTD);
        assert!(out.len() < block.len());

        let mut decoded = Vec::new();
        let mut cursor = Cursor::new(&out);
        decode(&mut cursor, block.len(), &mut decoded).unwrap();
        assert_eq!(decoded, block);
        assert!(cursor.is_empty());
    }

    #[test]
    fn test_incompressible_block_is_stored() {
        let block = b"xyz".to_vec();
        let mut out = Vec::new();
        encode(&block, Some(1), &mut out).unwrap();
        assert_eq!(out[0], SEGMENT_STORED);

        let mut decoded = Vec::new();
        decode(&mut Cursor::new(&out), 3, &mut decoded).unwrap();
        assert_eq!(decoded, block);
    }

    #[test]
    fn test_store_level() {
        let block = vec![0u8; 4096];
        let mut out = Vec::new();
        encode(&block, None, &mut out).unwrap();
        assert_eq!(out[0], SEGMENT_STORED);
        assert_eq!(out.len(), block.len() + 5);
    }

    #[test]
    fn test_decode_length_mismatch() {
        let mut out = Vec::new();
        encode(b"abc", None, &mut out).unwrap();

        let err = decode(&mut Cursor::new(&out), 4, &mut Vec::new()).unwrap_err();
        assert!(err.message().starts_with("corrupt segment"));
    }

    #[test]
    fn test_decode_unknown_codec() {
        let data = [0x7F, 0, 0, 0, 0];
        let err = decode(&mut Cursor::new(&data), 0, &mut Vec::new()).unwrap_err();
        assert!(err.message().contains("unknown codec"));
    }

    #[test]
    fn test_cursor_bounds() {
        let mut cursor = Cursor::new(&[1, 2, 3]);
        assert_eq!(cursor.u8().unwrap(), 1);
        assert_eq!(cursor.remaining(), 2);
        assert!(cursor.u32_be().is_err());
        assert_eq!(cursor.take(2).unwrap(), &[2, 3]);
        assert!(cursor.is_empty());
    }
}
