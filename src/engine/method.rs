//! Method string parsing.
//!
//! A method reads `<level><blocklog>[,<arg>]*`: one level digit, an optional
//! block size exponent, then comma-separated unsigned arguments. `"14,128,0"`
//! is level 1, 16 MiB blocks, arguments `[128, 0]`.

use crate::config::{BLOCK_UNIT, DEFAULT_BLOCK_LOG, MAX_BLOCK_LOG, MAX_LEVEL, ZSTD_LEVELS};
use crate::error::EngineError;

/// A parsed method string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Method {
    level: u8,
    block_log: u8,
    args: Vec<u32>,
}

impl Method {
    pub fn parse(method: &str) -> Result<Self, EngineError> {
        let invalid = |reason: &str| EngineError::new(format!("invalid method \"{method}\": {reason}"));

        let mut parts = method.split(',');
        let head = parts.next().unwrap_or_default();

        let mut chars = head.chars();
        let level = chars
            .next()
            .and_then(|c| c.to_digit(10))
            .and_then(|d| u8::try_from(d).ok())
            .filter(|&d| d <= MAX_LEVEL)
            .ok_or_else(|| invalid("level must be a digit from 0 to 5"))?;

        let block = chars.as_str();
        let block_log = if block.is_empty() {
            DEFAULT_BLOCK_LOG
        } else {
            block.parse::<u8>().ok().filter(|&b| b <= MAX_BLOCK_LOG).ok_or_else(|| invalid("block size exponent must be 0 to 11"))?
        };

        let args = parts.map(|arg| arg.trim().parse::<u32>().map_err(|_| invalid("arguments must be unsigned integers"))).collect::<Result<Vec<_>, _>>()?;

        Ok(Self { level, block_log, args })
    }

    #[inline]
    pub const fn level(&self) -> u8 {
        self.level
    }

    /// zstd level for this method, or `None` when segments are stored.
    pub fn zstd_level(&self) -> Option<i32> {
        match self.level {
            0 => None,
            level => Some(ZSTD_LEVELS[usize::from(level)]),
        }
    }

    #[inline]
    pub const fn block_size(&self) -> u64 {
        BLOCK_UNIT << self.block_log
    }

    #[inline]
    pub fn args(&self) -> &[u32] {
        &self.args
    }
}
