//! Memory Allocator Configuration
//!
//! The binary uses mimalloc as its global allocator. Every transform allocates
//! whole-input and whole-output buffers on pool threads, and mimalloc's
//! per-thread heaps keep those allocations from contending with each other.

use mimalloc::MiMalloc;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;
