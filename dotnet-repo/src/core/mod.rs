//! Deterministic, pure logic shared by the scaffolder.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data and return deterministic outputs suitable for tests.

pub mod candidates;
pub mod command_line;
pub mod key_blob;
