use std::io;

use thiserror::Error;

/// Errors surfaced by heap operations.
///
/// Every failure is reported to the caller; no operation aborts the process.
#[derive(Debug, Error)]
pub enum HeapError {
  /// A zero-byte request (or a zero count/size for `zero_allocate`).
  #[error("Invalid size (must be > 0)")]
  ZeroSize,

  /// The heap-extension primitive refused to grow the heap.
  #[error("Out of memory (requested: {requested} bytes)")]
  OutOfMemory { requested: usize },

  #[error("Invalid configuration: {0}")]
  InvalidConfig(&'static str),

  /// Something else moved the break after the last extension.
  #[error("Program break moved (expected {expected:#x}, found {actual:#x})")]
  BreakMoved { expected: usize, actual: usize },

  #[error("Could not reserve heap region: {0}")]
  Reserve(#[source] io::Error),

  #[error("Could not release heap memory: {0}")]
  Release(#[source] io::Error),
}

pub type Result<T> = core::result::Result<T, HeapError>;
