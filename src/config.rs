use crate::error::{HeapError, Result};

/// Granularity of every heap extension.
pub const DEFAULT_EXTENSION_UNIT: usize = 1024;

/// Tunables for a [`Heap`](crate::Heap).
///
/// ```rust
/// use breakheap::HeapConfig;
///
/// let config = HeapConfig::new().extension_unit(4096).verbose(true);
/// assert_eq!(config.unit(), 4096);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeapConfig {
  extension_unit: usize,
  verbose: bool,
}

impl HeapConfig {
  pub const fn new() -> Self {
    Self {
      extension_unit: DEFAULT_EXTENSION_UNIT,
      verbose: false,
    }
  }

  /// Every extension request is rounded up to a multiple of `unit` bytes.
  pub const fn extension_unit(
    mut self,
    unit: usize,
  ) -> Self {
    self.extension_unit = unit;
    self
  }

  /// Start with verbose diagnostics enabled.
  pub const fn verbose(
    mut self,
    verbose: bool,
  ) -> Self {
    self.verbose = verbose;
    self
  }

  pub const fn unit(&self) -> usize {
    self.extension_unit
  }

  pub const fn is_verbose(&self) -> bool {
    self.verbose
  }

  pub(crate) fn validate(self) -> Result<Self> {
    if self.extension_unit == 0 {
      return Err(HeapError::InvalidConfig("extension unit must be non-zero"));
    }

    Ok(self)
  }
}

impl Default for HeapConfig {
  fn default() -> Self {
    Self::new()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_defaults() {
    let config = HeapConfig::default();

    assert_eq!(config.unit(), 1024);
    assert!(!config.is_verbose());
  }

  #[test]
  fn test_zero_unit_rejected() {
    let result = HeapConfig::new().extension_unit(0).validate();

    assert!(matches!(result, Err(HeapError::InvalidConfig(_))));
  }
}
