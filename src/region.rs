use std::ptr::NonNull;

use log::{debug, warn};

use crate::{
  align_to,
  error::{HeapError, Result},
  source::HeapSource,
};

/// Tracks the bounds of the managed heap and grows it in whole units.
pub(crate) struct Region<S> {
  source: S,
  unit: usize,
  lower: Option<NonNull<u8>>,
  upper: Option<NonNull<u8>>,
}

impl<S: HeapSource> Region<S> {
  pub fn new(
    source: S,
    unit: usize,
  ) -> Self {
    Self {
      source,
      unit,
      lower: None,
      upper: None,
    }
  }

  pub fn source(&self) -> &S {
    &self.source
  }

  /// `(lower, upper)` once the heap has been extended at least once.
  pub fn bounds(&self) -> Option<(NonNull<u8>, NonNull<u8>)> {
    self.lower.zip(self.upper)
  }

  /// Extends the heap by `min_bytes` rounded up to the extension unit.
  ///
  /// Returns the start of the new memory and its length.
  pub fn extend(
    &mut self,
    min_bytes: usize,
  ) -> Result<(NonNull<u8>, usize)> {
    let requested = min_bytes;
    let bytes = align_to!(min_bytes, self.unit).ok_or(HeapError::OutOfMemory { requested })?;

    let Some(start) = self.source.extend(bytes) else {
      warn!("heap extension of {} bytes failed", bytes);
      return Err(HeapError::OutOfMemory { requested: bytes });
    };

    let end = start.as_ptr().wrapping_add(bytes);

    if self.lower.is_none() {
      self.lower = Some(start);
    }

    self.upper = match self.upper {
      Some(upper) if upper.as_ptr() >= end => Some(upper),
      _ => NonNull::new(end),
    };

    debug!("extended heap by {} bytes at {:p}", bytes, start);

    Ok((start, bytes))
  }

  /// Moves the break back to the lower bound and forgets both bounds.
  ///
  /// Refuses to touch the break if it is no longer where the last extension
  /// left it.
  ///
  /// # Safety
  ///
  /// Every pointer into the heap becomes dangling.
  pub unsafe fn reset(&mut self) -> Result<()> {
    let Some((lower, upper)) = self.bounds() else {
      return Ok(());
    };

    let actual = self.source.current_break();

    if actual != upper.as_ptr() {
      warn!("refusing to reset: break at {:p}, heap ends at {:p}", actual, upper);
      return Err(HeapError::BreakMoved {
        expected: upper.as_ptr() as usize,
        actual: actual as usize,
      });
    }

    unsafe { self.source.release_to(lower)? };

    debug!("released heap {:p}..{:p}", lower, upper);

    self.lower = None;
    self.upper = None;

    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::source::MappedRegion;

  #[test]
  fn test_extend_rounds_to_unit() {
    let mut region = Region::new(MappedRegion::reserve(64 * 1024).unwrap(), 1024);

    let (start, len) = region.extend(1).unwrap();
    assert_eq!(len, 1024);

    let (next, len) = region.extend(1025).unwrap();
    assert_eq!(len, 2048);
    assert_eq!(next, unsafe { start.add(1024) });

    let (lower, upper) = region.bounds().unwrap();
    assert_eq!(lower, start);
    assert_eq!(upper, unsafe { start.add(3072) });
  }

  #[test]
  fn test_extend_failure() {
    let mut region = Region::new(MappedRegion::reserve(4096).unwrap(), 1024);

    assert!(matches!(
      region.extend(5000),
      Err(HeapError::OutOfMemory { requested: 5120 })
    ));
    assert!(matches!(
      region.extend(usize::MAX),
      Err(HeapError::OutOfMemory { .. })
    ));
    assert!(region.bounds().is_none());
  }

  #[test]
  fn test_reset() {
    let mut region = Region::new(MappedRegion::reserve(64 * 1024).unwrap(), 1024);

    let (start, _) = region.extend(3000).unwrap();
    unsafe { region.reset().unwrap() };

    assert!(region.bounds().is_none());
    assert_eq!(region.source().used(), 0);

    let (again, _) = region.extend(10).unwrap();
    assert_eq!(again, start);
  }

  #[test]
  fn test_reset_refuses_moved_break() {
    let mut source = MappedRegion::reserve(64 * 1024).unwrap();
    source.extend(512).unwrap();
    let mut region = Region::new(source, 1024);

    region.extend(10).unwrap();
    region.source.extend(1024).unwrap();

    assert!(matches!(
      unsafe { region.reset() },
      Err(HeapError::BreakMoved { .. })
    ));
    assert!(region.bounds().is_some());
  }
}
