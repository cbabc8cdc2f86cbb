use std::{io, ptr::{self, NonNull}};

use libc::{c_void, intptr_t};

use crate::{align_to, error::{HeapError, Result}};

/// The low-level heap-extension primitive.
///
/// A source behaves like a program break: memory below the break belongs to
/// the heap, `extend` bumps the break upwards and `release_to` moves it back.
pub trait HeapSource {
  /// Grows the break by exactly `bytes`, returning the old break (the start
  /// of the new region), or `None` if the memory is not available.
  fn extend(
    &mut self,
    bytes: usize,
  ) -> Option<NonNull<u8>>;

  /// The current break address.
  fn current_break(&self) -> *mut u8;

  /// Moves the break back down to `address`.
  ///
  /// # Safety
  ///
  /// Every pointer into memory at or above `address` becomes dangling.
  unsafe fn release_to(
    &mut self,
    address: NonNull<u8>,
  ) -> Result<()>;
}

/// The process program break, driven through `sbrk(2)` and `brk(2)`.
///
/// The break is process-wide: the system allocator may move it as well, and
/// two heaps on `Sbrk` will interleave their extensions.
#[derive(Debug, Default)]
pub struct Sbrk;

impl Sbrk {
  pub fn new() -> Self {
    Self
  }

  /// The program break as reported by `sbrk(0)`.
  pub fn program_break() -> *mut u8 {
    unsafe { libc::sbrk(0) }.cast()
  }
}

impl HeapSource for Sbrk {
  fn extend(
    &mut self,
    bytes: usize,
  ) -> Option<NonNull<u8>> {
    let increment = intptr_t::try_from(bytes).ok()?;

    let address = unsafe { libc::sbrk(increment) };

    if address == usize::MAX as *mut c_void {
      return None;
    }

    NonNull::new(address.cast())
  }

  fn current_break(&self) -> *mut u8 {
    Self::program_break()
  }

  unsafe fn release_to(
    &mut self,
    address: NonNull<u8>,
  ) -> Result<()> {
    if unsafe { libc::brk(address.as_ptr().cast()) } != 0 {
      return Err(HeapError::Release(io::Error::last_os_error()));
    }

    Ok(())
  }
}

/// A private break emulated inside a single anonymous `mmap` reservation.
///
/// Extensions are always contiguous and never collide with other heaps, which
/// makes independent heaps (and parallel tests) possible in one process.
#[derive(Debug)]
pub struct MappedRegion {
  base: NonNull<u8>,
  len: usize,
  brk: usize,
}

impl MappedRegion {
  /// Reserves `bytes` of address space. Pages are only committed on use.
  pub fn reserve(bytes: usize) -> Result<Self> {
    if bytes == 0 {
      return Err(HeapError::Reserve(io::Error::new(
        io::ErrorKind::InvalidInput,
        "reservation must be non-zero",
      )));
    }

    let address = unsafe {
      libc::mmap(
        ptr::null_mut(),
        bytes,
        libc::PROT_READ | libc::PROT_WRITE,
        libc::MAP_PRIVATE | libc::MAP_ANONYMOUS | libc::MAP_NORESERVE,
        -1,
        0,
      )
    };

    if address == libc::MAP_FAILED {
      return Err(HeapError::Reserve(io::Error::last_os_error()));
    }

    let base = NonNull::new(address.cast()).ok_or_else(|| {
      HeapError::Reserve(io::Error::other("mmap returned null"))
    })?;

    log::debug!("reserved {} bytes at {:p}", bytes, base);

    Ok(Self { base, len: bytes, brk: 0 })
  }

  /// Total bytes reserved.
  pub fn capacity(&self) -> usize {
    self.len
  }

  /// Bytes currently below the break.
  pub fn used(&self) -> usize {
    self.brk
  }

  fn page_size() -> usize {
    match unsafe { libc::sysconf(libc::_SC_PAGESIZE) } {
      size if size > 0 => size as usize,
      _ => 4096,
    }
  }
}

impl HeapSource for MappedRegion {
  fn extend(
    &mut self,
    bytes: usize,
  ) -> Option<NonNull<u8>> {
    if bytes > self.len - self.brk {
      return None;
    }

    // SAFETY: `brk + bytes <= len`, so the result stays inside the mapping.
    let start = unsafe { self.base.add(self.brk) };
    self.brk += bytes;

    Some(start)
  }

  fn current_break(&self) -> *mut u8 {
    self.base.as_ptr().wrapping_add(self.brk)
  }

  unsafe fn release_to(
    &mut self,
    address: NonNull<u8>,
  ) -> Result<()> {
    let offset = (address.as_ptr() as usize).wrapping_sub(self.base.as_ptr() as usize);

    if offset > self.brk {
      return Err(HeapError::Release(io::Error::new(
        io::ErrorKind::InvalidInput,
        "address outside the mapped region",
      )));
    }

    let page = Self::page_size();
    let from = align_to!(offset, page).unwrap_or(self.len).min(self.len);
    let to = align_to!(self.brk, page).unwrap_or(self.len).min(self.len);

    if to > from {
      let result = unsafe {
        libc::madvise(
          self.base.as_ptr().add(from).cast(),
          to - from,
          libc::MADV_DONTNEED,
        )
      };

      if result != 0 {
        return Err(HeapError::Release(io::Error::last_os_error()));
      }
    }

    self.brk = offset;

    Ok(())
  }
}

impl Drop for MappedRegion {
  fn drop(&mut self) {
    unsafe {
      libc::munmap(self.base.as_ptr().cast(), self.len);
    }
  }
}
