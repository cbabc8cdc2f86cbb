use std::{fmt, mem, ptr::NonNull};

/// Metadata placed immediately before every user data region.
///
/// ```text
///   ┌──────┬──────────┬──────┬──────┬──────┬───────────────────────────┐
///   │ free │ capacity │ size │ prev │ next │  data (capacity bytes)    │
///   └──────┴──────────┴──────┴──────┴──────┴───────────────────────────┘
///   ▲                                      ▲
///   BlockPtr                               BlockPtr::data()
/// ```
#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub(crate) struct Block {
  pub free: bool,
  pub capacity: usize,
  pub size: usize,
  pub prev: Option<BlockPtr>,
  pub next: Option<BlockPtr>,
}

/// Bytes taken by one block header.
pub const HEADER_SIZE: usize = mem::size_of::<Block>();

impl Block {
  /// An unlinked, in-use header.
  pub fn new(
    size: usize,
    capacity: usize,
  ) -> Self {
    Self {
      free: false,
      capacity,
      size,
      prev: None,
      next: None,
    }
  }

  pub fn slack(&self) -> usize {
    self.capacity - self.size
  }
}

/// Address of a block header inside the managed heap.
///
/// Split points follow the in-use bytes of the previous block exactly, so a
/// header may sit at any byte offset. Every access therefore goes through
/// unaligned reads and writes of the whole header.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq)]
pub(crate) struct BlockPtr(NonNull<Block>);

impl BlockPtr {
  pub fn at(address: NonNull<u8>) -> Self {
    Self(address.cast())
  }

  /// Recovers the header from a pointer previously returned by [`BlockPtr::data`].
  ///
  /// # Safety
  ///
  /// `data` must be the data pointer of a live block.
  pub unsafe fn from_data(data: NonNull<u8>) -> Self {
    Self::at(unsafe { data.sub(HEADER_SIZE) })
  }

  pub fn addr(self) -> usize {
    self.0.as_ptr() as usize
  }

  pub fn start(self) -> NonNull<u8> {
    self.0.cast()
  }

  pub fn data(self) -> NonNull<u8> {
    // SAFETY: the header and its data live in the same heap extension.
    unsafe { self.0.cast::<u8>().add(HEADER_SIZE) }
  }

  /// # Safety
  ///
  /// The pointer must reference a header written by [`BlockPtr::store`].
  pub unsafe fn load(self) -> Block {
    unsafe { self.0.as_ptr().read_unaligned() }
  }

  /// # Safety
  ///
  /// The pointer must reference `HEADER_SIZE` writable bytes owned by the heap.
  pub unsafe fn store(
    self,
    header: Block,
  ) {
    unsafe { self.0.as_ptr().write_unaligned(header) }
  }

  /// Loads the header, applies `f`, and writes it back.
  ///
  /// # Safety
  ///
  /// Same as [`BlockPtr::load`] and [`BlockPtr::store`].
  pub unsafe fn update<F: FnOnce(&mut Block)>(
    self,
    f: F,
  ) {
    unsafe {
      let mut header = self.load();
      f(&mut header);
      self.store(header);
    }
  }

  /// Whether `other` starts exactly where this block's capacity ends.
  ///
  /// # Safety
  ///
  /// Same as [`BlockPtr::load`].
  pub unsafe fn touches(
    self,
    other: BlockPtr,
  ) -> bool {
    let capacity = unsafe { self.load() }.capacity;
    self.data().as_ptr() as usize + capacity == other.addr()
  }
}

impl fmt::Debug for BlockPtr {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    write!(f, "{:p}", self.0)
  }
}

impl fmt::Pointer for BlockPtr {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    fmt::Pointer::fmt(&self.0, f)
  }
}
