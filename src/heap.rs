use std::{
  ffi::CStr,
  io::{self, Write},
  ptr::{self, NonNull},
};

use log::{debug, trace};

use crate::{
  block::{Block, BlockPtr, HEADER_SIZE},
  config::HeapConfig,
  directory::Directory,
  dump::{self, BlockInfo, HeapStats},
  error::{HeapError, Result},
  region::Region,
  source::{HeapSource, MappedRegion, Sbrk},
};

/// A first-fit heap on top of a [`HeapSource`].
///
/// All state lives in this value, so independent heaps can coexist. A heap is
/// single-threaded; callers that share one must serialize every call.
pub struct Heap<S: HeapSource> {
  region: Region<S>,
  blocks: Directory,
  verbose: bool,
  sink: Box<dyn Write>,
}

/// A heap on the process program break.
pub type BreakHeap = Heap<Sbrk>;

/// A heap inside its own `mmap` reservation.
pub type MappedHeap = Heap<MappedRegion>;

impl<S: HeapSource> Heap<S> {
  pub fn new(source: S) -> Self {
    let config = HeapConfig::default();

    Self {
      region: Region::new(source, config.unit()),
      blocks: Directory::new(),
      verbose: config.is_verbose(),
      sink: Box::new(io::stderr()),
    }
  }

  /// Builds a heap from `config`.
  ///
  /// Verbose mode taken from the config starts silently; only
  /// [`Heap::set_verbose`] writes the `Verbose enabled` line, since no sink
  /// other than stderr exists yet.
  pub fn with_config(
    source: S,
    config: HeapConfig,
  ) -> Result<Self> {
    let config = config.validate()?;

    Ok(Self {
      region: Region::new(source, config.unit()),
      blocks: Directory::new(),
      verbose: config.is_verbose(),
      sink: Box::new(io::stderr()),
    })
  }

  /// Allocates `size` bytes and returns the address right after the header.
  ///
  /// The directory is scanned first-fit in address order. A free block whose
  /// capacity covers `size` is reused in place. Otherwise the first block with
  /// at least `size + HEADER_SIZE` bytes of slack is split. When nothing fits
  /// the heap is extended and the new block becomes the tail.
  ///
  /// The returned memory is not zeroed and only carries the alignment implied
  /// by its position behind the header.
  pub fn allocate(
    &mut self,
    size: usize,
  ) -> Result<NonNull<u8>> {
    if size == 0 {
      return Err(HeapError::ZeroSize);
    }

    // SAFETY: every linked block lies inside memory handed out by the region.
    unsafe {
      if let Some(block) = self.find_host(size) {
        return Ok(block.data());
      }

      self.grow(size)
    }
  }

  unsafe fn find_host(
    &mut self,
    size: usize,
  ) -> Option<BlockPtr> {
    let mut cursor = self.blocks.head();

    while let Some(block) = cursor {
      let header = unsafe { block.load() };

      if header.free && header.capacity >= size {
        unsafe {
          block.update(|h| {
            h.free = false;
            h.size = size;
          });
        }
        trace!("reused {:p} for {} bytes", block, size);
        return Some(block);
      }

      if header.slack() >= size.saturating_add(HEADER_SIZE) {
        return Some(unsafe { self.split(block, header, size) });
      }

      cursor = header.next;
    }

    None
  }

  /// Carves a block for `size` bytes out of the slack of `host`.
  ///
  /// The host keeps exactly its in-use bytes; all of its slack past the new
  /// header moves to the new block.
  unsafe fn split(
    &mut self,
    host: BlockPtr,
    header: Block,
    size: usize,
  ) -> BlockPtr {
    unsafe {
      let carved = BlockPtr::at(host.data().add(header.size));
      carved.store(Block::new(size, header.slack() - HEADER_SIZE));

      host.update(|h| h.capacity = h.size);
      self.blocks.insert_after(host, carved);

      trace!("split {:p}: carved {:p} for {} bytes", host, carved, size);

      carved
    }
  }

  unsafe fn grow(
    &mut self,
    size: usize,
  ) -> Result<NonNull<u8>> {
    let needed = size
      .checked_add(HEADER_SIZE)
      .ok_or(HeapError::OutOfMemory { requested: size })?;

    let (start, len) = self.region.extend(needed)?;
    let block = BlockPtr::at(start);

    unsafe {
      block.store(Block::new(size, len - HEADER_SIZE));
      self.blocks.push_back(block);
    }

    Ok(block.data())
  }

  /// Releases the block behind `ptr` and merges it with free neighbours.
  ///
  /// A null pointer is ignored. Freeing a block that is already free changes
  /// nothing; with verbose diagnostics on, one line is written to the sink.
  ///
  /// # Safety
  ///
  /// `ptr` must be null or a pointer returned by this heap that has not been
  /// invalidated by a merge or [`Heap::reset`].
  pub unsafe fn free(
    &mut self,
    ptr: *mut u8,
  ) {
    let Some(data) = NonNull::new(ptr) else {
      return;
    };

    unsafe {
      let block = BlockPtr::from_data(data);

      if block.load().free {
        debug!("double free of {:p}", block);
        if self.verbose {
          let _ = writeln!(self.sink, "You tried to free a free block: {:p}", block);
        }
        return;
      }

      block.update(|h| {
        h.free = true;
        h.size = 0;
      });

      self.coalesce(block);
    }
  }

  /// Collapses the run of adjacent free blocks around `block` into one.
  ///
  /// Forward merges are tried before backward ones, repeatedly, until neither
  /// neighbour can be absorbed.
  unsafe fn coalesce(
    &mut self,
    mut block: BlockPtr,
  ) {
    unsafe {
      loop {
        let header = block.load();

        if let Some(next) = header.next.filter(|&next| mergeable(block, next)) {
          self.absorb(block, next);
          continue;
        }

        if let Some(prev) = header.prev.filter(|&prev| mergeable(prev, block)) {
          self.absorb(prev, block);
          block = prev;
          continue;
        }

        break;
      }
    }
  }

  unsafe fn absorb(
    &mut self,
    into: BlockPtr,
    victim: BlockPtr,
  ) {
    unsafe {
      let extra = victim.load().capacity + HEADER_SIZE;

      self.blocks.unlink(victim);
      into.update(|h| h.capacity += extra);

      trace!("merged {:p} into {:p}", victim, into);
    }
  }

  /// Allocates `count * size` zeroed bytes.
  ///
  /// # Hazard
  ///
  /// The product wraps on overflow instead of failing, so a huge `count`
  /// can yield a block smaller than the caller expects.
  pub fn zero_allocate(
    &mut self,
    count: usize,
    size: usize,
  ) -> Result<NonNull<u8>> {
    if count == 0 || size == 0 {
      return Err(HeapError::ZeroSize);
    }

    let bytes = count.wrapping_mul(size);
    let data = self.allocate(bytes)?;

    // SAFETY: the block behind `data` has at least `bytes` of capacity.
    unsafe { ptr::write_bytes(data.as_ptr(), 0, bytes) };

    Ok(data)
  }

  /// Resizes the block behind `ptr`.
  ///
  /// - null `ptr` behaves like [`Heap::allocate`];
  /// - `size == 0` frees the block and returns `Ok(None)`;
  /// - if the capacity already covers `size`, only the recorded size changes
  ///   and the same pointer comes back;
  /// - otherwise the block is freed first, a new one is allocated and the old
  ///   contents are moved over.
  ///
  /// On the last path the old block is gone even when the new allocation
  /// fails.
  ///
  /// # Safety
  ///
  /// Same contract as [`Heap::free`].
  pub unsafe fn reallocate(
    &mut self,
    ptr: *mut u8,
    size: usize,
  ) -> Result<Option<NonNull<u8>>> {
    let Some(data) = NonNull::new(ptr) else {
      return self.allocate(size).map(Some);
    };

    if size == 0 {
      unsafe { self.free(ptr) };
      return Ok(None);
    }

    unsafe {
      let block = BlockPtr::from_data(data);
      let header = block.load();

      if header.capacity >= size {
        block.update(|h| h.size = size);
        return Ok(Some(data));
      }

      let kept = header.size.min(size);

      self.free(ptr);
      let moved = self.allocate(size)?;

      // The old bytes are still in place: the freed block is only ever
      // reused from its own header or one below it.
      if moved != data {
        ptr::copy(data.as_ptr(), moved.as_ptr(), kept);
      }

      trace!("moved {:p} to {:p} ({} bytes kept)", data, moved, kept);

      Ok(Some(moved))
    }
  }

  /// Copies a NUL-terminated string, terminator included, into the heap.
  pub fn duplicate_string(
    &mut self,
    text: &CStr,
  ) -> Result<NonNull<u8>> {
    let bytes = text.to_bytes_with_nul();
    let data = self.allocate(bytes.len())?;

    // SAFETY: `data` was just allocated with room for every byte.
    unsafe { ptr::copy_nonoverlapping(bytes.as_ptr(), data.as_ptr(), bytes.len()) };

    Ok(data)
  }

  /// Gives all memory back to the source and empties the directory.
  ///
  /// Afterwards the heap behaves as if it had never allocated. If the break
  /// was moved by someone else the heap is left untouched.
  ///
  /// # Safety
  ///
  /// Every pointer previously returned by this heap becomes dangling.
  pub unsafe fn reset(&mut self) -> Result<()> {
    unsafe { self.region.reset()? };
    self.blocks.clear();

    debug!("heap reset");

    Ok(())
  }

  pub fn set_verbose(
    &mut self,
    verbose: bool,
  ) {
    self.verbose = verbose;

    if verbose {
      let _ = writeln!(self.sink, "Verbose enabled");
    }
  }

  pub fn is_verbose(&self) -> bool {
    self.verbose
  }

  /// Redirects diagnostics (double-free notices and [`Heap::dump`]).
  pub fn set_log_sink<W: Write + 'static>(
    &mut self,
    sink: W,
  ) {
    self.sink = Box::new(sink);
  }

  /// Writes the heap map to the log sink.
  pub fn dump(&mut self) -> io::Result<()> {
    dump::write_map(&mut *self.sink, &self.blocks, self.region.bounds())?;
    self.sink.flush()
  }

  /// Snapshots of every block, in address order.
  pub fn blocks(&self) -> impl Iterator<Item = BlockInfo> + '_ {
    self.blocks.iter().map(BlockInfo::of)
  }

  /// True until the first allocation, and again after a reset.
  pub fn is_empty(&self) -> bool {
    self.blocks.is_empty()
  }

  pub fn stats(&self) -> HeapStats {
    self.blocks().collect()
  }

  /// Lowest and highest heap addresses, once the heap has been extended.
  pub fn bounds(&self) -> Option<(NonNull<u8>, NonNull<u8>)> {
    self.region.bounds()
  }

  /// The last block in address order.
  pub fn last_block(&self) -> Option<BlockInfo> {
    self.blocks.tail().map(BlockInfo::of)
  }

  pub fn source(&self) -> &S {
    self.region.source()
  }
}

/// Both blocks free and `high` starting where `low` ends.
unsafe fn mergeable(
  low: BlockPtr,
  high: BlockPtr,
) -> bool {
  unsafe { low.load().free && high.load().free && low.touches(high) }
}
