//! Read-only views of the heap: block snapshots, totals and the heap map.

use std::{io, ptr::NonNull};

use crate::{
  block::{BlockPtr, HEADER_SIZE},
  directory::Directory,
};

/// A snapshot of one block header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockInfo {
  pub address: NonNull<u8>,
  pub data: NonNull<u8>,
  pub next: Option<NonNull<u8>>,
  pub prev: Option<NonNull<u8>>,
  pub capacity: usize,
  pub size: usize,
  pub free: bool,
}

impl BlockInfo {
  pub(crate) fn of(block: BlockPtr) -> Self {
    // SAFETY: only called on blocks linked in a directory.
    let header = unsafe { block.load() };

    Self {
      address: block.start(),
      data: block.data(),
      next: header.next.map(BlockPtr::start),
      prev: header.prev.map(BlockPtr::start),
      capacity: header.capacity,
      size: header.size,
      free: header.free,
    }
  }

  /// Header plus capacity.
  pub fn block_size(&self) -> usize {
    self.capacity + HEADER_SIZE
  }

  pub fn slack(&self) -> usize {
    self.capacity - self.size
  }
}

/// Aggregate totals over every block in the directory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeapStats {
  pub used_blocks: usize,
  pub free_blocks: usize,
  pub block_bytes: usize,
  pub capacity_bytes: usize,
  pub used_bytes: usize,
}

impl HeapStats {
  pub fn slack_bytes(&self) -> usize {
    self.capacity_bytes - self.used_bytes
  }

  pub fn blocks(&self) -> usize {
    self.used_blocks + self.free_blocks
  }
}

impl FromIterator<BlockInfo> for HeapStats {
  fn from_iter<I: IntoIterator<Item = BlockInfo>>(iter: I) -> Self {
    iter.into_iter().fold(Self::default(), |mut stats, info| {
      if info.free {
        stats.free_blocks += 1;
      } else {
        stats.used_blocks += 1;
      }
      stats.block_bytes += info.block_size();
      stats.capacity_bytes += info.capacity;
      stats.used_bytes += info.size;
      stats
    })
  }
}

fn address(pointer: Option<NonNull<u8>>) -> String {
  match pointer {
    Some(pointer) => format!("{:p}", pointer),
    None => String::from("(nil)"),
  }
}

/// Renders the heap map: one row per block, a totals row and a summary line.
pub(crate) fn write_map<W: io::Write + ?Sized>(
  out: &mut W,
  directory: &Directory,
  bounds: Option<(NonNull<u8>, NonNull<u8>)>,
) -> io::Result<()> {
  writeln!(out, "Heap map")?;
  writeln!(
    out,
    "  {:<7} {:>16} {:>16} {:>16} {:>16} {:>10} {:>10} {:>10} {:>10}  {}",
    "blk no", "block add", "next add", "prev add", "data add", "blk size", "capacity", "size", "excess", "status"
  )?;

  for (index, info) in directory.iter().map(BlockInfo::of).enumerate() {
    writeln!(
      out,
      "  {:<7} {:>16} {:>16} {:>16} {:>16} {:>10} {:>10} {:>10} {:>10}  {}",
      index,
      address(Some(info.address)),
      address(info.next),
      address(info.prev),
      address(Some(info.data)),
      info.block_size(),
      info.capacity,
      info.size,
      info.slack(),
      if info.free { "free *" } else { "in use" },
    )?;
  }

  let stats: HeapStats = directory.iter().map(BlockInfo::of).collect();

  writeln!(
    out,
    "  {:<75} {:>10} {:>10} {:>10} {:>10}",
    "Total bytes used",
    stats.block_bytes,
    stats.capacity_bytes,
    stats.used_bytes,
    stats.slack_bytes(),
  )?;
  writeln!(
    out,
    "  Used blocks: {:>4}  Free blocks: {:>4}  Min heap: {:>16}    Max heap: {:>16}   Block size: {} bytes",
    stats.used_blocks,
    stats.free_blocks,
    address(bounds.map(|(lower, _)| lower)),
    address(bounds.map(|(_, upper)| upper)),
    HEADER_SIZE,
  )
}
