use std::marker::PhantomData;

use crate::block::BlockPtr;

/// Address-ordered doubly linked list of block headers.
///
/// The directory only owns the links. Headers live inside the heap and are
/// written by the engines before they are linked in.
pub(crate) struct Directory {
  head: Option<BlockPtr>,
  tail: Option<BlockPtr>,
}

impl Directory {
  pub const fn new() -> Self {
    Self {
      head: None,
      tail: None,
    }
  }

  pub fn head(&self) -> Option<BlockPtr> {
    self.head
  }

  pub fn tail(&self) -> Option<BlockPtr> {
    self.tail
  }

  pub fn is_empty(&self) -> bool {
    self.head.is_none()
  }

  /// Forgets every block. The memory itself is released by the region.
  pub fn clear(&mut self) {
    self.head = None;
    self.tail = None;
  }

  /// Links `block` after the current tail.
  ///
  /// # Safety
  ///
  /// `block` must hold a valid header that is not already linked.
  pub unsafe fn push_back(
    &mut self,
    block: BlockPtr,
  ) {
    unsafe {
      block.update(|header| {
        header.prev = self.tail;
        header.next = None;
      });

      match self.tail {
        Some(tail) => tail.update(|header| header.next = Some(block)),
        None => self.head = Some(block),
      }
    }

    self.tail = Some(block);
  }

  /// Links `block` between `at` and its current successor.
  ///
  /// # Safety
  ///
  /// `at` must be linked, `block` must hold a valid unlinked header.
  pub unsafe fn insert_after(
    &mut self,
    at: BlockPtr,
    block: BlockPtr,
  ) {
    unsafe {
      let next = at.load().next;

      block.update(|header| {
        header.prev = Some(at);
        header.next = next;
      });
      at.update(|header| header.next = Some(block));

      match next {
        Some(next) => next.update(|header| header.prev = Some(block)),
        None => self.tail = Some(block),
      }
    }
  }

  /// Splices `block` out, reconnecting its neighbours.
  ///
  /// # Safety
  ///
  /// `block` must be linked in this directory.
  pub unsafe fn unlink(
    &mut self,
    block: BlockPtr,
  ) {
    unsafe {
      let header = block.load();

      match header.prev {
        Some(prev) => prev.update(|h| h.next = header.next),
        None => self.head = header.next,
      }

      match header.next {
        Some(next) => next.update(|h| h.prev = header.prev),
        None => self.tail = header.prev,
      }

      block.update(|h| {
        h.prev = None;
        h.next = None;
      });
    }
  }

  pub fn iter(&self) -> Iter<'_> {
    Iter {
      cursor: self.head,
      _directory: PhantomData,
    }
  }
}

/// Forward traversal from head to tail.
pub(crate) struct Iter<'a> {
  cursor: Option<BlockPtr>,
  _directory: PhantomData<&'a Directory>,
}

impl Iterator for Iter<'_> {
  type Item = BlockPtr;

  fn next(&mut self) -> Option<BlockPtr> {
    let block = self.cursor?;
    // SAFETY: every linked block holds a header written by the engines.
    self.cursor = unsafe { block.load() }.next;
    Some(block)
  }
}

#[cfg(test)]
mod tests {
  use std::ptr::NonNull;

  use super::*;
  use crate::block::{Block, HEADER_SIZE};

  fn headers(
    buffer: &mut [u8],
    count: usize,
  ) -> Vec<BlockPtr> {
    let base = NonNull::new(buffer.as_mut_ptr()).unwrap();

    (0..count)
      .map(|i| {
        let block = BlockPtr::at(unsafe { base.add(i * HEADER_SIZE * 2) });
        unsafe { block.store(Block::new(i + 1, HEADER_SIZE)) };
        block
      })
      .collect()
  }

  #[test]
  fn test_push_back_and_iter() {
    let mut buffer = vec![0u8; HEADER_SIZE * 8];
    let blocks = headers(&mut buffer, 3);
    let mut directory = Directory::new();

    assert!(directory.is_empty());

    unsafe {
      for &block in &blocks {
        directory.push_back(block);
      }

      assert_eq!(directory.head(), Some(blocks[0]));
      assert_eq!(directory.tail(), Some(blocks[2]));
      assert_eq!(blocks[1].load().prev, Some(blocks[0]));
      assert_eq!(blocks[1].load().next, Some(blocks[2]));
    }

    assert_eq!(directory.iter().collect::<Vec<_>>(), blocks);
  }

  #[test]
  fn test_insert_after_tail_moves_tail() {
    let mut buffer = vec![0u8; HEADER_SIZE * 8];
    let blocks = headers(&mut buffer, 3);
    let mut directory = Directory::new();

    unsafe {
      directory.push_back(blocks[0]);
      directory.push_back(blocks[2]);
      directory.insert_after(blocks[0], blocks[1]);

      assert_eq!(blocks[2].load().prev, Some(blocks[1]));

      let extra = headers(&mut buffer[HEADER_SIZE * 6..], 1)[0];
      directory.insert_after(blocks[2], extra);
      assert_eq!(directory.tail(), Some(extra));
    }

    assert_eq!(directory.iter().count(), 4);
    assert_eq!(directory.iter().take(3).collect::<Vec<_>>(), blocks);
  }

  #[test]
  fn test_unlink() {
    let mut buffer = vec![0u8; HEADER_SIZE * 8];
    let blocks = headers(&mut buffer, 3);
    let mut directory = Directory::new();

    unsafe {
      for &block in &blocks {
        directory.push_back(block);
      }

      directory.unlink(blocks[1]);
      assert_eq!(blocks[0].load().next, Some(blocks[2]));
      assert_eq!(blocks[2].load().prev, Some(blocks[0]));

      directory.unlink(blocks[0]);
      assert_eq!(directory.head(), Some(blocks[2]));

      directory.unlink(blocks[2]);
    }

    assert!(directory.is_empty());
    assert!(directory.tail().is_none());
  }
}
