//! Runs the heap on the real program break.
//!
//! Kept in its own test binary so no other heap test moves the break.

use breakheap::{BreakHeap, HEADER_SIZE, Heap, HeapError, Sbrk};

#[test]
fn test_program_break_heap() {
  let mut heap: BreakHeap = Heap::new(Sbrk::new());

  let before = Sbrk::program_break();
  let data = heap.allocate(100).unwrap();
  let (lower, upper) = heap.bounds().unwrap();

  assert!(lower.as_ptr() >= before);
  assert_eq!(upper.as_ptr() as usize - lower.as_ptr() as usize, 1024);
  assert_eq!(data.as_ptr() as usize, lower.as_ptr() as usize + HEADER_SIZE);

  unsafe {
    data.as_ptr().write_bytes(0x11, 100);

    let second = heap.allocate(200).unwrap();
    second.as_ptr().write_bytes(0x22, 200);
    assert_eq!(*data.as_ptr().add(99), 0x11);

    heap.free(data.as_ptr());
    heap.free(second.as_ptr());
  }

  assert_eq!(heap.stats().free_blocks, 1);
  assert_eq!(heap.stats().used_blocks, 0);

  // The system allocator may have moved the break in the meantime.
  match unsafe { heap.reset() } {
    Ok(()) => {
      assert!(heap.is_empty());
      assert_eq!(Sbrk::program_break(), lower.as_ptr());
    }
    Err(HeapError::BreakMoved { .. }) => assert!(!heap.is_empty()),
    Err(error) => panic!("unexpected reset failure: {error}"),
  }
}
