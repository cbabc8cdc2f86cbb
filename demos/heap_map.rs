use std::io;

use breakheap::{BreakHeap, Heap, Sbrk};

/// Prints the current program break using `sbrk(0)`.
/// The program break is the upper boundary of the heap managed via brk/sbrk.
fn print_program_break(label: &str) {
  println!(
    "[{}] PID = {}, program break (sbrk(0)) = {:?}",
    label,
    std::process::id(),
    Sbrk::program_break(),
  );
}

fn main() -> breakheap::Result<()> {
  let mut heap: BreakHeap = Heap::new(Sbrk::new());
  heap.set_log_sink(io::stdout());
  heap.set_verbose(true);

  print_program_break("start");

  // --------------------------------------------------------------------
  // 1) First allocation: the heap is extended by one 1 KiB unit.
  // --------------------------------------------------------------------
  let first = heap.allocate(100)?;
  println!("\n[1] allocate(100) = {:p}", first);
  print_program_break("after first allocation");

  // --------------------------------------------------------------------
  // 2) The second allocation is carved out of the first block's slack.
  // --------------------------------------------------------------------
  let second = heap.allocate(200)?;
  println!("\n[2] allocate(200) = {:p}", second);
  let _ = heap.dump();

  // --------------------------------------------------------------------
  // 3) Free the first block and reuse it for a smaller request.
  // --------------------------------------------------------------------
  unsafe { heap.free(first.as_ptr()) };
  let third = heap.allocate(50)?;
  println!(
    "\n[3] allocate(50) = {:p}, reused the freed block? {}",
    third,
    if third == first { "Yes" } else { "No" }
  );

  // --------------------------------------------------------------------
  // 4) A double free is reported (verbose mode) and otherwise ignored.
  // --------------------------------------------------------------------
  unsafe {
    heap.free(third.as_ptr());
    heap.free(third.as_ptr());
  }

  // --------------------------------------------------------------------
  // 5) Copy a string and grow a block past its capacity.
  // --------------------------------------------------------------------
  let text = heap.duplicate_string(c"hello from the heap")?;
  let grown = unsafe { heap.reallocate(text.as_ptr(), 4000)? };
  println!("\n[5] strdup at {:p} grown to {:?}", text, grown);
  print_program_break("after growth");
  let _ = heap.dump();

  // --------------------------------------------------------------------
  // 6) Give everything back.
  // --------------------------------------------------------------------
  unsafe { heap.reset()? };
  print_program_break("after reset");

  Ok(())
}
