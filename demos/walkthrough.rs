use std::{io::Read, ptr::NonNull};

use segalloc::{AllocError, Allocator};

/// Waits until the user presses ENTER.
/// Handy for inspecting the arena mapping with `pmap` or `gdb` between steps.
fn block_until_enter_pressed() {
  println!("\n>>> Press ENTER to continue...");
  let _ = std::io::stdin().bytes().next();
}

fn print_stats(
  label: &str,
  allocator: &Allocator,
) {
  let stats = allocator.stats();
  println!(
    "[{}] PID = {}, pages = {}, headers = {}, free blocks = {}, free bytes = {}, largest free = {}",
    label,
    std::process::id(),
    stats.pages,
    stats.headers,
    stats.free_blocks,
    stats.free_bytes,
    stats.largest_free,
  );
}

fn print_block(
  label: &str,
  allocator: &Allocator,
  ptr: NonNull<u8>,
) -> Result<(), AllocError> {
  let usable = unsafe { allocator.usable_size(ptr)? };
  println!("[{}] payload at {:p}, usable size = {}", label, ptr, usable);
  Ok(())
}

fn main() -> Result<(), AllocError> {
  let mut allocator = Allocator::new()?;
  print_stats("start", &allocator);
  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 1) The first allocation claims the initial run of pages.
  // --------------------------------------------------------------------
  let first = allocator.allocate(4)?;
  println!("\n[1] Allocate 4 bytes (rounded up to one 8 byte unit)");
  print_block("1", &allocator, first)?;
  unsafe { first.cast::<u32>().write(0xDEADBEEF) };
  print_stats("1", &allocator);
  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 2) Odd sizes are rounded to the alignment.
  // --------------------------------------------------------------------
  let second = allocator.allocate(12)?;
  println!("\n[2] Allocate 12 bytes");
  print_block("2", &allocator, second)?;
  unsafe { second.as_ptr().write_bytes(0xAB, 12) };
  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 3) Freeing a block puts it on the free list.
  // --------------------------------------------------------------------
  unsafe { allocator.deallocate(first)? };
  println!("\n[3] Deallocated first block at {:p}", first);
  print_stats("3", &allocator);
  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 4) A small request fits the freed block and reuses it.
  // --------------------------------------------------------------------
  let third = allocator.allocate(2)?;
  println!(
    "\n[4] Allocate 2 bytes: {}",
    if third == first {
      "reused the freed block"
    } else {
      "placed somewhere else"
    }
  );
  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 5) Growing the second block absorbs the free space after it.
  // --------------------------------------------------------------------
  let grown = unsafe { allocator.reallocate(second, 1024)? };
  println!(
    "\n[5] Reallocate 12 -> 1024 bytes: {}",
    if grown == second { "grew in place" } else { "moved" }
  );
  print_block("5", &allocator, grown)?;
  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 6) A request larger than the arena grows it by whole pages.
  // --------------------------------------------------------------------
  print_stats("before large alloc", &allocator);
  let big = allocator.allocate(1 << 20)?;
  print_block("6", &allocator, big)?;
  print_stats("after large alloc", &allocator);
  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 7) Freeing everything coalesces the arena back into one free block.
  // --------------------------------------------------------------------
  unsafe {
    allocator.deallocate(third)?;
    allocator.deallocate(big)?;
    allocator.deallocate(grown)?;
  }
  print_stats("7", &allocator);
  println!("[7] Heap consistent: {}", allocator.is_valid());

  println!("\n[8] End of example. Dropping the allocator unmaps the arena.");
  Ok(())
}
