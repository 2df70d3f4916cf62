use std::io::Read;

use triarena::slab::SlabAllocator;

/// Waits until the user presses ENTER.
/// Useful when you want to inspect memory state with tools like `pmap`,
/// `htop`, or `gdb` between steps.
fn block_until_enter_pressed() {
  println!("\n>>> Press ENTER to continue...");
  let _ = std::io::stdin().bytes().next();
}

fn main() {
  // A pool of 8 fixed 32-byte slots. Every slot is the same size, so
  // `allocate`'s size argument is ignored and cost is O(1) either way.
  let mut pool = SlabAllocator::new(32, 8).expect("mmap the slot pool");
  println!("[start] {} slots of {} bytes each, {} free", pool.num_slots(), pool.user_size(), pool.free_count());
  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 1) Fill the pool completely.
  // --------------------------------------------------------------------
  let mut live = Vec::new();
  for i in 0..pool.num_slots() {
    let ptr = pool.alloc_slot().expect("a slot is available");
    unsafe { ptr.as_ptr().write_bytes(i as u8, pool.user_size()) };
    live.push(ptr);
  }
  println!("\n[1] Filled every slot. free_count = {}", pool.free_count());
  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 2) The pool is exhausted; one more allocation fails.
  // --------------------------------------------------------------------
  println!("\n[2] allocate() on a full pool -> {:?}", pool.alloc_slot());
  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 3) Release the third slot, then allocate again and see it reused.
  // --------------------------------------------------------------------
  let released = live.remove(3);
  pool.release_slot(released).expect("release a live slot");
  println!("\n[3] Released one slot. free_count = {}", pool.free_count());

  let reused = pool.alloc_slot().expect("the freed slot is available again");
  println!("[3] reused == released? {}", reused == released);
  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 4) A double free is rejected, not undefined behavior.
  // --------------------------------------------------------------------
  pool.release_slot(reused).unwrap();
  println!("\n[4] Releasing the same pointer twice -> {:?}", pool.release_slot(reused));

  println!("\n[5] End of demo. Dropping the pool unmaps its backing region.");
}
