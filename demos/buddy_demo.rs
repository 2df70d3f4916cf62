use std::io::Read;

use triarena::buddy::BuddyAllocator;
use triarena::contract::VariableBlockAllocator;

fn block_until_enter_pressed() {
  println!("\n>>> Press ENTER to continue...");
  let _ = std::io::stdin().bytes().next();
}

fn main() {
  // 1 KiB region split into up to 4 levels (128-byte minimum blocks,
  // once the 8-byte back-pointer overhead is accounted for).
  let mut buddy = BuddyAllocator::new(1024, 3).expect("mmap the buddy region");
  println!("[start] total_size = {}, num_levels = {}, min_block_size = {}", buddy.total_size(), buddy.num_levels(), buddy.min_block_size());
  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 1) Two 120-byte requests split the root down to buddies of each other.
  // --------------------------------------------------------------------
  let first = buddy.alloc_sized(120).expect("first 120-byte request");
  let second = buddy.alloc_sized(120).expect("second 120-byte request, the buddy of the first");
  println!("\n[1] internal_fragmentation = {}, sparse_free_memory = {}", buddy.internal_fragmentation(), buddy.sparse_free_memory());
  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 2) Releasing both merges them back into the root block.
  // --------------------------------------------------------------------
  buddy.release_block(first).unwrap();
  buddy.release_block(second).unwrap();
  println!("\n[2] after releasing both: internal_fragmentation = {}, sparse_free_memory = {}", buddy.internal_fragmentation(), buddy.sparse_free_memory());
  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 3) A request larger than the whole region fails cleanly.
  // --------------------------------------------------------------------
  println!("\n[3] allocate(total_size + 1) -> {:?}", buddy.alloc_sized(buddy.total_size() + 1));

  // --------------------------------------------------------------------
  // 4) A double free is rejected.
  // --------------------------------------------------------------------
  let third = buddy.alloc_sized(64).unwrap();
  buddy.release_block(third).unwrap();
  println!("\n[4] Releasing the same pointer twice -> {:?}", buddy.release_block(third));

  println!("\n[5] End of demo. Dropping the allocator unmaps its backing region.");
}
