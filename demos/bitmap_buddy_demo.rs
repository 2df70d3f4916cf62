use std::io::Read;

use triarena::bitmap_buddy::BitmapBuddyAllocator;
use triarena::contract::VariableBlockAllocator;

fn block_until_enter_pressed() {
  println!("\n>>> Press ENTER to continue...");
  let _ = std::io::stdin().bytes().next();
}

fn main() {
  // Same splitting discipline as the linked-list buddy, but every
  // block's state is a single bit in a binary-tree bitmap instead of a
  // node allocated from its own pool.
  let mut buddy = BitmapBuddyAllocator::new(1024, 4).expect("mmap the bitmap buddy region");
  println!("[start] total_size = {}, num_levels = {}, min_bucket_size = {}", buddy.total_size(), buddy.num_levels(), buddy.min_bucket_size());
  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 1) Allocate until the region is fully committed at the smallest
  //    bucket size, then watch the exhaustion boundary.
  // --------------------------------------------------------------------
  let mut live = Vec::new();
  while let Some(ptr) = buddy.alloc_sized(100) {
    live.push(ptr);
  }
  println!("\n[1] Allocated {} blocks of 100 bytes. sparse_free_memory = {}", live.len(), buddy.sparse_free_memory());
  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 2) Release every other block. No two released leaves are buddies,
  //    so nothing coalesces, demonstrating external fragmentation even
  //    though plenty of bytes are nominally free.
  // --------------------------------------------------------------------
  for (i, ptr) in live.iter().enumerate() {
    if i % 2 == 0 {
      buddy.release_block(*ptr).unwrap();
    }
  }
  // 200 bytes needs a level-2 block (120-byte leaves are too small), but
  // every level-2 ancestor still covers one allocated leaf from step 1.
  println!("\n[2] allocate(200) despite free bytes -> {:?}", buddy.alloc_sized(200));
  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 3) Release the rest; adjacent buddies coalesce back toward the root.
  // --------------------------------------------------------------------
  for (i, ptr) in live.into_iter().enumerate() {
    if i % 2 != 0 {
      buddy.release_block(ptr).unwrap();
    }
  }
  println!("\n[3] After releasing everything: sparse_free_memory = {}", buddy.sparse_free_memory());
  let whole_region = buddy.alloc_sized(buddy.total_size() - 8);
  println!("[3] The coalesced root now serves one full-size request -> {}", whole_region.is_some());

  println!("\n[4] End of demo. Dropping the allocator unmaps its backing region.");
}
