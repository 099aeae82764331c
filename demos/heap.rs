use std::error::Error;

use tagheap::{Heap, HeapConfig, Offset};

/// Prints the heap dump along with a summary line.
fn print_heap<R: tagheap::Region>(
  label: &str,
  heap: &Heap<R>,
) {
  let stats = heap.stats();
  println!(
    "\n[{}] region = {} bytes, {} allocated / {} free blocks, largest free = {}",
    label, stats.region_len, stats.allocated_blocks, stats.free_blocks, stats.largest_free
  );
  println!("{heap}");
}

fn print_alloc(
  size: usize,
  offset: Offset,
) {
  println!("Allocated {size} bytes, offset = {offset}");
}

fn main() -> Result<(), Box<dyn Error>> {
  pretty_env_logger::init();

  #[cfg(unix)]
  let mut heap = Heap::init(tagheap::MmapRegion::reserve(1 << 20)?, HeapConfig::default())?;
  #[cfg(not(unix))]
  let mut heap = Heap::with_config(HeapConfig::default().with_max_region_size(1 << 20))?;

  print_heap("start", &heap);

  // --------------------------------------------------------------------
  // 1) Three small blocks, carved one after another from the first chunk.
  // --------------------------------------------------------------------
  let a = heap.allocate(8).ok_or("allocation failed")?;
  print_alloc(8, a);
  heap.payload_mut(a)?[..8].copy_from_slice(&0xDEADBEEFu64.to_ne_bytes());

  let b = heap.allocate(32).ok_or("allocation failed")?;
  print_alloc(32, b);
  heap.payload_mut(b)?.fill(0xAB);

  let c = heap.allocate(32).ok_or("allocation failed")?;
  print_alloc(32, c);

  print_heap("three blocks", &heap);

  // --------------------------------------------------------------------
  // 2) Free the middle block, then its neighbors: they merge into one.
  // --------------------------------------------------------------------
  heap.free(b)?;
  print_heap("freed middle", &heap);

  heap.free(a)?;
  heap.free(c)?;
  print_heap("freed all", &heap);

  // --------------------------------------------------------------------
  // 3) First fit hands back the most recently freed block.
  // --------------------------------------------------------------------
  let d = heap.allocate(8).ok_or("allocation failed")?;
  println!(
    "\n[reuse] d == a? {}",
    if d == a { "Yes, it reused the freed block" } else { "No, it allocated somewhere else" }
  );

  // --------------------------------------------------------------------
  // 4) A large request grows the region.
  // --------------------------------------------------------------------
  let big = heap.allocate(64 * 1024).ok_or("allocation failed")?;
  print_alloc(64 * 1024, big);
  print_heap("after large alloc", &heap);

  // --------------------------------------------------------------------
  // 5) Resizing keeps the payload.
  // --------------------------------------------------------------------
  heap.payload_mut(d)?[..8].copy_from_slice(&0x1122334455667788u64.to_ne_bytes());
  let d = heap.reallocate(d, 512).ok_or("reallocation failed")?;
  println!(
    "\n[resize] d moved to {d}, value = {:#x}",
    u64::from_ne_bytes(heap.payload(d)?[..8].try_into()?)
  );

  heap.check()?;
  println!("\n[end] heap is consistent after {} extensions", heap.extensions());
  Ok(())
}
