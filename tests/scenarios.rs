use tagheap::{BlockInfo, Heap, HeapConfig, Offset};

fn block(
  offset: usize,
  size: usize,
  allocated: bool,
) -> BlockInfo {
  BlockInfo {
    offset: Offset::new(offset),
    size,
    allocated,
  }
}

#[test]
fn test_first_fit_reuses_freed_block() {
  let mut heap = Heap::new().unwrap();

  let a = heap.allocate(8).unwrap();
  let b = heap.allocate(8).unwrap();
  assert_ne!(a, b);

  heap.free(a).unwrap();
  let len = heap.region_len();

  assert_eq!(heap.allocate(8), Some(a));
  assert_eq!(heap.region_len(), len);
  assert!(heap.check().is_ok());
}

#[test]
fn test_large_request_extends_once() {
  let mut heap = Heap::new().unwrap();

  // The initial chunk still fits 4000 bytes.
  let a = heap.allocate(4000).unwrap();
  assert_eq!(heap.extensions(), 1);
  assert_eq!(heap.region_len(), 4128);

  // What is left of it does not, so the region grows by exactly one chunk.
  let b = heap.allocate(4000).unwrap();
  assert_eq!(heap.extensions(), 2);
  assert_eq!(heap.region_len(), 4128 + 4096);
  assert!(b > a);
  assert!(heap.check().is_ok());
}

#[test]
fn test_free_middle_then_neighbors() {
  let mut heap = Heap::new().unwrap();
  let a = heap.allocate(32).unwrap();
  let b = heap.allocate(32).unwrap();
  let c = heap.allocate(32).unwrap();
  let d = heap.allocate(32).unwrap();

  heap.free(b).unwrap();
  assert!(heap.check().is_ok());
  assert_eq!(
    heap.blocks().take(4).collect::<Vec<_>>(),
    vec![
      block(a.get(), 48, true),
      block(b.get(), 48, false),
      block(c.get(), 48, true),
      block(d.get(), 48, true),
    ]
  );

  heap.free(a).unwrap();
  heap.free(c).unwrap();
  assert!(heap.check().is_ok());
  assert_eq!(
    heap.blocks().take(2).collect::<Vec<_>>(),
    vec![block(a.get(), 144, false), block(d.get(), 48, true)]
  );
}

#[test]
fn test_free_all_leaves_one_block() {
  let mut heap = Heap::new().unwrap();
  let a = heap.allocate(32).unwrap();
  let b = heap.allocate(32).unwrap();
  let c = heap.allocate(32).unwrap();

  heap.free(b).unwrap();
  heap.free(a).unwrap();
  heap.free(c).unwrap();

  assert_eq!(heap.blocks().collect::<Vec<_>>(), vec![block(a.get(), 4096, false)]);
  assert_eq!(heap.free_list_len(), 1);
}

#[test]
fn test_zero_request_does_nothing() {
  let mut heap = Heap::new().unwrap();
  let before = heap.to_string();

  assert_eq!(heap.allocate(0), None);
  assert_eq!(heap.try_allocate(0).unwrap(), None);
  assert_eq!(heap.to_string(), before);
}

#[test]
fn test_reuse_within_freed_span() {
  let mut heap = Heap::new().unwrap();
  let a = heap.allocate(200).unwrap();
  let _guard = heap.allocate(8).unwrap();
  let size = heap.blocks().next().unwrap().size;

  heap.free(a).unwrap();
  let reused = heap.allocate(size - 16).unwrap();

  assert_eq!(reused, a);
}

#[test]
fn test_split_floor() {
  let mut heap = Heap::new().unwrap();
  let a = heap.allocate(200).unwrap();
  let _guard = heap.allocate(8).unwrap();
  heap.free(a).unwrap();

  // 192 bytes adjust to 208, leaving 16 of the 224-byte block.
  let b = heap.allocate(200 - 8).unwrap();

  assert_eq!(b, a);
  assert_eq!(heap.blocks().next(), Some(block(a.get(), 224, true)));
  assert!(heap.blocks().all(|info| info.allocated || info.size >= 32));
}

#[test]
fn test_independent_heaps() {
  let mut first = Heap::new().unwrap();
  let mut second = Heap::with_config(HeapConfig::default().with_chunk_size(1024)).unwrap();

  let a = first.allocate(64).unwrap();
  let b = second.allocate(64).unwrap();

  assert_eq!(a, b);
  assert_eq!(second.region_len(), 32 + 1024);
  first.free(a).unwrap();
  assert!(second.payload(b).is_ok());
}

#[cfg(unix)]
#[test]
fn test_mmap_backed_heap() {
  use tagheap::{HeapError, MmapRegion};

  let region = MmapRegion::reserve(16 * 4096).unwrap();
  let mut heap = Heap::init(region, HeapConfig::default()).unwrap();

  let mut live = Vec::new();
  while let Some(bp) = heap.allocate(1000) {
    heap.payload_mut(bp).unwrap().fill(live.len() as u8);
    live.push(bp);
  }

  assert!(live.len() > 10);
  assert!(matches!(heap.try_allocate(1000), Err(HeapError::RegionExhausted { .. })));
  for (i, bp) in live.iter().enumerate() {
    assert!(heap.payload(*bp).unwrap().iter().all(|byte| *byte == i as u8));
  }
  for bp in live {
    heap.free(bp).unwrap();
  }
  assert_eq!(heap.free_list_len(), 1);
  assert!(heap.check().is_ok());
}
