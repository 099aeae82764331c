//! Read-only views of the heap: the consistency checker, block iterators,
//! summary statistics and a printable dump.

use std::fmt;

use thiserror::Error;

use crate::{
  block::{self, DSIZE, MIN_BLOCK_SIZE, OVERHEAD, Offset, Tag, WSIZE},
  free_list::{self, FreeIter},
  heap::{FIRST_BLOCK, Heap, PROLOGUE},
  region::Region,
};

/// A broken heap invariant found by [`Heap::check`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Violation {
  #[error("bad prologue {0}")]
  BadPrologue(Tag),
  #[error("block at {0} is not double-word aligned")]
  Misaligned(Offset),
  #[error("block at {offset} has invalid size {size}")]
  BadSize { offset: Offset, size: usize },
  #[error("block at {0} runs past the end of the region")]
  Overrun(Offset),
  #[error("block at {offset}: header {header} does not match footer {footer}")]
  TagMismatch {
    offset: Offset,
    header: Tag,
    footer: Tag,
  },
  #[error("free block at {0} follows another free block")]
  AdjacentFree(Offset),
  #[error("bad epilogue {tag} at {offset}")]
  BadEpilogue { offset: Offset, tag: Tag },
  #[error("free list entry {0} is not a free block")]
  ListedNotFree(Offset),
  #[error("free list entry {0} has an inconsistent prev link")]
  BrokenLink(Offset),
  #[error("free list holds {listed} entries but the region has {free} free blocks")]
  ListMismatch { listed: usize, free: usize },
}

/// One block as seen by an address-order walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockInfo {
  pub offset: Offset,
  pub size: usize,
  pub allocated: bool,
}

impl BlockInfo {
  pub fn payload_size(&self) -> usize {
    self.size - OVERHEAD
  }
}

/// Iterator over the blocks between the prologue and the epilogue.
pub struct Blocks<'a> {
  bytes: &'a [u8],
  bp: usize,
}

impl Iterator for Blocks<'_> {
  type Item = BlockInfo;

  fn next(&mut self) -> Option<BlockInfo> {
    let tag = block::read_tag(self.bytes, block::header_of(self.bp));
    if tag.size == 0 {
      return None;
    }
    let info = BlockInfo {
      offset: Offset(self.bp),
      size: tag.size,
      allocated: tag.allocated,
    };
    self.bp += tag.size;
    Some(info)
  }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct HeapStats {
  pub region_len: usize,
  pub extensions: usize,
  pub allocated_blocks: usize,
  pub allocated_bytes: usize,
  pub free_blocks: usize,
  pub free_bytes: usize,
  pub largest_free: usize,
}

impl<R: Region> Heap<R> {
  pub fn blocks(&self) -> Blocks<'_> {
    Blocks {
      bytes: self.region.bytes(),
      bp: FIRST_BLOCK,
    }
  }

  /// Free blocks in first-fit scan order.
  pub fn free_blocks(&self) -> FreeIter<'_> {
    self.free.iter(self.region.bytes())
  }

  pub fn stats(&self) -> HeapStats {
    let mut stats = HeapStats {
      region_len: self.region_len(),
      extensions: self.extensions(),
      ..HeapStats::default()
    };

    for info in self.blocks() {
      if info.allocated {
        stats.allocated_blocks += 1;
        stats.allocated_bytes += info.size;
      } else {
        stats.free_blocks += 1;
        stats.free_bytes += info.size;
        stats.largest_free = stats.largest_free.max(info.size);
      }
    }
    stats
  }

  /// Walks the region in address order, then the free list, and reports the
  /// first broken invariant. Never repairs anything.
  pub fn check(&self) -> Result<(), Violation> {
    let bytes = self.region.bytes();

    let prologue = block::read_tag(bytes, block::header_of(PROLOGUE));
    if prologue != Tag::allocated(OVERHEAD) || block::read_tag(bytes, PROLOGUE) != prologue {
      return Err(Violation::BadPrologue(prologue));
    }

    let mut bp = FIRST_BLOCK;
    let mut prev_free = false;
    let mut free = 0;
    loop {
      if block::header_of(bp) + WSIZE > bytes.len() {
        return Err(Violation::Overrun(Offset(bp)));
      }
      let header = block::read_tag(bytes, block::header_of(bp));
      if header.size == 0 {
        break;
      }

      let offset = Offset(bp);
      if bp % DSIZE != 0 {
        return Err(Violation::Misaligned(offset));
      }
      if header.size % DSIZE != 0 || header.size < MIN_BLOCK_SIZE {
        return Err(Violation::BadSize {
          offset,
          size: header.size,
        });
      }
      if header.size > bytes.len() - bp {
        return Err(Violation::Overrun(offset));
      }
      let footer = block::read_tag(bytes, bp + header.size - DSIZE);
      if footer != header {
        return Err(Violation::TagMismatch { offset, header, footer });
      }

      if !header.allocated {
        if prev_free {
          return Err(Violation::AdjacentFree(offset));
        }
        free += 1;
      }
      prev_free = !header.allocated;
      bp += header.size;
    }

    let epilogue = block::read_tag(bytes, block::header_of(bp));
    if !epilogue.allocated || bp != bytes.len() {
      return Err(Violation::BadEpilogue {
        offset: Offset(bp),
        tag: epilogue,
      });
    }

    let mut listed = 0;
    let mut prev = None;
    let mut cursor = self.free.head();
    while let Some(bp) = cursor {
      // Also stops a cycle from looping forever.
      if listed == free {
        return Err(Violation::ListMismatch {
          listed: listed + 1,
          free,
        });
      }
      if bp.get() < FIRST_BLOCK || bp.get() % DSIZE != 0 || bp.get() >= bytes.len() {
        return Err(Violation::ListedNotFree(bp));
      }
      if block::read_tag(bytes, block::header_of(bp.get())).allocated {
        return Err(Violation::ListedNotFree(bp));
      }
      if free_list::prev_free(bytes, bp) != prev {
        return Err(Violation::BrokenLink(bp));
      }
      listed += 1;
      prev = Some(bp);
      cursor = free_list::next_free(bytes, bp);
    }

    if listed != free || listed != self.free.len() {
      return Err(Violation::ListMismatch { listed, free });
    }
    Ok(())
  }
}

impl<R: Region> fmt::Display for Heap<R> {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    let bytes = self.region.bytes();
    let link = |link: Option<Offset>| link.map_or_else(|| "-".to_string(), |bp| bp.to_string());

    writeln!(f, "heap ({} bytes), free list head {}", bytes.len(), link(self.free.head()))?;
    for info in self.blocks() {
      let bp = info.offset;
      let header = block::read_tag(bytes, block::header_of(bp.get()));
      let footer = block::read_tag(bytes, block::footer_of(bytes, bp.get()));
      write!(f, "  {bp}: header {header} footer {footer}")?;
      if !info.allocated {
        write!(
          f,
          " next {} prev {}",
          link(free_list::next_free(bytes, bp)),
          link(free_list::prev_free(bytes, bp))
        )?;
      }
      writeln!(f)?;
    }
    write!(f, "  {:#x}: epilogue", bytes.len())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_fresh_heap_is_consistent() {
    let heap = Heap::new().unwrap();

    assert_eq!(heap.check(), Ok(()));
    assert_eq!(
      heap.blocks().collect::<Vec<_>>(),
      vec![BlockInfo {
        offset: Offset(32),
        size: 4096,
        allocated: false,
      }]
    );
  }

  #[test]
  fn test_stats() {
    let mut heap = Heap::new().unwrap();
    let a = heap.allocate(100).unwrap();
    let _b = heap.allocate(8).unwrap();
    heap.free(a).unwrap();

    let stats = heap.stats();

    assert_eq!(stats.region_len, 4128);
    assert_eq!(stats.extensions, 1);
    assert_eq!(stats.allocated_blocks, 1);
    assert_eq!(stats.allocated_bytes, 32);
    assert_eq!(stats.free_blocks, 2);
    assert_eq!(stats.free_bytes, 4096 - 32);
    assert_eq!(stats.largest_free, 4096 - 160);
  }

  #[test]
  fn test_free_blocks_scan_order() {
    let mut heap = Heap::new().unwrap();
    let a = heap.allocate(8).unwrap();
    let _b = heap.allocate(8).unwrap();
    let c = heap.allocate(8).unwrap();
    let _d = heap.allocate(8).unwrap();

    heap.free(a).unwrap();
    heap.free(c).unwrap();

    assert_eq!(heap.free_blocks().collect::<Vec<_>>(), vec![c, a, Offset(160)]);
  }

  #[test]
  fn test_detects_tag_mismatch() {
    let mut heap = Heap::new().unwrap();
    let a = heap.allocate(8).unwrap();

    block::write_tag(heap.region.bytes_mut(), a.get() + 16, Tag::allocated(48));

    assert_eq!(
      heap.check(),
      Err(Violation::TagMismatch {
        offset: a,
        header: Tag::allocated(32),
        footer: Tag::allocated(48),
      })
    );
  }

  #[test]
  fn test_detects_adjacent_free() {
    let mut heap = Heap::new().unwrap();
    let a = heap.allocate(8).unwrap();

    // Mark without coalescing.
    block::write_block(heap.region.bytes_mut(), a.get(), Tag::free(32));

    assert_eq!(heap.check(), Err(Violation::AdjacentFree(Offset(64))));
  }

  #[test]
  fn test_detects_bad_prologue() {
    let mut heap = Heap::new().unwrap();

    block::write_tag(heap.region.bytes_mut(), 8, Tag::free(16));

    assert_eq!(heap.check(), Err(Violation::BadPrologue(Tag::free(16))));
  }

  #[test]
  fn test_detects_unlisted_free_block() {
    let mut heap = Heap::new().unwrap();
    let _a = heap.allocate(8).unwrap();
    let b = heap.allocate(8).unwrap();
    let _c = heap.allocate(8).unwrap();

    block::write_block(heap.region.bytes_mut(), b.get(), Tag::free(32));

    assert_eq!(heap.check(), Err(Violation::ListMismatch { listed: 1, free: 2 }));
  }

  #[test]
  fn test_dump() {
    let mut heap = Heap::new().unwrap();
    let _a = heap.allocate(8).unwrap();

    let dump = heap.to_string();

    assert_eq!(
      dump,
      "heap (4128 bytes), free list head 0x40\n\
       \x20 0x20: header [32:a] footer [32:a]\n\
       \x20 0x40: header [4064:f] footer [4064:f] next - prev -\n\
       \x20 0x1020: epilogue"
    );
  }
}
