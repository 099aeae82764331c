//! Boundary-tag coalescing.
//!
//! ```text
//!   before:  │ prev: free │ bp: free (new) │ next: free │
//!   after:   │           one free block                 │
//!            ▲
//!            └── keeps prev's free-list entry
//! ```

use log::trace;

use crate::{
  block::{self, Offset, Tag},
  heap::Heap,
  region::Region,
};

impl<R: Region> Heap<R> {
  /// Merges the free block at `bp` with its free physical neighbors and
  /// returns the resulting block, which is on the free list exactly once.
  pub(crate) fn coalesce(
    &mut self,
    bp: Offset,
  ) -> Offset {
    let bytes = self.region.bytes_mut();
    let mut start = bp.get();
    let mut size = block::size_of_block(bytes, start);
    let mut listed = false;

    let prev = block::prev_block(bytes, start);
    let prev_tag = block::read_tag(bytes, block::header_of(prev));
    if !prev_tag.allocated {
      start = prev;
      size += prev_tag.size;
      listed = true;
    }

    let next = start + size;
    let next_tag = block::read_tag(bytes, block::header_of(next));
    if !next_tag.allocated {
      self.free.remove(bytes, Offset(next));
      size += next_tag.size;
    }

    block::write_block(bytes, start, Tag::free(size));
    let merged = Offset(start);
    if !listed {
      self.free.insert(bytes, merged);
    }

    trace!("coalesced {bp} into {size} bytes at {merged}");
    merged
  }
}
