//! Explicit free list threaded through the payloads of free blocks.
//!
//! ```text
//!        head
//!         │
//!         ▼
//!   ┌──────────┐      ┌──────────┐      ┌──────────┐
//!   │ hdr      │      │ hdr      │      │ hdr      │
//!   │ next ────┼─────►│ next ────┼─────►│ next: 0  │
//!   │ prev: 0  │◄─────┼──── prev │◄─────┼──── prev │
//!   │ ...      │      │ ...      │      │ ...      │
//!   │ ftr      │      │ ftr      │      │ ftr      │
//!   └──────────┘      └──────────┘      └──────────┘
//! ```
//!
//! The `next` link is stored in the first payload word and `prev` in the
//! second. A stored value of 0 means no link.

use crate::block::{self, Offset, WSIZE};

pub(crate) fn next_free(
  bytes: &[u8],
  bp: Offset,
) -> Option<Offset> {
  read_link(bytes, bp.get())
}

pub(crate) fn prev_free(
  bytes: &[u8],
  bp: Offset,
) -> Option<Offset> {
  read_link(bytes, bp.get() + WSIZE)
}

fn set_next(
  bytes: &mut [u8],
  bp: Offset,
  link: Option<Offset>,
) {
  write_link(bytes, bp.get(), link);
}

fn set_prev(
  bytes: &mut [u8],
  bp: Offset,
  link: Option<Offset>,
) {
  write_link(bytes, bp.get() + WSIZE, link);
}

fn read_link(
  bytes: &[u8],
  at: usize,
) -> Option<Offset> {
  match block::read_word(bytes, at) {
    0 => None,
    bp => Some(Offset(bp)),
  }
}

fn write_link(
  bytes: &mut [u8],
  at: usize,
  link: Option<Offset>,
) {
  block::write_word(bytes, at, link.map_or(0, Offset::get));
}

/// Unordered LIFO list of free blocks. Owns only the head; the links live in
/// the region bytes passed to every operation.
#[derive(Debug, Default)]
pub struct FreeList {
  head: Option<Offset>,
  len: usize,
}

impl FreeList {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn head(&self) -> Option<Offset> {
    self.head
  }

  pub fn len(&self) -> usize {
    self.len
  }

  pub fn is_empty(&self) -> bool {
    self.head.is_none()
  }

  pub fn insert(
    &mut self,
    bytes: &mut [u8],
    bp: Offset,
  ) {
    if let Some(head) = self.head {
      set_prev(bytes, head, Some(bp));
    }
    set_next(bytes, bp, self.head);
    set_prev(bytes, bp, None);
    self.head = Some(bp);
    self.len += 1;
  }

  pub fn remove(
    &mut self,
    bytes: &mut [u8],
    bp: Offset,
  ) {
    let next = next_free(bytes, bp);
    let prev = prev_free(bytes, bp);

    match prev {
      Some(prev) => set_next(bytes, prev, next),
      None => self.head = next,
    }
    if let Some(next) = next {
      set_prev(bytes, next, prev);
    }
    self.len -= 1;
  }

  pub fn iter<'a>(
    &self,
    bytes: &'a [u8],
  ) -> FreeIter<'a> {
    FreeIter {
      bytes,
      cursor: self.head,
    }
  }

  /// First block in list order whose size is at least `asize`.
  pub fn find_fit(
    &self,
    bytes: &[u8],
    asize: usize,
  ) -> Option<Offset> {
    self
      .iter(bytes)
      .find(|bp| block::size_of_block(bytes, bp.get()) >= asize)
  }
}

pub struct FreeIter<'a> {
  bytes: &'a [u8],
  cursor: Option<Offset>,
}

impl Iterator for FreeIter<'_> {
  type Item = Offset;

  fn next(&mut self) -> Option<Offset> {
    let bp = self.cursor?;
    self.cursor = next_free(self.bytes, bp);
    Some(bp)
  }
}
