//! Boundary-tag codec.
//!
//! Every block carries a one-word header and a one-word footer holding the
//! block size with the allocated flag packed into the low bit:
//!
//! ```text
//!    63                          4   3   2   1   0
//!   ┌──────────────────────────────┬───┬───┬───┬───┐
//!   │ s  s  s  s  ...  s  s  s  s  │ 0 │ 0 │ 0 │a/f│
//!   └──────────────────────────────┴───┴───┴───┴───┘
//! ```
//!
//! Blocks are addressed by their payload offset (`bp`). The header sits one
//! word before `bp`, the footer one double word before the next block.

use std::fmt;

/// Word size in bytes.
pub const WSIZE: usize = 8;
/// Double-word size in bytes; the alignment unit of every block.
pub const DSIZE: usize = 16;
/// Default region extension granularity in bytes.
pub const CHUNKSIZE: usize = 1 << 12;
/// Header plus footer.
pub const OVERHEAD: usize = 16;
/// Smallest block that can hold both free-list links.
pub const MIN_BLOCK_SIZE: usize = DSIZE + OVERHEAD;

/// Payload offset of a block inside the region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Offset(pub(crate) usize);

impl Offset {
  pub const fn new(offset: usize) -> Self {
    Self(offset)
  }

  pub const fn get(self) -> usize {
    self.0
  }
}

impl fmt::Display for Offset {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    write!(f, "{:#x}", self.0)
  }
}

/// Decoded header or footer word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tag {
  pub size: usize,
  pub allocated: bool,
}

impl Tag {
  pub const fn new(
    size: usize,
    allocated: bool,
  ) -> Self {
    Self { size, allocated }
  }

  pub const fn allocated(size: usize) -> Self {
    Self::new(size, true)
  }

  pub const fn free(size: usize) -> Self {
    Self::new(size, false)
  }

  pub const fn pack(self) -> usize {
    self.size | self.allocated as usize
  }

  pub const fn unpack(word: usize) -> Self {
    Self {
      size: word & !0xf,
      allocated: word & 0x1 == 1,
    }
  }
}

impl fmt::Display for Tag {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    write!(f, "[{}:{}]", self.size, if self.allocated { 'a' } else { 'f' })
  }
}

pub fn read_word(
  bytes: &[u8],
  at: usize,
) -> usize {
  let mut word = [0u8; WSIZE];
  word.copy_from_slice(&bytes[at..at + WSIZE]);
  usize::from_ne_bytes(word)
}

pub fn write_word(
  bytes: &mut [u8],
  at: usize,
  value: usize,
) {
  bytes[at..at + WSIZE].copy_from_slice(&value.to_ne_bytes());
}

pub fn read_tag(
  bytes: &[u8],
  at: usize,
) -> Tag {
  Tag::unpack(read_word(bytes, at))
}

pub fn write_tag(
  bytes: &mut [u8],
  at: usize,
  tag: Tag,
) {
  write_word(bytes, at, tag.pack());
}

pub const fn header_of(bp: usize) -> usize {
  bp - WSIZE
}

/// Valid only while the header of `bp` holds the block's size.
pub fn footer_of(
  bytes: &[u8],
  bp: usize,
) -> usize {
  bp + size_of_block(bytes, bp) - DSIZE
}

pub fn size_of_block(
  bytes: &[u8],
  bp: usize,
) -> usize {
  read_tag(bytes, header_of(bp)).size
}

pub fn next_block(
  bytes: &[u8],
  bp: usize,
) -> usize {
  bp + size_of_block(bytes, bp)
}

/// The word before our header is the previous block's footer.
pub fn prev_block(
  bytes: &[u8],
  bp: usize,
) -> usize {
  bp - read_tag(bytes, bp - DSIZE).size
}

/// Writes `tag` to both ends of the block at `bp`.
pub fn write_block(
  bytes: &mut [u8],
  bp: usize,
  tag: Tag,
) {
  write_tag(bytes, header_of(bp), tag);
  write_tag(bytes, bp + tag.size - DSIZE, tag);
}
