use std::io;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum HeapError {
  /// The backing provider refused to grow the region.
  #[error("cannot grow region of {len} bytes by {requested} bytes")]
  RegionExhausted { requested: usize, len: usize },
  #[error("request of {0} bytes overflows the block size")]
  RequestTooLarge(usize),
  #[error("offset {0:#x} does not name an allocated block")]
  InvalidOffset(usize),
  #[error("invalid configuration: {0}")]
  InvalidConfig(&'static str),
  #[error("region must be empty before initialization, found {0} bytes")]
  RegionNotEmpty(usize),
  #[error("os refused region operation: {0}")]
  Os(#[from] io::Error),
}
