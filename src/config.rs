use crate::{
  block::{CHUNKSIZE, DSIZE, MIN_BLOCK_SIZE},
  error::HeapError,
};

/// Tunables for a [`Heap`](crate::Heap).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeapConfig {
  /// Minimum number of bytes requested from the region on every miss.
  pub chunk_size: usize,
  /// Upper bound on the region length, `None` for unbounded.
  pub max_region_size: Option<usize>,
}

impl Default for HeapConfig {
  fn default() -> Self {
    Self {
      chunk_size: CHUNKSIZE,
      max_region_size: None,
    }
  }
}

impl HeapConfig {
  pub fn with_chunk_size(
    mut self,
    chunk_size: usize,
  ) -> Self {
    self.chunk_size = chunk_size;
    self
  }

  pub fn with_max_region_size(
    mut self,
    max_region_size: usize,
  ) -> Self {
    self.max_region_size = Some(max_region_size);
    self
  }

  pub fn validate(&self) -> Result<(), HeapError> {
    if self.chunk_size < MIN_BLOCK_SIZE {
      return Err(HeapError::InvalidConfig("chunk size is below the minimum block size"));
    }
    if self.chunk_size % DSIZE != 0 {
      return Err(HeapError::InvalidConfig("chunk size is not double-word aligned"));
    }
    Ok(())
  }
}
