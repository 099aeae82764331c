use log::{debug, trace, warn};

use crate::{
  block::{self, DSIZE, MIN_BLOCK_SIZE, OVERHEAD, Offset, Tag, WSIZE},
  config::HeapConfig,
  error::HeapError,
  free_list::FreeList,
  region::{Region, VecRegion},
};

/// Payload offset of the prologue block.
pub(crate) const PROLOGUE: usize = DSIZE;
/// Payload offset of the first block after the prologue.
pub(crate) const FIRST_BLOCK: usize = 2 * DSIZE;

/// Explicit free-list allocator over a single growable region.
///
/// All state lives here: the region, the free-list head and the
/// configuration. Independent heaps never share anything.
pub struct Heap<R: Region = VecRegion> {
  pub(crate) region: R,
  pub(crate) free: FreeList,
  config: HeapConfig,
  extensions: usize,
}

impl Heap<VecRegion> {
  pub fn new() -> Result<Self, HeapError> {
    Self::with_config(HeapConfig::default())
  }

  pub fn with_config(config: HeapConfig) -> Result<Self, HeapError> {
    let region = match config.max_region_size {
      Some(limit) => VecRegion::with_limit(limit),
      None => VecRegion::new(),
    };
    Self::init(region, config)
  }
}

impl<R: Region> Heap<R> {
  /// Lays out the sentinels in an empty `region` and extends it by one chunk.
  ///
  /// ```text
  ///   0        8          16         24         32
  ///   ├────────┼──────────┼──────────┼──────────┤
  ///   │  pad   │ hdr 16:a │ ftr 16:a │ hdr 0:a  │
  ///   └────────┴──────────┴──────────┴──────────┘
  ///            │      prologue       │ epilogue │
  /// ```
  pub fn init(
    mut region: R,
    config: HeapConfig,
  ) -> Result<Self, HeapError> {
    config.validate()?;
    if !region.is_empty() {
      return Err(HeapError::RegionNotEmpty(region.len()));
    }

    let start = region.extend(4 * WSIZE)?.start;
    let bytes = region.bytes_mut();
    block::write_word(bytes, start, 0);
    block::write_block(bytes, start + PROLOGUE, Tag::allocated(OVERHEAD));
    block::write_tag(bytes, start + WSIZE + DSIZE, Tag::allocated(0));

    let mut heap = Self {
      region,
      free: FreeList::new(),
      config,
      extensions: 0,
    };
    heap.extend_heap(config.chunk_size)?;

    debug!(
      "initialized heap with {} bytes (chunk size {})",
      heap.region.len(),
      config.chunk_size
    );
    Ok(heap)
  }

  pub fn config(&self) -> &HeapConfig {
    &self.config
  }

  pub fn region(&self) -> &R {
    &self.region
  }

  pub fn region_len(&self) -> usize {
    self.region.len()
  }

  pub fn free_list_len(&self) -> usize {
    self.free.len()
  }

  /// Number of times the region has been grown, including the initial chunk.
  pub fn extensions(&self) -> usize {
    self.extensions
  }

  /// Allocates at least `size` payload bytes. Returns `None` for a zero-size
  /// request or when the region cannot grow.
  pub fn allocate(
    &mut self,
    size: usize,
  ) -> Option<Offset> {
    self.try_allocate(size).unwrap_or_else(|err| {
      warn!("allocation of {size} bytes failed: {err}");
      None
    })
  }

  pub fn try_allocate(
    &mut self,
    size: usize,
  ) -> Result<Option<Offset>, HeapError> {
    if size == 0 {
      return Ok(None);
    }
    let asize = adjusted_size(size).ok_or(HeapError::RequestTooLarge(size))?;

    if let Some(bp) = self.free.find_fit(self.region.bytes(), asize) {
      self.place(bp, asize);
      return Ok(Some(bp));
    }

    let bp = self.extend_heap(asize.max(self.config.chunk_size))?;
    self.place(bp, asize);
    Ok(Some(bp))
  }

  /// Releases the block at `offset` and merges it with free neighbors.
  pub fn free(
    &mut self,
    offset: Offset,
  ) -> Result<(), HeapError> {
    let size = self.allocated_size(offset)?;

    block::write_block(self.region.bytes_mut(), offset.get(), Tag::free(size));
    trace!("freed {size} bytes at {offset}");
    self.coalesce(offset);
    Ok(())
  }

  /// Resizes the block at `offset`, keeping the first `min(old, new)` payload
  /// bytes. Returns `None` after a zero-size request (the block is freed) or
  /// on failure (the block is left untouched).
  pub fn reallocate(
    &mut self,
    offset: Offset,
    size: usize,
  ) -> Option<Offset> {
    self.try_reallocate(offset, size).unwrap_or_else(|err| {
      warn!("reallocation of {offset} to {size} bytes failed: {err}");
      None
    })
  }

  pub fn try_reallocate(
    &mut self,
    offset: Offset,
    size: usize,
  ) -> Result<Option<Offset>, HeapError> {
    let old_size = self.allocated_size(offset)?;
    if size == 0 {
      self.free(offset)?;
      return Ok(None);
    }
    let asize = adjusted_size(size).ok_or(HeapError::RequestTooLarge(size))?;

    if asize <= old_size {
      self.shrink(offset, old_size, asize);
      return Ok(Some(offset));
    }

    let bp = offset.get();
    let next_bp = block::next_block(self.region.bytes(), bp);
    let mut next = block::read_tag(self.region.bytes(), block::header_of(next_bp));
    if next.size == 0 {
      // Last block: grow the region underneath it instead of moving.
      let missing = asize - old_size;
      if self.extend_heap(missing.max(self.config.chunk_size)).is_ok() {
        next = block::read_tag(self.region.bytes(), block::header_of(next_bp));
      }
    }

    if !next.allocated && old_size + next.size >= asize {
      let bytes = self.region.bytes_mut();
      self.free.remove(bytes, Offset(next_bp));
      let merged = old_size + next.size;
      block::write_block(bytes, bp, Tag::allocated(merged));
      trace!("grew {offset} in place from {old_size} to {merged} bytes");
      self.shrink(offset, merged, asize);
      return Ok(Some(offset));
    }

    let Some(moved) = self.try_allocate(size)? else {
      return Ok(None);
    };
    let payload = old_size - OVERHEAD;
    self
      .region
      .bytes_mut()
      .copy_within(bp..bp + payload, moved.get());
    trace!("moved {payload} bytes from {offset} to {moved}");
    self.free(offset)?;
    Ok(Some(moved))
  }

  pub fn payload(
    &self,
    offset: Offset,
  ) -> Result<&[u8], HeapError> {
    let size = self.allocated_size(offset)?;
    let bp = offset.get();
    Ok(&self.region.bytes()[bp..bp + size - OVERHEAD])
  }

  pub fn payload_mut(
    &mut self,
    offset: Offset,
  ) -> Result<&mut [u8], HeapError> {
    let size = self.allocated_size(offset)?;
    let bp = offset.get();
    Ok(&mut self.region.bytes_mut()[bp..bp + size - OVERHEAD])
  }

  /// Size of the allocated block at `offset`, or `InvalidOffset` when the
  /// tags there do not describe one.
  fn allocated_size(
    &self,
    offset: Offset,
  ) -> Result<usize, HeapError> {
    let bytes = self.region.bytes();
    let bp = offset.get();
    let invalid = HeapError::InvalidOffset(bp);

    if bp < FIRST_BLOCK || bp % DSIZE != 0 || bp >= bytes.len() {
      return Err(invalid);
    }
    let header = block::read_tag(bytes, block::header_of(bp));
    if !header.allocated
      || header.size < MIN_BLOCK_SIZE
      || header.size % DSIZE != 0
      || header.size > bytes.len() - bp
    {
      return Err(invalid);
    }
    if block::read_tag(bytes, bp + header.size - DSIZE) != header {
      return Err(invalid);
    }
    Ok(header.size)
  }

  /// Grows the region by at least `requested` bytes and returns the new free
  /// block, already merged with a free predecessor.
  fn extend_heap(
    &mut self,
    requested: usize,
  ) -> Result<Offset, HeapError> {
    let grown = self.region.extend(requested)?;
    let bp = grown.start;
    let size = grown.len();

    // The old epilogue header becomes the new block's header.
    let bytes = self.region.bytes_mut();
    block::write_block(bytes, bp, Tag::free(size));
    block::write_tag(bytes, block::header_of(bp + size), Tag::allocated(0));
    self.extensions += 1;

    debug!("extended region by {size} bytes to {}", self.region.len());
    Ok(self.coalesce(Offset(bp)))
  }

  /// Carves an `asize` block out of the free block at `bp`.
  fn place(
    &mut self,
    bp: Offset,
    asize: usize,
  ) {
    let bytes = self.region.bytes_mut();
    let size = block::size_of_block(bytes, bp.get());
    self.free.remove(bytes, bp);

    let remainder = size - asize;
    if remainder < MIN_BLOCK_SIZE {
      block::write_block(bytes, bp.get(), Tag::allocated(size));
      trace!("placed {size} bytes at {bp}");
      return;
    }

    block::write_block(bytes, bp.get(), Tag::allocated(asize));
    let rest = Offset(bp.get() + asize);
    block::write_block(bytes, rest.get(), Tag::free(remainder));
    self.free.insert(bytes, rest);
    trace!("placed {asize} bytes at {bp}, split {remainder} bytes at {rest}");
  }

  /// Trims the allocated block at `bp` from `size` down to `asize`, releasing
  /// the tail when it is large enough to stand alone.
  fn shrink(
    &mut self,
    bp: Offset,
    size: usize,
    asize: usize,
  ) {
    let remainder = size - asize;
    if remainder < MIN_BLOCK_SIZE {
      return;
    }

    let bytes = self.region.bytes_mut();
    block::write_block(bytes, bp.get(), Tag::allocated(asize));
    let rest = Offset(bp.get() + asize);
    block::write_block(bytes, rest.get(), Tag::free(remainder));
    trace!("shrank {bp} to {asize} bytes, releasing {remainder} bytes");
    self.coalesce(rest);
  }
}

/// Block size for a `size`-byte request: payload rounded to the alignment
/// unit plus header and footer, never below the minimum block.
pub(crate) fn adjusted_size(size: usize) -> Option<usize> {
  if size <= DSIZE {
    return Some(MIN_BLOCK_SIZE);
  }
  size
    .checked_add(OVERHEAD + DSIZE - 1)
    .map(|value| value & !(DSIZE - 1))
}
