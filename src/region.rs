//! Backing providers for the managed region.
//!
//! A region is a single contiguous span of bytes that only ever grows at its
//! high end. The heap addresses it purely by offset, so a provider is free to
//! move its storage (as [`VecRegion`] does) between calls.

use std::ops::Range;

use crate::{block::DSIZE, error::HeapError};

pub trait Region {
  /// Current length in bytes.
  fn len(&self) -> usize;

  fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Largest length the region can reach, if bounded.
  fn limit(&self) -> Option<usize>;

  fn bytes(&self) -> &[u8];

  fn bytes_mut(&mut self) -> &mut [u8];

  /// Appends exactly `bytes` bytes and returns the new range.
  fn grow(
    &mut self,
    bytes: usize,
  ) -> Result<Range<usize>, HeapError>;

  /// Appends at least `requested` bytes, rounded up so the region length
  /// stays double-word aligned.
  fn extend(
    &mut self,
    requested: usize,
  ) -> Result<Range<usize>, HeapError> {
    let bytes = requested
      .checked_add(DSIZE - 1)
      .map(|value| value & !(DSIZE - 1))
      .ok_or(HeapError::RegionExhausted {
        requested,
        len: self.len(),
      })?;
    self.grow(bytes)
  }
}

/// Region backed by an owned, zero-filled `Vec<u8>`.
#[derive(Debug, Default)]
pub struct VecRegion {
  buf: Vec<u8>,
  limit: Option<usize>,
}

impl VecRegion {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_limit(limit: usize) -> Self {
    Self {
      buf: Vec::new(),
      limit: Some(limit),
    }
  }
}

impl Region for VecRegion {
  fn len(&self) -> usize {
    self.buf.len()
  }

  fn limit(&self) -> Option<usize> {
    self.limit
  }

  fn bytes(&self) -> &[u8] {
    &self.buf
  }

  fn bytes_mut(&mut self) -> &mut [u8] {
    &mut self.buf
  }

  fn grow(
    &mut self,
    bytes: usize,
  ) -> Result<Range<usize>, HeapError> {
    let start = self.buf.len();
    let exhausted = HeapError::RegionExhausted {
      requested: bytes,
      len: start,
    };

    let end = match start.checked_add(bytes) {
      Some(end) if self.limit.is_none_or(|limit| end <= limit) => end,
      _ => return Err(exhausted),
    };
    if self.buf.try_reserve(bytes).is_err() {
      return Err(exhausted);
    }

    self.buf.resize(end, 0);
    Ok(start..end)
  }
}

#[cfg(unix)]
pub use self::mmap::MmapRegion;

#[cfg(unix)]
mod mmap {
  use std::{io, ops::Range, ptr::NonNull, slice};

  use libc::{MAP_ANONYMOUS, MAP_FAILED, MAP_PRIVATE, PROT_NONE, PROT_READ, PROT_WRITE, c_void};
  use log::debug;

  use super::Region;
  use crate::{align_to, error::HeapError};

  /// Region carved out of a fixed virtual reservation.
  ///
  /// ```text
  ///   base                     len        committed              capacity
  ///   ├────────────────────────┼──────────┼──────────────────────────┤
  ///   │        in use          │ readable │   PROT_NONE (reserved)   │
  ///   └────────────────────────┴──────────┴──────────────────────────┘
  /// ```
  ///
  /// The whole range is mapped inaccessible up front and pages are made
  /// readable and writable as the region grows, so the base address never
  /// moves. Growing past the reservation fails like a refused `sbrk`.
  pub struct MmapRegion {
    base: NonNull<u8>,
    len: usize,
    committed: usize,
    capacity: usize,
    page_size: usize,
  }

  impl MmapRegion {
    /// Reserves `capacity` bytes of address space, rounded up to whole pages.
    pub fn reserve(capacity: usize) -> Result<Self, HeapError> {
      let page_size = page_size();
      if capacity == 0 || capacity > usize::MAX - page_size {
        return Err(HeapError::InvalidConfig("reservation must be non-empty and page-sized"));
      }
      let capacity = align_to!(capacity, page_size);

      let addr = unsafe {
        libc::mmap(
          std::ptr::null_mut(),
          capacity,
          PROT_NONE,
          MAP_PRIVATE | MAP_ANONYMOUS,
          -1,
          0,
        )
      };
      if addr == MAP_FAILED {
        return Err(io::Error::last_os_error().into());
      }
      let base = NonNull::new(addr as *mut u8).ok_or(HeapError::InvalidConfig("mmap returned null"))?;

      debug!("reserved {capacity} bytes at {base:?}");
      Ok(Self {
        base,
        len: 0,
        committed: 0,
        capacity,
        page_size,
      })
    }

    /// Bytes currently readable and writable.
    pub fn committed(&self) -> usize {
      self.committed
    }
  }

  impl Region for MmapRegion {
    fn len(&self) -> usize {
      self.len
    }

    fn limit(&self) -> Option<usize> {
      Some(self.capacity)
    }

    fn bytes(&self) -> &[u8] {
      unsafe { slice::from_raw_parts(self.base.as_ptr(), self.len) }
    }

    fn bytes_mut(&mut self) -> &mut [u8] {
      unsafe { slice::from_raw_parts_mut(self.base.as_ptr(), self.len) }
    }

    fn grow(
      &mut self,
      bytes: usize,
    ) -> Result<Range<usize>, HeapError> {
      let start = self.len;
      let end = match start.checked_add(bytes) {
        Some(end) if end <= self.capacity => end,
        _ => {
          return Err(HeapError::RegionExhausted {
            requested: bytes,
            len: start,
          });
        }
      };

      if end > self.committed {
        let commit = align_to!(end, self.page_size).min(self.capacity);
        let rc = unsafe {
          libc::mprotect(
            self.base.as_ptr().add(self.committed) as *mut c_void,
            commit - self.committed,
            PROT_READ | PROT_WRITE,
          )
        };
        if rc != 0 {
          return Err(io::Error::last_os_error().into());
        }
        self.committed = commit;
      }

      self.len = end;
      Ok(start..end)
    }
  }

  impl Drop for MmapRegion {
    fn drop(&mut self) {
      unsafe {
        libc::munmap(self.base.as_ptr() as *mut c_void, self.capacity);
      }
    }
  }

  fn page_size() -> usize {
    match unsafe { libc::sysconf(libc::_SC_PAGESIZE) } {
      size if size > 0 => size as usize,
      _ => 4096,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_vec_region_grows() {
    let mut region = VecRegion::new();

    assert!(region.is_empty());
    assert_eq!(region.extend(32).unwrap(), 0..32);
    assert_eq!(region.extend(4096).unwrap(), 32..4128);
    assert_eq!(region.len(), 4128);
    assert!(region.bytes()[32..].iter().all(|byte| *byte == 0));
  }

  #[test]
  fn test_extend_rounds_to_double_word() {
    let mut region = VecRegion::new();

    assert_eq!(region.extend(1).unwrap(), 0..16);
    assert_eq!(region.extend(17).unwrap(), 16..48);
    assert_eq!(region.len() % DSIZE, 0);
  }

  #[test]
  fn test_vec_region_limit() {
    let mut region = VecRegion::with_limit(64);

    region.extend(48).unwrap();
    let err = region.extend(32).unwrap_err();

    assert!(matches!(err, HeapError::RegionExhausted { requested: 32, len: 48 }));
    assert_eq!(region.len(), 48);
    assert!(region.extend(16).is_ok());
  }

  #[test]
  fn test_extend_overflow_is_exhaustion() {
    let mut region = VecRegion::new();

    assert!(matches!(region.extend(usize::MAX), Err(HeapError::RegionExhausted { .. })));
  }

  #[cfg(unix)]
  #[test]
  fn test_mmap_region() {
    let mut region = MmapRegion::reserve(3 * 4096).unwrap();

    assert_eq!(region.extend(32).unwrap(), 0..32);
    region.bytes_mut()[31] = 7;
    assert!(region.committed() >= 32);

    let grown = region.extend(4096).unwrap();
    region.bytes_mut()[grown.end - 1] = 9;

    assert_eq!(region.bytes()[31], 7);
    assert_eq!(region.bytes()[4127], 9);
    assert_eq!(region.len(), 4128);
  }

  #[cfg(unix)]
  #[test]
  fn test_mmap_region_exhausted() {
    let mut region = MmapRegion::reserve(1).unwrap();
    let capacity = region.limit().unwrap();

    region.extend(capacity).unwrap();

    assert!(matches!(region.extend(16), Err(HeapError::RegionExhausted { .. })));
    assert_eq!(region.len(), capacity);
  }
}
