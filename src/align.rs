/// Rounds `value` up to the next multiple of `unit`, which must be a power of two.
///
/// # Examples
///
/// ```rust
/// use tagheap::align_to;
///
/// assert_eq!(align_to!(13, 8), 16);
/// assert_eq!(align_to!(4097, 4096), 8192);
/// ```
#[macro_export]
macro_rules! align_to {
  ($value:expr, $unit:expr) => {
    ($value + $unit - 1) & !($unit - 1)
  };
}

/// Rounds `value` up to the double-word alignment unit (16 bytes).
///
/// # Examples
///
/// ```rust
/// use tagheap::align;
///
/// assert_eq!(align!(13), 16);
/// assert_eq!(align!(32), 32);
/// ```
#[macro_export]
macro_rules! align {
  ($value:expr) => {
    $crate::align_to!($value, $crate::block::DSIZE)
  };
}

#[cfg(test)]
mod tests {
  use crate::block::DSIZE;

  #[test]
  fn test_align() {
    let mut alignments = Vec::new();

    for i in 0..10 {
      let sizes = (DSIZE * i + 1)..=(DSIZE * (i + 1));

      let expected_alignment = DSIZE * (i + 1);

      alignments.push((sizes, expected_alignment));
    }

    for (sizes, expected) in alignments {
      for size in sizes {
        assert_eq!(expected, align!(size));
      }
    }
  }

  #[test]
  fn test_align_to_page() {
    assert_eq!(align_to!(0usize, 4096usize), 0);
    assert_eq!(align_to!(1usize, 4096usize), 4096);
    assert_eq!(align_to!(4096usize, 4096usize), 4096);
    assert_eq!(align_to!(4128usize, 4096usize), 8192);
  }
}
