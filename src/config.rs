use crate::{ALIGNMENT, AllocError};

/// Tuning knobs for an [`Allocator`](crate::Allocator).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ArenaConfig {
  /// The minimum number of pages claimed by the first arena growth. A larger
  /// first claim amortizes the cost of talking to the page source.
  pub initial_pages: usize,
  /// Freed blocks smaller than this are pushed at the small end of the free
  /// list, the rest at the big end. Requests use the same threshold to pick
  /// which end the first-fit search starts from.
  pub split_threshold: usize,
  /// Bytes of address space reserved up front by [`MmapPages`](crate::MmapPages).
  /// This bounds how far the arena can grow.
  pub reserve_bytes: usize,
}

pub const DEFAULT_INITIAL_PAGES: usize = 41;
pub const DEFAULT_SPLIT_THRESHOLD: usize = 10_000;

#[cfg(target_pointer_width = "64")]
pub const DEFAULT_RESERVE_BYTES: usize = 1 << 32;
#[cfg(not(target_pointer_width = "64"))]
pub const DEFAULT_RESERVE_BYTES: usize = 1 << 30;

/// Free-list links are 32-bit indices of 8-byte granules.
#[cfg(target_pointer_width = "64")]
pub const MAX_ARENA_BYTES: usize = u32::MAX as usize * ALIGNMENT;
#[cfg(not(target_pointer_width = "64"))]
pub const MAX_ARENA_BYTES: usize = usize::MAX;

impl Default for ArenaConfig {
  fn default() -> Self {
    ArenaConfig {
      initial_pages: DEFAULT_INITIAL_PAGES,
      split_threshold: DEFAULT_SPLIT_THRESHOLD,
      reserve_bytes: DEFAULT_RESERVE_BYTES,
    }
  }
}

impl ArenaConfig {
  pub fn validate(&self) -> Result<(), AllocError> {
    if self.initial_pages == 0 {
      return Err(AllocError::BadConfig("initial_pages must be non-zero"));
    }
    if self.split_threshold == 0 {
      return Err(AllocError::BadConfig("split_threshold must be non-zero"));
    }
    if self.reserve_bytes == 0 {
      return Err(AllocError::BadConfig("reserve_bytes must be non-zero"));
    }
    if self.reserve_bytes > MAX_ARENA_BYTES {
      return Err(AllocError::BadConfig("reserve_bytes exceeds the addressable arena"));
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_default_is_valid() {
    let config = ArenaConfig::default();

    assert_eq!(config.initial_pages, 41);
    assert_eq!(config.split_threshold, 10_000);
    assert!(config.validate().is_ok());
  }

  #[test]
  fn test_rejects_bad_values() {
    let mut config = ArenaConfig::default();
    config.initial_pages = 0;
    assert!(matches!(config.validate(), Err(AllocError::BadConfig(_))));

    let mut config = ArenaConfig::default();
    config.split_threshold = 0;
    assert!(matches!(config.validate(), Err(AllocError::BadConfig(_))));

    let mut config = ArenaConfig::default();
    config.reserve_bytes = MAX_ARENA_BYTES + 1;
    assert!(matches!(config.validate(), Err(AllocError::BadConfig(_))));
  }
}
