//! Block header encoding.
//!
//! Every block, free or allocated, starts with a single 64-bit header word.
//! Payload sizes are always multiples of [`ALIGNMENT`], so the three low bits
//! of the word are free to carry the housekeeping flags:
//!
//! ```text
//!   63                                          3   2   1   0
//!   ┌───────────────────────────────────────────┬───┬───┬───┐
//!   │               payload_size                │ M │ P │ F │
//!   └───────────────────────────────────────────┴───┴───┴───┘
//!
//!   F  this block is free
//!   P  previous block is free and has a footer
//!   M  previous block is free and exactly ALIGNMENT bytes (no footer)
//! ```

/// Payload sizes and addresses are multiples of this.
pub const ALIGNMENT: usize = 8;

/// Bytes occupied by a block header.
pub const HEADER_SIZE: usize = 8;

/// Largest request the allocator accepts, in bytes.
pub const MAX_REQUEST: usize = 1 << 30;

/// Smallest leftover worth splitting off as its own free block.
pub(crate) const MIN_SPLIT: usize = HEADER_SIZE + ALIGNMENT;

const FREE_BIT: u8 = 0b001;
const PREV_FREE_BIT: u8 = 0b010;
const PREV_MINIMUM_BIT: u8 = 0b100;
const FLAG_MASK: u64 = 0b111;

/// What a block knows about its physical predecessor.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PrevBlock {
  /// Allocated, or there is no predecessor.
  Allocated,
  /// Free, and its last link slot holds a footer pointing at its header.
  Free,
  /// Free with a payload of exactly [`ALIGNMENT`] bytes. It has no room for a
  /// footer and sits at a fixed offset before this header.
  FreeMinimum,
}

impl PrevBlock {
  /// The state a free block with `payload_size` advertises to its successor.
  pub fn for_free(payload_size: usize) -> Self {
    if payload_size == ALIGNMENT {
      PrevBlock::FreeMinimum
    } else {
      PrevBlock::Free
    }
  }

  pub fn is_free(self) -> bool {
    self != PrevBlock::Allocated
  }
}

/// The housekeeping flags of a header.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub struct Housekeeping(u8);

impl Housekeeping {
  pub fn new(
    is_free: bool,
    prev: PrevBlock,
  ) -> Self {
    let mut flags = Housekeeping(0);
    flags.set_free(is_free);
    flags.set_prev(prev);
    flags
  }

  pub fn is_free(self) -> bool {
    self.0 & FREE_BIT != 0
  }

  pub fn previous_is_free(self) -> bool {
    self.0 & PREV_FREE_BIT != 0
  }

  pub fn previous_is_minimum_size(self) -> bool {
    self.0 & PREV_MINIMUM_BIT != 0
  }

  pub fn prev(self) -> PrevBlock {
    if self.previous_is_free() {
      PrevBlock::Free
    } else if self.previous_is_minimum_size() {
      PrevBlock::FreeMinimum
    } else {
      PrevBlock::Allocated
    }
  }

  pub fn set_free(
    &mut self,
    is_free: bool,
  ) {
    if is_free {
      self.0 |= FREE_BIT;
    } else {
      self.0 &= !FREE_BIT;
    }
  }

  /// The only way the previous-block bits change, so at most one is ever set.
  pub fn set_prev(
    &mut self,
    prev: PrevBlock,
  ) {
    self.0 &= !(PREV_FREE_BIT | PREV_MINIMUM_BIT);
    self.0 |= match prev {
      PrevBlock::Allocated => 0,
      PrevBlock::Free => PREV_FREE_BIT,
      PrevBlock::FreeMinimum => PREV_MINIMUM_BIT,
    };
  }

  pub fn bits(self) -> u8 {
    self.0
  }
}

/// A decoded header word.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Header {
  pub payload_size: usize,
  pub housekeeping: Housekeeping,
}

impl Header {
  pub fn new(
    payload_size: usize,
    housekeeping: Housekeeping,
  ) -> Self {
    debug_assert_eq!(payload_size % ALIGNMENT, 0);
    Self {
      payload_size,
      housekeeping,
    }
  }

  pub fn decode(word: u64) -> Self {
    Self {
      payload_size: (word & !FLAG_MASK) as usize,
      housekeeping: Housekeeping((word & FLAG_MASK) as u8),
    }
  }

  pub fn encode(self) -> u64 {
    self.payload_size as u64 | u64::from(self.housekeeping.bits())
  }

  pub fn is_free(self) -> bool {
    self.housekeeping.is_free()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_header_word() {
    let flags = Housekeeping::new(true, PrevBlock::FreeMinimum);
    let header = Header::new(4096, flags);
    let word = header.encode();

    assert_eq!(word & !FLAG_MASK, 4096);
    assert_eq!(Header::decode(word), header);
    assert!(Header::decode(word).is_free());
    assert_eq!(Header::decode(word).housekeeping.prev(), PrevBlock::FreeMinimum);
  }

  #[test]
  fn test_prev_flags_are_exclusive() {
    let mut flags = Housekeeping::new(false, PrevBlock::Free);
    assert!(flags.previous_is_free());
    assert!(!flags.previous_is_minimum_size());

    flags.set_prev(PrevBlock::FreeMinimum);
    assert!(!flags.previous_is_free());
    assert!(flags.previous_is_minimum_size());

    flags.set_prev(PrevBlock::Allocated);
    assert_eq!(flags.prev(), PrevBlock::Allocated);
    assert!(!flags.is_free());
  }

  #[test]
  fn test_set_free_keeps_prev() {
    let mut flags = Housekeeping::new(false, PrevBlock::Free);
    flags.set_free(true);

    assert!(flags.is_free());
    assert_eq!(flags.prev(), PrevBlock::Free);

    flags.set_free(false);
    assert!(!flags.is_free());
    assert_eq!(flags.prev(), PrevBlock::Free);
  }

  #[test]
  fn test_prev_for_free_size() {
    assert_eq!(PrevBlock::for_free(ALIGNMENT), PrevBlock::FreeMinimum);
    assert_eq!(PrevBlock::for_free(2 * ALIGNMENT), PrevBlock::Free);
    assert!(PrevBlock::for_free(ALIGNMENT).is_free());
    assert!(!PrevBlock::Allocated.is_free());
  }
}
