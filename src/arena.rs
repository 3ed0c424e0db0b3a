//! Offset arithmetic and typed views over the claimed arena bytes.
//!
//! The allocator never holds pointers into the arena. Blocks are named by the
//! byte offset of their header from the arena base, and every read or write of
//! a header word, free-list link or footer goes through [`Arena`].

use std::ptr::NonNull;

use crate::block::{ALIGNMENT, HEADER_SIZE, Header, PrevBlock};

/// Byte offset from the arena base.
pub(crate) type Offset = usize;

/// Bytes occupied by one free-list link or footer.
pub(crate) const LINK_SIZE: usize = 4;

const NIL: u32 = u32::MAX;

pub(crate) struct Arena {
  base: NonNull<u8>,
  bound: usize,
}

impl Arena {
  pub fn new(base: NonNull<u8>) -> Self {
    Self { base, bound: 0 }
  }

  /// One past the last claimed byte, as an offset.
  pub fn bound(&self) -> usize {
    self.bound
  }

  pub fn extend_bound(
    &mut self,
    bytes: usize,
  ) {
    self.bound += bytes;
  }

  pub fn ptr(
    &self,
    offset: Offset,
  ) -> NonNull<u8> {
    debug_assert!(offset <= self.bound);
    unsafe { self.base.add(offset) }
  }

  /// The offset of `ptr`, if it points into the claimed bytes.
  pub fn offset_of(
    &self,
    ptr: NonNull<u8>,
  ) -> Option<Offset> {
    let addr = ptr.as_ptr() as usize;
    let base = self.base.as_ptr() as usize;

    if addr < base || addr - base >= self.bound {
      return None;
    }

    Some(addr - base)
  }

  pub fn payload(block: Offset) -> Offset {
    block + HEADER_SIZE
  }

  pub fn header(
    &self,
    block: Offset,
  ) -> Header {
    debug_assert!(block % ALIGNMENT == 0 && block + HEADER_SIZE <= self.bound);
    let word = unsafe { self.base.add(block).cast::<u64>().read() };
    Header::decode(word)
  }

  pub fn set_header(
    &mut self,
    block: Offset,
    header: Header,
  ) {
    debug_assert!(block % ALIGNMENT == 0 && block + HEADER_SIZE <= self.bound);
    unsafe { self.base.add(block).cast::<u64>().write(header.encode()) };
  }

  pub fn update(
    &mut self,
    block: Offset,
    f: impl FnOnce(&mut Header),
  ) {
    let mut header = self.header(block);
    f(&mut header);
    self.set_header(block, header);
  }

  pub fn payload_end(
    &self,
    block: Offset,
  ) -> Offset {
    Self::payload(block) + self.header(block).payload_size
  }

  /// The physically next header, or `None` past the arena bound.
  pub fn next_header(
    &self,
    block: Offset,
  ) -> Option<Offset> {
    let end = self.payload_end(block);

    if end + HEADER_SIZE > self.bound {
      return None;
    }

    Some(end)
  }

  /// The physically previous header, when its housekeeping says it is free.
  pub fn prev_free_header(
    &self,
    block: Offset,
  ) -> Option<Offset> {
    match self.header(block).housekeeping.prev() {
      PrevBlock::Allocated => None,
      PrevBlock::Free => self.footer_before(block),
      PrevBlock::FreeMinimum => Some(block - HEADER_SIZE - ALIGNMENT),
    }
  }

  /// The footer stored in the last slot of the block ending at `block`.
  pub fn footer_before(
    &self,
    block: Offset,
  ) -> Option<Offset> {
    self.link(block - LINK_SIZE)
  }

  /// Tells the successor of `block` whether `block` is free, writing the
  /// footer it will need to find `block` again.
  pub fn sync_successor(
    &mut self,
    block: Offset,
  ) {
    let Some(next) = self.next_header(block) else {
      return;
    };

    let header = self.header(block);
    let prev = if header.is_free() {
      PrevBlock::for_free(header.payload_size)
    } else {
      PrevBlock::Allocated
    };

    if prev == PrevBlock::Free {
      self.set_link(next - LINK_SIZE, Some(block));
    }

    self.update(next, |h| h.housekeeping.set_prev(prev));
  }

  /// Link toward the big end of the free list.
  pub fn forward(
    &self,
    block: Offset,
  ) -> Option<Offset> {
    self.link(Self::payload(block))
  }

  /// Link toward the small end of the free list.
  pub fn backward(
    &self,
    block: Offset,
  ) -> Option<Offset> {
    self.link(Self::payload(block) + LINK_SIZE)
  }

  pub fn set_forward(
    &mut self,
    block: Offset,
    to: Option<Offset>,
  ) {
    self.set_link(Self::payload(block), to)
  }

  pub fn set_backward(
    &mut self,
    block: Offset,
    to: Option<Offset>,
  ) {
    self.set_link(Self::payload(block) + LINK_SIZE, to)
  }

  fn link(
    &self,
    at: Offset,
  ) -> Option<Offset> {
    debug_assert!(at % LINK_SIZE == 0 && at + LINK_SIZE <= self.bound);
    let granule = unsafe { self.base.add(at).cast::<u32>().read() };

    if granule == NIL {
      None
    } else {
      Some(granule as usize * ALIGNMENT)
    }
  }

  fn set_link(
    &mut self,
    at: Offset,
    to: Option<Offset>,
  ) {
    debug_assert!(at % LINK_SIZE == 0 && at + LINK_SIZE <= self.bound);
    let granule = match to {
      Some(offset) => (offset / ALIGNMENT) as u32,
      None => NIL,
    };
    unsafe { self.base.add(at).cast::<u32>().write(granule) };
  }
}

#[cfg(test)]
pub(crate) mod tests {
  use super::*;
  use crate::block::Housekeeping;

  /// An arena over a plain heap buffer, for exercising the views without a
  /// page source.
  pub(crate) fn scratch(words: &mut Vec<u64>) -> Arena {
    let mut arena = Arena::new(NonNull::new(words.as_mut_ptr().cast::<u8>()).unwrap());
    arena.extend_bound(words.len() * 8);
    arena
  }

  #[test]
  fn test_navigation() {
    let mut words = vec![0u64; 16];
    let mut arena = scratch(&mut words);

    arena.set_header(0, Header::new(24, Housekeeping::new(false, PrevBlock::Allocated)));
    arena.set_header(32, Header::new(88, Housekeeping::new(true, PrevBlock::Allocated)));

    assert_eq!(Arena::payload(0), 8);
    assert_eq!(arena.payload_end(0), 32);
    assert_eq!(arena.next_header(0), Some(32));
    assert_eq!(arena.next_header(32), None);
    assert_eq!(arena.offset_of(arena.ptr(40)), Some(40));
    assert_eq!(arena.offset_of(arena.ptr(128)), None);
  }

  #[test]
  fn test_links_round_trip() {
    let mut words = vec![0u64; 8];
    let mut arena = scratch(&mut words);

    arena.set_forward(0, Some(48));
    arena.set_backward(0, None);

    assert_eq!(arena.forward(0), Some(48));
    assert_eq!(arena.backward(0), None);
  }

  #[test]
  fn test_sync_successor_footer() {
    let mut words = vec![0u64; 16];
    let mut arena = scratch(&mut words);

    arena.set_header(0, Header::new(32, Housekeeping::new(true, PrevBlock::Allocated)));
    arena.set_header(40, Header::new(80, Housekeeping::new(false, PrevBlock::Allocated)));
    arena.sync_successor(0);

    assert_eq!(arena.header(40).housekeeping.prev(), PrevBlock::Free);
    assert_eq!(arena.prev_free_header(40), Some(0));

    arena.update(0, |h| h.housekeeping.set_free(false));
    arena.sync_successor(0);
    assert_eq!(arena.prev_free_header(40), None);
  }

  #[test]
  fn test_sync_successor_minimum() {
    let mut words = vec![0u64; 16];
    let mut arena = scratch(&mut words);

    arena.set_header(0, Header::new(8, Housekeeping::new(true, PrevBlock::Allocated)));
    arena.set_header(16, Header::new(104, Housekeeping::new(false, PrevBlock::Allocated)));
    arena.sync_successor(0);

    assert_eq!(arena.header(16).housekeeping.prev(), PrevBlock::FreeMinimum);
    assert_eq!(arena.prev_free_header(16), Some(0));
  }
}
