//! The segregated free list.
//!
//! Every free block is threaded onto one doubly-linked list whose links live
//! in the block's own payload. The list has two entry points: small blocks are
//! pushed at the small end and large ones at the big end, and a first-fit
//! search starts at whichever end matches the request. The list is never
//! sorted, only biased.
//!
//! ```text
//!   small                                                            big
//!     │                                                               │
//!     ▼   forward        forward        forward        forward        ▼
//!   ┌────┐ ──────▶ ┌────┐ ──────▶ ┌──────┐ ──────▶ ┌────────┐ ──────▶ ┌──────────┐
//!   │ 24 │         │ 8  │         │ 4000 │         │ 12288  │         │ 163000   │
//!   └────┘ ◀────── └────┘ ◀────── └──────┘ ◀────── └────────┘ ◀────── └──────────┘
//!          backward       backward        backward         backward
//! ```

use crate::arena::{Arena, Offset};

pub(crate) struct FreeList {
  small: Option<Offset>,
  big: Option<Offset>,
  threshold: usize,
}

impl FreeList {
  pub fn new(threshold: usize) -> Self {
    Self {
      small: None,
      big: None,
      threshold,
    }
  }

  pub fn clear(&mut self) {
    self.small = None;
    self.big = None;
  }

  pub fn small(&self) -> Option<Offset> {
    self.small
  }

  pub fn big(&self) -> Option<Offset> {
    self.big
  }

  pub fn insert(
    &mut self,
    arena: &mut Arena,
    block: Offset,
  ) {
    let (Some(small), Some(big)) = (self.small, self.big) else {
      arena.set_forward(block, None);
      arena.set_backward(block, None);
      self.small = Some(block);
      self.big = Some(block);
      return;
    };

    if arena.header(block).payload_size < self.threshold {
      arena.set_forward(block, Some(small));
      arena.set_backward(block, None);
      arena.set_backward(small, Some(block));
      self.small = Some(block);
    } else {
      arena.set_backward(block, Some(big));
      arena.set_forward(block, None);
      arena.set_forward(big, Some(block));
      self.big = Some(block);
    }
  }

  pub fn remove(
    &mut self,
    arena: &mut Arena,
    block: Offset,
  ) {
    if self.small == self.big {
      debug_assert_eq!(self.small, Some(block));
      self.clear();
      return;
    }

    let forward = arena.forward(block);
    let backward = arena.backward(block);

    match (backward, forward) {
      (Some(backward), Some(forward)) => {
        arena.set_forward(backward, Some(forward));
        arena.set_backward(forward, Some(backward));
      }
      (Some(backward), None) => {
        arena.set_forward(backward, None);
        self.big = Some(backward);
      }
      (None, Some(forward)) => {
        arena.set_backward(forward, None);
        self.small = Some(forward);
      }
      (None, None) => unreachable!("free block {:#x} is unlinked", block),
    }
  }

  /// First block with at least `size` payload bytes, searching from the end
  /// that matches the request's size class.
  pub fn find_first_fit(
    &self,
    arena: &Arena,
    size: usize,
  ) -> Option<Offset> {
    let from_small = size < self.threshold;
    let mut current = if from_small { self.small } else { self.big };

    while let Some(block) = current {
      if arena.header(block).payload_size >= size {
        return Some(block);
      }

      current = if from_small {
        arena.forward(block)
      } else {
        arena.backward(block)
      };
    }

    None
  }

  /// Walks the list from the small end.
  pub fn iter<'a>(
    &self,
    arena: &'a Arena,
  ) -> Nodes<'a> {
    Nodes {
      arena,
      next: self.small,
    }
  }
}

pub(crate) struct Nodes<'a> {
  arena: &'a Arena,
  next: Option<Offset>,
}

impl Iterator for Nodes<'_> {
  type Item = Offset;

  fn next(&mut self) -> Option<Offset> {
    let block = self.next?;
    self.next = self.arena.forward(block);
    Some(block)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::arena::tests::scratch;
  use crate::block::{Header, Housekeeping, PrevBlock};

  const THRESHOLD: usize = 64;

  // Lays out free blocks of the given payload sizes back to back.
  fn blocks(
    arena: &mut Arena,
    sizes: &[usize],
  ) -> Vec<Offset> {
    let mut offset = 0;
    let mut offsets = Vec::new();

    for &size in sizes {
      arena.set_header(offset, Header::new(size, Housekeeping::new(true, PrevBlock::Allocated)));
      offsets.push(offset);
      offset += 8 + size;
    }

    offsets
  }

  fn order(
    list: &FreeList,
    arena: &Arena,
  ) -> Vec<Offset> {
    list.iter(arena).collect()
  }

  #[test]
  fn test_insert_biases_by_size() {
    let mut words = vec![0u64; 128];
    let mut arena = scratch(&mut words);
    let b = blocks(&mut arena, &[16, 128, 8, 256]);
    let mut list = FreeList::new(THRESHOLD);

    for &block in &b {
      list.insert(&mut arena, block);
    }

    // small ones pile up at the front, big ones at the back
    assert_eq!(order(&list, &arena), vec![b[2], b[0], b[1], b[3]]);
    assert_eq!(list.small(), Some(b[2]));
    assert_eq!(list.big(), Some(b[3]));
    assert_eq!(arena.backward(b[3]), Some(b[1]));
    assert_eq!(arena.backward(b[2]), None);
  }

  #[test]
  fn test_remove_ends_and_middle() {
    let mut words = vec![0u64; 128];
    let mut arena = scratch(&mut words);
    let b = blocks(&mut arena, &[16, 24, 128, 256]);
    let mut list = FreeList::new(THRESHOLD);

    for &block in &b {
      list.insert(&mut arena, block);
    }
    assert_eq!(order(&list, &arena), vec![b[1], b[0], b[2], b[3]]);

    list.remove(&mut arena, b[0]);
    assert_eq!(order(&list, &arena), vec![b[1], b[2], b[3]]);
    assert_eq!(arena.backward(b[2]), Some(b[1]));

    list.remove(&mut arena, b[3]);
    assert_eq!(list.big(), Some(b[2]));
    assert_eq!(arena.forward(b[2]), None);

    list.remove(&mut arena, b[1]);
    assert_eq!(list.small(), Some(b[2]));
    assert_eq!(arena.backward(b[2]), None);

    list.remove(&mut arena, b[2]);
    assert_eq!(list.small(), None);
    assert_eq!(list.big(), None);
  }

  #[test]
  fn test_first_fit_from_both_ends() {
    let mut words = vec![0u64; 128];
    let mut arena = scratch(&mut words);
    let b = blocks(&mut arena, &[32, 16, 200, 96]);
    let mut list = FreeList::new(THRESHOLD);

    for &block in &b {
      list.insert(&mut arena, block);
    }
    // small end: 16, 32 | big end: 96 (walking backward), 200
    assert_eq!(list.find_first_fit(&arena, 8), Some(b[1]));
    assert_eq!(list.find_first_fit(&arena, 24), Some(b[0]));
    assert_eq!(list.find_first_fit(&arena, 40), Some(b[2]));
    assert_eq!(list.find_first_fit(&arena, 64), Some(b[3]));
    assert_eq!(list.find_first_fit(&arena, 100), Some(b[2]));
    assert_eq!(list.find_first_fit(&arena, 512), None);
  }

  #[test]
  fn test_empty_list_has_no_fit() {
    let mut words = vec![0u64; 8];
    let arena = scratch(&mut words);
    let list = FreeList::new(THRESHOLD);

    assert_eq!(list.find_first_fit(&arena, 8), None);
    assert_eq!(list.iter(&arena).count(), 0);
  }
}
