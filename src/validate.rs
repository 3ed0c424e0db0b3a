use crate::{
  Allocator, Corruption,
  arena::{Arena, Offset},
  block::{ALIGNMENT, HEADER_SIZE, PrevBlock},
  pages::PageSource,
};

impl<P: PageSource> Allocator<P> {
  /// Walks the free list and the full header chain and reports the first
  /// inconsistency found.
  ///
  /// This is a debugging aid. It costs a pass over every block and is never
  /// called by the allocation paths.
  pub fn validate(&self) -> Result<(), Corruption> {
    let result = self
      .check_free_list()
      .and_then(|listed| self.check_headers(listed));

    if let Err(corruption) = result {
      log::warn!("heap validation failed: {}", corruption);
    }

    result
  }

  pub fn is_valid(&self) -> bool {
    self.validate().is_ok()
  }

  fn check_node(
    &self,
    block: Offset,
  ) -> Result<(), Corruption> {
    let arena = self.arena();

    if block % ALIGNMENT != 0 || block + HEADER_SIZE + ALIGNMENT > arena.bound() {
      return Err(Corruption::MisalignedNode { offset: block });
    }

    if !arena.header(block).is_free() {
      return Err(Corruption::AllocatedInFreeList { offset: block });
    }

    Ok(())
  }

  /// Returns the number of listed blocks.
  fn check_free_list(&self) -> Result<usize, Corruption> {
    let arena = self.arena();
    let (small, big) = match self.free_ends() {
      (None, None) => return Ok(0),
      (Some(small), Some(big)) => (small, big),
      _ => return Err(Corruption::DanglingCursor),
    };

    self.check_node(small)?;
    let mut listed = 1;
    let mut current = small;

    while current != big {
      let next = arena
        .forward(current)
        .ok_or(Corruption::BrokenForwardChain { at: current })?;
      self.check_node(next)?;

      // more nodes than headers means the chain loops
      listed += 1;
      if listed > self.header_count() {
        return Err(Corruption::BrokenForwardChain { at: next });
      }

      current = next;
    }

    if arena.forward(big).is_some() || arena.backward(small).is_some() {
      return Err(Corruption::BrokenForwardChain { at: big });
    }

    let mut walked = 1;
    current = big;

    while current != small {
      let prev = arena
        .backward(current)
        .ok_or(Corruption::BrokenBackwardChain { at: current })?;
      self.check_node(prev)?;

      if arena.forward(prev) != Some(current) {
        return Err(Corruption::BrokenBackwardChain { at: prev });
      }

      walked += 1;
      if walked > listed {
        return Err(Corruption::BrokenBackwardChain { at: prev });
      }

      current = prev;
    }

    if walked != listed {
      return Err(Corruption::BrokenBackwardChain { at: small });
    }

    Ok(listed)
  }

  fn check_headers(
    &self,
    listed: usize,
  ) -> Result<(), Corruption> {
    let arena = self.arena();
    let expected = self.header_count();

    if expected == 0 {
      if listed != 0 {
        return Err(Corruption::FreeCountMismatch { listed, found: 0 });
      }
      return Ok(());
    }

    let bound = arena.bound();
    let mut block = 0;
    let mut found = 0;
    let mut free = 0;
    let mut last_seen = 0;
    let mut prev = PrevBlock::Allocated;

    while block < bound {
      if block + HEADER_SIZE > bound {
        return Err(Corruption::BadBoundary { end: block, bound });
      }

      let header = arena.header(block);

      if found == expected {
        return Err(Corruption::ExtraHeader {
          offset: block,
          payload_size: header.payload_size,
        });
      }
      found += 1;

      let end = Arena::payload(block).saturating_add(header.payload_size);
      if header.payload_size < ALIGNMENT || end > bound {
        return Err(Corruption::BadBoundary { end, bound });
      }

      if header.housekeeping.prev() != prev {
        return Err(Corruption::PrevFlagMismatch { offset: block });
      }

      if prev == PrevBlock::Free && arena.footer_before(block) != Some(last_seen) {
        return Err(Corruption::BadFooter { offset: last_seen });
      }

      if header.is_free() {
        if prev.is_free() {
          return Err(Corruption::Uncoalesced { offset: last_seen });
        }
        free += 1;
        prev = PrevBlock::for_free(header.payload_size);
      } else {
        prev = PrevBlock::Allocated;
      }

      last_seen = block;
      block = end;
    }

    if found < expected {
      return Err(Corruption::MissingHeaders { expected, found });
    }

    if self.last_header() != Some(last_seen) {
      return Err(Corruption::LastHeaderMismatch {
        expected: self.last_header(),
        found: last_seen,
      });
    }

    if !arena.header(last_seen).is_free() {
      return Err(Corruption::LastHeaderNotFree { offset: last_seen });
    }

    if free != listed {
      return Err(Corruption::FreeCountMismatch { listed, found: free });
    }

    Ok(())
  }
}
