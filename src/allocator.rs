use std::ptr::{self, NonNull};

use crate::{
  AllocError, ArenaConfig, MAX_ARENA_BYTES, MAX_REQUEST, align, align_to,
  arena::{Arena, Offset},
  block::{ALIGNMENT, HEADER_SIZE, Header, Housekeeping, MIN_SPLIT, PrevBlock},
  free_list::FreeList,
  pages::{MmapPages, PageSource},
};

/// A snapshot of the arena's bookkeeping.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub struct ArenaStats {
  /// Pages claimed from the page source.
  pub pages: usize,
  /// Bytes claimed from the page source.
  pub arena_bytes: usize,
  /// Live headers, free and allocated.
  pub headers: usize,
  /// Blocks on the free list.
  pub free_blocks: usize,
  /// Payload bytes held by free blocks.
  pub free_bytes: usize,
  /// Payload bytes of the largest free block.
  pub largest_free: usize,
}

/// A single-threaded allocator over a growable, page-granular arena.
///
/// The allocator is not thread-safe: it holds raw pointers into the arena and
/// is neither `Send` nor `Sync`. Use one instance per thread or serialize
/// access externally.
pub struct Allocator<P: PageSource = MmapPages> {
  source: P,
  config: ArenaConfig,
  arena: Arena,
  free: FreeList,
  pages: usize,
  headers: usize,
  // Highest-addressed header. Always free once the arena has grown.
  last: Option<Offset>,
}

impl Allocator<MmapPages> {
  /// Creates an allocator over a fresh `mmap` reservation with the default
  /// configuration.
  pub fn new() -> Result<Self, AllocError> {
    Self::with_config(ArenaConfig::default())
  }

  pub fn with_config(config: ArenaConfig) -> Result<Self, AllocError> {
    config.validate()?;
    let source = MmapPages::new(config.reserve_bytes)?;
    Self::with_source(source, config)
  }
}

impl<P: PageSource> Allocator<P> {
  /// Creates an allocator over `source` and initializes it.
  pub fn with_source(
    source: P,
    config: ArenaConfig,
  ) -> Result<Self, AllocError> {
    config.validate()?;

    let base = source.base();
    let mut allocator = Self {
      source,
      config,
      arena: Arena::new(base),
      free: FreeList::new(config.split_threshold),
      pages: 0,
      headers: 0,
      last: None,
    };

    allocator.init()?;
    Ok(allocator)
  }

  /// Resets the allocator to an empty arena.
  ///
  /// Every pointer handed out before the call is invalidated. Calling `init`
  /// repeatedly is allowed.
  pub fn init(&mut self) -> Result<(), AllocError> {
    let base = self.source.reset()?;

    self.arena = Arena::new(base);
    self.free.clear();
    self.pages = 0;
    self.headers = 0;
    self.last = None;

    log::debug!("arena reset at {:p}", base);
    Ok(())
  }

  pub fn config(&self) -> &ArenaConfig {
    &self.config
  }

  pub fn page_size(&self) -> usize {
    self.source.page_size()
  }

  /// Returns a pointer to at least `size` usable bytes, aligned to
  /// [`ALIGNMENT`]. A `size` of zero is treated as one alignment unit.
  pub fn allocate(
    &mut self,
    size: usize,
  ) -> Result<NonNull<u8>, AllocError> {
    let size = round_request(size)?;

    let found = if self.pages == 0 {
      None
    } else {
      self.free.find_first_fit(&self.arena, size)
    };

    let block = match found {
      Some(block) => block,
      None => self.grow(size)?,
    };

    self.carve(block, size, None)?;

    log::trace!("allocate({}) -> block {:#x}", size, block);
    Ok(self.arena.ptr(Arena::payload(block)))
  }

  /// Returns the block behind `ptr` to the free pool, merging it with free
  /// neighbours.
  ///
  /// Pointers outside the arena and blocks that are already free are
  /// reported as errors rather than corrupting the heap.
  ///
  /// # Safety
  ///
  /// `ptr` must have been returned by [`allocate`](Self::allocate) or
  /// [`reallocate`](Self::reallocate) on this allocator since the last
  /// [`init`](Self::init). Passing any other pointer into the arena (such as
  /// one into the middle of a payload) is undefined behavior, and the
  /// double-free check only holds while the block's header is intact.
  pub unsafe fn deallocate(
    &mut self,
    ptr: NonNull<u8>,
  ) -> Result<(), AllocError> {
    let block = self.block_for(ptr)?;
    let mut header = self.arena.header(block);

    if let Some(next) = self.arena.next_header(block) {
      let next_header = self.arena.header(next);

      if next_header.is_free() {
        self.free.remove(&mut self.arena, next);
        header.payload_size += HEADER_SIZE + next_header.payload_size;
        self.headers -= 1;

        if self.last == Some(next) {
          self.last = Some(block);
        }
      }
    }

    match self.arena.prev_free_header(block) {
      Some(prev) => {
        // The previous block is already listed; it just swallows this one.
        self.arena.update(prev, |h| h.payload_size += HEADER_SIZE + header.payload_size);
        self.headers -= 1;

        if self.last == Some(block) {
          self.last = Some(prev);
        }

        self.arena.sync_successor(prev);
        log::trace!("deallocate block {:#x} into {:#x}", block, prev);
      }
      None => {
        header.housekeeping.set_free(true);
        self.arena.set_header(block, header);
        self.free.insert(&mut self.arena, block);
        self.arena.sync_successor(block);
        log::trace!("deallocate block {:#x} ({} bytes free)", block, header.payload_size);
      }
    }

    Ok(())
  }

  /// Resizes the block behind `ptr` to at least `new_size` bytes.
  ///
  /// Shrinking is a no-op. Growing first tries to absorb the following free
  /// block in place; otherwise the contents move to a new block and the old
  /// one is freed.
  ///
  /// # Safety
  ///
  /// Same contract as [`deallocate`](Self::deallocate). When the returned
  /// pointer differs from `ptr`, `ptr` is dangling.
  pub unsafe fn reallocate(
    &mut self,
    ptr: NonNull<u8>,
    new_size: usize,
  ) -> Result<NonNull<u8>, AllocError> {
    let size = round_request(new_size)?;
    let block = self.block_for(ptr)?;
    let old_size = self.arena.header(block).payload_size;

    if old_size >= size {
      return Ok(ptr);
    }

    if let Some(next) = self.arena.next_header(block) {
      let next_header = self.arena.header(next);
      let potential = old_size + HEADER_SIZE + next_header.payload_size;

      if next_header.is_free() && potential >= size {
        match self.carve(block, size, Some(next)) {
          Ok(()) => {
            log::trace!("reallocate block {:#x} in place, {} -> {}", block, old_size, size);
            return Ok(ptr);
          }
          // The edge page could not be claimed. Nothing was touched, so a
          // listed block may still take the data.
          Err(AllocError::OutOfMemory { pages }) => {
            log::debug!("in-place growth of {:#x} needs {} more pages, moving", block, pages);
          }
          Err(err) => return Err(err),
        }
      }
    }

    let moved = self.allocate(size)?;

    unsafe {
      ptr::copy_nonoverlapping(ptr.as_ptr(), moved.as_ptr(), old_size);
      self.deallocate(ptr)?;
    }

    log::trace!("reallocate block {:#x} moved, {} -> {}", block, old_size, size);
    Ok(moved)
  }

  /// The usable size of the live block behind `ptr`.
  ///
  /// # Safety
  ///
  /// Same contract as [`deallocate`](Self::deallocate).
  pub unsafe fn usable_size(
    &self,
    ptr: NonNull<u8>,
  ) -> Result<usize, AllocError> {
    let block = self.block_for(ptr)?;
    Ok(self.arena.header(block).payload_size)
  }

  pub fn stats(&self) -> ArenaStats {
    let mut stats = ArenaStats {
      pages: self.pages,
      arena_bytes: self.arena.bound(),
      headers: self.headers,
      ..ArenaStats::default()
    };

    for block in self.free.iter(&self.arena) {
      let size = self.arena.header(block).payload_size;
      stats.free_blocks += 1;
      stats.free_bytes += size;
      stats.largest_free = stats.largest_free.max(size);
    }

    stats
  }

  pub(crate) fn arena(&self) -> &Arena {
    &self.arena
  }

  pub(crate) fn free_ends(&self) -> (Option<Offset>, Option<Offset>) {
    (self.free.small(), self.free.big())
  }

  pub(crate) fn header_count(&self) -> usize {
    self.headers
  }

  pub(crate) fn last_header(&self) -> Option<Offset> {
    self.last
  }

  /// Turns `block` into an allocated block of `size` bytes, splitting off the
  /// leftover as a new free block when it is big enough to hold one. With
  /// `absorb`, the free block physically after `block` is merged in first.
  fn carve(
    &mut self,
    block: Offset,
    size: usize,
    absorb: Option<Offset>,
  ) -> Result<(), AllocError> {
    let header = self.arena.header(block);
    let absorbed = absorb.map_or(0, |next| HEADER_SIZE + self.arena.header(next).payload_size);
    let total = header.payload_size + absorbed;
    let free_space = total - size;
    let end = Arena::payload(block) + total;

    // A block granted whole up to the arena edge would leave no free header
    // at the end, so claim one more page for a new last header. Claiming
    // happens before any bookkeeping changes so a failure leaves no trace.
    let tail = if free_space < MIN_SPLIT && end == self.arena.bound() {
      Some(self.claim(1)?)
    } else {
      None
    };

    if header.is_free() {
      self.free.remove(&mut self.arena, block);
    }

    if let Some(next) = absorb {
      self.free.remove(&mut self.arena, next);
      self.headers -= 1;

      if self.last == Some(next) {
        self.last = Some(block);
      }
    }

    let mut flags = header.housekeeping;
    flags.set_free(false);

    if free_space >= MIN_SPLIT {
      let rest = Arena::payload(block) + size;

      self.arena.set_header(block, Header::new(size, flags));
      self.arena.set_header(
        rest,
        Header::new(free_space - HEADER_SIZE, Housekeeping::new(true, PrevBlock::Allocated)),
      );
      self.headers += 1;

      if self.last == Some(block) {
        self.last = Some(rest);
      }

      self.free.insert(&mut self.arena, rest);
      self.arena.sync_successor(rest);
      return Ok(());
    }

    self.arena.set_header(block, Header::new(total, flags));

    match tail {
      Some(tail) => {
        debug_assert_eq!(tail, end);
        let tail_size = self.page_size() - HEADER_SIZE;

        self.arena.set_header(
          tail,
          Header::new(tail_size, Housekeeping::new(true, PrevBlock::Allocated)),
        );
        self.headers += 1;
        self.last = Some(tail);
        self.free.insert(&mut self.arena, tail);
      }
      None => self.arena.sync_successor(block),
    }

    Ok(())
  }

  /// Grows the arena far enough to satisfy a `size` byte request and returns
  /// the last header, which now holds the new space.
  fn grow(
    &mut self,
    size: usize,
  ) -> Result<Offset, AllocError> {
    let page_size = self.page_size();
    let mut pages = align_to!(size + HEADER_SIZE, page_size) / page_size;

    if self.pages == 0 {
      pages = pages.max(self.config.initial_pages);
    }

    let start = self.claim(pages)?;
    let bytes = pages * page_size;

    match self.last {
      Some(last) => {
        self.arena.update(last, |h| h.payload_size += bytes);
        Ok(last)
      }
      None => {
        let flags = Housekeeping::new(true, PrevBlock::Allocated);
        let header = Header::new(bytes - HEADER_SIZE, flags);

        self.arena.set_header(start, header);
        self.headers = 1;
        self.last = Some(start);
        self.free.insert(&mut self.arena, start);
        Ok(start)
      }
    }
  }

  /// Claims `pages` from the page source and returns the offset of the first
  /// new byte.
  fn claim(
    &mut self,
    pages: usize,
  ) -> Result<Offset, AllocError> {
    let offset = self.arena.bound();
    let fits = pages
      .checked_mul(self.page_size())
      .and_then(|bytes| offset.checked_add(bytes))
      .is_some_and(|end| end <= MAX_ARENA_BYTES);

    // links and footers cannot name offsets past this
    if !fits {
      log::warn!(
        "refusing to grow the arena by {} pages past {} bytes",
        pages,
        MAX_ARENA_BYTES
      );
      return Err(AllocError::OutOfMemory { pages });
    }

    let start = self.source.extend(pages)?;

    debug_assert_eq!(start, self.arena.ptr(offset));

    self.arena.extend_bound(pages * self.page_size());
    self.pages += pages;

    log::debug!("claimed {} pages, arena is now {} bytes", pages, self.arena.bound());
    Ok(offset)
  }

  /// Resolves a payload pointer to its header, rejecting pointers that cannot
  /// belong to a live block.
  fn block_for(
    &self,
    ptr: NonNull<u8>,
  ) -> Result<Offset, AllocError> {
    let payload = match self.arena.offset_of(ptr) {
      Some(payload) if payload >= HEADER_SIZE && payload % ALIGNMENT == 0 => payload,
      _ => {
        log::warn!("rejecting pointer {:p} outside the arena", ptr);
        return Err(AllocError::InvalidPointer);
      }
    };

    let block = payload - HEADER_SIZE;
    let header = self.arena.header(block);

    let end = payload.saturating_add(header.payload_size);
    if header.payload_size < ALIGNMENT || end > self.arena.bound() {
      log::warn!("rejecting pointer {:p} with a malformed header", ptr);
      return Err(AllocError::InvalidPointer);
    }

    if header.is_free() {
      log::warn!("rejecting pointer {:p} to a free block", ptr);
      return Err(AllocError::DoubleFree);
    }

    Ok(block)
  }
}

/// Rounds a request up to the alignment, bumping zero to one unit.
fn round_request(size: usize) -> Result<usize, AllocError> {
  if size > MAX_REQUEST {
    return Err(AllocError::RequestTooLarge { requested: size });
  }

  Ok(align!(size).max(ALIGNMENT))
}
