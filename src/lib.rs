//! # segalloc - A Segregated Free-List Allocator
//!
//! This crate provides a single-threaded **first-fit allocator** that manages a
//! contiguous, page-granular arena. Freed blocks are kept on an intrusive,
//! doubly-linked free list and are coalesced with their neighbours, so memory
//! is reused before the arena grows.
//!
//! ## Overview
//!
//! Every block starts with an 8 byte header. Free blocks reuse their own
//! payload to hold the free-list links, and most of them end with a footer so
//! the block after them can find them when it is freed:
//!
//! ```text
//!   Allocated block:
//!   ┌────────────┬─────────────────────────────────────────────────┐
//!   │   header   │                 user data                       │
//!   │ size|flags │                                                 │
//!   └────────────┴─────────────────────────────────────────────────┘
//!                ▲
//!                └── pointer returned to the caller
//!
//!   Free block:
//!   ┌────────────┬─────────┬──────────┬────────────────────┬────────┐
//!   │   header   │ forward │ backward │      (unused)      │ footer │
//!   │ size|F     │  link   │   link   │                    │ ─┐     │
//!   └────────────┴─────────┴──────────┴────────────────────┴──┼─────┘
//!   ▲                                                         │
//!   └─────────────────────────────────────────────────────────┘
//!
//!   Minimum-size free block (8 byte payload, no room for a footer):
//!   ┌────────────┬─────────┬──────────┐
//!   │   header   │ forward │ backward │   the next header carries the
//!   │ size|F     │  link   │   link   │   "previous is minimum size" flag
//!   └────────────┴─────────┴──────────┘
//! ```
//!
//! The free list is entered from two ends. Small blocks are pushed at the
//! small end and large blocks at the big end, and a search starts from the
//! end matching the request, which keeps first-fit scans short without
//! sorting anything.
//!
//! ## Crate Structure
//!
//! ```text
//!   segalloc
//!   ├── align      - Rounding macros (align!, align_to!)
//!   ├── allocator  - Allocator: allocate, deallocate, reallocate, init
//!   ├── arena      - Offset arithmetic and typed views (internal)
//!   ├── block      - Header word and housekeeping flags
//!   ├── config     - ArenaConfig
//!   ├── error      - AllocError, Corruption
//!   ├── free_list  - Segregated free list (internal)
//!   ├── pages      - PageSource trait and the mmap-backed MmapPages
//!   └── validate   - Consistency checker
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use segalloc::Allocator;
//!
//! fn main() -> Result<(), segalloc::AllocError> {
//!     let mut allocator = Allocator::new()?;
//!
//!     let ptr = allocator.allocate(64)?;
//!     unsafe {
//!         ptr.as_ptr().write_bytes(0xAB, 64);
//!
//!         let ptr = allocator.reallocate(ptr, 256)?;
//!         assert_eq!(ptr.as_ptr().read(), 0xAB);
//!
//!         allocator.deallocate(ptr)?;
//!     }
//!
//!     assert!(allocator.is_valid());
//!     Ok(())
//! }
//! ```
//!
//! ## How It Works
//!
//! The arena only ever grows. The highest-addressed block is always free:
//! it is the growth edge, and when no listed block fits a request the arena
//! is extended by whole pages and that last block simply gets bigger.
//!
//! ```text
//!   Arena:
//!
//!   base                                                          bound
//!   ┌──────┬──────────┬────┬───────────┬────────┬───────────────────┐
//!   │ used │   free   │used│   used    │  free  │    free (last)    │ ──▶ grows
//!   └──────┴──────────┴────┴───────────┴────────┴───────────────────┘
//!              │                            │             │
//!              └────────── free list ───────┴─────────────┘
//! ```
//!
//! Freeing a block merges it with a free successor first and then with a free
//! predecessor, so two free blocks are never adjacent. Growing a block with
//! [`Allocator::reallocate`] absorbs a free successor in place when it is big
//! enough and only moves the data otherwise.
//!
//! ## Limitations
//!
//! - **Single-threaded only**: no synchronization; `Allocator` is neither
//!   `Send` nor `Sync`
//! - **No shrinking**: pages are never handed back until [`Allocator::init`]
//!   or drop
//! - **First fit**: placement is a heuristic, not best fit
//! - **Unix-only**: [`MmapPages`] requires `libc` and `mmap`
//!
//! ## Safety
//!
//! [`Allocator::deallocate`], [`Allocator::reallocate`] and
//! [`Allocator::usable_size`] take raw pointers and are `unsafe`. Pointers
//! outside the arena and double frees are reported as [`AllocError`]s when
//! they can be detected, but a pointer into the middle of a live block cannot
//! be told apart from a real one.

pub mod align;
mod allocator;
mod arena;
mod block;
mod config;
mod error;
mod free_list;
mod pages;
mod validate;

pub use allocator::{Allocator, ArenaStats};
pub use block::{ALIGNMENT, HEADER_SIZE, MAX_REQUEST};
pub use config::{
  ArenaConfig, DEFAULT_INITIAL_PAGES, DEFAULT_RESERVE_BYTES, DEFAULT_SPLIT_THRESHOLD,
  MAX_ARENA_BYTES,
};
pub use error::{AllocError, Corruption};
pub use pages::{MmapPages, PageSource};
