use std::{error, fmt};

/// Errors surfaced by the public allocator operations.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AllocError {
  /// The request exceeds [`MAX_REQUEST`](crate::MAX_REQUEST).
  RequestTooLarge { requested: usize },
  /// The page source could not extend the arena by `pages`.
  OutOfMemory { pages: usize },
  /// The pointer does not address a block header inside the arena.
  InvalidPointer,
  /// The block behind the pointer is already free.
  DoubleFree,
  /// The configuration was rejected.
  BadConfig(&'static str),
  /// An OS call made by the page source failed with `errno`.
  Provider(&'static str, i32),
}

impl fmt::Display for AllocError {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    match self {
      Self::RequestTooLarge { requested } => {
        write!(f, "request of {} bytes exceeds the maximum of {}", requested, crate::MAX_REQUEST)
      }
      Self::OutOfMemory { pages } => write!(f, "arena could not be extended by {} pages", pages),
      Self::InvalidPointer => write!(f, "pointer was not returned by this allocator"),
      Self::DoubleFree => write!(f, "block is already free"),
      Self::BadConfig(reason) => write!(f, "invalid configuration: {}", reason),
      Self::Provider(call, errno) => write!(f, "{} failed (errno {})", call, errno),
    }
  }
}

impl error::Error for AllocError {}

/// Inconsistencies found by [`Allocator::validate`](crate::Allocator::validate).
///
/// Offsets are byte offsets of headers from the arena base.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Corruption {
  /// A free-list link points outside the arena or off a header boundary.
  MisalignedNode { offset: usize },
  /// A free-list node's header does not carry the free flag.
  AllocatedInFreeList { offset: usize },
  /// Walking forward from the small end never reached the big end.
  BrokenForwardChain { at: usize },
  /// Walking backward from the big end never reached the small end.
  BrokenBackwardChain { at: usize },
  /// Exactly one of the two cursors is empty.
  DanglingCursor,
  /// The free list and the header chain disagree on how many blocks are free.
  FreeCountMismatch { listed: usize, found: usize },
  /// The header chain does not end at the last-header cursor.
  LastHeaderMismatch { expected: Option<usize>, found: usize },
  /// The last header is allocated.
  LastHeaderNotFree { offset: usize },
  /// A header's previous-block flags disagree with its predecessor.
  PrevFlagMismatch { offset: usize },
  /// A free block's footer does not point back at its header.
  BadFooter { offset: usize },
  /// Two physically adjacent blocks are both free.
  Uncoalesced { offset: usize },
  /// Fewer headers were found than recorded.
  MissingHeaders { expected: usize, found: usize },
  /// More headers were found than recorded.
  ExtraHeader { offset: usize, payload_size: usize },
  /// The header chain does not end exactly at the arena bound.
  BadBoundary { end: usize, bound: usize },
}

impl fmt::Display for Corruption {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    match self {
      Self::MisalignedNode { offset } => {
        write!(f, "free list node at {:#x} is misaligned or out of bounds", offset)
      }
      Self::AllocatedInFreeList { offset } => {
        write!(f, "found non-free header at {:#x} in the free list", offset)
      }
      Self::BrokenForwardChain { at } => write!(f, "forward free list is broken after {:#x}", at),
      Self::BrokenBackwardChain { at } => write!(f, "backward free list is broken after {:#x}", at),
      Self::DanglingCursor => write!(f, "only one end of the free list is set"),
      Self::FreeCountMismatch { listed, found } => {
        write!(f, "free list holds {} blocks but {} free headers exist", listed, found)
      }
      Self::LastHeaderMismatch { expected, found } => {
        write!(f, "last header is incorrect: recorded {:?}, found {:#x}", expected, found)
      }
      Self::LastHeaderNotFree { offset } => write!(f, "last header at {:#x} is not free", offset),
      Self::PrevFlagMismatch { offset } => {
        write!(f, "previous-block flags of {:#x} disagree with its predecessor", offset)
      }
      Self::BadFooter { offset } => write!(f, "footer of free block {:#x} is stale", offset),
      Self::Uncoalesced { offset } => {
        write!(f, "free blocks at {:#x} and its successor were not coalesced", offset)
      }
      Self::MissingHeaders { expected, found } => {
        write!(f, "could not find all headers: expected {}, found {}", expected, found)
      }
      Self::ExtraHeader { offset, payload_size } => {
        write!(f, "found extra header at {:#x} with size {}", offset, payload_size)
      }
      Self::BadBoundary { end, bound } => {
        write!(f, "header chain ends at {:#x} but the arena ends at {:#x}", end, bound)
      }
    }
  }
}

impl error::Error for Corruption {}
