use std::{io, ptr::NonNull};

use libc::c_void;

use crate::{AllocError, align_to};

/// Supplies the page-granular memory an [`Allocator`](crate::Allocator) carves
/// blocks out of.
///
/// # Safety
///
/// Implementors must guarantee that:
/// - every region returned by [`extend`](PageSource::extend) is readable,
///   writable, aligned to [`page_size`](PageSource::page_size) and starts
///   exactly where the previous claim ended, so the claimed pages always form
///   one contiguous run beginning at [`base`](PageSource::base);
/// - claimed pages stay valid and in place until the next
///   [`reset`](PageSource::reset) or until the source is dropped.
pub unsafe trait PageSource {
  /// Size in bytes of one page. A power of two, constant for the lifetime of
  /// the source.
  fn page_size(&self) -> usize;

  /// Start of the arena. Only meaningful once at least one page is claimed.
  fn base(&self) -> NonNull<u8>;

  /// Claims `pages` more pages and returns the first byte of the new space.
  fn extend(
    &mut self,
    pages: usize,
  ) -> Result<NonNull<u8>, AllocError>;

  /// Releases every claim and returns the (possibly new) empty base. The
  /// contents of previously claimed pages are gone afterwards.
  fn reset(&mut self) -> Result<NonNull<u8>, AllocError>;
}

#[cfg(any(target_os = "linux", target_os = "android"))]
const RESERVE_FLAGS: libc::c_int = libc::MAP_PRIVATE | libc::MAP_ANONYMOUS | libc::MAP_NORESERVE;
#[cfg(not(any(target_os = "linux", target_os = "android")))]
const RESERVE_FLAGS: libc::c_int = libc::MAP_PRIVATE | libc::MAP_ANONYMOUS;

/// A [`PageSource`] backed by one anonymous `mmap` reservation.
///
/// The whole address range is reserved inaccessible up front, and pages are
/// made readable and writable as the arena grows into them.
///
/// ```text
///   base                     committed                           reserved
///   ┌────────────────────────┬───────────────────────────────────────────┐
///   │  PROT_READ|PROT_WRITE  │               PROT_NONE                   │
///   └────────────────────────┴───────────────────────────────────────────┘
///                            ▲
///                            └── next extend() returns this address
/// ```
pub struct MmapPages {
  base: NonNull<u8>,
  reserved: usize,
  committed: usize,
  page_size: usize,
}

impl MmapPages {
  /// Reserves `reserve_bytes` (rounded up to whole pages) of address space.
  pub fn new(reserve_bytes: usize) -> Result<Self, AllocError> {
    let page_size = os_page_size();
    let reserved = align_to!(reserve_bytes.max(1), page_size);
    let base = unsafe { map_inaccessible(std::ptr::null_mut(), reserved, 0)? };

    log::debug!("reserved {} bytes of arena space at {:p}", reserved, base);

    Ok(Self {
      base,
      reserved,
      committed: 0,
      page_size,
    })
  }

  /// Bytes of address space held by this source.
  pub fn reserved(&self) -> usize {
    self.reserved
  }

  /// Bytes currently readable and writable.
  pub fn committed(&self) -> usize {
    self.committed
  }
}

unsafe impl PageSource for MmapPages {
  fn page_size(&self) -> usize {
    self.page_size
  }

  fn base(&self) -> NonNull<u8> {
    self.base
  }

  fn extend(
    &mut self,
    pages: usize,
  ) -> Result<NonNull<u8>, AllocError> {
    let len = pages
      .checked_mul(self.page_size)
      .ok_or(AllocError::OutOfMemory { pages })?;

    if len > self.reserved - self.committed {
      return Err(AllocError::OutOfMemory { pages });
    }

    let start = unsafe { self.base.add(self.committed) };
    let rc = unsafe {
      libc::mprotect(
        start.as_ptr().cast::<c_void>(),
        len,
        libc::PROT_READ | libc::PROT_WRITE,
      )
    };

    if rc != 0 {
      log::warn!("mprotect of {} pages failed (errno {})", pages, errno());
      return Err(AllocError::OutOfMemory { pages });
    }

    self.committed += len;
    Ok(start)
  }

  fn reset(&mut self) -> Result<NonNull<u8>, AllocError> {
    if self.committed > 0 {
      // Mapping over the range drops the old pages, contents included.
      self.base = unsafe {
        map_inaccessible(
          self.base.as_ptr().cast::<c_void>(),
          self.reserved,
          libc::MAP_FIXED,
        )?
      };
      self.committed = 0;
    }

    Ok(self.base)
  }
}

impl Drop for MmapPages {
  fn drop(&mut self) {
    unsafe {
      libc::munmap(self.base.as_ptr().cast::<c_void>(), self.reserved);
    }
  }
}

unsafe fn map_inaccessible(
  addr: *mut c_void,
  len: usize,
  extra_flags: libc::c_int,
) -> Result<NonNull<u8>, AllocError> {
  let ptr = unsafe { libc::mmap(addr, len, libc::PROT_NONE, RESERVE_FLAGS | extra_flags, -1, 0) };

  if ptr == libc::MAP_FAILED {
    return Err(AllocError::Provider("mmap", errno()));
  }

  NonNull::new(ptr.cast::<u8>()).ok_or(AllocError::Provider("mmap", 0))
}

fn os_page_size() -> usize {
  let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };

  if size <= 0 { 4096 } else { size as usize }
}

fn errno() -> i32 {
  io::Error::last_os_error().raw_os_error().unwrap_or(0)
}
