/// Rounds `value` up to the block alignment ([`ALIGNMENT`](crate::ALIGNMENT), 8 bytes).
///
/// # Examples
///
/// ```rust
/// use segalloc::align;
///
/// assert_eq!(align!(1), 8);
/// assert_eq!(align!(13), 16);
/// assert_eq!(align!(16), 16);
/// ```
#[macro_export]
macro_rules! align {
  ($value:expr) => {
    $crate::align_to!($value, $crate::ALIGNMENT)
  };
}

/// Rounds `value` up to the next multiple of `mult`.
///
/// `mult` must be a power of two: the rounding adds `mult - 1` and masks off
/// the low bits.
///
/// ```rust
/// use segalloc::align_to;
///
/// assert_eq!(align_to!(4097, 4096), 8192);
/// assert_eq!(align_to!(0, 4096), 0);
/// ```
#[macro_export]
macro_rules! align_to {
  ($value:expr, $mult:expr) => {
    ($value + $mult - 1) & !($mult - 1)
  };
}
