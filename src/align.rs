/// Rounds `value` up to the next multiple of `unit`.
///
/// Evaluates to `None` when the rounded value does not fit in a `usize`.
/// `unit` does not have to be a power of two, but it must not be zero.
///
/// # Examples
///
/// ```rust
/// use breakheap::align_to;
///
/// assert_eq!(align_to!(1usize, 1024usize), Some(1024));
/// assert_eq!(align_to!(1024usize, 1024usize), Some(1024));
/// assert_eq!(align_to!(1025usize, 1024usize), Some(2048));
/// assert_eq!(align_to!(usize::MAX, 1024usize), None);
/// ```
#[macro_export]
macro_rules! align_to {
  ($value:expr, $unit:expr) => {{
    let unit: usize = $unit;
    let value: usize = $value;
    value
      .checked_add(unit - 1)
      .map(|padded| padded / unit * unit)
  }};
}
