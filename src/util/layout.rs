//! Offset alignment for bump suballocation.

/// Round `offset` up to `alignment`, or `None` if that overflows.
///
/// An alignment of 0 means "no constraint" and returns `offset` unchanged.
/// Any other alignment must be a power of two.
#[inline]
pub fn checked_align_offset(offset: usize, alignment: usize) -> Option<usize> {
    if alignment == 0 {
        return Some(offset);
    }
    let mask = alignment - 1;
    offset.checked_add(mask).map(|v| v & !mask)
}

/// True for 0 (unconstrained) and for powers of two.
#[inline]
pub const fn is_valid_alignment(alignment: usize) -> bool {
    alignment == 0 || alignment.is_power_of_two()
}

/// Number of whole pages needed to hold `bytes`.
#[inline]
pub const fn pages_for(bytes: usize, page_size: usize) -> usize {
    if bytes == 0 {
        0
    } else {
        (bytes - 1) / page_size + 1
    }
}
