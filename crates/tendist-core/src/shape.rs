//! Shape and block-partition index arithmetic.
//!
//! Everything here is pure: the balanced block map
//! `[⌈S·c/P⌉, ⌈S·(c+1)/P⌉)`, row-major strides, and linear/multi index
//! conversions. The distribution and the matricization kernels are both
//! written in terms of these helpers.

/// An ordered list of mode extents.
pub type Shape = Vec<usize>;

/// Ceiling division `⌈a / b⌉`.
///
/// # Examples
///
/// ```
/// use tendist_core::shape::ceil_div;
///
/// assert_eq!(ceil_div(10, 3), 4);
/// assert_eq!(ceil_div(9, 3), 3);
/// assert_eq!(ceil_div(0, 3), 0);
/// ```
pub fn ceil_div(a: usize, b: usize) -> usize {
    debug_assert!(b > 0);
    a.div_ceil(b)
}

/// Index range owned by block `idx` of `parts` balanced blocks over
/// `[0, extent)`.
///
/// Blocks are contiguous, non-overlapping, cover the whole range, and
/// differ in length by at most one.
///
/// # Examples
///
/// ```
/// use tendist_core::shape::block_range;
///
/// assert_eq!(block_range(10, 3, 0), 0..4);
/// assert_eq!(block_range(10, 3, 1), 4..7);
/// assert_eq!(block_range(10, 3, 2), 7..10);
/// ```
pub fn block_range(extent: usize, parts: usize, idx: usize) -> std::ops::Range<usize> {
    debug_assert!(idx < parts);
    ceil_div(extent * idx, parts)..ceil_div(extent * (idx + 1), parts)
}

/// Length of block `idx` under the balanced block map.
pub fn block_len(extent: usize, parts: usize, idx: usize) -> usize {
    block_range(extent, parts, idx).len()
}

/// Row-major strides of `shape` (last mode varies fastest).
pub fn row_major_strides(shape: &[usize]) -> Vec<usize> {
    let mut strides = vec![1; shape.len()];
    for k in (0..shape.len().saturating_sub(1)).rev() {
        strides[k] = strides[k + 1] * shape[k + 1];
    }
    strides
}

/// Linear offset of `index` in the row-major layout of `shape`.
pub fn ravel(index: &[usize], shape: &[usize]) -> usize {
    debug_assert_eq!(index.len(), shape.len());
    let mut lin = 0;
    for (&i, &s) in index.iter().zip(shape.iter()) {
        debug_assert!(i < s);
        lin = lin * s + i;
    }
    lin
}

/// Multi-index of linear offset `lin` in the row-major layout of
/// `shape`.
pub fn unravel(lin: usize, shape: &[usize]) -> Vec<usize> {
    let strides = row_major_strides(shape);
    shape
        .iter()
        .zip(strides.iter())
        .map(|(&extent, &stride)| (lin / stride) % extent)
        .collect()
}

/// Advance `index` to the next row-major multi-index of `shape`.
///
/// Returns `false` once the index wraps past the last position.
pub fn next_index(index: &mut [usize], shape: &[usize]) -> bool {
    for k in (0..shape.len()).rev() {
        index[k] += 1;
        if index[k] < shape[k] {
            return true;
        }
        index[k] = 0;
    }
    false
}
