//! Mode-n matricization of local row-major buffers.
//!
//! `tenmat` lays a tensor out as the `(I_n × ∏_{k≠n} I_k)` matrix whose
//! columns are the mode-n fibers, ordered little-endian over the other
//! modes: the *lowest* remaining mode varies fastest. `tenmatt` emits
//! the transposed `(∏_{k≠n} I_k × I_n)` layout directly, which is the
//! shape the Gram ring wants for its right-hand operand. `mattten`
//! folds a `tenmat` layout back into a row-major tensor buffer.
//!
//! All three act on local buffers only; nothing here communicates.

use scirs2_core::ndarray_ext::Array2;
use scirs2_core::numeric::Num;

use crate::error::{KernelError, KernelResult};
use tendist_core::shape::next_index;

fn check_layout<T>(data: &[T], shape: &[usize], mode: usize) -> KernelResult<(usize, usize)> {
    if mode >= shape.len() {
        return Err(KernelError::invalid_mode(mode, shape.len()));
    }
    let total: usize = shape.iter().product();
    if data.len() != total {
        return Err(KernelError::shape_mismatch("matricize", shape, &[data.len()]));
    }
    let rows = shape[mode];
    let cols = if rows == 0 { 0 } else { total / rows };
    Ok((rows, cols))
}

/// Column weights of the little-endian ordering over the modes ≠ `mode`.
fn column_weights(shape: &[usize], mode: usize) -> Vec<usize> {
    let mut weights = vec![0; shape.len()];
    let mut w = 1;
    for k in 0..shape.len() {
        if k != mode {
            weights[k] = w;
            w *= shape[k];
        }
    }
    weights
}

/// Mode-`mode` matricization: `(I_n × ∏_{k≠n} I_k)`.
pub fn tenmat<T>(data: &[T], shape: &[usize], mode: usize) -> KernelResult<Array2<T>>
where
    T: Copy + Num,
{
    let (rows, cols) = check_layout(data, shape, mode)?;
    let weights = column_weights(shape, mode);
    let mut out = Array2::<T>::zeros((rows, cols));
    if data.is_empty() {
        return Ok(out);
    }
    let mut index = vec![0usize; shape.len()];
    for &value in data {
        let col: usize = index
            .iter()
            .zip(weights.iter())
            .enumerate()
            .filter(|&(k, _)| k != mode)
            .map(|(_, (&i, &w))| i * w)
            .sum();
        out[[index[mode], col]] = value;
        next_index(&mut index, shape);
    }
    Ok(out)
}

/// Transposed matricization: `(∏_{k≠n} I_k × I_n)`.
///
/// Same element placement as `tenmat(..).t()`, but produced directly in
/// row-major layout so the result can travel as a flat buffer.
pub fn tenmatt<T>(data: &[T], shape: &[usize], mode: usize) -> KernelResult<Array2<T>>
where
    T: Copy + Num,
{
    let (rows, cols) = check_layout(data, shape, mode)?;
    let weights = column_weights(shape, mode);
    let mut out = Array2::<T>::zeros((cols, rows));
    if data.is_empty() {
        return Ok(out);
    }
    let mut index = vec![0usize; shape.len()];
    for &value in data {
        let col: usize = index
            .iter()
            .zip(weights.iter())
            .enumerate()
            .filter(|&(k, _)| k != mode)
            .map(|(_, (&i, &w))| i * w)
            .sum();
        out[[col, index[mode]]] = value;
        next_index(&mut index, shape);
    }
    Ok(out)
}

/// Fold a `tenmat` layout back into the row-major buffer `dst` of
/// `shape`. `src` is `(shape[mode] × ∏_{k≠mode})`, row-major.
pub fn mattten<T>(src: &[T], dst: &mut [T], shape: &[usize], mode: usize) -> KernelResult<()>
where
    T: Copy + Num,
{
    let (rows, cols) = check_layout(dst, shape, mode)?;
    if src.len() != rows * cols {
        return Err(KernelError::shape_mismatch(
            "mattten",
            &[rows, cols],
            &[src.len()],
        ));
    }
    if dst.is_empty() {
        return Ok(());
    }
    let weights = column_weights(shape, mode);
    let mut index = vec![0usize; shape.len()];
    for slot in dst.iter_mut() {
        let col: usize = index
            .iter()
            .zip(weights.iter())
            .enumerate()
            .filter(|&(k, _)| k != mode)
            .map(|(_, (&i, &w))| i * w)
            .sum();
        *slot = src[index[mode] * cols + col];
        next_index(&mut index, shape);
    }
    Ok(())
}
