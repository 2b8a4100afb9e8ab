//! Tensor-times-matrix along a mode, local and distributed.
//!
//! The distributed kernel is a ring over the mode-n fiber: the partial
//! output blocks travel around the fiber while every process multiplies
//! its own matricized slab against the matching row block of the
//! replicated factor. Each partial collects one contribution per hop
//! and lands, complete, on the rank that owns its row block of the
//! result.

use scirs2_core::ndarray_ext::{s, ArrayView2};
use scirs2_core::numeric::Float;
use tendist_comm::CommScalar;
use tendist_core::shape::{block_len, block_range};
use tendist_core::{CartesianBlock, Tensor};

use crate::error::{KernelError, KernelResult};
use crate::matricize::{mattten, tenmat};

const TTM_TAG: u64 = 1;

/// Compute `A ×_mode M`: the mode-`mode` product of `a` with the
/// replicated matrix `m` of shape `(J, I_mode)`.
///
/// The result has `a`'s global shape with mode `mode` resized to `J`.
/// For a block-distributed `a` the result keeps the same partition
/// grid; replicated and private tensors are handled locally.
///
/// # Errors
///
/// Rejects a non-matrix or non-replicated `m`, a mode out of range, and
/// a factor whose column count differs from `a`'s global mode extent.
pub fn ttm<T>(a: &Tensor<T>, m: &Tensor<T>, mode: usize) -> KernelResult<Tensor<T>>
where
    T: Float + CommScalar,
{
    if mode >= a.ndim() {
        return Err(KernelError::invalid_mode(mode, a.ndim()));
    }
    if m.ndim() != 2 {
        return Err(KernelError::not_a_matrix("ttm", m.ndim()));
    }
    if !m.dist().is_global() && !m.dist().is_local() {
        return Err(KernelError::unsupported("ttm factor", m.dist().kind()));
    }
    let (j, m_cols) = (m.shape_global()[0], m.shape_global()[1]);
    if m_cols != a.shape_global()[mode] {
        return Err(KernelError::shape_mismatch(
            "ttm",
            &[j, a.shape_global()[mode]],
            m.shape_global(),
        ));
    }
    let m_view = ArrayView2::from_shape((j, m_cols), m.data())
        .map_err(|_| KernelError::shape_mismatch("ttm", &[j, m_cols], &[m.data().len()]))?;

    match a.dist().as_cartesian() {
        Some(cart) => ttm_ring(a, cart, &m_view, mode),
        None => ttm_local(a, &m_view, mode),
    }
}

/// Chained TTM: apply `mats[i]` along `modes[i]`, in order.
///
/// Pure: `a` is left untouched and a fresh tensor is returned, even
/// when `mats` is empty.
pub fn ttmc<T>(a: &Tensor<T>, mats: &[Tensor<T>], modes: &[usize]) -> KernelResult<Tensor<T>>
where
    T: Float + CommScalar,
{
    if mats.len() != modes.len() {
        return Err(KernelError::shape_mismatch("ttmc", &[mats.len()], &[modes.len()]));
    }
    let mut result: Option<Tensor<T>> = None;
    for (m, &mode) in mats.iter().zip(modes.iter()) {
        let next = match &result {
            Some(y) => ttm(y, m, mode)?,
            None => ttm(a, m, mode)?,
        };
        result = Some(next);
    }
    Ok(result.unwrap_or_else(|| a.clone()))
}

/// Single-process path: matricize, multiply, fold back.
fn ttm_local<T>(a: &Tensor<T>, m: &ArrayView2<T>, mode: usize) -> KernelResult<Tensor<T>>
where
    T: Float + CommScalar,
{
    let a_mat = tenmat(a.data(), a.shape(), mode)?;
    let y = m.dot(&a_mat);

    let mut out_shape = a.shape_global().to_vec();
    out_shape[mode] = m.nrows();
    let flat: Vec<T> = y.iter().copied().collect();
    let mut out = if a.dist().is_global() {
        Tensor::replicated(&out_shape, a.comm())
    } else {
        Tensor::local(vec![<T as scirs2_core::Zero>::zero(); flat.len()], &out_shape, a.comm())?
    };
    mattten(&flat, out.data_mut(), &out_shape, mode)?;
    Ok(out)
}

/// Ring over the mode-n fiber.
///
/// Step `i` on fiber rank `r` contributes to the partial output of row
/// block `k = (r − i − 1) mod P`; partials rotate towards `r + 1` and
/// arrive complete after `P − 1` hops. Both outstanding requests of a
/// step complete before its buffers are reused.
fn ttm_ring<T>(
    a: &Tensor<T>,
    cart: &CartesianBlock,
    m: &ArrayView2<T>,
    mode: usize,
) -> KernelResult<Tensor<T>>
where
    T: Float + CommScalar,
{
    let fibers = cart.fiber_comms(mode)?;
    let fiber = fibers.fiber;
    let p = fiber.size();
    let r = fiber.rank();
    let j = m.nrows();
    let in_global = a.shape_global()[mode];

    let l: usize = a
        .shape()
        .iter()
        .enumerate()
        .filter(|&(k, _)| k != mode)
        .map(|(_, &s)| s)
        .product();
    let a_mat = tenmat(a.data(), a.shape(), mode)?;
    let col_range = cart.local_range(in_global, mode);

    let max_rows = (0..p).map(|k| block_len(j, p, k)).max().unwrap_or(0);
    let mut bufs = [vec![<T as scirs2_core::Zero>::zero(); max_rows * l], vec![<T as scirs2_core::Zero>::zero(); max_rows * l]];
    tracing::trace!(mode, p, l, max_rows, "ttm ring start");

    let mut pending: Option<(tendist_comm::SendRequest, tendist_comm::RecvRequest<T>)> = None;
    for i in 0..p {
        let cur = i % 2;
        if let Some((send, recv)) = pending.take() {
            send.wait()?;
            recv.wait(&mut bufs[cur])?;
        }

        let k = (r + p - i - 1) % p;
        let rows_k = block_range(j, p, k);
        let n_k = rows_k.len() * l;
        let contrib = m
            .slice(s![rows_k, col_range.clone()])
            .dot(&a_mat);

        if i == 0 {
            for (slot, &v) in bufs[cur][..n_k].iter_mut().zip(contrib.iter()) {
                *slot = v;
            }
        } else {
            for (slot, &v) in bufs[cur][..n_k].iter_mut().zip(contrib.iter()) {
                *slot = *slot + v;
            }
        }

        if i + 1 < p {
            let send = fiber.isend(&bufs[cur][..n_k], (r + 1) % p, TTM_TAG)?;
            let recv = fiber.irecv::<T>((r + p - 1) % p, TTM_TAG)?;
            pending = Some((send, recv));
        }
    }

    let mut out_global = a.shape_global().to_vec();
    out_global[mode] = j;
    let mut out = Tensor::distributed(a.dist(), &out_global)?;
    let my_rows = block_len(j, p, r);
    let out_shape = out.shape().to_vec();
    mattten(&bufs[(p - 1) % 2][..my_rows * l], out.data_mut(), &out_shape, mode)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use scirs2_core::ndarray_ext::Array2;
    use tendist_comm::World;

    /// Dense mode-n product computed with plain index loops, as a
    /// reference for the matricized implementations.
    fn dense_reference(
        data: &[f64],
        shape: &[usize],
        m: &Array2<f64>,
        mode: usize,
    ) -> (Vec<f64>, Vec<usize>) {
        let mut out_shape = shape.to_vec();
        out_shape[mode] = m.nrows();
        let total: usize = out_shape.iter().product();
        let mut out = vec![0.0; total];
        let mut idx = vec![0usize; shape.len()];
        loop {
            let lin = tendist_core::shape::ravel(&idx, shape);
            for row in 0..m.nrows() {
                let mut out_idx = idx.clone();
                out_idx[mode] = row;
                out[tendist_core::shape::ravel(&out_idx, &out_shape)] +=
                    m[[row, idx[mode]]] * data[lin];
            }
            if !tendist_core::shape::next_index(&mut idx, shape) {
                break;
            }
        }
        (out, out_shape)
    }

    #[test]
    fn local_ttm_matches_dense_reference() {
        let comm = World::communicators(1).into_iter().next().unwrap();
        let shape = [4, 3, 2];
        let data: Vec<f64> = (0..24).map(|x| (x as f64) * 0.5 - 3.0).collect();
        let a = Tensor::from_vec_replicated(data.clone(), &shape, &comm).unwrap();

        let m = Array2::from_shape_fn((5, 4), |(i, j)| (i * 4 + j) as f64 * 0.25);
        let m_t = Tensor::from_matrix(&m, &comm);

        let y = ttm(&a, &m_t, 0).unwrap();
        let (expect, out_shape) = dense_reference(&data, &shape, &m, 0);
        assert_eq!(y.shape_global(), &out_shape[..]);
        for (got, want) in y.data().iter().zip(expect.iter()) {
            assert!((got - want).abs() < 1e-12);
        }
    }

    #[test]
    fn ttm_rejects_bad_factor() {
        let comm = World::communicators(1).into_iter().next().unwrap();
        let a = Tensor::<f64>::replicated(&[4, 3], &comm);
        let m = Tensor::<f64>::replicated(&[5, 99], &comm);
        assert!(ttm(&a, &m, 0).is_err());
        let cube = Tensor::<f64>::replicated(&[2, 2, 2], &comm);
        assert!(ttm(&a, &cube, 0).is_err());
        assert!(ttm(&a, &m, 7).is_err());
    }

    #[test]
    fn ttmc_empty_chain_is_a_copy() {
        let comm = World::communicators(1).into_iter().next().unwrap();
        let mut a = Tensor::<f64>::replicated(&[2, 2], &comm);
        a.fill_with(|idx| (idx[0] + idx[1]) as f64).unwrap();
        let y = ttmc(&a, &[], &[]).unwrap();
        assert_eq!(y.data(), a.data());
    }
}
