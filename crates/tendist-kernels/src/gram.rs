//! Mode-n Gram and TTT-except-n: `A_(n) B_(n)^⊤` for block-distributed
//! tensors agreeing on every mode but n.
//!
//! Ring over the mode-n fiber with double buffering: the transposed
//! matricization of B rotates around the fiber while every process
//! multiplies its own `A_(n)` slab against whichever block it holds,
//! writing each product into the staging area at that peer's column
//! offset. A slab allreduce then completes the dot products over the
//! remaining modes, and a fiber allgatherv replicates the
//! `(I_n^A × I_n^B)` result everywhere.

use scirs2_core::ndarray_ext::ArrayView2;
use scirs2_core::numeric::Float;
use tendist_comm::{CommScalar, ReduceOp};
use tendist_core::Tensor;

use crate::error::{KernelError, KernelResult};
use crate::matricize::{tenmat, tenmatt};

const GRAM_TAG: u64 = 2;

/// Mode-`mode` Gram matrix `A_(n) A_(n)^⊤` of a block-distributed
/// tensor, replicated on every rank.
pub fn gram<T>(a: &Tensor<T>, mode: usize) -> KernelResult<Tensor<T>>
where
    T: Float + CommScalar,
{
    ttt_except(a, a, mode)
}

/// `A_(n) B_(n)^⊤` for block-distributed `a`, `b` agreeing on every
/// mode and local extent except possibly mode `mode`.
///
/// The result is a replicated `(I_n^A × I_n^B)` matrix tensor; in the
/// Gram case it is symmetric (no symmetry shortcut is taken).
pub fn ttt_except<T>(a: &Tensor<T>, b: &Tensor<T>, mode: usize) -> KernelResult<Tensor<T>>
where
    T: Float + CommScalar,
{
    if mode >= a.ndim() {
        return Err(KernelError::invalid_mode(mode, a.ndim()));
    }
    let (a_cart, b_cart) = match (a.dist().as_cartesian(), b.dist().as_cartesian()) {
        (Some(x), Some(y)) => (x, y),
        (None, _) => return Err(KernelError::unsupported("ttt_except", a.dist().kind())),
        (_, None) => return Err(KernelError::unsupported("ttt_except", b.dist().kind())),
    };
    if a_cart.par() != b_cart.par() {
        return Err(KernelError::PartitionMismatch {
            operation: "ttt_except".into(),
            left: a_cart.par().to_vec(),
            right: b_cart.par().to_vec(),
        });
    }
    for k in 0..a.ndim() {
        if k != mode && a.shape_global()[k] != b.shape_global()[k] {
            return Err(KernelError::shape_mismatch(
                "ttt_except",
                a.shape_global(),
                b.shape_global(),
            ));
        }
    }

    let fibers = a_cart.fiber_comms(mode)?;
    let (fiber, slab) = (fibers.fiber, fibers.slab);
    let p = fiber.size();
    let r = fiber.rank();

    let a_rows = a.shape()[mode];
    let b_rows = b.shape()[mode];
    let l: usize = a
        .shape()
        .iter()
        .enumerate()
        .filter(|&(k, _)| k != mode)
        .map(|(_, &s)| s)
        .product();

    // Per-peer mode-n block lengths along the fiber, and the staging
    // column offsets over B's rows.
    let mut a_lens = vec![0usize; p];
    fiber.allgather(&[a_rows], &mut a_lens)?;
    let mut b_lens = vec![0usize; p];
    fiber.allgather(&[b_rows], &mut b_lens)?;
    let in_a: usize = a_lens.iter().sum();
    let in_b: usize = b_lens.iter().sum();
    let mut starts = vec![0usize; p];
    for k in 1..p {
        starts[k] = starts[k - 1] + b_lens[k - 1];
    }

    // Every process sizes the rotating buffers to the largest block on
    // the fiber.
    let mut max_elems = [b_rows * l];
    fiber.allreduce(&mut max_elems, ReduceOp::Max)?;
    let mut bufs = [
        vec![<T as scirs2_core::Zero>::zero(); max_elems[0]],
        vec![<T as scirs2_core::Zero>::zero(); max_elems[0]],
    ];

    let a_mat = tenmat(a.data(), a.shape(), mode)?;
    let b_t = tenmatt(b.data(), b.shape(), mode)?;
    for (slot, &v) in bufs[0].iter_mut().zip(b_t.iter()) {
        *slot = v;
    }

    let mut gram_buf = vec![<T as scirs2_core::Zero>::zero(); a_rows * in_b];
    let mut point = r;
    tracing::trace!(mode, p, l, in_a, in_b, "gram ring start");

    let mut pending: Option<(tendist_comm::SendRequest, tendist_comm::RecvRequest<T>)> = None;
    for i in 0..p {
        let cur = i % 2;
        if let Some((send, recv)) = pending.take() {
            send.wait()?;
            recv.wait(&mut bufs[cur])?;
        }

        let cols = b_lens[point];
        let held = ArrayView2::from_shape((l, cols), &bufs[cur][..l * cols]).map_err(|_| {
            KernelError::shape_mismatch("ttt_except", &[l, cols], &[bufs[cur].len()])
        })?;
        let product = a_mat.dot(&held);
        for row in 0..a_rows {
            let base = row * in_b + starts[point];
            for jj in 0..cols {
                gram_buf[base + jj] = product[[row, jj]];
            }
        }

        if i + 1 < p {
            let send = fiber.isend(&bufs[cur][..l * cols], (r + p - 1) % p, GRAM_TAG)?;
            let recv = fiber.irecv::<T>((r + 1) % p, GRAM_TAG)?;
            pending = Some((send, recv));
        }
        point = (point + 1) % p;
    }

    // Sum the column-chunk contributions across the slab, then stack
    // the fiber's row blocks so every rank holds the full matrix.
    slab.allreduce(&mut gram_buf, ReduceOp::Sum)?;

    let counts: Vec<usize> = a_lens.iter().map(|&rows| rows * in_b).collect();
    let mut full = vec![<T as scirs2_core::Zero>::zero(); in_a * in_b];
    fiber.allgatherv(&gram_buf, &counts, &mut full)?;

    Ok(Tensor::from_vec_replicated(full, &[in_a, in_b], a.comm())?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tendist_core::Distribution;

    use tendist_comm::World;

    #[test]
    fn four_rank_gram_matches_dense() {
        // A[i,j] = i + 4j on a 4x4 tensor over a 2x2 grid
        World::spawn(4, |comm| {
            let dist = Arc::new(Distribution::cartesian(vec![2, 2], comm.clone()).unwrap());
            let mut a = Tensor::<f64>::distributed(&dist, &[4, 4]).unwrap();
            a.fill_with(|idx| (idx[0] + 4 * idx[1]) as f64).unwrap();

            let g = gram(&a, 0).unwrap();
            assert_eq!(g.shape_global(), &[4, 4]);

            // dense A A^T with A[i,j] = i + 4j
            for i in 0..4 {
                for k in 0..4 {
                    let want: f64 = (0..4)
                        .map(|j| ((i + 4 * j) * (k + 4 * j)) as f64)
                        .sum();
                    let got = g.data()[i * 4 + k];
                    assert!((got - want).abs() < 1e-9, "({i},{k}): {got} vs {want}");
                }
            }
        });
    }

    #[test]
    fn gram_is_symmetric() {
        World::spawn(2, |comm| {
            let dist = Arc::new(Distribution::cartesian(vec![2, 1, 1], comm.clone()).unwrap());
            let mut a = Tensor::<f64>::distributed(&dist, &[5, 3, 2]).unwrap();
            a.fill_with(|idx| ((idx[0] * 7 + idx[1] * 3 + idx[2]) % 11) as f64 - 5.0)
                .unwrap();

            let g = gram(&a, 0).unwrap();
            for i in 0..5 {
                for j in 0..5 {
                    let gij = g.data()[i * 5 + j];
                    let gji = g.data()[j * 5 + i];
                    assert!((gij - gji).abs() < 1e-12);
                }
            }
        });
    }

    #[test]
    fn ttt_except_rejects_replicated_operands() {
        World::spawn(2, |comm| {
            let dist = Arc::new(Distribution::cartesian(vec![2], comm.clone()).unwrap());
            let a = Tensor::<f64>::distributed(&dist, &[4]).unwrap();
            let r = Tensor::<f64>::replicated(&[4], &comm);
            assert!(ttt_except(&a, &r, 0).is_err());
            assert!(ttt_except(&r, &a, 0).is_err());
        });
    }
}
