//! Tucker decomposition of a block-distributed tensor by HOOI-ALS.
//!
//! The tensor X is factored as G ×₁ U₁ ×₂ U₂ ⋯ ×ₙ Uₙ with orthonormal
//! factors Uᵢ of the requested ranks and a distributed core G.
//! Initialisation is one HOSVD sweep (leading left singular vectors of
//! every mode's Gram); each HOOI iteration then revisits the modes in
//! ascending order, shrinks all *other* modes with the current factors,
//! and refreshes the mode's factor from the Gram of that residual. The
//! ascending update order is part of the contract: it fixes the
//! floating-point rounding pattern across ranks.
//!
//! The mode-n Gram is replicated by the kernels, so the eigensolve runs
//! redundantly on every rank and stays bit-identical without any
//! additional communication.

use std::iter::Sum;

use scirs2_core::ndarray_ext::{Array2, ScalarOperand};
use scirs2_core::numeric::{Float, NumAssign, NumCast};
use scirs2_linalg::svd;
use tendist_comm::CommScalar;
use tendist_core::{CoreError, Tensor};
use tendist_kernels::{gram, ttm, ttmc, KernelError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TuckerError {
    #[error("invalid ranks: {0}")]
    InvalidRanks(String),

    #[error("eigensolve failed: {0}")]
    EigenError(String),

    #[error(transparent)]
    Kernel(#[from] KernelError),

    #[error(transparent)]
    Core(#[from] CoreError),
}

/// Result of a Tucker decomposition.
pub struct TuckerDecomp<T> {
    /// Core tensor of shape `(R₁,…,R_N)`, block-distributed under the
    /// input's partition grid.
    pub core: Tensor<T>,

    /// Replicated factor matrices, `factors[k]` of shape `(I_k, R_k)`
    /// with orthonormal columns.
    pub factors: Vec<Array2<T>>,

    /// Projected energy `‖G‖²` recorded after each HOOI sweep;
    /// non-decreasing, so the residual `‖X‖² − ‖G‖²` never grows.
    pub energy: Vec<T>,

    /// Number of HOOI sweeps performed.
    pub iters: usize,
}

impl<T> TuckerDecomp<T>
where
    T: Float + CommScalar,
{
    /// Residual energy `‖X‖² − ‖G‖²` against the decomposed tensor.
    pub fn residual(&self, original: &Tensor<T>) -> Result<T, TuckerError> {
        let x = original.fnorm()?;
        let g = self.core.fnorm()?;
        Ok(x * x - g * g)
    }
}

/// Bound satisfied by the element types the driver supports; the SVD
/// and the distributed kernels both instantiate for `f32` and `f64`.
pub trait HooiScalar:
    Float + NumCast + NumAssign + Sum + ScalarOperand + CommScalar + std::fmt::Debug + Sync
{
}

impl<T> HooiScalar for T where
    T: Float + NumCast + NumAssign + Sum + ScalarOperand + CommScalar + std::fmt::Debug + Sync
{
}

/// Compute the HOOI-ALS Tucker decomposition of `tensor` to the target
/// `ranks`, running `iterations` sweeps after the HOSVD start.
///
/// `tensor` must be block-distributed; the factors come back replicated
/// and identical on every rank, and the core stays on the grid.
///
/// # Errors
///
/// Rejects a rank list whose length differs from the tensor order or
/// with any `R_k` outside `1..=I_k`; propagates kernel and eigensolve
/// failures. Any failure is fatal to the run, never retried.
pub fn hooi_als<T>(
    tensor: &Tensor<T>,
    ranks: &[usize],
    iterations: usize,
) -> Result<TuckerDecomp<T>, TuckerError>
where
    T: HooiScalar,
{
    let n = tensor.ndim();
    validate_ranks(tensor.shape_global(), ranks, n)?;

    // HOSVD sweep: leading left singular vectors of every mode's Gram.
    let mut factors = Vec::with_capacity(n);
    for mode in 0..n {
        let g = gram(tensor, mode)?;
        let (u, _) = leading_eigenvectors(&g.to_matrix()?, ranks[mode])?;
        factors.push(u);
    }

    let mut energy = Vec::with_capacity(iterations);
    for sweep in 0..iterations {
        for mode in 0..n {
            // Y = X ×_{k≠mode} U_k^⊤, modes ascending
            let mut y: Option<Tensor<T>> = None;
            for (k, factor) in factors.iter().enumerate() {
                if k == mode {
                    continue;
                }
                let ut = Tensor::from_matrix(&transpose_matrix(factor), tensor.comm());
                let next = match &y {
                    Some(t) => ttm(t, &ut, k)?,
                    None => ttm(tensor, &ut, k)?,
                };
                y = Some(next);
            }

            let g = match &y {
                Some(t) => gram(t, mode)?,
                None => gram(tensor, mode)?,
            };
            let (u, projected) = leading_eigenvectors(&g.to_matrix()?, ranks[mode])?;
            factors[mode] = u;

            if mode == n - 1 {
                tracing::debug!(sweep, energy = ?projected, "hooi sweep complete");
                energy.push(projected);
            }
        }
    }

    // G = X ×₁ U₁^⊤ ⋯ ×_N U_N^⊤
    let mats: Vec<Tensor<T>> = factors
        .iter()
        .map(|u| Tensor::from_matrix(&transpose_matrix(u), tensor.comm()))
        .collect();
    let modes: Vec<usize> = (0..n).collect();
    let core = ttmc(tensor, &mats, &modes)?;

    Ok(TuckerDecomp {
        core,
        factors,
        energy,
        iters: iterations,
    })
}

fn validate_ranks(shape: &[usize], ranks: &[usize], n: usize) -> Result<(), TuckerError> {
    if ranks.len() != n {
        return Err(TuckerError::InvalidRanks(format!(
            "expected {} ranks, got {}",
            n,
            ranks.len()
        )));
    }
    for (mode, (&rank, &extent)) in ranks.iter().zip(shape.iter()).enumerate() {
        if rank == 0 || rank > extent {
            return Err(TuckerError::InvalidRanks(format!(
                "rank {rank} for mode {mode} must lie in 1..={extent}"
            )));
        }
    }
    Ok(())
}

/// Leading `rank` eigenvectors of a replicated symmetric PSD matrix,
/// plus the sum of the retained eigenvalues.
///
/// A Gram matrix is PSD, so its left singular vectors are its
/// eigenvectors with the eigenvalues in descending order; the SVD
/// stands in for a symmetric eigensolver.
fn leading_eigenvectors<T>(matrix: &Array2<T>, rank: usize) -> Result<(Array2<T>, T), TuckerError>
where
    T: HooiScalar,
{
    let (u, s, _vt) = svd(&matrix.view(), false, None)
        .map_err(|e| TuckerError::EigenError(format!("SVD of {:?} Gram: {}", matrix.shape(), e)))?;
    let kept = rank.min(u.ncols());
    let mut top = Array2::<T>::zeros((u.nrows(), kept));
    for i in 0..u.nrows() {
        for j in 0..kept {
            top[[i, j]] = u[[i, j]];
        }
    }
    let projected = (0..kept).map(|j| s[j]).fold(<T as scirs2_core::Zero>::zero(), |acc, x| acc + x);
    Ok((top, projected))
}

fn transpose_matrix<T>(matrix: &Array2<T>) -> Array2<T>
where
    T: Float,
{
    let (rows, cols) = (matrix.nrows(), matrix.ncols());
    let mut out = Array2::<T>::zeros((cols, rows));
    for i in 0..rows {
        for j in 0..cols {
            out[[j, i]] = matrix[[i, j]];
        }
    }
    out
}
