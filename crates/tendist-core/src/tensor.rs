//! Distributed dense tensors.
//!
//! A [`Tensor`] owns a contiguous row-major buffer holding either its
//! rank's block of a Cartesian-distributed tensor or a full replicated
//! copy, and shares its distribution descriptor and communicator with
//! the kernels operating on it.

use std::sync::Arc;

use scirs2_core::ndarray_ext::Array2;
use scirs2_core::numeric::{Float, Num, NumCast};
use scirs2_core::random::{Distribution as RandDistribution, RandNormal, Rng};
use tendist_comm::{CommScalar, Communicator, ReduceOp};

use crate::distribution::Distribution;
use crate::error::{CoreError, CoreResult};
use crate::shape::{next_index, Shape};

/// Dense N-dimensional tensor with a shared distribution descriptor.
///
/// The local buffer is always row-major contiguous. For a
/// `CartesianBlock` distribution it holds exactly this rank's
/// hyper-slab; for `Global` it holds the whole tensor, identically on
/// every rank; for `Local` it is private to the process.
#[derive(Debug)]
pub struct Tensor<T> {
    data: Vec<T>,
    shape_global: Shape,
    shape_local: Shape,
    dist: Arc<Distribution>,
    comm: Communicator,
}

impl<T: Clone> Clone for Tensor<T> {
    fn clone(&self) -> Self {
        Tensor {
            data: self.data.clone(),
            shape_global: self.shape_global.clone(),
            shape_local: self.shape_local.clone(),
            dist: Arc::clone(&self.dist),
            comm: self.comm.clone(),
        }
    }
}

impl<T> Tensor<T>
where
    T: Clone + Num,
{
    /// Block-distributed tensor of zeros under `dist`.
    ///
    /// `dist` must be a `CartesianBlock` whose grid order matches the
    /// tensor order; each rank allocates its `local_size`.
    pub fn distributed(dist: &Arc<Distribution>, global: &[usize]) -> CoreResult<Self> {
        let cart = dist
            .as_cartesian()
            .ok_or_else(|| CoreError::unsupported("Tensor::distributed", dist.kind()))?;
        let shape_local = cart.local_shape_of(cart.rank(), global)?;
        let len = shape_local.iter().product();
        Ok(Tensor {
            data: vec![T::zero(); len],
            shape_global: global.to_vec(),
            shape_local,
            dist: Arc::clone(dist),
            comm: cart.comm().clone(),
        })
    }

    /// Replicated tensor of zeros: every rank holds the full extent.
    pub fn replicated(global: &[usize], comm: &Communicator) -> Self {
        let len = global.iter().product();
        Tensor {
            data: vec![T::zero(); len],
            shape_global: global.to_vec(),
            shape_local: global.to_vec(),
            dist: Arc::new(Distribution::Global),
            comm: comm.clone(),
        }
    }

    /// Replicated tensor from row-major data.
    pub fn from_vec_replicated(
        data: Vec<T>,
        global: &[usize],
        comm: &Communicator,
    ) -> CoreResult<Self> {
        let expected: usize = global.iter().product();
        if data.len() != expected {
            return Err(CoreError::shape_mismatch(
                "Tensor::from_vec_replicated",
                global,
                &[data.len()],
            ));
        }
        Ok(Tensor {
            data,
            shape_global: global.to_vec(),
            shape_local: global.to_vec(),
            dist: Arc::new(Distribution::Global),
            comm: comm.clone(),
        })
    }

    /// Process-private tensor from row-major data.
    pub fn local(data: Vec<T>, shape: &[usize], comm: &Communicator) -> CoreResult<Self> {
        let expected: usize = shape.iter().product();
        if data.len() != expected {
            return Err(CoreError::shape_mismatch("Tensor::local", shape, &[data.len()]));
        }
        Ok(Tensor {
            data,
            shape_global: shape.to_vec(),
            shape_local: shape.to_vec(),
            dist: Arc::new(Distribution::Local),
            comm: comm.clone(),
        })
    }

    /// Replicated matrix from a 2-D array (row-major copy).
    pub fn from_matrix(matrix: &Array2<T>, comm: &Communicator) -> Self {
        let shape = [matrix.nrows(), matrix.ncols()];
        let data: Vec<T> = matrix.iter().cloned().collect();
        Tensor {
            data,
            shape_global: shape.to_vec(),
            shape_local: shape.to_vec(),
            dist: Arc::new(Distribution::Global),
            comm: comm.clone(),
        }
    }

    /// Tensor order.
    pub fn ndim(&self) -> usize {
        self.shape_global.len()
    }

    /// Local block extents.
    pub fn shape(&self) -> &[usize] {
        &self.shape_local
    }

    /// Global extents.
    pub fn shape_global(&self) -> &[usize] {
        &self.shape_global
    }

    /// Local element count.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn data(&self) -> &[T] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [T] {
        &mut self.data
    }

    pub fn dist(&self) -> &Arc<Distribution> {
        &self.dist
    }

    pub fn comm(&self) -> &Communicator {
        &self.comm
    }

    /// Global index range this rank owns along `mode`.
    pub fn global_range(&self, mode: usize) -> CoreResult<std::ops::Range<usize>> {
        if mode >= self.ndim() {
            return Err(CoreError::InvalidMode {
                mode,
                order: self.ndim(),
            });
        }
        match self.dist.as_cartesian() {
            Some(cart) => Ok(cart.local_range(self.shape_global[mode], mode)),
            None => Ok(0..self.shape_global[mode]),
        }
    }

    /// Fill the local block from a function of the *global* index.
    ///
    /// Every rank evaluates `f` only on the indices it owns, so a
    /// distributed and a replicated tensor filled from the same `f`
    /// agree element-wise.
    pub fn fill_with(&mut self, f: impl Fn(&[usize]) -> T) -> CoreResult<()> {
        if self.data.is_empty() {
            return Ok(());
        }
        let starts: Vec<usize> = (0..self.ndim())
            .map(|k| self.global_range(k).map(|r| r.start))
            .collect::<CoreResult<_>>()?;
        let shape_local = self.shape_local.clone();
        let mut local = vec![0usize; shape_local.len()];
        let mut global = starts.clone();
        let mut lin = 0;
        loop {
            self.data[lin] = f(&global);
            lin += 1;
            if !next_index(&mut local, &shape_local) {
                break;
            }
            for (k, &s) in starts.iter().enumerate() {
                global[k] = s + local[k];
            }
        }
        Ok(())
    }
}

impl<T> Tensor<T>
where
    T: Clone + Num + NumCast,
{
    /// Fill the local block with i.i.d. samples from N(0, 1).
    ///
    /// Seeding is the caller's concern; pass a per-rank seeded RNG to
    /// make the distributed content reproducible.
    pub fn randn<R: Rng>(&mut self, rng: &mut R) {
        let normal = RandNormal::new(0.0f64, 1.0).unwrap();
        for v in &mut self.data {
            *v = T::from(normal.sample(rng)).unwrap();
        }
    }
}

impl<T> Tensor<T>
where
    T: Float + CommScalar,
{
    /// Frobenius norm of the *global* tensor.
    ///
    /// Block-distributed tensors sum their local squares and
    /// allreduce over the grid, so every rank returns the same value.
    pub fn fnorm(&self) -> CoreResult<T> {
        let local: T = self
            .data
            .iter()
            .fold(<T as scirs2_core::Zero>::zero(), |acc, &x| acc + x * x);
        let mut buf = [local];
        if self.dist.as_cartesian().is_some() {
            self.comm.allreduce(&mut buf, ReduceOp::Sum)?;
        }
        Ok(buf[0].sqrt())
    }
}

impl<T> Tensor<T>
where
    T: Clone + Num,
{
    /// View a replicated or private 2-D tensor as a matrix.
    pub fn to_matrix(&self) -> CoreResult<Array2<T>> {
        if self.ndim() != 2 {
            return Err(CoreError::invalid_config(format!(
                "to_matrix requires an order-2 tensor, got order {}",
                self.ndim()
            )));
        }
        if self.dist.as_cartesian().is_some() {
            return Err(CoreError::unsupported("Tensor::to_matrix", self.dist.kind()));
        }
        Array2::from_shape_vec((self.shape_local[0], self.shape_local[1]), self.data.clone())
            .map_err(|_| {
                CoreError::shape_mismatch("Tensor::to_matrix", &self.shape_local, &[self.data.len()])
            })
    }
}
