//! # tendist-decomp
//!
//! Tucker decomposition of block-distributed tensors.
//!
//! The single entry point is [`hooi_als`]: HOSVD initialisation (one
//! Gram + eigensolve per mode) followed by HOOI-ALS sweeps, built
//! entirely from the distributed TTM and Gram kernels in
//! `tendist-kernels`. Factor matrices come back replicated and
//! orthonormal; the Tucker core keeps the input's partition grid.
//!
//! ```
//! use std::sync::Arc;
//! use tendist_comm::World;
//! use tendist_core::{Distribution, Tensor};
//! use tendist_decomp::hooi_als;
//!
//! World::spawn(2, |comm| {
//!     let dist = Arc::new(Distribution::cartesian(vec![2, 1], comm.clone()).unwrap());
//!     let mut t = Tensor::<f64>::distributed(&dist, &[6, 5]).unwrap();
//!     t.fill_with(|idx| (idx[0] * 5 + idx[1]) as f64).unwrap();
//!
//!     let decomp = hooi_als(&t, &[2, 2], 3).unwrap();
//!     assert_eq!(decomp.core.shape_global(), &[2, 2]);
//!     assert_eq!(decomp.factors[0].shape(), &[6, 2]);
//! });
//! ```

pub mod tucker;

pub use tucker::{hooi_als, HooiScalar, TuckerDecomp, TuckerError};
