//! # TenDist - distributed Tucker decomposition
//!
//! This is the meta crate that re-exports the TenDist components for
//! convenient access.
//!
//! ## Components
//!
//! ### Communication fabric ([`comm`])
//!
//! SPMD communicators with MPI-shaped collectives, non-blocking
//! point-to-point and `split`; a [`World`](comm::World) hosts the rank
//! group in-process.
//!
//! ### Core types ([`core`])
//!
//! Balanced block partitions, Cartesian distributions with fiber/slab
//! subcommunicators, and the distributed dense [`Tensor`](core::Tensor).
//!
//! ### Kernels ([`kernels`])
//!
//! Matricization, the ring TTM and Gram/TTT-except-n kernels, and
//! gather/scatter redistribution.
//!
//! ### Decomposition ([`decomp`])
//!
//! The HOOI-ALS driver producing a distributed Tucker core and
//! replicated orthonormal factors.
//!
//! ## Quick start
//!
//! ```
//! use std::sync::Arc;
//! use tendist::prelude::*;
//!
//! World::spawn(2, |comm| {
//!     let dist = Arc::new(Distribution::cartesian(vec![2, 1, 1], comm.clone()).unwrap());
//!     let mut t = Tensor::<f64>::distributed(&dist, &[6, 5, 4]).unwrap();
//!     t.fill_with(|idx| (idx[0] + idx[1] * idx[2]) as f64).unwrap();
//!
//!     let decomp = hooi_als(&t, &[2, 2, 2], 3).unwrap();
//!     assert_eq!(decomp.core.shape_global(), &[2, 2, 2]);
//! });
//! ```

pub use tendist_comm as comm;
pub use tendist_core as core;
pub use tendist_decomp as decomp;
pub use tendist_kernels as kernels;

/// Common imports for working with the stack.
pub mod prelude {
    pub use tendist_comm::{CommScalar, Communicator, ReduceOp, World};
    pub use tendist_core::{CartesianBlock, Distribution, Shape, Tensor};
    pub use tendist_decomp::{hooi_als, TuckerDecomp};
    pub use tendist_kernels::{gather, gram, scatter, tenmat, ttm, ttmc, ttt_except};
}
