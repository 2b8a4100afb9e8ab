//! # tendist-core
//!
//! Core types for distributed dense tensor computing in TenDist:
//!
//! - **Block-partition arithmetic** ([`shape`]) - the balanced block
//!   map `[⌈S·c/P⌉, ⌈S·(c+1)/P⌉)`, row-major strides, index raveling.
//! - **Distributions** ([`distribution`]) - Local, Global (replicated)
//!   and CartesianBlock placements, plus the per-mode fiber and slab
//!   subcommunicators with lazy caching.
//! - **Tensors** ([`tensor`]) - contiguous row-major local storage with
//!   a shared distribution descriptor and communicator, `randn`
//!   initialisation and the distributed Frobenius norm.
//!
//! ## Placement model
//!
//! A Cartesian partition `par = (P₁,…,P_N)` with `∏ P_k` equal to the
//! communicator size assigns rank `r` the grid coordinate obtained by
//! row-major unravel, and along each mode the contiguous balanced block
//! of indices for that coordinate. Blocks differ in length by at most
//! one, cover the extent exactly, and lexicographic coordinate order
//! equals rank order.
//!
//! ```
//! use std::sync::Arc;
//! use tendist_comm::World;
//! use tendist_core::{Distribution, Tensor};
//!
//! World::spawn(2, |comm| {
//!     let dist = Arc::new(Distribution::cartesian(vec![2, 1], comm.clone()).unwrap());
//!     let mut t = Tensor::<f64>::distributed(&dist, &[4, 3]).unwrap();
//!     t.fill_with(|idx| idx[0] as f64).unwrap();
//!     assert_eq!(t.shape(), &[2, 3]);
//! });
//! ```
//!
//! Operations combining two tensors require identical partitions or a
//! replicated side; the kernels in `tendist-kernels` enforce this and
//! reject anything else.

pub mod distribution;
pub mod error;
pub mod shape;
pub mod tensor;

pub use distribution::{CartesianBlock, Distribution, FiberComms};
pub use error::{CoreError, CoreResult};
pub use shape::Shape;
pub use tensor::Tensor;
