//! # tendist-kernels
//!
//! Distributed multilinear-algebra kernels for TenDist:
//!
//! - **Matricization** ([`matricize`]) - `tenmat` / `tenmatt` /
//!   `mattten` on local row-major buffers, little-endian column order.
//! - **TTM** ([`ttm`]) - `A ×_n M` with a block-distributed tensor and
//!   a replicated factor, as a double-buffered ring over the mode-n
//!   fiber; plus the local path and the pure chained [`ttm::ttmc`].
//! - **Gram / TTT-except-n** ([`gram`]) - `A_(n) B_(n)^⊤` as a ring
//!   with slab allreduce and fiber allgatherv; result replicated.
//! - **Redistribution** ([`redistribute`]) - `gather` to a replicated
//!   copy and `scatter` back onto a grid, both through root reordering
//!   between rank-contiguous and row-major layouts.
//!
//! The ring kernels communicate `P − 1` rotations of one block each on
//! the fiber, independent of the extents of the other modes; each step
//! overlaps its local GEMM with the next block already in flight. The
//! only shared-buffer hazard is reusing a buffer before its transfer
//! completes, which the wait pair at the top of every step rules out.

pub mod error;
pub mod gram;
pub mod matricize;
pub mod redistribute;
pub mod ttm;

pub use error::{KernelError, KernelResult};
pub use gram::{gram, ttt_except};
pub use matricize::{mattten, tenmat, tenmatt};
pub use redistribute::{gather, scatter};
pub use ttm::{ttm, ttmc};
