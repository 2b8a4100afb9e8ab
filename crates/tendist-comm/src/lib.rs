//! # tendist-comm
//!
//! SPMD message-passing fabric for the TenDist stack.
//!
//! This crate provides the communication layer the distributed tensor
//! kernels are written against: a [`Communicator`] with MPI-shaped
//! collectives (`allreduce`, `allgather(v)`, `gatherv`, `scatterv`,
//! `bcast`, `reduce_scatter`), non-blocking point-to-point
//! (`isend` / `irecv` / `wait`), and `split` for deriving
//! subcommunicators by color and key.
//!
//! ## Execution model
//!
//! A [`World`] hosts a fixed group of SPMD ranks inside one process,
//! one OS thread per rank. Every rank executes the same control flow
//! over distinct local data; collectives must therefore be called by
//! all members of a communicator in the same order. Messages are
//! buffered at the sender, so `isend` completes immediately and a ring
//! exchange never deadlocks.
//!
//! ```
//! use tendist_comm::{ReduceOp, World};
//!
//! let sums = World::spawn(4, |comm| {
//!     let mut buf = [comm.rank() as f64];
//!     comm.allreduce(&mut buf, ReduceOp::Sum).unwrap();
//!     buf[0]
//! });
//! assert_eq!(sums, vec![6.0; 4]);
//! ```
//!
//! ## Scalars
//!
//! Buffers are slices of [`CommScalar`] types (`f32`, `f64`, `usize`).
//! The trait is sealed; the fabric moves typed vectors between ranks
//! and never reinterprets bytes.

pub mod comm;
pub mod error;
pub mod world;

pub use comm::{Communicator, RecvRequest, SendRequest};
pub use error::{CommError, CommResult};
pub use world::{CommScalar, ReduceOp, World};
