//! Process-group host and scalar/reduction definitions.

use std::any::Any;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::AtomicU64;
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use crate::comm::Communicator;

mod sealed {
    pub trait Sealed {}
    impl Sealed for f32 {}
    impl Sealed for f64 {}
    impl Sealed for usize {}
}

/// Element types the fabric can move and reduce.
///
/// Sealed: the mailbox transfers typed vectors, and the reduction
/// combinators below are the only arithmetic the fabric performs.
pub trait CommScalar: sealed::Sealed + Copy + Send + PartialOrd + 'static {
    fn zero() -> Self;
    fn combine_sum(self, other: Self) -> Self;
    fn combine_max(self, other: Self) -> Self;
}

macro_rules! impl_comm_scalar {
    ($($t:ty),*) => {$(
        impl CommScalar for $t {
            fn zero() -> Self {
                Default::default()
            }

            fn combine_sum(self, other: Self) -> Self {
                self + other
            }

            fn combine_max(self, other: Self) -> Self {
                if other > self { other } else { self }
            }
        }
    )*};
}

impl_comm_scalar!(f32, f64, usize);

/// Reduction operators for `allreduce` / `reduce_scatter`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReduceOp {
    Sum,
    Max,
}

impl ReduceOp {
    pub(crate) fn combine<T: CommScalar>(self, a: T, b: T) -> T {
        match self {
            ReduceOp::Sum => a.combine_sum(b),
            ReduceOp::Max => a.combine_max(b),
        }
    }
}

/// Address of one in-flight message queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct MsgKey {
    pub ctx: u64,
    pub src: usize,
    pub dst: usize,
    pub tag: u64,
}

/// Shared state of one process group: the mailbox and the context-id
/// allocator used by `split`.
pub(crate) struct WorldState {
    pub size: usize,
    pub next_ctx: AtomicU64,
    pub mail: Mutex<HashMap<MsgKey, VecDeque<Box<dyn Any + Send>>>>,
    pub arrived: Condvar,
}

impl WorldState {
    fn new(size: usize) -> Arc<Self> {
        Arc::new(WorldState {
            size,
            // ctx 0 is the world communicator itself
            next_ctx: AtomicU64::new(1),
            mail: Mutex::new(HashMap::new()),
            arrived: Condvar::new(),
        })
    }
}

/// An in-process SPMD process group.
///
/// `World` is the entry point of the fabric: it creates the
/// communicators for a group of `size` ranks sharing one mailbox.
/// Ranks are driven either by caller-managed threads
/// ([`World::communicators`]) or by the scoped harness
/// ([`World::spawn`]), which is what the CLI driver and the multi-rank
/// tests use.
pub struct World;

impl World {
    /// Create the world communicators for a group of `size` ranks.
    ///
    /// Element `r` of the returned vector is the communicator rank `r`
    /// must use; handing it to any other rank breaks message routing.
    ///
    /// # Panics
    ///
    /// Panics if `size` is zero.
    pub fn communicators(size: usize) -> Vec<Communicator> {
        assert!(size > 0, "world size must be positive");
        let state = WorldState::new(size);
        let members: Arc<Vec<usize>> = Arc::new((0..size).collect());
        (0..size)
            .map(|rank| Communicator::from_parts(Arc::clone(&state), 0, Arc::clone(&members), rank))
            .collect()
    }

    /// Run `f` on every rank of a fresh `size`-rank world, one thread
    /// per rank, and return the per-rank results in rank order.
    ///
    /// The closure is the SPMD program: each invocation receives its
    /// own rank's communicator. A panic on any rank propagates.
    pub fn spawn<F, R>(size: usize, f: F) -> Vec<R>
    where
        F: Fn(Communicator) -> R + Send + Sync,
        R: Send,
    {
        let comms = Self::communicators(size);
        let f = &f;
        std::thread::scope(|scope| {
            let handles: Vec<_> = comms
                .into_iter()
                .map(|comm| scope.spawn(move || f(comm)))
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().expect("SPMD rank panicked"))
                .collect()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn world_ranks_are_ordered() {
        let ranks = World::spawn(3, |comm| (comm.rank(), comm.size()));
        assert_eq!(ranks, vec![(0, 3), (1, 3), (2, 3)]);
    }

    #[test]
    fn reduce_op_combines() {
        assert_eq!(ReduceOp::Sum.combine(2.0f64, 3.0), 5.0);
        assert_eq!(ReduceOp::Max.combine(2usize, 3), 3);
        assert_eq!(ReduceOp::Max.combine(4.0f32, 3.0), 4.0);
    }

    #[test]
    #[should_panic(expected = "world size must be positive")]
    fn zero_world_rejected() {
        World::communicators(0);
    }
}
