//! Data distributions over a process grid.
//!
//! Three variants, a closed union:
//!
//! - [`Distribution::Local`] - the buffer is private to the process.
//! - [`Distribution::Global`] - every process holds an identical copy.
//! - [`Distribution::CartesianBlock`] - each process owns the
//!   rectangular hyper-slab addressed by its grid coordinate under a
//!   partition `par = (P₁,…,P_N)` with `∏ P_k = world size`.
//!
//! The Cartesian variant also owns the *fiber* machinery: for a mode n,
//! the processes whose coordinates differ only in `c_n` form the fiber
//! along n, and the processes sharing `c_n` form the perpendicular
//! slab. Both subcommunicators are built on first use and cached for
//! the distribution's lifetime, since splitting is collective and not
//! cheap.

use std::collections::HashMap;

use parking_lot::Mutex;
use tendist_comm::Communicator;

use crate::error::{CoreError, CoreResult};
use crate::shape::{block_len, block_range, unravel, Shape};

/// Fiber/slab subcommunicator pair for one mode.
#[derive(Clone, Debug)]
pub struct FiberComms {
    /// Processes whose coordinates differ only in `c_n`; rank within
    /// the fiber equals `c_n`.
    pub fiber: Communicator,
    /// Processes sharing `c_n`, ordered by slab color.
    pub slab: Communicator,
}

/// Cartesian block distribution over a process grid.
#[derive(Debug)]
pub struct CartesianBlock {
    par: Shape,
    rank: usize,
    coord: Shape,
    comm: Communicator,
    fibers: Mutex<HashMap<usize, FiberComms>>,
}

impl CartesianBlock {
    /// Build the descriptor for this process under partition `par` on
    /// the grid communicator `comm`.
    pub fn new(par: Shape, comm: Communicator) -> CoreResult<Self> {
        if par.is_empty() || par.iter().any(|&p| p == 0) {
            return Err(CoreError::invalid_config(format!(
                "partition {par:?} must be non-empty with positive factors"
            )));
        }
        let grid: usize = par.iter().product();
        if grid != comm.size() {
            return Err(CoreError::invalid_config(format!(
                "partition {:?} covers {} processes, communicator has {}",
                par,
                grid,
                comm.size()
            )));
        }
        let rank = comm.rank();
        let coord = unravel(rank, &par);
        Ok(CartesianBlock {
            par,
            rank,
            coord,
            comm,
            fibers: Mutex::new(HashMap::new()),
        })
    }

    /// Number of grid dimensions.
    pub fn ndim(&self) -> usize {
        self.par.len()
    }

    pub fn par(&self) -> &[usize] {
        &self.par
    }

    pub fn rank(&self) -> usize {
        self.rank
    }

    /// This process's grid coordinate (row-major unravel of its rank).
    pub fn coord(&self) -> &[usize] {
        &self.coord
    }

    pub fn comm(&self) -> &Communicator {
        &self.comm
    }

    /// Grid coordinate of an arbitrary rank.
    pub fn coord_of(&self, rank: usize) -> Shape {
        unravel(rank, &self.par)
    }

    /// Local block extents of `rank` for a tensor of `global` shape.
    pub fn local_shape_of(&self, rank: usize, global: &[usize]) -> CoreResult<Shape> {
        if global.len() != self.par.len() {
            return Err(CoreError::invalid_config(format!(
                "global shape {:?} has {} modes, partition {:?} has {}",
                global,
                global.len(),
                self.par,
                self.par.len()
            )));
        }
        let coord = self.coord_of(rank);
        Ok(global
            .iter()
            .zip(self.par.iter().zip(coord.iter()))
            .map(|(&extent, (&parts, &c))| block_len(extent, parts, c))
            .collect())
    }

    /// Element count of `rank`'s block.
    pub fn local_size_of(&self, rank: usize, global: &[usize]) -> CoreResult<usize> {
        Ok(self.local_shape_of(rank, global)?.iter().product())
    }

    /// Global index range this process owns along `mode`.
    pub fn local_range(&self, extent: usize, mode: usize) -> std::ops::Range<usize> {
        block_range(extent, self.par[mode], self.coord[mode])
    }

    /// Fiber addressing for `mode`: `(slab_color, fiber_rank)`.
    ///
    /// The color packs the N−1 other coordinates into one integer,
    /// mixed-radix over `par` with `mode` removed; the key is `c_n`, so
    /// fiber rank order equals coordinate order.
    pub fn process_fiber(&self, mode: usize) -> (usize, usize) {
        let mut color = 0;
        for k in 0..self.par.len() {
            if k != mode {
                color = color * self.par[k] + self.coord[k];
            }
        }
        (color, self.coord[mode])
    }

    /// Fiber and slab subcommunicators for `mode`, built lazily and
    /// cached. Collective on first call per mode.
    pub fn fiber_comms(&self, mode: usize) -> CoreResult<FiberComms> {
        if mode >= self.par.len() {
            return Err(CoreError::InvalidMode {
                mode,
                order: self.par.len(),
            });
        }
        let mut cache = self.fibers.lock();
        if let Some(pair) = cache.get(&mode) {
            return Ok(pair.clone());
        }
        let (color, key) = self.process_fiber(mode);
        let fiber = self.comm.split(color, key)?;
        let slab = self.comm.split(key, color)?;
        tracing::debug!(mode, color, key, "built fiber/slab communicators");
        let pair = FiberComms { fiber, slab };
        cache.insert(mode, pair.clone());
        Ok(pair)
    }
}

/// A tensor's placement across the process group.
#[derive(Debug)]
pub enum Distribution {
    Local,
    Global,
    CartesianBlock(CartesianBlock),
}

impl Distribution {
    /// Convenience constructor for the Cartesian variant.
    pub fn cartesian(par: Shape, comm: Communicator) -> CoreResult<Self> {
        Ok(Distribution::CartesianBlock(CartesianBlock::new(par, comm)?))
    }

    /// Variant name, for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Distribution::Local => "Local",
            Distribution::Global => "Global",
            Distribution::CartesianBlock(_) => "CartesianBlock",
        }
    }

    pub fn is_global(&self) -> bool {
        matches!(self, Distribution::Global)
    }

    pub fn is_local(&self) -> bool {
        matches!(self, Distribution::Local)
    }

    pub fn as_cartesian(&self) -> Option<&CartesianBlock> {
        match self {
            Distribution::CartesianBlock(cart) => Some(cart),
            _ => None,
        }
    }

    /// Local extents for a tensor of `global` shape on this process.
    pub fn local_shape(&self, global: &[usize]) -> CoreResult<Shape> {
        match self {
            Distribution::Local | Distribution::Global => Ok(global.to_vec()),
            Distribution::CartesianBlock(cart) => cart.local_shape_of(cart.rank(), global),
        }
    }

    /// Whether two operands may appear in one operation: identical
    /// Cartesian partitions, or at least one replicated/private side.
    pub fn compatible(&self, other: &Distribution) -> bool {
        match (self, other) {
            (Distribution::CartesianBlock(a), Distribution::CartesianBlock(b)) => a.par == b.par,
            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tendist_comm::World;

    #[test]
    fn grid_size_must_match_world() {
        World::spawn(4, |comm| {
            assert!(CartesianBlock::new(vec![3], comm.clone()).is_err());
            assert!(CartesianBlock::new(vec![2, 2], comm).is_ok());
        });
    }

    #[test]
    fn coords_unravel_row_major() {
        World::spawn(6, |comm| {
            let cart = CartesianBlock::new(vec![2, 3], comm).unwrap();
            let r = cart.rank();
            assert_eq!(cart.coord(), &[r / 3, r % 3]);
            // lexicographic order of coordinates equals rank order
            for rank in 0..5 {
                assert!(cart.coord_of(rank) < cart.coord_of(rank + 1));
            }
        });
    }

    #[test]
    fn local_sizes_partition_the_tensor() {
        World::spawn(6, |comm| {
            let cart = CartesianBlock::new(vec![2, 3, 1], comm).unwrap();
            let global = [5, 7, 3];
            let total: usize = (0..6).map(|r| cart.local_size_of(r, &global).unwrap()).sum();
            assert_eq!(total, 105);

            let mine = cart.local_shape_of(cart.rank(), &global).unwrap();
            for (k, &extent) in mine.iter().enumerate() {
                assert_eq!(extent, cart.local_range(global[k], k).len());
            }
        });
    }

    #[test]
    fn fiber_groups_by_remaining_coords() {
        World::spawn(6, |comm| {
            let cart = CartesianBlock::new(vec![2, 3], comm).unwrap();
            let pair = cart.fiber_comms(1).unwrap();
            // fiber along mode 1: 3 members, ranked by c_1
            assert_eq!(pair.fiber.size(), 3);
            assert_eq!(pair.fiber.rank(), cart.coord()[1]);
            // slab perpendicular to mode 1: the 2 members sharing c_1
            assert_eq!(pair.slab.size(), 2);

            // cached: second call returns without another split
            let again = cart.fiber_comms(1).unwrap();
            assert_eq!(again.fiber.size(), 3);
        });
    }

    #[test]
    fn compatibility_rules() {
        World::spawn(2, |comm| {
            let a = Distribution::cartesian(vec![2], comm.clone()).unwrap();
            let b = Distribution::cartesian(vec![2], comm.clone()).unwrap();
            let g = Distribution::Global;
            assert!(a.compatible(&b));
            assert!(a.compatible(&g));
            assert!(g.compatible(&g));
            let c = Distribution::cartesian(vec![1, 2], comm).unwrap();
            assert!(!a.compatible(&c));
        });
    }
}
