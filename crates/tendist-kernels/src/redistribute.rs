//! Movement between Cartesian-block and root/replicated layouts.
//!
//! `gather` collapses a block-distributed tensor into a replicated one:
//! gatherv assembles the per-rank blocks at the root, the root permutes
//! the concatenation from rank-contiguous order into global row-major
//! order, and a broadcast hands every rank the copy. `scatter` is the
//! inverse: the root permutes a global row-major buffer into per-rank
//! contiguous blocks and scatterv distributes them. The source tensor
//! is never mutated.

use scirs2_core::numeric::Num;
use tendist_comm::CommScalar;
use tendist_core::shape::{block_range, next_index, ravel};
use tendist_core::{CartesianBlock, Distribution, Tensor};
use std::sync::Arc;

use crate::error::{KernelError, KernelResult};

/// Visit the elements of `rank`'s block in local row-major order,
/// yielding each element's offset in the global row-major layout.
fn visit_block(
    cart: &CartesianBlock,
    global: &[usize],
    rank: usize,
    mut f: impl FnMut(usize),
) -> KernelResult<()> {
    let local = cart.local_shape_of(rank, global)?;
    if local.iter().any(|&s| s == 0) {
        return Ok(());
    }
    let coord = cart.coord_of(rank);
    let starts: Vec<usize> = global
        .iter()
        .zip(cart.par().iter().zip(coord.iter()))
        .map(|(&extent, (&parts, &c))| block_range(extent, parts, c).start)
        .collect();

    let mut idx = vec![0usize; global.len()];
    let mut gidx = starts.clone();
    loop {
        f(ravel(&gidx, global));
        if !next_index(&mut idx, &local) {
            break;
        }
        for (k, &s) in starts.iter().enumerate() {
            gidx[k] = s + idx[k];
        }
    }
    Ok(())
}

/// Collapse a block-distributed tensor into a replicated one.
///
/// Collective over the grid; rank 0 assembles and broadcasts.
pub fn gather<T>(a: &Tensor<T>) -> KernelResult<Tensor<T>>
where
    T: Num + CommScalar,
{
    let cart = a
        .dist()
        .as_cartesian()
        .ok_or_else(|| KernelError::unsupported("gather", a.dist().kind()))?;
    let comm = a.comm();
    let global = a.shape_global();
    let total: usize = global.iter().product();
    let root = 0;

    let counts: Vec<usize> = (0..comm.size())
        .map(|rr| cart.local_size_of(rr, global))
        .collect::<Result<_, _>>()?;

    let mut out = vec![<T as scirs2_core::Zero>::zero(); total];
    if comm.rank() == root {
        let mut packed = vec![<T as scirs2_core::Zero>::zero(); total];
        comm.gatherv(a.data(), &counts, root, Some(&mut packed))?;

        // rank-contiguous blocks -> global row-major
        let mut cursor = 0;
        for rr in 0..comm.size() {
            visit_block(cart, global, rr, |gofs| {
                out[gofs] = packed[cursor];
                cursor += 1;
            })?;
        }
    } else {
        comm.gatherv(a.data(), &counts, root, None)?;
    }
    comm.bcast(&mut out, root)?;

    Ok(Tensor::from_vec_replicated(out, global, comm)?)
}

/// Distribute a replicated or root-held tensor over `dist`.
///
/// The source must be `Global` or `Local`; only the root's contents are
/// read, but every rank must present the same global shape. The source
/// buffer is left untouched.
pub fn scatter<T>(
    src: &Tensor<T>,
    dist: &Arc<Distribution>,
    root: usize,
) -> KernelResult<Tensor<T>>
where
    T: Num + CommScalar,
{
    if !src.dist().is_global() && !src.dist().is_local() {
        return Err(KernelError::unsupported("scatter", src.dist().kind()));
    }
    let cart = dist
        .as_cartesian()
        .ok_or_else(|| KernelError::unsupported("scatter target", dist.kind()))?;
    let comm = cart.comm();
    let global = src.shape_global();

    let counts: Vec<usize> = (0..comm.size())
        .map(|rr| cart.local_size_of(rr, global))
        .collect::<Result<_, _>>()?;

    let mut out = Tensor::distributed(dist, global)?;
    if comm.rank() == root {
        // global row-major -> rank-contiguous blocks
        let total: usize = global.iter().product();
        let mut packed = vec![<T as scirs2_core::Zero>::zero(); total];
        let mut cursor = 0;
        for rr in 0..comm.size() {
            visit_block(cart, global, rr, |gofs| {
                packed[cursor] = src.data()[gofs];
                cursor += 1;
            })?;
        }
        comm.scatterv(Some(&packed), &counts, root, out.data_mut())?;
    } else {
        comm.scatterv(None, &counts, root, out.data_mut())?;
    }
    Ok(out)
}
