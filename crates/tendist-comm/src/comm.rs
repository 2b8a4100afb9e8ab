//! Communicators: point-to-point, collectives, and `split`.

use std::any::Any;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::error::{CommError, CommResult};
use crate::world::{CommScalar, MsgKey, ReduceOp, WorldState};

/// Tags at or above this value are reserved for collectives.
const COLLECTIVE_TAG_BASE: u64 = 1 << 32;

/// A handle onto a group of SPMD ranks.
///
/// A communicator identifies a member set, this rank's position in it,
/// and a context id that keeps its traffic separate from every other
/// communicator derived from the same [`World`](crate::World). Clones
/// are cheap and share the collective sequence counter, so a tensor and
/// the kernels operating on it may all hold copies.
///
/// All collectives must be invoked by every member in the same order;
/// that is the SPMD contract, not something the fabric can check.
#[derive(Clone)]
pub struct Communicator {
    state: Arc<WorldState>,
    ctx: u64,
    /// Global rank of each member, indexed by communicator rank.
    members: Arc<Vec<usize>>,
    rank: usize,
    /// Collective invocation counter, shared between clones so that the
    /// tag sequence stays aligned across the member set.
    coll_seq: Arc<AtomicU64>,
}

impl std::fmt::Debug for Communicator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Communicator")
            .field("ctx", &self.ctx)
            .field("rank", &self.rank)
            .field("size", &self.members.len())
            .finish()
    }
}

/// Completion handle for a buffered send.
///
/// The fabric copies the payload out at post time, so the send is
/// already complete; `wait` exists to keep ring loops shaped as
/// post-both / wait-both.
#[must_use = "a posted send must be waited on"]
pub struct SendRequest(());

impl SendRequest {
    pub fn wait(self) -> CommResult<()> {
        Ok(())
    }
}

/// Pending receive posted with [`Communicator::irecv`].
///
/// `wait` blocks until the matching message arrives and copies it into
/// the caller's buffer, returning the element count.
#[must_use = "a posted receive must be waited on"]
pub struct RecvRequest<T: CommScalar> {
    state: Arc<WorldState>,
    key: MsgKey,
    _elem: PhantomData<T>,
}

impl<T: CommScalar> RecvRequest<T> {
    pub fn wait(self, buf: &mut [T]) -> CommResult<usize> {
        let mut mail = self.state.mail.lock();
        let msg = loop {
            if let Some(queue) = mail.get_mut(&self.key) {
                if let Some(msg) = queue.pop_front() {
                    break msg;
                }
            }
            self.state.arrived.wait(&mut mail);
        };
        drop(mail);

        let payload = msg
            .downcast::<Vec<T>>()
            .map_err(|_| CommError::TypeMismatch {
                operation: "recv".into(),
            })?;
        if payload.len() > buf.len() {
            return Err(CommError::truncated("recv", payload.len(), buf.len()));
        }
        buf[..payload.len()].copy_from_slice(&payload);
        Ok(payload.len())
    }
}

impl Communicator {
    pub(crate) fn from_parts(
        state: Arc<WorldState>,
        ctx: u64,
        members: Arc<Vec<usize>>,
        rank: usize,
    ) -> Self {
        Communicator {
            state,
            ctx,
            members,
            rank,
            coll_seq: Arc::new(AtomicU64::new(0)),
        }
    }

    /// This rank's position within the communicator.
    pub fn rank(&self) -> usize {
        self.rank
    }

    /// Number of member ranks.
    pub fn size(&self) -> usize {
        self.members.len()
    }

    fn global(&self, rank: usize) -> CommResult<usize> {
        self.members
            .get(rank)
            .copied()
            .ok_or(CommError::InvalidRank {
                rank,
                size: self.members.len(),
            })
    }

    fn next_collective_tag(&self) -> u64 {
        COLLECTIVE_TAG_BASE + self.coll_seq.fetch_add(1, Ordering::Relaxed)
    }

    fn deposit<T: CommScalar>(&self, buf: &[T], dst: usize, tag: u64) -> CommResult<()> {
        let key = MsgKey {
            ctx: self.ctx,
            src: self.global(self.rank)?,
            dst: self.global(dst)?,
            tag,
        };
        let msg: Box<dyn Any + Send> = Box::new(buf.to_vec());
        let mut mail = self.state.mail.lock();
        mail.entry(key).or_default().push_back(msg);
        self.state.arrived.notify_all();
        Ok(())
    }

    // ── point-to-point ──────────────────────────────────────────────

    /// Post a non-blocking send of `buf` to `dst`.
    ///
    /// The payload is buffered immediately; overwriting `buf` after the
    /// returned request's `wait` is always safe.
    pub fn isend<T: CommScalar>(&self, buf: &[T], dst: usize, tag: u64) -> CommResult<SendRequest> {
        self.deposit(buf, dst, tag)?;
        Ok(SendRequest(()))
    }

    /// Post a non-blocking receive from `src`.
    pub fn irecv<T: CommScalar>(&self, src: usize, tag: u64) -> CommResult<RecvRequest<T>> {
        let key = MsgKey {
            ctx: self.ctx,
            src: self.global(src)?,
            dst: self.global(self.rank)?,
            tag,
        };
        Ok(RecvRequest {
            state: Arc::clone(&self.state),
            key,
            _elem: PhantomData,
        })
    }

    /// Blocking send (post + wait).
    pub fn send<T: CommScalar>(&self, buf: &[T], dst: usize, tag: u64) -> CommResult<()> {
        self.isend(buf, dst, tag)?.wait()
    }

    /// Blocking receive (post + wait). Returns the element count.
    pub fn recv<T: CommScalar>(&self, buf: &mut [T], src: usize, tag: u64) -> CommResult<usize> {
        self.irecv(src, tag)?.wait(buf)
    }

    // ── collectives ─────────────────────────────────────────────────

    /// Block until every member has entered the barrier.
    pub fn barrier(&self) -> CommResult<()> {
        let mut token = [0usize];
        self.allreduce(&mut token, ReduceOp::Sum)
    }

    /// Element-wise reduction of equal-length buffers; every member
    /// ends with the combined result in `buf`.
    pub fn allreduce<T: CommScalar>(&self, buf: &mut [T], op: ReduceOp) -> CommResult<()> {
        let tag = self.next_collective_tag();
        if self.rank == 0 {
            let mut incoming = vec![T::zero(); buf.len()];
            for src in 1..self.size() {
                let got = self.recv(&mut incoming, src, tag)?;
                if got != buf.len() {
                    return Err(CommError::buffer("allreduce", buf.len(), got));
                }
                for (acc, x) in buf.iter_mut().zip(incoming.iter()) {
                    *acc = op.combine(*acc, *x);
                }
            }
            for dst in 1..self.size() {
                self.send(buf, dst, tag)?;
            }
        } else {
            self.send(buf, 0, tag)?;
            self.recv(buf, 0, tag)?;
        }
        Ok(())
    }

    /// Broadcast `buf` from `root` to every member.
    pub fn bcast<T: CommScalar>(&self, buf: &mut [T], root: usize) -> CommResult<()> {
        self.global(root)?;
        let tag = self.next_collective_tag();
        if self.rank == root {
            for dst in 0..self.size() {
                if dst != root {
                    self.send(buf, dst, tag)?;
                }
            }
        } else {
            let got = self.recv(buf, root, tag)?;
            if got != buf.len() {
                return Err(CommError::buffer("bcast", buf.len(), got));
            }
        }
        Ok(())
    }

    /// Gather equal-length contributions from every member into `recv`
    /// on every member, in rank order.
    pub fn allgather<T: CommScalar>(&self, send: &[T], recv: &mut [T]) -> CommResult<()> {
        let counts = vec![send.len(); self.size()];
        self.allgatherv(send, &counts, recv)
    }

    /// Gather variable-length contributions (`counts[r]` elements from
    /// rank `r`) into `recv` on every member, in rank order.
    pub fn allgatherv<T: CommScalar>(
        &self,
        send: &[T],
        counts: &[usize],
        recv: &mut [T],
    ) -> CommResult<()> {
        let root = 0;
        if self.rank == root {
            self.gatherv(send, counts, root, Some(recv))?;
        } else {
            self.gatherv(send, counts, root, None)?;
        }
        self.bcast(recv, root)
    }

    /// Gather variable-length contributions at `root`. Non-root members
    /// pass `None` for `recv`.
    pub fn gatherv<T: CommScalar>(
        &self,
        send: &[T],
        counts: &[usize],
        root: usize,
        recv: Option<&mut [T]>,
    ) -> CommResult<()> {
        self.global(root)?;
        if counts.len() != self.size() {
            return Err(CommError::counts("gatherv", self.size(), counts.len()));
        }
        if counts[self.rank] != send.len() {
            return Err(CommError::buffer("gatherv", counts[self.rank], send.len()));
        }
        let tag = self.next_collective_tag();
        if self.rank == root {
            let recv = recv.ok_or(CommError::MissingRootBuffer {
                operation: "gatherv".into(),
            })?;
            let total: usize = counts.iter().sum();
            if recv.len() != total {
                return Err(CommError::buffer("gatherv", total, recv.len()));
            }
            let mut offset = 0;
            for (src, &count) in counts.iter().enumerate() {
                let slot = &mut recv[offset..offset + count];
                if src == root {
                    slot.copy_from_slice(send);
                } else {
                    let got = self.recv(slot, src, tag)?;
                    if got != count {
                        return Err(CommError::buffer("gatherv", count, got));
                    }
                }
                offset += count;
            }
        } else {
            self.send(send, root, tag)?;
        }
        Ok(())
    }

    /// Scatter variable-length chunks from `root`. Non-root members
    /// pass `None` for `send`; every member receives its chunk in
    /// `recv`.
    pub fn scatterv<T: CommScalar>(
        &self,
        send: Option<&[T]>,
        counts: &[usize],
        root: usize,
        recv: &mut [T],
    ) -> CommResult<()> {
        self.global(root)?;
        if counts.len() != self.size() {
            return Err(CommError::counts("scatterv", self.size(), counts.len()));
        }
        if recv.len() != counts[self.rank] {
            return Err(CommError::buffer("scatterv", counts[self.rank], recv.len()));
        }
        let tag = self.next_collective_tag();
        if self.rank == root {
            let send = send.ok_or(CommError::MissingRootBuffer {
                operation: "scatterv".into(),
            })?;
            let total: usize = counts.iter().sum();
            if send.len() != total {
                return Err(CommError::buffer("scatterv", total, send.len()));
            }
            let mut offset = 0;
            for (dst, &count) in counts.iter().enumerate() {
                let chunk = &send[offset..offset + count];
                if dst == root {
                    recv.copy_from_slice(chunk);
                } else {
                    self.send(chunk, dst, tag)?;
                }
                offset += count;
            }
        } else {
            let got = self.recv(recv, root, tag)?;
            if got != counts[self.rank] {
                return Err(CommError::buffer("scatterv", counts[self.rank], got));
            }
        }
        Ok(())
    }

    /// Reduce equal-length buffers element-wise, then scatter the
    /// result so rank `r` receives the `counts[r]`-element chunk.
    pub fn reduce_scatter<T: CommScalar>(
        &self,
        send: &[T],
        counts: &[usize],
        recv: &mut [T],
        op: ReduceOp,
    ) -> CommResult<()> {
        if counts.len() != self.size() {
            return Err(CommError::counts("reduce_scatter", self.size(), counts.len()));
        }
        let total: usize = counts.iter().sum();
        if send.len() != total {
            return Err(CommError::buffer("reduce_scatter", total, send.len()));
        }
        let root = 0;
        let tag = self.next_collective_tag();
        if self.rank == root {
            let mut acc = send.to_vec();
            let mut incoming = vec![T::zero(); total];
            for src in 1..self.size() {
                let got = self.recv(&mut incoming, src, tag)?;
                if got != total {
                    return Err(CommError::buffer("reduce_scatter", total, got));
                }
                for (a, x) in acc.iter_mut().zip(incoming.iter()) {
                    *a = op.combine(*a, *x);
                }
            }
            self.scatterv(Some(&acc), counts, root, recv)
        } else {
            self.send(send, root, tag)?;
            self.scatterv(None, counts, root, recv)
        }
    }

    // ── split ───────────────────────────────────────────────────────

    /// Partition the communicator into disjoint subcommunicators.
    ///
    /// Members supplying the same `color` form a new communicator, with
    /// ranks assigned by ascending `(key, old rank)`. Collective over
    /// the parent communicator.
    pub fn split(&self, color: usize, key: usize) -> CommResult<Communicator> {
        let size = self.size();
        let mut pairs = vec![0usize; 2 * size];
        self.allgather(&[color, key], &mut pairs)?;

        let mut colors: Vec<usize> = (0..size).map(|r| pairs[2 * r]).collect();
        colors.sort_unstable();
        colors.dedup();
        let n_colors = colors.len();
        let color_idx = colors.binary_search(&color).expect("own color present");

        // One context id per color, allocated once and agreed on by a
        // broadcast from the parent root.
        let mut base = [0usize];
        if self.rank == 0 {
            base[0] = self.state.next_ctx.fetch_add(n_colors as u64, Ordering::Relaxed) as usize;
        }
        self.bcast(&mut base, 0)?;
        let ctx = (base[0] + color_idx) as u64;

        let mut group: Vec<(usize, usize)> = (0..size)
            .filter(|&r| pairs[2 * r] == color)
            .map(|r| (pairs[2 * r + 1], r))
            .collect();
        group.sort_unstable();

        let new_rank = group
            .iter()
            .position(|&(_, r)| r == self.rank)
            .expect("own rank present in split group");
        let members: Vec<usize> = group
            .iter()
            .map(|&(_, r)| self.members[r])
            .collect();

        tracing::trace!(ctx, color, new_rank, group = members.len(), "split communicator");
        Ok(Communicator::from_parts(
            Arc::clone(&self.state),
            ctx,
            Arc::new(members),
            new_rank,
        ))
    }
}
