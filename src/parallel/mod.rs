//! parallel — collective operations for sharded sample work.
//!
//! Purpose
//! -------
//! Let the KL layer split its residual samples across workers and combine
//! per-worker sums into identical results on every worker. The numerics
//! never assume more than the [`Communicator`] contract.
//!
//! Key behaviors
//! -------------
//! - [`SerialCommunicator`]: one worker; collectives are identities.
//! - [`LocalGroup`]: `size` in-process workers on scoped threads that
//!   synchronize on a barrier. Reductions add contributions in rank
//!   order, so every worker sees bit-identical results and repeated runs
//!   are deterministic.
//! - [`local_indices`]: the contiguous block of global sample indices a
//!   rank owns.
//!
//! Invariants & assumptions
//! ------------------------
//! - Every worker of a group calls the same collectives in the same order.
//! - Failures of the shared state (poisoned locks, missing contributions)
//!   are [`IftError::CommunicationFailed`].
use std::{
    fmt,
    ops::Range,
    sync::{Arc, Barrier, Mutex},
    thread,
};

use crate::{
    errors::{IftError, IftResult},
    field::Field,
};

/// Shared handle to a communicator, as held by sharded energies.
pub type CommRef = Arc<dyn Communicator>;

pub trait Communicator: fmt::Debug + Send + Sync {
    fn rank(&self) -> usize;
    fn size(&self) -> usize;

    /// Elementwise sum over all workers.
    fn allreduce_sum(&self, field: &Field) -> IftResult<Field>;

    /// `root`'s field on every worker.
    fn broadcast(&self, field: &Field, root: usize) -> IftResult<Field>;

    fn allreduce_sum_scalar(&self, value: f64) -> IftResult<f64> {
        self.allreduce_sum(&Field::scalar(value))?.as_scalar()
    }
}

/// Global indices `0..n` owned by `rank` out of `size`.
///
/// Blocks are contiguous; the first `n % size` ranks get one extra index.
pub fn local_indices(n: usize, rank: usize, size: usize) -> Range<usize> {
    if size == 0 || rank >= size {
        return 0..0;
    }
    let base = n / size;
    let extra = n % size;
    let start = rank * base + rank.min(extra);
    let len = base + usize::from(rank < extra);
    start..start + len
}

/// Share the outcome of local work with the whole group.
///
/// A collective: every worker returns an error if any worker failed, so
/// the group leaves a computation together.
pub fn agree<T>(comm: &dyn Communicator, local: IftResult<T>) -> IftResult<T> {
    let failures = comm.allreduce_sum_scalar(if local.is_err() { 1.0 } else { 0.0 })?;
    match local {
        Err(e) => Err(e),
        Ok(_) if failures > 0.0 => Err(IftError::CommunicationFailed { reason: "A peer worker failed." }),
        Ok(v) => Ok(v),
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SerialCommunicator;

impl SerialCommunicator {
    pub fn shared() -> CommRef {
        Arc::new(Self)
    }
}

impl Communicator for SerialCommunicator {
    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn allreduce_sum(&self, field: &Field) -> IftResult<Field> {
        Ok(field.clone())
    }

    fn broadcast(&self, field: &Field, root: usize) -> IftResult<Field> {
        if root != 0 {
            return Err(IftError::CommunicationFailed { reason: "Broadcast root out of range." });
        }
        Ok(field.clone())
    }
}

#[derive(Debug)]
struct Shared {
    barrier: Barrier,
    slots: Mutex<Vec<Option<Field>>>,
}

/// One worker of a [`LocalGroup`].
#[derive(Debug, Clone)]
pub struct LocalCommunicator {
    rank: usize,
    size: usize,
    shared: Arc<Shared>,
}

impl LocalCommunicator {
    /// Handle to this worker that can be stored in an energy.
    pub fn shared(&self) -> CommRef {
        Arc::new(self.clone())
    }

    fn publish(&self, field: &Field) -> IftResult<()> {
        let mut slots = self
            .shared
            .slots
            .lock()
            .map_err(|_| IftError::CommunicationFailed { reason: "Shared slot lock poisoned." })?;
        slots[self.rank] = Some(field.clone());
        Ok(())
    }

    fn read(&self, rank: usize) -> IftResult<Field> {
        let slots = self
            .shared
            .slots
            .lock()
            .map_err(|_| IftError::CommunicationFailed { reason: "Shared slot lock poisoned." })?;
        slots[rank].clone().ok_or(IftError::CommunicationFailed { reason: "Missing contribution." })
    }
}

impl Communicator for LocalCommunicator {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn allreduce_sum(&self, field: &Field) -> IftResult<Field> {
        let published = self.publish(field);
        self.shared.barrier.wait();
        let mut total = self.read(0);
        for r in 1..self.size {
            total = total.and_then(|t| self.read(r).and_then(|f| t.add(&f)));
        }
        // Nobody may overwrite a slot before every worker has read it.
        self.shared.barrier.wait();
        published.and(total)
    }

    fn broadcast(&self, field: &Field, root: usize) -> IftResult<Field> {
        if root >= self.size {
            return Err(IftError::CommunicationFailed { reason: "Broadcast root out of range." });
        }
        let published = if self.rank == root { self.publish(field) } else { Ok(()) };
        self.shared.barrier.wait();
        let out = self.read(root);
        self.shared.barrier.wait();
        published.and(out)
    }
}

/// In-process group of `size` workers.
#[derive(Debug, Clone, Copy)]
pub struct LocalGroup {
    size: usize,
}

impl LocalGroup {
    /// # Errors
    /// - [`IftError::InvalidOption`] for `size == 0`.
    pub fn new(size: usize) -> IftResult<Self> {
        if size == 0 {
            return Err(IftError::InvalidOption { name: "size", reason: "A group needs at least one worker." });
        }
        Ok(Self { size })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Run `work` on every worker concurrently; results come back in rank
    /// order.
    ///
    /// # Errors
    /// - [`IftError::CommunicationFailed`] if a worker panicked.
    pub fn run<T, F>(&self, work: F) -> IftResult<Vec<T>>
    where
        T: Send,
        F: Fn(&LocalCommunicator) -> T + Sync,
    {
        let shared = Arc::new(Shared { barrier: Barrier::new(self.size), slots: Mutex::new(vec![None; self.size]) });
        let work = &work;
        thread::scope(|scope| {
            let handles: Vec<_> = (0..self.size)
                .map(|rank| {
                    let comm = LocalCommunicator { rank, size: self.size, shared: shared.clone() };
                    scope.spawn(move || work(&comm))
                })
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().map_err(|_| IftError::CommunicationFailed { reason: "Worker panicked." }))
                .collect()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Domain;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - Block sharding of sample indices.
    // - Allreduce and broadcast on a local group.
    // - Serial communicator identities.
    // -------------------------------------------------------------------------

    #[test]
    // Purpose
    // -------
    // Shards are contiguous, disjoint and cover every index.
    //
    // Given
    // -----
    // - n = 10 over 3 ranks, and n = 2 over 4 ranks.
    //
    // Expect
    // ------
    // - 0..4, 4..7, 7..10; two ranks with one index, two empty.
    fn shards_cover_all_indices() {
        let blocks: Vec<_> = (0..3).map(|r| local_indices(10, r, 3)).collect();
        assert_eq!(blocks, vec![0..4, 4..7, 7..10]);

        let lens: Vec<_> = (0..4).map(|r| local_indices(2, r, 4).len()).collect();
        assert_eq!(lens, vec![1, 1, 0, 0]);
    }

    #[test]
    // Purpose
    // -------
    // Allreduce sums all contributions and broadcast copies the root.
    //
    // Given
    // -----
    // - 4 workers each contributing [rank, 1].
    //
    // Expect
    // ------
    // - every worker sees [6, 4]; broadcast from rank 2 yields [2, 1].
    fn local_group_collectives() {
        let domain = Domain::unstructured(2);
        let group = LocalGroup::new(4).unwrap();

        let results = group
            .run(|comm| {
                let mine = Field::from_vec(domain.clone(), vec![comm.rank() as f64, 1.0]).unwrap();
                let sum = comm.allreduce_sum(&mine).unwrap();
                let root = comm.broadcast(&mine, 2).unwrap();
                let scalar = comm.allreduce_sum_scalar(1.0).unwrap();
                (sum, root, scalar)
            })
            .unwrap();

        for (sum, root, scalar) in results {
            assert_eq!(sum.val().to_vec(), vec![6.0, 4.0]);
            assert_eq!(root.val().to_vec(), vec![2.0, 1.0]);
            assert_eq!(scalar, 4.0);
        }
    }

    #[test]
    // Purpose
    // -------
    // The serial communicator is the identity and rejects foreign roots.
    //
    // Given
    // -----
    // - A scalar field and broadcast roots 0 and 1.
    //
    // Expect
    // ------
    // - Identity; `CommunicationFailed` for root 1; zero-size groups fail.
    fn serial_identities() {
        let f = Field::scalar(2.5);
        let comm = SerialCommunicator;

        assert_eq!(comm.allreduce_sum(&f).unwrap(), f);
        assert_eq!(comm.broadcast(&f, 0).unwrap(), f);
        assert!(matches!(comm.broadcast(&f, 1), Err(IftError::CommunicationFailed { .. })));
        assert!(LocalGroup::new(0).is_err());
    }
}
