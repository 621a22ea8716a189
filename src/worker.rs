use std::sync::atomic::Ordering;

use bytemuck::Pod;

use crate::{
    collector::PartitionSlot,
    error::Result,
    partition::Partition,
    round::{LEADER, RoundEngine},
};

/// Exclusive access to one worker index of a `MultiCollector`.
///
/// Only one `Worker` per index can be alive at a time, which is what lets it
/// append to its partition without any locking. Dropping it releases the
/// index so it can be claimed again.
pub struct Worker<'a, T> {
    index: usize,
    engine: &'a RoundEngine<T>,
    slot: &'a PartitionSlot<T>,
}

impl<'a, T: Pod> Worker<'a, T> {
    pub(crate) fn new(
        index: usize,
        engine: &'a RoundEngine<T>,
        slot: &'a PartitionSlot<T>,
    ) -> Self {
        Self {
            index,
            engine,
            slot,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Whether this worker computes the offsets of every round.
    pub fn is_leader(&self) -> bool {
        self.index == LEADER
    }

    /// Appends `value` to this worker's partition.
    pub fn push(&mut self, value: T) {
        self.partition_mut().push(value);
    }

    /// Appends every value of `values` to this worker's partition.
    pub fn extend<I>(&mut self, values: I)
    where
        I: IntoIterator<Item = T>,
    {
        self.partition_mut().extend(values);
    }

    /// The amount of values collected so far this round.
    pub fn len(&self) -> usize {
        self.partition().len()
    }

    pub fn is_empty(&self) -> bool {
        self.partition().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.partition().capacity()
    }

    /// The values collected so far this round.
    pub fn as_slice(&self) -> &[T] {
        self.partition().as_slice()
    }

    /// Announces this worker is done collecting and waits for the rest.
    ///
    /// No values may be pushed until `merge` returns.
    ///
    /// # Returns
    /// The offset where this worker's values will be placed.
    #[track_caller]
    pub fn enter_merge_barrier(&mut self) -> Result<usize> {
        let len = self.len();
        self.engine.enter_merge_barrier(self.index, len)
    }

    /// Moves this worker's values into the shared output buffer.
    #[track_caller]
    pub fn merge(&mut self) -> Result<()> {
        let index = self.index;
        let engine = self.engine;
        engine.merge(index, self.partition_mut())
    }

    /// Runs both phases of the round for this worker.
    #[track_caller]
    pub fn finish_round(&mut self) -> Result<()> {
        self.enter_merge_barrier()?;
        self.merge()
    }

    fn partition(&self) -> &Partition<T> {
        // SAFETY: The slot is claimed by this worker for its whole life, no
        //         other reference to the partition exists.
        unsafe { &*self.slot.partition.get() }
    }

    fn partition_mut(&mut self) -> &mut Partition<T> {
        // SAFETY: The slot is claimed by this worker for its whole life and
        //         `&mut self` rules out any other borrow through it.
        unsafe { &mut *self.slot.partition.get() }
    }
}

impl<T> Drop for Worker<'_, T> {
    fn drop(&mut self) {
        self.slot.claimed.store(false, Ordering::Release);
    }
}
