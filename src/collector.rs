use std::{
    cell::UnsafeCell,
    sync::atomic::{AtomicBool, Ordering},
};

use bytemuck::Pod;
use log::debug;

use crate::{
    config::CollectorConfig,
    error::{CollectErr, Result},
    partition::{self, Partition},
    round::{Phase, RoundEngine},
    worker::Worker,
};

/// A partition together with the flag telling whether a `Worker` owns it.
pub(crate) struct PartitionSlot<T> {
    pub(crate) claimed: AtomicBool,
    pub(crate) partition: UnsafeCell<Partition<T>>,
}

// SAFETY: The partition is only reached through the `Worker` that claimed the
//         slot, or through `&mut MultiCollector`.
unsafe impl<T: Send> Sync for PartitionSlot<T> {}

impl<T> PartitionSlot<T> {
    fn new() -> Self {
        Self {
            claimed: AtomicBool::new(false),
            partition: UnsafeCell::new(Partition::new()),
        }
    }
}

/// Gathers values from a fixed amount of worker threads into one ordered buffer.
///
/// Each worker claims its index through [`worker`](Self::worker) and appends to
/// its own partition without locking. Once every worker has finished a
/// round, the merged values are laid out by worker index and can be read
/// from any thread.
///
/// ```no_run
/// use std::thread;
/// use partition_merge::MultiCollector;
///
/// let collector = MultiCollector::<u32>::new(4);
///
/// thread::scope(|s| {
///     for index in 0..collector.workers() {
///         let collector = &collector;
///         s.spawn(move || {
///             let mut worker = collector.worker(index)?;
///             worker.extend(0..1000);
///             worker.finish_round()
///         });
///     }
///
///     collector.wait_for_rounds(1);
/// });
///
/// assert_eq!(collector.len(), 4000);
/// ```
pub struct MultiCollector<T> {
    engine: RoundEngine<T>,
    partitions: Box<[PartitionSlot<T>]>,
}

impl<T: Pod> MultiCollector<T> {
    /// Creates a new `MultiCollector`.
    ///
    /// # Arguments
    /// * `workers` - The fixed amount of workers, a collector of `0` workers
    ///   does nothing.
    ///
    /// # Returns
    /// A new `MultiCollector` instance.
    pub fn new(workers: usize) -> Self {
        let partitions = (0..workers).map(|_| PartitionSlot::new()).collect();

        Self {
            engine: RoundEngine::new(workers),
            partitions,
        }
    }

    /// Creates a new `MultiCollector` from a validated config, preallocating
    /// the partitions when a total is expected.
    pub fn from_config(config: &CollectorConfig) -> Self {
        let mut collector = Self::new(config.workers);

        if let Some(total) = config.expected_total {
            collector.preallocate_evenly(total);
        }

        collector
    }

    pub fn workers(&self) -> usize {
        self.engine.workers()
    }

    /// Reserves room for an even share of `total` values in every partition.
    ///
    /// Only changes capacities, never the collected values.
    pub fn preallocate_evenly(&mut self, total: usize) {
        let Some(capacity) = partition::even_capacity(total, self.partitions.len()) else {
            return;
        };

        for slot in self.partitions.iter_mut() {
            slot.partition.get_mut().reserve_total(capacity);
        }

        debug!(total = total, per_worker = capacity; "preallocated partitions");
    }

    /// Claims exclusive access to the partition of `index`.
    ///
    /// # Returns
    /// A `Worker` handle, `OutOfRange` if `index` isn't a worker or
    /// `AlreadyClaimed` if another handle for `index` is alive.
    #[track_caller]
    pub fn worker(&self, index: usize) -> Result<Worker<'_, T>> {
        let Some(slot) = self.partitions.get(index) else {
            return Err(CollectErr::out_of_range(index, self.workers()));
        };

        slot.claimed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| CollectErr::AlreadyClaimed { index })?;

        Ok(Worker::new(index, &self.engine, slot))
    }

    /// The rendezvous the workers of this collector go through.
    pub fn engine(&self) -> &RoundEngine<T> {
        &self.engine
    }

    /// Blocks until the round in flight, if any, has been fully merged.
    pub fn wait_for_round_completion(&self) {
        self.engine.wait_for_round_completion();
    }

    /// Blocks until at least `rounds` rounds have been completed.
    ///
    /// Returns at once when the collector has no workers.
    ///
    /// # Returns
    /// The amount of completed rounds.
    pub fn wait_for_rounds(&self, rounds: u64) -> u64 {
        self.engine.wait_for_rounds(rounds)
    }

    pub fn completed_rounds(&self) -> u64 {
        self.engine.completed_rounds()
    }

    pub fn phase(&self) -> Phase {
        self.engine.phase()
    }

    /// The amount of merged values of the last completed round.
    pub fn len(&self) -> usize {
        self.engine.len()
    }

    pub fn is_empty(&self) -> bool {
        self.engine.is_empty()
    }

    /// Runs `f` over the merged values of the last completed round.
    ///
    /// The round lock is held while `f` runs. Calling back into this
    /// collector from `f` (`len`, `phase`, `to_vec`, ...) deadlocks.
    ///
    /// # Returns
    /// `RoundInProgress` if workers are currently merging.
    pub fn with_result<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&[T]) -> R,
    {
        self.engine.with_result(f)
    }

    /// Copies the merged values of the last completed round.
    pub fn to_vec(&self) -> Result<Vec<T>> {
        self.engine.to_vec()
    }
}
