use bytemuck::Pod;
use log::{debug, trace, warn};
use parking_lot::{Condvar, Mutex};

use super::{Phase, RoundState};
use crate::{
    error::{CollectErr, Result},
    output::OutputBuffer,
    partition::Partition,
};

/// The worker index that computes the offsets of every round.
pub const LEADER: usize = 0;

/// Rendezvous of a fixed set of workers that merge their partitions into a
/// single contiguous buffer.
///
/// Every round, each of the `workers` participants calls
/// [`enter_merge_barrier`](Self::enter_merge_barrier) and then
/// [`merge`](Self::merge) exactly once. The values end up ordered by worker
/// index, and in append order within each worker.
///
/// A participant that never shows up blocks the rest of the round forever.
pub struct RoundEngine<T> {
    workers: usize,
    state: Mutex<RoundState>,
    cvar: Condvar,
    output: OutputBuffer<T>,
}

impl<T: Pod> RoundEngine<T> {
    /// Creates a new `RoundEngine`.
    ///
    /// # Arguments
    /// * `workers` - The exact amount of participants of every round.
    ///
    /// # Returns
    /// A new `RoundEngine` instance.
    pub fn new(workers: usize) -> Self {
        Self {
            workers,
            state: Mutex::new(RoundState::new(workers)),
            cvar: Condvar::new(),
            output: OutputBuffer::new(),
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Blocks until every worker has arrived and the leader has published
    /// the offsets for this round.
    ///
    /// The leader additionally waits for every worker to acknowledge the
    /// arrival of the others, computes the offsets from the published lengths
    /// and allocates the output buffer.
    ///
    /// # Arguments
    /// * `index` - The calling worker.
    /// * `len` - The final length of the caller's partition for this round.
    ///
    /// # Returns
    /// The offset where the caller's values will start in the output buffer,
    /// or an error if `index` is out of range or already arrived this round.
    #[track_caller]
    pub fn enter_merge_barrier(&self, index: usize, len: usize) -> Result<usize> {
        if self.workers == 0 {
            return Ok(0);
        }

        self.check_index(index)?;

        let mut state = self.state.lock();

        if let Err(e) = state.arrive(index, len) {
            warn!(worker = index; "rejected arrival: {e}");
            return Err(e);
        }

        trace!(worker = index, len = len; "arrived at merge barrier");

        if state.all_arrived() {
            self.cvar.notify_all();
        } else {
            self.cvar.wait_while(&mut state, |s| !s.all_arrived());
        }

        if state.acknowledge() {
            self.cvar.notify_all();
        }

        if index == LEADER {
            self.cvar.wait_while(&mut state, |s| !s.all_acknowledged());

            let total = state.publish_offsets();

            // SAFETY: We hold the lock and the previous round is complete,
            //         no worker is copying into the buffer until it's
            //         released.
            unsafe { self.output.resize(total) };

            debug!(round = state.completed(), total = total; "offsets published");
            self.cvar.notify_all();
        } else {
            self.cvar
                .wait_while(&mut state, |s| s.phase() == Phase::ArrivalBarrier);
        }

        Ok(state.offset(index))
    }

    /// Copies `partition` into its range of the output buffer and clears it.
    ///
    /// The last worker to merge completes the round and wakes any waiting
    /// coordinator.
    ///
    /// If the partition changed since the arrival, only the length published
    /// then is merged: extra values stay in the partition for the next round
    /// and missing ones are zeroed. The round completes either way.
    ///
    /// # Arguments
    /// * `index` - The calling worker.
    /// * `partition` - The caller's partition, unchanged since its arrival.
    ///
    /// # Returns
    /// An `OutOfRange` error if `index` isn't a worker, checked before any
    /// memory is touched. A `PhaseViolation` if the worker isn't waiting to
    /// merge, or `LengthMismatch` if the partition changed since the arrival.
    #[track_caller]
    pub fn merge(&self, index: usize, partition: &mut Partition<T>) -> Result<()> {
        if self.workers == 0 {
            return Ok(());
        }

        self.check_index(index)?;

        let len = partition.len();
        let (dst, published) = {
            let mut state = self.state.lock();

            let (offset, published) = match state.begin_merge(index) {
                Ok(grant) => grant,
                Err(e) => {
                    warn!(worker = index; "rejected merge: {e}");
                    return Err(e);
                }
            };

            trace!(worker = index, offset = offset, len = published; "merging partition");

            // SAFETY: We hold the lock and the range was sized by the leader
            //         from the length this worker published.
            (unsafe { self.output.range_ptr(offset, published) }, published)
        };

        let copied = len.min(published);

        // SAFETY: The range `offset..offset + published` belongs to this
        //         worker alone until the round completes, which can't happen
        //         before this worker finishes its merge.
        unsafe {
            OutputBuffer::copy_into(dst, &partition.as_slice()[..copied]);
            OutputBuffer::zero_fill(dst.add(copied), published - copied);
        }
        partition.discard_front(copied);

        let mut state = self.state.lock();

        if state.finish_merge(index) {
            debug!(
                round = state.completed(),
                total = state.output_len();
                "round completed"
            );
            self.cvar.notify_all();
        }

        if len != published {
            let e = CollectErr::LengthMismatch {
                index,
                published,
                actual: len,
            };
            warn!(worker = index; "partition changed before merging: {e}");
            return Err(e);
        }

        Ok(())
    }

    /// Blocks until the round in flight, if any, has been fully merged.
    pub fn wait_for_round_completion(&self) {
        let mut state = self.state.lock();
        let start = state.completed();

        self.cvar.wait_while(&mut state, |s| {
            s.phase() != Phase::Collecting && s.completed() == start
        });
    }

    /// Blocks until at least `rounds` rounds have been completed.
    ///
    /// With no workers no round can ever complete, so it returns at once.
    ///
    /// # Returns
    /// The amount of completed rounds.
    pub fn wait_for_rounds(&self, rounds: u64) -> u64 {
        let mut state = self.state.lock();

        if self.workers > 0 {
            self.cvar.wait_while(&mut state, |s| s.completed() < rounds);
        }

        state.completed()
    }

    pub fn completed_rounds(&self) -> u64 {
        self.state.lock().completed()
    }

    pub fn phase(&self) -> Phase {
        self.state.lock().phase()
    }

    /// Returns the amount of values in the output buffer.
    pub fn len(&self) -> usize {
        self.state.lock().output_len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Runs `f` over the merged values of the last completed round.
    ///
    /// The round lock is held during `f`, so no new round can start merging
    /// until it returns. The lock isn't reentrant: `f` must not call back into
    /// this engine (`len`, `phase`, `to_vec`, ...) or it deadlocks.
    ///
    /// # Returns
    /// The output of `f`, or `RoundInProgress` if workers are merging.
    pub fn with_result<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&[T]) -> R,
    {
        let state = self.state.lock();
        let phase = state.phase();

        if !phase.result_readable() {
            return Err(CollectErr::RoundInProgress { phase });
        }

        // SAFETY: We hold the lock and no worker is copying in this phase.
        let values = unsafe { self.output.as_slice() };
        Ok(f(values))
    }

    /// Copies the merged values of the last completed round.
    pub fn to_vec(&self) -> Result<Vec<T>> {
        self.with_result(<[T]>::to_vec)
    }

    #[track_caller]
    fn check_index(&self, index: usize) -> Result<()> {
        if index >= self.workers {
            return Err(CollectErr::out_of_range(index, self.workers));
        }

        Ok(())
    }
}
