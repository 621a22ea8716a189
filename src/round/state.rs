use super::Phase;
use crate::error::{CollectErr, Result};

/// Where a single worker stands in the current round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum Slot {
    #[default]
    Idle,
    /// Entered the barrier holding `len` values.
    Arrived { len: usize },
    /// Copying its partition into the output buffer.
    Merging,
    Merged,
}

/// The bookkeeping shared by every participant of a round.
///
/// It never touches the values themselves, it only decides who may write
/// where and when. Every method must be called with the round lock held.
#[derive(Debug)]
pub(crate) struct RoundState {
    phase: Phase,
    arrived: usize,
    acknowledged: usize,
    remaining: usize,
    completed: u64,
    output_len: usize,
    slots: Box<[Slot]>,
    offsets: Box<[usize]>,
}

impl RoundState {
    /// Creates the state for a round of `workers` participants.
    pub fn new(workers: usize) -> Self {
        Self {
            phase: Phase::Collecting,
            arrived: 0,
            acknowledged: 0,
            remaining: 0,
            completed: 0,
            output_len: 0,
            slots: vec![Slot::Idle; workers].into_boxed_slice(),
            offsets: vec![0; workers].into_boxed_slice(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// The amount of fully merged rounds so far.
    pub fn completed(&self) -> u64 {
        self.completed
    }

    pub fn output_len(&self) -> usize {
        self.output_len
    }

    pub fn offset(&self, index: usize) -> usize {
        self.offsets[index]
    }

    pub fn all_arrived(&self) -> bool {
        self.arrived == self.slots.len()
    }

    pub fn all_acknowledged(&self) -> bool {
        self.acknowledged == self.slots.len()
    }

    /// Records the arrival of `index` at the barrier holding `len` values.
    ///
    /// # Returns
    /// A `PhaseViolation` if the worker already arrived this round or the
    /// round is past its arrival stage.
    pub fn arrive(&mut self, index: usize, len: usize) -> Result<()> {
        if !matches!(self.phase, Phase::Collecting | Phase::ArrivalBarrier) {
            return Err(self.violation(index, "an open round"));
        }

        if self.slots[index] != Slot::Idle {
            return Err(self.violation(index, "a single arrival per round"));
        }

        if self.phase == Phase::Collecting {
            self.advance(Phase::ArrivalBarrier);
        }

        self.slots[index] = Slot::Arrived { len };
        self.arrived += 1;
        Ok(())
    }

    /// Counts a worker that observed every arrival.
    ///
    /// # Returns
    /// Whether this was the last acknowledgement of the round.
    pub fn acknowledge(&mut self) -> bool {
        self.acknowledged += 1;
        self.all_acknowledged()
    }

    /// Computes the prefix-sum offset of every partition and opens the merge.
    ///
    /// # Returns
    /// The total amount of values the output buffer must hold.
    pub fn publish_offsets(&mut self) -> usize {
        let mut sum = 0;

        for (offset, slot) in self.offsets.iter_mut().zip(self.slots.iter()) {
            *offset = sum;

            if let Slot::Arrived { len } = slot {
                sum += len;
            }
        }

        self.output_len = sum;
        self.remaining = self.slots.len();
        self.advance(Phase::OffsetsReady);
        sum
    }

    /// Grants `index` its range of the output buffer.
    ///
    /// The range always spans the length published on arrival, even when the
    /// partition has changed since, so the round can still be completed.
    ///
    /// # Returns
    /// The offset and length of the granted range, or an error if the worker
    /// hasn't arrived or the offsets aren't ready.
    pub fn begin_merge(&mut self, index: usize) -> Result<(usize, usize)> {
        if !self.phase.accepts_merges() {
            return Err(self.violation(index, "published offsets"));
        }

        let Slot::Arrived { len } = self.slots[index] else {
            return Err(self.violation(index, "an arrival before merging"));
        };

        if self.phase == Phase::OffsetsReady {
            self.advance(Phase::Merging);
        }

        self.slots[index] = Slot::Merging;
        Ok((self.offsets[index], len))
    }

    /// Marks `index` as merged and closes the round after the last one.
    ///
    /// # Returns
    /// Whether the round has just been completed.
    pub fn finish_merge(&mut self, index: usize) -> bool {
        debug_assert_eq!(self.slots[index], Slot::Merging);

        self.slots[index] = Slot::Merged;
        self.remaining -= 1;

        if self.remaining > 0 {
            return false;
        }

        self.arrived = 0;
        self.acknowledged = 0;
        self.slots.fill(Slot::Idle);
        self.completed += 1;
        self.advance(Phase::Collecting);
        true
    }

    fn advance(&mut self, next: Phase) {
        debug_assert!(
            self.phase.can_advance_to(next),
            "illegal transition {} -> {next}",
            self.phase
        );
        self.phase = next;
    }

    fn violation(&self, index: usize, expected: &'static str) -> CollectErr {
        CollectErr::PhaseViolation {
            index,
            expected,
            found: self.phase,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arrive_all(state: &mut RoundState, lens: &[usize]) {
        for (index, &len) in lens.iter().enumerate() {
            state.arrive(index, len).unwrap();
        }
        for _ in lens {
            state.acknowledge();
        }
    }

    #[test]
    fn test_offsets_are_prefix_sums() {
        let mut state = RoundState::new(4);
        arrive_all(&mut state, &[3, 0, 5, 2]);

        assert_eq!(state.publish_offsets(), 10);
        assert_eq!(&*state.offsets, &[0, 3, 3, 8]);
        assert_eq!(state.phase(), Phase::OffsetsReady);
    }

    #[test]
    fn test_double_arrival_is_rejected() {
        let mut state = RoundState::new(2);
        state.arrive(1, 4).unwrap();

        let err = state.arrive(1, 4).unwrap_err();
        assert!(matches!(err, CollectErr::PhaseViolation { index: 1, .. }));
    }

    #[test]
    fn test_merge_before_offsets_is_rejected() {
        let mut state = RoundState::new(2);
        state.arrive(0, 1).unwrap();

        let err = state.begin_merge(0).unwrap_err();
        assert!(matches!(
            err,
            CollectErr::PhaseViolation {
                found: Phase::ArrivalBarrier,
                ..
            }
        ));
    }

    #[test]
    fn test_grant_spans_published_length() {
        let mut state = RoundState::new(2);
        arrive_all(&mut state, &[2, 4]);
        state.publish_offsets();

        assert_eq!(state.begin_merge(1).unwrap(), (2, 4));
        assert_eq!(state.phase(), Phase::Merging);
    }

    #[test]
    fn test_last_merge_resets_the_round() {
        let mut state = RoundState::new(2);
        arrive_all(&mut state, &[1, 1]);
        state.publish_offsets();

        assert_eq!(state.begin_merge(1).unwrap(), (1, 1));
        assert!(!state.finish_merge(1));
        assert_eq!(state.begin_merge(0).unwrap(), (0, 1));
        assert!(state.finish_merge(0));

        assert_eq!(state.phase(), Phase::Collecting);
        assert_eq!(state.completed(), 1);
        assert!(!state.all_arrived());
        assert!(state.slots.iter().all(|slot| *slot == Slot::Idle));

        state.arrive(0, 7).unwrap();
        assert_eq!(state.phase(), Phase::ArrivalBarrier);
    }
}
