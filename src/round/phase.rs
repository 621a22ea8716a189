use std::fmt::{self, Display};

/// The phase a collect/merge round is in.
///
/// A round moves strictly forward and wraps back to `Collecting` once the
/// last worker has merged:
///
/// `Collecting -> ArrivalBarrier -> OffsetsReady -> Merging -> Collecting`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    /// Workers append to their partitions, no one has entered the barrier.
    #[default]
    Collecting,
    /// Some workers have arrived, the leader has not published offsets yet.
    ArrivalBarrier,
    /// Offsets are published and the output buffer is allocated.
    OffsetsReady,
    /// At least one worker has started copying its partition.
    Merging,
}

impl Phase {
    /// Whether the transition from `self` into `next` is a legal step.
    pub fn can_advance_to(self, next: Phase) -> bool {
        matches!(
            (self, next),
            (Phase::Collecting, Phase::ArrivalBarrier)
                | (Phase::ArrivalBarrier, Phase::OffsetsReady)
                | (Phase::OffsetsReady, Phase::Merging)
                | (Phase::Merging, Phase::Collecting)
        )
    }

    /// Whether workers may copy into the output buffer.
    pub fn accepts_merges(self) -> bool {
        matches!(self, Phase::OffsetsReady | Phase::Merging)
    }

    /// Whether the output buffer holds a stable, fully merged result.
    pub fn result_readable(self) -> bool {
        matches!(self, Phase::Collecting | Phase::ArrivalBarrier)
    }
}

impl Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Collecting => "collecting",
            Phase::ArrivalBarrier => "arrival barrier",
            Phase::OffsetsReady => "offsets ready",
            Phase::Merging => "merging",
        };

        f.write_str(name)
    }
}
