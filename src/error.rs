use std::{
    error::Error,
    fmt::{self, Display},
    panic,
};

use crate::round::Phase;

/// The result type used across the collector.
pub type Result<T> = std::result::Result<T, CollectErr>;

/// The source position of the call that produced an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    pub file: &'static str,
    pub line: u32,
    pub column: u32,
}

impl Location {
    /// Captures the location of the caller, following `#[track_caller]` frames.
    #[track_caller]
    pub fn caller() -> Self {
        let location = panic::Location::caller();

        Self {
            file: location.file(),
            line: location.line(),
            column: location.column(),
        }
    }
}

impl Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "file {}, line {}, column {}",
            self.file, self.line, self.column
        )
    }
}

/// Failures reported by the partitioned collector.
///
/// A worker that never shows up for a round is not reported, it makes every
/// other participant wait forever.
#[derive(Debug)]
pub enum CollectErr {
    /// The worker index is not in `[0, workers)`.
    OutOfRange {
        index: usize,
        workers: usize,
        location: Location,
    },
    /// There is already a live handle for this worker index.
    AlreadyClaimed { index: usize },
    /// The operation is not valid in the current phase of the round.
    PhaseViolation {
        index: usize,
        expected: &'static str,
        found: Phase,
    },
    /// The partition changed size between the arrival and the merge.
    LengthMismatch {
        index: usize,
        published: usize,
        actual: usize,
    },
    /// The merged buffer was read while a round was still merging.
    RoundInProgress { phase: Phase },
}

impl CollectErr {
    #[track_caller]
    pub(crate) fn out_of_range(index: usize, workers: usize) -> Self {
        Self::OutOfRange {
            index,
            workers,
            location: Location::caller(),
        }
    }
}

impl Display for CollectErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfRange {
                index,
                workers,
                location,
            } => write!(
                f,
                "message worker index {index} out of range for {workers} worker(s), {location}"
            ),
            Self::AlreadyClaimed { index } => {
                write!(f, "worker index {index} is already claimed")
            }
            Self::PhaseViolation {
                index,
                expected,
                found,
            } => write!(
                f,
                "worker {index} expected {expected}, but the round is in {found}"
            ),
            Self::LengthMismatch {
                index,
                published,
                actual,
            } => write!(
                f,
                "worker {index} published {published} value(s) on arrival but holds {actual}"
            ),
            Self::RoundInProgress { phase } => {
                write!(f, "merged result is not readable while the round is in {phase}")
            }
        }
    }
}

impl Error for CollectErr {}
