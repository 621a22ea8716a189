//! Collects values produced by a fixed set of worker threads into one
//! contiguous buffer ordered by worker index.
//!
//! Every worker owns a partition it appends to without locking. When a round
//! ends, all workers meet at a barrier, the leader (worker `0`) lays out the
//! partitions back to back, and each worker copies its own values into its
//! range of the shared output buffer.

pub mod collector;
pub mod config;
pub mod error;
mod output;
pub mod partition;
pub mod round;
pub mod worker;

pub use collector::MultiCollector;
pub use config::{CollectorConfig, ConfigErr};
pub use error::{CollectErr, Location, Result};
pub use partition::Partition;
pub use round::{LEADER, Phase, RoundEngine};
pub use worker::Worker;
