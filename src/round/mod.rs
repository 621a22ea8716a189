mod engine;
mod phase;
mod state;

pub use engine::{LEADER, RoundEngine};
pub use phase::Phase;
pub(crate) use state::RoundState;
