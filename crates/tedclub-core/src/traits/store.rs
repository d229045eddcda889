//! Durable store for weekly cycles.
//!
//! Implementations must make every method atomic on its own: a cycle and its
//! candidates are inserted together or not at all, and selection updates
//! write vote counts and the winner in one step.

use crate::error::Result;
use crate::types::{Cycle, NewCycle, PollTally};

pub trait CycleStore: Send + Sync {
    /// Insert a cycle with all its candidates. Returns the new cycle id.
    fn insert_cycle(&self, cycle: &NewCycle) -> Result<i64>;

    /// The cycle with the latest start timestamp, if any.
    fn current_cycle(&self) -> Result<Option<Cycle>>;

    /// Record final vote counts and the winning candidate.
    ///
    /// Fails with `CandidateNotInCycle` if `candidate_id` does not belong to
    /// the cycle.
    fn update_selection(&self, cycle_id: i64, candidate_id: &str, tallies: &[PollTally])
    -> Result<()>;

    /// Store discussion material. Fails with `NoSelectionYet` if the cycle has
    /// no winner.
    fn update_discussion(&self, cycle_id: i64, text: &str) -> Result<()>;

    /// Most recent cycles, newest first.
    fn recent_cycles(&self, limit: usize) -> Result<Vec<Cycle>>;

    fn ping(&self) -> Result<()>;
}
