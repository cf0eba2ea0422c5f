//! Bounded-concurrency ensemble fan-out: dispatch a request to every
//! suitable provider, gather under a deadline, and vote over the results.

pub mod engine;
pub mod voting;

pub use engine::{run, Attempt, EnsembleOutcome, TaskOutcome};
pub use voting::{vote, VoteOutcome, VotingStrategy};
