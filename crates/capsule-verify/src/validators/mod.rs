//! Built-in validators

pub mod authorization;
pub mod condition;
pub mod time_consensus;

pub use authorization::AuthorizationValidator;
pub use condition::ConditionValidator;
pub use time_consensus::{SourceObservation, TimeConsensusValidator};
