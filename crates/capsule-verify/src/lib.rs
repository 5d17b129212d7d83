//! # Capsule Verify
//!
//! **Purpose**: Decide whether an unlock attempt may proceed by running
//! independent validators and reducing their results under a policy.
//!
//! # Architecture Constraints
//!
//! - YES the `Validator` seam, cost classes and reduction policies
//! - YES authorization, time-consensus and condition validators
//! - YES evidence digests on every result for the audit trail
//! - NO state changes or key release (that is `capsule-agent`)
//! - NO proof systems; a cryptographic validator plugs in through `Validator`

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Pipeline and reduction
pub mod pipeline;

/// Results and decisions
pub mod result;

/// Validator interface and context
pub mod validator;

/// Built-in validators
pub mod validators;

pub use pipeline::VerificationPipeline;
pub use result::{UnlockDecision, ValidatorCost, VerificationResult};
pub use validator::{Validator, VerificationContext};
pub use validators::{
    AuthorizationValidator, ConditionValidator, SourceObservation, TimeConsensusValidator,
};
