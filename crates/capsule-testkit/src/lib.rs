//! Capsule Testing Infrastructure
//!
//! Scriptable collaborators, fixtures and proptest strategies shared by the
//! capsule crates' tests.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
//!
//! # Usage
//!
//! ```toml
//! [dev-dependencies]
//! capsule-testkit = { path = "../capsule-testkit" }
//! ```
//!
//! ```rust,no_run
//! use capsule_testkit::*;
//!
//! let network = capsule_effects::MemoryNetwork::new();
//! let primary = ScriptedGateway::new("gw-a", network.clone());
//! primary.set_mode(GatewayMode::Down);
//! ```

pub mod fixtures;
pub mod gateway;
pub mod strategies;
pub mod time_source;

pub use fixtures::*;
pub use gateway::{GatewayMode, ScriptedGateway, ScriptedUploader, UploaderMode};
pub use time_source::{ScriptedTimeSource, SourceMode};
