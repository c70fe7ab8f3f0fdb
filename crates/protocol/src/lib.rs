//! Wire types for payframe.
//!
//! This crate contains the serde-serializable types that cross the boundary
//! between the session controller and its collaborators: the host page that
//! renders surfaces, the hosted payment page that posts messages, the caller
//! that receives outcomes and the server-side gateway session API.
//!
//! # Design Philosophy
//!
//! Types in this crate are:
//! * Pure data: No behavior beyond serialization and small accessors
//! * Host-agnostic: Usable from native tests, the CLI and the wasm binding
//! * Stable: Changes only when a wire shape changes
//!
//! Classification and lifecycle logic live in `payframe`.

pub mod gateway;
pub mod outcome;
pub mod signal;
pub mod strategy;

pub use gateway::*;
pub use outcome::*;
pub use signal::*;
pub use strategy::*;
