//! Management Protocol Types for mprot
//!
//! A distributed application is made of components whose lifecycle is
//! described by per-type finite-state **management protocols**. This crate
//! holds the immutable model those protocols are built from, plus the plan
//! vocabulary the analyzer replays against an application.
//!
//! # Key Concepts
//!
//! - **ManagementProtocol**: states, operations and the transitions between
//!   them, plus the ρ (requirements), γ (offers) and φ (fault handlers)
//!   tables for every stable and pending state.
//! - **Transition**: one `source --op--> target` step. Its identifier is the
//!   concatenation `source‖op‖target` and names the pending state an
//!   instance sits in while the operation is in flight.
//! - **Node**: a component type, i.e. a name, an initial state and a protocol.
//! - **ExecutableElement**: one plan step (scale out, scale in, start or end
//!   an operation).
//! - **Constraint**: an ordering edge between two plan steps.

#![deny(unsafe_code)]

mod element;
mod errors;
mod ids;
mod node;
mod protocol;

pub use element::*;
pub use errors::*;
pub use ids::*;
pub use node::*;
pub use protocol::*;
