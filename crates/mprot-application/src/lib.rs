//! Application Registry for mprot
//!
//! An [`Application`] owns the node types of a system, the live
//! [`NodeInstance`]s created from them and the [`BindingGraph`] recording
//! which instance currently satisfies which requirement of which other
//! instance. Management actions (scale out, scale in, start and end an
//! operation) are enacted here, one at a time.
//!
//! # Architecture
//!
//! - [`NodeInstance`]: per-instance state machine (stable or pending state,
//!   container, broken mark)
//! - [`BindingGraph`]: requirement bindings, the single source of truth for
//!   both "who do I depend on" and "who depends on me"
//! - [`PiVersion`] / [`BindingResolver`]: how candidate providers are chosen
//! - [`Application`]: the registry and the cascading-fault propagation
//!
//! Every action either applies fully or leaves the application unchanged and
//! returns a [`ManagementError`](mprot_types::ManagementError). The one
//! exception is a failed `op_end`, which leaves the instance broken.

#![deny(unsafe_code)]

pub mod application;
pub mod binding;
pub mod fault;
pub mod instance;
pub mod resolver;

pub use application::Application;
pub use binding::{Binding, BindingGraph};
pub use fault::{BrokenCause, Fault};
pub use instance::NodeInstance;
pub use resolver::{BindingResolver, Candidate, GreedyResolver, PiVersion};
