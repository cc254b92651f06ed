//! `mimas-core` -- domain model and dispatch engine for Mimas.
//!
//! Mimas turns a description of a data-collection event (a [`Scenario`])
//! into the processing instructions ([`Invocation`]s) the facility runs for
//! it. This crate holds everything independent of the facility rules:
//! records and their validation, the specification algebra, the handler
//! registry, and projection to messages and command lines.

pub mod element;
pub mod error;
pub mod projection;
pub mod records;
pub mod registry;
pub mod spacegroup;
pub mod specification;
pub mod strict;
pub mod types;
pub mod validation;

pub use error::CoreError;
pub use records::{Invocation, Scenario};
pub use registry::{DispatchContext, HandlerRegistry};
pub use specification::Specification;
