//! `mimas-handlers` -- the facility rule set.
//!
//! Each module registers the handlers for one family of beamlines or one
//! kind of follow-up processing. [`register_all`] installs the complete set
//! in its fixed dispatch order; tests build registries from single modules.

pub mod common;
pub mod i15;
pub mod i19;
pub mod mx;
pub mod processing;
pub mod ssx;
pub mod vmxi;

use mimas_core::{CoreError, HandlerRegistry};

/// Register every facility rule, in dispatch order.
pub fn register_all(registry: &mut HandlerRegistry) -> Result<(), CoreError> {
    mx::register(registry)?;
    vmxi::register(registry)?;
    i19::register(registry)?;
    i15::register(registry)?;
    ssx::register(registry)?;
    processing::register(registry)?;
    tracing::info!(handlers = registry.len(), "Registered facility rules");
    Ok(())
}

/// A registry holding the complete rule set.
pub fn default_registry() -> Result<HandlerRegistry, CoreError> {
    let mut registry = HandlerRegistry::new();
    register_all(&mut registry)?;
    Ok(registry)
}
