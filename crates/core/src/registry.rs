//! Handler registry and scenario dispatch.
//!
//! A [`HandlerRegistry`] is built once at startup by registering
//! `(name, specification, handler)` triples, then shared read-only.
//! [`HandlerRegistry::handle_scenario`] runs every handler whose
//! specification matches, in registration order, and concatenates their
//! invocations.

use std::sync::Arc;

use crate::error::CoreError;
use crate::records::{Invocation, Scenario};
use crate::specification::Specification;
use crate::validation::validate_invocation;

/// A rule body: turns a matching scenario into invocations.
pub type Handler =
    Arc<dyn Fn(&Scenario, &DispatchContext) -> Result<Vec<Invocation>, CoreError> + Send + Sync>;

// ---------------------------------------------------------------------------
// Dispatch context
// ---------------------------------------------------------------------------

/// Route matching recipes to the cloud variant.
#[derive(Debug, Clone)]
pub struct CloudburstRule {
    pub specification: Specification,
    /// Recipe name fragments eligible for cloud execution.
    pub recipes: Vec<String>,
}

impl CloudburstRule {
    pub fn new<I, S>(specification: Specification, recipes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            specification,
            recipes: recipes.into_iter().map(Into::into).collect(),
        }
    }

    pub fn applies_to(&self, scenario: &Scenario, recipe: &str) -> bool {
        self.specification.is_satisfied_by(scenario)
            && self.recipes.iter().any(|fragment| recipe.contains(fragment.as_str()))
    }
}

/// Auxiliary input for handlers beyond the scenario itself.
#[derive(Debug, Clone, Default)]
pub struct DispatchContext {
    cloudbursting: Vec<CloudburstRule>,
}

impl DispatchContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cloudburst_rule(mut self, rule: CloudburstRule) -> Self {
        self.cloudbursting.push(rule);
        self
    }

    pub fn cloudburst_rules(&self) -> &[CloudburstRule] {
        &self.cloudbursting
    }

    /// The first active rule sending `recipe` to the cloud for this scenario.
    pub fn cloud_rule(&self, scenario: &Scenario, recipe: &str) -> Option<&CloudburstRule> {
        self.cloudbursting
            .iter()
            .find(|rule| rule.applies_to(scenario, recipe))
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

struct Registration {
    name: String,
    specification: Specification,
    handler: Handler,
}

/// Identifies a registered handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationHandle {
    /// Position in dispatch order.
    pub index: usize,
    pub name: String,
}

/// Ordered collection of handlers keyed by unique name.
#[derive(Default)]
pub struct HandlerRegistry {
    registrations: Vec<Registration>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a handler. Names must be unique within the registry.
    pub fn register<F>(
        &mut self,
        name: impl Into<String>,
        specification: Specification,
        handler: F,
    ) -> Result<RegistrationHandle, CoreError>
    where
        F: Fn(&Scenario, &DispatchContext) -> Result<Vec<Invocation>, CoreError>
            + Send
            + Sync
            + 'static,
    {
        let name = name.into();
        if self.registrations.iter().any(|r| r.name == name) {
            return Err(CoreError::Conflict(format!(
                "A handler named '{name}' is already registered"
            )));
        }
        tracing::debug!(handler = %name, specification = %specification, "Registering handler");
        let index = self.registrations.len();
        self.registrations.push(Registration {
            name: name.clone(),
            specification,
            handler: Arc::new(handler),
        });
        Ok(RegistrationHandle { index, name })
    }

    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }

    /// Handler names in dispatch order.
    pub fn names(&self) -> Vec<&str> {
        self.registrations.iter().map(|r| r.name.as_str()).collect()
    }

    pub fn specification(&self, name: &str) -> Option<&Specification> {
        self.registrations
            .iter()
            .find(|r| r.name == name)
            .map(|r| &r.specification)
    }

    /// Names of the handlers whose specification matches the scenario.
    pub fn matching(&self, scenario: &Scenario) -> Vec<&str> {
        self.registrations
            .iter()
            .filter(|r| r.specification.is_satisfied_by(scenario))
            .map(|r| r.name.as_str())
            .collect()
    }

    /// Run every matching handler and collect their invocations.
    ///
    /// The scenario is assumed valid. Each emitted invocation is validated
    /// before it is accepted; the first invalid one aborts dispatch. Handler
    /// errors propagate unchanged. Duplicates are kept.
    pub fn handle_scenario(
        &self,
        scenario: &Scenario,
        context: &DispatchContext,
    ) -> Result<Vec<Invocation>, CoreError> {
        let mut invocations = Vec::new();

        for registration in &self.registrations {
            if !registration.specification.is_satisfied_by(scenario) {
                tracing::trace!(
                    handler = %registration.name,
                    dcid = scenario.dcid,
                    "Specification not satisfied",
                );
                continue;
            }

            let emitted = (registration.handler)(scenario, context).inspect_err(|e| {
                tracing::error!(
                    handler = %registration.name,
                    dcid = scenario.dcid,
                    error = %e,
                    "Handler failed",
                );
            })?;

            tracing::debug!(
                handler = %registration.name,
                dcid = scenario.dcid,
                count = emitted.len(),
                "Handler matched",
            );

            for invocation in emitted {
                if invocation.dcid() != scenario.dcid {
                    tracing::error!(
                        handler = %registration.name,
                        dcid = scenario.dcid,
                        emitted_dcid = invocation.dcid(),
                        "Handler emitted an invocation for another data collection",
                    );
                    return Err(CoreError::Validation(format!(
                        "handler '{}' emitted {} for DCID {}, expected DCID {}",
                        registration.name,
                        invocation.recipe(),
                        invocation.dcid(),
                        scenario.dcid,
                    )));
                }
                validate_invocation(&invocation).inspect_err(|e| {
                    tracing::error!(
                        handler = %registration.name,
                        dcid = scenario.dcid,
                        error = %e,
                        "Handler emitted an invalid invocation",
                    );
                })?;
                invocations.push(invocation);
            }
        }

        Ok(invocations)
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("handlers", &self.names())
            .finish()
    }
}
