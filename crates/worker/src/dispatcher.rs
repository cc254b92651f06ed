//! Request handling: intake, dispatch and output rendering.

use serde_json::json;

use mimas_core::projection::{command_line, ZocaloMessage};
use mimas_core::{CoreError, DispatchContext, HandlerRegistry, Invocation};

use crate::config::{OutputMode, WorkerConfig};
use crate::request::{RequestError, ScenarioRequest};

/// Owns the rule set and turns request lines into output lines.
#[derive(Debug)]
pub struct Dispatcher {
    registry: HandlerRegistry,
    context: DispatchContext,
    output: OutputMode,
}

impl Dispatcher {
    pub fn new(registry: HandlerRegistry, context: DispatchContext, output: OutputMode) -> Self {
        Self {
            registry,
            context,
            output,
        }
    }

    /// The complete facility rule set, configured from `config`.
    pub fn from_config(config: &WorkerConfig) -> Result<Self, CoreError> {
        Ok(Self::new(
            mimas_handlers::default_registry()?,
            config.dispatch_context(),
            config.output,
        ))
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    /// Handle one request.
    ///
    /// Nothing is rendered unless the whole request succeeds: a handler
    /// failure or an invalid invocation rejects the request as a unit.
    pub fn process_line(&self, line: &str) -> Result<Vec<String>, RequestError> {
        let scenario = ScenarioRequest::from_json(line)?.into_scenario()?;
        tracing::debug!(dcid = scenario.dcid, event = %scenario.event, "Evaluating scenario");

        let invocations = self.registry.handle_scenario(&scenario, &self.context)?;
        for invocation in &invocations {
            tracing::info!(
                dcid = invocation.dcid(),
                channel = invocation.channel(),
                recipe = invocation.recipe(),
                "Running",
            );
        }
        Ok(invocations.iter().map(|i| self.render(i)).collect())
    }

    fn render(&self, invocation: &Invocation) -> String {
        match self.output {
            OutputMode::Messages => json!({
                "channel": invocation.channel(),
                "message": invocation.to_message(),
            })
            .to_string(),
            OutputMode::Commands => command_line(invocation),
        }
    }
}
