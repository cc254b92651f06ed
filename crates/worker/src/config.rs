//! Worker configuration from environment variables.
//!
//! [`WorkerConfig::from_env`] reads the output mode and the cloudbursting
//! settings; [`WorkerConfig::dispatch_context`] turns the latter into the
//! [`DispatchContext`] handed to every dispatch.

use mimas_core::registry::CloudburstRule;
use mimas_core::{DispatchContext, Specification};

/// How dispatched invocations are written to stdout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// One `{"channel": ..., "message": ...}` JSON object per line.
    Messages,
    /// The equivalent operator command line, for dry runs.
    Commands,
}

impl OutputMode {
    pub fn from_str(s: &str) -> Result<Self, ConfigError> {
        match s.trim().to_ascii_lowercase().as_str() {
            "messages" => Ok(Self::Messages),
            "commands" => Ok(Self::Commands),
            _ => Err(ConfigError::invalid("MIMAS_OUTPUT", s, "messages or commands")),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{name}={value:?} is invalid, expected {expected}")]
    Invalid {
        name: &'static str,
        value: String,
        expected: &'static str,
    },
}

impl ConfigError {
    fn invalid(name: &'static str, value: &str, expected: &'static str) -> Self {
        Self::Invalid {
            name,
            value: value.to_string(),
            expected,
        }
    }
}

const DEFAULT_CLOUD_BEAMLINES: &str = "i03,i04,i04-1,i24";
const DEFAULT_CLOUD_RECIPES: &str = "mrbump,fast-ep,big-ep";

/// Worker configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub output: OutputMode,
    /// Whether eligible jobs are routed to the cloud cluster.
    pub cloudbursting: bool,
    pub cloud_beamlines: Vec<String>,
    /// Recipe name fragments eligible for cloud routing.
    pub cloud_recipes: Vec<String>,
}

impl WorkerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                 | Default                  |
    /// |-------------------------|--------------------------|
    /// | `MIMAS_OUTPUT`          | `messages`               |
    /// | `MIMAS_CLOUDBURSTING`   | `false`                  |
    /// | `MIMAS_CLOUD_BEAMLINES` | `i03,i04,i04-1,i24`      |
    /// | `MIMAS_CLOUD_RECIPES`   | `mrbump,fast-ep,big-ep`  |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through `lookup` instead of the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let output = match lookup("MIMAS_OUTPUT") {
            Some(value) => OutputMode::from_str(&value)?,
            None => OutputMode::Messages,
        };

        let cloudbursting = match lookup("MIMAS_CLOUDBURSTING") {
            Some(value) => parse_flag("MIMAS_CLOUDBURSTING", &value)?,
            None => false,
        };

        let cloud_beamlines = split_list(
            &lookup("MIMAS_CLOUD_BEAMLINES").unwrap_or_else(|| DEFAULT_CLOUD_BEAMLINES.into()),
        );
        let cloud_recipes = split_list(
            &lookup("MIMAS_CLOUD_RECIPES").unwrap_or_else(|| DEFAULT_CLOUD_RECIPES.into()),
        );

        Ok(Self {
            output,
            cloudbursting,
            cloud_beamlines,
            cloud_recipes,
        })
    }

    /// Dispatch context carrying the cloudbursting rule when enabled.
    pub fn dispatch_context(&self) -> DispatchContext {
        let context = DispatchContext::new();
        if !self.cloudbursting || self.cloud_beamlines.is_empty() || self.cloud_recipes.is_empty()
        {
            return context;
        }
        context.with_cloudburst_rule(CloudburstRule::new(
            Specification::beamlines(self.cloud_beamlines.iter().cloned()),
            self.cloud_recipes.iter().cloned(),
        ))
    }
}

fn parse_flag(name: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(ConfigError::invalid(name, value, "a boolean")),
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> Result<WorkerConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        WorkerConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults() {
        let config = config(&[]).unwrap();
        assert_eq!(config.output, OutputMode::Messages);
        assert!(!config.cloudbursting);
        assert_eq!(config.cloud_beamlines, vec!["i03", "i04", "i04-1", "i24"]);
        assert_eq!(config.cloud_recipes, vec!["mrbump", "fast-ep", "big-ep"]);
        assert!(config.dispatch_context().cloudburst_rules().is_empty());
    }

    #[test]
    fn cloudbursting_installs_one_rule() {
        let config = config(&[
            ("MIMAS_CLOUDBURSTING", "TRUE"),
            ("MIMAS_CLOUD_BEAMLINES", " i03 ,,i24"),
        ])
        .unwrap();
        assert_eq!(config.cloud_beamlines, vec!["i03", "i24"]);
        let context = config.dispatch_context();
        assert_eq!(context.cloudburst_rules().len(), 1);
        assert_eq!(context.cloudburst_rules()[0].recipes.len(), 3);
    }

    #[test]
    fn invalid_values_are_errors() {
        assert!(config(&[("MIMAS_OUTPUT", "yaml")]).is_err());
        assert!(config(&[("MIMAS_CLOUDBURSTING", "sometimes")]).is_err());
        assert_eq!(
            config(&[("MIMAS_OUTPUT", "Commands")]).unwrap().output,
            OutputMode::Commands
        );
    }
}
