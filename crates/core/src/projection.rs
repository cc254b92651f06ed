//! Projection of records into transport messages and shell commands.
//!
//! [`ZocaloMessage`] turns a record into the JSON payload sent downstream.
//! [`command_line`] renders an invocation as the equivalent operator command,
//! used for dry runs and for comparing handler output in tests.

use serde_json::{json, Value};

use crate::records::{
    Invocation, IspybJobInvocation, Parameter, RecipeInvocation, SpaceGroup, Sweep,
    TriggerVariable, UnitCell,
};

/// Records that can be sent as a message payload.
pub trait ZocaloMessage {
    fn to_message(&self) -> Value;
}

impl ZocaloMessage for RecipeInvocation {
    fn to_message(&self) -> Value {
        json!({
            "recipes": [self.recipe],
            "parameters": { "ispyb_dcid": self.dcid },
        })
    }
}

impl ZocaloMessage for Parameter {
    fn to_message(&self) -> Value {
        json!({ "key": self.key, "value": self.value })
    }
}

impl ZocaloMessage for TriggerVariable {
    fn to_message(&self) -> Value {
        json!({ "key": self.key, "value": self.value })
    }
}

impl ZocaloMessage for Sweep {
    fn to_message(&self) -> Value {
        json!({ "DCID": self.dcid, "start": self.start, "end": self.end })
    }
}

impl ZocaloMessage for UnitCell {
    /// Positional six-element array.
    fn to_message(&self) -> Value {
        Value::Array(self.values().iter().map(|v| json!(v)).collect())
    }
}

impl ZocaloMessage for SpaceGroup {
    /// Canonical symbol without whitespace, e.g. `P41212`.
    fn to_message(&self) -> Value {
        Value::String(self.canonical())
    }
}

impl ZocaloMessage for IspybJobInvocation {
    fn to_message(&self) -> Value {
        json!({
            "DCID": self.dcid,
            "autostart": self.autostart,
            "recipe": self.recipe,
            "source": self.source,
            "comment": self.comment,
            "displayname": self.displayname,
            "parameters": self.parameters.to_message(),
            "sweeps": self.sweeps.to_message(),
            "triggervariables": self.triggervariables.to_message(),
        })
    }
}

impl ZocaloMessage for Invocation {
    fn to_message(&self) -> Value {
        match self {
            Self::Recipe(invocation) => invocation.to_message(),
            Self::IspybJob(invocation) => invocation.to_message(),
        }
    }
}

impl<T: ZocaloMessage> ZocaloMessage for [T] {
    fn to_message(&self) -> Value {
        Value::Array(self.iter().map(ZocaloMessage::to_message).collect())
    }
}

impl<T: ZocaloMessage> ZocaloMessage for Vec<T> {
    fn to_message(&self) -> Value {
        self.as_slice().to_message()
    }
}

impl Invocation {
    /// Transport channel the invocation is sent on.
    pub fn channel(&self) -> &'static str {
        match self {
            Self::Recipe(_) => "dispatcher",
            Self::IspybJob(_) => "ispyb",
        }
    }
}

// ---------------------------------------------------------------------------
// Command lines
// ---------------------------------------------------------------------------

/// Quote a string the way the operator tooling echoes literals: single
/// quotes unless the text contains a single quote and no double quote.
fn quoted(text: &str) -> String {
    let quote = if text.contains('\'') && !text.contains('"') {
        '"'
    } else {
        '\''
    };
    let mut out = String::with_capacity(text.len() + 2);
    out.push(quote);
    for ch in text.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out.push(quote);
    out
}

fn job_command_line(job: &IspybJobInvocation) -> String {
    let mut parts = vec![
        "ispyb.job".to_string(),
        "--new".to_string(),
        format!("--dcid={}", job.dcid),
        format!("--source={}", job.source),
        format!("--recipe={}", job.recipe),
    ];
    parts.extend(
        job.sweeps
            .iter()
            .map(|s| format!("--add-sweep={}:{}:{}", s.dcid, s.start, s.end)),
    );
    parts.extend(
        job.parameters
            .iter()
            .map(|p| format!("--add-param={}:{}", p.key, p.value)),
    );
    if !job.displayname.is_empty() {
        parts.push(format!("--display={}", quoted(&job.displayname)));
    }
    if !job.comment.is_empty() {
        parts.push(format!("--comment={}", quoted(&job.comment)));
    }
    if job.autostart {
        parts.push("--trigger".to_string());
    }
    parts.extend(
        job.triggervariables
            .iter()
            .map(|tv| format!("--trigger-variable={}:{}", tv.key, tv.value)),
    );
    parts.join(" ")
}

/// The command an operator would run to execute the invocation by hand.
pub fn command_line(invocation: &Invocation) -> String {
    match invocation {
        Invocation::Recipe(recipe) => format!("zocalo.go -r {} {}", recipe.recipe, recipe.dcid),
        Invocation::IspybJob(job) => job_command_line(job),
    }
}

pub fn command_lines(invocations: &[Invocation]) -> Vec<String> {
    invocations.iter().map(command_line).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recipe_message_and_command() {
        let invocation = Invocation::from(RecipeInvocation::new(42, "archive-nexus"));
        assert_eq!(
            invocation.to_message(),
            json!({ "recipes": ["archive-nexus"], "parameters": { "ispyb_dcid": 42 } })
        );
        assert_eq!(command_line(&invocation), "zocalo.go -r archive-nexus 42");
        assert_eq!(invocation.channel(), "dispatcher");
    }

    #[test]
    fn job_command_line_orders_flags() {
        let job = IspybJobInvocation::new(5, "autoprocessing-fast-dp", "automatic")
            .with_autostart(true)
            .with_display_name("fast_dp")
            .with_comment("reprocess")
            .with_sweeps([Sweep::new(5, 1, 100)])
            .with_parameters([Parameter::new("spacegroup", "P41212")])
            .with_trigger_variables([TriggerVariable::new("ispyb_autoprocscalingid", "7")]);
        assert_eq!(
            command_line(&job.into()),
            "ispyb.job --new --dcid=5 --source=automatic --recipe=autoprocessing-fast-dp \
             --add-sweep=5:1:100 --add-param=spacegroup:P41212 --display='fast_dp' \
             --comment='reprocess' --trigger --trigger-variable=ispyb_autoprocscalingid:7"
        );
    }

    #[test]
    fn job_without_extras_is_minimal() {
        let job = IspybJobInvocation::new(5, "postprocessing-shelxt", "automatic");
        assert_eq!(
            command_line(&job.into()),
            "ispyb.job --new --dcid=5 --source=automatic --recipe=postprocessing-shelxt"
        );
    }

    #[test]
    fn quoting_follows_literal_rules() {
        assert_eq!(quoted("xia2 dials"), "'xia2 dials'");
        assert_eq!(quoted("it's"), "\"it's\"");
        assert_eq!(quoted("it's \"x\""), "'it\\'s \"x\"'");
        assert_eq!(quoted("a\\b\nc"), "'a\\\\b\\nc'");
    }

    #[test]
    fn job_message_keeps_every_field() {
        let job = IspybJobInvocation::new(5, "postprocessing-dimple", "automatic")
            .with_parameters([Parameter::new("data", "/x.mtz")])
            .with_sweeps([Sweep::new(5, 1, 10)]);
        let message = Invocation::from(job).to_message();
        assert_eq!(message["DCID"], 5);
        assert_eq!(message["autostart"], false);
        assert_eq!(message["parameters"], json!([{ "key": "data", "value": "/x.mtz" }]));
        assert_eq!(message["sweeps"], json!([{ "DCID": 5, "start": 1, "end": 10 }]));
        assert_eq!(message["triggervariables"], json!([]));
    }

    #[test]
    fn cell_and_space_group_messages() {
        let cell = UnitCell::new(10, 11, 12, 90, 91.0, 92);
        assert_eq!(cell.to_message(), json!([10, 11, 12, 90, 91.0, 92]));
        assert_eq!(SpaceGroup::new("P 21").to_message(), json!("P1211"));
    }

    #[test]
    fn space_group_message_is_canonical() {
        assert_eq!(SpaceGroup::new("P 41 21 2").to_message(), json!("P41212"));
        assert_eq!(SpaceGroup::new("p 43 21 2").to_message(), json!("P43212"));
    }
}
