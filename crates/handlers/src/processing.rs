//! Downstream processing triggered by `PROCESSING` events.
//!
//! When a data reduction pipeline finishes, the scenario carries its
//! results ([`ProcessingInputs`]) and names the follow-up [`Target`]:
//! molecular replacement (DIMPLE, MrBUMP), experimental phasing (fast_ep,
//! big_ep) or small-molecule structure solution (SHELXT).
//!
//! Phasing and MrBUMP jobs can be routed to the cloud when a cloudbursting
//! rule in the [`DispatchContext`] applies.

use mimas_core::records::{Parameter, ProcessingInputs, TriggerVariable};
use mimas_core::registry::DispatchContext;
use mimas_core::types::{Event, Target};
use mimas_core::{CoreError, HandlerRegistry, Invocation, Scenario, Specification};

use crate::common::{is_mx_beamline, is_rotation, is_screening, job};
use crate::i19::is_i19;

const SCALING_ID_VARIABLE: &str = "ispyb_autoprocscalingid";

// ---------------------------------------------------------------------------
// Predicates
// ---------------------------------------------------------------------------

pub fn is_processing() -> Specification {
    Specification::event(Event::Processing)
}

/// Characterisation (screening) collections are not worth solving.
pub fn is_characterization() -> Specification {
    is_screening()
}

/// Industrial visits (`in…`) are excluded from phasing.
pub fn is_industrial_visit() -> Specification {
    Specification::visit_prefix(["in"])
}

pub fn is_anomalous() -> Specification {
    Specification::custom("has anomalous scatterer", |scenario| {
        scenario.anomalous_scatterer.is_some()
    })
}

/// Rotation data on an MX beamline, the shared guard of the solving rules.
fn is_solvable(target: Target) -> Specification {
    is_rotation()
        & !is_characterization()
        & is_processing()
        & Specification::target(target)
        & is_mx_beamline()
}

pub fn register(registry: &mut HandlerRegistry) -> Result<(), CoreError> {
    registry.register("dimple", is_solvable(Target::Dimple), handle_dimple)?;
    registry.register(
        "shelxt",
        is_processing() & Specification::target(Target::Shelxt) & is_i19(),
        handle_shelxt,
    )?;
    registry.register("mrbump", is_solvable(Target::Mrbump), handle_mrbump)?;
    registry.register(
        "fast_ep",
        is_solvable(Target::FastEp) & is_anomalous(),
        handle_fast_ep,
    )?;
    registry.register(
        "big_ep",
        is_processing()
            & Specification::target(Target::BigEp)
            & is_mx_beamline()
            & !is_industrial_visit()
            & is_anomalous(),
        handle_big_ep,
    )?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn inputs(scenario: &Scenario) -> ProcessingInputs {
    scenario.processing.clone().unwrap_or_default()
}

fn missing(scenario: &Scenario, what: &str) -> CoreError {
    CoreError::Precondition {
        dcid: scenario.dcid,
        reason: format!("processing results carry no {what}"),
    }
}

fn scaling_id(scenario: &Scenario, inputs: &ProcessingInputs) -> Result<String, CoreError> {
    inputs
        .scaling_id
        .map(|id| id.to_string())
        .ok_or_else(|| missing(scenario, "scaling_id"))
}

fn mtz(scenario: &Scenario, inputs: &ProcessingInputs) -> Result<String, CoreError> {
    inputs.mtz.clone().ok_or_else(|| missing(scenario, "mtz"))
}

/// Recipe name to use and trigger variables to add, depending on whether a
/// cloudbursting rule sends this recipe to the cloud.
fn route(
    scenario: &Scenario,
    context: &DispatchContext,
    recipe: &str,
) -> (String, Vec<TriggerVariable>) {
    match context.cloud_rule(scenario, recipe) {
        Some(rule) => {
            tracing::info!(
                dcid = scenario.dcid,
                recipe,
                rule = %rule.specification,
                "Routing job to the cloud",
            );
            (
                format!("{recipe}-cloud"),
                vec![TriggerVariable::new("statistic-cluster", "iris")],
            )
        }
        None => (recipe.to_string(), Vec::new()),
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// Molecular replacement against every search model linked to the collection.
fn handle_dimple(
    scenario: &Scenario,
    _context: &DispatchContext,
) -> Result<Vec<Invocation>, CoreError> {
    let inputs = inputs(scenario);
    let models: Vec<&str> = inputs.pdb.iter().filter_map(|m| m.reference()).collect();
    if models.is_empty() {
        tracing::debug!(dcid = scenario.dcid, "No search models, skipping DIMPLE");
        return Ok(Vec::new());
    }
    let scaling_id = scaling_id(scenario, &inputs)?;

    let mut parameters = vec![
        Parameter::new("data", mtz(scenario, &inputs)?),
        Parameter::new("scaling_id", scaling_id.as_str()),
        Parameter::new("create_symlink", inputs.tag.as_deref().unwrap_or("dimple")),
    ];
    parameters.extend(models.into_iter().map(|model| Parameter::new("pdb", model)));

    Ok(vec![job(scenario, "postprocessing-dimple")
        .with_autostart(true)
        .with_comment(inputs.comment.clone().unwrap_or_default())
        .with_display_name("DIMPLE")
        .with_parameters(parameters)
        .with_trigger_variables([TriggerVariable::new(SCALING_ID_VARIABLE, scaling_id)])
        .into()])
}

fn handle_shelxt(
    scenario: &Scenario,
    _context: &DispatchContext,
) -> Result<Vec<Invocation>, CoreError> {
    let inputs = inputs(scenario);
    let scaling_id = scaling_id(scenario, &inputs)?;
    Ok(vec![job(scenario, "postprocessing-shelxt")
        .with_comment(inputs.comment.clone().unwrap_or_default())
        .with_display_name("shelxt")
        .with_parameters([Parameter::new("scaling_id", scaling_id.as_str())])
        .with_trigger_variables([TriggerVariable::new(SCALING_ID_VARIABLE, scaling_id)])
        .into()])
}

/// One search without models and, when model files exist, one with them.
fn handle_mrbump(
    scenario: &Scenario,
    context: &DispatchContext,
) -> Result<Vec<Invocation>, CoreError> {
    let inputs = inputs(scenario);
    if inputs.pdb.is_empty() {
        return Ok(Vec::new());
    }
    let scaling_id = scaling_id(scenario, &inputs)?;
    let hklin = mtz(scenario, &inputs)?;
    let local_files: Vec<&str> = inputs
        .pdb
        .iter()
        .filter_map(|model| model.filepath.as_deref())
        .collect();

    let (recipe, cloud_variables) = route(scenario, context, "postprocessing-mrbump");
    let mut trigger_variables = vec![TriggerVariable::new(SCALING_ID_VARIABLE, scaling_id.as_str())];
    trigger_variables.extend(cloud_variables);

    let mut model_sets = vec![Vec::new()];
    if !local_files.is_empty() {
        model_sets.push(local_files);
    }

    Ok(model_sets
        .into_iter()
        .map(|files| {
            let mut parameters = vec![
                Parameter::new("hklin", hklin.as_str()),
                Parameter::new("scaling_id", scaling_id.as_str()),
            ];
            if !files.is_empty() {
                parameters.push(Parameter::new("dophmmer", "False"));
                parameters.push(Parameter::new("mdlunmod", "True"));
            }
            parameters.extend(files.into_iter().map(|f| Parameter::new("localfile", f)));

            job(scenario, recipe.as_str())
                .with_comment(inputs.comment.clone().unwrap_or_default())
                .with_display_name("MrBUMP")
                .with_parameters(parameters)
                .with_trigger_variables(trigger_variables.iter().cloned())
                .into()
        })
        .collect())
}

fn handle_fast_ep(
    scenario: &Scenario,
    context: &DispatchContext,
) -> Result<Vec<Invocation>, CoreError> {
    let inputs = inputs(scenario);
    let scaling_id = scaling_id(scenario, &inputs)?;
    let (recipe, cloud_variables) = route(scenario, context, "postprocessing-fast-ep");

    Ok(vec![job(scenario, recipe)
        .with_comment(inputs.comment.clone().unwrap_or_default())
        .with_display_name("fast_ep")
        .with_parameters([
            Parameter::new("data", mtz(scenario, &inputs)?),
            Parameter::new("scaling_id", scaling_id.as_str()),
        ])
        .with_trigger_variables([TriggerVariable::new(SCALING_ID_VARIABLE, scaling_id)])
        .with_trigger_variables(cloud_variables)
        .into()])
}

/// Output directory suffix big_ep uses for results of each upstream pipeline.
fn big_ep_path_ext(scenario: &Scenario, tag: Option<&str>) -> Option<String> {
    let base = match tag? {
        "autoPROC" => "autoPROC/ap-run",
        "autoPROC+STARANISO" => "autoPROC-STARANISO/ap-run",
        "xia2 3dii" => "xia2/3dii-run",
        "xia2 dials" => "xia2/dials-run",
        "xia2 3dii (multi)" => "multi-xia2/3dii",
        "xia2 dials (multi)" => "multi-xia2/dials",
        "xia2.multiplex" => "xia2.multiplex",
        _ => return None,
    };
    Some(match &scenario.spacegroup {
        Some(spacegroup) => format!("{base}-{}", spacegroup.canonical()),
        None => base.to_string(),
    })
}

fn handle_big_ep(
    scenario: &Scenario,
    context: &DispatchContext,
) -> Result<Vec<Invocation>, CoreError> {
    let inputs = inputs(scenario);
    let (Some(data), Some(scaled_unmerged_mtz)) = (&inputs.mtz, &inputs.scaled_unmerged_mtz)
    else {
        tracing::debug!(dcid = scenario.dcid, "Merged and unmerged data required, skipping big_ep");
        return Ok(Vec::new());
    };
    let scaling_id = scaling_id(scenario, &inputs)?;
    let program_id = inputs
        .program_id
        .ok_or_else(|| missing(scenario, "program_id"))?;

    let mut parameters = vec![
        Parameter::new("data", data.as_str()),
        Parameter::new("scaled_unmerged_mtz", scaled_unmerged_mtz.as_str()),
        Parameter::new("program_id", program_id.to_string()),
        Parameter::new("scaling_id", scaling_id.as_str()),
    ];
    if let Some(upstream) = &inputs.upstream_source {
        parameters.push(Parameter::new("upstream_source", upstream.as_str()));
    }

    let mut trigger_variables = vec![TriggerVariable::new(SCALING_ID_VARIABLE, scaling_id)];
    if let Some(path_ext) = big_ep_path_ext(scenario, inputs.tag.as_deref()) {
        trigger_variables.push(TriggerVariable::new("path_ext", path_ext));
    }
    let (recipe, cloud_variables) = route(scenario, context, "postprocessing-big-ep");
    trigger_variables.extend(cloud_variables);

    Ok(vec![job(scenario, recipe)
        .with_comment(inputs.comment.clone().unwrap_or_default())
        .with_display_name("big_ep")
        .with_parameters(parameters)
        .with_trigger_variables(trigger_variables)
        .into()])
}
