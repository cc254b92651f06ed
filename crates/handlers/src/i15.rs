//! Rules for I15 (extreme conditions).

use mimas_core::registry::DispatchContext;
use mimas_core::{CoreError, HandlerRegistry, Invocation, Scenario, Specification};

use crate::common::{
    absorption_level, group_sweeps, is_end, job, recipe, recipes, symmetry_parameter_sets,
};

pub const I15_BEAMLINE: &str = "i15";

pub fn register(registry: &mut HandlerRegistry) -> Result<(), CoreError> {
    registry.register(
        "i15_end",
        Specification::beamline(I15_BEAMLINE) & is_end(),
        handle_i15_end,
    )?;
    Ok(())
}

/// The thumbnail recipe is repeated for each symmetry variant; repeats are
/// kept as emitted.
fn handle_i15_end(
    scenario: &Scenario,
    _context: &DispatchContext,
) -> Result<Vec<Invocation>, CoreError> {
    let mut tasks = recipes(
        scenario,
        &[
            "generate-crystal-thumbnails",
            "processing-rlv",
            "strategy-screen19",
            "per-image-analysis-rotation",
        ],
    );

    for symmetry in symmetry_parameter_sets(scenario) {
        tasks.push(recipe(scenario, "generate-crystal-thumbnails"));
        tasks.push(
            job(scenario, "autoprocessing-multi-xia2-smallmolecule")
                .with_autostart(true)
                .with_display_name("xia2 dials")
                .with_sweeps(group_sweeps(scenario))
                .with_parameters(symmetry.iter().cloned())
                .with_parameters([absorption_level(scenario)])
                .into(),
        );
        tasks.push(
            job(scenario, "autoprocessing-multi-xia2-smallmolecule-dials-aiml")
                .with_autostart(true)
                .with_display_name("xia2 dials-aimless")
                .with_sweeps(group_sweeps(scenario))
                .with_parameters(symmetry)
                .into(),
        );
    }
    Ok(tasks)
}
