//! Rules for VMXi (`i02-2`).

use mimas_core::records::Parameter;
use mimas_core::registry::DispatchContext;
use mimas_core::{CoreError, HandlerRegistry, Invocation, Scenario};

use crate::common::{
    absorption_level, cc_half_significance, is_end, is_gridscan, is_rotation, is_start, is_vmxi,
    job, preferred, recipe, recipes,
};

pub fn register(registry: &mut HandlerRegistry) -> Result<(), CoreError> {
    registry.register("vmxi_start", is_vmxi() & is_start(), handle_vmxi_start)?;
    registry.register("vmxi_end", is_vmxi() & is_end(), handle_vmxi_end)?;
    registry.register(
        "vmxi_gridscan",
        is_vmxi() & is_end() & is_gridscan(),
        handle_vmxi_gridscan,
    )?;
    registry.register(
        "vmxi_rotation",
        is_vmxi() & is_end() & is_rotation(),
        handle_vmxi_rotation,
    )?;
    Ok(())
}

/// Nothing runs while VMXi is still collecting.
fn handle_vmxi_start(
    _scenario: &Scenario,
    _context: &DispatchContext,
) -> Result<Vec<Invocation>, CoreError> {
    Ok(Vec::new())
}

fn handle_vmxi_end(
    scenario: &Scenario,
    _context: &DispatchContext,
) -> Result<Vec<Invocation>, CoreError> {
    Ok(recipes(
        scenario,
        &[
            "generate-crystal-thumbnails",
            "generate-diffraction-preview",
            "archive-nexus",
        ],
    ))
}

fn handle_vmxi_gridscan(
    scenario: &Scenario,
    _context: &DispatchContext,
) -> Result<Vec<Invocation>, CoreError> {
    Ok(recipes(scenario, &["vmxi-spot-counts-per-image"]))
}

fn handle_vmxi_rotation(
    scenario: &Scenario,
    _context: &DispatchContext,
) -> Result<Vec<Invocation>, CoreError> {
    Ok(vec![
        recipe(scenario, "vmxi-per-image-analysis"),
        job(scenario, "autoprocessing-fast-dp-eiger")
            .with_autostart(true)
            .with_display_name("fast_dp")
            .into(),
        job(scenario, "autoprocessing-xia2-dials-eiger")
            .with_autostart(preferred(scenario, "xia2/DIALS"))
            .with_display_name("xia2 dials")
            .with_parameters([
                cc_half_significance(),
                Parameter::new("remove_blanks", "true"),
                Parameter::new("failover", "true"),
                absorption_level(scenario),
            ])
            .into(),
        job(scenario, "autoprocessing-xia2-3dii-eiger")
            .with_autostart(preferred(scenario, "xia2/XDS"))
            .with_display_name("xia2 3dii")
            .with_parameters([cc_half_significance()])
            .into(),
        job(scenario, "autoprocessing-autoPROC-eiger")
            .with_autostart(preferred(scenario, "autoPROC"))
            .with_display_name("autoPROC")
            .into(),
    ])
}
