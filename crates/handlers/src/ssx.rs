//! Serial crystallography (fixed target and jet) on any beamline.

use mimas_core::registry::DispatchContext;
use mimas_core::{CoreError, HandlerRegistry, Invocation, Scenario};

use crate::common::{
    group_sweeps, is_eiger, is_end, is_pilatus, is_serial, is_start, job, recipes,
    symmetry_parameters,
};

pub fn register(registry: &mut HandlerRegistry) -> Result<(), CoreError> {
    registry.register(
        "ssx_pilatus_start",
        is_pilatus() & is_start() & is_serial(),
        |scenario: &Scenario, _: &DispatchContext| {
            Ok(recipes(scenario, &["pia-index-ssx-pilatus"]))
        },
    )?;
    registry.register(
        "ssx_eiger_start",
        is_eiger() & is_start() & is_serial(),
        |scenario: &Scenario, _: &DispatchContext| Ok(recipes(scenario, &["pia-index-ssx-swmr"])),
    )?;
    registry.register(
        "ssx_pilatus_end",
        is_pilatus() & is_end() & is_serial(),
        |scenario: &Scenario, _: &DispatchContext| Ok(ssx_processing(scenario, "pilatus")),
    )?;
    registry.register(
        "ssx_eiger_end",
        is_eiger() & is_end() & is_serial(),
        |scenario: &Scenario, _: &DispatchContext| Ok(ssx_processing(scenario, "eiger")),
    )?;
    Ok(())
}

/// One xia2.ssx job over the whole group, with the user symmetry if given.
fn ssx_processing(scenario: &Scenario, detector: &str) -> Vec<Invocation> {
    vec![job(scenario, format!("autoprocessing-xia2-ssx-{detector}"))
        .with_autostart(true)
        .with_sweeps(group_sweeps(scenario))
        .with_parameters(symmetry_parameters(scenario))
        .into()]
}
