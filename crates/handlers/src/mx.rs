//! Rules for the MX beamlines, VMXi excepted.
//!
//! Start-of-collection analysis, end-of-collection archiving and previews,
//! screening strategies, and the automatic data reduction jobs run on every
//! completed rotation.

use mimas_core::records::Parameter;
use mimas_core::registry::DispatchContext;
use mimas_core::types::{DcClass, DetectorClass};
use mimas_core::{CoreError, HandlerRegistry, Invocation, Scenario};

use crate::common::{
    absorption_level, cc_half_significance, copper_ring_parameters, group_sweeps, is_eiger,
    is_end, is_gridscan, is_pilatus, is_rotation, is_screening, is_serial, is_standard_mx,
    is_start, job, preferred, recipe, recipes, symmetry_parameter_sets, RUN_STATUS_STOPPED,
    VMXM_BEAMLINE,
};

pub fn register(registry: &mut HandlerRegistry) -> Result<(), CoreError> {
    registry.register(
        "pilatus_gridscan_start",
        is_pilatus() & is_gridscan() & is_start() & is_standard_mx(),
        handle_pilatus_gridscan_start,
    )?;
    registry.register(
        "pilatus_not_gridscan_start",
        is_pilatus() & !is_gridscan() & !is_serial() & is_start() & is_standard_mx(),
        handle_pilatus_not_gridscan_start,
    )?;
    registry.register(
        "eiger_start",
        is_eiger() & is_start() & !is_screening() & !is_serial() & is_standard_mx(),
        handle_eiger_start,
    )?;
    registry.register(
        "eiger_end",
        is_eiger() & is_end() & !is_serial() & is_standard_mx(),
        handle_eiger_end,
    )?;
    registry.register(
        "pilatus_end",
        is_pilatus() & is_end() & !is_serial() & is_standard_mx(),
        handle_pilatus_end,
    )?;
    registry.register(
        "eiger_screening",
        is_eiger() & is_screening() & is_end() & is_standard_mx(),
        handle_eiger_screening,
    )?;
    registry.register(
        "pilatus_screening",
        is_pilatus() & is_screening() & is_end() & is_standard_mx(),
        handle_pilatus_screening,
    )?;
    registry.register(
        "rotation_end",
        is_rotation() & is_end() & is_standard_mx(),
        handle_rotation_end,
    )?;
    Ok(())
}

fn handle_pilatus_gridscan_start(
    scenario: &Scenario,
    _context: &DispatchContext,
) -> Result<Vec<Invocation>, CoreError> {
    Ok(recipes(scenario, &["archive-cbfs", "per-image-analysis-gridscan"]))
}

fn handle_pilatus_not_gridscan_start(
    scenario: &Scenario,
    _context: &DispatchContext,
) -> Result<Vec<Invocation>, CoreError> {
    Ok(recipes(scenario, &["archive-cbfs", "per-image-analysis-rotation"]))
}

fn handle_eiger_start(
    scenario: &Scenario,
    _context: &DispatchContext,
) -> Result<Vec<Invocation>, CoreError> {
    let kind = if scenario.dcclass == DcClass::Gridscan {
        "gridscan"
    } else {
        "rotation"
    };
    let suffix = if scenario.beamline == VMXM_BEAMLINE {
        "-vmxm"
    } else {
        ""
    };
    Ok(vec![recipe(
        scenario,
        &format!("per-image-analysis-{kind}-swmr{suffix}"),
    )])
}

fn handle_eiger_end(
    scenario: &Scenario,
    _context: &DispatchContext,
) -> Result<Vec<Invocation>, CoreError> {
    let mut tasks = recipes(scenario, &["generate-crystal-thumbnails", "archive-nexus"]);
    if scenario.runstatus != RUN_STATUS_STOPPED {
        tasks.push(recipe(scenario, "generate-diffraction-preview"));
    }
    Ok(tasks)
}

fn handle_pilatus_end(
    scenario: &Scenario,
    _context: &DispatchContext,
) -> Result<Vec<Invocation>, CoreError> {
    Ok(recipes(scenario, &["generate-crystal-thumbnails"]))
}

fn handle_eiger_screening(
    scenario: &Scenario,
    _context: &DispatchContext,
) -> Result<Vec<Invocation>, CoreError> {
    Ok(recipes(
        scenario,
        &[
            "per-image-analysis-rotation-swmr",
            "strategy-align-crystal",
            "strategy-mosflm",
            "strategy-edna-eiger",
        ],
    ))
}

fn handle_pilatus_screening(
    scenario: &Scenario,
    _context: &DispatchContext,
) -> Result<Vec<Invocation>, CoreError> {
    Ok(recipes(scenario, &["strategy-mosflm", "strategy-edna"]))
}

fn handle_rotation_end(
    scenario: &Scenario,
    _context: &DispatchContext,
) -> Result<Vec<Invocation>, CoreError> {
    let eiger = scenario.detectorclass == Some(DetectorClass::Eiger);
    let suffix = if eiger { "-eiger" } else { "" };

    let mut tasks = vec![recipe(scenario, &format!("processing-rlv{suffix}"))];

    // fast_dp runs once, with the space group if there is one
    let mut fast_dp = job(scenario, format!("autoprocessing-fast-dp{suffix}"))
        .with_autostart(true)
        .with_display_name("fast_dp");
    if let Some(spacegroup) = &scenario.spacegroup {
        fast_dp = fast_dp.with_parameters([Parameter::new("spacegroup", spacegroup.canonical())]);
    }
    tasks.push(fast_dp.into());

    let beamline_extras = if scenario.beamline == VMXM_BEAMLINE {
        let mut extras = copper_ring_parameters();
        extras.push(Parameter::new("remove_blanks", "true"));
        extras.push(Parameter::new("failover", "true"));
        extras
    } else {
        Vec::new()
    };

    let suffix = if eiger { "-eiger-cluster" } else { "" };
    let related = scenario.has_related_data_collections();

    for symmetry in symmetry_parameter_sets(scenario) {
        tasks.push(
            job(scenario, format!("autoprocessing-xia2-dials{suffix}"))
                .with_autostart(preferred(scenario, "xia2/DIALS"))
                .with_display_name("xia2 dials")
                .with_parameters([cc_half_significance()])
                .with_parameters(symmetry.iter().cloned())
                .with_parameters(beamline_extras.iter().cloned())
                .with_parameters([absorption_level(scenario)])
                .into(),
        );
        tasks.push(
            job(scenario, format!("autoprocessing-xia2-3dii{suffix}"))
                .with_autostart(preferred(scenario, "xia2/XDS"))
                .with_display_name("xia2 3dii")
                .with_parameters([cc_half_significance()])
                .with_parameters(symmetry.iter().cloned())
                .into(),
        );
        tasks.push(
            job(scenario, format!("autoprocessing-autoPROC{suffix}"))
                .with_autostart(preferred(scenario, "autoPROC"))
                .with_display_name("autoPROC")
                .with_parameters(symmetry.iter().cloned())
                .into(),
        );

        if related {
            tasks.push(
                job(scenario, format!("autoprocessing-multi-xia2-dials{suffix}"))
                    .with_display_name("xia2 dials (multi)")
                    .with_parameters([cc_half_significance()])
                    .with_parameters(symmetry.iter().cloned())
                    .with_parameters([absorption_level(scenario)])
                    .with_sweeps(group_sweeps(scenario))
                    .into(),
            );
            tasks.push(
                job(scenario, format!("autoprocessing-multi-xia2-3dii{suffix}"))
                    .with_display_name("xia2 3dii (multi)")
                    .with_parameters([cc_half_significance()])
                    .with_parameters(symmetry.iter().cloned())
                    .with_sweeps(group_sweeps(scenario))
                    .into(),
            );
        }
    }

    Ok(tasks)
}
