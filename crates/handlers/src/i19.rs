//! Rules for the small-molecule beamlines I19-1 and I19-2.
//!
//! Collections are processed as a group with the multi-sweep small-molecule
//! xia2 pipelines. Diamond-anvil-cell collections get an extra block of
//! parameters masking the cell's own diffraction. Serial collections are
//! processed per sweep, then once more when the group completes.

use mimas_core::records::Parameter;
use mimas_core::registry::DispatchContext;
use mimas_core::types::{DcClass, DetectorClass};
use mimas_core::{CoreError, HandlerRegistry, Invocation, Scenario, Specification};

use crate::common::{
    absorption_level, group_sweeps, is_eiger, is_end, is_end_group, is_pilatus, is_serial,
    is_start, job, recipe, recipes, symmetry_parameter_sets,
};

pub const I19_BEAMLINES: [&str; 2] = ["i19-1", "i19-2"];

pub fn is_i19() -> Specification {
    Specification::beamlines(I19_BEAMLINES)
}

/// Extra xia2 parameters for diamond-anvil-cell collections.
pub fn dac_parameters() -> Vec<Parameter> {
    vec![
        Parameter::new("dynamic_shadowing", "true"),
        Parameter::new("ice_rings.filter", "true"),
        Parameter::new("ice_rings.unit_cell", "3.1652,3.1652,3.1652,90,90,90"),
        Parameter::new("ice_rings.space_group", "Im-3m"),
        Parameter::new("ice_rings.width", "0.01"),
        Parameter::new("scan_varying", "true"),
        Parameter::new("resolution_range", "999,15"),
        Parameter::new("keep_all_reflections", "false"),
        Parameter::new("cc_half", "none"),
        Parameter::new("isigma", "2"),
    ]
}

pub fn register(registry: &mut HandlerRegistry) -> Result<(), CoreError> {
    registry.register(
        "i19_pilatus_start",
        is_i19() & is_start() & is_pilatus(),
        handle_i19_pilatus_start,
    )?;
    registry.register(
        "i19_eiger_start",
        is_i19() & is_start() & is_eiger(),
        handle_i19_eiger_start,
    )?;
    registry.register(
        "i19_pilatus_end",
        is_i19() & is_end() & is_pilatus(),
        handle_i19_pilatus_end,
    )?;
    registry.register(
        "i19_eiger_serial_end",
        is_i19() & is_end() & is_eiger() & is_serial(),
        handle_i19_eiger_serial_end,
    )?;
    registry.register(
        "i19_eiger_serial_group_end",
        is_i19() & is_end_group() & is_eiger() & is_serial(),
        handle_i19_eiger_serial_group_end,
    )?;
    registry.register(
        "i19_eiger_end",
        is_i19() & is_end() & is_eiger() & !is_serial(),
        handle_i19_eiger_end,
    )?;
    registry.register("i19_end", is_i19() & is_end() & !is_serial(), handle_i19_end)?;
    Ok(())
}

fn handle_i19_pilatus_start(
    scenario: &Scenario,
    _context: &DispatchContext,
) -> Result<Vec<Invocation>, CoreError> {
    Ok(recipes(scenario, &["per-image-analysis-rotation-i19"]))
}

fn handle_i19_eiger_start(
    scenario: &Scenario,
    _context: &DispatchContext,
) -> Result<Vec<Invocation>, CoreError> {
    Ok(recipes(scenario, &["per-image-analysis-rotation-swmr-i19"]))
}

fn handle_i19_pilatus_end(
    scenario: &Scenario,
    _context: &DispatchContext,
) -> Result<Vec<Invocation>, CoreError> {
    Ok(recipes(
        scenario,
        &["archive-cbfs", "processing-rlv", "strategy-screen19"],
    ))
}

/// Process the single sweep of this serial collection.
fn handle_i19_eiger_serial_end(
    scenario: &Scenario,
    _context: &DispatchContext,
) -> Result<Vec<Invocation>, CoreError> {
    let own_sweeps: Vec<_> = scenario
        .getsweepslistfromsamedcg
        .iter()
        .filter(|sweep| sweep.dcid == scenario.dcid)
        .cloned()
        .collect();
    if own_sweeps.len() != 1 {
        return Err(CoreError::Precondition {
            dcid: scenario.dcid,
            reason: format!(
                "expected exactly one sweep for the collection itself, found {}",
                own_sweeps.len()
            ),
        });
    }

    Ok(symmetry_parameter_sets(scenario)
        .into_iter()
        .map(|symmetry| {
            job(scenario, "autoprocessing-multi-xia2-smallmolecule-nexus")
                .with_autostart(true)
                .with_display_name("xia2 dials")
                .with_sweeps(own_sweeps.iter().cloned())
                .with_parameters(symmetry)
                .with_parameters([absorption_level(scenario)])
                .into()
        })
        .collect())
}

fn handle_i19_eiger_serial_group_end(
    scenario: &Scenario,
    _context: &DispatchContext,
) -> Result<Vec<Invocation>, CoreError> {
    Ok(recipes(scenario, &["autoprocessing-i19serial-groupend"]))
}

fn handle_i19_eiger_end(
    scenario: &Scenario,
    _context: &DispatchContext,
) -> Result<Vec<Invocation>, CoreError> {
    Ok(recipes(
        scenario,
        &[
            "archive-nexus",
            "processing-rlv-eiger",
            "generate-diffraction-preview",
            "strategy-screen19-eiger",
        ],
    ))
}

fn handle_i19_end(
    scenario: &Scenario,
    _context: &DispatchContext,
) -> Result<Vec<Invocation>, CoreError> {
    let pilatus = scenario.detectorclass == Some(DetectorClass::Pilatus);
    let (dials, dials_aimless) = if pilatus {
        (
            "autoprocessing-multi-xia2-smallmolecule",
            "autoprocessing-multi-xia2-smallmolecule-dials-aiml",
        )
    } else {
        (
            "autoprocessing-multi-xia2-smallmolecule-nexus",
            "autoprocessing-multi-xia2-smallmolecule-d-a-nexus",
        )
    };
    let dac = if scenario.dcclass == DcClass::DiamondAnvilCell {
        dac_parameters()
    } else {
        Vec::new()
    };

    let mut tasks = vec![recipe(scenario, "generate-crystal-thumbnails")];
    for symmetry in symmetry_parameter_sets(scenario) {
        tasks.push(
            job(scenario, dials)
                .with_autostart(true)
                .with_display_name("xia2 dials")
                .with_sweeps(group_sweeps(scenario))
                .with_parameters(symmetry.iter().cloned())
                .with_parameters([absorption_level(scenario)])
                .with_parameters(dac.iter().cloned())
                .into(),
        );
        tasks.push(
            job(scenario, dials_aimless)
                .with_autostart(true)
                .with_display_name("xia2 dials-aimless")
                .with_sweeps(group_sweeps(scenario))
                .with_parameters(symmetry)
                .with_parameters(dac.iter().cloned())
                .into(),
        );
    }
    Ok(tasks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use mimas_core::records::Sweep;
    use mimas_core::types::Event;

    fn serial(sweeps: Vec<Sweep>) -> Scenario {
        Scenario::new(100, DcClass::SerialFixed, Event::End, "i19-2")
            .with_detector_class(DetectorClass::Eiger)
            .with_sweeps(sweeps)
    }

    #[test]
    fn serial_end_processes_own_sweep_only() {
        let scenario = serial(vec![Sweep::new(99, 1, 10), Sweep::new(100, 1, 20)]);
        let tasks = handle_i19_eiger_serial_end(&scenario, &DispatchContext::new()).unwrap();
        assert_eq!(tasks.len(), 1);
        assert_matches!(&tasks[0], Invocation::IspybJob(job) => {
            assert_eq!(job.sweeps, vec![Sweep::new(100, 1, 20)]);
            assert!(job.autostart);
        });
    }

    #[test]
    fn serial_end_without_own_sweep_is_a_precondition_failure() {
        let scenario = serial(vec![Sweep::new(99, 1, 10)]);
        assert_matches!(
            handle_i19_eiger_serial_end(&scenario, &DispatchContext::new()),
            Err(CoreError::Precondition { dcid: 100, .. })
        );

        let doubled = serial(vec![Sweep::new(100, 1, 10), Sweep::new(100, 11, 20)]);
        assert_matches!(
            handle_i19_eiger_serial_end(&doubled, &DispatchContext::new()),
            Err(CoreError::Precondition { .. })
        );
    }

    #[test]
    fn dac_block_only_for_diamond_anvil_cell() {
        let rotation = Scenario::new(5, DcClass::Rotation, Event::End, "i19-1")
            .with_detector_class(DetectorClass::Pilatus);
        let tasks = handle_i19_end(&rotation, &DispatchContext::new()).unwrap();
        assert_matches!(&tasks[1], Invocation::IspybJob(job) => {
            assert_eq!(job.parameters.len(), 1);
        });

        let dac = rotation.with_dcclass(DcClass::DiamondAnvilCell);
        let tasks = handle_i19_end(&dac, &DispatchContext::new()).unwrap();
        assert_matches!(&tasks[1], Invocation::IspybJob(job) => {
            assert_eq!(job.parameters.len(), 1 + dac_parameters().len());
        });
    }
}
