//! Predicates and parameter blocks shared by the beamline rule modules.

use mimas_core::records::{
    IspybJobInvocation, Parameter, RecipeInvocation, Sweep, VMXI_BEAMLINE,
};
use mimas_core::types::{DcClass, DetectorClass, Event};
use mimas_core::{Invocation, Scenario, Specification};

/// Beamlines running macromolecular crystallography.
pub const MX_BEAMLINES: [&str; 7] = ["i02-1", "i02-2", "i03", "i04", "i04-1", "i23", "i24"];

/// VMXm, whose Eiger collections use the `-vmxm` analysis recipes.
pub const VMXM_BEAMLINE: &str = "i02-1";

/// Source recorded on every job Mimas creates.
pub const AUTOMATIC: &str = "automatic";

pub const RUN_STATUS_STOPPED: &str = "DataCollection Stopped";

// ---------------------------------------------------------------------------
// Predicates
// ---------------------------------------------------------------------------

pub fn is_mx_beamline() -> Specification {
    Specification::beamlines(MX_BEAMLINES)
}

pub fn is_vmxi() -> Specification {
    Specification::beamline(VMXI_BEAMLINE)
}

pub fn is_pilatus() -> Specification {
    Specification::detector_class(DetectorClass::Pilatus)
}

pub fn is_eiger() -> Specification {
    Specification::detector_class(DetectorClass::Eiger)
}

pub fn is_start() -> Specification {
    Specification::event(Event::Start)
}

pub fn is_end() -> Specification {
    Specification::event(Event::End)
}

pub fn is_end_group() -> Specification {
    Specification::event(Event::EndGroup)
}

pub fn is_gridscan() -> Specification {
    Specification::dcclass(DcClass::Gridscan)
}

pub fn is_rotation() -> Specification {
    Specification::dcclass(DcClass::Rotation)
}

pub fn is_screening() -> Specification {
    Specification::dcclass(DcClass::Screening)
}

pub fn is_serial() -> Specification {
    Specification::is_serial()
}

/// MX beamline other than VMXi.
pub fn is_standard_mx() -> Specification {
    is_mx_beamline() & !is_vmxi()
}

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

pub fn recipe(scenario: &Scenario, name: &str) -> Invocation {
    RecipeInvocation::new(scenario.dcid, name).into()
}

pub fn recipes(scenario: &Scenario, names: &[&str]) -> Vec<Invocation> {
    names.iter().map(|name| recipe(scenario, name)).collect()
}

/// An untriggered job with the automatic source.
pub fn job(scenario: &Scenario, recipe: impl Into<String>) -> IspybJobInvocation {
    IspybJobInvocation::new(scenario.dcid, recipe, AUTOMATIC)
}

/// Whether the user asked for `pipeline` to be the one that autostarts.
pub fn preferred(scenario: &Scenario, pipeline: &str) -> bool {
    scenario.preferred_processing.as_deref() == Some(pipeline)
}

pub fn group_sweeps(scenario: &Scenario) -> Vec<Sweep> {
    scenario.getsweepslistfromsamedcg.clone()
}

// ---------------------------------------------------------------------------
// Parameter blocks
// ---------------------------------------------------------------------------

pub fn cc_half_significance() -> Parameter {
    Parameter::new("resolution.cc_half_significance_level", "0.1")
}

/// `high` when an anomalous scatterer is expected, else `medium`.
pub fn absorption_level(scenario: &Scenario) -> Parameter {
    let level = if scenario.anomalous_scatterer.is_some() {
        "high"
    } else {
        "medium"
    };
    Parameter::new("absorption_level", level)
}

/// Ice-ring masking for the copper sample support used on VMXm.
pub fn copper_ring_parameters() -> Vec<Parameter> {
    vec![
        Parameter::new("ice_rings.unit_cell", "3.615,3.615,3.615,90,90,90"),
        Parameter::new("ice_rings.space_group", "fm-3m"),
        Parameter::new("ice_rings.width", "0.01"),
        Parameter::new("ice_rings.filter", "true"),
    ]
}

/// `spacegroup` and, when also known, `unit_cell`. Empty without a space group.
pub fn symmetry_parameters(scenario: &Scenario) -> Vec<Parameter> {
    let Some(spacegroup) = &scenario.spacegroup else {
        return Vec::new();
    };
    let mut parameters = vec![Parameter::new("spacegroup", spacegroup.canonical())];
    if let Some(unitcell) = &scenario.unitcell {
        parameters.push(Parameter::new("unit_cell", unitcell.to_string()));
    }
    parameters
}

/// Symmetry variants to process with: always unconstrained, plus the user
/// symmetry when a space group is known.
pub fn symmetry_parameter_sets(scenario: &Scenario) -> Vec<Vec<Parameter>> {
    let mut sets = vec![Vec::new()];
    let symmetry = symmetry_parameters(scenario);
    if !symmetry.is_empty() {
        sets.push(symmetry);
    }
    sets
}

#[cfg(test)]
mod tests {
    use super::*;
    use mimas_core::records::{AnomalousScatterer, SpaceGroup, UnitCell};

    fn rotation() -> Scenario {
        Scenario::new(1, DcClass::Rotation, Event::End, "i03")
    }

    #[test]
    fn symmetry_needs_a_space_group() {
        let without = rotation().with_unitcell(UnitCell::new(10, 11, 12, 90, 90, 90));
        assert!(symmetry_parameters(&without).is_empty());
        assert_eq!(symmetry_parameter_sets(&without).len(), 1);

        let with = without.with_spacegroup(SpaceGroup::new("P21"));
        assert_eq!(
            symmetry_parameters(&with),
            vec![
                Parameter::new("spacegroup", "P1211"),
                Parameter::new("unit_cell", "10,11,12,90,90,90"),
            ]
        );
        assert_eq!(symmetry_parameter_sets(&with).len(), 2);
    }

    #[test]
    fn absorption_follows_scatterer() {
        assert_eq!(absorption_level(&rotation()).value, "medium");
        let anomalous = rotation().with_anomalous_scatterer(AnomalousScatterer::new("Se"));
        assert_eq!(absorption_level(&anomalous).value, "high");
    }

    #[test]
    fn standard_mx_excludes_vmxi() {
        assert!(is_standard_mx().is_satisfied_by(&rotation()));
        let vmxi = Scenario::new(1, DcClass::Rotation, Event::End, VMXI_BEAMLINE);
        assert!(!is_standard_mx().is_satisfied_by(&vmxi));
        assert!(is_mx_beamline().is_satisfied_by(&vmxi));
    }

    #[test]
    fn preference_is_exact() {
        let scenario = rotation().with_preferred_processing("xia2/DIALS");
        assert!(preferred(&scenario, "xia2/DIALS"));
        assert!(!preferred(&scenario, "xia2/XDS"));
        assert!(!preferred(&rotation(), "autoPROC"));
    }
}
