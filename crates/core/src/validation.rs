//! Validation of Mimas records.
//!
//! [`MimasObject`] is the closed set of record kinds that can be validated.
//! [`validate`] dispatches over its tag; [`validate_json`] is the dynamic
//! boundary for untyped input and rejects anything that is not a tagged
//! domain record.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use validator::Validate;

use crate::error::CoreError;
use crate::records::{
    AnomalousScatterer, Invocation, IspybJobInvocation, Parameter, RecipeInvocation, Scenario,
    SpaceGroup, Sweep, TriggerVariable, UnitCell,
};
use crate::strict;

/// Any record Mimas knows how to validate.
///
/// On the wire this is `{"kind": "<kind>", "data": <record>}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum MimasObject {
    Scenario(#[serde(deserialize_with = "strict::record")] Scenario),
    RecipeInvocation(#[serde(deserialize_with = "strict::record")] RecipeInvocation),
    IspybJobInvocation(#[serde(deserialize_with = "strict::record")] IspybJobInvocation),
    Parameter(#[serde(deserialize_with = "strict::record")] Parameter),
    TriggerVariable(#[serde(deserialize_with = "strict::record")] TriggerVariable),
    Sweep(#[serde(deserialize_with = "strict::record")] Sweep),
    UnitCell(#[serde(deserialize_with = "strict::record")] UnitCell),
    SpaceGroup(#[serde(deserialize_with = "strict::record")] SpaceGroup),
    AnomalousScatterer(#[serde(deserialize_with = "strict::record")] AnomalousScatterer),
    /// Validated element-wise; empty sequences are valid.
    Sequence(Vec<MimasObject>),
}

impl MimasObject {
    /// Record kind as it appears in the `kind` tag.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Scenario(_) => "scenario",
            Self::RecipeInvocation(_) => "recipe_invocation",
            Self::IspybJobInvocation(_) => "ispyb_job_invocation",
            Self::Parameter(_) => "parameter",
            Self::TriggerVariable(_) => "trigger_variable",
            Self::Sweep(_) => "sweep",
            Self::UnitCell(_) => "unit_cell",
            Self::SpaceGroup(_) => "space_group",
            Self::AnomalousScatterer(_) => "anomalous_scatterer",
            Self::Sequence(_) => "sequence",
        }
    }
}

impl From<Invocation> for MimasObject {
    fn from(invocation: Invocation) -> Self {
        match invocation {
            Invocation::Recipe(recipe) => Self::RecipeInvocation(recipe),
            Invocation::IspybJob(job) => Self::IspybJobInvocation(job),
        }
    }
}

impl From<Scenario> for MimasObject {
    fn from(scenario: Scenario) -> Self {
        Self::Scenario(scenario)
    }
}

impl<T: Into<MimasObject>> From<Vec<T>> for MimasObject {
    fn from(items: Vec<T>) -> Self {
        Self::Sequence(items.into_iter().map(Into::into).collect())
    }
}

fn check<T: Validate>(kind: &str, record: &T) -> Result<(), CoreError> {
    record
        .validate()
        .map_err(|errors| CoreError::Validation(format!("invalid {kind}: {errors}")))
}

/// Validate a record, or every record in a sequence.
pub fn validate(object: &MimasObject) -> Result<(), CoreError> {
    let kind = object.kind();
    match object {
        MimasObject::Scenario(scenario) => check(kind, scenario),
        MimasObject::RecipeInvocation(invocation) => check(kind, invocation),
        MimasObject::IspybJobInvocation(invocation) => check(kind, invocation),
        MimasObject::Parameter(parameter) => check(kind, parameter),
        MimasObject::TriggerVariable(variable) => check(kind, variable),
        MimasObject::Sweep(sweep) => check(kind, sweep),
        MimasObject::UnitCell(cell) => check(kind, cell),
        MimasObject::SpaceGroup(spacegroup) => check(kind, spacegroup),
        MimasObject::AnomalousScatterer(scatterer) => check(kind, scatterer),
        MimasObject::Sequence(items) => items.iter().try_for_each(validate),
    }
}

/// Validate a single invocation.
pub fn validate_invocation(invocation: &Invocation) -> Result<(), CoreError> {
    match invocation {
        Invocation::Recipe(recipe) => check("recipe_invocation", recipe),
        Invocation::IspybJob(job) => check("ispyb_job_invocation", job),
    }
}

/// Validate a scenario as received on ingress.
pub fn validate_scenario(scenario: &Scenario) -> Result<(), CoreError> {
    check("scenario", scenario)
}

/// Parse untyped input as a tagged record and validate it.
///
/// Scalars, `null`, bare arrays and untagged maps are not domain records
/// and are rejected, as are records with fields outside their domain.
pub fn validate_json(value: &Value) -> Result<MimasObject, CoreError> {
    if !value.is_object() {
        return Err(CoreError::Validation(format!(
            "{value} is not a known Mimas object"
        )));
    }
    let object = MimasObject::deserialize(value)
        .map_err(|e| CoreError::Validation(format!("{value} is not a valid Mimas object: {e}")))?;
    validate(&object)?;
    Ok(object)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{CellValue, Sweep};
    use crate::types::{DcClass, DetectorClass, Event};
    use assert_matches::assert_matches;
    use serde_json::json;

    fn full_scenario() -> Scenario {
        Scenario::new(6123722, DcClass::Rotation, Event::End, "i04")
            .with_visit("nt28218-5")
            .with_runstatus("DataCollection Successful")
            .with_spacegroup(SpaceGroup::new("P 41 21 2"))
            .with_unitcell(UnitCell::new(10, 11, 12, 90, 91.0, 92))
            .with_sweeps([Sweep::new(6123719, 1, 3600), Sweep::new(6123722, 1, 3600)])
            .with_preferred_processing("xia2/DIALS")
            .with_detector_class(DetectorClass::Eiger)
            .with_anomalous_scatterer(AnomalousScatterer::new("Se"))
    }

    fn tagged(kind: &str, data: Value) -> Value {
        json!({ "kind": kind, "data": data })
    }

    fn scenario_json() -> Value {
        serde_json::to_value(full_scenario()).unwrap()
    }

    fn with_field(field: &str, value: Value) -> Value {
        let mut data = scenario_json();
        data[field] = value;
        tagged("scenario", data)
    }

    // -- non-domain input --

    #[test]
    fn scalars_and_generic_containers_rejected() {
        for value in [
            json!(5),
            json!("string"),
            json!([98, 121, 116, 101, 115]),
            Value::Null,
            json!(true),
            json!(false),
            json!([]),
            json!({}),
        ] {
            assert_matches!(
                validate_json(&value),
                Err(CoreError::Validation(_)),
                "{value} must be rejected"
            );
        }
    }

    #[test]
    fn empty_sequence_is_vacuously_valid() {
        assert!(validate(&MimasObject::Sequence(Vec::new())).is_ok());
        assert!(validate_json(&tagged("sequence", json!([]))).is_ok());
    }

    // -- scenario --

    #[test]
    fn populated_scenario_is_valid() {
        assert!(validate(&full_scenario().into()).is_ok());
        assert_matches!(
            validate_json(&tagged("scenario", scenario_json())),
            Ok(MimasObject::Scenario(_))
        );
    }

    #[test]
    fn single_field_corruptions_fail_while_original_stays_valid() {
        let invocation = json!({
            "kind": "recipe_invocation",
            "data": { "DCID": 1, "recipe": "foo" }
        });
        let corruptions = [
            ("DCID", json!("banana")),
            ("DCID", json!(0)),
            ("event", invocation),
            ("event", json!({ "DCID": 1, "recipe": "foo" })),
            ("getsweepslistfromsamedcg", json!({ "DCID": 1, "start": 1, "end": 10 })),
            ("getsweepslistfromsamedcg", json!("banana")),
            ("getsweepslistfromsamedcg", Value::Null),
            ("getsweepslistfromsamedcg", json!([[1, 1, 10]])),
            ("unitcell", json!(false)),
            ("unitcell", json!([10, 10, 10, 90, 90, 90])),
            ("unitcell", json!({ "DCID": 1, "recipe": "foo" })),
            ("spacegroup", json!({ "symbol": "P 5" })),
            ("detectorclass", json!("ADSC")),
            ("anomalous_scatterer", json!({ "symbol": "nope" })),
        ];
        for (field, value) in corruptions {
            let mutated = with_field(field, value.clone());
            assert_matches!(
                validate_json(&mutated),
                Err(CoreError::Validation(_)),
                "{field} = {value} must be rejected"
            );
        }
        assert!(validate_json(&tagged("scenario", scenario_json())).is_ok());
    }

    #[test]
    fn unknown_fields_rejected() {
        assert!(validate_json(&with_field("colour", json!("blue"))).is_err());
    }

    // -- sub-records --

    #[test]
    fn sweep_ranges() {
        assert!(validate(&MimasObject::Sweep(Sweep::new(1, 1, 1))).is_ok());
        assert!(validate(&MimasObject::Sweep(Sweep::new(1, 0, 10))).is_err());
        assert!(validate(&MimasObject::Sweep(Sweep::new(1, 10, 9))).is_err());
        assert!(validate(&MimasObject::Sweep(Sweep::new(0, 1, 10))).is_err());
    }

    #[test]
    fn unit_cell_bounds() {
        let valid = UnitCell::new(10, 11, 12, 90, 91.0, 92);
        assert!(validate(&MimasObject::UnitCell(valid)).is_ok());

        let flat = UnitCell { c: CellValue::Integer(0), ..valid };
        assert!(validate(&MimasObject::UnitCell(flat)).is_err());

        let straight = UnitCell { gamma: CellValue::Real(180.0), ..valid };
        let err = validate(&MimasObject::UnitCell(straight)).unwrap_err();
        assert!(err.to_string().contains("gamma"));
    }

    #[test]
    fn space_group_and_scatterer() {
        assert!(validate(&MimasObject::SpaceGroup(SpaceGroup::new("P21"))).is_ok());
        assert!(validate(&MimasObject::SpaceGroup(SpaceGroup::new("P 5"))).is_err());
        assert!(validate(&MimasObject::AnomalousScatterer(AnomalousScatterer::new("se"))).is_ok());
        assert!(validate(&MimasObject::AnomalousScatterer(AnomalousScatterer::new("X"))).is_err());
    }

    #[test]
    fn empty_recipe_and_parameter_key_rejected() {
        let recipe = Invocation::from(RecipeInvocation::new(1, ""));
        assert_matches!(validate_invocation(&recipe), Err(CoreError::Validation(_)));

        let job = IspybJobInvocation::new(1, "autoprocessing-fast-dp", "automatic")
            .with_parameters([Parameter::new("", "P1")]);
        assert_matches!(
            validate_invocation(&Invocation::from(job)),
            Err(CoreError::Validation(_))
        );
    }

    // -- sequences --

    #[test]
    fn one_invalid_sibling_invalidates_sequence() {
        let items: Vec<Invocation> = vec![
            RecipeInvocation::new(1, "foo").into(),
            RecipeInvocation::new(1, "").into(),
        ];
        assert!(validate(&items.into()).is_err());

        let nested = MimasObject::Sequence(vec![
            MimasObject::Sequence(vec![MimasObject::Parameter(Parameter::new("a", "b"))]),
            MimasObject::Sweep(Sweep::new(1, 1, 5)),
        ]);
        assert!(validate(&nested).is_ok());
    }

    #[test]
    fn bare_array_inside_sequence_rejected() {
        let value = tagged("sequence", json!([[]]));
        assert!(validate_json(&value).is_err());
    }
}
