//! Intake of Mimas requests.
//!
//! A request is the parameter map of a recipe step, as produced by the
//! data-collection hooks upstream. [`ScenarioRequest::into_scenario`] turns it
//! into a validated [`Scenario`]. A request without a usable DCID or event is
//! rejected. Optional hints that fail validation (unit cell, space group,
//! anomalous scatterer, target) are dropped with a warning so that the rest
//! of the collection is still processed.

use serde::Deserialize;
use serde_json::Value;

use mimas_core::records::{
    AnomalousScatterer, CellValue, ProcessingInputs, SpaceGroup, Sweep, UnitCell,
};
use mimas_core::types::{DcClass, DcId, DetectorClass, Event, Target};
use mimas_core::validation::{validate, validate_scenario, MimasObject};
use mimas_core::{CoreError, Scenario};

#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    #[error("Invalid Mimas request rejected (DCID = {0})")]
    InvalidDcid(String),

    #[error("Invalid Mimas request rejected (Event = {0})")]
    InvalidEvent(String),

    #[error("Malformed Mimas request: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Invalid Mimas request rejected: {0}")]
    Invalid(#[from] CoreError),
}

/// Boolean map describing the collection class, as sent by older hooks.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LegacyDcClass {
    serial_fixed: bool,
    serial_jet: bool,
    grid: bool,
    screen: bool,
    diamond_anvil_cell: bool,
    rotation: bool,
}

impl LegacyDcClass {
    /// First set flag wins, in this order.
    fn dcclass(&self) -> DcClass {
        if self.serial_fixed {
            DcClass::SerialFixed
        } else if self.serial_jet {
            DcClass::SerialJet
        } else if self.grid {
            DcClass::Gridscan
        } else if self.screen {
            DcClass::Screening
        } else if self.diamond_anvil_cell {
            DcClass::DiamondAnvilCell
        } else if self.rotation {
            DcClass::Rotation
        } else {
            DcClass::Undefined
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct DiffractionPlanInfo {
    #[serde(default, rename = "anomalousScatterer")]
    pub anomalous_scatterer: Option<String>,
}

/// Recipe-step parameters of a Mimas request. Unrelated keys are ignored.
#[derive(Debug, Default, Deserialize)]
pub struct ScenarioRequest {
    #[serde(default)]
    pub dcid: Option<Value>,
    #[serde(default)]
    pub event: Option<Value>,
    /// A class name, or the legacy boolean map.
    #[serde(default)]
    pub dc_class: Option<Value>,
    #[serde(default)]
    pub beamline: Option<String>,
    #[serde(default)]
    pub visit: Option<String>,
    #[serde(default)]
    pub run_status: Option<String>,
    #[serde(default)]
    pub unit_cell: Option<Value>,
    #[serde(default)]
    pub space_group: Option<String>,
    /// `(DCID, start, end)` triples for the data-collection group.
    #[serde(default)]
    pub sweep_list: Option<Vec<(DcId, i64, i64)>>,
    #[serde(default)]
    pub preferred_processing: Option<String>,
    #[serde(default)]
    pub detectorclass: Option<String>,
    #[serde(default)]
    pub diffraction_plan_info: Option<DiffractionPlanInfo>,
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default)]
    pub processing: Option<ProcessingInputs>,
}

impl ScenarioRequest {
    pub fn from_json(line: &str) -> Result<Self, RequestError> {
        Ok(serde_json::from_str(line)?)
    }

    /// Build and validate the scenario this request describes.
    pub fn into_scenario(self) -> Result<Scenario, RequestError> {
        let dcid = parse_dcid(self.dcid.as_ref())?;
        let event = parse_event(self.event.as_ref())?;
        let dcclass = parse_dcclass(dcid, self.dc_class.as_ref());

        let mut scenario = Scenario::new(dcid, dcclass, event, self.beamline.unwrap_or_default())
            .with_visit(self.visit.unwrap_or_default())
            .with_runstatus(self.run_status.unwrap_or_default())
            .with_sweeps(
                self.sweep_list
                    .unwrap_or_default()
                    .into_iter()
                    .map(|(dcid, start, end)| Sweep::new(dcid, start, end)),
            );

        scenario.unitcell = self.unit_cell.as_ref().and_then(|cell| parse_unit_cell(dcid, cell));
        scenario.spacegroup = self
            .space_group
            .as_deref()
            .and_then(|symbol| parse_space_group(dcid, symbol));
        scenario.anomalous_scatterer = self
            .diffraction_plan_info
            .and_then(|info| info.anomalous_scatterer)
            .and_then(|symbol| parse_anomalous_scatterer(dcid, &symbol));
        scenario.preferred_processing = self.preferred_processing;
        scenario.detectorclass = self
            .detectorclass
            .as_deref()
            .and_then(|name| DetectorClass::from_str(name).ok());
        scenario.target = self.target.as_deref().and_then(|name| parse_target(dcid, name));
        scenario.processing = self.processing;

        validate_scenario(&scenario)?;
        Ok(scenario)
    }
}

fn parse_dcid(value: Option<&Value>) -> Result<DcId, RequestError> {
    let parsed = match value {
        Some(Value::String(s)) if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) => {
            s.parse::<DcId>().ok()
        }
        Some(Value::Number(n)) => n.as_i64(),
        _ => None,
    };
    match parsed {
        Some(dcid) if dcid > 0 => Ok(dcid),
        _ => Err(RequestError::InvalidDcid(
            value.map_or_else(|| "None".to_string(), Value::to_string),
        )),
    }
}

fn parse_event(value: Option<&Value>) -> Result<Event, RequestError> {
    match value {
        Some(Value::String(name)) => {
            Event::from_str(name).map_err(|_| RequestError::InvalidEvent(name.clone()))
        }
        other => Err(RequestError::InvalidEvent(
            other.map_or_else(|| "None".to_string(), Value::to_string),
        )),
    }
}

fn parse_dcclass(dcid: DcId, value: Option<&Value>) -> DcClass {
    match value {
        Some(Value::String(name)) => DcClass::from_str(name).unwrap_or_else(|_| {
            tracing::warn!(dcid, dc_class = %name, "Invalid data collection class");
            DcClass::Undefined
        }),
        Some(legacy @ Value::Object(_)) => LegacyDcClass::deserialize(legacy)
            .map(|flags| flags.dcclass())
            .unwrap_or_else(|e| {
                tracing::warn!(dcid, error = %e, "Invalid legacy data collection class");
                DcClass::Undefined
            }),
        other => {
            tracing::warn!(dcid, dc_class = ?other, "Invalid data collection class");
            DcClass::Undefined
        }
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Array(items) => items.is_empty(),
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

fn parse_unit_cell(dcid: DcId, value: &Value) -> Option<UnitCell> {
    if is_blank(value) {
        return None;
    }
    let cell = serde_json::from_value::<[CellValue; 6]>(value.clone())
        .map_err(|e| CoreError::Validation(format!("unit cell needs six numbers: {e}")))
        .map(|[a, b, c, alpha, beta, gamma]| UnitCell::new(a, b, c, alpha, beta, gamma))
        .and_then(|cell| validate(&MimasObject::UnitCell(cell)).map(|()| cell));
    cell.inspect_err(|e| tracing::warn!(dcid, unit_cell = %value, error = %e, "Invalid unit cell"))
        .ok()
}

fn parse_space_group(dcid: DcId, symbol: &str) -> Option<SpaceGroup> {
    if symbol.is_empty() {
        return None;
    }
    let spacegroup = SpaceGroup::new(symbol);
    tracing::debug!(dcid, spacegroup = %symbol, "Space group from request");
    validate(&MimasObject::SpaceGroup(spacegroup.clone()))
        .map(|()| spacegroup)
        .inspect_err(|e| tracing::warn!(dcid, spacegroup = %symbol, error = %e, "Invalid space group"))
        .ok()
}

fn parse_anomalous_scatterer(dcid: DcId, symbol: &str) -> Option<AnomalousScatterer> {
    if symbol.is_empty() {
        return None;
    }
    let scatterer = AnomalousScatterer::new(symbol);
    tracing::debug!(dcid, anomalous_scatterer = %symbol, "Anomalous scatterer from request");
    validate(&MimasObject::AnomalousScatterer(scatterer.clone()))
        .map(|()| scatterer)
        .inspect_err(|e| {
            tracing::warn!(dcid, anomalous_scatterer = %symbol, error = %e, "Invalid anomalous scatterer")
        })
        .ok()
}

fn parse_target(dcid: DcId, name: &str) -> Option<Target> {
    Target::from_str(name)
        .inspect_err(|e| tracing::warn!(dcid, target = %name, error = %e, "Invalid processing target"))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    fn request(value: Value) -> Result<Scenario, RequestError> {
        ScenarioRequest::deserialize(value).unwrap().into_scenario()
    }

    #[test]
    fn dcid_must_be_numeric() {
        for dcid in [json!("banana"), json!(""), json!("-5"), json!(null), json!(0)] {
            assert_matches!(
                request(json!({ "dcid": dcid, "event": "start" })),
                Err(RequestError::InvalidDcid(_))
            );
        }
        assert_eq!(
            request(json!({ "dcid": "123", "event": "start" })).unwrap().dcid,
            123
        );
    }

    #[test]
    fn event_must_be_known() {
        assert_matches!(
            request(json!({ "dcid": "1", "event": "middle" })),
            Err(RequestError::InvalidEvent(e)) if e == "middle"
        );
        assert_matches!(
            request(json!({ "dcid": "1", "event": 5 })),
            Err(RequestError::InvalidEvent(_))
        );
        assert_eq!(
            request(json!({ "dcid": "1", "event": "end_group" })).unwrap().event,
            Event::EndGroup
        );
    }

    #[test]
    fn legacy_dc_class_flags_take_priority_order() {
        let scenario = request(json!({
            "dcid": "1",
            "event": "end",
            "dc_class": { "grid": true, "rotation": true, "serial_fixed": false },
        }))
        .unwrap();
        assert_eq!(scenario.dcclass, DcClass::Gridscan);

        let scenario = request(json!({
            "dcid": "1",
            "event": "end",
            "dc_class": { "grid": false, "screen": false, "rotation": false },
        }))
        .unwrap();
        assert_eq!(scenario.dcclass, DcClass::Undefined);
    }

    #[test]
    fn unknown_dc_class_falls_back_to_undefined() {
        let scenario =
            request(json!({ "dcid": "1", "event": "end", "dc_class": "helical" })).unwrap();
        assert_eq!(scenario.dcclass, DcClass::Undefined);
    }

    #[test]
    fn invalid_hints_are_dropped() {
        let scenario = request(json!({
            "dcid": "1",
            "event": "end",
            "dc_class": "rotation",
            "unit_cell": [10, 11, 12, 90, 190, 90],
            "space_group": "Q 1",
            "diffraction_plan_info": { "anomalousScatterer": "Xx" },
            "target": "arcimboldo",
        }))
        .unwrap();
        assert_eq!(scenario.unitcell, None);
        assert_eq!(scenario.spacegroup, None);
        assert_eq!(scenario.anomalous_scatterer, None);
        assert_eq!(scenario.target, None);
    }

    #[test]
    fn wrong_arity_unit_cell_is_dropped() {
        let scenario =
            request(json!({ "dcid": "1", "event": "end", "unit_cell": [10, 11, 12] })).unwrap();
        assert_eq!(scenario.unitcell, None);
    }
}
