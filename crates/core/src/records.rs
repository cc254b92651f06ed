//! Domain records: the scenario fed into dispatch, the invocations handlers
//! emit, and the sub-records both are built from.
//!
//! Records are plain immutable values. Derived scenarios are produced with
//! the `with_*` builders, which consume and return `Self`.

use std::borrow::Cow;
use std::fmt;

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::types::{DcClass, DcId, DetectorClass, Event, Target};
use crate::{element, spacegroup, strict};

/// Beamline identifier of VMXi, whose defaults differ from the other MX lines.
pub const VMXI_BEAMLINE: &str = "i02-2";

// ---------------------------------------------------------------------------
// Sub-records
// ---------------------------------------------------------------------------

/// A `key=value` processing parameter attached to an ISPyB job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct Parameter {
    #[validate(length(min = 1, message = "parameter key must not be empty"))]
    pub key: String,
    pub value: String,
}

impl Parameter {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// A variable substituted into the recipe when an ISPyB job is triggered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct TriggerVariable {
    #[validate(length(min = 1, message = "trigger variable key must not be empty"))]
    pub key: String,
    pub value: String,
}

impl TriggerVariable {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// An image range of one data collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
#[validate(schema(function = "validate_sweep_order"))]
pub struct Sweep {
    #[serde(rename = "DCID")]
    #[validate(range(min = 1, message = "sweep DCID must be positive"))]
    pub dcid: DcId,
    #[validate(range(min = 1, message = "sweep start image must be positive"))]
    pub start: i64,
    pub end: i64,
}

impl Sweep {
    pub fn new(dcid: DcId, start: i64, end: i64) -> Self {
        Self { dcid, start, end }
    }
}

fn validate_sweep_order(sweep: &Sweep) -> Result<(), ValidationError> {
    if sweep.end < sweep.start {
        return Err(ValidationError::new("sweep_order").with_message(Cow::Owned(format!(
            "sweep end image {} precedes start image {}",
            sweep.end, sweep.start
        ))));
    }
    Ok(())
}

/// A unit-cell parameter that remembers whether it was given as an integer.
///
/// Keeping the distinction lets `90` and `90.0` project back out exactly as
/// they came in.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Integer(i64),
    Real(f64),
}

impl CellValue {
    pub fn as_f64(&self) -> f64 {
        match *self {
            Self::Integer(value) => value as f64,
            Self::Real(value) => value,
        }
    }
}

impl From<i64> for CellValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<i32> for CellValue {
    fn from(value: i32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        Self::Real(value)
    }
}

impl fmt::Display for CellValue {
    /// Reals always carry a fractional part (`90.0`), integers never do.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::Integer(value) => write!(f, "{value}"),
            Self::Real(value) if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e16 => {
                write!(f, "{value:.1}")
            }
            Self::Real(value) => write!(f, "{value}"),
        }
    }
}

fn positive_length(value: &CellValue) -> Result<(), ValidationError> {
    let length = value.as_f64();
    if length.is_nan() || length <= 0.0 {
        return Err(ValidationError::new("cell_length")
            .with_message(Cow::Owned(format!("cell length {value} must be positive"))));
    }
    Ok(())
}

fn open_angle(value: &CellValue) -> Result<(), ValidationError> {
    let angle = value.as_f64();
    if !(angle > 0.0 && angle < 180.0) {
        return Err(ValidationError::new("cell_angle").with_message(Cow::Owned(format!(
            "cell angle {value} must lie strictly between 0 and 180 degrees"
        ))));
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct UnitCell {
    #[validate(custom(function = "positive_length"))]
    pub a: CellValue,
    #[validate(custom(function = "positive_length"))]
    pub b: CellValue,
    #[validate(custom(function = "positive_length"))]
    pub c: CellValue,
    #[validate(custom(function = "open_angle"))]
    pub alpha: CellValue,
    #[validate(custom(function = "open_angle"))]
    pub beta: CellValue,
    #[validate(custom(function = "open_angle"))]
    pub gamma: CellValue,
}

impl UnitCell {
    pub fn new(
        a: impl Into<CellValue>,
        b: impl Into<CellValue>,
        c: impl Into<CellValue>,
        alpha: impl Into<CellValue>,
        beta: impl Into<CellValue>,
        gamma: impl Into<CellValue>,
    ) -> Self {
        Self {
            a: a.into(),
            b: b.into(),
            c: c.into(),
            alpha: alpha.into(),
            beta: beta.into(),
            gamma: gamma.into(),
        }
    }

    /// The six parameters in `a, b, c, alpha, beta, gamma` order.
    pub fn values(&self) -> [CellValue; 6] {
        [self.a, self.b, self.c, self.alpha, self.beta, self.gamma]
    }
}

impl fmt::Display for UnitCell {
    /// Comma-separated form used for `unit_cell` job parameters.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.values().iter().map(ToString::to_string).collect();
        f.write_str(&parts.join(","))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct SpaceGroup {
    #[validate(custom(function = "known_space_group"))]
    pub symbol: String,
}

fn known_space_group(symbol: &str) -> Result<(), ValidationError> {
    match spacegroup::find(symbol) {
        Some(_) => Ok(()),
        None => Err(ValidationError::new("space_group")
            .with_message(Cow::Owned(format!("'{symbol}' is not a known space group")))),
    }
}

impl SpaceGroup {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
        }
    }

    pub fn info(&self) -> Option<spacegroup::SpaceGroupInfo> {
        spacegroup::find(&self.symbol)
    }

    /// Full Hermann-Mauguin symbol without spaces (`P 21` -> `P1211`).
    ///
    /// Unresolvable symbols fall back to the input with whitespace removed.
    pub fn canonical(&self) -> String {
        match self.info() {
            Some(info) => info.compact(),
            None => self.symbol.split_whitespace().collect(),
        }
    }
}

/// Element expected to give an anomalous signal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AnomalousScatterer {
    #[validate(custom(function = "known_element"))]
    pub symbol: String,
}

fn known_element(symbol: &str) -> Result<(), ValidationError> {
    match element::canonical_symbol(symbol) {
        Some(_) => Ok(()),
        None => Err(ValidationError::new("element")
            .with_message(Cow::Owned(format!("'{symbol}' is not a valid element")))),
    }
}

impl AnomalousScatterer {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
        }
    }

    /// Capitalized element symbol (`se` -> `Se`).
    pub fn element(&self) -> String {
        element::canonical_symbol(&self.symbol)
            .map(str::to_string)
            .unwrap_or_else(|| self.symbol.trim().to_string())
    }
}

/// A search model for molecular replacement: a local file or a PDB code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PdbModel {
    #[serde(default)]
    pub filepath: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
    /// Origin of the model, e.g. `AlphaFold`.
    #[serde(default)]
    pub source: Option<String>,
}

impl PdbModel {
    pub fn from_file(path: impl Into<String>) -> Self {
        Self {
            filepath: Some(path.into()),
            code: None,
            source: None,
        }
    }

    pub fn from_code(code: impl Into<String>) -> Self {
        Self {
            filepath: None,
            code: Some(code.into()),
            source: None,
        }
    }

    /// The file path if present, else the PDB code.
    pub fn reference(&self) -> Option<&str> {
        self.filepath.as_deref().or(self.code.as_deref())
    }
}

/// Upstream processing results carried by a `PROCESSING` event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct ProcessingInputs {
    #[serde(default)]
    pub mtz: Option<String>,
    #[serde(default)]
    pub scaled_unmerged_mtz: Option<String>,
    /// `autoProcScalingId` the results belong to.
    #[serde(default)]
    #[validate(range(min = 1, message = "scaling_id must be positive"))]
    pub scaling_id: Option<i64>,
    /// `autoProcProgramId` of the upstream job.
    #[serde(default)]
    #[validate(range(min = 1, message = "program_id must be positive"))]
    pub program_id: Option<i64>,
    #[serde(default)]
    pub comment: Option<String>,
    /// Display name of the upstream pipeline, e.g. `xia2 dials`.
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub upstream_source: Option<String>,
    #[serde(default, deserialize_with = "strict::records")]
    pub pdb: Vec<PdbModel>,
}

// ---------------------------------------------------------------------------
// Scenario
// ---------------------------------------------------------------------------

/// Immutable description of one data-collection lifecycle event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct Scenario {
    #[serde(rename = "DCID")]
    #[validate(range(min = 1, message = "DCID must be positive"))]
    pub dcid: DcId,
    pub dcclass: DcClass,
    pub event: Event,
    pub beamline: String,
    pub visit: String,
    pub runstatus: String,
    #[serde(
        default,
        deserialize_with = "strict::optional_record",
        skip_serializing_if = "Option::is_none"
    )]
    #[validate(nested)]
    pub spacegroup: Option<SpaceGroup>,
    #[serde(
        default,
        deserialize_with = "strict::optional_record",
        skip_serializing_if = "Option::is_none"
    )]
    #[validate(nested)]
    pub unitcell: Option<UnitCell>,
    /// Sweeps of every data collection in the same group, this one included.
    #[serde(default, deserialize_with = "strict::records")]
    #[validate(nested)]
    pub getsweepslistfromsamedcg: Vec<Sweep>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_processing: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detectorclass: Option<DetectorClass>,
    #[serde(
        default,
        deserialize_with = "strict::optional_record",
        skip_serializing_if = "Option::is_none"
    )]
    #[validate(nested)]
    pub anomalous_scatterer: Option<AnomalousScatterer>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<Target>,
    #[serde(
        default,
        deserialize_with = "strict::optional_record",
        skip_serializing_if = "Option::is_none"
    )]
    #[validate(nested)]
    pub processing: Option<ProcessingInputs>,
}

impl Scenario {
    pub fn new(dcid: DcId, dcclass: DcClass, event: Event, beamline: impl Into<String>) -> Self {
        Self {
            dcid,
            dcclass,
            event,
            beamline: beamline.into(),
            visit: String::new(),
            runstatus: String::new(),
            spacegroup: None,
            unitcell: None,
            getsweepslistfromsamedcg: Vec::new(),
            preferred_processing: None,
            detectorclass: None,
            anomalous_scatterer: None,
            target: None,
            processing: None,
        }
    }

    pub fn with_event(mut self, event: Event) -> Self {
        self.event = event;
        self
    }

    pub fn with_dcclass(mut self, dcclass: DcClass) -> Self {
        self.dcclass = dcclass;
        self
    }

    pub fn with_visit(mut self, visit: impl Into<String>) -> Self {
        self.visit = visit.into();
        self
    }

    pub fn with_runstatus(mut self, runstatus: impl Into<String>) -> Self {
        self.runstatus = runstatus.into();
        self
    }

    pub fn with_spacegroup(mut self, spacegroup: SpaceGroup) -> Self {
        self.spacegroup = Some(spacegroup);
        self
    }

    pub fn with_unitcell(mut self, unitcell: UnitCell) -> Self {
        self.unitcell = Some(unitcell);
        self
    }

    pub fn with_sweeps(mut self, sweeps: impl IntoIterator<Item = Sweep>) -> Self {
        self.getsweepslistfromsamedcg = sweeps.into_iter().collect();
        self
    }

    pub fn with_preferred_processing(mut self, pipeline: impl Into<String>) -> Self {
        self.preferred_processing = Some(pipeline.into());
        self
    }

    pub fn with_detector_class(mut self, detectorclass: DetectorClass) -> Self {
        self.detectorclass = Some(detectorclass);
        self
    }

    pub fn with_anomalous_scatterer(mut self, scatterer: AnomalousScatterer) -> Self {
        self.anomalous_scatterer = Some(scatterer);
        self
    }

    pub fn with_target(mut self, target: Target) -> Self {
        self.target = Some(target);
        self
    }

    pub fn with_processing(mut self, processing: ProcessingInputs) -> Self {
        self.processing = Some(processing);
        self
    }

    pub fn is_gridscan(&self) -> bool {
        self.dcclass == DcClass::Gridscan
    }

    pub fn is_serial(&self) -> bool {
        self.dcclass.is_serial()
    }

    /// Whether this rotation belongs to a group with other data collections.
    pub fn has_related_data_collections(&self) -> bool {
        self.dcclass == DcClass::Rotation
            && self
                .getsweepslistfromsamedcg
                .iter()
                .any(|sweep| sweep.dcid != self.dcid)
    }

    /// Recipe families that apply to this collection by default.
    ///
    /// Informational summary of what the facility rules cover for the
    /// collection class; dispatch itself does not consult it.
    pub fn default_recipes(&self) -> Vec<&'static str> {
        let vmxi = self.beamline == VMXI_BEAMLINE;
        let mut recipes = match self.dcclass {
            DcClass::Gridscan if vmxi => vec!["archive-nexus", "vmxi-spot-counts-per-image"],
            DcClass::Gridscan => vec!["per-image-analysis-gridscan"],
            DcClass::Screening => vec![
                "per-image-analysis-rotation",
                "strategy-edna",
                "strategy-mosflm",
            ],
            DcClass::Rotation if vmxi => vec![
                "archive-nexus",
                "processing-autoproc",
                "processing-fast-dp",
                "processing-xia2-3dii",
                "processing-xia2-dials",
                "vmxi-per-image-analysis",
            ],
            DcClass::Rotation => vec![
                "per-image-analysis-rotation",
                "processing-autoproc",
                "processing-fast-dp",
                "processing-rlv",
                "processing-xia2-3dii",
                "processing-xia2-dials",
            ],
            _ => Vec::new(),
        };
        if self.has_related_data_collections() {
            recipes.push("processing-multi-xia2-dials");
            recipes.push("processing-multi-xia2-3dii");
        }
        recipes
    }
}

// ---------------------------------------------------------------------------
// Invocations
// ---------------------------------------------------------------------------

/// Run a recipe for a data collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct RecipeInvocation {
    #[serde(rename = "DCID")]
    #[validate(range(min = 1, message = "DCID must be positive"))]
    pub dcid: DcId,
    #[validate(length(min = 1, message = "recipe must not be empty"))]
    pub recipe: String,
}

impl RecipeInvocation {
    pub fn new(dcid: DcId, recipe: impl Into<String>) -> Self {
        Self {
            dcid,
            recipe: recipe.into(),
        }
    }
}

/// Record a processing job in ISPyB and optionally trigger it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct IspybJobInvocation {
    #[serde(rename = "DCID")]
    #[validate(range(min = 1, message = "DCID must be positive"))]
    pub dcid: DcId,
    pub autostart: bool,
    #[validate(length(min = 1, message = "recipe must not be empty"))]
    pub recipe: String,
    pub source: String,
    #[serde(default)]
    pub comment: String,
    #[serde(default)]
    pub displayname: String,
    #[serde(default, deserialize_with = "strict::records")]
    #[validate(nested)]
    pub parameters: Vec<Parameter>,
    #[serde(default, deserialize_with = "strict::records")]
    #[validate(nested)]
    pub sweeps: Vec<Sweep>,
    #[serde(default, deserialize_with = "strict::records")]
    #[validate(nested)]
    pub triggervariables: Vec<TriggerVariable>,
}

impl IspybJobInvocation {
    /// A job that is recorded but not triggered.
    pub fn new(dcid: DcId, recipe: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            dcid,
            autostart: false,
            recipe: recipe.into(),
            source: source.into(),
            comment: String::new(),
            displayname: String::new(),
            parameters: Vec::new(),
            sweeps: Vec::new(),
            triggervariables: Vec::new(),
        }
    }

    pub fn with_autostart(mut self, autostart: bool) -> Self {
        self.autostart = autostart;
        self
    }

    pub fn with_display_name(mut self, displayname: impl Into<String>) -> Self {
        self.displayname = displayname.into();
        self
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = comment.into();
        self
    }

    /// Append parameters, keeping their order.
    pub fn with_parameters(mut self, parameters: impl IntoIterator<Item = Parameter>) -> Self {
        self.parameters.extend(parameters);
        self
    }

    pub fn with_sweeps(mut self, sweeps: impl IntoIterator<Item = Sweep>) -> Self {
        self.sweeps.extend(sweeps);
        self
    }

    pub fn with_trigger_variables(
        mut self,
        variables: impl IntoIterator<Item = TriggerVariable>,
    ) -> Self {
        self.triggervariables.extend(variables);
        self
    }
}

/// Any instruction a handler can emit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invocation {
    Recipe(RecipeInvocation),
    IspybJob(IspybJobInvocation),
}

impl Invocation {
    pub fn dcid(&self) -> DcId {
        match self {
            Self::Recipe(invocation) => invocation.dcid,
            Self::IspybJob(invocation) => invocation.dcid,
        }
    }

    pub fn recipe(&self) -> &str {
        match self {
            Self::Recipe(invocation) => &invocation.recipe,
            Self::IspybJob(invocation) => &invocation.recipe,
        }
    }
}

impl From<RecipeInvocation> for Invocation {
    fn from(invocation: RecipeInvocation) -> Self {
        Self::Recipe(invocation)
    }
}

impl From<IspybJobInvocation> for Invocation {
    fn from(invocation: IspybJobInvocation) -> Self {
        Self::IspybJob(invocation)
    }
}
