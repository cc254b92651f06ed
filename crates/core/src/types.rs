//! Enumerations shared by scenarios, predicates, and handlers.
//!
//! Every enum serializes as its `SCREAMING_SNAKE_CASE` name. `from_str`
//! is case-insensitive so that intake code can accept `"end"` and `"END"`
//! alike, while serde deserialization stays exact.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Data collection identifier as stored in ISPyB.
pub type DcId = i64;

// ---------------------------------------------------------------------------
// Event
// ---------------------------------------------------------------------------

/// Lifecycle event that triggered a scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Event {
    Start,
    End,
    StartGroup,
    EndGroup,
    Processing,
}

impl Event {
    /// Return the wire-format string for this variant.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "START",
            Self::End => "END",
            Self::StartGroup => "START_GROUP",
            Self::EndGroup => "END_GROUP",
            Self::Processing => "PROCESSING",
        }
    }

    /// Parse from a wire-format string, ignoring case.
    pub fn from_str(s: &str) -> Result<Self, CoreError> {
        match s.to_ascii_uppercase().as_str() {
            "START" => Ok(Self::Start),
            "END" => Ok(Self::End),
            "START_GROUP" => Ok(Self::StartGroup),
            "END_GROUP" => Ok(Self::EndGroup),
            "PROCESSING" => Ok(Self::Processing),
            _ => Err(CoreError::Validation(format!(
                "Invalid event: '{s}'. Must be one of: START, END, START_GROUP, END_GROUP, \
                 PROCESSING"
            ))),
        }
    }
}

impl std::fmt::Display for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// DcClass
// ---------------------------------------------------------------------------

/// Experiment type of a data collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DcClass {
    Gridscan,
    Rotation,
    Screening,
    SerialFixed,
    SerialJet,
    DiamondAnvilCell,
    Undefined,
}

impl DcClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gridscan => "GRIDSCAN",
            Self::Rotation => "ROTATION",
            Self::Screening => "SCREENING",
            Self::SerialFixed => "SERIAL_FIXED",
            Self::SerialJet => "SERIAL_JET",
            Self::DiamondAnvilCell => "DIAMOND_ANVIL_CELL",
            Self::Undefined => "UNDEFINED",
        }
    }

    pub fn from_str(s: &str) -> Result<Self, CoreError> {
        match s.to_ascii_uppercase().as_str() {
            "GRIDSCAN" => Ok(Self::Gridscan),
            "ROTATION" => Ok(Self::Rotation),
            "SCREENING" => Ok(Self::Screening),
            "SERIAL_FIXED" => Ok(Self::SerialFixed),
            "SERIAL_JET" => Ok(Self::SerialJet),
            "DIAMOND_ANVIL_CELL" => Ok(Self::DiamondAnvilCell),
            "UNDEFINED" => Ok(Self::Undefined),
            _ => Err(CoreError::Validation(format!(
                "Invalid dcclass: '{s}'. Must be one of: GRIDSCAN, ROTATION, SCREENING, \
                 SERIAL_FIXED, SERIAL_JET, DIAMOND_ANVIL_CELL, UNDEFINED"
            ))),
        }
    }

    /// Whether this is a serial crystallography collection (fixed target or jet).
    pub fn is_serial(&self) -> bool {
        matches!(self, Self::SerialFixed | Self::SerialJet)
    }
}

impl std::fmt::Display for DcClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// DetectorClass
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DetectorClass {
    Pilatus,
    Eiger,
}

impl DetectorClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pilatus => "PILATUS",
            Self::Eiger => "EIGER",
        }
    }

    pub fn from_str(s: &str) -> Result<Self, CoreError> {
        match s.to_ascii_uppercase().as_str() {
            "PILATUS" => Ok(Self::Pilatus),
            "EIGER" => Ok(Self::Eiger),
            _ => Err(CoreError::Validation(format!(
                "Invalid detectorclass: '{s}'. Must be one of: PILATUS, EIGER"
            ))),
        }
    }
}

impl std::fmt::Display for DetectorClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Target
// ---------------------------------------------------------------------------

/// Downstream processing requested by a `PROCESSING` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Target {
    Alphafold,
    BigEp,
    BigEpLauncher,
    Dimple,
    FastEp,
    Mrbump,
    Shelxt,
    Multiplex,
}

impl Target {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Alphafold => "ALPHAFOLD",
            Self::BigEp => "BIG_EP",
            Self::BigEpLauncher => "BIG_EP_LAUNCHER",
            Self::Dimple => "DIMPLE",
            Self::FastEp => "FAST_EP",
            Self::Mrbump => "MRBUMP",
            Self::Shelxt => "SHELXT",
            Self::Multiplex => "MULTIPLEX",
        }
    }

    pub fn from_str(s: &str) -> Result<Self, CoreError> {
        match s.to_ascii_uppercase().as_str() {
            "ALPHAFOLD" => Ok(Self::Alphafold),
            "BIG_EP" => Ok(Self::BigEp),
            "BIG_EP_LAUNCHER" => Ok(Self::BigEpLauncher),
            "DIMPLE" => Ok(Self::Dimple),
            "FAST_EP" => Ok(Self::FastEp),
            "MRBUMP" => Ok(Self::Mrbump),
            "SHELXT" => Ok(Self::Shelxt),
            "MULTIPLEX" => Ok(Self::Multiplex),
            _ => Err(CoreError::Validation(format!(
                "Invalid target: '{s}'. Must be one of: ALPHAFOLD, BIG_EP, BIG_EP_LAUNCHER, \
                 DIMPLE, FAST_EP, MRBUMP, SHELXT, MULTIPLEX"
            ))),
        }
    }
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
