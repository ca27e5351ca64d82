use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Chemistry {
    LinkerLigation,
    RestrictionLigation,
    Combinatorial,
}

impl fmt::Display for Chemistry {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Chemistry::LinkerLigation => "linker-ligation",
            Chemistry::RestrictionLigation => "restriction-ligation",
            Chemistry::Combinatorial => "combinatorial",
        };
        write!(f, "{name}")
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputMode {
    Single,
    Triplicate,
}

impl fmt::Display for OutputMode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            OutputMode::Single => write!(f, "single"),
            OutputMode::Triplicate => write!(f, "triplicate"),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LabwareItem {
    pub name: String,
    pub definition: String,
}

impl LabwareItem {
    fn new(name: &str, definition: &str) -> Self {
        Self {
            name: name.to_string(),
            definition: definition.to_string(),
        }
    }
}

// All knobs a planning pass depends on, passed in explicitly. A pass never
// reads ambient state, so two passes over the same input produce the same
// plan.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    // Nominal DNA mass drawn into each reaction, and the concentration
    // assumed for parts whose row does not carry one.
    pub part_mass: f64,
    pub default_concentration: f64,
    pub output_mode: OutputMode,
    pub labware: Vec<LabwareItem>,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            part_mass: 500.0,
            default_concentration: 500.0,
            output_mode: OutputMode::Single,
            labware: vec![
                LabwareItem::new("p10_mount", "right"),
                LabwareItem::new("p300_mount", "left"),
                LabwareItem::new("p10_type", "p10_single"),
                LabwareItem::new("p300_type", "p300_single"),
                LabwareItem::new("well_plate", "biorad_96_wellplate_200ul_pcr"),
                LabwareItem::new("tube_rack", "opentrons_24_tuberack_nest_1.5ml_snapcap"),
                LabwareItem::new("trough", "usascientific_12_reservoir_22ml"),
            ],
        }
    }
}

impl PlannerConfig {
    // Transfer volume for one reaction's worth of a part, rounded up so a
    // low-concentration part never under-fills its reaction.
    pub fn part_volume(&self, concentration: Option<f64>) -> f64 {
        match concentration {
            Some(c) => (self.part_mass / c).ceil(),
            None => 1.0,
        }
    }
}
