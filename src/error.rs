use std::error::Error;
use std::fmt;

#[derive(Debug)]
pub enum PlanError {
    WellExhaustion {
        plate: String,
    },
    InvalidAssembly {
        construct: String,
        parts: usize,
        vol_per_assembly: f64,
    },
    CapacityExceeded {
        requested: usize,
        limit: usize,
        mode: String,
    },
    Schema(String),
    Io(std::io::Error),
    Csv(csv::Error),
    Json(serde_json::Error),
}

impl Error for PlanError {}

impl fmt::Display for PlanError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PlanError::WellExhaustion { plate } => {
                write!(f, "No empty wells left on plate '{plate}'")
            }
            PlanError::InvalidAssembly {
                construct,
                parts,
                vol_per_assembly,
            } => {
                write!(
                    f,
                    "Construct '{construct}' with {parts} parts leaves {vol_per_assembly} volume units of master mix per assembly, too little for a one-pot reaction"
                )
            }
            PlanError::CapacityExceeded {
                requested,
                limit,
                mode,
            } => {
                write!(
                    f,
                    "Too many constructs ({requested}) requested, maximum for {mode} output is {limit}"
                )
            }
            PlanError::Schema(msg) => write!(f, "Input row mismatch: {msg}"),
            PlanError::Io(err) => write!(f, "I/O error: {err}"),
            PlanError::Csv(err) => write!(f, "CSV error: {err}"),
            PlanError::Json(err) => write!(f, "JSON error: {err}"),
        }
    }
}

impl From<std::io::Error> for PlanError {
    fn from(err: std::io::Error) -> Self {
        PlanError::Io(err)
    }
}

impl From<csv::Error> for PlanError {
    fn from(err: csv::Error) -> Self {
        PlanError::Csv(err)
    }
}

impl From<serde_json::Error> for PlanError {
    fn from(err: serde_json::Error) -> Self {
        PlanError::Json(err)
    }
}
