// Transfer maps, the planner's output contract.
//
// A map names one phase of liquid handling. Within a map each source well
// appears once, with its destinations in the order the transfers were
// planned, so the downstream protocol emitter can replay the plan verbatim
// and two passes over the same input serialize identically.

use crate::config::Chemistry;
use crate::reaction::Reaction;
use crate::reagent::{MasterMix, ReagentWell};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transfer {
    pub dest: String,
    pub vol: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TransferEntry {
    pub source: String,
    pub transfers: Vec<Transfer>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TransferMap {
    pub name: String,
    pub entries: Vec<TransferEntry>,
}

impl TransferMap {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            entries: vec![],
        }
    }

    pub fn push(&mut self, source: &str, dest: &str, vol: f64) {
        match self.entries.iter_mut().find(|e| e.source == source) {
            Some(entry) => entry.transfers.push(Transfer {
                dest: dest.to_string(),
                vol,
            }),
            None => self.entries.push(TransferEntry {
                source: source.to_string(),
                transfers: vec![Transfer {
                    dest: dest.to_string(),
                    vol,
                }],
            }),
        }
    }

    pub fn transfers_from(&self, source: &str) -> Option<&[Transfer]> {
        self.entries
            .iter()
            .find(|e| e.source == source)
            .map(|e| e.transfers.as_slice())
    }

    pub fn dispensed_from(&self, source: &str) -> f64 {
        self.transfers_from(source)
            .map(|transfers| transfers.iter().map(|t| t.vol).sum())
            .unwrap_or(0.0)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// Part catalogue row enriched with the usage the planner derived from the
// construct list.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PartUsage {
    pub name: String,
    pub well: String,
    pub plate: String,
    pub concentration: f64,
    pub vol_per_reaction: f64,
    pub occurrences: Vec<usize>,
    pub reactions: usize,
    // Volume the source well must hold: all reactions plus a two-reaction
    // dead margin.
    pub total_vol: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConstructSummary {
    pub name: String,
    pub well: String,
    pub parts: Vec<String>,
}

// Per-role breakdown of one component of the restriction digest mixes.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MixComponent {
    pub reagent: String,
    pub upstream_vol: f64,
    pub downstream_vol: f64,
    pub plasmid_vol: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TransferPlan {
    pub chemistry: Chemistry,
    pub parts: Vec<PartUsage>,
    pub constructs: Vec<ConstructSummary>,
    pub reactions: Vec<Reaction>,
    pub reagents: Vec<ReagentWell>,
    pub master_mixes: Vec<MasterMix>,
    pub mix_recipes: Vec<MixComponent>,
    pub part_to_reaction: TransferMap,
    pub reagent_to_reaction: TransferMap,
    pub reaction_to_construct: TransferMap,
    pub reagent_to_construct: TransferMap,
    // Present only when reactions share the construct plate and leftover
    // reaction material is parked on a storage plate.
    pub reaction_to_storage: Option<TransferMap>,
}

impl TransferPlan {
    pub fn maps(&self) -> Vec<&TransferMap> {
        let mut maps = vec![
            &self.part_to_reaction,
            &self.reagent_to_reaction,
            &self.reaction_to_construct,
            &self.reagent_to_construct,
        ];
        if let Some(storage) = &self.reaction_to_storage {
            maps.push(storage);
        }
        maps
    }

    pub fn reagent_named(&self, name: &str) -> Option<&ReagentWell> {
        self.reagents.iter().find(|r| r.name == name)
    }
}
