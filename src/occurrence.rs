// Role-occurrence counting.
//
// Before any reaction can be derived, every part's usage is counted per
// structural role, together with the construct indices behind each count.
// Roles are counted independently: the same part may act upstream in one
// construct and downstream in another. The restriction chemistry's digest
// derivation later gives the plasmid role precedence, but that is a
// reaction-level rule, not a counting rule.

use crate::error::PlanError;
use crate::tables::{Combination, InsertConstruct, LinkerConstruct, Part, find_part};
use serde::{Deserialize, Serialize};

pub const INSERT_ROLES: [&str; 3] = ["upstream", "downstream", "plasmid"];
pub const CHAIN_ROLES: [&str; 3] = ["prefix", "suffix", "insert"];

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Occurrences {
    // One count per chemistry role, and the contributing construct indices
    // per role, in construct order.
    pub counts: Vec<usize>,
    pub constructs_in: Vec<Vec<usize>>,
}

impl Occurrences {
    fn with_roles(n: usize) -> Self {
        Self {
            counts: vec![0; n],
            constructs_in: vec![vec![]; n],
        }
    }

    fn record(&mut self, role: usize, construct: usize) {
        self.counts[role] += 1;
        self.constructs_in[role].push(construct);
    }

    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }
}

pub fn count_insert_roles(constructs: &[InsertConstruct], part: &str) -> Occurrences {
    let mut occ = Occurrences::with_roles(INSERT_ROLES.len());
    for (index, construct) in constructs.iter().enumerate() {
        if construct.upstream == part {
            occ.record(0, index);
        }
        if construct.downstream == part {
            occ.record(1, index);
        }
        if construct.plasmid == part {
            occ.record(2, index);
        }
    }
    occ
}

// Chain roles count catalogue entries, so linker halves are matched against
// their physical `-P`/`-S` rows while inserts match the part name directly.
pub fn count_chain_roles(constructs: &[LinkerConstruct], entry: &str) -> Occurrences {
    let mut occ = Occurrences::with_roles(CHAIN_ROLES.len());
    for (index, construct) in constructs.iter().enumerate() {
        for clip in construct.clips() {
            if format!("{}-P", clip.prefix) == entry {
                occ.record(0, index);
            }
            if format!("{}-S", clip.suffix) == entry {
                occ.record(1, index);
            }
            if clip.part == entry {
                occ.record(2, index);
            }
        }
    }
    occ
}

pub fn count_membership(combinations: &[Combination], part: &str) -> Occurrences {
    let mut occ = Occurrences::with_roles(1);
    for (index, combination) in combinations.iter().enumerate() {
        for member in &combination.parts {
            if member == part {
                occ.record(0, index);
            }
        }
    }
    occ
}

fn unresolved(construct: &str, reference: &str) -> PlanError {
    PlanError::Schema(format!(
        "construct '{construct}' references '{reference}', which is not in the part catalogue"
    ))
}

pub fn check_insert_references(
    constructs: &[InsertConstruct],
    parts: &[Part],
) -> Result<(), PlanError> {
    for construct in constructs {
        for reference in [&construct.upstream, &construct.downstream, &construct.plasmid] {
            if find_part(parts, reference).is_none() {
                return Err(unresolved(&construct.name, reference));
            }
        }
    }
    Ok(())
}

// Linker references resolve against the two half wells of each linker.
pub fn check_chain_references(
    constructs: &[LinkerConstruct],
    parts: &[Part],
) -> Result<(), PlanError> {
    for construct in constructs {
        for clip in construct.clips() {
            for entry in [
                format!("{}-P", clip.prefix),
                format!("{}-S", clip.suffix),
                clip.part.clone(),
            ] {
                if find_part(parts, &entry).is_none() {
                    return Err(unresolved(&construct.name, &entry));
                }
            }
        }
    }
    Ok(())
}

pub fn check_membership_references(
    combinations: &[Combination],
    parts: &[Part],
) -> Result<(), PlanError> {
    for combination in combinations {
        for member in &combination.parts {
            if find_part(parts, member).is_none() {
                return Err(unresolved(&combination.name, member));
            }
        }
    }
    Ok(())
}
