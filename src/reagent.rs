// Shared-reagent batching.
//
// Every reagent well carries more than the sum of its transfers: the dead
// volume keeps the pipette from chasing the last residue. Non-water reagents
// get a margin worth two phantom consumers; water is bulk and instead splits
// across wells whenever a single well would exceed its safe capacity.

use crate::error::PlanError;
use crate::plate::WellGrid;
use crate::tables::Combination;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReagentWell {
    pub name: String,
    pub well: String,
    pub plate: String,
    pub total_vol: f64,
}

// Volume for a reagent dispensed at a fixed rate into `consumers` wells,
// padded by two phantom consumers of dead volume.
pub fn phantom_padded_total(vol_per_consumer: f64, consumers: usize) -> f64 {
    vol_per_consumer * (consumers + 2) as f64
}

// Rounds a consumer count up to the next even value at least two above it.
// Master mix wells are filled for this padded count so the margin never
// drops below two assemblies' worth.
pub fn padded_consumers(consumers: usize) -> usize {
    if consumers % 2 == 0 {
        consumers + 2
    } else {
        consumers + 3
    }
}

fn round_up_to_ten(vol: f64) -> f64 {
    (vol / 10.0).ceil() * 10.0
}

// Splits an ordered destination list into contiguous groups whose volumes
// fit a single well. Each group becomes its own reagent well.
pub fn partition_by_capacity(dests: &[(String, f64)], capacity: f64) -> Vec<Vec<(String, f64)>> {
    let mut groups: Vec<Vec<(String, f64)>> = vec![];
    let mut current: Vec<(String, f64)> = vec![];
    let mut current_vol = 0.0;
    for (dest, vol) in dests {
        if !current.is_empty() && current_vol + vol > capacity {
            groups.push(std::mem::take(&mut current));
            current_vol = 0.0;
        }
        current.push((dest.clone(), *vol));
        current_vol += vol;
    }
    if !current.is_empty() {
        groups.push(current);
    }
    groups
}

// A reagent pooled over master mix wells: total = per-mix volumes plus a
// dead volume of twice the mean draw, rounded up to the nearest ten. When
// the total would overload one well the mix list is split into contiguous
// groups that each fit.
#[derive(Clone, Debug)]
pub struct PooledGroup {
    // Indices into the master mix list served by this well.
    pub members: Vec<usize>,
    pub total_vol: f64,
}

pub fn pool_over_mixes(per_mix_vols: &[f64], capacity: f64) -> Vec<PooledGroup> {
    let sum: f64 = per_mix_vols.iter().sum();
    let dead = 2.0 * (sum / per_mix_vols.len() as f64).floor();
    let total = round_up_to_ten(sum + dead);
    if total <= capacity {
        return vec![PooledGroup {
            members: (0..per_mix_vols.len()).collect(),
            total_vol: total,
        }];
    }
    let mut groups: Vec<PooledGroup> = vec![];
    let mut members: Vec<usize> = vec![];
    let mut group_sum = 0.0;
    for (index, vol) in per_mix_vols.iter().enumerate() {
        if !members.is_empty() && round_up_to_ten(group_sum + vol + dead) > capacity {
            groups.push(PooledGroup {
                members: std::mem::take(&mut members),
                total_vol: round_up_to_ten(group_sum + dead),
            });
            group_sum = 0.0;
        }
        members.push(index);
        group_sum += vol;
    }
    if !members.is_empty() {
        groups.push(PooledGroup {
            members,
            total_vol: round_up_to_ten(group_sum + dead),
        });
    }
    groups
}

// Per-assembly volumes of a one-pot reaction mix.
#[derive(Clone, Copy, Debug)]
pub struct MixRates {
    pub total_per_assembly: f64,
    pub part_vol: f64,
    pub buffer_vol: f64,
    pub ligase_vol: f64,
    pub enzyme_vol: f64,
    pub well_capacity: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MasterMix {
    pub well: String,
    pub parts_per_assembly: usize,
    pub vol_per_assembly: f64,
    // Indices into the combination table served by this mix well.
    pub members: Vec<usize>,
    pub assemblies: usize,
    pub buffer_vol: f64,
    pub ligase_vol: f64,
    pub enzyme_vol: f64,
    pub water_vol: f64,
}

// Groups combinations by part count, derives the per-assembly mix volume,
// and batches assemblies into mix wells up to each well's safe ceiling.
// Mix wells are taken from the tail of the reaction plate.
pub fn batch_master_mixes(
    combinations: &[Combination],
    rates: &MixRates,
    grid: &WellGrid,
    used: &mut HashSet<String>,
) -> Result<Vec<MasterMix>, PlanError> {
    let min_mix_vol = rates.buffer_vol + rates.ligase_vol + rates.enzyme_vol;
    let mut part_counts: Vec<usize> = combinations.iter().map(|c| c.parts.len()).collect();
    part_counts.sort_unstable();
    part_counts.dedup();

    let mut mixes = vec![];
    for parts_per_assembly in part_counts {
        let members: Vec<usize> = combinations
            .iter()
            .enumerate()
            .filter(|(_, c)| c.parts.len() == parts_per_assembly)
            .map(|(index, _)| index)
            .collect();
        let vol_per_assembly =
            rates.total_per_assembly - parts_per_assembly as f64 * rates.part_vol;
        if vol_per_assembly < min_mix_vol {
            let first = &combinations[members[0]];
            return Err(PlanError::InvalidAssembly {
                construct: first.name.clone(),
                parts: parts_per_assembly,
                vol_per_assembly,
            });
        }
        let fit = (rates.well_capacity / vol_per_assembly) as usize;
        // Leave at least a two-assembly margin and keep the padded count
        // even.
        let max_assemblies = if fit % 2 == 0 {
            fit.saturating_sub(2)
        } else {
            fit.saturating_sub(3)
        }
        .max(1);
        for chunk in members.chunks(max_assemblies) {
            let assemblies = chunk.len();
            let padded = padded_consumers(assemblies) as f64;
            let buffer_vol = rates.buffer_vol * padded;
            let ligase_vol = rates.ligase_vol * padded;
            let enzyme_vol = rates.enzyme_vol * padded;
            let water_vol = vol_per_assembly * padded - buffer_vol - ligase_vol - enzyme_vol;
            mixes.push(MasterMix {
                well: grid.allocate_from_end(used)?,
                parts_per_assembly,
                vol_per_assembly,
                members: chunk.to_vec(),
                assemblies,
                buffer_vol,
                ligase_vol,
                enzyme_vol,
                water_vol,
            });
        }
    }
    Ok(mixes)
}
