// Linker-ligation planning.
//
// A clip joins one part to the prefix half of the linker before it in the
// chain and the suffix half of the linker after it. Identical clips across
// constructs share one clip reaction; the clip plate feeds the assembly
// plate at a fixed draw per clip, topped up by a per-chain-length assembly
// mix.

use crate::config::{Chemistry, PlannerConfig};
use crate::error::PlanError;
use crate::occurrence::{self, Occurrences};
use crate::plate::{Traversal, WellGrid};
use crate::reaction::{Reaction, split_into_reactions};
use crate::reagent::{ReagentWell, partition_by_capacity, phantom_padded_total};
use crate::tables::{self, ClipSpec};
use crate::transfer::{ConstructSummary, PartUsage, TransferMap, TransferPlan};
use itertools::Itertools;
use std::collections::HashSet;
use std::io::Read;

// A clip reaction is 30 volume units: 20 of clip mix, one of each linker
// half, the part, and water to fill.
const CLIP_FILL_VOL: f64 = 30.0;
const CLIP_MIX_VOL: f64 = 20.0;
const LINKER_VOL: f64 = 1.0;
const CLIP_TO_CONSTRUCT_VOL: f64 = 1.5;
const ASSEMBLY_TOTAL_VOL: f64 = 15.0;
// 15 draws of 1.5 leave a quarter of the clip as dead volume.
const MAX_CONSUMERS_PER_CLIP: usize = 15;
const WATER_WELL_CAPACITY: f64 = 1200.0;

fn clip_water_vol(part_vol: f64) -> f64 {
    CLIP_FILL_VOL - CLIP_MIX_VOL - 2.0 * LINKER_VOL - part_vol
}

pub fn plan<R: Read, P: Read>(
    constructs_csv: R,
    part_csvs: Vec<P>,
    config: &PlannerConfig,
) -> Result<TransferPlan, PlanError> {
    let clip_grid = WellGrid::plate_96("Clip", Traversal::ColumnMajor);
    let assembly_grid = WellGrid::plate_96("Assembly", Traversal::RowMajor);
    let source_grid = WellGrid::plate_96("Source", Traversal::RowMajor);
    let reagent_rack = WellGrid::rack_24("Reagent");

    let constructs = tables::parse_linker_constructs(constructs_csv, &assembly_grid)?;
    let parts = tables::parse_parts(part_csvs, &source_grid)?;
    occurrence::check_chain_references(&constructs, &parts)?;

    let mut construct_wells = HashSet::new();
    for construct in &constructs {
        if !construct_wells.insert(construct.well.clone()) {
            return Err(PlanError::Schema(format!(
                "construct well {} assigned twice",
                construct.well
            )));
        }
    }

    // Unique clips in first-appearance order, each with the constructs that
    // consume it.
    let mut clip_specs: Vec<(ClipSpec, Vec<usize>)> = vec![];
    for (index, construct) in constructs.iter().enumerate() {
        for clip in construct.clips() {
            match clip_specs.iter_mut().find(|(spec, _)| *spec == clip) {
                Some((_, consumers)) => consumers.push(index),
                None => clip_specs.push((clip, vec![index])),
            }
        }
    }

    let part_vol = |name: &str| {
        let part = tables::find_part(&parts, name).unwrap();
        config.part_volume(part.concentration)
    };
    let part_well = |name: &str| tables::find_part(&parts, name).unwrap().well.clone();

    let mut clip_wells_used = HashSet::new();
    let mut clips: Vec<Reaction> = vec![];
    // Which clip triple each planned reaction came from, for the linker
    // transfers.
    let mut clip_spec_of: Vec<usize> = vec![];
    for (spec_index, (spec, consumers)) in clip_specs.iter().enumerate() {
        let reactions = split_into_reactions(
            &format!("{}-{}-{}", spec.prefix, spec.part, spec.suffix),
            "clip",
            &spec.part,
            &part_well(&spec.part),
            consumers,
            MAX_CONSUMERS_PER_CLIP,
            &clip_grid,
            &mut clip_wells_used,
        )?;
        clip_spec_of.extend(std::iter::repeat(spec_index).take(reactions.len()));
        clips.extend(reactions);
    }

    // Clip mix in the first rack tube, water right after it, assembly mixes
    // behind those.
    let mut rack_used = HashSet::new();
    let mut reagents: Vec<ReagentWell> = vec![];
    let clip_mix_well = reagent_rack.allocate(&mut rack_used)?;
    reagents.push(ReagentWell {
        name: "clip_mm".to_string(),
        well: clip_mix_well.clone(),
        plate: reagent_rack.name().to_string(),
        total_vol: phantom_padded_total(CLIP_MIX_VOL, clips.len()),
    });

    let water_dests: Vec<(String, f64)> = clips
        .iter()
        .map(|clip| (clip.dest_well.clone(), clip_water_vol(part_vol(&clip.part))))
        .collect();
    let water_groups = partition_by_capacity(&water_dests, WATER_WELL_CAPACITY);
    let mut water_wells: Vec<String> = vec![];
    for (index, group) in water_groups.iter().enumerate() {
        let well = reagent_rack.allocate(&mut rack_used)?;
        water_wells.push(well.clone());
        reagents.push(ReagentWell {
            name: format!("water-{}", index + 1),
            well,
            plate: reagent_rack.name().to_string(),
            total_vol: group.iter().map(|(_, vol)| vol).sum(),
        });
    }

    // One assembly mix per chain length present: shorter chains need more
    // topping up. A chain long enough to leave no room for the mix cannot
    // be assembled in one pot.
    let chain_lengths: Vec<usize> = constructs
        .iter()
        .map(|c| c.chain.len() / 2)
        .sorted()
        .dedup()
        .collect();
    let mut assembly_mix_wells: Vec<(usize, String, f64)> = vec![];
    for clips_per_construct in chain_lengths {
        let members: Vec<usize> = constructs
            .iter()
            .enumerate()
            .filter(|(_, c)| c.chain.len() / 2 == clips_per_construct)
            .map(|(index, _)| index)
            .collect();
        let vol_per_construct =
            ASSEMBLY_TOTAL_VOL - CLIP_TO_CONSTRUCT_VOL * clips_per_construct as f64;
        if vol_per_construct <= 0.0 {
            let first = &constructs[members[0]];
            return Err(PlanError::InvalidAssembly {
                construct: first.name.clone(),
                parts: clips_per_construct,
                vol_per_assembly: vol_per_construct,
            });
        }
        let well = reagent_rack.allocate(&mut rack_used)?;
        reagents.push(ReagentWell {
            name: format!("assembly_mm_{clips_per_construct}"),
            well: well.clone(),
            plate: reagent_rack.name().to_string(),
            total_vol: phantom_padded_total(vol_per_construct, members.len()),
        });
        assembly_mix_wells.push((clips_per_construct, well, vol_per_construct));
    }

    let mut source_to_clip = TransferMap::new("source_to_clip");
    let mut reagent_to_clip = TransferMap::new("reagent_to_clip");
    let mut clip_to_construct = TransferMap::new("clip_to_construct");
    let mut reagent_to_construct = TransferMap::new("reagent_to_construct");

    for (clip, spec_index) in clips.iter().zip(&clip_spec_of) {
        let spec = &clip_specs[*spec_index].0;
        source_to_clip.push(
            &part_well(&format!("{}-P", spec.prefix)),
            &clip.dest_well,
            LINKER_VOL,
        );
        source_to_clip.push(
            &part_well(&format!("{}-S", spec.suffix)),
            &clip.dest_well,
            LINKER_VOL,
        );
        source_to_clip.push(&clip.source_well, &clip.dest_well, part_vol(&clip.part));
        reagent_to_clip.push(&clip_mix_well, &clip.dest_well, CLIP_MIX_VOL);
        for consumer in &clip.consumers {
            clip_to_construct.push(
                &clip.dest_well,
                &constructs[*consumer].well,
                CLIP_TO_CONSTRUCT_VOL,
            );
        }
    }
    for (group, well) in water_groups.iter().zip(&water_wells) {
        for (dest, vol) in group {
            reagent_to_clip.push(well, dest, *vol);
        }
    }
    for construct in &constructs {
        let clips_per_construct = construct.chain.len() / 2;
        let (_, well, vol) = assembly_mix_wells
            .iter()
            .find(|(n, _, _)| *n == clips_per_construct)
            .unwrap();
        reagent_to_construct.push(well, &construct.well, *vol);
    }

    let part_usage: Vec<PartUsage> = parts
        .iter()
        .map(|part| {
            let occ: Occurrences = occurrence::count_chain_roles(&constructs, &part.name);
            let reactions = clips
                .iter()
                .zip(&clip_spec_of)
                .filter(|(_, spec_index)| {
                    let spec = &clip_specs[**spec_index].0;
                    format!("{}-P", spec.prefix) == part.name
                        || format!("{}-S", spec.suffix) == part.name
                        || spec.part == part.name
                })
                .count();
            // Linker halves go in at a fixed volume; inserts at their
            // concentration-derived volume.
            let vol = if occ.counts[2] > 0 || occ.total() == 0 {
                config.part_volume(part.concentration)
            } else {
                LINKER_VOL
            };
            PartUsage {
                name: part.name.clone(),
                well: part.well.clone(),
                plate: part.plate.clone(),
                concentration: part.concentration.unwrap_or(config.default_concentration),
                vol_per_reaction: vol,
                occurrences: occ.counts,
                reactions,
                total_vol: vol * (reactions + 2) as f64,
            }
        })
        .collect();

    let construct_summaries = constructs
        .iter()
        .map(|c| ConstructSummary {
            name: c.name.clone(),
            well: c.well.clone(),
            parts: c.chain.clone(),
        })
        .collect();

    Ok(TransferPlan {
        chemistry: Chemistry::LinkerLigation,
        parts: part_usage,
        constructs: construct_summaries,
        reactions: clips,
        reagents,
        master_mixes: vec![],
        mix_recipes: vec![],
        part_to_reaction: source_to_clip,
        reagent_to_reaction: reagent_to_clip,
        reaction_to_construct: clip_to_construct,
        reagent_to_construct,
        reaction_to_storage: None,
    })
}
