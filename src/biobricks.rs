// Restriction-ligation planning.
//
// Each part is digested once per structural role it plays (upstream insert,
// downstream insert, plasmid backbone), digests are pooled into construct
// wells, and T4 ligase closes the assemblies. A part that serves as a
// plasmid anywhere digests only as a plasmid: backbones and inserts are cut
// with different enzyme pairs and must not share a digest.

use crate::config::{Chemistry, PlannerConfig};
use crate::error::PlanError;
use crate::occurrence::{self, INSERT_ROLES, Occurrences};
use crate::plate::{Traversal, WellGrid};
use crate::reaction::{Reaction, reactions_needed, split_into_reactions};
use crate::reagent::{ReagentWell, partition_by_capacity, phantom_padded_total};
use crate::tables;
use crate::transfer::{ConstructSummary, MixComponent, PartUsage, TransferMap, TransferPlan};
use std::collections::HashSet;
use std::io::Read;

// One digest is 50 volume units: part + water + two enzymes + buffer.
const FILL_VOL: f64 = 50.0;
const ENZ_VOL: f64 = 1.0;
const BUFFER_VOL: f64 = 5.0;
const LIGASE_VOL: f64 = 1.0;
const LIGASE_BUFFER_VOL: f64 = 2.0;
const LIGATION_WATER_VOL: f64 = 11.0;
const DIGEST_TO_CONSTRUCT_VOL: f64 = 2.0;
// 23 draws of 2 from a 50-unit digest leave 4 units of dead volume.
const MAX_CONSUMERS_PER_DIGEST: usize = 23;
// 1.5 mL reagent tubes, kept at 1.2 mL for safety.
const WATER_WELL_CAPACITY: f64 = 1200.0;

const MIX_NAMES: [&str; 3] = ["mm_upstream", "mm_downstream", "mm_plasmid"];

fn mix_vol_per_digest() -> f64 {
    2.0 * ENZ_VOL + BUFFER_VOL
}

fn digest_water_vol(part_vol: f64) -> f64 {
    FILL_VOL - part_vol - mix_vol_per_digest()
}

// Roles a part actually digests in, plasmid taking precedence.
fn digest_roles(occ: &Occurrences) -> Vec<usize> {
    if occ.counts[2] > 0 {
        vec![2]
    } else {
        [0, 1].into_iter().filter(|r| occ.counts[*r] > 0).collect()
    }
}

pub fn plan<R: Read, P: Read>(
    constructs_csv: R,
    part_csvs: Vec<P>,
    config: &PlannerConfig,
) -> Result<TransferPlan, PlanError> {
    let construct_grid = WellGrid::plate_96("Construct", Traversal::RowMajor);
    let source_grid = WellGrid::plate_96("Source", Traversal::RowMajor);
    let reagent_rack = WellGrid::rack_24("Reagent");

    let constructs = tables::parse_insert_constructs(constructs_csv, &construct_grid)?;
    let parts = tables::parse_parts(part_csvs, &source_grid)?;
    occurrence::check_insert_references(&constructs, &parts)?;

    let mut construct_wells = HashSet::new();
    for construct in &constructs {
        if !construct_wells.insert(construct.well.clone()) {
            return Err(PlanError::Schema(format!(
                "construct well {} assigned twice",
                construct.well
            )));
        }
    }

    let occurrences: Vec<Occurrences> = parts
        .iter()
        .map(|part| occurrence::count_insert_roles(&constructs, &part.name))
        .collect();

    // Digests prefer the free tail of the construct plate; only when they
    // cannot all fit does a dedicated digest plate go on the deck, and then
    // nothing needs parking on a storage plate.
    let digests_needed: usize = occurrences
        .iter()
        .map(|occ| {
            digest_roles(occ)
                .iter()
                .map(|role| reactions_needed(occ.counts[*role], MAX_CONSUMERS_PER_DIGEST))
                .sum::<usize>()
        })
        .sum();
    let shared_plate = digests_needed <= construct_grid.capacity() - constructs.len();
    let (digest_grid, mut digest_wells_used) = if shared_plate {
        (construct_grid.clone(), construct_wells.clone())
    } else {
        (
            WellGrid::plate_96("Digest", Traversal::RowMajor),
            HashSet::new(),
        )
    };

    let mut digests: Vec<Reaction> = vec![];
    for (part, occ) in parts.iter().zip(&occurrences) {
        for role in digest_roles(occ) {
            digests.extend(split_into_reactions(
                &format!("{}-{}", part.name, INSERT_ROLES[role]),
                INSERT_ROLES[role],
                &part.name,
                &part.well,
                &occ.constructs_in[role],
                MAX_CONSUMERS_PER_DIGEST,
                &digest_grid,
                &mut digest_wells_used,
            )?);
        }
    }

    let part_vol = |name: &str| {
        let part = tables::find_part(&parts, name).unwrap();
        config.part_volume(part.concentration)
    };

    // Water serves every digest and every ligation, in that order; the
    // ordered destination list is cut into tube-sized groups and each group
    // gets its own well.
    let mut water_dests: Vec<(String, f64)> = digests
        .iter()
        .map(|digest| {
            (
                digest.dest_well.clone(),
                digest_water_vol(part_vol(&digest.part)),
            )
        })
        .collect();
    for construct in &constructs {
        water_dests.push((construct.well.clone(), LIGATION_WATER_VOL));
    }
    let water_groups = partition_by_capacity(&water_dests, WATER_WELL_CAPACITY);

    let mut rack_used = HashSet::new();
    let mut reagents: Vec<ReagentWell> = vec![];
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

    let role_digest_counts: Vec<usize> = (0..INSERT_ROLES.len())
        .map(|role| {
            digests
                .iter()
                .filter(|d| d.role == INSERT_ROLES[role])
                .count()
        })
        .collect();
    let mut mix_wells: Vec<String> = vec![];
    for (role, name) in MIX_NAMES.iter().enumerate() {
        let well = reagent_rack.allocate(&mut rack_used)?;
        mix_wells.push(well.clone());
        let total_vol = if role_digest_counts[role] > 0 {
            phantom_padded_total(mix_vol_per_digest(), role_digest_counts[role])
        } else {
            0.0
        };
        reagents.push(ReagentWell {
            name: name.to_string(),
            well,
            plate: reagent_rack.name().to_string(),
            total_vol,
        });
    }
    let ligase_buffer_well = reagent_rack.allocate(&mut rack_used)?;
    reagents.push(ReagentWell {
        name: "T4Ligase10X".to_string(),
        well: ligase_buffer_well.clone(),
        plate: reagent_rack.name().to_string(),
        total_vol: phantom_padded_total(LIGASE_BUFFER_VOL, constructs.len()),
    });
    let ligase_well = reagent_rack.allocate(&mut rack_used)?;
    reagents.push(ReagentWell {
        name: "T4Ligase".to_string(),
        well: ligase_well.clone(),
        plate: reagent_rack.name().to_string(),
        total_vol: phantom_padded_total(LIGASE_VOL, constructs.len()),
    });

    let mix_recipes = mix_recipes(&role_digest_counts);

    // Transfer phases.
    let mut source_to_digest = TransferMap::new("source_to_digest");
    let mut reagent_to_digest = TransferMap::new("reagent_to_digest");
    let mut digest_to_construct = TransferMap::new("digest_to_construct");
    let mut reagent_to_construct = TransferMap::new("reagent_to_construct");

    for digest in &digests {
        source_to_digest.push(&digest.source_well, &digest.dest_well, part_vol(&digest.part));
        let role = INSERT_ROLES.iter().position(|r| *r == digest.role).unwrap();
        reagent_to_digest.push(&mix_wells[role], &digest.dest_well, mix_vol_per_digest());
        for consumer in &digest.consumers {
            digest_to_construct.push(
                &digest.dest_well,
                &constructs[*consumer].well,
                DIGEST_TO_CONSTRUCT_VOL,
            );
        }
    }

    // Water destinations replay group by group so each transfer draws from
    // the well that was sized for it.
    let digest_phase = digests.len();
    let mut dest_index = 0;
    for (group, well) in water_groups.iter().zip(&water_wells) {
        for (dest, vol) in group {
            if dest_index < digest_phase {
                reagent_to_digest.push(well, dest, *vol);
            } else {
                reagent_to_construct.push(well, dest, *vol);
            }
            dest_index += 1;
        }
    }

    for construct in &constructs {
        reagent_to_construct.push(&ligase_buffer_well, &construct.well, LIGASE_BUFFER_VOL);
        reagent_to_construct.push(&ligase_well, &construct.well, LIGASE_VOL);
    }

    let reaction_to_storage = if shared_plate {
        let storage_grid = WellGrid::plate_96("Storage", Traversal::RowMajor);
        let mut storage_used = HashSet::new();
        let mut map = TransferMap::new("digest_to_storage");
        for digest in &digests {
            let storage_well = storage_grid.allocate(&mut storage_used)?;
            let leftover =
                FILL_VOL - DIGEST_TO_CONSTRUCT_VOL * digest.consumers.len() as f64;
            map.push(&digest.dest_well, &storage_well, leftover);
        }
        Some(map)
    } else {
        None
    };

    let part_usage: Vec<PartUsage> = parts
        .iter()
        .zip(&occurrences)
        .map(|(part, occ)| {
            let reactions = digests.iter().filter(|d| d.part == part.name).count();
            let vol = config.part_volume(part.concentration);
            PartUsage {
                name: part.name.clone(),
                well: part.well.clone(),
                plate: part.plate.clone(),
                concentration: part.concentration.unwrap_or(config.default_concentration),
                vol_per_reaction: vol,
                occurrences: occ.counts.clone(),
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
            parts: vec![c.upstream.clone(), c.downstream.clone(), c.plasmid.clone()],
        })
        .collect();

    Ok(TransferPlan {
        chemistry: Chemistry::RestrictionLigation,
        parts: part_usage,
        constructs: construct_summaries,
        reactions: digests,
        reagents,
        master_mixes: vec![],
        mix_recipes,
        part_to_reaction: source_to_digest,
        reagent_to_reaction: reagent_to_digest,
        reaction_to_construct: digest_to_construct,
        reagent_to_construct,
        reaction_to_storage,
    })
}

// Composition of the three digest mixes, scaled to their padded digest
// counts: EcoRI-HF/SpeI cut upstream inserts, XbaI/PstI downstream inserts,
// EcoRI-HF/PstI plasmids, all in the same buffer.
fn mix_recipes(role_digest_counts: &[usize]) -> Vec<MixComponent> {
    let padded: Vec<f64> = role_digest_counts.iter().map(|n| (n + 2) as f64).collect();
    let component = |reagent: &str, vol: f64, roles: [bool; 3]| MixComponent {
        reagent: reagent.to_string(),
        upstream_vol: if roles[0] { vol * padded[0] } else { 0.0 },
        downstream_vol: if roles[1] { vol * padded[1] } else { 0.0 },
        plasmid_vol: if roles[2] { vol * padded[2] } else { 0.0 },
    };
    vec![
        component("NEB Buffer 10X", BUFFER_VOL, [true, true, true]),
        component("EcoRI-HF", ENZ_VOL, [true, false, true]),
        component("SpeI", ENZ_VOL, [true, false, false]),
        component("XbaI", ENZ_VOL, [false, true, false]),
        component("PstI", ENZ_VOL, [false, true, true]),
    ]
}
