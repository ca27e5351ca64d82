// Combinatorial one-pot planning.
//
// There is no intermediate reaction stage: parts pool straight into the
// combination wells and a pre-batched master mix tops every well up to the
// fixed reaction volume. Combinations are grouped by part count, since the
// mix volume per assembly shrinks as parts displace it.

use crate::config::{Chemistry, OutputMode, PlannerConfig};
use crate::error::PlanError;
use crate::occurrence;
use crate::plate::{Traversal, WellGrid};
use crate::reagent::{MixRates, ReagentWell, batch_master_mixes, pool_over_mixes};
use crate::tables::{self, Combination};
use crate::transfer::{ConstructSummary, PartUsage, TransferMap, TransferPlan};
use std::collections::HashSet;
use std::io::Read;

const TOTAL_VOL_PER_ASSEMBLY: f64 = 20.0;
const PART_VOL: f64 = 2.0;
const BUFFER_VOL_PER_ASSEMBLY: f64 = 2.0;
const LIGASE_VOL_PER_ASSEMBLY: f64 = 0.5;
const ENZYME_VOL_PER_ASSEMBLY: f64 = 1.0;
// Master mix wells sit on the reaction plate itself, so they share its
// 180-unit working volume.
const MIX_WELL_CAPACITY: f64 = 180.0;
const REAGENT_WELL_CAPACITY: f64 = 180.0;
const WATER_SUPPLY_VOL: f64 = 15000.0;
const WATER_TROUGH_WELL: &str = "A1";
const WATER_TROUGH: &str = "trough";

// Output-mode ceilings: plating in triplicate takes three agar wells per
// combination.
const MAX_COMBINATIONS_SINGLE: usize = 88;
const MAX_COMBINATIONS_TRIPLICATE: usize = 24;

fn mix_rates() -> MixRates {
    MixRates {
        total_per_assembly: TOTAL_VOL_PER_ASSEMBLY,
        part_vol: PART_VOL,
        buffer_vol: BUFFER_VOL_PER_ASSEMBLY,
        ligase_vol: LIGASE_VOL_PER_ASSEMBLY,
        enzyme_vol: ENZYME_VOL_PER_ASSEMBLY,
        well_capacity: MIX_WELL_CAPACITY,
    }
}

fn check_combination_count(
    combinations: &[Combination],
    mode: OutputMode,
) -> Result<(), PlanError> {
    let limit = match mode {
        OutputMode::Single => MAX_COMBINATIONS_SINGLE,
        OutputMode::Triplicate => MAX_COMBINATIONS_TRIPLICATE,
    };
    if combinations.len() > limit {
        return Err(PlanError::CapacityExceeded {
            requested: combinations.len(),
            limit,
            mode: mode.to_string(),
        });
    }
    Ok(())
}

pub fn plan<R: Read, P: Read>(
    combinations_csv: R,
    plate_map_csv: P,
    config: &PlannerConfig,
) -> Result<TransferPlan, PlanError> {
    let reaction_grid = WellGrid::plate_96("Reaction", Traversal::ColumnMajor);
    let reagent_rack = WellGrid::rack_24("Reagent");

    let combinations = tables::parse_combinations(combinations_csv)?;
    // Fail on oversubscription before any parsing or allocation work.
    check_combination_count(&combinations, config.output_mode)?;

    let parts = tables::parse_plate_map(plate_map_csv, "dna_plate")?;
    occurrence::check_membership_references(&combinations, &parts)?;

    // Combination wells fill the reaction plate column by column in input
    // order.
    let mut wells_used = HashSet::new();
    let combination_wells: Vec<String> = (0..combinations.len())
        .map(|index| reaction_grid.well_name(index))
        .collect();
    wells_used.extend(combination_wells.iter().cloned());

    let master_mixes = batch_master_mixes(&combinations, &mix_rates(), &reaction_grid, &mut wells_used)?;

    // Pooled reagents live at the tail of the reagent rack; bulk water comes
    // from the deck trough.
    let mut rack_used = HashSet::new();
    let mut reagents: Vec<ReagentWell> = vec![];
    let mut reagent_to_mm = TransferMap::new("reagent_to_mm");
    for (name, per_mix_vols) in [
        (
            "ligase",
            master_mixes.iter().map(|m| m.ligase_vol).collect::<Vec<f64>>(),
        ),
        (
            "restriction_enzyme",
            master_mixes.iter().map(|m| m.enzyme_vol).collect(),
        ),
        (
            "buffer",
            master_mixes.iter().map(|m| m.buffer_vol).collect(),
        ),
    ] {
        let groups = pool_over_mixes(&per_mix_vols, REAGENT_WELL_CAPACITY);
        let split = groups.len() > 1;
        for (index, group) in groups.iter().enumerate() {
            let well = reagent_rack.allocate_from_end(&mut rack_used)?;
            let reagent_name = if split {
                format!("{name}-{}", index + 1)
            } else {
                name.to_string()
            };
            for member in &group.members {
                reagent_to_mm.push(&well, &master_mixes[*member].well, per_mix_vols[*member]);
            }
            reagents.push(ReagentWell {
                name: reagent_name,
                well,
                plate: reagent_rack.name().to_string(),
                total_vol: group.total_vol,
            });
        }
    }
    for mix in &master_mixes {
        reagent_to_mm.push(WATER_TROUGH_WELL, &mix.well, mix.water_vol);
    }
    reagents.push(ReagentWell {
        name: "water".to_string(),
        well: WATER_TROUGH_WELL.to_string(),
        plate: WATER_TROUGH.to_string(),
        total_vol: WATER_SUPPLY_VOL,
    });

    let mut source_to_combination = TransferMap::new("source_to_combination");
    for (combination, well) in combinations.iter().zip(&combination_wells) {
        for member in &combination.parts {
            let part = tables::find_part(&parts, member).unwrap();
            source_to_combination.push(&part.well, well, PART_VOL);
        }
    }

    let mut mm_to_combination = TransferMap::new("mm_to_combination");
    for mix in &master_mixes {
        for member in &mix.members {
            mm_to_combination.push(&mix.well, &combination_wells[*member], mix.vol_per_assembly);
        }
    }

    let part_usage: Vec<PartUsage> = parts
        .iter()
        .map(|part| {
            let occ = occurrence::count_membership(&combinations, &part.name);
            let reactions = occ.counts[0];
            PartUsage {
                name: part.name.clone(),
                well: part.well.clone(),
                plate: part.plate.clone(),
                concentration: part.concentration.unwrap_or(config.default_concentration),
                vol_per_reaction: PART_VOL,
                occurrences: occ.counts,
                reactions,
                total_vol: PART_VOL * (reactions + 2) as f64,
            }
        })
        .collect();

    let construct_summaries = combinations
        .iter()
        .zip(&combination_wells)
        .map(|(combination, well)| ConstructSummary {
            name: combination.name.clone(),
            well: well.clone(),
            parts: combination.parts.clone(),
        })
        .collect();

    Ok(TransferPlan {
        chemistry: Chemistry::Combinatorial,
        parts: part_usage,
        constructs: construct_summaries,
        reactions: vec![],
        reagents,
        master_mixes,
        mix_recipes: vec![],
        part_to_reaction: source_to_combination,
        reagent_to_reaction: reagent_to_mm,
        reaction_to_construct: TransferMap::new("reaction_to_construct"),
        reagent_to_construct: mm_to_combination,
        reaction_to_storage: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const PLATE_MAP: &str = "pA,pB,pC,pD\npE,pF,pG,pH\n";

    fn combos_csv(count: usize, parts_each: usize) -> String {
        let names = ["pA", "pB", "pC", "pD", "pE", "pF", "pG", "pH"];
        let mut csv = String::new();
        for i in 0..count {
            let mut row = vec![format!("combo{}", i + 1)];
            for p in 0..parts_each {
                row.push(names[(i + p) % names.len()].to_string());
            }
            csv.push_str(&row.join(","));
            csv.push('\n');
        }
        csv
    }

    fn eight_pair_plan() -> TransferPlan {
        plan(
            combos_csv(8, 2).as_bytes(),
            PLATE_MAP.as_bytes(),
            &PlannerConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_eight_pairs_share_one_master_mix() {
        let plan = eight_pair_plan();
        assert_eq!(plan.master_mixes.len(), 1);
        let mix = &plan.master_mixes[0];
        assert_eq!(mix.assemblies, 8);
        assert_eq!(mix.vol_per_assembly, 16.0);
        assert_eq!(mix.well, "H12");
        // Reagent draws scale with the padded assembly count of 10.
        assert_eq!(mix.buffer_vol, 20.0);
        assert_eq!(mix.ligase_vol, 5.0);
        assert_eq!(mix.enzyme_vol, 10.0);
    }

    #[test]
    fn test_combination_wells_fill_first_column() {
        let plan = eight_pair_plan();
        let wells: Vec<&str> = plan.constructs.iter().map(|c| c.well.as_str()).collect();
        assert_eq!(wells, vec!["A1", "B1", "C1", "D1", "E1", "F1", "G1", "H1"]);
    }

    #[test]
    fn test_mix_tops_up_every_combination() {
        let plan = eight_pair_plan();
        let transfers = plan.reagent_to_construct.transfers_from("H12").unwrap();
        assert_eq!(transfers.len(), 8);
        assert!(transfers.iter().all(|t| t.vol == 16.0));
    }

    #[test]
    fn test_parts_pool_at_two_units() {
        let plan = eight_pair_plan();
        // pA is at plate well A1 and member of combo1 and combo8.
        let transfers = plan.part_to_reaction.transfers_from("A1").unwrap();
        assert_eq!(transfers.len(), 2);
        assert!(transfers.iter().all(|t| t.vol == 2.0));
        let usage = plan.parts.iter().find(|p| p.name == "pA").unwrap();
        assert_eq!(usage.occurrences, vec![2]);
        assert_eq!(usage.total_vol, 8.0);
    }

    #[test]
    fn test_pooled_reagents_from_rack_tail_and_trough_water() {
        let plan = eight_pair_plan();
        let ligase = plan.reagent_named("ligase").unwrap();
        assert_eq!(ligase.well, "C8");
        // sum 5 plus dead 2*5, rounded up to the next ten
        assert_eq!(ligase.total_vol, 20.0);
        assert_eq!(plan.reagent_named("restriction_enzyme").unwrap().well, "C7");
        assert_eq!(plan.reagent_named("buffer").unwrap().well, "C6");
        let water = plan.reagent_named("water").unwrap();
        assert_eq!(water.plate, "trough");
        let transfers = plan.reagent_to_reaction.transfers_from("A1").unwrap();
        assert_eq!(transfers[0].dest, "H12");
        assert_eq!(transfers[0].vol, 16.0 * 10.0 - 20.0 - 5.0 - 10.0);
    }

    #[test]
    fn test_ninth_pair_opens_a_second_mix() {
        let plan = plan(
            combos_csv(9, 2).as_bytes(),
            PLATE_MAP.as_bytes(),
            &PlannerConfig::default(),
        )
        .unwrap();
        assert_eq!(plan.master_mixes.len(), 2);
        assert_eq!(plan.master_mixes[1].well, "G12");
        assert_eq!(plan.master_mixes[1].assemblies, 1);
    }

    #[test]
    fn test_buffer_splits_across_wells_at_capacity() {
        // Ten combinations at every part count from 2 to 8: the two-part
        // group alone needs two mixes, and the pooled buffer cannot fit one
        // well.
        let mut csv = String::new();
        let names = ["pA", "pB", "pC", "pD", "pE", "pF", "pG", "pH"];
        let mut combo = 0;
        for parts_each in 2..=8 {
            for _ in 0..10 {
                let mut row = vec![format!("combo{combo}")];
                row.extend(names[..parts_each].iter().map(|s| s.to_string()));
                csv.push_str(&row.join(","));
                csv.push('\n');
                combo += 1;
            }
        }
        let plan = plan(
            csv.as_bytes(),
            PLATE_MAP.as_bytes(),
            &PlannerConfig::default(),
        )
        .unwrap();
        assert_eq!(plan.master_mixes.len(), 8);
        let buffer_wells: Vec<&ReagentWell> = plan
            .reagents
            .iter()
            .filter(|r| r.name.starts_with("buffer"))
            .collect();
        assert!(buffer_wells.len() > 1);
        assert!(buffer_wells.iter().all(|r| r.total_vol <= 180.0));
        assert_eq!(buffer_wells[0].name, "buffer-1");
    }

    #[test]
    fn test_eighty_nine_single_combinations_fail_fast() {
        let err = plan(
            combos_csv(89, 2).as_bytes(),
            PLATE_MAP.as_bytes(),
            &PlannerConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            PlanError::CapacityExceeded {
                requested: 89,
                limit: 88,
                ..
            }
        ));
    }

    #[test]
    fn test_triplicate_mode_caps_at_twenty_four() {
        let config = PlannerConfig {
            output_mode: OutputMode::Triplicate,
            ..PlannerConfig::default()
        };
        let err = plan(combos_csv(25, 2).as_bytes(), PLATE_MAP.as_bytes(), &config).unwrap_err();
        assert!(matches!(err, PlanError::CapacityExceeded { limit: 24, .. }));
        assert!(
            plan(combos_csv(24, 2).as_bytes(), PLATE_MAP.as_bytes(), &config).is_ok()
        );
    }

    #[test]
    fn test_nine_part_combination_is_invalid() {
        let csv = "combo1,pA,pB,pC,pD,pE,pF,pG,pH,pA\n";
        let err = plan(
            csv.as_bytes(),
            PLATE_MAP.as_bytes(),
            &PlannerConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, PlanError::InvalidAssembly { parts: 9, .. }));
    }

    #[test]
    fn test_unknown_part_is_schema_error() {
        let csv = "combo1,pA,missing\n";
        let err = plan(
            csv.as_bytes(),
            PLATE_MAP.as_bytes(),
            &PlannerConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, PlanError::Schema(_)));
    }

    #[test]
    fn test_determinism() {
        let a = serde_json::to_string(&eight_pair_plan()).unwrap();
        let b = serde_json::to_string(&eight_pair_plan()).unwrap();
        assert_eq!(a, b);
    }
}
