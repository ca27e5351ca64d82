// Metainformation report.
//
// A flat, sectioned CSV dump of every table and transfer map, for humans
// checking a plan before a robot runs it, plus the JSON plan hand-off for
// the protocol emitter. Formatting only: a failure here leaves the computed
// plan itself intact.

use crate::config::{Chemistry, PlannerConfig};
use crate::error::PlanError;
use crate::transfer::{TransferMap, TransferPlan};
use std::io::Write;
use std::path::{Path, PathBuf};

fn file_prefix(chemistry: Chemistry) -> &'static str {
    match chemistry {
        Chemistry::LinkerLigation => "basic",
        Chemistry::RestrictionLigation => "bb",
        Chemistry::Combinatorial => "moclo",
    }
}

fn join_indices(indices: &[usize]) -> String {
    indices
        .iter()
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join(";")
}

fn write_section<W: Write>(
    wtr: &mut csv::Writer<W>,
    title: &str,
    header: &[&str],
    rows: Vec<Vec<String>>,
) -> Result<(), PlanError> {
    wtr.write_record([title])?;
    wtr.write_record(header)?;
    for row in rows {
        wtr.write_record(&row)?;
    }
    wtr.write_record([""])?;
    Ok(())
}

fn map_rows(map: &TransferMap) -> Vec<Vec<String>> {
    let mut rows = vec![];
    for entry in &map.entries {
        for transfer in &entry.transfers {
            rows.push(vec![
                entry.source.clone(),
                transfer.dest.clone(),
                transfer.vol.to_string(),
            ]);
        }
    }
    rows
}

pub fn write_metainformation<W: Write>(
    writer: W,
    plan: &TransferPlan,
    config: &PlannerConfig,
) -> Result<(), PlanError> {
    let mut wtr = csv::WriterBuilder::new().flexible(true).from_writer(writer);

    wtr.write_record(["chemistry", &plan.chemistry.to_string()])?;
    wtr.write_record(["output_mode", &config.output_mode.to_string()])?;
    wtr.write_record([""])?;

    write_section(
        &mut wtr,
        "LABWARE",
        &["name", "definition"],
        config
            .labware
            .iter()
            .map(|item| vec![item.name.clone(), item.definition.clone()])
            .collect(),
    )?;

    write_section(
        &mut wtr,
        "PARTS",
        &[
            "name",
            "well",
            "plate",
            "concentration",
            "vol_per_reaction",
            "occurrences",
            "reactions",
            "total_vol",
        ],
        plan.parts
            .iter()
            .map(|part| {
                vec![
                    part.name.clone(),
                    part.well.clone(),
                    part.plate.clone(),
                    part.concentration.to_string(),
                    part.vol_per_reaction.to_string(),
                    join_indices(&part.occurrences),
                    part.reactions.to_string(),
                    part.total_vol.to_string(),
                ]
            })
            .collect(),
    )?;

    write_section(
        &mut wtr,
        "CONSTRUCTS",
        &["name", "well", "parts"],
        plan.constructs
            .iter()
            .map(|c| vec![c.name.clone(), c.well.clone(), c.parts.join(";")])
            .collect(),
    )?;

    if !plan.reactions.is_empty() {
        write_section(
            &mut wtr,
            "REACTIONS",
            &["name", "role", "part", "source_well", "dest_well", "constructs"],
            plan.reactions
                .iter()
                .map(|r| {
                    vec![
                        r.name.clone(),
                        r.role.clone(),
                        r.part.clone(),
                        r.source_well.clone(),
                        r.dest_well.clone(),
                        join_indices(&r.consumers),
                    ]
                })
                .collect(),
        )?;
    }

    write_section(
        &mut wtr,
        "REAGENTS",
        &["name", "well", "plate", "total_vol"],
        plan.reagents
            .iter()
            .map(|r| {
                vec![
                    r.name.clone(),
                    r.well.clone(),
                    r.plate.clone(),
                    r.total_vol.to_string(),
                ]
            })
            .collect(),
    )?;

    if !plan.master_mixes.is_empty() {
        write_section(
            &mut wtr,
            "MASTER_MIX",
            &[
                "well",
                "parts_per_assembly",
                "vol_per_assembly",
                "assemblies",
                "buffer_vol",
                "ligase_vol",
                "enzyme_vol",
                "water_vol",
                "combinations",
            ],
            plan.master_mixes
                .iter()
                .map(|m| {
                    vec![
                        m.well.clone(),
                        m.parts_per_assembly.to_string(),
                        m.vol_per_assembly.to_string(),
                        m.assemblies.to_string(),
                        m.buffer_vol.to_string(),
                        m.ligase_vol.to_string(),
                        m.enzyme_vol.to_string(),
                        m.water_vol.to_string(),
                        join_indices(&m.members),
                    ]
                })
                .collect(),
        )?;
    }

    if !plan.mix_recipes.is_empty() {
        write_section(
            &mut wtr,
            "MIX_RECIPE",
            &["reagent", "upstream_vol", "downstream_vol", "plasmid_vol"],
            plan.mix_recipes
                .iter()
                .map(|c| {
                    vec![
                        c.reagent.clone(),
                        c.upstream_vol.to_string(),
                        c.downstream_vol.to_string(),
                        c.plasmid_vol.to_string(),
                    ]
                })
                .collect(),
        )?;
    }

    for map in plan.maps() {
        if map.is_empty() {
            continue;
        }
        write_section(
            &mut wtr,
            &map.name.to_uppercase(),
            &["source", "dest", "vol"],
            map_rows(map),
        )?;
    }

    wtr.flush()?;
    Ok(())
}

pub fn write_plan_json<W: Write>(writer: W, plan: &TransferPlan) -> Result<(), PlanError> {
    serde_json::to_writer_pretty(writer, plan)?;
    Ok(())
}

// Writes both artifacts into `dir` and returns their paths, metainformation
// first.
pub fn save(
    plan: &TransferPlan,
    config: &PlannerConfig,
    dir: &Path,
) -> Result<Vec<PathBuf>, PlanError> {
    let prefix = file_prefix(plan.chemistry);
    let meta_path = dir.join(format!("{prefix}_metainformation.csv"));
    let json_path = dir.join(format!("{prefix}_plan.json"));
    write_metainformation(std::fs::File::create(&meta_path)?, plan, config)?;
    write_plan_json(std::fs::File::create(&json_path)?, plan)?;
    Ok(vec![meta_path, json_path])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::biobricks;

    const CONSTRUCTS: &str = "name,well,upstream,downstream,plasmid\n\
        construct1,A1,BBa_B0034,BBa_C0040,BBa_pSB1AK3\n";
    const PARTS: &str = "name,well\nBBa_B0034,A1\nBBa_C0040,B1\nBBa_pSB1AK3,C1\n";

    fn sample_plan() -> TransferPlan {
        biobricks::plan(
            CONSTRUCTS.as_bytes(),
            vec![PARTS.as_bytes()],
            &PlannerConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_metainformation_sections() {
        let plan = sample_plan();
        let mut buf = vec![];
        write_metainformation(&mut buf, &plan, &PlannerConfig::default()).unwrap();
        let text = String::from_utf8(buf).unwrap();
        for section in [
            "LABWARE",
            "PARTS",
            "CONSTRUCTS",
            "REACTIONS",
            "REAGENTS",
            "MIX_RECIPE",
            "SOURCE_TO_DIGEST",
            "DIGEST_TO_CONSTRUCT",
            "DIGEST_TO_STORAGE",
        ] {
            assert!(text.contains(section), "missing section {section}");
        }
        assert!(text.contains("BBa_pSB1AK3-plasmid-1"));
    }

    #[test]
    fn test_json_round_trip() {
        let plan = sample_plan();
        let mut buf = vec![];
        write_plan_json(&mut buf, &plan).unwrap();
        let parsed: TransferPlan = serde_json::from_slice(&buf).unwrap();
        assert_eq!(parsed.reactions.len(), plan.reactions.len());
        assert_eq!(parsed.reagents.len(), plan.reagents.len());
    }

    #[test]
    fn test_save_writes_both_artifacts() {
        let plan = sample_plan();
        let dir = tempfile::tempdir().unwrap();
        let paths = save(&plan, &PlannerConfig::default(), dir.path()).unwrap();
        assert_eq!(paths.len(), 2);
        assert!(paths[0].ends_with("bb_metainformation.csv"));
        assert!(paths[0].exists());
        assert!(paths[1].exists());
    }
}
