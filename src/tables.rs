// Typed ingestion of the construct and part tables.
//
// The upstream design-parsing service hands over plain CSV. Rows are turned
// into typed records here, at the boundary, so the planners never see
// untyped string lists; anything that does not match the expected shape for
// the selected chemistry is a schema error.

use crate::error::PlanError;
use crate::plate::WellGrid;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::io::Read;

// Deck slots the source plates land in, in part-file order.
const SOURCE_PLATE_SLOTS: [&str; 3] = ["2", "5", "6"];

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Part {
    pub name: String,
    pub well: String,
    pub plate: String,
    pub concentration: Option<f64>,
}

// One restriction-ligation assembly: an insert pair going into a plasmid
// backbone.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InsertConstruct {
    pub name: String,
    pub well: String,
    pub upstream: String,
    pub downstream: String,
    pub plasmid: String,
}

// One linker-ligation assembly: an even-length chain alternating linker and
// part names, starting with a linker. The final part wraps around to the
// leading linker.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LinkerConstruct {
    pub name: String,
    pub well: String,
    pub chain: Vec<String>,
}

// One combinatorial assembly: an unordered pool of parts, well assigned by
// the planner.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Combination {
    pub name: String,
    pub parts: Vec<String>,
}

// A prefix-linker/part/suffix-linker triple, the unit that becomes one clip
// reaction. Identical triples from different constructs share a reaction.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClipSpec {
    pub prefix: String,
    pub part: String,
    pub suffix: String,
}

impl LinkerConstruct {
    // The clips this chain needs: each part with the linker before it and
    // the linker after it, the last part wrapping around to the leading
    // linker.
    pub fn clips(&self) -> Vec<ClipSpec> {
        let n = self.chain.len();
        (0..n / 2)
            .map(|i| ClipSpec {
                prefix: self.chain[2 * i].clone(),
                part: self.chain[2 * i + 1].clone(),
                suffix: self.chain[(2 * i + 2) % n].clone(),
            })
            .collect()
    }
}

pub fn find_part<'a>(parts: &'a [Part], name: &str) -> Option<&'a Part> {
    parts.iter().find(|p| p.name == name)
}

fn well_format() -> Regex {
    Regex::new(r"^[A-H][0-9]{1,2}$").unwrap()
}

fn check_well(grid: &WellGrid, well: &str, context: &str) -> Result<(), PlanError> {
    if !well_format().is_match(well) || !grid.contains(well) {
        return Err(PlanError::Schema(format!(
            "{context}: '{well}' is not an address on the {} plate",
            grid.name()
        )));
    }
    Ok(())
}

// Cells come in with stray whitespace and the odd UTF-8 BOM from
// spreadsheet exports.
fn clean_row(record: &csv::StringRecord) -> Vec<String> {
    record
        .iter()
        .map(|cell| cell.trim().trim_start_matches('\u{feff}').to_string())
        .filter(|cell| !cell.is_empty())
        .collect()
}

fn csv_rows<R: Read>(reader: R, has_headers: bool) -> Result<Vec<Vec<String>>, PlanError> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(has_headers)
        .flexible(true)
        .from_reader(reader);
    let mut rows = vec![];
    for record in rdr.records() {
        let row = clean_row(&record?);
        if !row.is_empty() {
            rows.push(row);
        }
    }
    Ok(rows)
}

// Part tables: one row per part, `name, well[, concentration]`, one file per
// source plate, at most three plates on the deck.
pub fn parse_parts<R: Read>(readers: Vec<R>, grid: &WellGrid) -> Result<Vec<Part>, PlanError> {
    if readers.is_empty() {
        return Err(PlanError::Schema("no part table supplied".to_string()));
    }
    if readers.len() > SOURCE_PLATE_SLOTS.len() {
        return Err(PlanError::Schema(format!(
            "{} part tables supplied, the deck holds at most {} source plates",
            readers.len(),
            SOURCE_PLATE_SLOTS.len()
        )));
    }
    let mut parts = vec![];
    for (file_index, reader) in readers.into_iter().enumerate() {
        let plate = SOURCE_PLATE_SLOTS[file_index];
        for row in csv_rows(reader, true)? {
            if row.len() < 2 || row.len() > 3 {
                return Err(PlanError::Schema(format!(
                    "part row {row:?} must be 'name, well[, concentration]'"
                )));
            }
            check_well(grid, &row[1], &format!("part '{}'", row[0]))?;
            let concentration = match row.get(2) {
                Some(cell) => Some(cell.parse::<f64>().map_err(|_| {
                    PlanError::Schema(format!(
                        "part '{}': concentration '{cell}' is not a number",
                        row[0]
                    ))
                })?),
                None => None,
            };
            parts.push(Part {
                name: row[0].clone(),
                well: row[1].clone(),
                plate: plate.to_string(),
                concentration,
            });
        }
    }
    Ok(parts)
}

// Restriction-ligation construct table: `name, well, upstream, downstream,
// plasmid`.
pub fn parse_insert_constructs<R: Read>(
    reader: R,
    grid: &WellGrid,
) -> Result<Vec<InsertConstruct>, PlanError> {
    let mut constructs = vec![];
    for row in csv_rows(reader, true)? {
        if row.len() != 5 {
            return Err(PlanError::Schema(format!(
                "construct row {row:?} must be 'name, well, upstream, downstream, plasmid'"
            )));
        }
        check_well(grid, &row[1], &format!("construct '{}'", row[0]))?;
        constructs.push(InsertConstruct {
            name: row[0].clone(),
            well: row[1].clone(),
            upstream: row[2].clone(),
            downstream: row[3].clone(),
            plasmid: row[4].clone(),
        });
    }
    if constructs.is_empty() {
        return Err(PlanError::Schema("construct table is empty".to_string()));
    }
    Ok(constructs)
}

// Linker-ligation construct table: `name, well, linker, part, linker, part,
// ...`.
pub fn parse_linker_constructs<R: Read>(
    reader: R,
    grid: &WellGrid,
) -> Result<Vec<LinkerConstruct>, PlanError> {
    let mut constructs = vec![];
    for row in csv_rows(reader, true)? {
        if row.len() < 4 {
            return Err(PlanError::Schema(format!(
                "construct row {row:?} must be 'name, well' followed by a linker/part chain"
            )));
        }
        let chain: Vec<String> = row[2..].to_vec();
        if chain.len() % 2 != 0 {
            return Err(PlanError::Schema(format!(
                "construct '{}': chain of {} entries does not alternate linker/part",
                row[0],
                chain.len()
            )));
        }
        check_well(grid, &row[1], &format!("construct '{}'", row[0]))?;
        constructs.push(LinkerConstruct {
            name: row[0].clone(),
            well: row[1].clone(),
            chain,
        });
    }
    if constructs.is_empty() {
        return Err(PlanError::Schema("construct table is empty".to_string()));
    }
    Ok(constructs)
}

// Combinatorial construct table: `name, part, part, ...` with no header row.
pub fn parse_combinations<R: Read>(reader: R) -> Result<Vec<Combination>, PlanError> {
    let mut combinations = vec![];
    for row in csv_rows(reader, false)? {
        if row.len() < 3 {
            return Err(PlanError::Schema(format!(
                "combination row {row:?} needs a name and at least two parts"
            )));
        }
        combinations.push(Combination {
            name: row[0].clone(),
            parts: row[1..].to_vec(),
        });
    }
    if combinations.is_empty() {
        return Err(PlanError::Schema("combination table is empty".to_string()));
    }
    Ok(combinations)
}

// Combinatorial part input is a plate map: the cell at row R, column C names
// the part sitting in well `<R><C>` of the source plate.
pub fn parse_plate_map<R: Read>(reader: R, plate: &str) -> Result<Vec<Part>, PlanError> {
    let letters = ["A", "B", "C", "D", "E", "F", "G", "H"];
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);
    let mut parts = vec![];
    let mut row_index = 0;
    for record in rdr.records() {
        let record = record?;
        if record.iter().all(|cell| cell.trim().is_empty()) {
            continue;
        }
        if row_index >= letters.len() {
            return Err(PlanError::Schema(format!(
                "plate map '{plate}' has more than {} rows",
                letters.len()
            )));
        }
        for (col_index, cell) in record.iter().enumerate() {
            let name = cell.trim().trim_start_matches('\u{feff}');
            if name.is_empty() {
                continue;
            }
            if col_index >= 12 {
                return Err(PlanError::Schema(format!(
                    "plate map '{plate}' has more than 12 columns"
                )));
            }
            parts.push(Part {
                name: name.to_string(),
                well: format!("{}{}", letters[row_index], col_index + 1),
                plate: plate.to_string(),
                concentration: None,
            });
        }
        row_index += 1;
    }
    if parts.is_empty() {
        return Err(PlanError::Schema(format!("plate map '{plate}' is empty")));
    }
    Ok(parts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plate::Traversal;

    fn grid() -> WellGrid {
        WellGrid::plate_96("Source", Traversal::RowMajor)
    }

    #[test]
    fn test_parse_parts_defaults_concentration() {
        let csv = "name,well,concentration\nBBa_B0034,A4\nBBa_C0040,A5,250\n";
        let parts = parse_parts(vec![csv.as_bytes()], &grid()).unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].name, "BBa_B0034");
        assert_eq!(parts[0].concentration, None);
        assert_eq!(parts[0].plate, "2");
        assert_eq!(parts[1].concentration, Some(250.0));
    }

    #[test]
    fn test_parse_parts_second_file_next_slot() {
        let a = "name,well\np1,A1\n";
        let b = "name,well\np2,B1\n";
        let parts = parse_parts(vec![a.as_bytes(), b.as_bytes()], &grid()).unwrap();
        assert_eq!(parts[0].plate, "2");
        assert_eq!(parts[1].plate, "5");
    }

    #[test]
    fn test_parse_parts_rejects_bad_well() {
        let csv = "name,well\np1,Z9\n";
        let err = parse_parts(vec![csv.as_bytes()], &grid()).unwrap_err();
        assert!(matches!(err, PlanError::Schema(_)));
    }

    #[test]
    fn test_parse_insert_constructs() {
        let csv = "name,well,upstream,downstream,plasmid\n\
                   construct1,A1,BBa_B0034,BBa_C0040,BBa_pSB1AK3\n";
        let constructs = parse_insert_constructs(csv.as_bytes(), &grid()).unwrap();
        assert_eq!(constructs.len(), 1);
        assert_eq!(constructs[0].plasmid, "BBa_pSB1AK3");
    }

    #[test]
    fn test_parse_insert_constructs_rejects_missing_role() {
        let csv = "name,well,upstream,downstream,plasmid\nconstruct1,A1,BBa_B0034,BBa_C0040\n";
        let err = parse_insert_constructs(csv.as_bytes(), &grid()).unwrap_err();
        assert!(matches!(err, PlanError::Schema(_)));
    }

    #[test]
    fn test_parse_linker_constructs() {
        let csv = "name,well,chain\n\
                   c1,A1,LMS,dummyBackbone,LMP,Pro,L1,RBS,L2,CDS,L3,Ter\n";
        let constructs = parse_linker_constructs(csv.as_bytes(), &grid()).unwrap();
        assert_eq!(constructs[0].chain.len(), 10);
        assert_eq!(constructs[0].chain[0], "LMS");
        assert_eq!(constructs[0].chain[9], "Ter");
    }

    #[test]
    fn test_parse_linker_constructs_rejects_odd_chain() {
        let csv = "name,well,chain\nc1,A1,LMS,partA,LMP,partB\nc2,A2,LMS,partA,LMP\n";
        let err = parse_linker_constructs(csv.as_bytes(), &grid()).unwrap_err();
        assert!(matches!(err, PlanError::Schema(_)));
    }

    #[test]
    fn test_parse_combinations_skips_blank_rows() {
        let csv = "combo1,pA,pB\n\ncombo2,pA,pC,pD\n";
        let combinations = parse_combinations(csv.as_bytes()).unwrap();
        assert_eq!(combinations.len(), 2);
        assert_eq!(combinations[1].parts, vec!["pA", "pC", "pD"]);
    }

    #[test]
    fn test_parse_combinations_rejects_single_part() {
        let csv = "combo1,pA\n";
        assert!(matches!(
            parse_combinations(csv.as_bytes()),
            Err(PlanError::Schema(_))
        ));
    }

    #[test]
    fn test_chain_clips_wrap_around() {
        let construct = LinkerConstruct {
            name: "c1".to_string(),
            well: "A1".to_string(),
            chain: ["LMS", "dummyBackbone", "LMP", "Pro", "L1", "RBS"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        };
        let clips = construct.clips();
        assert_eq!(clips.len(), 3);
        assert_eq!(clips[0].prefix, "LMS");
        assert_eq!(clips[0].part, "dummyBackbone");
        assert_eq!(clips[0].suffix, "LMP");
        assert_eq!(clips[2].part, "RBS");
        assert_eq!(clips[2].suffix, "LMS");
    }

    #[test]
    fn test_parse_plate_map() {
        let csv = "pA,pB\n,pC\n";
        let parts = parse_plate_map(csv.as_bytes(), "dna_plate").unwrap();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0].well, "A1");
        assert_eq!(parts[1].well, "A2");
        assert_eq!(parts[2].well, "B2");
    }
}
