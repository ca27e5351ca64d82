// Intermediate reactions: digests for the restriction chemistry, clips for
// the linker chemistry. A reaction feeds at most `ceiling` construct wells;
// the ceiling comes from the reaction's fill volume minus dead volume,
// divided by the per-construct draw.

use crate::error::PlanError;
use crate::plate::WellGrid;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Reaction {
    pub name: String,
    pub role: String,
    pub part: String,
    pub source_well: String,
    pub dest_well: String,
    // Indices into the construct table, in construct order.
    pub consumers: Vec<usize>,
}

// Splits one part/role usage into as many reactions as its consumer count
// requires, filling each reaction up to the ceiling before opening the next,
// and allocates a destination well per reaction. `base_name` distinguishes
// reactions of the same part that differ in more than the role, e.g. clips
// of one part framed by different linkers.
pub fn split_into_reactions(
    base_name: &str,
    role: &str,
    part: &str,
    source_well: &str,
    consumers: &[usize],
    ceiling: usize,
    grid: &WellGrid,
    used: &mut HashSet<String>,
) -> Result<Vec<Reaction>, PlanError> {
    let mut reactions = vec![];
    for (index, chunk) in consumers.chunks(ceiling).enumerate() {
        let dest_well = grid.allocate(used)?;
        reactions.push(Reaction {
            name: format!("{base_name}-{}", index + 1),
            role: role.to_string(),
            part: part.to_string(),
            source_well: source_well.to_string(),
            dest_well,
            consumers: chunk.to_vec(),
        });
    }
    Ok(reactions)
}

pub fn reactions_needed(count: usize, ceiling: usize) -> usize {
    count.div_ceil(ceiling)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plate::Traversal;

    #[test]
    fn test_single_reaction_below_ceiling() {
        let grid = WellGrid::plate_96("Digest", Traversal::RowMajor);
        let mut used = HashSet::new();
        let reactions =
            split_into_reactions(
                "BBa_pSB1AK3-plasmid",
                "plasmid",
                "BBa_pSB1AK3",
                "A6",
                &[0, 1, 2],
                23,
                &grid,
                &mut used,
            )
                .unwrap();
        assert_eq!(reactions.len(), 1);
        assert_eq!(reactions[0].name, "BBa_pSB1AK3-plasmid-1");
        assert_eq!(reactions[0].dest_well, "A1");
        assert_eq!(reactions[0].consumers, vec![0, 1, 2]);
    }

    #[test]
    fn test_split_fills_before_opening_next() {
        let grid = WellGrid::plate_96("Digest", Traversal::RowMajor);
        let mut used = HashSet::new();
        let consumers: Vec<usize> = (0..24).collect();
        let reactions =
            split_into_reactions("part-upstream", "upstream", "part", "A1", &consumers, 23, &grid, &mut used)
                .unwrap();
        assert_eq!(reactions.len(), 2);
        assert_eq!(reactions[0].consumers.len(), 23);
        assert_eq!(reactions[1].consumers.len(), 1);
        assert_eq!(reactions[0].dest_well, "A1");
        assert_eq!(reactions[1].dest_well, "A2");
    }

    #[test]
    fn test_reactions_match_ceiling_division() {
        for count in 1..100 {
            assert_eq!(reactions_needed(count, 23), count.div_ceil(23));
        }
        assert_eq!(reactions_needed(23, 23), 1);
        assert_eq!(reactions_needed(24, 23), 2);
        assert_eq!(reactions_needed(46, 23), 2);
    }

    #[test]
    fn test_allocation_skips_preseeded_wells() {
        let grid = WellGrid::plate_96("Construct", Traversal::RowMajor);
        let mut used: HashSet<String> =
            ["A1", "A2", "A3"].iter().map(|w| w.to_string()).collect();
        let reactions =
            split_into_reactions("part-upstream", "upstream", "part", "B2", &[0], 23, &grid, &mut used)
                .unwrap();
        assert_eq!(reactions[0].dest_well, "A4");
    }

    #[test]
    fn test_exhaustion_is_fatal() {
        let grid = WellGrid::new("Tiny", 1, 2, Traversal::RowMajor);
        let mut used = HashSet::new();
        let consumers: Vec<usize> = (0..3).collect();
        let err = split_into_reactions("part-upstream", "upstream", "part", "A1", &consumers, 1, &grid, &mut used)
            .unwrap_err();
        assert!(matches!(err, PlanError::WellExhaustion { .. }));
    }
}
