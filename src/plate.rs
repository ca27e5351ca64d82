// Bounded well grids and free-well allocation.
//
// One parameterized grid replaces the per-plate-size helper functions of
// earlier protocol generators: the 96-well reaction/construct plates (8 rows
// x 12 columns) and the 24-well reagent racks (3 rows x 8 columns) only
// differ in dimensions and traversal order.

use crate::error::PlanError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

const ROW_LETTERS: &[u8] = b"ABCDEFGH";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Traversal {
    // A1, A2, ..., A12, B1, ...
    RowMajor,
    // A1, B1, ..., H1, A2, ...
    ColumnMajor,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WellGrid {
    name: String,
    rows: usize,
    cols: usize,
    order: Traversal,
}

impl WellGrid {
    pub fn new(name: &str, rows: usize, cols: usize, order: Traversal) -> Self {
        assert!(rows > 0 && rows <= ROW_LETTERS.len() && cols > 0);
        Self {
            name: name.to_string(),
            rows,
            cols,
            order,
        }
    }

    pub fn plate_96(name: &str, order: Traversal) -> Self {
        Self::new(name, 8, 12, order)
    }

    pub fn rack_24(name: &str) -> Self {
        Self::new(name, 3, 8, Traversal::RowMajor)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn capacity(&self) -> usize {
        self.rows * self.cols
    }

    pub fn well_name(&self, index: usize) -> String {
        let (row, col) = match self.order {
            Traversal::RowMajor => (index / self.cols, index % self.cols),
            Traversal::ColumnMajor => (index % self.rows, index / self.rows),
        };
        format!("{}{}", ROW_LETTERS[row] as char, col + 1)
    }

    pub fn contains(&self, well: &str) -> bool {
        let bytes = well.as_bytes();
        if bytes.len() < 2 {
            return false;
        }
        let row = match ROW_LETTERS.iter().position(|l| *l == bytes[0]) {
            Some(row) => row,
            None => return false,
        };
        let col: usize = match well[1..].parse() {
            Ok(col) => col,
            Err(_) => return false,
        };
        row < self.rows && col >= 1 && col <= self.cols
    }

    // Scans the grid in its traversal order and returns the first address not
    // in `used`. Callers own the used set because most planning steps
    // interleave allocation with other bookkeeping.
    pub fn next_free(&self, used: &HashSet<String>) -> Result<String, PlanError> {
        for i in 0..self.capacity() {
            let well = self.well_name(i);
            if !used.contains(&well) {
                return Ok(well);
            }
        }
        Err(PlanError::WellExhaustion {
            plate: self.name.clone(),
        })
    }

    // Same scan from the last address backwards. Master mix wells of the
    // combinatorial chemistry live at the tail of the reaction plate so they
    // never race the construct wells growing from the front.
    pub fn next_free_from_end(&self, used: &HashSet<String>) -> Result<String, PlanError> {
        for i in (0..self.capacity()).rev() {
            let well = self.well_name(i);
            if !used.contains(&well) {
                return Ok(well);
            }
        }
        Err(PlanError::WellExhaustion {
            plate: self.name.clone(),
        })
    }

    // Allocate and record in one step.
    pub fn allocate(&self, used: &mut HashSet<String>) -> Result<String, PlanError> {
        let well = self.next_free(used)?;
        used.insert(well.clone());
        Ok(well)
    }

    pub fn allocate_from_end(&self, used: &mut HashSet<String>) -> Result<String, PlanError> {
        let well = self.next_free_from_end(used)?;
        used.insert(well.clone());
        Ok(well)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_major_order() {
        let grid = WellGrid::plate_96("Construct", Traversal::RowMajor);
        assert_eq!(grid.well_name(0), "A1");
        assert_eq!(grid.well_name(11), "A12");
        assert_eq!(grid.well_name(12), "B1");
        assert_eq!(grid.well_name(95), "H12");
    }

    #[test]
    fn test_column_major_order() {
        let grid = WellGrid::plate_96("Clip", Traversal::ColumnMajor);
        assert_eq!(grid.well_name(0), "A1");
        assert_eq!(grid.well_name(7), "H1");
        assert_eq!(grid.well_name(8), "A2");
        assert_eq!(grid.well_name(95), "H12");
    }

    #[test]
    fn test_next_free_skips_used() {
        let grid = WellGrid::rack_24("Reagent");
        let mut used = HashSet::new();
        used.insert("A1".to_string());
        used.insert("A3".to_string());
        assert_eq!(grid.next_free(&used).unwrap(), "A2");
        used.insert("A2".to_string());
        assert_eq!(grid.next_free(&used).unwrap(), "A4");
    }

    #[test]
    fn test_rack_24_wraps_after_eight_columns() {
        let grid = WellGrid::rack_24("Reagent");
        assert_eq!(grid.well_name(7), "A8");
        assert_eq!(grid.well_name(8), "B1");
        assert_eq!(grid.well_name(23), "C8");
    }

    #[test]
    fn test_exhaustion_boundary() {
        let grid = WellGrid::rack_24("Reagent");
        let mut used = HashSet::new();
        for _ in 0..24 {
            grid.allocate(&mut used).unwrap();
        }
        assert_eq!(used.len(), 24);
        let err = grid.allocate(&mut used).unwrap_err();
        assert!(matches!(err, PlanError::WellExhaustion { plate } if plate == "Reagent"));
    }

    #[test]
    fn test_allocate_from_end() {
        let grid = WellGrid::plate_96("Reaction", Traversal::ColumnMajor);
        let mut used = HashSet::new();
        assert_eq!(grid.allocate_from_end(&mut used).unwrap(), "H12");
        assert_eq!(grid.allocate_from_end(&mut used).unwrap(), "G12");
    }

    #[test]
    fn test_contains() {
        let grid = WellGrid::rack_24("Reagent");
        assert!(grid.contains("A1"));
        assert!(grid.contains("C8"));
        assert!(!grid.contains("D1"));
        assert!(!grid.contains("A9"));
        assert!(!grid.contains("11"));
        assert!(!grid.contains(""));
    }
}
