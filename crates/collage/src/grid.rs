use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    check_range, Axis, CollageError, Result, MAX_COLUMNS, MAX_ROWS, MIN_COLUMNS, MIN_ROWS,
};

/// Reference to one image variant of a user-owned asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    pub image_url: String,
    /// Set when the motion rendering was placed, absent for the static profile image.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub motion_tag: Option<String>,
    pub asset_id: String,
}

impl Asset {
    pub fn new(asset_id: impl Into<String>, image_url: impl Into<String>) -> Self {
        Self {
            image_url: image_url.into(),
            motion_tag: None,
            asset_id: asset_id.into(),
        }
    }

    pub fn with_motion_tag(mut self, tag: impl Into<String>) -> Self {
        self.motion_tag = Some(tag.into());
        self
    }
}

/// Content of a grid cell. Serialized as `null` or an asset object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Option<Asset>", into = "Option<Asset>")]
pub enum Slot {
    #[default]
    Empty,
    Occupied(Asset),
}

impl Slot {
    pub fn is_empty(&self) -> bool {
        matches!(self, Slot::Empty)
    }

    pub fn asset(&self) -> Option<&Asset> {
        match self {
            Slot::Empty => None,
            Slot::Occupied(asset) => Some(asset),
        }
    }
}

impl From<Option<Asset>> for Slot {
    fn from(value: Option<Asset>) -> Self {
        value.map_or(Slot::Empty, Slot::Occupied)
    }
}

impl From<Slot> for Option<Asset> {
    fn from(value: Slot) -> Self {
        match value {
            Slot::Empty => None,
            Slot::Occupied(asset) => Some(asset),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cell {
    /// Column position within the row. Restarts at 0 on every row.
    pub index: usize,
    #[serde(rename = "asset", default)]
    pub slot: Slot,
}

impl Cell {
    pub fn empty(index: usize) -> Self {
        Self {
            index,
            slot: Slot::Empty,
        }
    }

    pub fn asset(&self) -> Option<&Asset> {
        self.slot.asset()
    }
}

fn empty_row(columns: usize) -> Vec<Cell> {
    (0..columns).map(Cell::empty).collect()
}

/// Rectangular placement grid.
///
/// Every row has the same number of cells, the grid is never smaller than
/// 1x1, and each cell's `index` equals its column. Resizing only appends
/// empty cells or drops trailing ones, so any cell still in bounds keeps
/// its asset. Failed operations leave the grid untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Vec<Cell>>", into = "Vec<Vec<Cell>>")]
pub struct Grid {
    cells: Vec<Vec<Cell>>,
}

impl Grid {
    pub fn new(rows: usize, columns: usize) -> Result<Self> {
        check_range(Axis::Rows, rows, MIN_ROWS, MAX_ROWS)?;
        check_range(Axis::Columns, columns, MIN_COLUMNS, MAX_COLUMNS)?;
        Ok(Self {
            cells: (0..rows).map(|_| empty_row(columns)).collect(),
        })
    }

    pub fn rows(&self) -> usize {
        self.cells.len()
    }

    pub fn columns(&self) -> usize {
        self.cells.first().map_or(0, Vec::len)
    }

    pub fn resize_rows(&mut self, rows: usize) -> Result<()> {
        check_range(Axis::Rows, rows, MIN_ROWS, MAX_ROWS)?;
        let current = self.rows();
        let columns = self.columns();
        if rows > current {
            self.cells.extend((current..rows).map(|_| empty_row(columns)));
        } else {
            self.cells.truncate(rows);
        }
        debug!(from = current, to = rows, "resized grid rows");
        Ok(())
    }

    pub fn resize_columns(&mut self, columns: usize) -> Result<()> {
        check_range(Axis::Columns, columns, MIN_COLUMNS, MAX_COLUMNS)?;
        let current = self.columns();
        for row in self.cells.iter_mut() {
            if columns > row.len() {
                let start = row.len();
                row.extend((start..columns).map(Cell::empty));
            } else {
                row.truncate(columns);
            }
        }
        debug!(from = current, to = columns, "resized grid columns");
        Ok(())
    }

    fn check_cell(&self, row: usize, column: usize) -> Result<()> {
        if row >= self.rows() || column >= self.columns() {
            return Err(CollageError::OutOfBounds {
                row,
                column,
                rows: self.rows(),
                columns: self.columns(),
            });
        }
        Ok(())
    }

    /// Puts `asset` into the cell, returning what was there before.
    pub fn place(&mut self, row: usize, column: usize, asset: Asset) -> Result<Slot> {
        self.check_cell(row, column)?;
        let cell = &mut self.cells[row][column];
        Ok(std::mem::replace(&mut cell.slot, Slot::Occupied(asset)))
    }

    pub fn clear(&mut self, row: usize, column: usize) -> Result<Slot> {
        self.check_cell(row, column)?;
        let cell = &mut self.cells[row][column];
        Ok(std::mem::take(&mut cell.slot))
    }

    pub fn cell(&self, row: usize, column: usize) -> Option<&Cell> {
        self.cells.get(row).and_then(|r| r.get(column))
    }

    pub fn asset_at(&self, row: usize, column: usize) -> Option<&Asset> {
        self.cell(row, column).and_then(Cell::asset)
    }

    pub fn iter_rows(&self) -> impl Iterator<Item = &[Cell]> + '_ {
        self.cells.iter().map(Vec::as_slice)
    }

    pub fn occupied(&self) -> impl Iterator<Item = (usize, usize, &Asset)> + '_ {
        self.cells.iter().enumerate().flat_map(|(r, row)| {
            row.iter()
                .enumerate()
                .filter_map(move |(c, cell)| cell.asset().map(|a| (r, c, a)))
        })
    }

    /// 1-based row-major number shown on an empty cell.
    pub fn display_number(&self, row: usize, column: usize) -> Option<usize> {
        self.check_cell(row, column).ok()?;
        Some(row * self.columns() + column + 1)
    }

    pub fn first_empty(&self) -> Option<(usize, usize)> {
        self.cells.iter().enumerate().find_map(|(r, row)| {
            row.iter()
                .position(|cell| cell.slot.is_empty())
                .map(|c| (r, c))
        })
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| CollageError::MalformedGrid(e.to_string()))
    }

    pub fn from_json(blob: &str) -> Result<Self> {
        serde_json::from_str(blob).map_err(|e| CollageError::MalformedGrid(e.to_string()))
    }
}

impl Default for Grid {
    fn default() -> Self {
        Self {
            cells: (0..2).map(|_| empty_row(3)).collect(),
        }
    }
}

impl TryFrom<Vec<Vec<Cell>>> for Grid {
    type Error = CollageError;

    fn try_from(cells: Vec<Vec<Cell>>) -> Result<Self> {
        check_range(Axis::Rows, cells.len(), MIN_ROWS, MAX_ROWS)?;
        let columns = cells[0].len();
        check_range(Axis::Columns, columns, MIN_COLUMNS, MAX_COLUMNS)?;
        for (r, row) in cells.iter().enumerate() {
            if row.len() != columns {
                return Err(CollageError::MalformedGrid(format!(
                    "row {r} has {} cells, expected {columns}",
                    row.len()
                )));
            }
            if let Some((c, cell)) = row.iter().enumerate().find(|(c, cell)| cell.index != *c) {
                return Err(CollageError::MalformedGrid(format!(
                    "cell ({r}, {c}) has index {}",
                    cell.index
                )));
            }
        }
        Ok(Self { cells })
    }
}

impl From<Grid> for Vec<Vec<Cell>> {
    fn from(grid: Grid) -> Self {
        grid.cells
    }
}
