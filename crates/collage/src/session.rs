use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    apply_placement, CollageError, CollageSettings, DragPayload, Grid, PlacementCommand, Result,
};

/// One user's editing session: the grid plus the settings that shape it.
///
/// Column and row changes go through here so the grid is resized in the
/// same call that updates the settings. Placements are recorded as inverse
/// commands for undo; any resize drops that history. The history is saved
/// with the session so undo works across reloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "SessionRepr")]
pub struct CollageSession {
    settings: CollageSettings,
    grid: Grid,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    history: Vec<PlacementCommand>,
}

impl CollageSession {
    pub fn new(settings: CollageSettings) -> Result<Self> {
        let grid = Grid::new(settings.rows(), settings.columns())?;
        Ok(Self {
            settings,
            grid,
            history: Vec::new(),
        })
    }

    pub fn settings(&self) -> &CollageSettings {
        &self.settings
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn set_columns(&mut self, columns: usize) -> Result<()> {
        if columns == self.settings.columns() {
            return Ok(());
        }
        let mut next = self.settings.clone();
        next.set_columns(columns)?;
        self.grid.resize_columns(columns)?;
        self.settings = next;
        self.history.clear();
        Ok(())
    }

    pub fn set_rows(&mut self, rows: usize) -> Result<()> {
        if rows == self.settings.rows() {
            return Ok(());
        }
        let mut next = self.settings.clone();
        next.set_rows(rows)?;
        self.grid.resize_rows(rows)?;
        self.settings = next;
        self.history.clear();
        Ok(())
    }

    pub fn set_border_width(&mut self, width: usize) -> Result<()> {
        self.settings.set_border_width(width)
    }

    pub fn set_border_color(&mut self, color: impl Into<String>) -> Result<()> {
        self.settings.set_border_color(color)
    }

    pub fn set_overlay_enabled(&mut self, enabled: bool) {
        self.settings.set_overlay_enabled(enabled);
    }

    pub fn apply(&mut self, command: PlacementCommand) -> Result<()> {
        let inverse = apply_placement(&mut self.grid, command)?;
        self.history.push(inverse);
        Ok(())
    }

    pub fn drop_on_cell(&mut self, row: usize, column: usize, payload: DragPayload) -> Result<()> {
        self.apply(PlacementCommand::Drop {
            row,
            column,
            payload,
        })
    }

    pub fn clear_cell(&mut self, row: usize, column: usize) -> Result<()> {
        self.apply(PlacementCommand::Clear { row, column })
    }

    pub fn place_next(&mut self, payload: DragPayload) -> Result<()> {
        self.apply(PlacementCommand::PlaceNext { payload })
    }

    pub fn can_undo(&self) -> bool {
        !self.history.is_empty()
    }

    pub fn undo(&mut self) -> Result<()> {
        let inverse = self
            .history
            .last()
            .cloned()
            .ok_or(CollageError::HistoryEmpty("placement"))?;
        debug!(?inverse, "undo placement");
        apply_placement(&mut self.grid, inverse)?;
        self.history.pop();
        Ok(())
    }

    /// Owned copies of the grid and settings for job submission or saving.
    pub fn snapshot(&self) -> (Grid, CollageSettings) {
        (self.grid.clone(), self.settings.clone())
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| CollageError::MalformedGrid(e.to_string()))
    }

    pub fn from_json(blob: &str) -> Result<Self> {
        serde_json::from_str(blob).map_err(|e| CollageError::MalformedGrid(e.to_string()))
    }
}

impl Default for CollageSession {
    fn default() -> Self {
        let settings = CollageSettings::default();
        let grid = Grid::default();
        Self {
            settings,
            grid,
            history: Vec::new(),
        }
    }
}

#[derive(Deserialize)]
struct SessionRepr {
    settings: CollageSettings,
    grid: Grid,
    #[serde(default)]
    history: Vec<PlacementCommand>,
}

impl TryFrom<SessionRepr> for CollageSession {
    type Error = CollageError;

    fn try_from(repr: SessionRepr) -> Result<Self> {
        let (rows, columns) = (repr.grid.rows(), repr.grid.columns());
        if rows != repr.settings.rows() || columns != repr.settings.columns() {
            return Err(CollageError::MalformedGrid(format!(
                "grid is {rows}x{columns} but settings say {}x{}",
                repr.settings.rows(),
                repr.settings.columns()
            )));
        }
        Ok(Self {
            settings: repr.settings,
            grid: repr.grid,
            history: repr.history,
        })
    }
}
