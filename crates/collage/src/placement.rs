use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{Asset, CollageError, Grid, Result, Slot};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetVariant {
    /// Animated rendering, tagged with the asset's motion name.
    Motion,
    /// Static profile picture.
    Profile,
}

/// A collectible listed in the user's asset tray.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnedAsset {
    pub asset_id: String,
    pub name: String,
    pub motion_url: String,
    pub profile_url: String,
    pub motion_tag: String,
}

impl OwnedAsset {
    pub fn image_url(&self, variant: AssetVariant) -> &str {
        match variant {
            AssetVariant::Motion => &self.motion_url,
            AssetVariant::Profile => &self.profile_url,
        }
    }
}

/// What travels from drag start to drop. The same shape is used whether the
/// drag starts in the tray or on another grid cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DragPayload {
    pub image_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub motion_tag: Option<String>,
    pub asset_id: String,
}

impl DragPayload {
    pub fn encode(&self) -> String {
        // Plain string fields only; serialization cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }

    pub fn decode(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).map_err(|e| CollageError::InvalidPayload(e.to_string()))
    }

    pub fn into_asset(self) -> Asset {
        Asset {
            image_url: self.image_url,
            motion_tag: self.motion_tag,
            asset_id: self.asset_id,
        }
    }
}

impl From<&Asset> for DragPayload {
    fn from(asset: &Asset) -> Self {
        Self {
            image_url: asset.image_url.clone(),
            motion_tag: asset.motion_tag.clone(),
            asset_id: asset.asset_id.clone(),
        }
    }
}

pub fn begin_drag(asset: &OwnedAsset, variant: AssetVariant) -> DragPayload {
    DragPayload {
        image_url: asset.image_url(variant).to_string(),
        motion_tag: match variant {
            AssetVariant::Motion => Some(asset.motion_tag.clone()),
            AssetVariant::Profile => None,
        },
        asset_id: asset.asset_id.clone(),
    }
}

/// Picks up the asset of an occupied cell for rearranging. Dropping it
/// elsewhere copies; the source cell is left as is.
pub fn drag_from_cell(grid: &Grid, row: usize, column: usize) -> Option<DragPayload> {
    grid.asset_at(row, column).map(DragPayload::from)
}

/// Last drop wins: an occupied target is overwritten.
pub fn drop_on_cell(grid: &mut Grid, row: usize, column: usize, payload: DragPayload) -> Result<Slot> {
    debug!(row, column, asset = %payload.asset_id, "drop on cell");
    grid.place(row, column, payload.into_asset())
}

pub fn click_to_clear(grid: &mut Grid, row: usize, column: usize) -> Result<Slot> {
    grid.clear(row, column)
}

/// Tray click: fills the first empty cell in row-major order.
pub fn place_next(grid: &mut Grid, payload: DragPayload) -> Result<(usize, usize)> {
    let (row, column) = grid.first_empty().ok_or(CollageError::GridFull)?;
    grid.place(row, column, payload.into_asset())?;
    Ok((row, column))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum PlacementCommand {
    Drop {
        row: usize,
        column: usize,
        payload: DragPayload,
    },
    Clear {
        row: usize,
        column: usize,
    },
    PlaceNext {
        payload: DragPayload,
    },
    Restore {
        row: usize,
        column: usize,
        slot: Slot,
    },
}

/// Applies `command` and returns the command that undoes it.
pub fn apply_placement(grid: &mut Grid, command: PlacementCommand) -> Result<PlacementCommand> {
    match command {
        PlacementCommand::Drop {
            row,
            column,
            payload,
        } => {
            let slot = drop_on_cell(grid, row, column, payload)?;
            Ok(PlacementCommand::Restore { row, column, slot })
        }
        PlacementCommand::Clear { row, column } => {
            let slot = click_to_clear(grid, row, column)?;
            Ok(PlacementCommand::Restore { row, column, slot })
        }
        PlacementCommand::PlaceNext { payload } => {
            let (row, column) = place_next(grid, payload)?;
            Ok(PlacementCommand::Clear { row, column })
        }
        PlacementCommand::Restore { row, column, slot } => {
            let previous = match slot {
                Slot::Empty => grid.clear(row, column)?,
                Slot::Occupied(asset) => grid.place(row, column, asset)?,
            };
            Ok(PlacementCommand::Restore {
                row,
                column,
                slot: previous,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owned(id: &str) -> OwnedAsset {
        OwnedAsset {
            asset_id: id.to_string(),
            name: format!("Claynosaurz #{id}"),
            motion_url: format!("https://cdn.example/{id}.gif"),
            profile_url: format!("https://cdn.example/{id}.png"),
            motion_tag: "idle".to_string(),
        }
    }

    #[test]
    fn test_begin_drag_tracks_variant() {
        let rex = owned("42");
        let motion = begin_drag(&rex, AssetVariant::Motion);
        assert_eq!(motion.image_url, "https://cdn.example/42.gif");
        assert_eq!(motion.motion_tag.as_deref(), Some("idle"));
        assert_eq!(motion.asset_id, "42");

        let profile = begin_drag(&rex, AssetVariant::Profile);
        assert_eq!(profile.image_url, "https://cdn.example/42.png");
        assert_eq!(profile.motion_tag, None);
    }

    #[test]
    fn test_begin_drag_does_not_touch_grid() {
        let grid = Grid::new(2, 2).unwrap();
        let before = grid.clone();
        let _ = begin_drag(&owned("1"), AssetVariant::Motion);
        assert_eq!(grid, before);
    }

    #[test]
    fn test_drop_overwrites_occupied_cell() {
        let mut grid = Grid::new(2, 3).unwrap();
        drop_on_cell(&mut grid, 0, 1, begin_drag(&owned("1"), AssetVariant::Motion)).unwrap();
        let replaced =
            drop_on_cell(&mut grid, 0, 1, begin_drag(&owned("2"), AssetVariant::Profile)).unwrap();

        assert_eq!(replaced.asset().map(|a| a.asset_id.as_str()), Some("1"));
        assert_eq!(grid.asset_at(0, 1).unwrap().asset_id, "2");
        assert!(grid.occupied().all(|(_, _, a)| a.asset_id != "1"));
    }

    #[test]
    fn test_rearranging_copies_instead_of_moving() {
        let mut grid = Grid::new(2, 2).unwrap();
        drop_on_cell(&mut grid, 0, 0, begin_drag(&owned("1"), AssetVariant::Motion)).unwrap();

        let payload = drag_from_cell(&grid, 0, 0).unwrap();
        drop_on_cell(&mut grid, 1, 1, payload).unwrap();

        assert_eq!(grid.asset_at(0, 0), grid.asset_at(1, 1));
        assert_eq!(grid.occupied().count(), 2);
        assert!(drag_from_cell(&grid, 0, 1).is_none());
    }

    #[test]
    fn test_drop_out_of_bounds_is_rejected() {
        let mut grid = Grid::new(1, 1).unwrap();
        let err = drop_on_cell(&mut grid, 0, 1, begin_drag(&owned("1"), AssetVariant::Motion));
        assert!(matches!(err, Err(CollageError::OutOfBounds { .. })));
        assert_eq!(grid.occupied().count(), 0);
    }

    #[test]
    fn test_click_to_clear() {
        let mut grid = Grid::new(1, 2).unwrap();
        drop_on_cell(&mut grid, 0, 1, begin_drag(&owned("1"), AssetVariant::Motion)).unwrap();
        click_to_clear(&mut grid, 0, 1).unwrap();
        assert!(grid.asset_at(0, 1).is_none());
    }

    #[test]
    fn test_place_next_until_full() {
        let mut grid = Grid::new(1, 2).unwrap();
        let payload = begin_drag(&owned("1"), AssetVariant::Motion);
        assert_eq!(place_next(&mut grid, payload.clone()).unwrap(), (0, 0));
        assert_eq!(place_next(&mut grid, payload.clone()).unwrap(), (0, 1));
        assert_eq!(place_next(&mut grid, payload), Err(CollageError::GridFull));
    }

    #[test]
    fn test_payload_string_transport() {
        let payload = begin_drag(&owned("7"), AssetVariant::Motion);
        let raw = payload.encode();
        assert_eq!(DragPayload::decode(&raw).unwrap(), payload);
        assert!(matches!(
            DragPayload::decode("https://cdn.example/7.gif"),
            Err(CollageError::InvalidPayload(_))
        ));
    }

    #[test]
    fn test_apply_placement_inverse_restores_previous_state() {
        let mut grid = Grid::new(2, 2).unwrap();
        apply_placement(
            &mut grid,
            PlacementCommand::Drop {
                row: 1,
                column: 0,
                payload: begin_drag(&owned("1"), AssetVariant::Motion),
            },
        )
        .unwrap();
        let before = grid.clone();

        let undo = apply_placement(
            &mut grid,
            PlacementCommand::Drop {
                row: 1,
                column: 0,
                payload: begin_drag(&owned("2"), AssetVariant::Profile),
            },
        )
        .unwrap();
        assert_ne!(grid, before);
        apply_placement(&mut grid, undo).unwrap();
        assert_eq!(grid, before);

        let undo = apply_placement(
            &mut grid,
            PlacementCommand::PlaceNext {
                payload: begin_drag(&owned("3"), AssetVariant::Motion),
            },
        )
        .unwrap();
        assert_eq!(undo, PlacementCommand::Clear { row: 0, column: 0 });
        apply_placement(&mut grid, undo).unwrap();
        assert_eq!(grid, before);
    }
}
