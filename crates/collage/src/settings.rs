use serde::{Deserialize, Serialize};

use crate::{
    check_range, Axis, CollageError, Result, MAX_BORDER_WIDTH, MAX_COLUMNS, MAX_ROWS, MIN_COLUMNS,
    MIN_ROWS,
};

pub const DEFAULT_COLUMNS: usize = 3;
pub const DEFAULT_ROWS: usize = 2;
pub const DEFAULT_BORDER_WIDTH: usize = 2;
pub const DEFAULT_BORDER_COLOR: &str = "#000000";

/// Render parameters sent along with the grid.
///
/// Every setter validates before writing, so a rejected value leaves the
/// previous one in place. `columns`/`rows` must track the grid's shape;
/// [`crate::CollageSession`] keeps the two in lockstep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "SettingsRepr")]
pub struct CollageSettings {
    columns: usize,
    rows: usize,
    border_width: usize,
    border_color: String,
    overlay_enabled: bool,
}

impl CollageSettings {
    pub fn columns(&self) -> usize {
        self.columns
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn border_width(&self) -> usize {
        self.border_width
    }

    pub fn border_color(&self) -> &str {
        &self.border_color
    }

    pub fn overlay_enabled(&self) -> bool {
        self.overlay_enabled
    }

    /// The logo overlay is only rendered on multi-row collages; the flag is
    /// kept either way.
    pub fn overlay_applies(&self) -> bool {
        self.overlay_enabled && self.rows > 1
    }

    pub fn set_columns(&mut self, columns: usize) -> Result<()> {
        check_range(Axis::Columns, columns, MIN_COLUMNS, MAX_COLUMNS)?;
        self.columns = columns;
        Ok(())
    }

    pub fn set_rows(&mut self, rows: usize) -> Result<()> {
        check_range(Axis::Rows, rows, MIN_ROWS, MAX_ROWS)?;
        self.rows = rows;
        Ok(())
    }

    pub fn set_border_width(&mut self, width: usize) -> Result<()> {
        check_range(Axis::BorderWidth, width, 0, MAX_BORDER_WIDTH)?;
        self.border_width = width;
        Ok(())
    }

    pub fn set_border_color(&mut self, color: impl Into<String>) -> Result<()> {
        let color = color.into();
        validate_color(&color)?;
        self.border_color = color;
        Ok(())
    }

    pub fn set_overlay_enabled(&mut self, enabled: bool) {
        self.overlay_enabled = enabled;
    }
}

impl Default for CollageSettings {
    fn default() -> Self {
        Self {
            columns: DEFAULT_COLUMNS,
            rows: DEFAULT_ROWS,
            border_width: DEFAULT_BORDER_WIDTH,
            border_color: DEFAULT_BORDER_COLOR.to_string(),
            overlay_enabled: false,
        }
    }
}

/// Accepts `#rgb`, `#rgba`, `#rrggbb` and `#rrggbbaa`.
pub fn validate_color(color: &str) -> Result<()> {
    let valid = color
        .strip_prefix('#')
        .filter(|hex| matches!(hex.len(), 3 | 4 | 6 | 8))
        .is_some_and(|hex| hex.chars().all(|c| c.is_ascii_hexdigit()));
    if valid {
        Ok(())
    } else {
        Err(CollageError::InvalidColor(color.to_string()))
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SettingsRepr {
    columns: usize,
    rows: usize,
    border_width: usize,
    border_color: String,
    #[serde(default)]
    overlay_enabled: bool,
}

impl TryFrom<SettingsRepr> for CollageSettings {
    type Error = CollageError;

    fn try_from(repr: SettingsRepr) -> Result<Self> {
        let mut settings = CollageSettings::default();
        settings.set_columns(repr.columns)?;
        settings.set_rows(repr.rows)?;
        settings.set_border_width(repr.border_width)?;
        settings.set_border_color(repr.border_color)?;
        settings.set_overlay_enabled(repr.overlay_enabled);
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = CollageSettings::default();
        assert_eq!(settings.columns(), 3);
        assert_eq!(settings.rows(), 2);
        assert_eq!(settings.border_width(), 2);
        assert_eq!(settings.border_color(), "#000000");
        assert!(!settings.overlay_enabled());
    }

    #[test]
    fn test_setters_reject_out_of_range() {
        let mut settings = CollageSettings::default();
        assert!(settings.set_columns(0).is_err());
        assert!(settings.set_columns(9).is_err());
        assert!(settings.set_rows(11).is_err());
        assert!(settings.set_border_width(9).is_err());
        assert_eq!(settings, CollageSettings::default());

        settings.set_columns(8).unwrap();
        settings.set_rows(10).unwrap();
        settings.set_border_width(0).unwrap();
        assert_eq!((settings.columns(), settings.rows(), settings.border_width()), (8, 10, 0));
    }

    #[test]
    fn test_border_color_validation() {
        let mut settings = CollageSettings::default();
        for ok in ["#fff", "#FFFA", "#10b981", "#10b98180"] {
            settings.set_border_color(ok).unwrap();
            assert_eq!(settings.border_color(), ok);
        }
        for bad in ["", "10b981", "#12", "#ggg", "red"] {
            assert_eq!(
                settings.set_border_color(bad),
                Err(CollageError::InvalidColor(bad.to_string()))
            );
        }
        assert_eq!(settings.border_color(), "#10b98180");
    }

    #[test]
    fn test_overlay_needs_more_than_one_row() {
        let mut settings = CollageSettings::default();
        settings.set_overlay_enabled(true);
        assert!(settings.overlay_applies());

        settings.set_rows(1).unwrap();
        assert!(settings.overlay_enabled());
        assert!(!settings.overlay_applies());
    }

    #[test]
    fn test_wire_format_and_validation_on_load() {
        let json = serde_json::to_value(CollageSettings::default()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "columns": 3,
                "rows": 2,
                "borderWidth": 2,
                "borderColor": "#000000",
                "overlayEnabled": false
            })
        );

        let bad = r##"{"columns":12,"rows":2,"borderWidth":2,"borderColor":"#000"}"##;
        assert!(serde_json::from_str::<CollageSettings>(bad).is_err());
    }
}
