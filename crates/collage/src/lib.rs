use thiserror::Error;

mod grid;
pub use grid::*;
mod placement;
pub use placement::*;
mod settings;
pub use settings::*;
mod session;
pub use session::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Rows,
    Columns,
    BorderWidth,
}

impl std::fmt::Display for Axis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Rows => write!(f, "rows"),
            Self::Columns => write!(f, "columns"),
            Self::BorderWidth => write!(f, "border width"),
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum CollageError {
    #[error("invalid {axis}: {value} (allowed {min}..={max})")]
    InvalidDimension {
        axis: Axis,
        value: usize,
        min: usize,
        max: usize,
    },
    #[error("cell ({row}, {column}) is outside the {rows}x{columns} grid")]
    OutOfBounds {
        row: usize,
        column: usize,
        rows: usize,
        columns: usize,
    },
    #[error("invalid border color: {0}")]
    InvalidColor(String),
    #[error("malformed grid: {0}")]
    MalformedGrid(String),
    #[error("invalid drag payload: {0}")]
    InvalidPayload(String),
    #[error("no empty cell left in the grid")]
    GridFull,
    #[error("history empty: {0}")]
    HistoryEmpty(&'static str),
}

pub type Result<T> = std::result::Result<T, CollageError>;

pub const MIN_ROWS: usize = 1;
pub const MAX_ROWS: usize = 10;
pub const MIN_COLUMNS: usize = 1;
pub const MAX_COLUMNS: usize = 8;
pub const MAX_BORDER_WIDTH: usize = 8;

pub(crate) fn check_range(axis: Axis, value: usize, min: usize, max: usize) -> Result<()> {
    if value < min || value > max {
        return Err(CollageError::InvalidDimension {
            axis,
            value,
            min,
            max,
        });
    }
    Ok(())
}
