//! Grid coordinate to physical LED index mapping.
//!
//! LED strips glued onto a panel are wired as one continuous zig-zag so the
//! data line never needs a long return run. Every other row (or column) is
//! therefore physically reversed, and this module undoes that so the rest of
//! the program can draw in plain `(x, y)` space.
//!
//! ```text
//! rows_snake 4x2, origin top-left:     cols_snake 4x2, origin top-left:
//!
//!   0  1  2  3                            0  3  4  7
//!   7  6  5  4                            1  2  5  6
//! ```
//!
//! ## Rust concepts
//! - Fieldless `enum` dispatched through a single `match`
//! - `FromStr` for parsing configuration strings
//! - Methods that consume `self` and return a new value (pure transitions)

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ── Wiring mode ──────────────────────────────────────────────────────

/// How the strip snakes across the panel.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WiringMode {
    /// Strips run horizontally, one per row, alternating direction.
    #[default]
    RowsSnake,
    /// Strips run vertically, one per column, alternating direction.
    ColsSnake,
}

impl WiringMode {
    /// The other wiring mode.
    pub fn toggled(self) -> Self {
        match self {
            Self::RowsSnake => Self::ColsSnake,
            Self::ColsSnake => Self::RowsSnake,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::RowsSnake => "rows_snake",
            Self::ColsSnake => "cols_snake",
        }
    }
}

impl fmt::Display for WiringMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WiringMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rows_snake" => Ok(Self::RowsSnake),
            "cols_snake" => Ok(Self::ColsSnake),
            other => Err(format!(
                "unknown wiring mode '{other}' (expected 'rows_snake' or 'cols_snake')"
            )),
        }
    }
}

// ── Mapping function ─────────────────────────────────────────────────

/// Map grid coordinate `(x, y)` to its index along the physical strip.
///
/// `x` must be below `width` and `y` below `height`; the result is then in
/// `0..width * height`. Each coordinate maps to a distinct index.
pub fn map_index(
    x: u32,
    y: u32,
    width: u32,
    height: u32,
    wiring: WiringMode,
    origin_top_left: bool,
) -> u32 {
    debug_assert!(x < width, "x={x} out of range for width {width}");
    debug_assert!(y < height, "y={y} out of range for height {height}");

    let row = if origin_top_left { y } else { height - 1 - y };

    match wiring {
        WiringMode::RowsSnake => {
            if row % 2 == 0 {
                row * width + x
            } else {
                row * width + (width - 1 - x)
            }
        }
        WiringMode::ColsSnake => {
            let col = x;
            if col % 2 == 0 {
                col * height + row
            } else {
                col * height + (height - 1 - row)
            }
        }
    }
}

// ── Layout ───────────────────────────────────────────────────────────

/// Geometry and wiring of one LED panel.
///
/// A `Layout` is a plain value: changing any field means building a new one,
/// and every index must be recomputed against it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Layout {
    width: u32,
    height: u32,
    wiring: WiringMode,
    origin_top_left: bool,
}

impl Layout {
    /// Build a layout, rejecting geometries no strip can have.
    pub fn new(
        width: u32,
        height: u32,
        wiring: WiringMode,
        origin_top_left: bool,
    ) -> Result<Self, String> {
        if width == 0 || height == 0 {
            return Err(format!("grid must be at least 1x1, got {width}x{height}"));
        }
        // The ws281x driver counts LEDs with an i32.
        let count = u64::from(width) * u64::from(height);
        if count > i32::MAX as u64 {
            return Err(format!("grid {width}x{height} has too many LEDs ({count})"));
        }
        Ok(Self {
            width,
            height,
            wiring,
            origin_top_left,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn wiring(&self) -> WiringMode {
        self.wiring
    }

    pub fn origin_top_left(&self) -> bool {
        self.origin_top_left
    }

    /// Number of LEDs on the strip.
    pub fn led_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Physical index of grid cell `(x, y)`.
    pub fn index_of(&self, x: u32, y: u32) -> usize {
        map_index(
            x,
            y,
            self.width,
            self.height,
            self.wiring,
            self.origin_top_left,
        ) as usize
    }

    /// Grid cell driving physical LED `index`, found by scanning every cell.
    ///
    /// Linear in the number of LEDs. Only the test pattern uses it.
    pub fn position_of(&self, index: usize) -> Option<(u32, u32)> {
        (0..self.height)
            .flat_map(|y| (0..self.width).map(move |x| (x, y)))
            .find(|&(x, y)| self.index_of(x, y) == index)
    }

    /// Same panel with the other wiring mode.
    pub fn toggle_wiring(self) -> Self {
        Self {
            wiring: self.wiring.toggled(),
            ..self
        }
    }

    /// Same panel mounted upside down: (0, 0) moves between top-left and bottom-left.
    pub fn toggle_origin(self) -> Self {
        Self {
            origin_top_left: !self.origin_top_left,
            ..self
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────
