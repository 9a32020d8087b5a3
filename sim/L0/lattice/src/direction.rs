//! The six bond directions of the triangular lattice.
//!
//! The y axis points downward: "up" directions have a negative y component.
//!
//! ```text
//!      UpLeft   UpRight
//!          \   /
//!   Left ---- * ---- Right
//!          /   \
//!   DownLeft   DownRight
//! ```

use nalgebra::Vector2;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// `sqrt(3) / 2`, the vertical spacing between rows for unit bonds.
pub const ROW_SPACING: f64 = 0.866_025_403_784_438_6;

/// Direction from a node to one of its (up to) six neighbors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Direction {
    /// Same row, one column to the left.
    Left,
    /// Same row, one column to the right.
    Right,
    /// Row above, half a column to the left.
    UpLeft,
    /// Row above, half a column to the right.
    UpRight,
    /// Row below, half a column to the right.
    DownRight,
    /// Row below, half a column to the left.
    DownLeft,
}

impl Direction {
    /// All six directions, in slot order.
    pub const ALL: [Self; 6] = [
        Self::Left,
        Self::Right,
        Self::UpLeft,
        Self::UpRight,
        Self::DownRight,
        Self::DownLeft,
    ];

    /// Directions whose neighbor has a higher index than the node.
    ///
    /// Visiting these from every node enumerates each bond exactly once.
    pub const FORWARD: [Self; 3] = [Self::Right, Self::DownRight, Self::DownLeft];

    /// Right plus the two upward diagonals; also one visit per bond.
    pub const RISING: [Self; 3] = [Self::Right, Self::UpRight, Self::UpLeft];

    /// Slot of this direction in per-node six-element arrays.
    #[must_use]
    pub const fn slot(self) -> usize {
        match self {
            Self::Left => 0,
            Self::Right => 1,
            Self::UpLeft => 2,
            Self::UpRight => 3,
            Self::DownRight => 4,
            Self::DownLeft => 5,
        }
    }

    /// The direction pointing back from the neighbor.
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Self::Left => Self::Right,
            Self::Right => Self::Left,
            Self::UpLeft => Self::DownRight,
            Self::UpRight => Self::DownLeft,
            Self::DownRight => Self::UpLeft,
            Self::DownLeft => Self::UpRight,
        }
    }

    /// Whether the bond stays on the same row.
    #[must_use]
    pub const fn is_horizontal(self) -> bool {
        matches!(self, Self::Left | Self::Right)
    }

    /// Unit vector along the bond axis (y pointing down).
    #[must_use]
    pub fn unit(self) -> Vector2<f64> {
        match self {
            Self::Left => Vector2::new(-1.0, 0.0),
            Self::Right => Vector2::new(1.0, 0.0),
            Self::UpLeft => Vector2::new(-0.5, -ROW_SPACING),
            Self::UpRight => Vector2::new(0.5, -ROW_SPACING),
            Self::DownRight => Vector2::new(0.5, ROW_SPACING),
            Self::DownLeft => Vector2::new(-0.5, ROW_SPACING),
        }
    }
}
