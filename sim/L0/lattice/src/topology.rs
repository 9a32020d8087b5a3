//! Node indexing and neighbor lookup.
//!
//! Nodes are numbered row by row. Even rows ("long" rows) hold `cols`
//! nodes, odd rows ("short" rows) hold `cols - 1` nodes shifted half a bond
//! to the right, so a pair of rows holds `2 * cols - 1` nodes:
//!
//! ```text
//! 0---1---2        row 0 (long)
//!  \ / \ /
//!   3---4          row 1 (short)
//!  / \ / \
//! 5---6---7        row 2 (long)
//! ```
//!
//! Every query takes a flat node index and fails with
//! [`LatticeError::IndexOutOfRange`] outside `[0, node_count)`.

use nalgebra::Point2;

use crate::direction::{Direction, ROW_SPACING};
use crate::error::{LatticeError, Result};

/// Geometry capability of a lattice: neighbors and border classification.
///
/// Samples compose a topology rather than inherit from one, so the plain and
/// stratified variants share the same implementation.
pub trait LatticeTopology {
    /// Number of nodes.
    fn node_count(&self) -> usize;

    /// Number of bonds between adjacent nodes.
    fn bond_count(&self) -> usize;

    /// Neighbor of `node` in direction `dir`, or `None` at a sample edge.
    fn neighbor(&self, node: usize, dir: Direction) -> Result<Option<usize>>;

    /// Whether `node` lies on the first row.
    fn is_top(&self, node: usize) -> Result<bool>;

    /// Whether `node` lies on the last row.
    fn is_bottom(&self, node: usize) -> Result<bool>;

    /// Whether `node` is the first node of its row.
    fn is_left(&self, node: usize) -> Result<bool>;

    /// Whether `node` is the last node of its row.
    fn is_right(&self, node: usize) -> Result<bool>;

    /// Rest position of `node` for unit bond length (y pointing down).
    fn rest_position(&self, node: usize) -> Result<Point2<f64>>;

    /// Whether `node` touches a loading platen (first or last row).
    fn is_platen(&self, node: usize) -> Result<bool> {
        Ok(self.is_top(node)? || self.is_bottom(node)?)
    }
}

/// Triangular lattice with alternating long and short rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriangularLattice {
    lines: usize,
    cols: usize,
    len2lines: usize,
    node_count: usize,
    bond_count: usize,
}

impl TriangularLattice {
    /// Create a lattice with `lines` rows and `cols` nodes per long row.
    ///
    /// # Errors
    ///
    /// Returns [`LatticeError::InvalidDimensions`] if either dimension is
    /// below 3.
    pub fn new(lines: usize, cols: usize) -> Result<Self> {
        if lines < 3 || cols < 3 {
            return Err(LatticeError::InvalidDimensions { lines, cols });
        }

        let len2lines = 2 * cols - 1;
        let mut node_count = lines / 2 * len2lines;
        let mut bond_count = lines / 2 * (2 * cols - 3) + (lines - 1) * 2 * (cols - 1);
        if lines % 2 == 1 {
            node_count += cols;
            bond_count += cols - 1;
        }

        Ok(Self {
            lines,
            cols,
            len2lines,
            node_count,
            bond_count,
        })
    }

    /// Number of node rows.
    #[must_use]
    pub const fn lines(&self) -> usize {
        self.lines
    }

    /// Number of nodes on a long row.
    #[must_use]
    pub const fn cols(&self) -> usize {
        self.cols
    }

    /// Number of nodes in a long/short row pair.
    #[must_use]
    pub const fn len2lines(&self) -> usize {
        self.len2lines
    }

    /// Row of `node`, counted from the top.
    pub fn row(&self, node: usize) -> Result<usize> {
        self.check(node)?;
        Ok(node / self.len2lines * 2 + node % self.len2lines / self.cols)
    }

    /// Index of the first node on the last row.
    ///
    /// The last row is long when `lines` is odd and short when it is even.
    const fn last_row_start(&self) -> usize {
        if self.lines % 2 == 1 {
            self.node_count - self.cols
        } else {
            self.node_count - self.cols + 1
        }
    }

    fn check(&self, node: usize) -> Result<()> {
        if node >= self.node_count {
            return Err(LatticeError::index_out_of_range(node, self.node_count));
        }
        Ok(())
    }
}

impl LatticeTopology for TriangularLattice {
    fn node_count(&self) -> usize {
        self.node_count
    }

    fn bond_count(&self) -> usize {
        self.bond_count
    }

    fn neighbor(&self, node: usize, dir: Direction) -> Result<Option<usize>> {
        self.check(node)?;
        let c = self.cols;
        let col = node % self.len2lines;
        let first_row = node < c;
        let last_row = node >= self.last_row_start();

        let found = match dir {
            Direction::Left => (col != 0 && col != c).then(|| node - 1),
            Direction::Right => (col != c - 1 && col != 2 * c - 2).then(|| node + 1),
            Direction::UpLeft => (!first_row && col != 0).then(|| node - c),
            Direction::UpRight => (!first_row && col != c - 1).then(|| node - c + 1),
            Direction::DownLeft => (!last_row && col != 0).then(|| node + c - 1),
            Direction::DownRight => (!last_row && col != c - 1).then(|| node + c),
        };
        Ok(found)
    }

    fn is_top(&self, node: usize) -> Result<bool> {
        self.check(node)?;
        Ok(node < self.cols)
    }

    fn is_bottom(&self, node: usize) -> Result<bool> {
        self.check(node)?;
        Ok(node >= self.last_row_start())
    }

    fn is_left(&self, node: usize) -> Result<bool> {
        self.check(node)?;
        let col = node % self.len2lines;
        Ok(col == 0 || col == self.cols)
    }

    fn is_right(&self, node: usize) -> Result<bool> {
        self.check(node)?;
        let col = node % self.len2lines;
        Ok(col == self.cols - 1 || col == self.len2lines - 1)
    }

    fn rest_position(&self, node: usize) -> Result<Point2<f64>> {
        let row = self.row(node)?;
        let col = node % self.len2lines;
        let x = if col < self.cols {
            col as f64
        } else {
            (col - self.cols) as f64 + 0.5
        };
        Ok(Point2::new(x, row as f64 * ROW_SPACING))
    }
}
