//! Sparse storage for the global stiffness matrix.
//!
//! Bond stencils are accumulated as `(row, col, value)` triplets; duplicate
//! positions are summed when the triplets are compressed to CSR.
//!
//! # Layout
//!
//! For `n` nodes the matrix is `2n x 2n`. Unknown `i` is the x displacement
//! of node `i` and unknown `i + n` its y displacement. Each node row touches
//! at most its six neighbors, so a row holds at most 14 non-zeros.

use nalgebra::{DMatrix, DVector, Matrix2, Vector2};
use nalgebra_sparse::{CooMatrix, CsrMatrix};

/// Assembled stiffness matrix in CSR format.
#[derive(Debug, Clone)]
pub struct StiffnessMatrix {
    matrix: CsrMatrix<f64>,
    size: usize,
}

impl StiffnessMatrix {
    /// Build a square matrix from triplets, summing duplicates.
    #[must_use]
    pub fn from_triplets(size: usize, triplets: &[(usize, usize, f64)]) -> Self {
        let mut coo = CooMatrix::new(size, size);
        for &(row, col, value) in triplets {
            coo.push(row, col, value);
        }
        Self {
            matrix: CsrMatrix::from(&coo),
            size,
        }
    }

    /// Number of rows (and columns).
    #[must_use]
    pub const fn size(&self) -> usize {
        self.size
    }

    /// Number of stored entries.
    #[must_use]
    pub fn nnz(&self) -> usize {
        self.matrix.nnz()
    }

    /// Entry at `(row, col)`, zero when not stored.
    #[must_use]
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.matrix.get_row(row).map_or(0.0, |r| {
            r.col_indices()
                .iter()
                .zip(r.values())
                .find_map(|(&c, &value)| (c == col).then_some(value))
                .unwrap_or(0.0)
        })
    }

    /// Compute `A * v`.
    #[must_use]
    pub fn mul_vec(&self, v: &DVector<f64>) -> DVector<f64> {
        let mut result = DVector::zeros(self.size);
        for (row_idx, row) in self.matrix.row_iter().enumerate() {
            result[row_idx] = row
                .col_indices()
                .iter()
                .zip(row.values())
                .map(|(&col, &value)| value * v[col])
                .sum();
        }
        result
    }

    /// Convert to a dense matrix.
    #[must_use]
    pub fn to_dense(&self) -> DMatrix<f64> {
        let mut dense = DMatrix::zeros(self.size, self.size);
        for (row_idx, row) in self.matrix.row_iter().enumerate() {
            for (&col, &value) in row.col_indices().iter().zip(row.values()) {
                dense[(row_idx, col)] = value;
            }
        }
        dense
    }

    /// Underlying CSR matrix.
    #[must_use]
    pub const fn csr(&self) -> &CsrMatrix<f64> {
        &self.matrix
    }
}

/// Incremental builder for [`StiffnessMatrix`].
#[derive(Debug, Clone)]
pub struct StiffnessBuilder {
    triplets: Vec<(usize, usize, f64)>,
    size: usize,
}

impl StiffnessBuilder {
    /// Create a builder for a `size x size` matrix.
    #[must_use]
    pub fn new(size: usize) -> Self {
        Self {
            triplets: Vec::with_capacity(size * 14),
            size,
        }
    }

    /// Add `value` at `(row, col)`.
    pub fn add(&mut self, row: usize, col: usize, value: f64) {
        debug_assert!(row < self.size);
        debug_assert!(col < self.size);
        if value != 0.0 {
            self.triplets.push((row, col, value));
        }
    }

    /// Add the stencil of a bond of stiffness `alpha` along `axis` to the x
    /// row of `node` and, unless `x_only`, to its y row.
    ///
    /// The neighbor columns receive `alpha * n n^T` and the node's own
    /// columns its negation.
    pub fn add_bond(
        &mut self,
        node: usize,
        neighbor: usize,
        node_count: usize,
        axis: &Vector2<f64>,
        alpha: f64,
        x_only: bool,
    ) {
        let block: Matrix2<f64> = axis * axis.transpose() * alpha;
        let rows = if x_only { 1 } else { 2 };
        for r in 0..rows {
            let row = node + r * node_count;
            for c in 0..2 {
                self.add(row, neighbor + c * node_count, block[(r, c)]);
                self.add(row, node + c * node_count, -block[(r, c)]);
            }
        }
    }

    /// Number of triplets collected so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.triplets.len()
    }

    /// Whether no triplet was collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.triplets.is_empty()
    }

    /// Compress the triplets.
    #[must_use]
    pub fn build(self) -> StiffnessMatrix {
        StiffnessMatrix::from_triplets(self.size, &self.triplets)
    }
}
