//! Compaction state of every bond.
//!
//! Each node keeps one flag per direction, so a bond is recorded twice (once
//! at each end) and both records always agree. The order in which bonds
//! compacted is kept as well.

use sim_lattice::Direction;

/// Per-node, per-direction compaction flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BondStates {
    flags: Vec<[bool; 6]>,
    history: Vec<(usize, usize)>,
}

impl BondStates {
    /// All bonds of an `node_count`-node lattice intact.
    #[must_use]
    pub fn new(node_count: usize) -> Self {
        Self {
            flags: vec![[false; 6]; node_count],
            history: Vec::new(),
        }
    }

    /// Whether the bond leaving `node` in direction `dir` is compacted.
    ///
    /// Unknown nodes read as intact.
    #[must_use]
    pub fn is_compacted(&self, node: usize, dir: Direction) -> bool {
        self.flags.get(node).is_some_and(|slots| slots[dir.slot()])
    }

    /// Mark the bond between `node` and its neighbor `other` in direction
    /// `dir` as compacted.
    ///
    /// Returns `true` if the bond was intact. Compaction is irreversible;
    /// marking a compacted bond again changes nothing.
    pub fn compact(&mut self, node: usize, dir: Direction, other: usize) -> bool {
        if node >= self.flags.len() || other >= self.flags.len() {
            return false;
        }
        if self.flags[node][dir.slot()] {
            return false;
        }
        self.flags[node][dir.slot()] = true;
        self.flags[other][dir.opposite().slot()] = true;
        self.history.push((node.min(other), node.max(other)));
        true
    }

    /// Number of compacted bonds.
    #[must_use]
    pub fn compacted_count(&self) -> usize {
        self.history.len()
    }

    /// Compacted bonds as `(lower, higher)` node pairs, oldest first.
    #[must_use]
    pub fn history(&self) -> &[(usize, usize)] {
        &self.history
    }

    /// Number of nodes covered.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.flags.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compact_marks_both_ends() {
        let mut bonds = BondStates::new(8);
        assert!(bonds.compact(0, Direction::DownRight, 3));
        assert!(bonds.is_compacted(0, Direction::DownRight));
        assert!(bonds.is_compacted(3, Direction::UpLeft));
        assert!(!bonds.is_compacted(0, Direction::Right));
        assert_eq!(bonds.compacted_count(), 1);
    }

    #[test]
    fn test_compaction_is_one_way() {
        let mut bonds = BondStates::new(8);
        assert!(bonds.compact(3, Direction::Right, 4));
        assert!(!bonds.compact(3, Direction::Right, 4));
        assert!(!bonds.compact(4, Direction::Left, 3));
        assert_eq!(bonds.compacted_count(), 1);
        assert!(bonds.is_compacted(4, Direction::Left));

        bonds.compact(7, Direction::UpLeft, 4);
        assert_eq!(bonds.history(), &[(3, 4), (4, 7)]);
    }

    #[test]
    fn test_unknown_nodes_are_intact() {
        let mut bonds = BondStates::new(3);
        assert!(!bonds.is_compacted(10, Direction::Left));
        assert!(!bonds.compact(2, Direction::Right, 3));
        assert_eq!(bonds.compacted_count(), 0);
    }
}
