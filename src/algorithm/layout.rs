//! Global supernode metadata: sizes and block structure
//!
//! Supernode `k` spans global columns `xsup[k]..xsup[k + 1]`. Its L column
//! holds the diagonal block plus the block rows listed in `l_blocks[k]`; its
//! U row holds the block columns listed in `u_blocks[k]`. Both lists are
//! sorted and only name supernodes after `k` (the symbolic fill pattern).

use smallvec::SmallVec;

use crate::error::{Error, Result};

/// Small list of block ids held by one process for one supernode
pub type BlockList = SmallVec<[usize; 8]>;

/// Replicated supernode partition and L/U block structure.
#[derive(Debug, Clone)]
pub struct SupernodeLayout {
    xsup: Vec<usize>,
    l_blocks: Vec<Vec<usize>>,
    u_blocks: Vec<Vec<usize>>,
}

impl SupernodeLayout {
    /// Create a layout from supernode boundaries and block structure.
    ///
    /// # Arguments
    ///
    /// * `xsup` - Supernode boundaries `[nsupers + 1]`, strictly increasing from 0
    /// * `l_blocks` - For each supernode, sorted block rows `i > k` of its L column
    /// * `u_blocks` - For each supernode, sorted block columns `j > k` of its U row
    pub fn new(
        xsup: Vec<usize>,
        l_blocks: Vec<Vec<usize>>,
        u_blocks: Vec<Vec<usize>>,
    ) -> Result<Self> {
        if xsup.first() != Some(&0) {
            return Err(Error::invalid_argument("xsup", "must start at column 0"));
        }
        let nsupers = xsup.len() - 1;
        if let Some(k) = xsup.windows(2).position(|w| w[0] >= w[1]) {
            return Err(Error::topology(k, "empty or reversed supernode"));
        }
        if l_blocks.len() != nsupers || u_blocks.len() != nsupers {
            return Err(Error::shape_mismatch(
                &[nsupers, nsupers],
                &[l_blocks.len(), u_blocks.len()],
            ));
        }
        for (k, blocks) in l_blocks.iter().chain(u_blocks.iter()).enumerate() {
            let k = k % nsupers;
            let mut prev = k;
            for &b in blocks {
                if b <= prev || b >= nsupers {
                    return Err(Error::topology(
                        k,
                        format!("block {b} is out of order or out of range"),
                    ));
                }
                prev = b;
            }
        }
        Ok(Self {
            xsup,
            l_blocks,
            u_blocks,
        })
    }

    /// Layout with every block below and right of the diagonal present
    /// (dense block structure).
    pub fn dense(xsup: Vec<usize>) -> Result<Self> {
        let nsupers = xsup.len().saturating_sub(1);
        let trailing: Vec<Vec<usize>> =
            (0..nsupers).map(|k| ((k + 1)..nsupers).collect()).collect();
        Self::new(xsup, trailing.clone(), trailing)
    }

    /// Layout of `nsupers` supernodes of equal `size` with dense structure.
    pub fn uniform(nsupers: usize, size: usize) -> Result<Self> {
        Self::dense((0..=nsupers).map(|k| k * size).collect())
    }

    /// Number of supernodes
    pub fn nsupers(&self) -> usize {
        self.xsup.len() - 1
    }

    /// Matrix dimension
    pub fn n(&self) -> usize {
        self.xsup[self.nsupers()]
    }

    /// Number of columns in supernode `k`
    pub fn super_size(&self, k: usize) -> usize {
        self.xsup[k + 1] - self.xsup[k]
    }

    /// First global column of supernode `k`
    pub fn first_col(&self, k: usize) -> usize {
        self.xsup[k]
    }

    /// Largest supernode size
    pub fn max_super_size(&self) -> usize {
        (0..self.nsupers()).map(|k| self.super_size(k)).max().unwrap_or(0)
    }

    /// Supernode containing global column (or row) `col`
    pub fn supernode_of(&self, col: usize) -> Option<usize> {
        if col >= self.n() {
            return None;
        }
        Some(self.xsup.partition_point(|&start| start <= col) - 1)
    }

    /// Block rows below the diagonal in L column `k`
    pub fn l_blocks(&self, k: usize) -> &[usize] {
        &self.l_blocks[k]
    }

    /// Block columns right of the diagonal in U row `k`
    pub fn u_blocks(&self, k: usize) -> &[usize] {
        &self.u_blocks[k]
    }

    /// Whether block `(i, j)` is structurally present: the diagonal, a block
    /// row of L column `j` (`i > j`), or a block column of U row `i` (`i < j`)
    pub fn has_block(&self, i: usize, j: usize) -> bool {
        match i.cmp(&j) {
            std::cmp::Ordering::Equal => i < self.nsupers(),
            std::cmp::Ordering::Greater => self.l_blocks[j].binary_search(&i).is_ok(),
            std::cmp::Ordering::Less => self.u_blocks[i].binary_search(&j).is_ok(),
        }
    }

    /// Blocks of L column `k` held by process row `prow`: the diagonal
    /// block first when `prow` owns it, then the matching block rows.
    pub fn l_piece(&self, k: usize, prow: usize, nprow: usize) -> BlockList {
        let mut piece = BlockList::new();
        if k % nprow == prow {
            piece.push(k);
        }
        piece.extend(self.l_blocks[k].iter().copied().filter(|i| i % nprow == prow));
        piece
    }

    /// Blocks of U row `k` held by process column `pcol`
    pub fn u_piece(&self, k: usize, pcol: usize, npcol: usize) -> BlockList {
        self.u_blocks[k]
            .iter()
            .copied()
            .filter(|j| j % npcol == pcol)
            .collect()
    }

    /// Total row (or column) extent of a list of blocks
    pub fn extent(&self, blocks: &[usize]) -> usize {
        blocks.iter().map(|&b| self.super_size(b)).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_validates() {
        let new =
            |l: Vec<Vec<usize>>, u: Vec<Vec<usize>>| SupernodeLayout::new(vec![0, 2, 3], l, u);
        assert!(new(vec![vec![1], vec![]], vec![vec![1], vec![]]).is_ok());
        // block not after its supernode
        assert!(new(vec![vec![0], vec![]], vec![vec![], vec![]]).is_err());
        // block out of range
        assert!(new(vec![vec![], vec![]], vec![vec![2], vec![]]).is_err());
        // reversed boundaries
        let empty = vec![vec![], vec![]];
        let reversed = SupernodeLayout::new(vec![0, 2, 2], empty.clone(), empty);
        assert!(reversed.is_err());
    }

    #[test]
    fn test_sizes_and_lookup() {
        let layout = SupernodeLayout::dense(vec![0, 2, 3, 6]).unwrap();
        assert_eq!(layout.nsupers(), 3);
        assert_eq!(layout.n(), 6);
        assert_eq!(layout.super_size(2), 3);
        assert_eq!(layout.max_super_size(), 3);
        assert_eq!(layout.supernode_of(0), Some(0));
        assert_eq!(layout.supernode_of(2), Some(1));
        assert_eq!(layout.supernode_of(5), Some(2));
        assert_eq!(layout.supernode_of(6), None);
    }

    #[test]
    fn test_pieces() {
        let layout = SupernodeLayout::uniform(6, 1).unwrap();
        // L column 1 on a 2-row grid: diag (row 1) then blocks 3, 5
        assert_eq!(layout.l_piece(1, 1, 2).as_slice(), &[1, 3, 5]);
        assert_eq!(layout.l_piece(1, 0, 2).as_slice(), &[2, 4]);
        assert_eq!(layout.u_piece(1, 0, 3).as_slice(), &[3]);
        assert_eq!(layout.u_piece(1, 2, 3).as_slice(), &[2, 5]);
        assert!(layout.u_piece(5, 0, 1).is_empty());
        assert_eq!(layout.extent(&[1, 3, 5]), 3);
    }

    #[test]
    fn test_has_block() {
        // Arrow structure: only the last row/column couples supernodes
        let arrow = vec![vec![2], vec![2], vec![]];
        let layout = SupernodeLayout::new(vec![0, 1, 2, 3], arrow.clone(), arrow).unwrap();
        assert!(layout.has_block(1, 1));
        assert!(layout.has_block(2, 0));
        assert!(layout.has_block(0, 2));
        assert!(!layout.has_block(1, 0));
        assert!(!layout.has_block(0, 1));
    }
}
