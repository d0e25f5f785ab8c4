//! Panel storage: the per-process pieces of L columns and U rows
//!
//! A panel is an index array plus a contiguous value buffer. The index
//! describes which supernode blocks the panel holds and where each starts:
//!
//! ```text
//! index = [nblocks, stride, width, gid_0 .. gid_{nb-1}, start_0 .. start_nb]
//! ```
//!
//! `start_b` is the offset of block `b` along the panel's long dimension
//! (`start_nb == stride`). An L panel (column view) stores its values
//! column-major as `stride × width`; a U panel (row view) stores them
//! column-major as `width × stride`. `width` is the size of the supernode
//! the panel belongs to. Block ids are strictly increasing, so the diagonal
//! block, when present, is always block 0 of an L panel.

use super::kernels::{BlockMut, BlockRef};
use super::layout::SupernodeLayout;
use crate::error::{Error, Result, reserve_exact, try_zeroed};
use crate::grid::ProcessGrid3D;
use crate::runtime::Communicator;

const HEADER_LEN: usize = 3;

/// Index length for a panel of `nblocks` blocks
pub fn index_len(nblocks: usize) -> usize {
    if nblocks == 0 {
        0
    } else {
        HEADER_LEN + 2 * nblocks + 1
    }
}

/// Parsed, validated view over a panel index.
#[derive(Debug, Clone, Copy)]
pub struct PanelIndex<'a> {
    raw: &'a [i64],
    nblocks: usize,
}

impl<'a> PanelIndex<'a> {
    /// Validate and wrap a non-empty panel index.
    pub fn parse(raw: &'a [i64]) -> Result<Self> {
        let bad = |reason: String| Error::invalid_argument("panel_index", reason);
        if raw.len() < HEADER_LEN {
            return Err(bad(format!("index of length {} has no header", raw.len())));
        }
        let nblocks = usize::try_from(raw[0]).map_err(|_| bad(format!("block count {}", raw[0])))?;
        if nblocks == 0 || raw.len() != index_len(nblocks) {
            return Err(bad(format!(
                "{} entries for {nblocks} blocks",
                raw.len()
            )));
        }
        if raw[1] < 0 || raw[2] < 0 {
            return Err(bad(format!("negative extent {} x {}", raw[1], raw[2])));
        }
        let gids = &raw[HEADER_LEN..HEADER_LEN + nblocks];
        let starts = &raw[HEADER_LEN + nblocks..];
        if gids.iter().any(|&g| g < 0) || gids.windows(2).any(|w| w[0] >= w[1]) {
            return Err(bad("block ids are not strictly increasing".into()));
        }
        if starts[0] != 0 || starts[nblocks] != raw[1] || starts.windows(2).any(|w| w[0] >= w[1]) {
            return Err(bad("block starts do not partition the stride".into()));
        }
        Ok(Self { raw, nblocks })
    }

    /// Encode the index for `blocks` of a panel of the given `width`.
    pub fn encode(layout: &SupernodeLayout, blocks: &[usize], width: usize) -> Result<Vec<i64>> {
        let mut index = Vec::new();
        reserve_exact(&mut index, "panel index", index_len(blocks.len()))?;
        if blocks.is_empty() {
            return Ok(index);
        }
        index.push(blocks.len() as i64);
        index.push(layout.extent(blocks) as i64);
        index.push(width as i64);
        index.extend(blocks.iter().map(|&b| b as i64));
        let mut start = 0;
        index.push(0);
        for &b in blocks {
            start += layout.super_size(b);
            index.push(start as i64);
        }
        Ok(index)
    }

    /// Number of blocks
    pub fn nblocks(&self) -> usize {
        self.nblocks
    }

    /// Extent along the long dimension (sum of block sizes)
    pub fn stride(&self) -> usize {
        self.raw[1] as usize
    }

    /// Size of the supernode the panel belongs to
    pub fn width(&self) -> usize {
        self.raw[2] as usize
    }

    /// Number of values the panel holds
    pub fn nzval_size(&self) -> usize {
        self.stride() * self.width()
    }

    /// Global supernode id of block `b`
    pub fn gid(&self, b: usize) -> usize {
        self.raw[HEADER_LEN + b] as usize
    }

    /// Offset of block `b` along the long dimension
    pub fn start(&self, b: usize) -> usize {
        self.raw[HEADER_LEN + self.nblocks + b] as usize
    }

    /// Size of block `b`
    pub fn block_size(&self, b: usize) -> usize {
        self.start(b + 1) - self.start(b)
    }

    /// Position of supernode `gid` in this panel
    pub fn position(&self, gid: usize) -> Option<usize> {
        let gids = &self.raw[HEADER_LEN..HEADER_LEN + self.nblocks];
        gids.binary_search(&(gid as i64)).ok()
    }

    /// Global ids of the blocks, in storage order
    pub fn gids(&self) -> impl Iterator<Item = usize> + '_ {
        self.raw[HEADER_LEN..HEADER_LEN + self.nblocks]
            .iter()
            .map(|&g| g as usize)
    }
}

/// Column view of an L panel: `stride × width`, leading dimension `stride`.
#[derive(Debug)]
pub struct ColumnView<'a, S> {
    index: PanelIndex<'a>,
    values: S,
}

/// Row view of a U panel: `width × stride`, leading dimension `width`.
#[derive(Debug)]
pub struct RowView<'a, S> {
    index: PanelIndex<'a>,
    values: S,
}

fn check_values(index: &PanelIndex<'_>, len: usize) -> Result<()> {
    if len < index.nzval_size() {
        return Err(Error::shape_mismatch(&[index.nzval_size()], &[len]));
    }
    Ok(())
}

impl<'a, S: AsRef<[f64]>> ColumnView<'a, S> {
    /// View `values` through `index` (extra trailing values are ignored)
    pub fn new(index: PanelIndex<'a>, values: S) -> Result<Self> {
        check_values(&index, values.as_ref().len())?;
        Ok(Self { index, values })
    }

    /// The panel index
    pub fn index(&self) -> &PanelIndex<'a> {
        &self.index
    }

    /// Element at panel row `r`, column `c`
    pub fn get(&self, r: usize, c: usize) -> f64 {
        self.values.as_ref()[c * self.index.stride() + r]
    }

    /// Rows `start..stride` of the panel as one block
    pub fn rows_from(&self, start: usize) -> BlockRef<'_> {
        let stride = self.index.stride();
        let start = start.min(stride);
        BlockRef::from_parts(
            &self.values.as_ref()[start..self.index.nzval_size()],
            stride,
            stride - start,
            self.index.width(),
        )
    }

    /// Block of supernode `gid` (its rows, all panel columns)
    pub fn block(&self, gid: usize) -> Option<BlockRef<'_>> {
        let b = self.index.position(gid)?;
        let start = self.index.start(b);
        Some(BlockRef::from_parts(
            &self.values.as_ref()[start..self.index.nzval_size()],
            self.index.stride(),
            self.index.block_size(b),
            self.index.width(),
        ))
    }
}

impl<'a, S: AsRef<[f64]> + AsMut<[f64]>> ColumnView<'a, S> {
    /// Mutable rows `start..stride`
    pub fn rows_from_mut(&mut self, start: usize) -> BlockMut<'_> {
        let stride = self.index.stride();
        let start = start.min(stride);
        let end = self.index.nzval_size();
        BlockMut::from_parts(
            &mut self.values.as_mut()[start..end],
            stride,
            stride - start,
            self.index.width(),
        )
    }

    /// Mutable block of supernode `gid`
    pub fn block_mut(&mut self, gid: usize) -> Option<BlockMut<'_>> {
        let b = self.index.position(gid)?;
        let start = self.index.start(b);
        let end = self.index.nzval_size();
        Some(BlockMut::from_parts(
            &mut self.values.as_mut()[start..end],
            self.index.stride(),
            self.index.block_size(b),
            self.index.width(),
        ))
    }
}

impl<'a, S: AsRef<[f64]>> RowView<'a, S> {
    /// View `values` through `index` (extra trailing values are ignored)
    pub fn new(index: PanelIndex<'a>, values: S) -> Result<Self> {
        check_values(&index, values.as_ref().len())?;
        Ok(Self { index, values })
    }

    /// The panel index
    pub fn index(&self) -> &PanelIndex<'a> {
        &self.index
    }

    /// Element at panel row `r`, column `c`
    pub fn get(&self, r: usize, c: usize) -> f64 {
        self.values.as_ref()[c * self.index.width() + r]
    }

    /// The whole panel as one `width × stride` block
    pub fn all(&self) -> BlockRef<'_> {
        let w = self.index.width();
        BlockRef::from_parts(
            &self.values.as_ref()[..self.index.nzval_size()],
            w,
            w,
            self.index.stride(),
        )
    }

    /// Block of supernode `gid` (all panel rows, its columns)
    pub fn block(&self, gid: usize) -> Option<BlockRef<'_>> {
        let b = self.index.position(gid)?;
        let w = self.index.width();
        let start = self.index.start(b) * w;
        Some(BlockRef::from_parts(
            &self.values.as_ref()[start..self.index.nzval_size()],
            w,
            w,
            self.index.block_size(b),
        ))
    }
}

impl<'a, S: AsRef<[f64]> + AsMut<[f64]>> RowView<'a, S> {
    /// The whole panel as one mutable block
    pub fn all_mut(&mut self) -> BlockMut<'_> {
        let w = self.index.width();
        let end = self.index.nzval_size();
        let stride = self.index.stride();
        BlockMut::from_parts(&mut self.values.as_mut()[..end], w, w, stride)
    }

    /// Mutable block of supernode `gid`
    pub fn block_mut(&mut self, gid: usize) -> Option<BlockMut<'_>> {
        let b = self.index.position(gid)?;
        let w = self.index.width();
        let start = self.index.start(b) * w;
        let end = self.index.nzval_size();
        let size = self.index.block_size(b);
        Some(BlockMut::from_parts(
            &mut self.values.as_mut()[start..end],
            w,
            w,
            size,
        ))
    }
}

/// One owned panel: index plus values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Panel {
    index: Vec<i64>,
    values: Vec<f64>,
}

impl Panel {
    /// Allocate a zero-filled panel for `index` (empty index: empty panel)
    pub fn new(index: Vec<i64>) -> Result<Self> {
        let len = if index.is_empty() {
            0
        } else {
            PanelIndex::parse(&index)?.nzval_size()
        };
        let values = try_zeroed("panel values", len)?;
        Ok(Self { index, values })
    }

    /// Wrap existing buffers; `values` must match the index exactly
    pub fn from_parts(index: Vec<i64>, values: Vec<f64>) -> Result<Self> {
        let len = if index.is_empty() {
            0
        } else {
            PanelIndex::parse(&index)?.nzval_size()
        };
        if values.len() != len {
            return Err(Error::shape_mismatch(&[len], &[values.len()]));
        }
        Ok(Self { index, values })
    }

    /// Whether the panel holds no blocks
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Raw index array
    pub fn index(&self) -> &[i64] {
        &self.index
    }

    /// Raw index array, mutable (broadcast source)
    pub fn index_mut(&mut self) -> &mut [i64] {
        &mut self.index
    }

    /// Value buffer
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Value buffer, mutable
    pub fn values_mut(&mut self) -> &mut [f64] {
        &mut self.values
    }

    /// Parsed index, `None` for an empty panel
    pub fn meta(&self) -> Option<PanelIndex<'_>> {
        if self.index.is_empty() {
            return None;
        }
        PanelIndex::parse(&self.index).ok()
    }

    /// `(index length, value length)` sent when this panel is broadcast
    pub fn counts(&self) -> (usize, usize) {
        (self.index.len(), self.values.len())
    }

    /// Heap bytes held
    pub fn bytes(&self) -> usize {
        self.index.len() * size_of::<i64>() + self.values.len() * size_of::<f64>()
    }

    /// Read as an L panel
    pub fn column_view(&self) -> Option<ColumnView<'_, &[f64]>> {
        let index = self.meta()?;
        ColumnView::new(index, self.values.as_slice()).ok()
    }

    /// Read and write as an L panel
    pub fn column_view_mut(&mut self) -> Option<ColumnView<'_, &mut [f64]>> {
        if self.index.is_empty() {
            return None;
        }
        let index = PanelIndex::parse(&self.index).ok()?;
        ColumnView::new(index, self.values.as_mut_slice()).ok()
    }

    /// Read as a U panel
    pub fn row_view(&self) -> Option<RowView<'_, &[f64]>> {
        let index = self.meta()?;
        RowView::new(index, self.values.as_slice()).ok()
    }

    /// Read and write as a U panel
    pub fn row_view_mut(&mut self) -> Option<RowView<'_, &mut [f64]>> {
        if self.index.is_empty() {
            return None;
        }
        let index = PanelIndex::parse(&self.index).ok()?;
        RowView::new(index, self.values.as_mut_slice()).ok()
    }
}

/// The L and U panels one process owns.
///
/// L column `k` is present when `k % npcol == mycol` (stored at local column
/// `k / npcol`); U row `k` when `k % nprow == myrow` (local row `k / nprow`).
/// A present panel may still be empty when this process holds no block of it.
#[derive(Debug, Clone)]
pub struct LuPanels {
    nprow: usize,
    npcol: usize,
    myrow: usize,
    mycol: usize,
    l: Vec<Panel>,
    u: Vec<Panel>,
}

impl LuPanels {
    /// Allocate zeroed panels for the process at `(myrow, mycol)` of an
    /// `nprow × npcol` layer.
    pub fn new(
        layout: &SupernodeLayout,
        nprow: usize,
        npcol: usize,
        myrow: usize,
        mycol: usize,
    ) -> Result<Self> {
        if myrow >= nprow || mycol >= npcol {
            return Err(Error::invalid_argument(
                "position",
                format!("({myrow}, {mycol}) outside {nprow}x{npcol} layer"),
            ));
        }
        let nsupers = layout.nsupers();
        let mut l = Vec::new();
        let mut u = Vec::new();
        reserve_exact(&mut l, "L panel array", nsupers.div_ceil(npcol))?;
        reserve_exact(&mut u, "U panel array", nsupers.div_ceil(nprow))?;

        for k in (mycol..nsupers).step_by(npcol) {
            let piece = layout.l_piece(k, myrow, nprow);
            l.push(Panel::new(PanelIndex::encode(layout, &piece, layout.super_size(k))?)?);
        }
        for k in (myrow..nsupers).step_by(nprow) {
            let piece = layout.u_piece(k, mycol, npcol);
            u.push(Panel::new(PanelIndex::encode(layout, &piece, layout.super_size(k))?)?);
        }

        Ok(Self {
            nprow,
            npcol,
            myrow,
            mycol,
            l,
            u,
        })
    }

    /// Allocate the panels for this process's position in `grid`
    pub fn for_grid<C: Communicator>(
        grid: &ProcessGrid3D<C>,
        layout: &SupernodeLayout,
    ) -> Result<Self> {
        Self::new(layout, grid.nprow(), grid.npcol(), grid.myrow(), grid.mycol())
    }

    fn l_slot(&self, k: usize) -> Result<usize> {
        if k % self.npcol != self.mycol || k / self.npcol >= self.l.len() {
            return Err(Error::topology(
                k,
                format!("L column not owned by process column {}", self.mycol),
            ));
        }
        Ok(k / self.npcol)
    }

    fn u_slot(&self, k: usize) -> Result<usize> {
        if k % self.nprow != self.myrow || k / self.nprow >= self.u.len() {
            return Err(Error::topology(
                k,
                format!("U row not owned by process row {}", self.myrow),
            ));
        }
        Ok(k / self.nprow)
    }

    /// L panel of supernode `k`
    pub fn l_panel(&self, k: usize) -> Result<&Panel> {
        Ok(&self.l[self.l_slot(k)?])
    }

    /// L panel of supernode `k`, mutable
    pub fn l_panel_mut(&mut self, k: usize) -> Result<&mut Panel> {
        let slot = self.l_slot(k)?;
        Ok(&mut self.l[slot])
    }

    /// U panel of supernode `k`
    pub fn u_panel(&self, k: usize) -> Result<&Panel> {
        Ok(&self.u[self.u_slot(k)?])
    }

    /// U panel of supernode `k`, mutable
    pub fn u_panel_mut(&mut self, k: usize) -> Result<&mut Panel> {
        let slot = self.u_slot(k)?;
        Ok(&mut self.u[slot])
    }

    /// Move the L panel of `k` out, leaving an empty panel in its slot
    pub(crate) fn take_l(&mut self, k: usize) -> Result<Panel> {
        Ok(std::mem::take(self.l_panel_mut(k)?))
    }

    /// Move the U panel of `k` out, leaving an empty panel in its slot
    pub(crate) fn take_u(&mut self, k: usize) -> Result<Panel> {
        Ok(std::mem::take(self.u_panel_mut(k)?))
    }

    /// Return a panel taken with [`Self::take_l`]
    pub(crate) fn restore_l(&mut self, k: usize, panel: Panel) -> Result<()> {
        *self.l_panel_mut(k)? = panel;
        Ok(())
    }

    /// Return a panel taken with [`Self::take_u`]
    pub(crate) fn restore_u(&mut self, k: usize, panel: Panel) -> Result<()> {
        *self.u_panel_mut(k)? = panel;
        Ok(())
    }

    /// Set every stored entry to `f(row, col)` (global coordinates).
    pub fn fill_with(&mut self, layout: &SupernodeLayout, f: impl Fn(usize, usize) -> f64) {
        for (slot, panel) in self.l.iter_mut().enumerate() {
            let k = slot * self.npcol + self.mycol;
            let col0 = layout.first_col(k);
            if let Some(mut view) = panel.column_view_mut() {
                let gids: Vec<usize> = view.index().gids().collect();
                for gid in gids {
                    let row0 = layout.first_col(gid);
                    if let Some(mut block) = view.block_mut(gid) {
                        for c in 0..block.cols() {
                            for r in 0..block.rows() {
                                block.set(r, c, f(row0 + r, col0 + c));
                            }
                        }
                    }
                }
            }
        }
        for (slot, panel) in self.u.iter_mut().enumerate() {
            let k = slot * self.nprow + self.myrow;
            let row0 = layout.first_col(k);
            if let Some(mut view) = panel.row_view_mut() {
                let gids: Vec<usize> = view.index().gids().collect();
                for gid in gids {
                    let col0 = layout.first_col(gid);
                    if let Some(mut block) = view.block_mut(gid) {
                        for c in 0..block.cols() {
                            for r in 0..block.rows() {
                                block.set(r, c, f(row0 + r, col0 + c));
                            }
                        }
                    }
                }
            }
        }
    }

    /// Stored value of global entry `(row, col)`, if this process holds it.
    ///
    /// Blocks on or below the diagonal live in L columns, blocks above it
    /// in U rows.
    pub fn entry(&self, layout: &SupernodeLayout, row: usize, col: usize) -> Option<f64> {
        let bi = layout.supernode_of(row)?;
        let bj = layout.supernode_of(col)?;
        let (r, c) = (row - layout.first_col(bi), col - layout.first_col(bj));
        if bi >= bj {
            let view = self.l_panel(bj).ok()?.column_view()?;
            view.block(bi).map(|b| b.get(r, c))
        } else {
            let view = self.u_panel(bi).ok()?.row_view()?;
            view.block(bj).map(|b| b.get(r, c))
        }
    }

    /// Call `f(row, col, value)` for every stored entry.
    pub fn for_each_entry(&self, layout: &SupernodeLayout, mut f: impl FnMut(usize, usize, f64)) {
        for (slot, panel) in self.l.iter().enumerate() {
            let col0 = layout.first_col(slot * self.npcol + self.mycol);
            let Some(view) = panel.column_view() else {
                continue;
            };
            for gid in view.index().gids() {
                let row0 = layout.first_col(gid);
                if let Some(block) = view.block(gid) {
                    for c in 0..block.cols() {
                        for r in 0..block.rows() {
                            f(row0 + r, col0 + c, block.get(r, c));
                        }
                    }
                }
            }
        }
        for (slot, panel) in self.u.iter().enumerate() {
            let row0 = layout.first_col(slot * self.nprow + self.myrow);
            let Some(view) = panel.row_view() else {
                continue;
            };
            for gid in view.index().gids() {
                let col0 = layout.first_col(gid);
                if let Some(block) = view.block(gid) {
                    for c in 0..block.cols() {
                        for r in 0..block.rows() {
                            f(row0 + r, col0 + c, block.get(r, c));
                        }
                    }
                }
            }
        }
    }

    /// Heap bytes held by all panels
    pub fn bytes(&self) -> usize {
        self.l.iter().chain(&self.u).map(Panel::bytes).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_roundtrip_fields() {
        let layout = SupernodeLayout::dense(vec![0, 2, 3, 6, 7]).unwrap();
        let idx = PanelIndex::encode(&layout, &[1, 2, 3], 2).unwrap();
        assert_eq!(idx, vec![3, 5, 2, 1, 2, 3, 0, 1, 4, 5]);
        let meta = PanelIndex::parse(&idx).unwrap();
        assert_eq!(meta.nzval_size(), 10);
        assert_eq!(meta.position(3), Some(2));
        assert_eq!(meta.position(0), None);
        assert_eq!(meta.block_size(1), 3);
        assert!(PanelIndex::encode(&layout, &[], 2).unwrap().is_empty());
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(PanelIndex::parse(&[]).is_err());
        assert!(PanelIndex::parse(&[1, 2, 1, 0, 0]).is_err());
        // starts do not end at stride
        assert!(PanelIndex::parse(&[1, 2, 1, 0, 0, 3]).is_err());
        // gids out of order
        assert!(PanelIndex::parse(&[2, 2, 1, 1, 0, 0, 1, 2]).is_err());
        assert!(PanelIndex::parse(&[1, 2, 1, 0, 0, 2]).is_ok());
    }

    #[test]
    fn test_panel_from_parts_checks_length() {
        let idx = vec![1, 2, 3, 4, 0, 2];
        assert!(Panel::from_parts(idx.clone(), vec![0.0; 6]).is_ok());
        assert!(Panel::from_parts(idx, vec![0.0; 5]).is_err());
        assert!(Panel::from_parts(vec![], vec![]).unwrap().is_empty());
    }

    #[test]
    fn test_views_address_blocks() {
        let layout = SupernodeLayout::uniform(3, 2).unwrap();
        // L panel of column 0 holding blocks 0 and 2 (stride 4, width 2)
        let idx = PanelIndex::encode(&layout, &[0, 2], 2).unwrap();
        let values: Vec<f64> = (0..8).map(|v| v as f64).collect();
        let panel = Panel::from_parts(idx, values).unwrap();
        let col = panel.column_view().unwrap();
        let b2 = col.block(2).unwrap();
        assert_eq!((b2.rows(), b2.cols(), b2.ld()), (2, 2, 4));
        assert_eq!(b2.get(1, 1), 7.0);
        assert_eq!(col.rows_from(2).get(0, 0), 2.0);

        // Same buffer read as a U panel: width 2, columns 0..4
        let row = panel.row_view().unwrap();
        assert_eq!(row.block(2).unwrap().get(0, 0), 4.0);
        assert_eq!(row.all().cols(), 4);
    }

    #[test]
    fn test_lu_panels_ownership_and_fill() {
        let layout = SupernodeLayout::uniform(4, 1).unwrap();
        // Process (1, 0) of a 2x2 layer
        let mut panels = LuPanels::new(&layout, 2, 2, 1, 0).unwrap();
        assert!(panels.l_panel(0).is_ok());
        assert!(panels.l_panel(1).is_err());
        assert!(panels.u_panel(1).is_ok());
        assert!(panels.u_panel(2).is_err());

        panels.fill_with(&layout, |r, c| (10 * r + c) as f64);
        // L column 2: diag block 2 is on row 0, so this process holds block 3
        assert_eq!(panels.entry(&layout, 3, 2), Some(32.0));
        assert_eq!(panels.entry(&layout, 2, 2), None);
        // U row 1 holds block columns 2 (col 0 of this process)
        assert_eq!(panels.entry(&layout, 1, 2), Some(12.0));
        assert_eq!(panels.entry(&layout, 1, 3), None);

        let mut seen = Vec::new();
        panels.for_each_entry(&layout, |r, c, v| seen.push((r, c, v)));
        assert!(seen.contains(&(1, 0, 10.0)));
        assert!(seen.iter().all(|&(r, c, v)| v == (10 * r + c) as f64));
    }

    #[test]
    fn test_take_and_restore() {
        let layout = SupernodeLayout::uniform(2, 1).unwrap();
        let mut panels = LuPanels::new(&layout, 1, 1, 0, 0).unwrap();
        panels.fill_with(&layout, |_, _| 1.0);
        let l0 = panels.take_l(0).unwrap();
        assert!(panels.l_panel(0).unwrap().is_empty());
        panels.restore_l(0, l0).unwrap();
        assert_eq!(panels.entry(&layout, 1, 0), Some(1.0));
    }
}
