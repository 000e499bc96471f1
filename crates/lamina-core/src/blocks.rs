//! Partition of a stack into Gblocks and detection of interchangeable blocks.
//!
//! A block spans layers `start..=end` and owns junctions `start..end`, at
//! most one of which carries an active sheet. Consecutive blocks share their
//! bounding layer: block `k + 1` starts at the layer where block `k` ends, so
//! every junction belongs to exactly one block.

use crate::types::{Medium, SheetId, Structure};

/// A contiguous run of layers with at most one active sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Block {
    /// First layer (port 1 side).
    pub start: usize,
    /// Last layer (port 2 side).
    pub end: usize,
    /// Junction carrying the block's active sheet, if any.
    pub sheet_junction: Option<usize>,
}

impl Block {
    pub fn layer_count(&self) -> usize {
        self.end - self.start + 1
    }

    pub fn junctions(&self) -> std::ops::Range<usize> {
        self.start..self.end
    }
}

/// Split the stack at sheet junctions.
pub fn partition(structure: &Structure) -> Vec<Block> {
    let n_layers = structure.layers().len();
    let mut blocks = Vec::new();
    let mut start = 0;
    let mut sheet_junction: Option<usize> = None;

    for j in 0..n_layers - 1 {
        if !structure.has_active_sheet(j) {
            continue;
        }
        if sheet_junction.is_some() {
            blocks.push(Block {
                start,
                end: j,
                sheet_junction,
            });
            start = j;
        }
        sheet_junction = Some(j);
    }
    blocks.push(Block {
        start,
        end: n_layers - 1,
        sheet_junction,
    });
    blocks
}

/// Everything that determines a block's GSM apart from the sheet's lateral
/// offset. Blocks with equal keys are interchangeable.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockKey {
    sheet: SheetId,
    sheet_position: usize,
    layer_count: usize,
    /// Media of the bounding layers.
    bounds: [Medium; 2],
    /// Mode counts of the bounding layers.
    bound_modes: [usize; 2],
    /// Medium, width and mode count of each layer strictly inside the block.
    interior: Vec<(Medium, f64, usize)>,
    /// Inert sheets riding on the block's dielectric junctions.
    passive: Vec<Option<SheetId>>,
}

impl BlockKey {
    /// Key of `block`; `None` when the block has no active sheet and is
    /// therefore never worth caching.
    pub fn new(structure: &Structure, block: &Block, mode_counts: &[usize]) -> Option<Self> {
        let junction = block.sheet_junction?;
        let sheet = structure.junctions()[junction]?.sheet;
        let layers = structure.layers();
        Some(Self {
            sheet,
            sheet_position: junction - block.start,
            layer_count: block.layer_count(),
            bounds: [layers[block.start].medium, layers[block.end].medium],
            bound_modes: [mode_counts[block.start], mode_counts[block.end]],
            interior: (block.start + 1..block.end)
                .map(|i| (layers[i].medium, layers[i].width, mode_counts[i]))
                .collect(),
            passive: block
                .junctions()
                .map(|j| {
                    structure.junctions()[j]
                        .filter(|_| j != junction)
                        .map(|p| p.sheet)
                })
                .collect(),
        })
    }
}
