//! Binned histogram payloads
//!
//! One structure covers every histogram kind: 1-D, 2-D and 3-D histograms
//! and 1-D/2-D profiles. Each present axis carries an underflow bin (index 0)
//! and an overflow bin (index `bins + 1`), so contents hold
//! `(nx + 2) * (ny + 2) * (nz + 2)` cells with X varying fastest.
//!
//! Profiles reuse the layout: `contents` holds the weighted sum of values per
//! cell, `sumw2` the weighted sum of squared values and `bin_entries` the sum
//! of weights.

use crate::element::kind::BinStorage;
use crate::element::merge::MergeError;
use serde::{Deserialize, Serialize};

/// Relative tolerance when comparing bin widths and edges of extendable axes
const EDGE_TOLERANCE: f64 = 1e-9;

/// Largest bin count an axis may have, including after extension
pub const MAX_AXIS_BINS: u32 = 1 << 20;

/// Largest number of cells (under/overflow included) of one histogram
pub const MAX_CELLS: usize = 1 << 24;

/// A fixed-width binned axis
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Axis {
    pub bins: u32,
    pub min: f64,
    pub max: f64,
}

impl Axis {
    pub fn new(bins: u32, min: f64, max: f64) -> Self {
        Self { bins, min, max }
    }

    pub fn width(&self) -> f64 {
        (self.max - self.min) / self.bins as f64
    }

    /// Cells including underflow and overflow
    fn cells(&self) -> usize {
        self.bins as usize + 2
    }

    /// At least one bin, at most [`MAX_AXIS_BINS`], and a finite range
    pub fn is_valid(&self) -> bool {
        self.bins >= 1
            && self.bins <= MAX_AXIS_BINS
            && self.min.is_finite()
            && self.max.is_finite()
            && self.min < self.max
    }

    /// Bin holding `value`: 0 is underflow, `bins + 1` is overflow
    pub fn find_bin(&self, value: f64) -> usize {
        if value.is_nan() || value < self.min {
            0
        } else if value >= self.max {
            self.bins as usize + 1
        } else {
            let bin = ((value - self.min) / self.width()) as usize + 1;
            bin.min(self.bins as usize)
        }
    }

    /// Smallest axis with the same bin width covering both axes, plus the
    /// bin offset of each input inside it
    fn union(&self, other: &Axis) -> Option<(Axis, usize, usize)> {
        let width = self.width();
        let other_width = other.width();
        if !(width.is_finite() && width > 0.0) || !approx_eq(width, other_width) {
            return None;
        }

        let min = self.min.min(other.min);
        let max = self.max.max(other.max);
        let bins = whole_bins(max - min, width)?;
        let self_offset = whole_bins(self.min - min, width)?;
        let other_offset = whole_bins(other.min - min, width)?;

        Some((
            Axis::new(bins, min, max),
            self_offset as usize,
            other_offset as usize,
        ))
    }
}

fn approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() <= EDGE_TOLERANCE * a.abs().max(b.abs()).max(1.0)
}

/// `span / width` when it is a whole number of bins no larger than
/// [`MAX_AXIS_BINS`]
fn whole_bins(span: f64, width: f64) -> Option<u32> {
    let n = span / width;
    let rounded = n.round();
    if !(0.0..=MAX_AXIS_BINS as f64).contains(&rounded) || !approx_eq(n, rounded) {
        return None;
    }
    u32::try_from(rounded as u64).ok()
}

/// Cell count for a set of axes, `None` on overflow
fn cell_count(x: &Axis, y: Option<&Axis>, z: Option<&Axis>) -> Option<usize> {
    [Some(x), y, z]
        .into_iter()
        .flatten()
        .try_fold(1usize, |cells, axis| cells.checked_mul(axis.cells()))
}

/// A 1-D, 2-D or 3-D histogram or profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Histogram {
    pub x: Axis,
    #[serde(default)]
    pub y: Option<Axis>,
    #[serde(default)]
    pub z: Option<Axis>,
    contents: Vec<f64>,
    /// Sum of squared weights (values for profiles); empty when not tracked
    #[serde(default)]
    sumw2: Vec<f64>,
    /// Sum of weights per cell, profiles only
    #[serde(default)]
    bin_entries: Vec<f64>,
    pub entries: f64,
    /// Axes may grow to absorb differently ranged contributions
    #[serde(default)]
    pub can_extend: bool,
}

impl Histogram {
    fn with_axes(x: Axis, y: Option<Axis>, z: Option<Axis>) -> Self {
        let cells = x.cells()
            * y.map(|a| a.cells()).unwrap_or(1)
            * z.map(|a| a.cells()).unwrap_or(1);
        Self {
            x,
            y,
            z,
            contents: vec![0.0; cells],
            sumw2: Vec::new(),
            bin_entries: Vec::new(),
            entries: 0.0,
            can_extend: false,
        }
    }

    pub fn new_1d(bins: u32, min: f64, max: f64) -> Self {
        Self::with_axes(Axis::new(bins, min, max), None, None)
    }

    pub fn new_2d(x: Axis, y: Axis) -> Self {
        Self::with_axes(x, Some(y), None)
    }

    pub fn new_3d(x: Axis, y: Axis, z: Axis) -> Self {
        Self::with_axes(x, Some(y), Some(z))
    }

    pub fn profile_1d(bins: u32, min: f64, max: f64) -> Self {
        Self::new_1d(bins, min, max).into_profile()
    }

    pub fn profile_2d(x: Axis, y: Axis) -> Self {
        Self::new_2d(x, y).into_profile()
    }

    fn into_profile(mut self) -> Self {
        self.sumw2 = vec![0.0; self.contents.len()];
        self.bin_entries = vec![0.0; self.contents.len()];
        self
    }

    /// Builder: track the sum of squared weights
    pub fn with_sumw2(mut self) -> Self {
        if self.sumw2.is_empty() {
            self.sumw2 = vec![0.0; self.contents.len()];
        }
        self
    }

    /// Builder: allow axes to be extended on merge
    pub fn extendable(mut self, can_extend: bool) -> Self {
        self.can_extend = can_extend;
        self
    }

    pub fn dimension(&self) -> usize {
        1 + self.y.is_some() as usize + self.z.is_some() as usize
    }

    pub fn is_profile(&self) -> bool {
        !self.bin_entries.is_empty()
    }

    /// Axes are valid and every per-cell vector matches the axes
    ///
    /// Decoded histograms must pass this before they are merged or filled.
    pub fn is_well_formed(&self) -> bool {
        let axes_valid = self.x.is_valid()
            && self.y.map_or(true, |a| a.is_valid())
            && self.z.map_or(true, |a| a.is_valid())
            && (self.z.is_none() || self.y.is_some());
        if !axes_valid {
            return false;
        }
        let Some(cells) = cell_count(&self.x, self.y.as_ref(), self.z.as_ref()) else {
            return false;
        };
        cells <= MAX_CELLS
            && self.contents.len() == cells
            && (self.sumw2.is_empty() || self.sumw2.len() == cells)
            && (self.bin_entries.is_empty() || self.sumw2.len() == cells)
            && (self.bin_entries.is_empty() || self.bin_entries.len() == cells)
    }

    pub fn contents(&self) -> &[f64] {
        &self.contents
    }

    pub fn sumw2(&self) -> &[f64] {
        &self.sumw2
    }

    /// Sum over every cell, including under/overflow
    pub fn sum(&self) -> f64 {
        self.contents.iter().sum()
    }

    fn ny_cells(&self) -> usize {
        self.y.map(|a| a.cells()).unwrap_or(1)
    }

    fn global_bin(&self, ix: usize, iy: usize, iz: usize) -> usize {
        ix + self.x.cells() * (iy + self.ny_cells() * iz)
    }

    fn split_bin(&self, global: usize) -> (usize, usize, usize) {
        let nx = self.x.cells();
        let ny = self.ny_cells();
        (global % nx, (global / nx) % ny, global / (nx * ny))
    }

    fn locate(&self, coords: &[f64]) -> usize {
        let coord = |i: usize| coords.get(i).copied().unwrap_or(0.0);
        let ix = self.x.find_bin(coord(0));
        let iy = self.y.map(|a| a.find_bin(coord(1))).unwrap_or(0);
        let iz = self.z.map(|a| a.find_bin(coord(2))).unwrap_or(0);
        self.global_bin(ix, iy, iz)
    }

    /// Content of the cell at per-axis bin indices
    pub fn bin_content(&self, ix: usize, iy: usize, iz: usize) -> f64 {
        self.contents
            .get(self.global_bin(ix, iy, iz))
            .copied()
            .unwrap_or(0.0)
    }

    /// Fill a plain histogram at `coords` (one coordinate per axis)
    pub fn fill(&mut self, coords: &[f64], weight: f64) {
        let bin = self.locate(coords);
        self.contents[bin] += weight;
        if !self.sumw2.is_empty() {
            self.sumw2[bin] += weight * weight;
        }
        self.entries += 1.0;
    }

    /// Fill a profile: `value` is averaged per cell
    pub fn fill_profile(&mut self, coords: &[f64], value: f64, weight: f64) {
        if !self.is_profile() {
            self.fill(coords, weight);
            return;
        }
        let bin = self.locate(coords);
        self.contents[bin] += weight * value;
        self.sumw2[bin] += weight * value * value;
        self.bin_entries[bin] += weight;
        self.entries += 1.0;
    }

    /// Mean value of a profile cell
    pub fn profile_mean(&self, ix: usize, iy: usize) -> Option<f64> {
        let bin = self.global_bin(ix, iy, 0);
        let weight = *self.bin_entries.get(bin)?;
        if weight == 0.0 {
            None
        } else {
            Some(self.contents[bin] / weight)
        }
    }

    /// Clear all contents, keeping the binning
    pub fn reset(&mut self) {
        self.contents.iter_mut().for_each(|c| *c = 0.0);
        self.sumw2.iter_mut().for_each(|c| *c = 0.0);
        self.bin_entries.iter_mut().for_each(|c| *c = 0.0);
        self.entries = 0.0;
    }

    /// Bin counts and axis ranges match exactly on every axis
    pub fn same_binning(&self, other: &Histogram) -> bool {
        self.x == other.x && self.y == other.y && self.z == other.z
    }

    /// Bin-wise addition; requires identical binning
    pub fn add(&mut self, other: &Histogram) -> Result<(), MergeError> {
        if !self.same_binning(other) {
            return Err(MergeError::AxisMismatch);
        }

        add_cells(&mut self.contents, &other.contents);
        if self.sumw2.len() == other.sumw2.len() {
            add_cells(&mut self.sumw2, &other.sumw2);
        } else {
            self.sumw2.clear();
        }
        if self.bin_entries.len() == other.bin_entries.len() {
            add_cells(&mut self.bin_entries, &other.bin_entries);
        }
        self.entries += other.entries;

        Ok(())
    }

    /// Combine with another extendable histogram, growing the axes to the
    /// union of both ranges when they differ
    pub fn merge_extendable(&mut self, other: &Histogram) -> Result<(), MergeError> {
        if self.dimension() != other.dimension() || self.is_profile() != other.is_profile() {
            return Err(MergeError::ShapeMismatch);
        }
        if self.same_binning(other) {
            return self.add(other);
        }

        let (x, sx, ox) = self
            .x
            .union(&other.x)
            .ok_or(MergeError::IncompatibleBinning)?;
        let (y, sy, oy) = union_optional(self.y, other.y)?;
        let (z, sz, oz) = union_optional(self.z, other.z)?;
        match cell_count(&x, y.as_ref(), z.as_ref()) {
            Some(cells) if cells <= MAX_CELLS => {}
            _ => return Err(MergeError::IncompatibleBinning),
        }

        let mut merged = Histogram::with_axes(x, y, z);
        merged.can_extend = self.can_extend;
        if !self.sumw2.is_empty() && !other.sumw2.is_empty() {
            merged.sumw2 = vec![0.0; merged.contents.len()];
        }
        if self.is_profile() {
            merged.bin_entries = vec![0.0; merged.contents.len()];
        }

        merged.absorb(self, [sx, sy, sz]);
        merged.absorb(other, [ox, oy, oz]);
        merged.entries = self.entries + other.entries;

        *self = merged;
        Ok(())
    }

    /// Add every cell of `source` into this (larger) histogram
    fn absorb(&mut self, source: &Histogram, offsets: [usize; 3]) {
        let target_bins = [
            self.x.bins as usize,
            self.y.map(|a| a.bins as usize).unwrap_or(0),
            self.z.map(|a| a.bins as usize).unwrap_or(0),
        ];
        let source_bins = [
            source.x.bins as usize,
            source.y.map(|a| a.bins as usize).unwrap_or(0),
            source.z.map(|a| a.bins as usize).unwrap_or(0),
        ];
        let present = [true, self.y.is_some(), self.z.is_some()];

        let remap = |axis: usize, idx: usize| -> usize {
            if !present[axis] || idx == 0 {
                idx
            } else if idx == source_bins[axis] + 1 {
                target_bins[axis] + 1
            } else {
                idx + offsets[axis]
            }
        };

        for (global, value) in source.contents.iter().enumerate() {
            let (ix, iy, iz) = source.split_bin(global);
            let target = self.global_bin(remap(0, ix), remap(1, iy), remap(2, iz));
            if let Some(cell) = self.contents.get_mut(target) {
                *cell += value;
            }
            if let (Some(cell), Some(w)) = (self.sumw2.get_mut(target), source.sumw2.get(global)) {
                *cell += w;
            }
            if let (Some(cell), Some(w)) = (
                self.bin_entries.get_mut(target),
                source.bin_entries.get(global),
            ) {
                *cell += w;
            }
        }
    }

    /// Round contents to the given storage representation
    pub fn normalize(&mut self, storage: BinStorage) {
        self.contents
            .iter_mut()
            .for_each(|c| *c = storage.normalize(*c));
    }
}

fn add_cells(target: &mut [f64], source: &[f64]) {
    for (t, s) in target.iter_mut().zip(source) {
        *t += s;
    }
}

fn union_optional(
    a: Option<Axis>,
    b: Option<Axis>,
) -> Result<(Option<Axis>, usize, usize), MergeError> {
    match (a, b) {
        (None, None) => Ok((None, 0, 0)),
        (Some(a), Some(b)) => {
            let (axis, sa, sb) = a.union(&b).ok_or(MergeError::IncompatibleBinning)?;
            Ok((Some(axis), sa, sb))
        }
        _ => Err(MergeError::ShapeMismatch),
    }
}
