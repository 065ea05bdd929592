//! Index records and traversal order
//!
//! The index table of a segment lists one row per contiguous block of data
//! rows sharing an element type and a (run, lumi). Rows for one (run, lumi)
//! may be scattered through the table, so before replay they are threaded
//! into a [`TraversalOrder`] in which every group is contiguous:
//!
//! ```text
//! raw:    (1,0) (1,1) (1,0) (2,0)
//! order:  (1,0) (1,0) (1,1) (2,0)      groups keep first-appearance order
//! ```
//!
//! The order is an arena of doubly-linked nodes, one per raw row. A node's
//! [`Position`] is stable for the life of the segment.

use crate::archive::{ArchiveResult, Container, Table, INDICES_TABLE};
use crate::element::TypeTag;
use crate::source::error::{SourceError, SourceResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::ops::RangeInclusive;

/// On-disk layout of an index table row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexRow {
    pub run: u32,
    /// 0 means the row holds run-scoped data
    pub lumi: u32,
    pub type_index: u32,
    pub first_index: u64,
    pub last_index: u64,
}

/// A validated index row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IndexRecord {
    pub run: u32,
    pub lumi: u32,
    pub type_tag: TypeTag,
    pub first_row: u64,
    pub last_row: u64,
}

impl IndexRecord {
    pub fn new(run: u32, lumi: u32, type_tag: TypeTag, first_row: u64, last_row: u64) -> Self {
        Self {
            run,
            lumi,
            type_tag,
            first_row,
            last_row,
        }
    }

    /// Validate raw index row number `row`
    pub fn from_row(row: u64, raw: IndexRow) -> SourceResult<Self> {
        let type_tag = TypeTag::try_from(raw.type_index).map_err(|type_index| {
            SourceError::UnknownType { row, type_index }
        })?;
        if raw.first_index > raw.last_index {
            return Err(SourceError::InvalidRange {
                row,
                first: raw.first_index,
                last: raw.last_index,
            });
        }
        Ok(Self::new(
            raw.run,
            raw.lumi,
            type_tag,
            raw.first_index,
            raw.last_index,
        ))
    }

    pub fn to_row(&self) -> IndexRow {
        IndexRow {
            run: self.run,
            lumi: self.lumi,
            type_index: self.type_tag as u32,
            first_index: self.first_row,
            last_index: self.last_row,
        }
    }

    pub fn run_lumi(&self) -> (u32, u32) {
        (self.run, self.lumi)
    }

    /// Lumi-scoped data (as opposed to run-scoped)
    pub fn is_lumi(&self) -> bool {
        self.lumi != 0
    }

    /// Data table rows covered, inclusive on both ends
    pub fn rows(&self) -> RangeInclusive<u64> {
        self.first_row..=self.last_row
    }

    pub fn row_count(&self) -> u64 {
        self.last_row - self.first_row + 1
    }
}

/// Decode and validate every row of an index table
pub fn decode_index(table: &Table) -> SourceResult<Vec<IndexRecord>> {
    (0..table.len())
        .map(|row| {
            let raw: IndexRow = table.decode(row)?;
            IndexRecord::from_row(row, raw)
        })
        .collect()
}

/// Read the index table of an opened container
pub fn load_index(container: &mut dyn Container) -> SourceResult<Vec<IndexRecord>> {
    let table = container
        .table(INDICES_TABLE)?
        .ok_or_else(|| SourceError::MissingIndexTable(container.location().to_string()))?;
    decode_index(&table)
}

/// Encode records into an index table
pub fn index_table(records: &[IndexRecord]) -> ArchiveResult<Table> {
    let mut table = Table::new(INDICES_TABLE);
    for record in records {
        table.push_row(&record.to_row())?;
    }
    Ok(table)
}

/// Stable handle to a node of a [`TraversalOrder`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Position(usize);

#[derive(Debug, Clone, Copy)]
struct Node {
    prev: Option<usize>,
    next: Option<usize>,
}

/// Group-contiguous visiting order over the raw index rows
///
/// Node `i` always stands for raw row `i`; nodes are allocated in raw order
/// and only their links change.
#[derive(Debug, Clone, Default)]
pub struct TraversalOrder {
    nodes: Vec<Node>,
    head: Option<usize>,
    tail: Option<usize>,
    /// (run, first position of that run) each time the run changes
    run_starts: Vec<(u32, Position)>,
}

impl TraversalOrder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Thread `records` so every (run, lumi) group is contiguous
    ///
    /// Groups appear in the order of their first raw row; within a group rows
    /// keep their raw order.
    pub fn build(records: &[IndexRecord]) -> Self {
        let mut order = Self {
            nodes: Vec::with_capacity(records.len()),
            ..Self::default()
        };
        let mut group_tail: HashMap<(u32, u32), Position> = HashMap::new();
        let mut last_run = None;

        for record in records {
            match group_tail.get_mut(&record.run_lumi()) {
                Some(tail) => *tail = order.insert_after(*tail),
                None => {
                    let pos = order.push_back();
                    group_tail.insert(record.run_lumi(), pos);
                    if last_run != Some(record.run) {
                        last_run = Some(record.run);
                        order.run_starts.push((record.run, pos));
                    }
                }
            }
        }
        order
    }

    /// Allocate the node for the next raw row at the end of the order
    pub fn push_back(&mut self) -> Position {
        let idx = self.nodes.len();
        self.nodes.push(Node {
            prev: self.tail,
            next: None,
        });
        match self.tail {
            Some(tail) => self.nodes[tail].next = Some(idx),
            None => self.head = Some(idx),
        }
        self.tail = Some(idx);
        Position(idx)
    }

    /// Allocate the node for the next raw row right after `after`
    pub fn insert_after(&mut self, after: Position) -> Position {
        let idx = self.nodes.len();
        let next = self.nodes[after.0].next;
        self.nodes.push(Node {
            prev: Some(after.0),
            next,
        });
        self.nodes[after.0].next = Some(idx);
        match next {
            Some(next) => self.nodes[next].prev = Some(idx),
            None => self.tail = Some(idx),
        }
        Position(idx)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn first(&self) -> Option<Position> {
        self.head.map(Position)
    }

    pub fn last(&self) -> Option<Position> {
        self.tail.map(Position)
    }

    pub fn next(&self, pos: Position) -> Option<Position> {
        self.nodes.get(pos.0).and_then(|n| n.next).map(Position)
    }

    pub fn prev(&self, pos: Position) -> Option<Position> {
        self.nodes.get(pos.0).and_then(|n| n.prev).map(Position)
    }

    /// Raw index row a position stands for
    pub fn record_index(&self, pos: Position) -> usize {
        pos.0
    }

    /// Position of raw index row `raw`
    pub fn position_of(&self, raw: usize) -> Option<Position> {
        (raw < self.nodes.len()).then_some(Position(raw))
    }

    /// First position of the first stretch of `run`
    pub fn run_start(&self, run: u32) -> Option<Position> {
        self.run_starts
            .iter()
            .find(|(r, _)| *r == run)
            .map(|(_, pos)| *pos)
    }

    /// Raw row indices in traversal order
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        std::iter::successors(self.head, move |&idx| self.nodes[idx].next)
    }

    /// For each raw row, its ordinal in the traversal
    pub fn ordinals(&self) -> Vec<usize> {
        let mut ordinals = vec![0; self.nodes.len()];
        for (ordinal, raw) in self.iter().enumerate() {
            ordinals[raw] = ordinal;
        }
        ordinals
    }
}
