//! Replay driver
//!
//! Drives a [`DqmArchiveSource`] the way an event-processing framework
//! would: it opens and closes segments, begins runs and lumis when their
//! identity changes and ends them (letting the source materialize their
//! data) before anything newer begins.

use crate::archive::SegmentOpener;
use crate::element::ElementStore;
use crate::source::{DqmArchiveSource, ItemType, LumiId, RunId, SourceResult};
use serde::Serialize;
use tracing::{debug, info};

/// One framework transition performed during replay
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "transition", rename_all = "snake_case")]
pub enum Transition {
    OpenSegment { index: usize, location: String },
    BeginRun { run: u32 },
    BeginLumi { run: u32, lumi: u32 },
    EndLumi { run: u32, lumi: u32, drained: bool },
    EndRun { run: u32, drained: bool },
    CloseSegment { index: usize, terminating: bool },
    Stop,
}

/// Framework-side replay state
#[derive(Debug, Default)]
pub struct Replay {
    run: Option<RunId>,
    lumi: Option<LumiId>,
    segment: Option<usize>,
    transitions: Vec<Transition>,
}

impl Replay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }

    /// Runs and lumis begun so far, in order
    pub fn boundaries(&self) -> Vec<Transition> {
        self.transitions
            .iter()
            .filter(|t| matches!(t, Transition::BeginRun { .. } | Transition::BeginLumi { .. }))
            .cloned()
            .collect()
    }

    /// Replay every segment until the source stops
    pub fn run<O: SegmentOpener>(
        &mut self,
        source: &mut DqmArchiveSource<O>,
        store: &mut dyn ElementStore,
    ) -> SourceResult<()> {
        while self.step(source, store)? {}
        info!(
            transitions = self.transitions.len(),
            stats = %source.stats(),
            "Replay finished"
        );
        Ok(())
    }

    /// Handle the next item; false once the source has stopped
    pub fn step<O: SegmentOpener>(
        &mut self,
        source: &mut DqmArchiveSource<O>,
        store: &mut dyn ElementStore,
    ) -> SourceResult<bool> {
        match source.next_item() {
            ItemType::SegmentBoundary => {
                self.close_segment(source, store, false)?;
                let info = source.open_next_segment()?;
                self.segment = Some(info.index);
                self.push(Transition::OpenSegment {
                    index: info.index,
                    location: info.location,
                });
            }
            ItemType::Run => {
                let run = source.peek_run()?;
                let changed = self.run != Some(run);
                if changed {
                    self.end_lumi(source, store)?;
                    self.end_run(source, store)?;
                }
                source.read_run()?;
                if changed {
                    self.run = Some(run);
                    self.push(Transition::BeginRun { run: run.0 });
                }
            }
            ItemType::Lumi => {
                let lumi = source.peek_lumi()?;
                let changed = self.lumi != Some(lumi);
                if changed {
                    self.end_lumi(source, store)?;
                }
                source.read_lumi(store)?;
                if changed {
                    self.lumi = Some(lumi);
                    self.push(Transition::BeginLumi {
                        run: lumi.run,
                        lumi: lumi.lumi,
                    });
                }
            }
            ItemType::Stop => {
                self.end_lumi(source, store)?;
                self.end_run(source, store)?;
                self.close_segment(source, store, true)?;
                self.push(Transition::Stop);
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn end_lumi<O: SegmentOpener>(
        &mut self,
        source: &mut DqmArchiveSource<O>,
        store: &mut dyn ElementStore,
    ) -> SourceResult<()> {
        if let Some(lumi) = self.lumi.take() {
            let drained = source.confirm_lumi_end(store, lumi)?;
            self.push(Transition::EndLumi {
                run: lumi.run,
                lumi: lumi.lumi,
                drained,
            });
        }
        Ok(())
    }

    fn end_run<O: SegmentOpener>(
        &mut self,
        source: &mut DqmArchiveSource<O>,
        store: &mut dyn ElementStore,
    ) -> SourceResult<()> {
        if let Some(run) = self.run.take() {
            let drained = source.confirm_run_end(store, run)?;
            self.push(Transition::EndRun {
                run: run.0,
                drained,
            });
        }
        Ok(())
    }

    fn close_segment<O: SegmentOpener>(
        &mut self,
        source: &mut DqmArchiveSource<O>,
        store: &mut dyn ElementStore,
        terminating: bool,
    ) -> SourceResult<()> {
        if let Some(index) = self.segment.take() {
            source.close_segment(store, terminating)?;
            self.push(Transition::CloseSegment { index, terminating });
        }
        Ok(())
    }

    fn push(&mut self, transition: Transition) {
        debug!(?transition, "Transition");
        self.transitions.push(transition);
    }
}
