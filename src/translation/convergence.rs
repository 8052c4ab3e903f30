/*!
 * The reconciliation loop.
 *
 * A run starts in `Initial`, translating the whole source in batches of
 * `default_batch_size`. Every later pass (`Retrying`) targets only the gap:
 * the source records still lacking an accepted translation. Retry passes use
 * `retry_batch_size` once fewer than `retry_batch_size_threshold` records are
 * missing. The loop ends in `Done` when the gap is empty, or in `Stalled`
 * when a pass leaves the gap size unchanged or `max_retry_passes` is reached.
 *
 * Batches of one pass may run concurrently (`max_concurrent_batches`), but
 * their results are merged in batch order and the gap is only recomputed
 * once the whole pass has finished.
 */

use futures::stream::{self, StreamExt};
use log::{debug, info, warn};
use std::fmt;
use std::sync::Arc;

use crate::app_config::ReconcileConfig;
use crate::dataset::{Record, SourceSet};
use crate::errors::StoreError;

use super::aggregate::{AggregatedSet, Aggregator, TranslatedRecord};
use super::batch::{Batch, BatchReport, BatchResult, BatchRunner};
use super::gaps::{GapFinder, GapSet};

/// State of the loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Initial,
    Retrying,
    Done,
    Stalled,
}

impl fmt::Display for LoopState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Initial => "initial",
            Self::Retrying => "retrying",
            Self::Done => "done",
            Self::Stalled => "stalled",
        };
        write!(f, "{}", name)
    }
}

/// Why a run stopped before the gap was empty
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StallReason {
    /// A retry pass left the gap size unchanged
    NoProgress,
    /// `max_retry_passes` retry passes ran
    PassLimit,
}

/// Terminal verdict of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Done,
    Stalled(StallReason),
}

impl RunStatus {
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done)
    }
}

/// Progress notifications emitted while the loop runs
#[derive(Debug, Clone, PartialEq)]
pub enum LoopEvent {
    PassStarted {
        pass: u32,
        state: LoopState,
        batch_size: usize,
        batch_count: usize,
        records: usize,
    },
    BatchFinished {
        pass: u32,
        sequence: u64,
        requested: usize,
        accepted: usize,
    },
    PassFinished {
        pass: u32,
        gap: usize,
    },
    Finished {
        status: RunStatus,
        passes: u32,
        unresolved: usize,
    },
}

/// Receives `LoopEvent`s
pub type LoopObserver = Arc<dyn Fn(&LoopEvent) + Send + Sync>;

/// Counters collected over a run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunStats {
    pub batches: usize,
    pub completion_calls: u64,
    pub failed_batches: usize,
    pub malformed_entries: usize,
    pub dropped_tail_entries: usize,
    pub persist_failures: usize,
    /// Batches reloaded from the store when resuming
    pub restored_batches: usize,
}

impl RunStats {
    fn record(&mut self, report: &BatchReport) {
        self.batches += 1;
        self.completion_calls += u64::from(report.attempts);
        if report.failure.is_some() {
            self.failed_batches += 1;
        }
        self.malformed_entries += report.malformed;
        if report.dropped_tail.is_some() {
            self.dropped_tail_entries += 1;
        }
        if !report.persisted {
            self.persist_failures += 1;
        }
    }
}

/// Result of a finished run
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub status: RunStatus,
    /// Passes executed, counting passes of an interrupted run that was resumed
    pub passes: u32,
    pub aggregated: AggregatedSet,
    /// Accepted translations in source order
    pub translations: Vec<TranslatedRecord>,
    /// Ids still missing, in source order; empty when done
    pub unresolved: Vec<u64>,
    pub stats: RunStats,
}

/// Where a run starts from
struct Checkpoint {
    aggregated: AggregatedSet,
    /// Last finished pass, 0 when nothing ran yet
    pass: u32,
    next_sequence: u64,
}

/// Drives batch passes until the source is fully translated or no progress is made
pub struct ConvergenceLoop {
    runner: BatchRunner,
    config: ReconcileConfig,
    observer: Option<LoopObserver>,
}

impl fmt::Debug for ConvergenceLoop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConvergenceLoop")
            .field("runner", &self.runner)
            .field("config", &self.config)
            .finish()
    }
}

/// Split records into consecutive batches, numbering them from `next_sequence`
pub fn partition(records: &[Record], batch_size: usize, pass: u32, next_sequence: &mut u64) -> Vec<Batch> {
    records
        .chunks(batch_size.max(1))
        .map(|chunk| {
            let batch = Batch {
                sequence: *next_sequence,
                pass,
                records: chunk.to_vec(),
            };
            *next_sequence += 1;
            batch
        })
        .collect()
}

impl ConvergenceLoop {
    pub fn new(runner: BatchRunner, config: ReconcileConfig) -> Self {
        Self {
            runner,
            config,
            observer: None,
        }
    }

    pub fn with_observer(mut self, observer: LoopObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    fn emit(&self, event: LoopEvent) {
        if let Some(observer) = &self.observer {
            observer(&event);
        }
    }

    /// Translate `source` from scratch
    pub async fn run(&self, source: &SourceSet) -> RunOutcome {
        let checkpoint = Checkpoint {
            aggregated: AggregatedSet::new(),
            pass: 0,
            next_sequence: 1,
        };
        self.drive(source, checkpoint, RunStats::default()).await
    }

    /// Continue a run from the batches already in the store.
    ///
    /// Results are reloaded in sequence order and merged; entries for ids not in
    /// `source` are discarded. With nothing stored this is the same as `run`.
    pub async fn resume(&self, source: &SourceSet) -> Result<RunOutcome, StoreError> {
        let stored = self.runner.store().load_all()?;
        if stored.is_empty() {
            info!("No stored batches found, starting from the initial pass");
            return Ok(self.run(source).await);
        }

        let restored: Vec<BatchResult> = stored
            .into_iter()
            .map(|mut result| {
                let before = result.entries.len();
                result.entries.retain(|entry| source.contains(entry.id));
                if result.entries.len() != before {
                    warn!(
                        "Batch {} holds {} entries for unknown ids, ignoring them",
                        result.sequence,
                        before - result.entries.len()
                    );
                }
                result
            })
            .collect();

        let pass = restored.iter().map(|r| r.pass).max().unwrap_or(0);
        let next_sequence = restored.iter().map(|r| r.sequence).max().unwrap_or(0) + 1;
        let aggregated = Aggregator::merge_all(AggregatedSet::new(), &restored);

        info!(
            "Restored {} translations from {} stored batches (last pass {})",
            aggregated.len(),
            restored.len(),
            pass
        );

        let stats = RunStats {
            restored_batches: restored.len(),
            ..RunStats::default()
        };
        let checkpoint = Checkpoint {
            aggregated,
            pass,
            next_sequence,
        };
        Ok(self.drive(source, checkpoint, stats).await)
    }

    async fn drive(&self, source: &SourceSet, checkpoint: Checkpoint, mut stats: RunStats) -> RunOutcome {
        let Checkpoint {
            mut aggregated,
            mut pass,
            mut next_sequence,
        } = checkpoint;

        let mut state = if pass == 0 { LoopState::Initial } else { LoopState::Retrying };
        let mut gap = GapFinder::find(source, &aggregated);
        let mut previous_gap = gap.len();

        let status = loop {
            if state == LoopState::Retrying {
                if gap.is_empty() {
                    break RunStatus::Done;
                }
                let retries_done = pass.saturating_sub(1);
                if retries_done >= self.config.max_retry_passes {
                    break RunStatus::Stalled(StallReason::PassLimit);
                }
            }

            let (targets, batch_size) = match state {
                LoopState::Initial => (source.records(), self.config.default_batch_size),
                _ => (gap.records(), self.config.retry_pass_batch_size(gap.len())),
            };

            pass += 1;
            let batches = partition(targets, batch_size, pass, &mut next_sequence);
            info!(
                "Pass {} ({}): {} records in {} batches of up to {}",
                pass,
                state,
                targets.len(),
                batches.len(),
                batch_size
            );
            self.emit(LoopEvent::PassStarted {
                pass,
                state,
                batch_size,
                batch_count: batches.len(),
                records: targets.len(),
            });

            let results = self.run_pass(batches, &mut stats).await;
            aggregated = Aggregator::merge_all(aggregated, &results);

            let new_gap = GapFinder::find(source, &aggregated);
            info!("Pass {} finished: {} records still missing", pass, new_gap.len());
            self.emit(LoopEvent::PassFinished {
                pass,
                gap: new_gap.len(),
            });

            if new_gap.is_empty() {
                break RunStatus::Done;
            }
            if state == LoopState::Retrying && new_gap.len() == previous_gap {
                warn!("Pass {} made no progress, stopping", pass);
                break RunStatus::Stalled(StallReason::NoProgress);
            }

            previous_gap = new_gap.len();
            gap = new_gap;
            state = LoopState::Retrying;
        };

        let final_gap: GapSet = GapFinder::find(source, &aggregated);
        let unresolved = final_gap.ids();
        match status {
            RunStatus::Done => info!("All {} records translated after {} passes", source.len(), pass),
            RunStatus::Stalled(reason) => warn!(
                "Stalled ({:?}) after {} passes with {} records unresolved",
                reason,
                pass,
                unresolved.len()
            ),
        }
        self.emit(LoopEvent::Finished {
            status,
            passes: pass,
            unresolved: unresolved.len(),
        });

        RunOutcome {
            status,
            passes: pass,
            translations: aggregated.in_source_order(source),
            aggregated,
            unresolved,
            stats,
        }
    }

    /// Run every batch of a pass, at most `max_concurrent_batches` at a time,
    /// and return their results in batch order.
    async fn run_pass(&self, batches: Vec<Batch>, stats: &mut RunStats) -> Vec<BatchResult> {
        let runner = &self.runner;
        let mut reports = stream::iter(batches)
            .map(move |batch| async move { runner.run(&batch).await })
            .buffered(self.config.max_concurrent_batches.max(1));

        let mut results = Vec::new();
        while let Some(report) = reports.next().await {
            debug!(
                "Batch {} done: {}/{} accepted after {} call(s)",
                report.result.sequence,
                report.accepted(),
                report.requested,
                report.attempts
            );
            stats.record(&report);
            self.emit(LoopEvent::BatchFinished {
                pass: report.result.pass,
                sequence: report.result.sequence,
                requested: report.requested,
                accepted: report.accepted(),
            });
            results.push(report.result);
        }
        results
    }
}
