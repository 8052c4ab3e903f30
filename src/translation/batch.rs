/*!
 * Batch translation processing.
 *
 * This module runs one batch end to end: prompt, paced completion call with
 * retries, response parsing, tail guard, and persistence of the accepted
 * entries.
 */

use log::{debug, error, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::app_config::{ReconcileConfig, TailGuard};
use crate::dataset::Record;
use crate::errors::ProviderError;
use crate::providers::CompletionService;
use crate::session::BatchStore;

use super::aggregate::TranslatedRecord;
use super::pacing::{Pacer, RetryPolicy};
use super::parser::{ParsedEntry, ResponseParser};
use super::prompts::PromptBuilder;

/// Records sent together in one completion request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    /// Run-wide, strictly increasing
    pub sequence: u64,
    /// 1 for the initial pass, then 2, 3, ... for retry passes
    pub pass: u32,
    pub records: Vec<Record>,
}

impl Batch {
    pub fn ids(&self) -> Vec<u64> {
        self.records.iter().map(|r| r.id).collect()
    }
}

/// Accepted entries of one batch, in emission order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchResult {
    pub sequence: u64,
    pub pass: u32,
    pub entries: Vec<TranslatedRecord>,
}

impl BatchResult {
    pub fn empty(batch: &Batch) -> Self {
        Self {
            sequence: batch.sequence,
            pass: batch.pass,
            entries: Vec::new(),
        }
    }
}

/// What happened while running one batch
#[derive(Debug, Clone)]
pub struct BatchReport {
    pub result: BatchResult,
    /// Records in the batch
    pub requested: usize,
    /// Completion calls made, including retries
    pub attempts: u32,
    /// Entries the parser found
    pub parsed: usize,
    /// Malformed entries among those kept after the tail guard
    pub malformed: usize,
    /// Id of the entry discarded by the tail guard
    pub dropped_tail: Option<u64>,
    /// Error of the last attempt when no response was obtained
    pub failure: Option<ProviderError>,
    /// Whether the result reached the store
    pub persisted: bool,
}

impl BatchReport {
    pub fn accepted(&self) -> usize {
        self.result.entries.len()
    }
}

/// Apply the tail guard to parsed entries, returning the kept entries and
/// the discarded one.
pub fn apply_tail_guard(
    mut entries: Vec<ParsedEntry>,
    guard: TailGuard,
    batch_len: usize,
) -> (Vec<ParsedEntry>, Option<ParsedEntry>) {
    let drop_last = match guard {
        TailGuard::DropLast => true,
        TailGuard::DropLastIfShort => entries.len() < batch_len,
        TailGuard::KeepAll => false,
    };
    let dropped = if drop_last { entries.pop() } else { None };
    (entries, dropped)
}

/// Runs batches against a completion service
#[derive(Debug)]
pub struct BatchRunner {
    service: Arc<dyn CompletionService>,
    prompts: PromptBuilder,
    store: Arc<dyn BatchStore>,
    pacer: Pacer,
    retry: RetryPolicy,
    tail_guard: TailGuard,
}

impl BatchRunner {
    /// Create a runner with default pacing, retries and tail guard
    pub fn new(service: Arc<dyn CompletionService>, prompts: PromptBuilder, store: Arc<dyn BatchStore>) -> Self {
        Self::with_config(service, prompts, store, &ReconcileConfig::default())
    }

    /// Create a runner configured from `config`
    pub fn with_config(
        service: Arc<dyn CompletionService>,
        prompts: PromptBuilder,
        store: Arc<dyn BatchStore>,
        config: &ReconcileConfig,
    ) -> Self {
        Self {
            service,
            prompts,
            store,
            pacer: Pacer::new(config.call_pacing_delay()),
            retry: RetryPolicy::from_config(config),
            tail_guard: config.tail_guard,
        }
    }

    pub fn with_pacer(mut self, pacer: Pacer) -> Self {
        self.pacer = pacer;
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn store(&self) -> &Arc<dyn BatchStore> {
        &self.store
    }

    /// Run one batch. Never fails: problems leave the affected records out
    /// of the result so they show up in the next gap.
    pub async fn run(&self, batch: &Batch) -> BatchReport {
        let prompt = self.prompts.build(&batch.records);
        let label = format!("Batch {} (pass {})", batch.sequence, batch.pass);

        let service = &self.service;
        let pacer = &self.pacer;
        let prompt = prompt.as_str();
        let outcome = self
            .retry
            .execute(&label, move |_| pacer.paced(service.complete(prompt)))
            .await;

        let mut report = BatchReport {
            result: BatchResult::empty(batch),
            requested: batch.records.len(),
            attempts: outcome.attempts,
            parsed: 0,
            malformed: 0,
            dropped_tail: None,
            failure: None,
            persisted: false,
        };

        match outcome.result {
            Ok(text) => {
                let parsed = ResponseParser::parse(&text, &batch.records);
                report.parsed = parsed.len();

                let (kept, dropped) = apply_tail_guard(parsed, self.tail_guard, batch.records.len());
                if let Some(entry) = &dropped {
                    debug!("{}: discarded last entry (id {})", label, entry.id);
                }
                report.dropped_tail = dropped.map(|e| e.id);

                for entry in kept {
                    if entry.is_well_formed() {
                        report.result.entries.push(TranslatedRecord::new(entry.id, entry.text));
                    } else {
                        debug!("{}: skipping entry {} ({:?})", label, entry.id, entry.validity);
                        report.malformed += 1;
                    }
                }
            }
            Err(e) => {
                error!("{} failed after {} attempt(s): {}", label, outcome.attempts, e);
                report.failure = Some(e);
            }
        }

        match self.store.persist(&report.result) {
            Ok(()) => report.persisted = true,
            Err(e) => warn!("{}: could not persist results: {}", label, e),
        }

        debug!(
            "{}: {} of {} records accepted",
            label,
            report.accepted(),
            report.requested
        );
        report
    }
}
