/*!
 * Integration tests for the pass loop: batch sizing, convergence and stalls
 */

use gapfill::app_config::TailGuard;
use gapfill::errors::ProviderError;
use gapfill::providers::mock::MockCompletion;
use gapfill::session::{BatchStore, MemoryBatchStore};
use gapfill::translation::convergence::partition;
use gapfill::translation::{LoopEvent, LoopState, RunStatus, StallReason};
use parking_lot::Mutex;
use rand::seq::SliceRandom;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::time::Instant;

use crate::common::{self, mock_providers};

fn batch_lengths(requested: &[Vec<u64>]) -> Vec<usize> {
    requested.iter().map(Vec::len).collect()
}

#[test]
fn test_partition_shouldSplitInOrderAndNumberBatches() {
    let source = common::source_with_ids(1..=19);
    let mut next_sequence = 4;

    let batches = partition(source.records(), 5, 2, &mut next_sequence);

    assert_eq!(batches.iter().map(|b| b.records.len()).collect::<Vec<_>>(), vec![5, 5, 5, 4]);
    assert_eq!(batches.iter().map(|b| b.sequence).collect::<Vec<_>>(), vec![4, 5, 6, 7]);
    assert!(batches.iter().all(|b| b.pass == 2));
    assert_eq!(batches[3].ids(), vec![16, 17, 18, 19]);
    assert_eq!(next_sequence, 8);
}

#[tokio::test]
async fn test_run_withGapOfNineteen_shouldRetryInBatchesOfFive() {
    // First batch answered fully, second batch only its first record: 19 missing
    let calls = AtomicUsize::new(0);
    let mock = Arc::new(MockCompletion::new(move |prompt| {
        let ids = MockCompletion::prompt_ids(prompt);
        let answered = match calls.fetch_add(1, Ordering::SeqCst) {
            1 => ids[..1].to_vec(),
            _ => ids,
        };
        Ok(MockCompletion::well_formed_response(&answered))
    }));
    let config = common::fast_config(TailGuard::KeepAll);
    let reconciler = common::build_loop(mock.clone(), Arc::new(MemoryBatchStore::new()), &config);

    let outcome = reconciler.run(&common::source_with_ids(1..=40)).await;

    assert_eq!(outcome.status, RunStatus::Done);
    assert_eq!(outcome.passes, 2);
    assert_eq!(batch_lengths(&mock.requested_ids()), vec![20, 20, 5, 5, 5, 4]);
    assert_eq!(mock.requested_ids()[2], vec![22, 23, 24, 25, 26]);
}

#[tokio::test]
async fn test_run_withGapOfTwenty_shouldRetryInOneBatch() {
    let calls = AtomicUsize::new(0);
    let mock = Arc::new(MockCompletion::new(move |prompt| {
        let ids = MockCompletion::prompt_ids(prompt);
        let answered = if calls.fetch_add(1, Ordering::SeqCst) == 0 { Vec::new() } else { ids };
        Ok(MockCompletion::well_formed_response(&answered))
    }));
    let config = common::fast_config(TailGuard::KeepAll);
    let reconciler = common::build_loop(mock.clone(), Arc::new(MemoryBatchStore::new()), &config);

    let outcome = reconciler.run(&common::source_with_ids(1..=40)).await;

    assert!(outcome.status.is_done());
    assert_eq!(batch_lengths(&mock.requested_ids()), vec![20, 20, 20]);
}

#[tokio::test]
async fn test_run_withCompleteAnswersAndKeepAll_shouldFinishAfterInitialPass() {
    let mock = Arc::new(MockCompletion::working());
    let store = Arc::new(MemoryBatchStore::new());
    let config = common::fast_config(TailGuard::KeepAll);
    let reconciler = common::build_loop(mock.clone(), store.clone(), &config);

    let outcome = reconciler.run(&common::source_with_ids(1..=45)).await;

    assert_eq!(outcome.status, RunStatus::Done);
    assert_eq!(outcome.passes, 1);
    assert_eq!(outcome.translations.len(), 45);
    assert!(outcome.unresolved.is_empty());
    assert_eq!(mock.request_count(), 3);
    assert_eq!(store.len(), 3);
}

#[tokio::test]
async fn test_run_withDropLastIfShort_shouldKeepCompleteBatches() {
    let mock = Arc::new(MockCompletion::working());
    let config = common::fast_config(TailGuard::DropLastIfShort);
    let reconciler = common::build_loop(mock.clone(), Arc::new(MemoryBatchStore::new()), &config);

    let outcome = reconciler.run(&common::source_with_ids(1..=40)).await;

    assert_eq!(outcome.status, RunStatus::Done);
    assert_eq!(outcome.passes, 1);
    assert_eq!(outcome.stats.dropped_tail_entries, 0);
}

#[tokio::test]
async fn test_run_withDropLastIfShort_shouldDiscardTailOfTruncatedAnswers() {
    let mock = Arc::new(mock_providers::truncating(15));
    let config = common::fast_config(TailGuard::DropLastIfShort);
    let reconciler = common::build_loop(mock.clone(), Arc::new(MemoryBatchStore::new()), &config);

    let outcome = reconciler.run(&common::source_with_ids(1..=20)).await;

    // Pass 1 keeps 1..=14, pass 2 answers the 6 missing records in full
    assert_eq!(outcome.status, RunStatus::Done);
    assert_eq!(outcome.passes, 2);
    assert_eq!(outcome.stats.dropped_tail_entries, 1);
    assert_eq!(
        mock.requested_ids(),
        vec![(1..=20).collect::<Vec<u64>>(), vec![15, 16, 17, 18, 19], vec![20]]
    );
}

#[tokio::test]
async fn test_run_withUnusableIds_shouldStallWithExactResidual() {
    let mock = Arc::new(mock_providers::never_translates(&[3, 7]));
    let config = common::fast_config(TailGuard::DropLast);
    let reconciler = common::build_loop(mock.clone(), Arc::new(MemoryBatchStore::new()), &config);

    let outcome = reconciler.run(&common::source_with_ids(1..=10)).await;

    assert_eq!(outcome.status, RunStatus::Stalled(StallReason::NoProgress));
    assert_eq!(outcome.unresolved, vec![3, 7]);
    assert_eq!(outcome.passes, 2);
    assert_eq!(outcome.translations.len(), 8);
    assert!(outcome.stats.malformed_entries >= 1);
}

#[tokio::test]
async fn test_run_withDefaultTailGuard_shouldReproduceTwentyTwoRecordScenario() {
    let mock = Arc::new(MockCompletion::working());
    let config = common::fast_config(TailGuard::DropLast);
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    let reconciler = common::build_loop(mock.clone(), Arc::new(MemoryBatchStore::new()), &config)
        .with_observer(Arc::new(move |event: &LoopEvent| sink.lock().push(event.clone())));

    let outcome = reconciler.run(&common::source_with_ids(1..=22)).await;

    assert_eq!(outcome.status, RunStatus::Stalled(StallReason::NoProgress));
    assert_eq!(outcome.unresolved, vec![22]);
    assert_eq!(outcome.passes, 3);
    assert_eq!(outcome.translations.len(), 21);
    assert_eq!(
        mock.requested_ids(),
        vec![(1..=20).collect::<Vec<u64>>(), vec![21, 22], vec![20, 22], vec![22]]
    );

    let gaps: Vec<usize> = events
        .lock()
        .iter()
        .filter_map(|event| match event {
            LoopEvent::PassFinished { gap, .. } => Some(*gap),
            _ => None,
        })
        .collect();
    assert_eq!(gaps, vec![2, 1, 1]);

    let recorded = events.lock();
    assert_eq!(
        recorded[0],
        LoopEvent::PassStarted {
            pass: 1,
            state: LoopState::Initial,
            batch_size: 20,
            batch_count: 2,
            records: 22,
        }
    );
    assert!(matches!(
        recorded.last(),
        Some(LoopEvent::Finished {
            status: RunStatus::Stalled(StallReason::NoProgress),
            passes: 3,
            unresolved: 1,
        })
    ));
}

#[tokio::test]
async fn test_run_withSlowProgress_shouldStopAtPassLimit() {
    let mock = Arc::new(mock_providers::truncating(1));
    let mut config = common::fast_config(TailGuard::KeepAll);
    config.max_retry_passes = 2;
    let reconciler = common::build_loop(mock.clone(), Arc::new(MemoryBatchStore::new()), &config);

    let outcome = reconciler.run(&common::source_with_ids(1..=10)).await;

    assert_eq!(outcome.status, RunStatus::Stalled(StallReason::PassLimit));
    assert_eq!(outcome.passes, 3);
    assert_eq!(outcome.unresolved, vec![4, 5, 6, 8, 10]);
}

#[tokio::test]
async fn test_run_withShuffledSource_shouldKeepSourceOrder() {
    let mut ids: Vec<u64> = (1..=60).collect();
    ids.shuffle(&mut rand::rng());
    let source = common::source_with_ids(ids.clone());
    let mock = Arc::new(mock_providers::reversing());
    let config = common::fast_config(TailGuard::KeepAll);
    let reconciler = common::build_loop(mock, Arc::new(MemoryBatchStore::new()), &config);

    let outcome = reconciler.run(&source).await;

    let output_ids: Vec<u64> = outcome.translations.iter().map(|t| t.id).collect();
    assert_eq!(output_ids, ids);
}

#[tokio::test]
async fn test_run_withRejectedBatch_shouldKeepOtherResults() {
    let mock = Arc::new(mock_providers::rejecting_batches_with(25));
    let config = common::fast_config(TailGuard::KeepAll);
    let reconciler = common::build_loop(mock.clone(), Arc::new(MemoryBatchStore::new()), &config);

    let outcome = reconciler.run(&common::source_with_ids(1..=30)).await;

    // The rejected batch takes its neighbours down with it on every pass
    assert_eq!(outcome.status, RunStatus::Stalled(StallReason::NoProgress));
    assert_eq!(outcome.unresolved, vec![21, 22, 23, 24, 25]);
    assert_eq!(outcome.translations.len(), 25);
    assert_eq!(outcome.stats.failed_batches, 3);
}

#[tokio::test(start_paused = true)]
async fn test_run_withConcurrentBatches_shouldOverlapCallsAndKeepOrder() {
    let mock = Arc::new(MockCompletion::working().with_delay(Duration::from_secs(1)));
    let store = Arc::new(MemoryBatchStore::new());
    let mut config = common::fast_config(TailGuard::KeepAll);
    config.default_batch_size = 10;
    config.max_concurrent_batches = 4;
    let reconciler = common::build_loop(mock.clone(), store.clone(), &config);
    let source = common::source_with_ids(1..=100);

    let start = Instant::now();
    let outcome = reconciler.run(&source).await;

    assert!(outcome.status.is_done());
    assert!(start.elapsed() < Duration::from_secs(5));
    assert_eq!(outcome.stats.batches, 10);
    let output_ids: Vec<u64> = outcome.translations.iter().map(|t| t.id).collect();
    assert_eq!(output_ids, (1..=100).collect::<Vec<u64>>());
    let sequences: Vec<u64> = store.load_all().unwrap().iter().map(|r| r.sequence).collect();
    assert_eq!(sequences, (1..=10).collect::<Vec<u64>>());
}

#[tokio::test(start_paused = true)]
async fn test_run_withTransientErrors_shouldCountEveryCall() {
    let mock = Arc::new(MockCompletion::failing_first(2, ProviderError::RateLimitExceeded("busy".into())));
    let config = common::fast_config(TailGuard::KeepAll);
    let reconciler = common::build_loop(mock.clone(), Arc::new(MemoryBatchStore::new()), &config);

    let outcome = reconciler.run(&common::source_with_ids(1..=5)).await;

    assert!(outcome.status.is_done());
    assert_eq!(outcome.stats.completion_calls, 3);
    assert_eq!(outcome.stats.failed_batches, 0);
}

#[tokio::test]
async fn test_run_withFailingStore_shouldStillProduceTranslations() {
    let mock = Arc::new(MockCompletion::working());
    let store = Arc::new(MemoryBatchStore::failing());
    let config = common::fast_config(TailGuard::KeepAll);
    let reconciler = common::build_loop(mock, store.clone(), &config);

    let outcome = reconciler.run(&common::source_with_ids(1..=30)).await;

    assert!(outcome.status.is_done());
    assert_eq!(outcome.translations.len(), 30);
    assert_eq!(outcome.stats.persist_failures, 2);
    assert!(store.is_empty());
}
