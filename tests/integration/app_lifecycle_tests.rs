/*!
 * Integration tests for application lifecycle
 */

use anyhow::Result;
use gapfill::app_config::{Config, TailGuard};
use gapfill::app_controller::{Controller, RunOptions};
use gapfill::providers::CompletionService;
use gapfill::providers::mock::MockCompletion;
use gapfill::translation::FinalOutput;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

use crate::common;

/// Controller writing its batches and output inside `dir`
fn controller_in(dir: &Path, tail_guard: TailGuard) -> Result<Controller> {
    let mut config = Config::default();
    config.reconcile = common::fast_config(tail_guard);
    config.output.batch_dir = dir.join("batches").to_string_lossy().to_string();
    config.output.final_output = dir.join("final_translations.json").to_string_lossy().to_string();
    Controller::with_config(config)
}

fn dataset(temp_dir: &TempDir, ids: &[u64]) -> Result<PathBuf> {
    common::create_test_dataset(&temp_dir.path().to_path_buf(), "hadiths.json", ids)
}

fn read_output(dir: &Path) -> Result<FinalOutput> {
    let content = std::fs::read_to_string(dir.join("final_translations.json"))?;
    Ok(serde_json::from_str(&content)?)
}

#[tokio::test]
async fn test_runWithService_withCooperativeService_shouldWriteCompleteOutput() -> Result<()> {
    common::init_logging();
    let temp_dir = common::create_temp_dir()?;
    let input = dataset(&temp_dir, &[3, 1, 2, 10, 7])?;
    let controller = controller_in(temp_dir.path(), TailGuard::KeepAll)?;
    let mock = Arc::new(MockCompletion::working());

    let output = controller
        .run_with_service(input, mock.clone(), RunOptions::default())
        .await?;

    assert!(output.is_done());
    assert_eq!(output.target_language, "French");
    assert_eq!(output.passes, 1);
    let ids: Vec<u64> = output.translations.iter().map(|t| t.id).collect();
    assert_eq!(ids, vec![3, 1, 2, 10, 7]);

    let written = read_output(temp_dir.path())?;
    assert_eq!(written, output);
    assert!(temp_dir.path().join("batches").join("batch_1.json").exists());
    assert!(temp_dir.path().join("batches").join("manifest.json").exists());

    // Structured records reach the prompt field by field
    let prompt = &mock.prompts()[0];
    assert!(prompt.contains("Translate the following texts to French."));
    assert!(prompt.contains("ID: 3\n"));
    assert!(prompt.contains("Arabic: "));
    assert!(prompt.contains("English: Narrated 3: text 3"));
    Ok(())
}

#[tokio::test]
async fn test_runWithService_withDefaultTailGuard_shouldReportStall() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let ids: Vec<u64> = (1..=22).collect();
    let input = dataset(&temp_dir, &ids)?;
    let controller = controller_in(temp_dir.path(), TailGuard::DropLast)?;

    let output = controller
        .run_with_service(input, Arc::new(MockCompletion::working()), RunOptions::default())
        .await?;

    assert!(!output.is_done());
    assert_eq!(output.stall_reason.as_deref(), Some("no_progress"));
    assert_eq!(output.unresolved_ids, vec![22]);
    assert_eq!(output.total_records, 22);

    let raw: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(temp_dir.path().join("final_translations.json"))?)?;
    assert_eq!(raw["status"], "stalled");
    assert_eq!(raw["unresolved_ids"], serde_json::json!([22]));
    Ok(())
}

#[tokio::test]
async fn test_runWithService_overPreviousBatches_shouldRequireResumeOrForce() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let input = dataset(&temp_dir, &[1, 2, 3])?;
    let controller = controller_in(temp_dir.path(), TailGuard::KeepAll)?;
    let service: Arc<dyn CompletionService> = Arc::new(MockCompletion::working());

    controller
        .run_with_service(input.clone(), service.clone(), RunOptions::default())
        .await?;

    let again = controller
        .run_with_service(input.clone(), service.clone(), RunOptions::default())
        .await;
    assert!(again.is_err());

    let forced = controller
        .run_with_service(
            input.clone(),
            service.clone(),
            RunOptions {
                force: true,
                ..RunOptions::default()
            },
        )
        .await?;
    assert!(forced.is_done());

    let resumed = controller
        .run_with_service(
            input,
            service,
            RunOptions {
                resume: true,
                ..RunOptions::default()
            },
        )
        .await?;
    assert!(resumed.is_done());
    assert_eq!(resumed.translations.len(), 3);
    Ok(())
}

#[tokio::test]
async fn test_runWithService_resumingWithOtherLanguage_shouldFail() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let input = dataset(&temp_dir, &[1, 2])?;
    let controller = controller_in(temp_dir.path(), TailGuard::KeepAll)?;
    controller
        .run_with_service(input.clone(), Arc::new(MockCompletion::working()), RunOptions::default())
        .await?;

    let mut config = controller.config().clone();
    config.target_language = "de".to_string();
    let german = Controller::with_config(config)?;
    let result = german
        .run_with_service(
            input,
            Arc::new(MockCompletion::working()),
            RunOptions {
                resume: true,
                ..RunOptions::default()
            },
        )
        .await;

    let message = format!("{:#}", result.unwrap_err());
    assert!(message.contains("German"));
    Ok(())
}

#[test]
fn test_runWithService_withMissingInput_shouldFail() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let controller = controller_in(temp_dir.path(), TailGuard::KeepAll)?;

    let result = tokio_test::block_on(controller.run_with_service(
        temp_dir.path().join("missing.json"),
        Arc::new(MockCompletion::working()),
        RunOptions::default(),
    ));

    assert!(result.is_err());
    assert!(!temp_dir.path().join("final_translations.json").exists());
    Ok(())
}

#[test]
fn test_runWithService_withDuplicateIds_shouldFailBeforeAnyCall() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let input = common::create_test_file(
        &temp_dir.path().to_path_buf(),
        "dupes.json",
        r#"[{"id": 1, "text": "a"}, {"id": 1, "text": "b"}]"#,
    )?;
    let controller = controller_in(temp_dir.path(), TailGuard::KeepAll)?;
    let mock = Arc::new(MockCompletion::working());

    let result = tokio_test::block_on(controller.run_with_service(input, mock.clone(), RunOptions::default()));

    assert!(result.is_err());
    assert_eq!(mock.request_count(), 0);
    Ok(())
}
