use anyhow::{Context, Result, anyhow};
use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::app_config::Config;
use crate::dataset::SourceSet;
use crate::language_utils;
use crate::providers::{self, CompletionService};
use crate::session::{JsonBatchStore, RunManifest};
use crate::translation::{
    BatchRunner, ConvergenceLoop, FinalOutput, LoopEvent, LoopObserver, PromptBuilder, RunStatus,
};

// @module: Application controller for dataset translation

/// How a run treats batches left in the batch directory
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// Continue from stored batches instead of starting over
    pub resume: bool,
    /// Delete stored batches of a previous run before starting
    pub force: bool,
    /// Draw a progress bar
    pub show_progress: bool,
}

/// Main application controller for dataset translation
pub struct Controller {
    // @field: App configuration
    config: Config,
}

impl Controller {
    // @method: Create a new controller with the given configuration
    pub fn with_config(config: Config) -> Result<Self> {
        Ok(Self { config })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Translate the dataset at `input_file` with the configured provider
    pub async fn run(&self, input_file: PathBuf, options: RunOptions) -> Result<FinalOutput> {
        let service = providers::create_service(&self.config.translation)
            .context("Failed to create translation provider")?;
        self.run_with_service(input_file, service, options).await
    }

    /// Translate the dataset at `input_file` with the given completion service
    pub async fn run_with_service(
        &self,
        input_file: PathBuf,
        service: Arc<dyn CompletionService>,
        options: RunOptions,
    ) -> Result<FinalOutput> {
        let start_time = std::time::Instant::now();

        if !input_file.exists() {
            return Err(anyhow!("Input file does not exist: {:?}", input_file));
        }

        let target_language = language_utils::resolve_language_name(&self.config.target_language)?;
        let source = SourceSet::load(&input_file, self.config.output.records_key.as_deref())
            .with_context(|| format!("Failed to load dataset {:?}", input_file))?;
        info!("Loaded {} records from {:?}", source.len(), input_file);

        let store = JsonBatchStore::new(&self.config.output.batch_dir);
        let manifest = RunManifest::new(source.fingerprint(), &target_language, source.len());
        if options.resume {
            store.open_for_resume(&manifest)?;
        } else {
            store.start_fresh(&manifest, options.force)?;
        }

        info!(
            "Translating to {} with {} - {}",
            target_language,
            self.config.translation.provider.display_name(),
            self.config.translation.get_model()
        );

        let runner = BatchRunner::with_config(
            service,
            PromptBuilder::new(&target_language),
            Arc::new(store),
            &self.config.reconcile,
        );
        let progress_bar = Self::create_progress_bar(options.show_progress);
        let reconciler = ConvergenceLoop::new(runner, self.config.reconcile.clone())
            .with_observer(Self::progress_observer(progress_bar));

        let outcome = if options.resume {
            reconciler.resume(&source).await?
        } else {
            reconciler.run(&source).await
        };

        if outcome.stats.persist_failures > 0 {
            warn!(
                "{} batch results could not be saved to {}",
                outcome.stats.persist_failures, self.config.output.batch_dir
            );
        }

        let output = FinalOutput::from_outcome(&outcome, &target_language);
        let output_path = Path::new(&self.config.output.final_output);
        output
            .write(output_path)
            .with_context(|| format!("Failed to write final output {:?}", output_path))?;

        match outcome.status {
            RunStatus::Done => info!(
                "Translation complete in {}: {} records, {} passes, {} completion calls. Output saved to {:?}",
                Self::format_duration(start_time.elapsed()),
                output.translations.len(),
                outcome.passes,
                outcome.stats.completion_calls,
                output_path
            ),
            RunStatus::Stalled(reason) => warn!(
                "Translation stalled ({:?}) after {}: {} of {} records translated, unresolved ids {:?}. Output saved to {:?}",
                reason,
                Self::format_duration(start_time.elapsed()),
                output.translations.len(),
                output.total_records,
                output.unresolved_ids,
                output_path
            ),
        }

        Ok(output)
    }

    fn create_progress_bar(visible: bool) -> ProgressBar {
        if !visible {
            return ProgressBar::hidden();
        }
        let progress_bar = ProgressBar::new(0);
        let template_result = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} batches ({percent}%) {msg} {eta}")
            .or_else(|_| ProgressStyle::default_bar().template("{spinner} [{elapsed_precise}] [{bar:40}] {pos}/{len} ({percent}%) {msg}"))
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        progress_bar.set_style(template_result.progress_chars("█▓▒░"));
        progress_bar
    }

    /// Render loop events on `progress_bar`, one bar run per pass
    fn progress_observer(progress_bar: ProgressBar) -> LoopObserver {
        Arc::new(move |event: &LoopEvent| match event {
            LoopEvent::PassStarted {
                pass,
                state,
                batch_count,
                records,
                ..
            } => {
                progress_bar.set_length(*batch_count as u64);
                progress_bar.set_position(0);
                progress_bar.set_message(format!("pass {} ({}, {} records)", pass, state, records));
            }
            LoopEvent::BatchFinished { .. } => progress_bar.inc(1),
            LoopEvent::PassFinished { pass, gap } => {
                progress_bar.println(format!("Pass {}: {} records missing", pass, gap));
            }
            LoopEvent::Finished { .. } => progress_bar.finish_and_clear(),
        })
    }

    fn format_duration(duration: std::time::Duration) -> String {
        let total_seconds = duration.as_secs();
        let hours = total_seconds / 3600;
        let minutes = (total_seconds % 3600) / 60;
        let seconds = total_seconds % 60;

        if hours > 0 {
            format!("{}h {}m {}s", hours, minutes, seconds)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds)
        } else {
            format!("{}.{:03}s", seconds, duration.subsec_millis())
        }
    }
}
