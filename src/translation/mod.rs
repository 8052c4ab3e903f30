/*!
 * Batch translation with reconciliation.
 *
 * Records are translated in batches by a completion service whose answers
 * may be truncated, incomplete or malformed. This module turns those answers
 * into a complete, validated translation set, or reports what is missing:
 *
 * - `prompts`: prompt construction for a batch of records
 * - `parser`: extraction of `(id, text)` entries from a completion
 * - `pacing`: global call pacing and retry policy
 * - `batch`: running one batch end to end
 * - `aggregate`: merging batch results by id
 * - `gaps`: finding records still lacking a translation
 * - `convergence`: the pass loop and its verdict
 * - `report`: the final output document
 */

// Re-export main types for easier usage
pub use self::aggregate::{AggregatedSet, Aggregator, TranslatedRecord};
pub use self::batch::{Batch, BatchReport, BatchResult, BatchRunner};
pub use self::convergence::{
    ConvergenceLoop, LoopEvent, LoopObserver, LoopState, RunOutcome, RunStats, RunStatus, StallReason,
};
pub use self::gaps::{GapFinder, GapSet};
pub use self::pacing::{Pacer, RetryPolicy};
pub use self::parser::{EntryValidity, MalformedReason, ParsedEntry, ResponseParser};
pub use self::prompts::{PromptBuilder, PromptTemplate};
pub use self::report::FinalOutput;

// Submodules
pub mod aggregate;
pub mod batch;
pub mod convergence;
pub mod gaps;
pub mod pacing;
pub mod parser;
pub mod prompts;
pub mod report;
