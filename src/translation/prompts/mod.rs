/*!
 * Prompt construction for batch translation.
 *
 * This module provides:
 * - The instruction header template
 * - `PromptBuilder`, which renders one batch of records into a prompt
 */

pub mod templates;

// Re-export main types
pub use templates::{PromptBuilder, PromptTemplate};
