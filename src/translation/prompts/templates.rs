/*!
 * Prompt templates for batch translation.
 *
 * A prompt is an instruction header followed by one block per record:
 *
 * ```text
 * ID: 12
 * Arabic: ...
 * English: ...
 * ```
 *
 * The model is asked to answer with one `ID: translation` line per record,
 * which is the shape `ResponseParser` understands.
 */

use crate::dataset::{Record, RecordPayload};

/// Instruction header placed before the records.
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    /// The template string with placeholders
    template: String,
}

impl PromptTemplate {
    /// The default batch translation header.
    pub const BATCH_TRANSLATOR: &'static str = "Translate the following texts to {target_language}.
For each text, return only the ID and translation in this exact format:
[ID]: [{target_language} translation]
Return exactly one line per ID, in the order given, and do not omit any ID.

Here are the texts:

";

    /// Create a new prompt template.
    pub fn new(template: &str) -> Self {
        Self {
            template: template.to_string(),
        }
    }

    /// Create the default batch translator template.
    pub fn batch_translator() -> Self {
        Self::new(Self::BATCH_TRANSLATOR)
    }

    /// Render the template for a target language.
    pub fn render(&self, target_language: &str) -> String {
        self.template.replace("{target_language}", target_language)
    }
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self::batch_translator()
    }
}

/// Builds the completion prompt for one batch of records.
///
/// Output is fully determined by the template, the target language and the
/// records: ids and payload texts appear verbatim, in batch order.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    target_language: String,
    template: PromptTemplate,
}

impl PromptBuilder {
    /// Create a builder for the given target language name.
    pub fn new(target_language: &str) -> Self {
        Self {
            target_language: target_language.to_string(),
            template: PromptTemplate::default(),
        }
    }

    /// Render the prompt for a batch.
    pub fn build(&self, records: &[Record]) -> String {
        let mut prompt = self.template.render(&self.target_language);
        let blocks: Vec<String> = records.iter().map(Self::format_record).collect();
        prompt.push_str(&blocks.join("\n\n"));
        prompt
    }

    /// Render one record block.
    pub fn format_record(record: &Record) -> String {
        let mut block = format!("ID: {}", record.id);
        match &record.payload {
            RecordPayload::Plain(text) => {
                block.push_str("\nText: ");
                block.push_str(text);
            }
            RecordPayload::Structured(fields) => {
                for field in fields {
                    block.push('\n');
                    block.push_str(&field_label(&field.name));
                    block.push_str(": ");
                    block.push_str(&field.text);
                }
            }
        }
        block
    }
}

/// `arabic` -> `Arabic`
fn field_label(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
