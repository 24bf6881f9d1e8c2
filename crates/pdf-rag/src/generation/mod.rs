//! Answer generation over retrieved context

mod pipeline;
mod prompt;

pub use pipeline::{QueryOutcome, QueryPipeline};
pub use prompt::{PromptBuilder, FALLBACK_ANSWER, SYSTEM_INSTRUCTION};
