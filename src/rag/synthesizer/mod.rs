#[cfg(test)]
mod tests;

use std::sync::Arc;

use itertools::Itertools;
use tracing::debug;

use crate::embeddings::Generator;
use crate::{RagError, Result};

pub const SYSTEM_PROMPT: &str = "You answer questions about manufacturing quality-control records. \
Use only the pieces of context provided with the question. \
If the context does not contain the answer, say that you don't know instead of making one up.";

/// "Stuff" prompt: every retrieved chunk verbatim, then the question
#[inline]
pub fn build_prompt<S: AsRef<str>>(question: &str, contexts: &[S]) -> String {
    let context = contexts.iter().map(AsRef::as_ref).join("\n\n");
    format!(
        "Use the following pieces of context to answer the question at the end.\n\n{}\n\nQuestion: {}\nHelpful Answer:",
        context, question
    )
}

/// Turns retrieved chunks and a question into an answer through a [`Generator`]
#[derive(Clone)]
pub struct AnswerSynthesizer {
    generator: Arc<dyn Generator>,
}

impl AnswerSynthesizer {
    #[inline]
    pub fn new(generator: Arc<dyn Generator>) -> Self {
        Self { generator }
    }

    /// Blocking call into the generator; run it off the async runtime
    #[inline]
    pub fn synthesize<S: AsRef<str>>(&self, question: &str, contexts: &[S]) -> Result<String> {
        let prompt = build_prompt(question, contexts);
        debug!(
            "Synthesizing answer with {} from {} context chunks",
            self.generator.model_name(),
            contexts.len()
        );

        self.generator
            .generate(SYSTEM_PROMPT, &prompt)
            .map(|answer| answer.trim().to_string())
            .map_err(|e| RagError::Generation(format!("{:#}", e)))
    }
}
