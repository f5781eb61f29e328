
use tracing::{info, warn};

use super::QueryResult;
use crate::Result;

/// Answers at or below this many characters count as too weak to return alone
pub const MIN_ANSWER_LENGTH: usize = 20;

pub const AGENT_NOT_CONFIGURED: &str =
    "Web search agent is not configured: install a search backend to enable web fallback.";

/// Optional web search used when retrieval produces a weak answer
pub trait WebSearchAgent: Send + Sync {
    fn search(&self, question: &str) -> Result<String>;
}

/// Keep answers longer than `min_answer_length` characters; otherwise defer to `agent`.
///
/// Sources from the retrieval step are always kept.
#[inline]
pub fn answer_with_fallback(
    question: &str,
    rag_result: QueryResult,
    agent: Option<&dyn WebSearchAgent>,
    min_answer_length: usize,
) -> Result<QueryResult> {
    if rag_result.answer.chars().count() > min_answer_length {
        return Ok(rag_result);
    }

    let Some(agent) = agent else {
        warn!("Answer too short and no web search agent is configured");
        return Ok(QueryResult {
            answer: AGENT_NOT_CONFIGURED.to_string(),
            sources: rag_result.sources,
        });
    };

    info!("Answer too short, falling back to web search");
    let web_output = agent.search(question)?;

    Ok(QueryResult {
        answer: format!(
            "Web agent output:\n{}\n\nRAG fallback:\n{}",
            web_output, rag_result.answer
        ),
        sources: rag_result.sources,
    })
}
