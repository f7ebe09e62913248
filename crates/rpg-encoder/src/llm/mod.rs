//! LLM backend interface and the shared `<solution>`-tag response protocol.

mod providers;

pub use providers::{AnthropicClient, OpenAiCompatibleClient};

use async_trait::async_trait;
use rpg_core::error::{Result, RpgError};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// An LLM completion backend. Every call carries a deadline; cancellation
/// and timeout both surface as [`RpgError::Llm`].
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, system: &str, user: &str, deadline: Duration) -> Result<String>;

    fn model_name(&self) -> &str {
        "unknown"
    }
}

/// Decorator counting completions, shared by the pipelines that report
/// `llm_calls` in their results.
pub struct CountingLlm {
    inner: Arc<dyn LlmClient>,
    calls: AtomicUsize,
}

impl CountingLlm {
    pub fn new(inner: Arc<dyn LlmClient>) -> Self {
        Self {
            inner,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl LlmClient for CountingLlm {
    async fn complete(&self, system: &str, user: &str, deadline: Duration) -> Result<String> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        self.inner.complete(system, user, deadline).await
    }

    fn model_name(&self) -> &str {
        self.inner.model_name()
    }
}

/// Extract the JSON payload wrapped in `<solution>…</solution>` tags.
/// Falls back to treating the whole response (or a fenced block) as JSON.
pub fn extract_solution_json<T: serde::de::DeserializeOwned>(text: &str) -> Result<T> {
    let payload = if let Some(start) = text.find("<solution>") {
        let after = &text[start + "<solution>".len()..];
        match after.find("</solution>") {
            Some(end) => after[..end].trim(),
            None => after.trim(),
        }
    } else if let Some(start) = text.find("```") {
        let after = &text[start..].trim_start_matches("```json").trim_start_matches("```");
        match after.find("```") {
            Some(end) => after[..end].trim(),
            None => text.trim(),
        }
    } else {
        text.trim()
    };

    serde_json::from_str(payload)
        .map_err(|e| RpgError::Llm(format!("unparseable solution payload: {e}")))
}

/// Ask, parse, and retry once with a corrective suffix on parse failure.
/// The second failure is fatal for the caller.
pub async fn ask_solution_json<T: serde::de::DeserializeOwned>(
    llm: &dyn LlmClient,
    system: &str,
    user: &str,
    deadline: Duration,
) -> Result<T> {
    let response = llm.complete(system, user, deadline).await?;
    match extract_solution_json::<T>(&response) {
        Ok(parsed) => return Ok(parsed),
        Err(err) => {
            tracing::warn!("solution parse failed, retrying once: {err}");
        }
    }

    let corrective = format!(
        "{user}\n\nYour previous answer could not be parsed. Respond again with ONLY the \
         requested JSON inside <solution></solution> tags. No prose, no markdown."
    );
    let response = llm.complete(system, &corrective, deadline).await?;
    extract_solution_json::<T>(&response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_tagged_json() {
        let parsed: Vec<String> =
            extract_solution_json("thinking...\n<solution>[\"Auth\",\"Data\"]</solution>").unwrap();
        assert_eq!(parsed, vec!["Auth", "Data"]);
    }

    #[test]
    fn falls_back_to_bare_json() {
        let parsed: Vec<u32> = extract_solution_json("[1, 2, 3]").unwrap();
        assert_eq!(parsed, vec![1, 2, 3]);
    }

    #[test]
    fn rejects_prose() {
        let err = extract_solution_json::<Vec<String>>("I think the areas are Auth and Data");
        assert!(err.is_err());
    }
}
