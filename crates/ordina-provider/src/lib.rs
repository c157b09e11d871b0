pub mod openai;
pub mod types;

use std::collections::VecDeque;
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;

pub use openai::{OpenAiProvider, ProviderErrorKind};
pub use types::*;

/// The hosted completion capability. One implementation talks to an
/// OpenAI-compatible endpoint; tests script responses instead.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn chat(&self, request: LlmRequest) -> Result<LlmResponse>;
}

/// Test provider that replays a queue of canned outcomes in order.
/// Once the queue is empty, every call fails.
pub struct ScriptedProvider {
    script: Mutex<VecDeque<Result<LlmResponse>>>,
    seen: Mutex<Vec<LlmRequest>>,
}

impl ScriptedProvider {
    pub fn new(script: Vec<Result<LlmResponse>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Every request received so far, in call order.
    pub fn requests(&self) -> Vec<LlmRequest> {
        self.seen.lock().expect("seen lock poisoned").clone()
    }

    pub fn replying(texts: &[&str]) -> Self {
        Self::new(
            texts
                .iter()
                .map(|t| Ok(LlmResponse::text_only(*t)))
                .collect(),
        )
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    async fn chat(&self, request: LlmRequest) -> Result<LlmResponse> {
        self.seen
            .lock()
            .expect("seen lock poisoned")
            .push(request);
        let next = self
            .script
            .lock()
            .expect("script lock poisoned")
            .pop_front();
        match next {
            Some(outcome) => outcome,
            None => anyhow::bail!("scripted provider exhausted"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scripted_provider_replays_in_order() {
        let provider = ScriptedProvider::replying(&["první", "druhá"]);
        let req = LlmRequest::simple("m".into(), None, "q".into());
        assert_eq!(provider.chat(req.clone()).await.unwrap().text, "první");
        assert_eq!(provider.chat(req.clone()).await.unwrap().text, "druhá");
        assert!(provider.chat(req).await.is_err());
        assert_eq!(provider.requests().len(), 3);
    }

    #[tokio::test]
    async fn scripted_provider_replays_errors() {
        let provider = ScriptedProvider::new(vec![Err(anyhow::anyhow!("boom"))]);
        let req = LlmRequest::simple("m".into(), None, "q".into());
        let err = provider.chat(req).await.err().unwrap();
        assert!(err.to_string().contains("boom"));
    }
}
