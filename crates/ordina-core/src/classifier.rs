use std::sync::Arc;

use ordina_provider::{LlmProvider, LlmRequest};
use ordina_schema::{IntentCategory, Message};

use crate::prompts;

/// LLM-backed intent classification. Total: any failure, malformed
/// output included, falls back to `GeneralRag` so the turn still runs
/// retrieval instead of silently doing nothing.
pub struct IntentClassifier {
    provider: Arc<dyn LlmProvider>,
    model: String,
    history_window: usize,
}

impl IntentClassifier {
    pub fn new(provider: Arc<dyn LlmProvider>, model: String, history_window: usize) -> Self {
        Self {
            provider,
            model,
            history_window,
        }
    }

    pub async fn classify(&self, query: &str, history: &[Message]) -> IntentCategory {
        let user_history = prompts::format_user_history(history, self.history_window);
        let request = LlmRequest::simple(
            self.model.clone(),
            Some(prompts::ROUTING_SYSTEM_PROMPT.to_string()),
            prompts::routing_user_message(query, &user_history),
        );

        let category = match self.provider.chat(request).await {
            Ok(response) => match IntentCategory::parse(&response.text) {
                Some(category) => category,
                None => {
                    tracing::warn!(
                        output = %response.text,
                        "classifier produced an unknown category, defaulting to general_rag"
                    );
                    IntentCategory::GeneralRag
                }
            },
            Err(err) => {
                tracing::warn!(
                    error = %err,
                    "classification call failed, defaulting to general_rag"
                );
                IntentCategory::GeneralRag
            }
        };

        tracing::info!(category = category.as_str(), "classified query");
        category
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ordina_provider::ScriptedProvider;

    fn classifier(provider: ScriptedProvider) -> IntentClassifier {
        IntentClassifier::new(Arc::new(provider), "router-model".into(), 5)
    }

    #[tokio::test]
    async fn parses_clean_category_tokens() {
        let c = classifier(ScriptedProvider::replying(&["trip_expense"]));
        let category = c.classify("Chci vyúčtovat cestu", &[]).await;
        assert_eq!(category, IntentCategory::TripExpense);
    }

    #[tokio::test]
    async fn tolerates_quoted_and_cased_output() {
        let c = classifier(ScriptedProvider::replying(&["\"PATIENT_LOOKUP\""]));
        let category = c.classify("Najdi pacienta Nováka", &[]).await;
        assert_eq!(category, IntentCategory::PatientLookup);
    }

    #[tokio::test]
    async fn unknown_output_fails_open_to_general_rag() {
        let c = classifier(ScriptedProvider::replying(&[
            "Tento dotaz je o pracovní cestě.",
        ]));
        let category = c.classify("Jak zařídit cestu?", &[]).await;
        assert_eq!(category, IntentCategory::GeneralRag);
    }

    #[tokio::test]
    async fn provider_failure_fails_open_to_general_rag() {
        let c = classifier(ScriptedProvider::new(vec![Err(anyhow::anyhow!("timeout"))]));
        let category = c.classify("Jaké jsou směrnice?", &[]).await;
        assert_eq!(category, IntentCategory::GeneralRag);
    }
}
