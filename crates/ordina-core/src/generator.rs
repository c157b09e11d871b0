use std::sync::Arc;

use anyhow::Result;

use ordina_fhir::{patient_search_tool, ToolExecutor};
use ordina_provider::{ContentBlock, LlmMessage, LlmProvider, LlmRequest, LlmResponse};
use ordina_schema::{IntentCategory, Message};

use crate::prompts;

/// Final-answer generation. One completion call for every category
/// except `PatientLookup`, which runs the two-round tool protocol.
pub struct ResponseGenerator {
    provider: Arc<dyn LlmProvider>,
    executor: ToolExecutor,
    model: String,
    history_window: usize,
}

impl ResponseGenerator {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        executor: ToolExecutor,
        model: String,
        history_window: usize,
    ) -> Self {
        Self {
            provider,
            executor,
            model,
            history_window,
        }
    }

    /// Produce the answer text for one turn. Completion failures
    /// propagate; tool and search failures never do, they are folded
    /// into the answer.
    pub async fn generate(
        &self,
        query: &str,
        context: Option<&str>,
        history: &[Message],
        category: IntentCategory,
    ) -> Result<String> {
        let formatted_history = prompts::format_history(history, self.history_window);
        let system = prompts::system_prompt(category, &formatted_history);
        let user = prompts::user_message(query, context, !formatted_history.is_empty());

        if category.needs_tool_call() {
            self.generate_with_tools(system, user).await
        } else {
            let request = LlmRequest::simple(self.model.clone(), Some(system), user);
            let response = self.provider.chat(request).await?;
            Ok(text_or_fallback(&response))
        }
    }

    /// Two rounds at most. Round one offers the patient search tool; if
    /// the model requests it, every requested call is executed and the
    /// transcript is extended with the results before the single final
    /// round. The final round never loops again.
    async fn generate_with_tools(&self, system: String, user: String) -> Result<String> {
        let tools = vec![patient_search_tool()];
        let mut transcript = vec![LlmMessage::user(user)];

        let first = self
            .provider
            .chat(LlmRequest {
                model: self.model.clone(),
                system: Some(system.clone()),
                messages: transcript.clone(),
                max_tokens: 1000,
                tools: tools.clone(),
            })
            .await?;

        let tool_uses = first.tool_uses();
        if tool_uses.is_empty() {
            return Ok(text_or_fallback(&first));
        }

        tracing::info!(count = tool_uses.len(), "executing requested tool calls");

        let mut results = Vec::with_capacity(tool_uses.len());
        for (id, name, input) in &tool_uses {
            let output = self.executor.execute(name, input).await;
            results.push(ContentBlock::ToolResult {
                tool_use_id: id.clone(),
                content: output,
                is_error: false,
            });
        }

        transcript.push(LlmMessage {
            role: "assistant".into(),
            content: first.content,
        });
        transcript.push(LlmMessage {
            role: "user".into(),
            content: results,
        });

        let last = self
            .provider
            .chat(LlmRequest {
                model: self.model.clone(),
                system: Some(system),
                messages: transcript,
                max_tokens: 1000,
                tools,
            })
            .await?;

        Ok(text_or_fallback(&last))
    }
}

fn text_or_fallback(response: &LlmResponse) -> String {
    let text = response.text.trim();
    if text.is_empty() {
        tracing::warn!("model returned an empty answer, using fallback");
        prompts::FALLBACK_ANSWER.to_string()
    } else {
        text.to_string()
    }
}
