use std::sync::Arc;
use std::time::Instant;

use thiserror::Error;
use uuid::Uuid;

use ordina_retrieval::{format_context, Retriever};
use ordina_schema::{AccessPolicyConfig, ChatRequest, ChatResponse, Message, SourceReference};

use crate::classifier::IntentClassifier;
use crate::generator::ResponseGenerator;
use crate::session::{SessionError, SessionStore};
use crate::session_lock::SessionLocks;

/// Turn-level failures. Anything with a sensible natural-language
/// fallback is absorbed before this point; what remains is either a
/// client error (unknown session) or a genuine outage.
#[derive(Debug, Error)]
pub enum TurnError {
    #[error("session {0} not found")]
    SessionNotFound(Uuid),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<SessionError> for TurnError {
    fn from(err: SessionError) -> Self {
        let SessionError::NotFound(id) = err;
        TurnError::SessionNotFound(id)
    }
}

/// One user turn end to end: session resolution, classification,
/// access-controlled retrieval, generation, history append.
pub struct TurnPipeline {
    store: Arc<SessionStore>,
    locks: SessionLocks,
    classifier: IntentClassifier,
    retriever: Retriever,
    generator: ResponseGenerator,
    policy: AccessPolicyConfig,
    top_k: usize,
    min_score: f64,
}

impl TurnPipeline {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<SessionStore>,
        classifier: IntentClassifier,
        retriever: Retriever,
        generator: ResponseGenerator,
        policy: AccessPolicyConfig,
        top_k: usize,
        min_score: f64,
    ) -> Self {
        Self {
            store,
            locks: SessionLocks::new(),
            classifier,
            retriever,
            generator,
            policy,
            top_k,
            min_score,
        }
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Forget a session's history and drop its idle lock entry.
    pub async fn clear_session(&self, session_id: Uuid) -> Result<(), TurnError> {
        self.store.clear(session_id).await?;
        self.locks.prune().await;
        Ok(())
    }

    pub async fn handle(&self, request: ChatRequest) -> Result<ChatResponse, TurnError> {
        let started = Instant::now();

        let session_id = match request.session_id {
            Some(id) => {
                if !self.store.exists(id).await {
                    return Err(TurnError::SessionNotFound(id));
                }
                id
            }
            None => self.store.create().await,
        };

        // Serialize turns for this session; other sessions run freely.
        let _guard = self.locks.acquire(session_id).await;

        let history = self.store.get(session_id).await?;
        let category = self.classifier.classify(&request.query, &history).await;

        let (context, sources) = if category.needs_retrieval() {
            let allow_list = self.policy.allowed_files(request.user_id);
            let chunks = self
                .retriever
                .retrieve(&request.query, Some(&allow_list), self.top_k, self.min_score)
                .await?;
            let sources: Vec<SourceReference> = chunks
                .iter()
                .map(|c| SourceReference {
                    document_name: c.document_name.clone(),
                    chunk_text: SourceReference::truncate_excerpt(&c.chunk_text),
                    relevance_score: c.relevance_score,
                    department: c.department.clone(),
                    process_owner: c.process_owner.clone(),
                })
                .collect();
            (Some(format_context(&chunks)), sources)
        } else {
            (None, Vec::new())
        };

        let answer = self
            .generator
            .generate(&request.query, context.as_deref(), &history, category)
            .await?;

        let assistant = if sources.is_empty() {
            Message::assistant(&answer)
        } else {
            Message::assistant_with_sources(&answer, sources.clone())
        };

        self.store
            .append(session_id, Message::user(&request.query))
            .await?;
        self.store.append(session_id, assistant.clone()).await?;

        let processing_time = started.elapsed().as_secs_f64();
        tracing::info!(
            session_id = %session_id,
            category = category.as_str(),
            used_rag = category.needs_retrieval(),
            sources = sources.len(),
            elapsed_secs = processing_time,
            "turn handled"
        );

        Ok(ChatResponse {
            session_id,
            message: assistant,
            used_rag: category.needs_retrieval(),
            sources,
            processing_time,
            action_type: category.action_type(),
        })
    }
}
