//! End-to-end turn scenarios over the full pipeline, with a scripted
//! completion provider and an in-memory vector store.

use std::sync::Arc;

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use ordina_core::{IntentClassifier, ResponseGenerator, SessionStore, TurnError, TurnPipeline};
use ordina_fhir::{FhirClient, ToolExecutor};
use ordina_provider::{ContentBlock, LlmResponse, ScriptedProvider};
use ordina_retrieval::{DocumentStore, EmbeddingProvider, Retriever, StubEmbeddingProvider};
use ordina_schema::{
    AccessPolicyConfig, ActionType, ChatRequest, FhirConfig, IntentCategory, MessageRole,
};

const DIMS: usize = 8;

fn policy() -> AccessPolicyConfig {
    serde_json::from_str(
        r#"{
            "public": ["verejna_smernice.pdf"],
            "by_role": {"ucetni": ["cestovni_nahrady.pdf"]},
            "users": {
                "1": {"name": "Petr", "role": "ucetni", "file_access": []}
            }
        }"#,
    )
    .expect("policy JSON")
}

async fn seeded_store() -> DocumentStore {
    let store = DocumentStore::open_in_memory(DIMS).expect("open store");
    let embedder = StubEmbeddingProvider::new(DIMS);

    for (doc, text) in [
        (
            "cestovni_nahrady.pdf",
            "Žádost o pracovní cestu se podává předem nadřízenému.",
        ),
        (
            "tajny_dokument.pdf",
            "Interní dokument, který běžný uživatel nesmí vidět.",
        ),
    ] {
        let embedding = embedder.embed_query(text).await.expect("embed");
        store
            .insert_chunk(doc, text, Some("Ekonomický odbor"), None, &embedding)
            .await
            .expect("insert");
    }
    store
}

async fn pipeline(provider: ScriptedProvider, fhir_url: String) -> TurnPipeline {
    let provider = Arc::new(provider);
    let embedder = Arc::new(StubEmbeddingProvider::new(DIMS));
    let retriever = Retriever::new(seeded_store().await, embedder);
    let executor = ToolExecutor::new(FhirClient::new(&FhirConfig {
        base_url: fhir_url,
        patient_endpoint: "/Patient".into(),
        timeout_secs: 2,
        max_results: 20,
    }));

    TurnPipeline::new(
        Arc::new(SessionStore::new()),
        IntentClassifier::new(provider.clone(), "router-model".into(), 5),
        retriever,
        ResponseGenerator::new(provider, executor, "chat-model".into(), 5),
        policy(),
        5,
        0.0,
    )
}

fn request(query: &str, user_id: Option<u32>) -> ChatRequest {
    ChatRequest {
        query: query.into(),
        session_id: None,
        user_id,
    }
}

#[tokio::test]
async fn cleared_session_is_gone() {
    let p = pipeline(
        ScriptedProvider::replying(&["conversational", "Ahoj!"]),
        "http://127.0.0.1:1".into(),
    )
    .await;

    let response = p.handle(request("Ahoj", Some(1))).await.unwrap();
    let id = response.session_id;
    assert!(p.store().exists(id).await);

    p.clear_session(id).await.unwrap();
    assert!(!p.store().exists(id).await);
    assert!(matches!(
        p.clear_session(id).await,
        Err(TurnError::SessionNotFound(gone)) if gone == id
    ));
}

#[tokio::test]
async fn conversational_turn_skips_retrieval() {
    let p = pipeline(
        ScriptedProvider::replying(&[
            "conversational",
            "Ahoj! Umím pomoci s interními procesy FN Brno.",
        ]),
        "http://127.0.0.1:1".into(),
    )
    .await;

    let response = p.handle(request("Ahoj, co umíš?", Some(1))).await.unwrap();

    assert!(!response.used_rag);
    assert!(response.sources.is_empty());
    assert!(response.action_type.is_none());
    assert_eq!(
        response.message.content,
        "Ahoj! Umím pomoci s interními procesy FN Brno."
    );

    let history = p.store().get(response.session_id).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].role, MessageRole::User);
    assert_eq!(history[1].role, MessageRole::Assistant);
}

#[tokio::test]
async fn trip_request_turn_retrieves_and_flags_the_form() {
    let p = pipeline(
        ScriptedProvider::replying(&[
            "trip_request",
            "Žádost se podává předem. Pro podání žádosti o pracovní cestu \
             můžete použít následující formulář:",
        ]),
        "http://127.0.0.1:1".into(),
    )
    .await;

    let response = p
        .handle(request("Jak podat žádost o pracovní cestu?", Some(1)))
        .await
        .unwrap();

    assert!(response.used_rag);
    assert_eq!(response.action_type, Some(ActionType::ShowTripRequestForm));
    assert!(response
        .message
        .content
        .contains("Pro podání žádosti o pracovní cestu můžete použít následující formulář:"));

    // User 1 may see public and role files, never the internal one.
    assert!(!response.sources.is_empty());
    for source in &response.sources {
        assert_ne!(source.document_name, "tajny_dokument.pdf");
    }
    assert_eq!(
        response.message.sources.as_ref().map(Vec::len),
        Some(response.sources.len())
    );
}

#[tokio::test]
async fn unknown_user_gets_no_sources() {
    let p = pipeline(
        ScriptedProvider::replying(&[
            "general_rag",
            "K této otázce nemám v dokumentech žádné informace.",
        ]),
        "http://127.0.0.1:1".into(),
    )
    .await;

    let response = p
        .handle(request("Jaké jsou cestovní náhrady?", Some(99)))
        .await
        .unwrap();

    assert!(response.used_rag);
    assert!(response.sources.is_empty());
    assert!(response.message.sources.is_none());
}

#[tokio::test]
async fn patient_lookup_with_zero_records_reports_the_sentinel() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/Patient"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "resourceType": "Bundle",
            "entry": []
        })))
        .mount(&server)
        .await;

    let tool_round = LlmResponse {
        text: String::new(),
        content: vec![ContentBlock::ToolUse {
            id: "call_1".into(),
            name: "search_fhir_patients".into(),
            input: serde_json::json!({"family": "Novák"}),
        }],
        input_tokens: None,
        output_tokens: None,
        stop_reason: Some("tool_calls".into()),
    };

    let p = pipeline(
        ScriptedProvider::new(vec![
            Ok(LlmResponse::text_only("patient_lookup")),
            Ok(tool_round),
            Ok(LlmResponse::text_only(
                "Nebyli nalezeni žádní pacienti odpovídající zadaným kritériím.",
            )),
        ]),
        server.uri(),
    )
    .await;

    let response = p
        .handle(request("Najdi pacienta Nováka", Some(1)))
        .await
        .unwrap();

    assert!(!response.used_rag);
    assert!(response.sources.is_empty());
    assert_eq!(
        response.message.content,
        "Nebyli nalezeni žádní pacienti odpovídající zadaným kritériím."
    );
}

#[tokio::test]
async fn unknown_session_id_is_rejected() {
    let p = pipeline(
        ScriptedProvider::replying(&[]),
        "http://127.0.0.1:1".into(),
    )
    .await;

    let missing = uuid::Uuid::new_v4();
    let err = p
        .handle(ChatRequest {
            query: "Ahoj".into(),
            session_id: Some(missing),
            user_id: Some(1),
        })
        .await
        .err()
        .unwrap();

    match err {
        TurnError::SessionNotFound(id) => assert_eq!(id, missing),
        other => panic!("expected SessionNotFound, got {other:?}"),
    }
}

#[tokio::test]
async fn follow_up_turn_reuses_the_session() {
    let p = pipeline(
        ScriptedProvider::replying(&[
            "conversational",
            "Ahoj! Jak mohu pomoci?",
            "conversational",
            "Umím vyhledávat ve směrnicích a hledat pacienty.",
        ]),
        "http://127.0.0.1:1".into(),
    )
    .await;

    let first = p.handle(request("Ahoj", Some(1))).await.unwrap();
    let second = p
        .handle(ChatRequest {
            query: "Co všechno umíš?".into(),
            session_id: Some(first.session_id),
            user_id: Some(1),
        })
        .await
        .unwrap();

    assert_eq!(first.session_id, second.session_id);
    let history = p.store().get(first.session_id).await.unwrap();
    assert_eq!(history.len(), 4);
    assert_eq!(history[2].content, "Co všechno umíš?");
}

#[tokio::test]
async fn classifier_fallback_still_answers_via_retrieval() {
    // Router call fails; the turn proceeds as general_rag.
    let p = pipeline(
        ScriptedProvider::new(vec![
            Err(anyhow::anyhow!("router timeout")),
            Ok(LlmResponse::text_only("Odpověď na základě dokumentů.")),
        ]),
        "http://127.0.0.1:1".into(),
    )
    .await;

    let response = p.handle(request("Jak na cestovní příkaz?", Some(1))).await.unwrap();
    assert!(response.used_rag);
    assert_eq!(response.message.content, "Odpověď na základě dokumentů.");
}

#[tokio::test]
async fn intent_flags_stay_exhaustive() {
    for category in IntentCategory::ALL {
        // Every category must have a defined retrieval/tool policy.
        let _ = (category.needs_retrieval(), category.needs_tool_call());
    }
}
