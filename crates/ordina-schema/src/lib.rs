pub mod config;

pub use config::*;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// One turn half: a user query or an assistant answer. Immutable once
/// appended to a session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    /// Present only on assistant messages that used retrieval.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<SourceReference>>,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
            timestamp: Utc::now(),
            sources: None,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
            timestamp: Utc::now(),
            sources: None,
        }
    }

    pub fn assistant_with_sources(
        content: impl Into<String>,
        sources: Vec<SourceReference>,
    ) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
            timestamp: Utc::now(),
            sources: Some(sources),
        }
    }
}

const EXCERPT_LIMIT: usize = 200;

/// A retrieved passage surfaced to the caller alongside the answer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourceReference {
    pub document_name: String,
    pub chunk_text: String,
    pub relevance_score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub process_owner: Option<String>,
}

impl SourceReference {
    /// Truncate the excerpt to a display-sized snippet. Cuts on a char
    /// boundary so multi-byte Czech text stays valid.
    pub fn truncate_excerpt(text: &str) -> String {
        if text.chars().count() <= EXCERPT_LIMIT {
            return text.to_string();
        }
        let cut: String = text.chars().take(EXCERPT_LIMIT).collect();
        format!("{cut}...")
    }
}

/// Closed set of query intents. Classification is total: the classifier
/// defaults to `GeneralRag` on any failure.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum IntentCategory {
    GeneralRag,
    Conversational,
    TripRequest,
    TripExpense,
    PatientLookup,
}

impl IntentCategory {
    pub const ALL: [IntentCategory; 5] = [
        Self::GeneralRag,
        Self::Conversational,
        Self::TripRequest,
        Self::TripExpense,
        Self::PatientLookup,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GeneralRag => "general_rag",
            Self::Conversational => "conversational",
            Self::TripRequest => "trip_request",
            Self::TripExpense => "trip_expense",
            Self::PatientLookup => "patient_lookup",
        }
    }

    /// Parse a classifier token. Case-insensitive, tolerant of surrounding
    /// whitespace and quotes; anything unrecognized is `None` so the caller
    /// can apply the fail-open default.
    pub fn parse(token: &str) -> Option<Self> {
        let token = token.trim().trim_matches(['"', '\'', '.']).to_lowercase();
        Self::ALL.iter().copied().find(|c| c.as_str() == token)
    }

    /// Whether the pipeline runs access-controlled retrieval for this intent.
    pub fn needs_retrieval(&self) -> bool {
        match self {
            Self::GeneralRag | Self::TripRequest | Self::TripExpense => true,
            Self::Conversational | Self::PatientLookup => false,
        }
    }

    /// Whether the generator runs the external tool protocol.
    pub fn needs_tool_call(&self) -> bool {
        matches!(self, Self::PatientLookup)
    }

    /// Deterministic UI hint derived from the category.
    pub fn action_type(&self) -> Option<ActionType> {
        match self {
            Self::TripRequest => Some(ActionType::ShowTripRequestForm),
            Self::TripExpense => Some(ActionType::ShowTripExpenseForm),
            Self::GeneralRag | Self::Conversational | Self::PatientLookup => None,
        }
    }
}

/// UI hint sent back with the turn response.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    ShowTripRequestForm,
    ShowTripExpenseForm,
}

// ============================================================
// Wire types
// ============================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub query: String,
    #[serde(default)]
    pub session_id: Option<Uuid>,
    #[serde(default)]
    pub user_id: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub session_id: Uuid,
    pub message: Message,
    pub used_rag: bool,
    pub sources: Vec<SourceReference>,
    /// Seconds spent handling the turn.
    pub processing_time: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_type: Option<ActionType>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intent_category_parse_accepts_known_tokens() {
        assert_eq!(
            IntentCategory::parse("general_rag"),
            Some(IntentCategory::GeneralRag)
        );
        assert_eq!(
            IntentCategory::parse("  PATIENT_LOOKUP "),
            Some(IntentCategory::PatientLookup)
        );
        assert_eq!(
            IntentCategory::parse("\"trip_request\""),
            Some(IntentCategory::TripRequest)
        );
        assert_eq!(IntentCategory::parse("something else"), None);
        assert_eq!(IntentCategory::parse(""), None);
    }

    #[test]
    fn retrieval_and_tool_flags_follow_category() {
        assert!(IntentCategory::GeneralRag.needs_retrieval());
        assert!(IntentCategory::TripRequest.needs_retrieval());
        assert!(IntentCategory::TripExpense.needs_retrieval());
        assert!(!IntentCategory::Conversational.needs_retrieval());
        assert!(!IntentCategory::PatientLookup.needs_retrieval());

        for c in IntentCategory::ALL {
            assert_eq!(c.needs_tool_call(), c == IntentCategory::PatientLookup);
        }
    }

    #[test]
    fn action_type_only_for_trip_categories() {
        assert_eq!(
            IntentCategory::TripRequest.action_type(),
            Some(ActionType::ShowTripRequestForm)
        );
        assert_eq!(
            IntentCategory::TripExpense.action_type(),
            Some(ActionType::ShowTripExpenseForm)
        );
        assert_eq!(IntentCategory::GeneralRag.action_type(), None);
        assert_eq!(IntentCategory::Conversational.action_type(), None);
        assert_eq!(IntentCategory::PatientLookup.action_type(), None);
    }

    #[test]
    fn excerpt_truncation_cuts_on_char_boundary() {
        let short = "Žádost o pracovní cestu";
        assert_eq!(SourceReference::truncate_excerpt(short), short);

        let long = "ř".repeat(300);
        let truncated = SourceReference::truncate_excerpt(&long);
        assert!(truncated.ends_with("..."));
        assert_eq!(truncated.chars().count(), 203);
    }

    #[test]
    fn message_serde_omits_empty_sources() {
        let msg = Message::assistant("hotovo");
        let json = serde_json::to_value(&msg).unwrap();
        assert!(json.get("sources").is_none());
        assert_eq!(json["role"], "assistant");

        let with = Message::assistant_with_sources(
            "hotovo",
            vec![SourceReference {
                document_name: "smernice.pdf".into(),
                chunk_text: "text".into(),
                relevance_score: 0.9,
                department: None,
                process_owner: None,
            }],
        );
        let json = serde_json::to_value(&with).unwrap();
        assert_eq!(json["sources"][0]["document_name"], "smernice.pdf");
    }

    #[test]
    fn chat_request_minimal_deserializes() {
        let req: ChatRequest = serde_json::from_str(r#"{"query": "Ahoj"}"#).unwrap();
        assert_eq!(req.query, "Ahoj");
        assert!(req.session_id.is_none());
        assert!(req.user_id.is_none());
    }
}
