use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_chat_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_router_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_embedding_model() -> String {
    "text-embedding-3-large".to_string()
}

fn default_embedding_dimensions() -> usize {
    3072
}

fn default_top_k() -> usize {
    5
}

fn default_min_score() -> f64 {
    0.0
}

fn default_history_window() -> usize {
    5
}

fn default_fhir_endpoint() -> String {
    "/Patient".to_string()
}

fn default_fhir_timeout_secs() -> u64 {
    10
}

fn default_fhir_max_results() -> usize {
    20
}

fn default_bind() -> String {
    "0.0.0.0:8000".to_string()
}

fn default_document_db() -> String {
    "documents.db".to_string()
}

fn default_access_policy_path() -> String {
    "access_policy.json".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,
    /// Model used for answer generation.
    #[serde(default = "default_chat_model")]
    pub chat_model: String,
    /// Model used for intent classification.
    #[serde(default = "default_router_model")]
    pub router_model: String,
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
    #[serde(default = "default_embedding_dimensions")]
    pub embedding_dimensions: usize,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: default_openai_base_url(),
            chat_model: default_chat_model(),
            router_model: default_router_model(),
            embedding_model: default_embedding_model(),
            embedding_dimensions: default_embedding_dimensions(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_min_score")]
    pub min_score: f64,
    #[serde(default = "default_document_db")]
    pub document_db: String,
    #[serde(default = "default_access_policy_path")]
    pub access_policy: String,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            min_score: default_min_score(),
            document_db: default_document_db(),
            access_policy: default_access_policy_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FhirConfig {
    #[serde(default)]
    pub base_url: String,
    #[serde(default = "default_fhir_endpoint")]
    pub patient_endpoint: String,
    #[serde(default = "default_fhir_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_fhir_max_results")]
    pub max_results: usize,
}

impl Default for FhirConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            patient_endpoint: default_fhir_endpoint(),
            timeout_secs: default_fhir_timeout_secs(),
            max_results: default_fhir_max_results(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub fhir: FhirConfig,
    #[serde(default = "default_bind")]
    pub bind: String,
    /// How many recent messages the classifier and generator see.
    #[serde(default = "default_history_window")]
    pub history_window: usize,
}

impl AppConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config: AppConfig = serde_yaml::from_str(&raw)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        Ok(config)
    }
}

// ============================================================
// Access policy
// ============================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub name: String,
    pub role: String,
    #[serde(default)]
    pub file_access: Vec<String>,
}

/// Persisted file-access policy: which document names each user may
/// retrieve. Loaded once at startup.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccessPolicyConfig {
    #[serde(default)]
    pub public: Vec<String>,
    #[serde(default)]
    pub by_role: HashMap<String, Vec<String>>,
    #[serde(default)]
    pub users: HashMap<u32, UserRecord>,
}

impl AccessPolicyConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read access policy {}", path.display()))?;
        let policy: AccessPolicyConfig = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse access policy {}", path.display()))?;
        Ok(policy)
    }

    /// Effective allow-list for a user: public ∪ role files ∪ per-user files.
    /// An unknown or absent user gets the empty set, never an error.
    pub fn allowed_files(&self, user_id: Option<u32>) -> HashSet<String> {
        let Some(user_id) = user_id else {
            return HashSet::new();
        };
        let Some(user) = self.users.get(&user_id) else {
            return HashSet::new();
        };

        let mut allowed: HashSet<String> = self.public.iter().cloned().collect();
        if let Some(role_files) = self.by_role.get(&user.role) {
            allowed.extend(role_files.iter().cloned());
        }
        allowed.extend(user.file_access.iter().cloned());
        allowed
    }
}
