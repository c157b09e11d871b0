use std::collections::BTreeMap;

use serde_json::Value;

use ordina_provider::ToolDef;

use crate::client::{format_patients_czech, FhirClient, FhirError};

pub const PATIENT_SEARCH_TOOL: &str = "search_fhir_patients";

/// Definition of the patient search tool, advertised to the model
/// during patient-lookup turns.
pub fn patient_search_tool() -> ToolDef {
    ToolDef {
        name: PATIENT_SEARCH_TOOL.to_string(),
        description: "Vyhledá pacienty na FHIR serveru podle zadaných kritérií. \
                      Všechny parametry jsou volitelné; zadej jen ty, které uživatel uvedl."
            .to_string(),
        input_schema: serde_json::json!({
            "type": "object",
            "properties": {
                "name": {
                    "type": "string",
                    "description": "Celé jméno pacienta (kterákoliv část)"
                },
                "family": {
                    "type": "string",
                    "description": "Příjmení pacienta"
                },
                "given": {
                    "type": "string",
                    "description": "Křestní jméno pacienta"
                },
                "birthdate": {
                    "type": "string",
                    "description": "Datum narození (YYYY-MM-DD), rok (YYYY) nebo \
                                    rozsah s prefixy ge/le, např. ge1990-01-01"
                },
                "gender": {
                    "type": "string",
                    "enum": ["male", "female", "other", "unknown"],
                    "description": "Pohlaví pacienta"
                },
                "identifier": {
                    "type": "string",
                    "description": "Identifikátor pacienta, např. číslo záznamu"
                }
            }
        }),
    }
}

/// Runs tool calls requested by the model. Every failure mode is folded
/// into a user-facing Czech string so a tool call never aborts a turn.
pub struct ToolExecutor {
    fhir: FhirClient,
}

impl ToolExecutor {
    pub fn new(fhir: FhirClient) -> Self {
        Self { fhir }
    }

    pub async fn execute(&self, name: &str, input: &Value) -> String {
        match name {
            PATIENT_SEARCH_TOOL => self.search_patients(input).await,
            other => {
                tracing::warn!(tool = other, "model requested an unknown tool");
                format!("Chyba: Neznámá funkce '{other}'")
            }
        }
    }

    async fn search_patients(&self, input: &Value) -> String {
        let Some(params) = parse_search_params(input) else {
            tracing::warn!(?input, "malformed patient search arguments");
            return "Chyba: Neplatné parametry vyhledávání".to_string();
        };

        match self.fhir.search_patients(&params).await {
            Ok(patients) => format_patients_czech(&patients),
            Err(err) => {
                tracing::error!(error = %err, "patient search failed");
                format!("Chyba při vyhledávání pacientů: {}", czech_error(&err))
            }
        }
    }
}

fn parse_search_params(input: &Value) -> Option<BTreeMap<String, String>> {
    let object = input.as_object()?;
    let mut params = BTreeMap::new();
    for (key, value) in object {
        let Some(text) = value.as_str() else {
            continue;
        };
        if !text.trim().is_empty() {
            params.insert(key.clone(), text.trim().to_string());
        }
    }
    Some(params)
}

fn czech_error(err: &FhirError) -> String {
    match err {
        FhirError::Connection => "Nepodařilo se připojit k FHIR serveru".to_string(),
        FhirError::Timeout => "Vypršel časový limit požadavku na FHIR server".to_string(),
        FhirError::BadRequest => "Neplatné parametry dotazu".to_string(),
        FhirError::NotFound => "FHIR endpoint nebyl nalezen".to_string(),
        FhirError::Server(detail) => format!("Chyba FHIR serveru ({detail})"),
        FhirError::Unexpected(_) => {
            "Došlo k neočekávané chybě při vyhledávání pacientů".to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ordina_schema::FhirConfig;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn executor_for(base_url: String) -> ToolExecutor {
        ToolExecutor::new(FhirClient::new(&FhirConfig {
            base_url,
            patient_endpoint: "/Patient".into(),
            timeout_secs: 2,
            max_results: 20,
        }))
    }

    #[test]
    fn tool_schema_lists_all_search_fields() {
        let tool = patient_search_tool();
        assert_eq!(tool.name, PATIENT_SEARCH_TOOL);
        let props = &tool.input_schema["properties"];
        for field in ["name", "family", "given", "birthdate", "gender", "identifier"] {
            assert!(props.get(field).is_some(), "missing field {field}");
        }
    }

    #[test]
    fn params_drop_empty_and_non_string_values() {
        let params = parse_search_params(&serde_json::json!({
            "family": "Novák",
            "given": "  ",
            "gender": null,
            "identifier": 42
        }))
        .unwrap();
        assert_eq!(params.len(), 1);
        assert_eq!(params["family"], "Novák");
    }

    #[tokio::test]
    async fn unknown_tool_yields_czech_error_string() {
        let executor = executor_for("http://127.0.0.1:1".to_string());
        let result = executor.execute("delete_everything", &serde_json::json!({})).await;
        assert_eq!(result, "Chyba: Neznámá funkce 'delete_everything'");
    }

    #[tokio::test]
    async fn non_object_arguments_yield_czech_error_string() {
        let executor = executor_for("http://127.0.0.1:1".to_string());
        let result = executor
            .execute(PATIENT_SEARCH_TOOL, &Value::String("Novák".into()))
            .await;
        assert_eq!(result, "Chyba: Neplatné parametry vyhledávání");
    }

    #[tokio::test]
    async fn connection_failure_becomes_tool_result_text() {
        let executor = executor_for("http://127.0.0.1:1".to_string());
        let result = executor
            .execute(PATIENT_SEARCH_TOOL, &serde_json::json!({"family": "Novák"}))
            .await;
        assert_eq!(
            result,
            "Chyba při vyhledávání pacientů: Nepodařilo se připojit k FHIR serveru"
        );
    }

    #[tokio::test]
    async fn successful_search_returns_formatted_patients() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/Patient"))
            .and(query_param("family", "Novák"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "resourceType": "Bundle",
                "entry": []
            })))
            .mount(&server)
            .await;

        let executor = executor_for(server.uri());
        let result = executor
            .execute(PATIENT_SEARCH_TOOL, &serde_json::json!({"family": "Novák"}))
            .await;
        assert_eq!(
            result,
            "Nebyli nalezeni žádní pacienti odpovídající zadaným kritériím."
        );
    }
}
