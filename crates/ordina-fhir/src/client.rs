use std::collections::BTreeMap;
use std::time::Duration;

use chrono::NaiveDate;
use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;

use ordina_schema::FhirConfig;

/// Failure modes of the record-search collaborator, each mapped to a
/// distinct user-facing message by the tool executor.
#[derive(Debug, Error)]
pub enum FhirError {
    #[error("cannot connect to FHIR server")]
    Connection,
    #[error("FHIR server request timed out")]
    Timeout,
    #[error("invalid search parameters")]
    BadRequest,
    #[error("FHIR endpoint not found")]
    NotFound,
    #[error("FHIR server error: {0}")]
    Server(String),
    #[error("unexpected FHIR error: {0}")]
    Unexpected(String),
}

/// Simplified patient record extracted from a FHIR Bundle entry.
#[derive(Debug, Clone, PartialEq)]
pub struct Patient {
    pub id: String,
    pub name: String,
    pub birthdate: String,
    pub gender: String,
    pub telecom: Vec<String>,
    pub identifiers: Vec<String>,
}

/// Client for the FHIR Patient search endpoint.
#[derive(Clone)]
pub struct FhirClient {
    client: reqwest::Client,
    base_url: String,
    patient_endpoint: String,
    max_results: usize,
}

impl FhirClient {
    pub fn new(config: &FhirConfig) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(config.timeout_secs))
                .build()
                .unwrap_or_default(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            patient_endpoint: config.patient_endpoint.clone(),
            max_results: config.max_results,
        }
    }

    /// Search for patients. `search_params` must already be stripped of
    /// empty values; `birthdate` is normalized here before the request.
    pub async fn search_patients(
        &self,
        search_params: &BTreeMap<String, String>,
    ) -> Result<Vec<Patient>, FhirError> {
        let url = format!(
            "{}/{}",
            self.base_url,
            self.patient_endpoint.trim_start_matches('/')
        );

        let mut query: Vec<(String, String)> = Vec::new();
        for (key, value) in search_params {
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            if key == "birthdate" {
                // A range like "ge1990-01-01&le1990-12-31" becomes two
                // repeated birthdate parameters.
                for part in normalize_birthdate(value).split('&') {
                    query.push(("birthdate".to_string(), part.to_string()));
                }
            } else {
                query.push((key.clone(), value.to_string()));
            }
        }
        query.push(("_count".to_string(), self.max_results.to_string()));

        tracing::info!(%url, params = ?query, "FHIR patient search");

        let response = self
            .client
            .get(&url)
            .query(&query)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    FhirError::Timeout
                } else if e.is_connect() {
                    FhirError::Connection
                } else {
                    FhirError::Unexpected(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(match status {
                StatusCode::BAD_REQUEST => FhirError::BadRequest,
                StatusCode::NOT_FOUND => FhirError::NotFound,
                s => FhirError::Server(format!("status {s}")),
            });
        }

        let bundle: Value = response
            .json()
            .await
            .map_err(|e| FhirError::Unexpected(format!("invalid bundle JSON: {e}")))?;

        let patients = extract_patients(&bundle);
        tracing::info!(count = patients.len(), "FHIR search returned patients");
        Ok(patients)
    }
}

/// Expand shorthand birth-date values into FHIR R4 search syntax:
/// a bare year becomes a calendar-year range, a bare date an exact match,
/// and already-prefixed values pass through unchanged.
pub fn normalize_birthdate(value: &str) -> String {
    let value = value.trim();

    if value.contains('&') {
        return value.to_string();
    }
    if ["ge", "le", "gt", "lt", "eq", "ne"]
        .iter()
        .any(|p| value.starts_with(p))
    {
        return value.to_string();
    }
    if value.len() == 4 && value.chars().all(|c| c.is_ascii_digit()) {
        return format!("ge{value}-01-01&le{value}-12-31");
    }
    if value.len() == 10 && value.matches('-').count() == 2 {
        return format!("eq{value}");
    }

    value.to_string()
}

fn extract_patients(bundle: &Value) -> Vec<Patient> {
    if bundle["resourceType"].as_str() != Some("Bundle") {
        tracing::warn!(
            resource_type = bundle["resourceType"].as_str().unwrap_or("missing"),
            "expected a Bundle resource"
        );
        return Vec::new();
    }

    let mut patients = Vec::new();
    for entry in bundle["entry"].as_array().map(Vec::as_slice).unwrap_or(&[]) {
        let resource = &entry["resource"];
        if resource["resourceType"].as_str() == Some("Patient") {
            patients.push(Patient {
                id: resource["id"].as_str().unwrap_or_default().to_string(),
                name: format_name(&resource["name"]),
                birthdate: resource["birthDate"].as_str().unwrap_or_default().to_string(),
                gender: resource["gender"].as_str().unwrap_or_default().to_string(),
                telecom: format_telecom(&resource["telecom"]),
                identifiers: format_identifiers(&resource["identifier"]),
            });
        }
    }
    patients
}

fn format_name(names: &Value) -> String {
    let Some(name) = names.as_array().and_then(|a| a.first()) else {
        return String::new();
    };

    let family = match &name["family"] {
        Value::String(s) => s.clone(),
        Value::Array(parts) => parts
            .iter()
            .filter_map(Value::as_str)
            .collect::<Vec<_>>()
            .join(" "),
        _ => String::new(),
    };
    let given = name["given"]
        .as_array()
        .map(|parts| {
            parts
                .iter()
                .filter_map(Value::as_str)
                .collect::<Vec<_>>()
                .join(" ")
        })
        .unwrap_or_default();

    let mut parts = Vec::new();
    if !given.is_empty() {
        parts.push(given);
    }
    if !family.is_empty() {
        parts.push(family);
    }
    parts.join(" ")
}

fn format_telecom(telecom: &Value) -> Vec<String> {
    let mut contacts = Vec::new();
    for contact in telecom.as_array().map(Vec::as_slice).unwrap_or(&[]) {
        let system = contact["system"].as_str().unwrap_or_default();
        let value = contact["value"].as_str().unwrap_or_default();
        if value.is_empty() {
            continue;
        }
        if system.is_empty() {
            contacts.push(value.to_string());
        } else {
            contacts.push(format!("{system}: {value}"));
        }
    }
    contacts
}

fn format_identifiers(identifiers: &Value) -> Vec<String> {
    let mut ids = Vec::new();
    for identifier in identifiers.as_array().map(Vec::as_slice).unwrap_or(&[]) {
        let system = identifier["system"].as_str().unwrap_or_default();
        let value = identifier["value"].as_str().unwrap_or_default();
        if value.is_empty() {
            continue;
        }
        let lower = system.to_lowercase();
        if lower.contains("medical-record") || lower.contains("mrn") {
            ids.push(format!("MRN: {value}"));
        } else {
            ids.push(value.to_string());
        }
    }
    ids
}

pub const NO_PATIENTS_SENTINEL: &str =
    "Nebyli nalezeni žádní pacienti odpovídající zadaným kritériím.";

/// Render a patient list as natural Czech text for the tool result.
pub fn format_patients_czech(patients: &[Patient]) -> String {
    if patients.is_empty() {
        return NO_PATIENTS_SENTINEL.to_string();
    }

    let mut lines = vec![format!("Nalezeno {} pacientů:", patients.len()), String::new()];

    for (i, patient) in patients.iter().enumerate() {
        let name = if patient.name.is_empty() {
            "Neznámé jméno"
        } else {
            &patient.name
        };
        lines.push(format!("{}. {}", i + 1, name));

        if !patient.birthdate.is_empty() {
            let display = NaiveDate::parse_from_str(&patient.birthdate, "%Y-%m-%d")
                .map(|d| d.format("%d.%m.%Y").to_string())
                .unwrap_or_else(|_| patient.birthdate.clone());
            lines.push(format!("   • Datum narození: {display}"));
        }

        if !patient.gender.is_empty() {
            let gender_lower = patient.gender.to_lowercase();
            let gender = match gender_lower.as_str() {
                "male" => "muž",
                "female" => "žena",
                "other" => "jiné",
                "unknown" => "neznámé",
                other => other,
            };
            lines.push(format!("   • Pohlaví: {gender}"));
        }

        for identifier in &patient.identifiers {
            lines.push(format!("   • Identifikátor: {identifier}"));
        }
        for contact in &patient.telecom {
            lines.push(format!("   • Kontakt: {contact}"));
        }

        lines.push(String::new());
    }

    lines.push(format!("Celkem nalezeno: {} pacientů", patients.len()));
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn sample_bundle() -> Value {
        serde_json::json!({
            "resourceType": "Bundle",
            "entry": [{
                "resource": {
                    "resourceType": "Patient",
                    "id": "p1",
                    "name": [{"family": "Novák", "given": ["Jan"]}],
                    "birthDate": "1990-05-20",
                    "gender": "male",
                    "telecom": [{"system": "phone", "value": "+420123456789"}],
                    "identifier": [
                        {"system": "urn:medical-record", "value": "12345"},
                        {"system": "urn:other", "value": "abc"}
                    ]
                }
            }]
        })
    }

    #[test]
    fn birthdate_normalization_table() {
        assert_eq!(normalize_birthdate("1990"), "ge1990-01-01&le1990-12-31");
        assert_eq!(normalize_birthdate("ge1990-01-01"), "ge1990-01-01");
        assert_eq!(
            normalize_birthdate("ge2022-01-01&le2025-12-31"),
            "ge2022-01-01&le2025-12-31"
        );
        assert_eq!(normalize_birthdate("le2000-01-01"), "le2000-01-01");
        assert_eq!(normalize_birthdate("1990-05-20"), "eq1990-05-20");
        assert_eq!(normalize_birthdate(" 1990 "), "ge1990-01-01&le1990-12-31");
        // Not a year, not a date: passes through untouched.
        assert_eq!(normalize_birthdate("199"), "199");
    }

    #[test]
    fn bundle_extraction_formats_fields() {
        let patients = extract_patients(&sample_bundle());
        assert_eq!(patients.len(), 1);
        let p = &patients[0];
        assert_eq!(p.name, "Jan Novák");
        assert_eq!(p.identifiers, vec!["MRN: 12345", "abc"]);
        assert_eq!(p.telecom, vec!["phone: +420123456789"]);
    }

    #[test]
    fn non_bundle_resource_yields_no_patients() {
        let patients = extract_patients(&serde_json::json!({"resourceType": "OperationOutcome"}));
        assert!(patients.is_empty());
    }

    #[test]
    fn czech_formatting_of_results() {
        let patients = extract_patients(&sample_bundle());
        let text = format_patients_czech(&patients);
        assert!(text.contains("Nalezeno 1 pacientů:"));
        assert!(text.contains("1. Jan Novák"));
        assert!(text.contains("Datum narození: 20.05.1990"));
        assert!(text.contains("Pohlaví: muž"));
        assert!(text.contains("Identifikátor: MRN: 12345"));
        assert!(text.contains("Kontakt: phone: +420123456789"));
        assert!(text.contains("Celkem nalezeno: 1 pacientů"));
    }

    #[test]
    fn czech_formatting_of_empty_results() {
        assert_eq!(format_patients_czech(&[]), NO_PATIENTS_SENTINEL);
    }

    fn test_config(base_url: String) -> FhirConfig {
        FhirConfig {
            base_url,
            patient_endpoint: "/Patient".into(),
            timeout_secs: 2,
            max_results: 20,
        }
    }

    #[tokio::test]
    async fn search_sends_normalized_query_and_count() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/Patient"))
            .and(query_param("family", "Novák"))
            .and(query_param("_count", "20"))
            .respond_with(ResponseTemplate::new(200).set_body_json(sample_bundle()))
            .mount(&server)
            .await;

        let client = FhirClient::new(&test_config(server.uri()));
        let mut params = BTreeMap::new();
        params.insert("family".to_string(), "Novák".to_string());
        params.insert("birthdate".to_string(), "1990".to_string());

        let patients = client.search_patients(&params).await.unwrap();
        assert_eq!(patients.len(), 1);
    }

    #[tokio::test]
    async fn search_maps_http_statuses_to_error_kinds() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/Patient"))
            .respond_with(ResponseTemplate::new(400))
            .mount(&server)
            .await;

        let client = FhirClient::new(&test_config(server.uri()));
        let err = client.search_patients(&BTreeMap::new()).await.err().unwrap();
        assert!(matches!(err, FhirError::BadRequest));
    }

    #[tokio::test]
    async fn search_maps_connection_failure() {
        // Nothing listens on this port.
        let client = FhirClient::new(&test_config("http://127.0.0.1:1".to_string()));
        let err = client.search_patients(&BTreeMap::new()).await.err().unwrap();
        assert!(matches!(err, FhirError::Connection));
    }
}
