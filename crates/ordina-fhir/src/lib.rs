//! FHIR patient search: an HTTP client for the Patient endpoint, Czech
//! result formatting, and the tool executor that bridges model tool
//! calls to the search.

pub mod client;
pub mod executor;

pub use client::{
    format_patients_czech, normalize_birthdate, FhirClient, FhirError, Patient,
    NO_PATIENTS_SENTINEL,
};
pub use executor::{patient_search_tool, ToolExecutor, PATIENT_SEARCH_TOOL};
