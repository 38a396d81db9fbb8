//! Static disease reference catalog.
//!
//! Loaded once at startup from a JSON file and held read-only for the
//! lifetime of the process. Lookups never fail: an unknown disease name
//! yields an empty symptom list.

use serde::Deserialize;
use service_core::error::AppError;
use std::collections::HashMap;

/// One catalog record as stored on disk.
#[derive(Debug, Clone, Deserialize)]
pub struct DiseaseRecord {
    pub name: String,
    pub symptoms: Vec<String>,
}

/// Read-only disease name -> symptoms lookup.
#[derive(Debug)]
pub struct DiseaseCatalog {
    symptoms: HashMap<String, Vec<String>>,
}

impl DiseaseCatalog {
    /// Load the catalog from a JSON file containing an array of
    /// `{name, symptoms}` records.
    pub fn load(path: &str) -> Result<Self, AppError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            AppError::ConfigError(anyhow::anyhow!(
                "Failed to read disease catalog at {}: {}",
                path,
                e
            ))
        })?;
        let records: Vec<DiseaseRecord> = serde_json::from_str(&raw).map_err(|e| {
            AppError::ConfigError(anyhow::anyhow!(
                "Disease catalog at {} is not valid JSON: {}",
                path,
                e
            ))
        })?;

        tracing::info!(path = %path, diseases = records.len(), "Disease catalog loaded");
        Ok(Self::from_records(records))
    }

    pub fn from_records(records: Vec<DiseaseRecord>) -> Self {
        let symptoms = records
            .into_iter()
            .map(|r| (r.name, r.symptoms))
            .collect();
        Self { symptoms }
    }

    /// Symptoms for a disease name. Unknown names yield an empty slice
    /// rather than an error.
    pub fn symptoms(&self, disease: &str) -> &[String] {
        self.symptoms
            .get(disease)
            .map(|s| s.as_slice())
            .unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.symptoms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symptoms.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_catalog() -> DiseaseCatalog {
        DiseaseCatalog::from_records(vec![
            DiseaseRecord {
                name: "Acne".to_string(),
                symptoms: vec!["Whiteheads".to_string(), "Oily skin".to_string()],
            },
            DiseaseRecord {
                name: "Eczema".to_string(),
                symptoms: vec!["Dry patches".to_string()],
            },
        ])
    }

    #[test]
    fn known_disease_returns_symptoms() {
        let catalog = test_catalog();
        assert_eq!(catalog.symptoms("Acne").len(), 2);
        assert_eq!(catalog.symptoms("Eczema"), ["Dry patches".to_string()]);
    }

    #[test]
    fn unknown_disease_returns_empty_list() {
        let catalog = test_catalog();
        assert!(catalog.symptoms("Not A Disease").is_empty());
    }

    #[test]
    fn parses_record_array() {
        let records: Vec<DiseaseRecord> = serde_json::from_str(
            r#"[{"name": "Rosacea", "symptoms": ["Facial redness"]}]"#,
        )
        .unwrap();
        let catalog = DiseaseCatalog::from_records(records);
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.symptoms("Rosacea"), ["Facial redness".to_string()]);
    }
}
