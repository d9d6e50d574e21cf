//! Visa program catalogue
//!
//! Static lookup table shipped with the binary. Drives visa type validation,
//! dashboard personalization text, the sitemap and the assistant prompt.

use serde::{Deserialize, Serialize};
use crate::utils::errors::{VisaPilotError, Result};

const CATALOGUE_SOURCE: &str = include_str!("../../resources/visa_programs.toml");

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VisaProgram {
    pub code: String,
    pub name: String,
    pub summary: String,
    pub personalization: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisaCatalogue {
    pub programs: Vec<VisaProgram>,
}

impl VisaCatalogue {
    /// Parse the bundled catalogue
    pub fn load() -> Result<Self> {
        Self::parse(CATALOGUE_SOURCE)
    }

    pub fn parse(source: &str) -> Result<Self> {
        let catalogue: VisaCatalogue = toml::from_str(source)
            .map_err(|e| VisaPilotError::Config(format!("Invalid visa program catalogue: {}", e)))?;

        if catalogue.programs.is_empty() {
            return Err(VisaPilotError::Config("Visa program catalogue is empty".to_string()));
        }

        Ok(catalogue)
    }

    pub fn get(&self, code: &str) -> Option<&VisaProgram> {
        self.programs.iter().find(|program| program.code == code)
    }

    /// Reject visa types the practice does not handle
    pub fn require(&self, code: &str) -> Result<&VisaProgram> {
        self.get(code).ok_or_else(|| {
            let known: Vec<&str> = self.programs.iter().map(|p| p.code.as_str()).collect();
            VisaPilotError::InvalidInput(format!(
                "Unsupported visa type: {}. Supported: {}",
                code,
                known.join(", ")
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bundled_catalogue_has_three_programs() {
        let catalogue = VisaCatalogue::load().unwrap();
        assert_eq!(catalogue.programs.len(), 3);
        assert!(catalogue.get("skilled_worker").is_some());
        assert!(catalogue.get("student").is_some());
        assert!(catalogue.get("family").is_some());
    }

    #[test]
    fn test_require_unknown_program() {
        let catalogue = VisaCatalogue::load().unwrap();
        let err = catalogue.require("tourist").unwrap_err();
        assert!(err.to_string().contains("Unsupported visa type"));
    }

    #[test]
    fn test_empty_catalogue_rejected() {
        assert!(VisaCatalogue::parse("programs = []").is_err());
    }
}
