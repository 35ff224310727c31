use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Result, ScoutError};

/// One discovered public profile, as returned by the discovery collaborator.
/// Read-only input to the scoring pipeline; its `profile_url` is the
/// candidate's identity and feeds the cache fingerprint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateRecord {
    pub profile_url: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headline: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_company: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenure_years: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub education: Option<String>,
}

impl CandidateRecord {
    pub fn new(profile_url: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            profile_url: profile_url.into(),
            name: name.into(),
            headline: None,
            location: None,
            current_company: None,
            job_title: None,
            tenure_years: None,
            education: None,
        }
    }

    /// Identity used for cache fingerprints and batch outcome keys.
    pub fn identity(&self) -> &str {
        &self.profile_url
    }

    /// A record without a resolvable profile URL cannot be scored or cached.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(ScoutError::Validation(
                "candidate record has an empty name".to_string(),
            ));
        }
        let parsed = Url::parse(&self.profile_url).map_err(|e| {
            ScoutError::Validation(format!(
                "invalid profile URL '{}': {e}",
                self.profile_url
            ))
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ScoutError::Validation(format!(
                "profile URL '{}' must be http(s)",
                self.profile_url
            )));
        }
        let has_path = parsed
            .path_segments()
            .map(|mut segments| segments.any(|s| !s.is_empty()))
            .unwrap_or(false);
        if !has_path {
            return Err(ScoutError::Validation(format!(
                "profile URL '{}' has no profile path",
                self.profile_url
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_well_formed_profile_url() {
        let candidate =
            CandidateRecord::new("https://www.linkedin.com/in/jane-doe", "Jane Doe");
        assert!(candidate.validate().is_ok());
        assert_eq!(candidate.identity(), "https://www.linkedin.com/in/jane-doe");
    }

    #[test]
    fn rejects_bare_domain_and_bad_scheme() {
        let no_path = CandidateRecord::new("https://linkedin.com", "Jane Doe");
        assert!(no_path.validate().is_err());

        let bad_scheme = CandidateRecord::new("ftp://example.com/in/jane", "Jane Doe");
        assert!(bad_scheme.validate().is_err());

        let not_a_url = CandidateRecord::new("jane-doe", "Jane Doe");
        assert!(not_a_url.validate().is_err());
    }

    #[test]
    fn rejects_empty_name() {
        let candidate = CandidateRecord::new("https://example.com/in/jane", "  ");
        assert!(candidate.validate().is_err());
    }
}
