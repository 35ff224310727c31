use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::OnceLock;

/// Normalized job description. Immutable for the duration of a pipeline run;
/// its identity feeds the cache fingerprint, so any change to the source
/// text yields a new identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobProfile {
    pub title: String,
    pub required_skills: Vec<String>,
    pub seniority: Option<String>,
    pub location: Option<String>,
    /// Original description text, kept for oracle prompts.
    pub description: String,
}

fn title_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[A-Z][a-zA-Z]+( [A-Z][a-zA-Z]+)*").unwrap())
}

fn location_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b(US|USA|United States|UK|Canada|India|Germany|France|Japan|Remote)\b")
            .unwrap()
    })
}

/// Skill keywords worth matching against a free-text description.
const COMMON_SKILL_TERMS: &[&str] = &[
    "software engineer",
    "developer",
    "manager",
    "director",
    "lead",
    "python",
    "javascript",
    "typescript",
    "java",
    "rust",
    "go",
    "react",
    "node.js",
    "aws",
    "kubernetes",
    "data scientist",
    "analyst",
    "product manager",
    "designer",
    "full stack",
    "backend",
    "frontend",
    "devops",
    "machine learning",
];

const SENIORITY_TERMS: &[&str] = &["intern", "junior", "senior", "staff", "principal", "lead"];

impl JobProfile {
    /// Build a profile from a free-text job description: extract a probable
    /// title, a seniority level, a location constraint, and skill keywords.
    pub fn parse(description: &str) -> Self {
        let description = description.trim().to_string();

        let title = title_regex()
            .find(&description)
            .map(|m| m.as_str().trim().to_string())
            .filter(|t| t.len() > 3)
            .unwrap_or_else(|| {
                description
                    .split_whitespace()
                    .take(3)
                    .collect::<Vec<_>>()
                    .join(" ")
            });

        let location = location_regex()
            .find(&description)
            .map(|m| m.as_str().to_string());

        let lower = description.to_lowercase();
        let seniority = SENIORITY_TERMS
            .iter()
            .find(|term| lower.contains(*term))
            .map(|term| term.to_string());

        let required_skills = COMMON_SKILL_TERMS
            .iter()
            .filter(|term| lower.contains(*term))
            .map(|term| term.to_string())
            .collect();

        Self {
            title,
            required_skills,
            seniority,
            location,
            description,
        }
    }

    /// Stable identity: SHA-256 over the whitespace-normalized, lowercased
    /// description. Two textually equivalent descriptions share an identity.
    pub fn identity(&self) -> String {
        let normalized = self
            .description
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase();
        let digest = Sha256::digest(normalized.as_bytes());
        format!("{digest:x}")
    }
}
