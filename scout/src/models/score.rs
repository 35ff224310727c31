use serde::{Deserialize, Serialize};

use crate::error::{Result, ScoutError};

pub const SCORE_MIN: f64 = 0.0;
pub const SCORE_MAX: f64 = 10.0;

/// Default value for a criterion the oracle did not score.
pub const NEUTRAL_SCORE: f64 = 5.0;

/// The six fixed rubric criteria. Every breakdown carries exactly one score
/// per criterion; there is no way to add or remove criteria at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Criterion {
    Education,
    Trajectory,
    Company,
    Experience,
    Location,
    Tenure,
}

impl Criterion {
    pub const ALL: [Criterion; 6] = [
        Criterion::Education,
        Criterion::Trajectory,
        Criterion::Company,
        Criterion::Experience,
        Criterion::Location,
        Criterion::Tenure,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Criterion::Education => "education",
            Criterion::Trajectory => "trajectory",
            Criterion::Company => "company",
            Criterion::Experience => "experience",
            Criterion::Location => "location",
            Criterion::Tenure => "tenure",
        }
    }

    /// Fixed rubric weights. These sum to 1.00 (checked by test below).
    pub fn weight(&self) -> f64 {
        match self {
            Criterion::Education => 0.20,
            Criterion::Trajectory => 0.20,
            Criterion::Company => 0.15,
            Criterion::Experience => 0.25,
            Criterion::Location => 0.10,
            Criterion::Tenure => 0.10,
        }
    }

    /// Parse a criterion name from an oracle response. "skills" is accepted
    /// as a legacy alias for the experience-match criterion.
    pub fn parse(name: &str) -> Option<Criterion> {
        match name.trim().to_lowercase().as_str() {
            "education" => Some(Criterion::Education),
            "trajectory" | "career_trajectory" => Some(Criterion::Trajectory),
            "company" | "company_relevance" => Some(Criterion::Company),
            "experience" | "experience_match" | "skills" => Some(Criterion::Experience),
            "location" | "location_match" => Some(Criterion::Location),
            "tenure" => Some(Criterion::Tenure),
            _ => None,
        }
    }
}

/// One sub-rubric result: a 0-10 value and an optional free-text rationale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriterionScore {
    pub criterion: Criterion,
    pub value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
}

impl CriterionScore {
    pub fn new(criterion: Criterion, value: f64) -> Self {
        Self {
            criterion,
            value,
            rationale: None,
        }
    }

    pub fn with_rationale(criterion: Criterion, value: f64, rationale: impl Into<String>) -> Self {
        Self {
            criterion,
            value,
            rationale: Some(rationale.into()),
        }
    }
}

/// Six criterion scores plus the derived weighted composite.
///
/// Constructed through [`crate::scoring::build_breakdown`], which enforces
/// one score per criterion, clamps values into range, and computes the
/// composite. Deserialized instances (e.g. cache rows) must pass
/// [`ScoreBreakdown::validate`] before use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub scores: Vec<CriterionScore>,
    pub composite: f64,
}

impl ScoreBreakdown {
    /// Look up the score for one criterion.
    pub fn get(&self, criterion: Criterion) -> Option<&CriterionScore> {
        self.scores.iter().find(|s| s.criterion == criterion)
    }

    /// Schema validation for breakdowns that did not come from
    /// `build_breakdown` (cache rows, test fixtures).
    pub fn validate(&self) -> Result<()> {
        if self.scores.len() != Criterion::ALL.len() {
            return Err(ScoutError::Validation(format!(
                "breakdown has {} criterion scores, expected {}",
                self.scores.len(),
                Criterion::ALL.len()
            )));
        }
        for criterion in Criterion::ALL {
            let Some(score) = self.get(criterion) else {
                return Err(ScoutError::Validation(format!(
                    "breakdown is missing criterion '{}'",
                    criterion.as_str()
                )));
            };
            if !(SCORE_MIN..=SCORE_MAX).contains(&score.value) {
                return Err(ScoutError::Validation(format!(
                    "criterion '{}' value {} out of range",
                    criterion.as_str(),
                    score.value
                )));
            }
        }
        if !(SCORE_MIN..=SCORE_MAX).contains(&self.composite) {
            return Err(ScoutError::Validation(format!(
                "composite {} out of range",
                self.composite
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weights_sum_to_one() {
        let sum: f64 = Criterion::ALL.iter().map(|c| c.weight()).sum();
        assert!((sum - 1.0).abs() < 1e-9);
    }

    #[test]
    fn parses_legacy_skills_alias() {
        assert_eq!(Criterion::parse("skills"), Some(Criterion::Experience));
        assert_eq!(Criterion::parse("Education"), Some(Criterion::Education));
        assert_eq!(Criterion::parse("charisma"), None);
    }

    #[test]
    fn validate_rejects_missing_criterion() {
        let breakdown = ScoreBreakdown {
            scores: vec![CriterionScore::new(Criterion::Education, 8.0)],
            composite: 8.0,
        };
        assert!(breakdown.validate().is_err());
    }

    #[test]
    fn validate_rejects_out_of_range_value() {
        let mut scores: Vec<CriterionScore> = Criterion::ALL
            .iter()
            .map(|c| CriterionScore::new(*c, 5.0))
            .collect();
        scores[0].value = 11.5;
        let breakdown = ScoreBreakdown {
            scores,
            composite: 5.0,
        };
        assert!(breakdown.validate().is_err());
    }

    #[test]
    fn breakdown_serde_round_trip() {
        let scores: Vec<CriterionScore> = Criterion::ALL
            .iter()
            .map(|c| CriterionScore::with_rationale(*c, 7.0, "solid"))
            .collect();
        let breakdown = ScoreBreakdown {
            scores,
            composite: 7.0,
        };

        let json = serde_json::to_string(&breakdown).unwrap();
        let parsed: ScoreBreakdown = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, breakdown);
        assert!(parsed.validate().is_ok());
    }
}
