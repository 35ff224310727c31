//! Prompt templates for the scoring oracle.
//!
//! Plain `format!()` interpolation; missing variables are compile errors.

use crate::models::{CandidateRecord, JobProfile, ScoreBreakdown};

fn optional(field: &Option<String>) -> &str {
    field.as_deref().unwrap_or("N/A")
}

/// Prompt asking the oracle to score a candidate on the six-criterion
/// rubric and return one JSON object per criterion.
///
/// # Example
/// ```
/// use scout::llm::prompts::scoring_prompt;
/// use scout::models::{CandidateRecord, JobProfile};
///
/// let job = JobProfile::parse("Senior Rust Engineer, Remote");
/// let candidate = CandidateRecord::new("https://example.com/in/jane", "Jane Doe");
/// let prompt = scoring_prompt(&job, &candidate);
/// assert!(prompt.contains("Jane Doe"));
/// assert!(prompt.contains("education"));
/// ```
pub fn scoring_prompt(job: &JobProfile, candidate: &CandidateRecord) -> String {
    format!(
        r#"You are an expert recruiter scoring a candidate for a job position.

Job Description:
{description}

Candidate Profile:
Name: {name}
Headline: {headline}
Current Company: {company}
Current Title: {title}
Location: {location}
Education: {education}
Years in Current Role: {tenure}

Score this candidate from 0-10 on each of the following criteria:
- education (20%): relevance of educational background
- trajectory (20%): progression and growth in career
- company (15%): experience at relevant companies
- experience (25%): direct experience with the required skills
- location (10%): geographic fit
- tenure (10%): length and stability of experience

Return ONLY a JSON object with this exact format:
{{
    "criteria": [
        {{"name": "education", "value": <0-10>, "rationale": "<one sentence>"}},
        {{"name": "trajectory", "value": <0-10>, "rationale": "<one sentence>"}},
        {{"name": "company", "value": <0-10>, "rationale": "<one sentence>"}},
        {{"name": "experience", "value": <0-10>, "rationale": "<one sentence>"}},
        {{"name": "location", "value": <0-10>, "rationale": "<one sentence>"}},
        {{"name": "tenure", "value": <0-10>, "rationale": "<one sentence>"}}
    ]
}}

Be objective and score only from the available information."#,
        description = job.description,
        name = candidate.name,
        headline = optional(&candidate.headline),
        company = optional(&candidate.current_company),
        title = optional(&candidate.job_title),
        location = optional(&candidate.location),
        education = optional(&candidate.education),
        tenure = candidate
            .tenure_years
            .map(|y| format!("{y:.1}"))
            .unwrap_or_else(|| "N/A".to_string()),
    )
}

/// Prompt asking the oracle for a short personalized outreach message.
pub fn outreach_prompt(
    job: &JobProfile,
    candidate: &CandidateRecord,
    breakdown: &ScoreBreakdown,
) -> String {
    let highlights = breakdown
        .scores
        .iter()
        .map(|s| match &s.rationale {
            Some(rationale) => format!("- {} ({:.1}/10): {}", s.criterion.as_str(), s.value, rationale),
            None => format!("- {} ({:.1}/10)", s.criterion.as_str(), s.value),
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"Write a professional outreach message for this candidate.

Job Description:
{description}

Candidate:
Name: {name}
Headline: {headline}
Overall Score: {composite:.1}/10
Assessment:
{highlights}

Requirements:
1. Keep it professional and concise (2-3 sentences)
2. Reference their headline and one or two concrete details from the assessment
3. Make it relevant to the job opportunity
4. Include a clear call-to-action
5. Warm but professional tone

Return ONLY the message text, no additional formatting."#,
        description = job.description,
        name = candidate.name,
        headline = optional(&candidate.headline),
        composite = breakdown.composite,
    )
}

/// Neutral fallback used when outreach generation fails.
pub fn fallback_outreach(candidate: &CandidateRecord) -> String {
    format!(
        "Hi {}, I came across your profile and would love to connect regarding \
         a potential opportunity.",
        candidate.name
    )
}
