// crates/core/src/runner/mock.rs
//! Deterministic runner used when no API keys are configured.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use super::types::{
    FillOutcome, FillRequest, JobListing, KitContent, KitRequest, RunnerError, Screenshot,
    SearchRequest,
};
use super::TaskRunner;

/// PNG file signature; stands in for a real screenshot.
const PLACEHOLDER_PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];

/// Canned results shaped like the live services' answers.
#[derive(Debug, Clone, Default)]
pub struct MockTaskRunner;

impl MockTaskRunner {
    pub fn new() -> Self {
        Self
    }
}

/// `"software engineer"` → `"Software Engineer"`.
fn title_case(s: &str) -> String {
    s.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[async_trait]
impl TaskRunner for MockTaskRunner {
    async fn search_jobs(&self, request: &SearchRequest) -> Result<Vec<JobListing>, RunnerError> {
        let query = request.query.trim();
        let title = title_case(query);
        let location = |fallback: &str| {
            Some(
                request
                    .location
                    .clone()
                    .filter(|l| !l.is_empty())
                    .unwrap_or_else(|| fallback.to_string()),
            )
        };
        let listings = vec![
            JobListing {
                title: format!("{title} - Senior"),
                company: "TechCorp Inc".into(),
                location: location("San Francisco, CA"),
                description: format!(
                    "We are looking for an experienced {query} to join our team. \
                     Must have 5+ years of experience."
                ),
                url: "https://example.com/job/1".into(),
                posted_date: Some("2 days ago".into()),
                salary_range: Some("$120k - $180k".into()),
            },
            JobListing {
                title: format!("{title} - Mid Level"),
                company: "StartupXYZ".into(),
                location: location("San Francisco, CA"),
                description: format!(
                    "Join our growing team as a {query}. Work on cutting-edge technology."
                ),
                url: "https://example.com/job/2".into(),
                posted_date: Some("1 week ago".into()),
                salary_range: Some("$100k - $150k".into()),
            },
            JobListing {
                title,
                company: "BigTech Co".into(),
                location: location("Remote"),
                description: format!(
                    "Remote {query} position with competitive salary and benefits."
                ),
                url: "https://example.com/job/3".into(),
                posted_date: Some("3 days ago".into()),
                salary_range: Some("$130k - $200k".into()),
            },
        ];
        Ok(listings.into_iter().take(request.max_results).collect())
    }

    async fn generate_kit(&self, request: &KitRequest) -> Result<KitContent, RunnerError> {
        let job = &request.job;
        let cover_letter = format!(
            "Dear Hiring Manager,\n\n\
             I am excited to apply for the {title} position at {company}. \
             My background lines up closely with what the role asks for.\n\n\
             {summary}\n\n\
             Thank you for your consideration.\n\nSincerely,\nApplicant",
            title = job.title,
            company = job.company,
            summary = if job.description.is_empty() {
                "I would welcome the chance to discuss how I can contribute.".to_string()
            } else {
                format!("Your posting mentions: \"{}\"", job.description)
            },
        );
        let resume_bullets = vec![
            format!("Delivered projects directly relevant to the {} role", job.title),
            "Led cross-functional work from design through production".to_string(),
            "Improved reliability and performance of customer-facing systems".to_string(),
            "Mentored teammates and raised the bar on code review".to_string(),
            format!("Eager to bring this experience to {}", job.company),
        ];
        Ok(KitContent {
            cover_letter,
            resume_bullets,
        })
    }

    async fn fill_form(&self, request: &FillRequest) -> Result<FillOutcome, RunnerError> {
        let mut screenshots = vec![Screenshot {
            step: "before_submit".into(),
            data: STANDARD.encode(PLACEHOLDER_PNG),
        }];
        if request.submit {
            screenshots.push(Screenshot {
                step: "after_submit".into(),
                data: STANDARD.encode(PLACEHOLDER_PNG),
            });
        }
        Ok(FillOutcome {
            session_id: Some(format!("mock-{}", uuid::Uuid::new_v4())),
            status: "COMPLETED".into(),
            filled_fields: request.form_data.clone(),
            screenshots,
            final_url: Some(request.application_url.clone()),
            stopped_at: (!request.submit).then(|| "submit button".to_string()),
            submitted: request.submit,
        })
    }

    fn name(&self) -> &str {
        "mock"
    }
}
