// crates/core/src/runner/http.rs
//! Live runner: research API for search and kit generation, browser
//! automation API for form filling.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info};

use super::config::RunnerConfig;
use super::types::{
    FillOutcome, FillRequest, JobListing, KitContent, KitRequest, RunnerError, Screenshot,
    SearchRequest,
};
use super::TaskRunner;

const API_KEY_HEADER: &str = "X-API-Key";
const DEFAULT_USER_LOCATION: &str = "San Francisco, CA, US";
const KIT_INSTRUCTIONS: &str = "Generate a tailored cover letter and 5-7 resume bullet points \
    that highlight relevant skills and experience for this specific role. \
    The cover letter should be professional, concise (3-4 paragraphs), \
    and demonstrate clear understanding of the role requirements.";

pub struct HttpTaskRunner {
    client: Client,
    research_base_url: String,
    browsing_url: String,
    research_api_key: Option<String>,
    browsing_api_key: Option<String>,
    poll_interval: Duration,
}

#[derive(Debug, Deserialize)]
struct ResearchTaskCreated {
    task_id: String,
}

#[derive(Debug, Deserialize)]
struct ResearchTaskStatus {
    status: String,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AutomationRun {
    #[serde(default)]
    session_id: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    result_json: Option<Value>,
    #[serde(default)]
    screenshots: Vec<Value>,
    #[serde(default)]
    final_url: Option<String>,
    #[serde(default)]
    stopped_at: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl HttpTaskRunner {
    pub fn new(config: &RunnerConfig) -> Result<Self, RunnerError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| RunnerError::NotConfigured(format!("HTTP client: {e}")))?;
        Ok(Self {
            client,
            research_base_url: config.research_base_url.trim_end_matches('/').to_string(),
            browsing_url: config.browsing_url.clone(),
            research_api_key: config.research_api_key.clone(),
            browsing_api_key: config.browsing_api_key.clone(),
            poll_interval: Duration::from_secs(config.poll_interval_secs),
        })
    }

    /// Shorter poll interval, for tests against a local mock server.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    fn research_url(&self, path: &str) -> String {
        format!("{}{}", self.research_base_url, path)
    }

    fn authed(builder: RequestBuilder, key: &Option<String>, service: &str) -> Result<RequestBuilder, RunnerError> {
        match key.as_deref().filter(|k| !k.is_empty()) {
            Some(key) => Ok(builder.header(API_KEY_HEADER, key)),
            None => Err(RunnerError::Auth(format!("no API key configured for {service}"))),
        }
    }

    /// Send, map the status code, decode the JSON body.
    async fn send_json<T: DeserializeOwned>(
        builder: RequestBuilder,
        service: &str,
    ) -> Result<T, RunnerError> {
        let response = builder
            .send()
            .await
            .map_err(|e| RunnerError::Remote(format!("{service} request failed: {e}")))?;
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(RunnerError::Auth(format!("{service} returned {status}")));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let snippet: String = body.chars().take(200).collect();
            return Err(RunnerError::Remote(format!(
                "{service} returned {status}: {snippet}"
            )));
        }
        response
            .json::<T>()
            .await
            .map_err(|e| RunnerError::Remote(format!("{service} sent a malformed response: {e}")))
    }

    fn research_query(request: &SearchRequest) -> String {
        let mut query = format!("Find {} {} job postings", request.max_results, request.query);
        if let Some(location) = request.location.as_deref().filter(|l| !l.is_empty()) {
            query.push_str(&format!(" in {location}"));
        }
        query.push_str(
            ". For each job, provide: title, company name, location, \
             job description summary, and application URL. \
             Answer with a JSON array of objects with keys \
             title, company, location, description, url.",
        );
        query
    }

    fn form_goal(request: &FillRequest) -> String {
        let mut goal = format!(
            "Navigate to this job application page and fill out the form.\n\n\
             Application URL: {}\n\nFill in these details:\n",
            request.application_url
        );
        for (field, value) in &request.form_data {
            goal.push_str(&format!("- {field}: {value}\n"));
        }
        goal.push_str("\nInstructions:\n1. Fill in all visible form fields with the data above\n");
        if request.submit {
            goal.push_str(
                "2. Click the \"Submit\" or \"Apply\" button\n\
                 3. Wait for confirmation that the application was submitted\n\
                 4. Return a JSON object of the fields you filled, plus \"submitted\": true\n",
            );
        } else {
            goal.push_str(
                "2. Do NOT submit. Stop on the submit button for manual review\n\
                 3. Return a JSON object of the fields you filled, plus \"submitted\": false\n",
            );
        }
        goal
    }
}

/// Listings out of a research result: a JSON array, a JSON array embedded in
/// prose, or `{"jobs": [...]}`. Anything else becomes one listing whose
/// description is the text itself.
fn parse_listings(result: &Value, request: &SearchRequest) -> Vec<JobListing> {
    let from_value = |value: &Value| -> Option<Vec<JobListing>> {
        let array = match value {
            Value::Array(_) => value,
            Value::Object(map) => map.get("jobs")?,
            _ => return None,
        };
        serde_json::from_value(array.clone()).ok()
    };

    let text = match result {
        Value::String(text) => text.as_str(),
        other => return from_value(other).unwrap_or_default(),
    };
    if let Ok(value) = serde_json::from_str::<Value>(text) {
        if let Some(listings) = from_value(&value) {
            return listings;
        }
    }
    if let (Some(start), Some(end)) = (text.find('['), text.rfind(']')) {
        if start < end {
            if let Ok(listings) = serde_json::from_str::<Vec<JobListing>>(&text[start..=end]) {
                return listings;
            }
        }
    }
    vec![JobListing {
        title: format!("{} Position", request.query),
        company: "Unknown".into(),
        location: request.location.clone(),
        description: text.chars().take(200).collect(),
        url: String::new(),
        posted_date: None,
        salary_range: None,
    }]
}

fn field_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn parse_screenshots(raw: &[Value]) -> Vec<Screenshot> {
    raw.iter()
        .enumerate()
        .filter_map(|(i, shot)| match shot {
            Value::String(data) => Some(Screenshot {
                step: format!("step_{i}"),
                data: data.clone(),
            }),
            Value::Object(map) => Some(Screenshot {
                step: map
                    .get("name")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("step_{i}")),
                data: map.get("data").and_then(Value::as_str)?.to_string(),
            }),
            _ => None,
        })
        .collect()
}

#[async_trait]
impl TaskRunner for HttpTaskRunner {
    async fn search_jobs(&self, request: &SearchRequest) -> Result<Vec<JobListing>, RunnerError> {
        let payload = json!({
            "query": Self::research_query(request),
            "user_location": request
                .location
                .as_deref()
                .filter(|l| !l.is_empty())
                .unwrap_or(DEFAULT_USER_LOCATION),
        });
        let builder = self
            .client
            .post(self.research_url("/v1/research/tasks"))
            .json(&payload);
        let created: ResearchTaskCreated =
            Self::send_json(Self::authed(builder, &self.research_api_key, "research API")?, "research API")
                .await?;
        info!(research_task = %created.task_id, "research task created");

        let status_url = self.research_url(&format!("/v1/research/tasks/{}", created.task_id));
        loop {
            tokio::time::sleep(self.poll_interval).await;
            let builder = self.client.get(&status_url);
            let status: ResearchTaskStatus = Self::send_json(
                Self::authed(builder, &self.research_api_key, "research API")?,
                "research API",
            )
            .await?;
            debug!(research_task = %created.task_id, status = %status.status, "polled research task");
            match status.status.as_str() {
                "succeeded" => {
                    let result = status.result.unwrap_or(Value::Null);
                    let mut listings = parse_listings(&result, request);
                    listings.truncate(request.max_results);
                    return Ok(listings);
                }
                "failed" => {
                    return Err(RunnerError::Remote(format!(
                        "Research task failed: {}",
                        status.error.as_deref().unwrap_or("Unknown error")
                    )))
                }
                _ => continue,
            }
        }
    }

    async fn generate_kit(&self, request: &KitRequest) -> Result<KitContent, RunnerError> {
        let job = &request.job;
        let payload = json!({
            "task": "generate_application",
            "context": {
                "job_description": job.description,
                "resume": request.resume_text,
                "job_title": job.title,
                "company": job.company,
            },
            "instructions": KIT_INSTRUCTIONS,
        });
        let builder = self
            .client
            .post(self.research_url("/v1/generate"))
            .json(&payload);
        let kit: KitContent =
            Self::send_json(Self::authed(builder, &self.research_api_key, "research API")?, "research API")
                .await?;
        if kit.cover_letter.trim().is_empty() {
            return Err(RunnerError::Remote(
                "research API returned an empty cover letter".into(),
            ));
        }
        Ok(kit)
    }

    async fn fill_form(&self, request: &FillRequest) -> Result<FillOutcome, RunnerError> {
        let payload = json!({
            "url": request.application_url,
            "goal": Self::form_goal(request),
            "browserProfile": "stealth",
            "responseFormat": "json",
        });
        let builder = self.client.post(&self.browsing_url).json(&payload);
        let run: AutomationRun =
            Self::send_json(Self::authed(builder, &self.browsing_api_key, "browsing API")?, "browsing API")
                .await?;

        let status = run.status.unwrap_or_else(|| "COMPLETED".to_string());
        if status.eq_ignore_ascii_case("failed") {
            return Err(RunnerError::Remote(format!(
                "automation run failed: {}",
                run.error.as_deref().unwrap_or("Unknown error")
            )));
        }

        let mut filled_fields = BTreeMap::new();
        let mut reported_submit = None;
        if let Some(Value::Object(map)) = &run.result_json {
            for (field, value) in map {
                if field == "submitted" {
                    reported_submit = value.as_bool();
                } else {
                    filled_fields.insert(field.clone(), field_text(value));
                }
            }
        }
        let submitted = request.submit && reported_submit.unwrap_or(true);

        Ok(FillOutcome {
            session_id: run.session_id,
            status,
            filled_fields,
            screenshots: parse_screenshots(&run.screenshots),
            final_url: run.final_url,
            stopped_at: run
                .stopped_at
                .or_else(|| (!submitted).then(|| "submit button".to_string())),
            submitted,
        })
    }

    fn name(&self) -> &str {
        "http"
    }
}
