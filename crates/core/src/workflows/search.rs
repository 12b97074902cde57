use applykit_db::{keys, BlobMetadata, DbError};
use applykit_types::{unix_now, Job, JobStatus, Task, TaskKind};
use serde_json::{json, Value};
use tracing::info;

use super::input::SearchInput;
use super::{unexpected_output, WorkflowOutput, Workflows};
use crate::error::WorkflowError;
use crate::runner::{JobListing, RunnerInput, RunnerOutput, SearchRequest};

/// Origin tag on jobs found by search.
const SOURCE: &str = "research_api";

pub(super) async fn run(
    wf: &Workflows,
    task: &Task,
    input: SearchInput,
) -> Result<WorkflowOutput, WorkflowError> {
    let request = SearchRequest {
        query: input.query.clone(),
        location: input.location.clone(),
        max_results: input.max_results,
    };
    let listings = match wf.call(RunnerInput::Search(request)).await? {
        RunnerOutput::Listings(listings) => listings,
        _ => return Err(unexpected_output(TaskKind::JobSearch)),
    };

    let now = unix_now();
    let mut jobs = Vec::with_capacity(listings.len());
    for listing in listings.iter().take(input.max_results) {
        let job = upsert_job(wf, task, &input, listing, now).await?;
        let mut entry = serde_json::to_value(&job).map_err(DbError::from)?;
        if let Value::Object(map) = &mut entry {
            if let Some(posted) = &listing.posted_date {
                map.insert("posted_date".into(), json!(posted));
            }
            if let Some(salary) = &listing.salary_range {
                map.insert("salary_range".into(), json!(salary));
            }
        }
        jobs.push(entry);
    }

    let artifact_key = keys::artifact(TaskKind::JobSearch.as_str(), &task.task_id, now);
    let mut metadata = BlobMetadata::new();
    metadata.insert("artifact_type".into(), TaskKind::JobSearch.as_str().into());
    metadata.insert("reference_id".into(), task.task_id.clone());
    metadata.insert("timestamp".into(), now.to_string());
    let raw = serde_json::to_vec_pretty(&listings).map_err(DbError::from)?;
    wf.blobs
        .put_blob(&artifact_key, raw, "application/json", metadata)
        .await?;

    info!(task_id = %task.task_id, count = jobs.len(), "search stored jobs");
    let count = jobs.len();
    Ok(WorkflowOutput {
        result: json!({ "jobs": jobs, "count": count }),
        blob_keys: vec![artifact_key],
    })
}

/// Write the job for `listing`. A re-found posting keeps its status and
/// creation time when it already belongs to the same owner.
async fn upsert_job(
    wf: &Workflows,
    task: &Task,
    input: &SearchInput,
    listing: &JobListing,
    now: i64,
) -> Result<Job, WorkflowError> {
    let job_id = Job::derive_id(&listing.title, &listing.company);
    let existing = wf
        .records
        .get_job(&job_id)
        .await?
        .filter(|job| job.user_id == task.user_id);
    let (status, created_at, metadata) = match existing {
        Some(job) => (job.status, job.created_at, job.metadata),
        None => (JobStatus::Found, now, Default::default()),
    };

    let mut job = Job {
        job_id,
        user_id: task.user_id.clone(),
        title: listing.title.clone(),
        company: listing.company.clone(),
        location: listing.location.clone().or_else(|| input.location.clone()),
        description: listing.description.clone(),
        url: listing.url.clone(),
        source: SOURCE.to_string(),
        status,
        created_at,
        updated_at: now,
        metadata,
    };
    job.metadata
        .insert("search_task_id".into(), json!(task.task_id));
    if let Some(posted) = &listing.posted_date {
        job.metadata.insert("posted_date".into(), json!(posted));
    }
    if let Some(salary) = &listing.salary_range {
        job.metadata.insert("salary_range".into(), json!(salary));
    }
    wf.records.put_job(&job).await?;
    Ok(job)
}
