use applykit_db::{keys, Blob, BlobMetadata, DbError};
use applykit_types::{unix_now, ApplicationKit, JobStatus, Task, TaskKind};
use serde_json::json;
use tracing::{info, warn};

use super::input::KitInput;
use super::{unexpected_output, WorkflowOutput, Workflows, NO_RESUME_MESSAGE};
use crate::error::WorkflowError;
use crate::runner::{KitRequest, RunnerInput, RunnerOutput};

pub(super) async fn run(
    wf: &Workflows,
    task: &Task,
    input: KitInput,
) -> Result<WorkflowOutput, WorkflowError> {
    let job = wf.load_job(&input.job_id).await?;
    let resume_key = wf
        .resolve_resume(&task.user_id, input.resume_key.as_deref())
        .await?
        .ok_or_else(|| WorkflowError::Validation(NO_RESUME_MESSAGE.into()))?;
    let resume = match wf.blobs.get_blob(&resume_key).await {
        Ok(blob) => blob,
        Err(DbError::BlobNotFound(key)) => {
            return Err(WorkflowError::Validation(format!("resume not found: {key}")))
        }
        Err(e) => return Err(e.into()),
    };

    info!(task_id = %task.task_id, job_id = %job.job_id, "generating application kit");
    let request = KitRequest {
        job: job.clone(),
        resume_text: resume_text(&resume),
    };
    let content = match wf.call(RunnerInput::Kit(request)).await? {
        RunnerOutput::Kit(content) => content,
        _ => return Err(unexpected_output(TaskKind::KitGeneration)),
    };

    let now = unix_now();
    let cover_letter_key = keys::cover_letter(&task.user_id, &job.job_id, now);
    let mut metadata = BlobMetadata::new();
    metadata.insert("user_id".into(), task.user_id.clone());
    metadata.insert("job_id".into(), job.job_id.clone());
    metadata.insert("created_at".into(), now.to_string());
    wf.blobs
        .put_blob(
            &cover_letter_key,
            content.cover_letter.clone().into_bytes(),
            "text/plain; charset=utf-8",
            metadata,
        )
        .await?;

    let mut kit = ApplicationKit {
        kit_id: uuid::Uuid::new_v4().to_string(),
        job_id: job.job_id.clone(),
        user_id: task.user_id.clone(),
        cover_letter: content.cover_letter,
        resume_bullets: content.resume_bullets,
        cover_letter_key: Some(cover_letter_key.clone()),
        created_at: now,
        metadata: Default::default(),
    };
    kit.metadata.insert("resume_key".into(), json!(resume_key));
    kit.metadata.insert("task_id".into(), json!(task.task_id));
    wf.records.put_kit(&kit).await?;

    // The kit stands even if the status bump is lost.
    if let Err(e) = wf
        .records
        .update_job_status(&job.job_id, JobStatus::KitGenerated, now)
        .await
    {
        warn!(job_id = %job.job_id, error = %e, "failed to mark job kit_generated");
    }

    let result = serde_json::to_value(&kit).map_err(DbError::from)?;
    Ok(WorkflowOutput {
        result,
        blob_keys: vec![cover_letter_key],
    })
}

/// Resume text for the prompt. Text uploads are used as-is.
fn resume_text(resume: &Blob) -> String {
    match std::str::from_utf8(&resume.bytes) {
        Ok(text) if !resume.content_type.contains("pdf") => text.to_string(),
        _ => format!(
            "[{} resume, {} bytes; text not extracted]",
            resume.content_type,
            resume.bytes.len()
        ),
    }
}
