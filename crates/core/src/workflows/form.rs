use applykit_db::{keys, BlobMetadata};
use applykit_types::{unix_now, JobStatus, Task, TaskKind};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::json;
use tracing::{info, warn};

use super::input::FillInput;
use super::{unexpected_output, WorkflowOutput, Workflows};
use crate::error::WorkflowError;
use crate::runner::{FillRequest, RunnerError, RunnerInput, RunnerOutput};

pub(super) async fn run(
    wf: &Workflows,
    task: &Task,
    input: FillInput,
) -> Result<WorkflowOutput, WorkflowError> {
    let job = wf.load_job(&input.job_id).await?;
    info!(
        task_id = %task.task_id,
        job_id = %job.job_id,
        url = %input.application_url,
        submit = input.submit,
        "filling application form"
    );

    let request = FillRequest {
        application_url: input.application_url.clone(),
        form_data: input.form_data.clone(),
        submit: input.submit,
    };
    let outcome = match wf.call(RunnerInput::Fill(request)).await? {
        RunnerOutput::Filled(outcome) => outcome,
        _ => return Err(unexpected_output(TaskKind::FormFill)),
    };

    let now = unix_now();
    let mut screenshot_keys = Vec::with_capacity(outcome.screenshots.len());
    for (index, shot) in outcome.screenshots.iter().enumerate() {
        let step = step_name(&shot.step);
        let image = STANDARD.decode(shot.data.trim()).map_err(|e| {
            RunnerError::Remote(format!("malformed screenshot {step}: {e}"))
        })?;
        let key = keys::screenshot(&task.task_id, index, &step, now);
        let mut metadata = BlobMetadata::new();
        metadata.insert("task_id".into(), task.task_id.clone());
        metadata.insert("step".into(), step.clone());
        metadata.insert("timestamp".into(), now.to_string());
        wf.blobs.put_blob(&key, image, "image/png", metadata).await?;
        screenshot_keys.push(key);
    }

    let job_status = if outcome.submitted {
        JobStatus::FormFilled
    } else {
        JobStatus::ReadyToSubmit
    };
    if let Err(e) = wf
        .records
        .update_job_status(&job.job_id, job_status, now)
        .await
    {
        warn!(job_id = %job.job_id, error = %e, "failed to advance job after form fill");
    }

    let message = if outcome.submitted {
        "Form filled and submitted."
    } else {
        "Form filled successfully. Ready for manual review before submission."
    };
    Ok(WorkflowOutput {
        result: json!({
            "job_id": job.job_id,
            "job_title": job.title,
            "company": job.company,
            "application_url": input.application_url,
            "session_id": outcome.session_id,
            "automation_status": outcome.status,
            "filled_fields": outcome.filled_fields,
            "screenshot_keys": screenshot_keys,
            "stopped_at": outcome.stopped_at,
            "final_url": outcome.final_url,
            "submitted": outcome.submitted,
            "message": message,
        }),
        blob_keys: screenshot_keys,
    })
}

/// Step names become part of a blob key.
fn step_name(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "step".to_string()
    } else {
        cleaned
    }
}
